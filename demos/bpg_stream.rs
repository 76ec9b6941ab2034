// Protocol-only demo: two packet groups interleaved on a single byte
// stream, decoded in link-layer-sized chunks.
//
// Run with: cargo run --example bpg_stream

use std::cell::RefCell;

use bpg_link::BPG::Structs::Packet_Structs::{
    AppPacket, AppPacketGroup, HybridData, BPG_HEADER_SIZE,
};
use bpg_link::BPG::{BpgDecoder, BpgEncoder, BufferWriter};

fn packet(group_id: u32, target_id: u32, tl: &[u8; 2], end: bool, meta: &str, body: &[u8]) -> AppPacket {
    AppPacket {
        group_id,
        target_id,
        tl: *tl,
        end_of_group: end,
        content: HybridData {
            metadata_str: meta.to_string(),
            binary_bytes: body.to_vec(),
        },
    }
}

fn print_packet(p: &AppPacket) {
    println!(
        "  packet group={} target={} tl={}{} eg={} meta={:?} binary={} bytes",
        p.group_id,
        p.target_id,
        p.tl[0] as char,
        p.tl[1] as char,
        p.end_of_group,
        p.content.metadata_str,
        p.content.binary_bytes.len()
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Group 101: a fake image, a progress report, a terminator
    let group_101 = vec![
        packet(
            101,
            50,
            b"IM",
            false,
            "{\"width\":64,\"height\":48,\"format\":\"raw\"}",
            &vec![0x7Fu8; 64 * 48],
        ),
        packet(
            101,
            50,
            b"RP",
            false,
            "",
            b"{\"status\":\"processing\",\"progress\":0.75}",
        ),
        packet(101, 50, b"EG", true, "", b"{\"ack\":true}"),
    ];

    // Group 102: a text line and its terminator
    let group_102 = vec![
        packet(102, 55, b"TX", false, "", b"Hello from Group 102"),
        packet(102, 55, b"EG", true, "", b"{\"done\":true}"),
    ];

    println!("--- Sender: interleaving groups 101 and 102 ---");
    let mut interleaved: Vec<&AppPacket> = Vec::new();
    let longest = group_101.len().max(group_102.len());
    for i in 0..longest {
        if let Some(p) = group_101.get(i) {
            interleaved.push(p);
        }
        if let Some(p) = group_102.get(i) {
            interleaved.push(p);
        }
    }

    let capacity: usize = interleaved
        .iter()
        .map(|p| BPG_HEADER_SIZE + p.content.encoded_size())
        .sum();
    let mut stream = vec![0u8; capacity];
    let mut writer = BufferWriter::new(&mut stream);
    let encoder = BpgEncoder::new();
    for &p in &interleaved {
        let before = writer.size();
        encoder.encode_packet(p, &mut writer)?;
        println!(
            "  encoded group={} tl={}{} -> {} bytes",
            p.group_id,
            p.tl[0] as char,
            p.tl[1] as char,
            writer.size() - before
        );
        print_packet(p);
    }
    println!("total stream size: {} bytes", writer.size());

    println!("\n--- Receiver: decoding in 50-byte chunks ---");
    let mut decoder = BpgDecoder::new();
    let completed: RefCell<Vec<(u32, AppPacketGroup)>> = RefCell::new(Vec::new());
    for chunk in stream.chunks(50) {
        decoder.process_data(
            chunk,
            |p| {
                println!(" -> packet for group {}", p.group_id);
            },
            |group_id, group| {
                println!("==> COMPLETE group {group_id} ({} packets)", group.len());
                completed.borrow_mut().push((group_id, group));
            },
        )?;
    }

    println!("\n--- Verification ---");
    let completed = completed.into_inner();
    assert_eq!(completed.len(), 2, "both groups must complete");

    for (expected_id, expected_group) in [(101u32, &group_101), (102u32, &group_102)] {
        let (_, got) = completed
            .iter()
            .find(|(group_id, _)| *group_id == expected_id)
            .expect("group completed");
        assert_eq!(got.as_slice(), expected_group.as_slice());
    }
    println!("groups 101 and 102 arrived intact and in order");

    Ok(())
}
