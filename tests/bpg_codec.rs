// Protocol-level tests: byte-exact encoding, streaming decode under
// arbitrary chunking, group reassembly, and the failure taxonomy.

use bpg_link::BPG::Structs::Packet_Structs::{
    AppPacket, AppPacketGroup, BinarySource, BpgError, HybridData, PacketRef, BPG_HEADER_SIZE,
};
use bpg_link::BPG::{BpgDecoder, BpgEncoder, BufferWriter};

fn packet(
    group_id: u32,
    target_id: u32,
    tl: &[u8; 2],
    end_of_group: bool,
    meta: &str,
    binary: &[u8],
) -> AppPacket {
    AppPacket {
        group_id,
        target_id,
        tl: *tl,
        end_of_group,
        content: HybridData {
            metadata_str: meta.to_string(),
            binary_bytes: binary.to_vec(),
        },
    }
}

fn encode_all(packets: &[AppPacket]) -> Vec<u8> {
    let capacity: usize = packets
        .iter()
        .map(|p| BPG_HEADER_SIZE + p.content.encoded_size())
        .sum();
    let mut buf = vec![0u8; capacity];
    let mut writer = BufferWriter::new(&mut buf);
    let encoder = BpgEncoder::new();
    encoder
        .encode_group(packets, &mut writer)
        .expect("encoding into an exactly-sized buffer");
    assert_eq!(writer.size(), capacity);
    buf
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Packet(AppPacket),
    Group(u32, AppPacketGroup),
}

fn decode_chunked(bytes: &[u8], chunk_size: usize) -> (Vec<Event>, BpgDecoder) {
    let mut decoder = BpgDecoder::new();
    let events = std::cell::RefCell::new(Vec::new());
    for chunk in bytes.chunks(chunk_size.max(1)) {
        decoder
            .process_data(
                chunk,
                |p| events.borrow_mut().push(Event::Packet(p.clone())),
                |id, group| events.borrow_mut().push(Event::Group(id, group)),
            )
            .expect("well-formed stream");
    }
    (events.into_inner(), decoder)
}

#[test]
fn s1_single_packet_wire_bytes() {
    let input = packet(7, 3, b"TX", true, "{\"k\":1}", &[0x01, 0x02, 0x03]);
    let bytes = encode_all(std::slice::from_ref(&input));

    #[rustfmt::skip]
    let expected: Vec<u8> = vec![
        0x54, 0x58,             // tl = "TX"
        0x00, 0x00, 0x00, 0x01, // prop, EG bit set
        0x00, 0x00, 0x00, 0x03, // target_id
        0x00, 0x00, 0x00, 0x07, // group_id
        0x00, 0x00, 0x00, 0x0E, // data_length = 4 + 7 + 3
        0x00, 0x00, 0x00, 0x07, // meta_len
        0x7B, 0x22, 0x6B, 0x22, 0x3A, 0x31, 0x7D, // {"k":1}
        0x01, 0x02, 0x03,
    ];
    assert_eq!(bytes.len(), 32);
    assert_eq!(bytes, expected);
}

#[test]
fn s2_byte_at_a_time_decode() {
    let input = packet(7, 3, b"TX", true, "{\"k\":1}", &[0x01, 0x02, 0x03]);
    let bytes = encode_all(std::slice::from_ref(&input));

    let (events, decoder) = decode_chunked(&bytes, 1);
    assert_eq!(
        events,
        vec![
            Event::Packet(input.clone()),
            Event::Group(7, vec![input]),
        ]
    );
    assert_eq!(decoder.pending_bytes(), 0);
    assert_eq!(decoder.open_groups(), 0);
}

#[test]
fn s3_interleaved_groups_complete_independently() {
    let a1 = packet(1, 9, b"AA", false, "", b"first");
    let b1 = packet(2, 9, b"BB", false, "", b"second");
    let a2 = packet(1, 9, b"CC", true, "", b"third");
    let bytes = encode_all(&[a1.clone(), b1.clone(), a2.clone()]);

    let (events, decoder) = decode_chunked(&bytes, bytes.len());
    assert_eq!(
        events,
        vec![
            Event::Packet(a1.clone()),
            Event::Packet(b1),
            Event::Packet(a2.clone()),
            Event::Group(1, vec![a1, a2]),
        ]
    );
    // Group 2 never terminated
    assert_eq!(decoder.open_groups(), 1);
}

#[test]
fn p1_round_trip_preserves_every_field() {
    let input = packet(
        0xDEAD_BEEF,
        42,
        b"IM",
        true,
        "{\"width\":64,\"height\":48}",
        &(0..=255u8).collect::<Vec<_>>(),
    );
    let bytes = encode_all(std::slice::from_ref(&input));

    let (events, _) = decode_chunked(&bytes, bytes.len());
    match &events[..] {
        [Event::Packet(decoded), Event::Group(group_id, group)] => {
            assert_eq!(decoded, &input);
            assert_eq!(*group_id, input.group_id);
            assert_eq!(group.as_slice(), std::slice::from_ref(&input));
        }
        other => panic!("unexpected event sequence: {other:?}"),
    }
}

#[test]
fn p1_non_terminator_fires_no_group() {
    let input = packet(5, 1, b"RP", false, "{\"progress\":0.5}", b"");
    let bytes = encode_all(std::slice::from_ref(&input));

    let (events, decoder) = decode_chunked(&bytes, 4);
    assert_eq!(events, vec![Event::Packet(input)]);
    assert_eq!(decoder.open_groups(), 1);
}

#[test]
fn p2_chunking_invariance() {
    let packets = vec![
        packet(101, 50, b"IM", false, "{\"format\":\"jpg\"}", &[0xFFu8; 700]),
        packet(102, 55, b"TX", false, "", b"Hello from group 102"),
        packet(101, 50, b"RP", false, "{\"progress\":0.75}", b""),
        packet(102, 55, b"EG", true, "{\"done\":true}", b""),
        packet(101, 50, b"EG", true, "{\"ack\":true}", b""),
    ];
    let bytes = encode_all(&packets);

    let (reference, _) = decode_chunked(&bytes, bytes.len());
    assert_eq!(
        reference.len(),
        packets.len() + 2,
        "five packets plus two group completions"
    );
    for chunk_size in [1, 2, 3, 5, 7, 11, 16, 64, 255] {
        let (events, _) = decode_chunked(&bytes, chunk_size);
        assert_eq!(events, reference, "chunk size {chunk_size}");
    }
}

#[test]
fn p4_oversize_data_length_is_rejected() {
    let input = packet(1, 1, b"TX", true, "", &[0u8; 64]);
    let bytes = encode_all(std::slice::from_ref(&input));

    let mut decoder = BpgDecoder::new().with_max_packet_body(32);
    let mut packets = 0;
    let err = decoder
        .process_data(&bytes, |_| packets += 1, |_, _| {})
        .unwrap_err();
    assert_eq!(err, BpgError::InvalidPacketHeader(4 + 64));
    assert_eq!(packets, 0);
}

#[test]
fn p4_meta_length_overrun_is_rejected() {
    let input = packet(1, 1, b"TX", true, "abc", b"xyz");
    let mut bytes = encode_all(std::slice::from_ref(&input));
    // Corrupt meta_len (body offset 0) to overrun data_length
    bytes[BPG_HEADER_SIZE..BPG_HEADER_SIZE + 4].copy_from_slice(&100u32.to_be_bytes());

    let mut decoder = BpgDecoder::new();
    let mut packets = 0;
    let err = decoder
        .process_data(&bytes, |_| packets += 1, |_, _| {})
        .unwrap_err();
    assert_eq!(err, BpgError::DecodingError);
    assert_eq!(packets, 0);

    // The stream is fail-closed until reset
    assert!(decoder.pending_bytes() > 0);
    decoder.reset();
    assert_eq!(decoder.pending_bytes(), 0);

    let good = encode_all(std::slice::from_ref(&input));
    let mut decoded = Vec::new();
    decoder
        .process_data(&good, |p| decoded.push(p.clone()), |_, _| {})
        .unwrap();
    assert_eq!(decoded, vec![input]);
}

#[test]
fn p5_writer_unchanged_by_failed_appends() {
    let mut buf = [0u8; 8];
    let mut writer = BufferWriter::new(&mut buf);
    assert!(writer.append_bytes(b"abcde"));
    assert_eq!(writer.size(), 5);

    assert!(!writer.append_u32_be(0x11223344));
    assert_eq!(writer.size(), 5);

    assert!(!writer.append_bytes(b"too long"));
    assert_eq!(writer.size(), 5);

    assert!(writer.claim(4).is_none());
    assert_eq!(writer.size(), 5);
    assert_eq!(writer.remaining(), 3);

    assert!(writer.append_tl(*b"OK"));
    assert_eq!(writer.size(), 7);
    assert_eq!(writer.written(), b"abcdeOK");
}

#[test]
fn writer_claim_hands_out_the_reserved_span() {
    let mut buf = [0u8; 16];
    let mut writer = BufferWriter::new(&mut buf);
    assert!(writer.append_u32_be(0xAABBCCDD));

    let span = writer.claim(4).expect("room for the claim");
    span.copy_from_slice(b"data");
    assert_eq!(writer.size(), 8);
    assert_eq!(writer.written(), &[0xAA, 0xBB, 0xCC, 0xDD, b'd', b'a', b't', b'a']);
}

#[test]
fn encoder_rejects_undersized_buffer_without_writing() {
    let input = packet(1, 1, b"TX", true, "meta", b"payload");
    let mut buf = [0u8; 16]; // smaller than header + body
    let mut writer = BufferWriter::new(&mut buf);
    let err = BpgEncoder::new()
        .encode_packet(&input, &mut writer)
        .unwrap_err();
    assert_eq!(err, BpgError::BufferTooSmall);
    assert_eq!(writer.size(), 0);
}

#[test]
fn group_encode_failure_leaves_only_whole_packets() {
    let first = packet(1, 1, b"AA", false, "", &[1u8; 10]);
    let second = packet(1, 1, b"EG", true, "", &[2u8; 100]);
    let first_size = BPG_HEADER_SIZE + first.content.encoded_size();

    let mut buf = vec![0u8; first_size + 20];
    let mut writer = BufferWriter::new(&mut buf);
    let err = BpgEncoder::new()
        .encode_group(&[first, second], &mut writer)
        .unwrap_err();
    assert_eq!(err, BpgError::BufferTooSmall);
    assert_eq!(writer.size(), first_size);
}

#[test]
fn producer_source_writes_payload_in_place() {
    let mut buf = vec![0u8; 256];
    let mut writer = BufferWriter::new(&mut buf);
    let encoder = BpgEncoder::new();
    encoder
        .encode_ref(
            PacketRef {
                group_id: 11,
                target_id: 4,
                tl: *b"FB",
                end_of_group: true,
                metadata_str: "{\"rows\":4}",
                binary: BinarySource::Producer {
                    len: 16,
                    fill: Box::new(|slot| {
                        for (i, byte) in slot.iter_mut().enumerate() {
                            *byte = i as u8;
                        }
                        Ok(())
                    }),
                },
            },
            &mut writer,
        )
        .unwrap();

    let bytes = writer.written().to_vec();
    let (events, _) = decode_chunked(&bytes, 3);
    match &events[..] {
        [Event::Packet(p), Event::Group(11, _)] => {
            assert_eq!(&p.tl, b"FB");
            assert_eq!(p.content.metadata_str, "{\"rows\":4}");
            assert_eq!(p.content.binary_bytes, (0..16u8).collect::<Vec<_>>());
        }
        other => panic!("unexpected event sequence: {other:?}"),
    }
}

#[test]
fn producer_error_bubbles_out() {
    let mut buf = vec![0u8; 256];
    let mut writer = BufferWriter::new(&mut buf);
    let err = BpgEncoder::new()
        .encode_ref(
            PacketRef {
                group_id: 1,
                target_id: 1,
                tl: *b"FB",
                end_of_group: false,
                metadata_str: "",
                binary: BinarySource::Producer {
                    len: 8,
                    fill: Box::new(|_| Err(BpgError::EncodingError)),
                },
            },
            &mut writer,
        )
        .unwrap_err();
    assert_eq!(err, BpgError::EncodingError);
}

#[test]
fn empty_group_is_a_single_terminator() {
    let eg = packet(201, 60, b"EG", true, "{\"status\":\"empty_group\"}", b"");
    let bytes = encode_all(std::slice::from_ref(&eg));

    let (events, decoder) = decode_chunked(&bytes, bytes.len());
    assert_eq!(
        events,
        vec![Event::Packet(eg.clone()), Event::Group(201, vec![eg])]
    );
    assert_eq!(decoder.open_groups(), 0);
}

#[test]
fn reserved_prop_bits_are_ignored_on_read() {
    let input = packet(3, 1, b"TX", false, "", b"hi");
    let mut bytes = encode_all(std::slice::from_ref(&input));
    // Set a reserved prop bit (byte 5 is the prop LSB, byte 2 the MSB)
    bytes[2] |= 0x80;

    let (events, _) = decode_chunked(&bytes, bytes.len());
    match &events[..] {
        [Event::Packet(p)] => {
            assert!(!p.end_of_group);
            assert_eq!(p.content.binary_bytes, b"hi");
        }
        other => panic!("unexpected event sequence: {other:?}"),
    }
}
