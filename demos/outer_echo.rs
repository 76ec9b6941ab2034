// End-to-end demo: a simulated outer side exchanges BPG packets with the
// host over a heap-backed region while the echo plugin reflects traffic.
//
// Run with: cargo run --example outer_echo [message_count]

use std::env;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bpg_link::host::HostApi;
use bpg_link::Core::SharedMemory::{create_shared_memory, SharedMemoryBackend};
use bpg_link::Link::Structs::Region_Structs::{ControlBlock, CONTROL_BLOCK_SIZE};
use bpg_link::Link::EchoPlugin;
use bpg_link::BPG::Structs::Packet_Structs::{AppPacket, HybridData, BPG_HEADER_SIZE};
use bpg_link::BPG::{BpgDecoder, BpgEncoder, BufferWriter};

const R2H_CAPACITY: usize = 4096;
const H2R_CAPACITY: usize = 4096;

// Raw-pointer view of the region, as the outer side sees it across the
// ABI. The host keeps the region alive until cleanup.
struct OuterSide {
    base: *mut u8,
}

unsafe impl Send for OuterSide {}

impl OuterSide {
    fn control(&self) -> &ControlBlock {
        unsafe { ControlBlock::from_ptr(self.base) }
    }

    fn publish(&self, bytes: &[u8]) {
        let control = self.control();
        while control.sig_r2h.load(SeqCst) != 0 {
            thread::yield_now();
        }
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.base.add(CONTROL_BLOCK_SIZE),
                bytes.len(),
            );
        }
        control.len_r2h.store(bytes.len() as u32, SeqCst);
        control.sig_r2h.store(1, SeqCst);
    }

    fn take(&self, timeout: Duration) -> Option<Vec<u8>> {
        let control = self.control();
        let start = Instant::now();
        while control.sig_h2r.load(SeqCst) != 1 {
            if start.elapsed() > timeout {
                return None;
            }
            thread::yield_now();
        }
        let len = control.len_h2r.load(SeqCst) as usize;
        let bytes = unsafe {
            std::slice::from_raw_parts(self.base.add(CONTROL_BLOCK_SIZE + R2H_CAPACITY), len)
        }
        .to_vec();
        control.sig_h2r.store(0, SeqCst);
        Some(bytes)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let message_count: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);

    println!("outer_echo: {message_count} packet groups over a shared region");

    let host = HostApi::new();
    host.install_plugin(Arc::new(EchoPlugin::new()));

    let backing = create_shared_memory(CONTROL_BLOCK_SIZE + R2H_CAPACITY + H2R_CAPACITY)?;
    let outer = OuterSide {
        base: backing.as_ptr(),
    };
    host.set_shared_buffer(backing, R2H_CAPACITY as u32, H2R_CAPACITY as u32)?;
    host.start_throughput_test()?;

    let encoder = BpgEncoder::new();
    let mut echoed = 0usize;
    let start = Instant::now();

    for group_id in 0..message_count as u32 {
        let packet = AppPacket {
            group_id,
            target_id: 1,
            tl: *b"TX",
            end_of_group: true,
            content: HybridData {
                metadata_str: format!("{{\"seq\":{group_id}}}"),
                binary_bytes: format!("payload {group_id}").into_bytes(),
            },
        };

        let mut wire = vec![0u8; BPG_HEADER_SIZE + packet.content.encoded_size()];
        let mut writer = BufferWriter::new(&mut wire);
        encoder.encode_packet(&packet, &mut writer)?;

        outer.publish(&wire);
        let reply = outer
            .take(Duration::from_secs(2))
            .ok_or("echo reply timed out")?;

        let mut decoder = BpgDecoder::new();
        let mut matched = false;
        decoder.process_data(
            &reply,
            |p| matched = p == &packet,
            |_, _| {},
        )?;
        if !matched {
            return Err(format!("echo mismatch for group {group_id}").into());
        }
        echoed += 1;
    }

    let elapsed = start.elapsed();
    let stats = host.throughput_stats()?;

    println!("\n{}", "=".repeat(80));
    println!("OUTER ECHO STATISTICS");
    println!("{}", "=".repeat(80));
    println!("Groups echoed:        {echoed}");
    println!("Time taken:           {elapsed:.3?}");
    println!(
        "Round trips (TPS):    {:.2} groups/sec",
        echoed as f64 / elapsed.as_secs_f64()
    );
    println!("Host messages in:     {}", stats.total_messages);
    println!("Host bytes in:        {}", stats.total_bytes);
    println!("Dropped:              {}", stats.dropped_messages);
    println!("{}", "=".repeat(80));

    host.cleanup();
    println!("outer_echo: Shutting down");
    Ok(())
}
