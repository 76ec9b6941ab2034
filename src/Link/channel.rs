// The rendezvous channel: owns the shared region and the receive loop,
// exposes the claim/commit send path, and enforces the single-in-flight
// invariant per direction.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};

use crate::Core::backoff::Backoff;
use crate::Link::plugin::{LinkPlugin, NullPlugin};
use crate::Link::queue::SendQueue;
use crate::Link::Structs::Region_Structs::{ControlBlock, LinkError, SharedRegion};

/// Wait the send worker applies per delivery attempt.
pub const DEFAULT_SEND_WAIT: Duration = Duration::from_millis(10);

/// Delivery attempts before the send worker drops a queued message.
pub const MAX_SEND_ATTEMPTS: u32 = 8;

/// Depth of the asynchronous send queue.
pub const SEND_QUEUE_DEPTH: usize = 64;

struct QueuedSend {
    bytes: Vec<u8>,
    attempts: u32,
}

/// Host-side traffic counters. These live outside the shared region and
/// have no ABI footprint.
#[derive(Default)]
struct ThroughputStats {
    bytes_in: CachePadded<AtomicU64>,
    messages_in: CachePadded<AtomicU64>,
    dropped: CachePadded<AtomicU64>,
    started: Mutex<Option<Instant>>,
}

impl ThroughputStats {
    fn record_inbound(&self, bytes: usize) {
        self.bytes_in.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_in.fetch_add(1, Ordering::Relaxed);
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn restart(&self) {
        self.bytes_in.store(0, Ordering::Relaxed);
        self.messages_in.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        *self.started.lock() = Some(Instant::now());
    }

    fn snapshot(&self) -> ThroughputSnapshot {
        let seconds = self
            .started
            .lock()
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let total_bytes = self.bytes_in.load(Ordering::Relaxed);
        let total_messages = self.messages_in.load(Ordering::Relaxed);
        let per_second = |count: u64| {
            if seconds > 0.0 {
                count as f64 / seconds
            } else {
                0.0
            }
        };
        ThroughputSnapshot {
            total_bytes,
            total_messages,
            dropped_messages: self.dropped.load(Ordering::Relaxed),
            seconds,
            bytes_per_second: per_second(total_bytes),
            messages_per_second: per_second(total_messages),
        }
    }
}

/// Point-in-time view of the traffic counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSnapshot {
    pub total_bytes: u64,
    pub total_messages: u64,
    pub dropped_messages: u64,
    pub seconds: f64,
    pub bytes_per_second: f64,
    pub messages_per_second: f64,
}

/// State shared between the channel owner, its workers, and handles.
pub(crate) struct ChannelShared {
    region: SharedRegion,
    operating: AtomicBool,
    claim_lock: Mutex<()>,
    plugin: Mutex<Arc<dyn LinkPlugin>>,
    send_queue: SendQueue<QueuedSend>,
    inbound_tap: Mutex<Option<Arc<SendQueue<Vec<u8>>>>>,
    stats: ThroughputStats,
}

impl ChannelShared {
    fn operating(&self) -> bool {
        self.operating.load(Ordering::SeqCst)
    }

    fn claim_send_buffer(&self, wait: Duration) -> Result<SendGrant<'_>, LinkError> {
        if !self.operating() {
            return Err(LinkError::Closed);
        }
        let claim = self.claim_lock.lock();
        let control = self.region.control();
        let deadline = Instant::now() + wait;
        let mut backoff = Backoff::new();
        while control.sig_h2r.load(Ordering::SeqCst) != 0 {
            if !self.operating() {
                return Err(LinkError::Closed);
            }
            if Instant::now() >= deadline {
                return Err(LinkError::Busy);
            }
            backoff.snooze();
        }
        let slot = unsafe { self.region.h2r_bytes_mut() };
        Ok(SendGrant {
            control,
            slot,
            _claim: claim,
        })
    }

    fn send(&self, bytes: &[u8], wait: Duration) -> Result<(), LinkError> {
        let capacity = self.region.h2r_capacity();
        if bytes.len() > capacity {
            return Err(LinkError::OversizeMessage {
                len: bytes.len(),
                capacity,
            });
        }
        let mut grant = self.claim_send_buffer(wait)?;
        grant.buffer()[..bytes.len()].copy_from_slice(bytes);
        grant.commit(bytes.len())
    }

    fn trigger(&self, bytes: Vec<u8>, wait: Duration) -> Result<(), LinkError> {
        if !self.operating() {
            return Err(LinkError::Closed);
        }
        let capacity = self.region.h2r_capacity();
        if bytes.len() > capacity {
            return Err(LinkError::OversizeMessage {
                len: bytes.len(),
                capacity,
            });
        }
        let queued = QueuedSend { bytes, attempts: 0 };
        if self.send_queue.push_timeout(queued, wait) {
            Ok(())
        } else if self.operating() {
            Err(LinkError::Busy)
        } else {
            Err(LinkError::Closed)
        }
    }

    fn dispatch_inbound(&self, bytes: &[u8]) {
        let plugin = self.plugin.lock().clone();
        let sender = LinkSender { shared: self };
        plugin.on_message(&sender, bytes);

        let tap = self.inbound_tap.lock().clone();
        if let Some(tap) = tap {
            if !tap.push(bytes.to_vec()) {
                log::debug!("inbound tap full, record of {} bytes dropped", bytes.len());
            }
        }
    }
}

/// Exclusive reservation of the host->outer data slot.
///
/// At most one grant exists at a time. Publish with [`commit`]; dropping
/// the grant, or committing 0 bytes, releases the claim without
/// signaling and nothing reaches the wire.
///
/// [`commit`]: SendGrant::commit
pub struct SendGrant<'c> {
    control: &'c ControlBlock,
    slot: &'c mut [u8],
    _claim: MutexGuard<'c, ()>,
}

impl SendGrant<'_> {
    /// Capacity of the slot.
    pub fn capacity(&self) -> usize {
        self.slot.len()
    }

    /// The writable slot.
    pub fn buffer(&mut self) -> &mut [u8] {
        self.slot
    }

    /// Publish `len` bytes: store the length, then flip the signal.
    pub fn commit(self, len: usize) -> Result<(), LinkError> {
        if len > self.slot.len() {
            return Err(LinkError::OversizeMessage {
                len,
                capacity: self.slot.len(),
            });
        }
        if len == 0 {
            return Ok(());
        }
        self.control.len_h2r.store(len as u32, Ordering::SeqCst);
        self.control.sig_h2r.store(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Host services handed to plugin callbacks: the request/commit half of
/// the callback vector.
pub struct LinkSender<'c> {
    shared: &'c ChannelShared,
}

impl LinkSender<'_> {
    /// Claim the host->outer slot for direct encoding.
    pub fn request_buffer(&self, wait: Duration) -> Result<SendGrant<'_>, LinkError> {
        self.shared.claim_send_buffer(wait)
    }

    /// Copy-then-send convenience.
    pub fn send(&self, bytes: &[u8], wait: Duration) -> Result<(), LinkError> {
        self.shared.send(bytes, wait)
    }

    /// Queue for the send worker instead of blocking the callback.
    pub fn trigger(&self, bytes: Vec<u8>) -> Result<(), LinkError> {
        self.shared.trigger(bytes, Duration::ZERO)
    }

    /// Capacity of the host->outer slot.
    pub fn send_capacity(&self) -> usize {
        self.shared.region.h2r_capacity()
    }
}

/// Cloneable owned handle to the channel's send side, for helper threads
/// that outlive a borrow of the channel.
#[derive(Clone)]
pub struct ChannelHandle {
    shared: Arc<ChannelShared>,
}

impl ChannelHandle {
    pub fn send(&self, bytes: &[u8], wait: Duration) -> Result<(), LinkError> {
        self.shared.send(bytes, wait)
    }

    pub fn trigger(&self, bytes: Vec<u8>, wait: Duration) -> Result<(), LinkError> {
        self.shared.trigger(bytes, wait)
    }

    pub fn is_operating(&self) -> bool {
        self.shared.operating()
    }
}

/// The shared-memory rendezvous channel.
///
/// Owns the region and two workers: the receive worker polls `sig_r2h`
/// and dispatches inbound bytes to the plugin; the send worker drains
/// the trigger queue through the claim/commit path.
pub struct Channel {
    shared: Arc<ChannelShared>,
    recv_worker: Option<JoinHandle<()>>,
    send_worker: Option<JoinHandle<()>>,
}

impl Channel {
    /// Take ownership of `region` and start the workers.
    pub fn configure(region: SharedRegion) -> Channel {
        let shared = Arc::new(ChannelShared {
            region,
            operating: AtomicBool::new(true),
            claim_lock: Mutex::new(()),
            plugin: Mutex::new(Arc::new(NullPlugin) as Arc<dyn LinkPlugin>),
            send_queue: SendQueue::new(SEND_QUEUE_DEPTH),
            inbound_tap: Mutex::new(None),
            stats: ThroughputStats::default(),
        });

        let recv_shared = Arc::clone(&shared);
        let recv_worker = thread::spawn(move || receive_loop(&recv_shared));

        let sendq_shared = Arc::clone(&shared);
        let send_worker = thread::spawn(move || send_loop(&sendq_shared));

        Channel {
            shared,
            recv_worker: Some(recv_worker),
            send_worker: Some(send_worker),
        }
    }

    /// Replace the plugin vector. An in-flight dispatch finishes on the
    /// snapshot it started with.
    pub fn install_plugin(&self, plugin: Arc<dyn LinkPlugin>) {
        *self.shared.plugin.lock() = plugin;
    }

    /// Register the inbound work-queue consumed by the foreign-runtime
    /// adapter. The receive worker posts an owned copy of every inbound
    /// message to it.
    pub fn set_inbound_tap(&self, tap: Arc<SendQueue<Vec<u8>>>) {
        *self.shared.inbound_tap.lock() = Some(tap);
    }

    /// Claim the host->outer slot. Waits up to `wait` for the outer side
    /// to drain a pending message; `Busy` on timeout, `Closed` once torn
    /// down.
    pub fn claim_send_buffer(&self, wait: Duration) -> Result<SendGrant<'_>, LinkError> {
        self.shared.claim_send_buffer(wait)
    }

    /// Claim, copy `bytes` in, and commit.
    pub fn send(&self, bytes: &[u8], wait: Duration) -> Result<(), LinkError> {
        self.shared.send(bytes, wait)
    }

    /// Queue `bytes` for the send worker, waiting up to `wait` for queue
    /// space.
    pub fn trigger(&self, bytes: Vec<u8>, wait: Duration) -> Result<(), LinkError> {
        self.shared.trigger(bytes, wait)
    }

    /// Dispatch `bytes` through the plugin and tap as if the outer side
    /// had published them.
    pub fn inject_inbound(&self, bytes: &[u8]) {
        self.shared.dispatch_inbound(bytes);
    }

    /// The region, for peers sharing the process (and tests).
    pub fn region(&self) -> &SharedRegion {
        &self.shared.region
    }

    /// Owned handle to the send side.
    pub fn handle(&self) -> ChannelHandle {
        ChannelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_operating(&self) -> bool {
        self.shared.operating()
    }

    /// Zero the traffic counters and stamp the measurement start.
    pub fn start_throughput_test(&self) {
        self.shared.stats.restart();
    }

    pub fn throughput_stats(&self) -> ThroughputSnapshot {
        self.shared.stats.snapshot()
    }

    /// Stop both workers and quiesce the channel. Safe to call more than
    /// once; also runs on drop.
    pub fn teardown(&mut self) {
        if self.shared.operating.swap(false, Ordering::SeqCst) {
            self.shared.send_queue.interrupt();
        }
        if let Some(worker) = self.recv_worker.take() {
            let _ = worker.join();
        }
        if let Some(worker) = self.send_worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn receive_loop(shared: &ChannelShared) {
    let control = shared.region.control();
    let mut backoff = Backoff::new();

    while shared.operating() {
        if control.sig_r2h.load(Ordering::SeqCst) == 1 {
            let len = control.len_r2h.load(Ordering::SeqCst) as usize;
            if len > shared.region.r2h_capacity() {
                log::warn!(
                    "dropping inbound message: length {len} exceeds slot capacity {}",
                    shared.region.r2h_capacity()
                );
                shared.stats.record_drop();
            } else {
                let bytes = unsafe { shared.region.r2h_bytes(len) };
                shared.stats.record_inbound(len);
                shared.dispatch_inbound(bytes);
            }
            control.sig_r2h.store(0, Ordering::SeqCst);
            backoff.reset();
        } else {
            backoff.snooze();
            if !shared.operating() {
                break;
            }
        }

        let plugin = shared.plugin.lock().clone();
        let sender = LinkSender { shared };
        plugin.tick(&sender);
    }
}

fn send_loop(shared: &ChannelShared) {
    while shared.operating() {
        let Some(mut item) = shared.send_queue.wait_and_pop() else {
            // Interrupted; the loop condition re-checks the flag.
            continue;
        };
        match shared.send(&item.bytes, DEFAULT_SEND_WAIT) {
            Ok(()) => {}
            Err(LinkError::Busy) => {
                item.attempts += 1;
                if item.attempts >= MAX_SEND_ATTEMPTS {
                    log::warn!("dropping queued send after {} attempts", item.attempts);
                    shared.stats.record_drop();
                    continue;
                }
                thread::sleep(Duration::from_micros(1 << item.attempts.min(10)));
                if !shared.send_queue.push(item) {
                    shared.stats.record_drop();
                }
            }
            Err(LinkError::Closed) => return,
            Err(err) => {
                log::warn!("queued send of {} bytes failed: {err}", item.bytes.len());
                shared.stats.record_drop();
            }
        }
    }
}
