// HostApi: the operations exposed to external collaborators. The
// channel is an owned value here, not a process-wide singleton.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::Core::SharedMemory::SharedMemoryBackend;
use crate::Link::Structs::Region_Structs::{LinkError, SharedRegion};
use crate::Link::{Channel, LinkPlugin, NullPlugin, SendQueue, ThroughputSnapshot};

/// Depth of the inbound callback work-queue.
const CALLBACK_QUEUE_DEPTH: usize = 256;

/// Wait budget for façade-level `trigger` enqueues.
const TRIGGER_WAIT: Duration = Duration::from_millis(10);

/// Wait budget for each periodic-sender emission.
const PERIODIC_SEND_WAIT: Duration = Duration::from_millis(5);

/// Message synthesized by `trigger_test_callback`.
const TEST_MESSAGE: &[u8] = b"bpg-link test callback";

type MessageCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

struct PeriodicSender {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

/// Facade over the channel for the foreign-runtime glue.
///
/// Inbound bytes observed on the receive worker are posted as owned
/// records to a work-queue; the adapter drains them from the foreign
/// runtime's thread via [`pump_message_callbacks`].
///
/// [`pump_message_callbacks`]: HostApi::pump_message_callbacks
pub struct HostApi {
    channel: Mutex<Option<Channel>>,
    plugin: Mutex<Arc<dyn LinkPlugin>>,
    callback_queue: Arc<SendQueue<Vec<u8>>>,
    message_callback: Mutex<Option<MessageCallback>>,
    periodic: Mutex<Option<PeriodicSender>>,
}

impl HostApi {
    pub fn new() -> Self {
        Self {
            channel: Mutex::new(None),
            plugin: Mutex::new(Arc::new(NullPlugin) as Arc<dyn LinkPlugin>),
            callback_queue: Arc::new(SendQueue::new(CALLBACK_QUEUE_DEPTH)),
            message_callback: Mutex::new(None),
            periodic: Mutex::new(None),
        }
    }

    /// Health check.
    pub fn hello(&self) -> String {
        format!("bpg-link {}", env!("CARGO_PKG_VERSION"))
    }

    /// Configure (or reconfigure) the channel over `backing` with an
    /// outer->host slot of `r2h_capacity` bytes and a host->outer slot
    /// of `h2r_capacity` bytes. A prior channel is torn down first.
    pub fn set_shared_buffer(
        &self,
        backing: Box<dyn SharedMemoryBackend>,
        r2h_capacity: u32,
        h2r_capacity: u32,
    ) -> Result<(), LinkError> {
        let region = SharedRegion::new(backing, r2h_capacity as usize, h2r_capacity as usize)?;

        let mut slot = self.channel.lock();
        if let Some(mut old) = slot.take() {
            old.teardown();
        }
        let channel = Channel::configure(region);
        channel.install_plugin(self.plugin.lock().clone());
        channel.set_inbound_tap(Arc::clone(&self.callback_queue));
        self.callback_queue.reset_interrupt();
        *slot = Some(channel);
        Ok(())
    }

    /// Install the callback vector. Applies to the running channel and
    /// to any channel configured afterwards.
    pub fn install_plugin(&self, plugin: Arc<dyn LinkPlugin>) {
        *self.plugin.lock() = Arc::clone(&plugin);
        if let Some(channel) = self.channel.lock().as_ref() {
            channel.install_plugin(plugin);
        }
    }

    /// Register the inbound-bytes observer invoked by
    /// `pump_message_callbacks`.
    pub fn set_message_callback<F>(&self, callback: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        *self.message_callback.lock() = Some(Arc::new(callback));
    }

    /// Drain queued inbound records into the registered observer.
    /// Intended to run on the foreign runtime's own thread. Returns the
    /// number of records delivered.
    pub fn pump_message_callbacks(&self) -> usize {
        let callback = self.message_callback.lock().clone();
        let mut delivered = 0;
        while let Some(bytes) = self.callback_queue.pop() {
            if let Some(callback) = callback.as_ref() {
                callback(&bytes);
            }
            delivered += 1;
        }
        delivered
    }

    /// Claim-copy-commit send through the configured channel.
    pub fn send(&self, bytes: &[u8], wait: Duration) -> Result<(), LinkError> {
        let handle = self.channel.lock().as_ref().map(Channel::handle);
        match handle {
            Some(handle) => handle.send(bytes, wait),
            None => Err(LinkError::Closed),
        }
    }

    /// Queue bytes for the channel's send worker.
    pub fn trigger(&self, bytes: Vec<u8>) -> Result<(), LinkError> {
        let handle = self.channel.lock().as_ref().map(Channel::handle);
        match handle {
            Some(handle) => handle.trigger(bytes, TRIGGER_WAIT),
            None => Err(LinkError::Closed),
        }
    }

    /// Push a canned message through the installed plugin as if the
    /// outer side had sent it.
    pub fn trigger_test_callback(&self) -> Result<(), LinkError> {
        match self.channel.lock().as_ref() {
            Some(channel) => {
                channel.inject_inbound(TEST_MESSAGE);
                Ok(())
            }
            None => Err(LinkError::Closed),
        }
    }

    /// Zero the traffic counters and stamp the measurement start.
    pub fn start_throughput_test(&self) -> Result<(), LinkError> {
        match self.channel.lock().as_ref() {
            Some(channel) => {
                channel.start_throughput_test();
                Ok(())
            }
            None => Err(LinkError::Closed),
        }
    }

    /// Counters accumulated since the last `start_throughput_test`.
    pub fn throughput_stats(&self) -> Result<ThroughputSnapshot, LinkError> {
        match self.channel.lock().as_ref() {
            Some(channel) => Ok(channel.throughput_stats()),
            None => Err(LinkError::Closed),
        }
    }

    /// Emit a canned timestamped message roughly every `interval` until
    /// `stop_periodic_send` (or teardown). Replaces a running sender.
    pub fn start_periodic_send(&self, interval: Duration) -> Result<(), LinkError> {
        self.stop_periodic_send();

        let handle = match self.channel.lock().as_ref() {
            Some(channel) => channel.handle(),
            None => return Err(LinkError::Closed),
        };
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let worker = thread::spawn(move || {
            while !stop_flag.load(Ordering::SeqCst) && handle.is_operating() {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_nanos();
                let message = format!("data from host: {now}");
                if let Err(err) = handle.send(message.as_bytes(), PERIODIC_SEND_WAIT) {
                    log::debug!("periodic send skipped: {err}");
                }
                thread::sleep(interval);
            }
        });
        *self.periodic.lock() = Some(PeriodicSender {
            stop,
            worker: Some(worker),
        });
        Ok(())
    }

    /// Stop the periodic sender, if one is running.
    pub fn stop_periodic_send(&self) {
        if let Some(mut periodic) = self.periodic.lock().take() {
            periodic.stop.store(true, Ordering::SeqCst);
            if let Some(worker) = periodic.worker.take() {
                let _ = worker.join();
            }
        }
    }

    /// Tear down the channel and auxiliary workers and drop the region.
    pub fn cleanup(&self) {
        self.stop_periodic_send();
        if let Some(mut channel) = self.channel.lock().take() {
            channel.teardown();
        }
        self.callback_queue.interrupt();
        self.callback_queue.clear();
    }

    pub fn is_configured(&self) -> bool {
        self.channel.lock().is_some()
    }
}

impl Default for HostApi {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HostApi {
    fn drop(&mut self) {
        self.cleanup();
    }
}
