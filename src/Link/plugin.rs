// Plugin dispatch contract: the callback vector installed into a channel.
// Dynamic loading is an external collaborator's concern; only dispatch
// is defined here.

use std::time::Duration;

use crate::Link::channel::LinkSender;

/// The callback vector the channel dispatches into.
///
/// `on_message` runs in the receive worker's context: a callback that
/// blocks (for example by requesting a send buffer with a long wait)
/// stalls reception for its duration. `tick` is called opportunistically
/// at most once per receive loop iteration, with no timing guarantee.
///
/// The host-side half of the vector arrives as `link`:
/// [`LinkSender::request_buffer`] forwards to the channel's claim
/// operation and the returned grant's `commit` publishes the write.
///
/// The vector is installed atomically; an in-flight dispatch finishes on
/// the vector snapshot it started with.
pub trait LinkPlugin: Send + Sync {
    /// Called once per inbound message.
    fn on_message(&self, link: &LinkSender<'_>, bytes: &[u8]);

    /// Periodic hook; may be a no-op.
    fn tick(&self, _link: &LinkSender<'_>) {}
}

impl<F> LinkPlugin for F
where
    F: Fn(&LinkSender<'_>, &[u8]) + Send + Sync,
{
    fn on_message(&self, link: &LinkSender<'_>, bytes: &[u8]) {
        self(link, bytes)
    }
}

/// Vector installed until a real one arrives; drops every message.
pub struct NullPlugin;

impl LinkPlugin for NullPlugin {
    fn on_message(&self, _link: &LinkSender<'_>, _bytes: &[u8]) {}
}

/// Canned vector that reflects every inbound message back to the outer
/// side unchanged.
pub struct EchoPlugin {
    /// How long `on_message` may wait for the send window per echo.
    pub wait: Duration,
}

impl EchoPlugin {
    pub fn new() -> Self {
        Self {
            wait: Duration::from_millis(10),
        }
    }
}

impl Default for EchoPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkPlugin for EchoPlugin {
    fn on_message(&self, link: &LinkSender<'_>, bytes: &[u8]) {
        if let Err(err) = link.send(bytes, self.wait) {
            log::warn!("echo plugin failed to reflect {} bytes: {err}", bytes.len());
        }
    }
}
