mod channel;
mod plugin;
mod queue;

pub use channel::{
    Channel, ChannelHandle, LinkSender, SendGrant, ThroughputSnapshot, DEFAULT_SEND_WAIT,
    MAX_SEND_ATTEMPTS, SEND_QUEUE_DEPTH,
};
pub use plugin::{EchoPlugin, LinkPlugin, NullPlugin};
pub use queue::SendQueue;

pub mod Structs {
    pub mod Region_Structs;
    // re-export for stable path
    pub use Region_Structs::{ControlBlock, LinkError, SharedRegion, CONTROL_BLOCK_SIZE};
}
