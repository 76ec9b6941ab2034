// Module naming follows project convention (BPG = Binary Packet Group)
#[allow(non_snake_case)]
pub mod BPG;

// The shared-memory link layer the BPG protocol rides on
#[allow(non_snake_case)]
pub mod Link;

// Debug implementations for pointer-holding types
pub mod Debug {
    pub mod StructDebug;
}

#[allow(non_snake_case)]
pub mod Core {
    pub mod SharedMemory;
    pub use SharedMemory::{
        create_shared_memory, ExternalSharedMemory, HeapSharedMemory, SharedMemoryBackend,
    };
    pub mod backoff;
}

pub mod ffi;
pub mod host;
