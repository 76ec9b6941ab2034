mod decoder;
mod encoder;
mod writer;

pub use decoder::BpgDecoder;
pub use encoder::BpgEncoder;
pub use writer::BufferWriter;

pub mod Structs {
    pub mod Packet_Structs;
    // re-export for stable path
    pub use Packet_Structs::{
        AppPacket, AppPacketGroup, BinarySource, BpgError, HybridData, PacketHeader, PacketRef,
        PacketType, BPG_HEADER_SIZE, BPG_PROP_EG_BIT_MASK, DEFAULT_MAX_PACKET_BODY, META_LEN_SIZE,
    };
}
