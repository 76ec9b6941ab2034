// Wire-level types of the BPG packet-group protocol

use thiserror::Error;

use crate::BPG::writer::BufferWriter;

/// Fixed size of the BPG packet header in bytes.
/// Breakdown: tl(2) + prop(4) + target_id(4) + group_id(4) + data_length(4) = 18
pub const BPG_HEADER_SIZE: usize = 18;

/// Mask for the end-of-group bit (LSB of the prop field). All other
/// prop bits are reserved: written as 0, ignored on read.
pub const BPG_PROP_EG_BIT_MASK: u32 = 0x0000_0001;

/// Size of the metadata length prefix at the start of every packet body.
pub const META_LEN_SIZE: usize = 4;

/// Default upper bound on `data_length` the decoder accepts (64 MiB).
pub const DEFAULT_MAX_PACKET_BODY: usize = 64 * 1024 * 1024;

/// Two-byte packet type code, carried opaquely.
pub type PacketType = [u8; 2];

/// Error codes of the protocol layer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BpgError {
    #[error("malformed input to encoder")]
    EncodingError,

    #[error("packet body is inconsistent with its header")]
    DecodingError,

    #[error("output buffer too small for packet")]
    BufferTooSmall,

    #[error("header declares out-of-range data length ({0} bytes)")]
    InvalidPacketHeader(u32),
}

/// Packet header structure.
///
/// All multibyte fields are big-endian on the wire; `tl` is two raw
/// bytes with no endian conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub tl: PacketType,
    pub prop: u32,
    pub target_id: u32,
    pub group_id: u32,
    pub data_length: u32,
}

impl PacketHeader {
    /// Serialize the header in wire field order.
    pub fn encode(&self, writer: &mut BufferWriter<'_>) -> Result<(), BpgError> {
        if writer.remaining() < BPG_HEADER_SIZE {
            return Err(BpgError::BufferTooSmall);
        }
        writer.append_tl(self.tl);
        writer.append_u32_be(self.prop);
        writer.append_u32_be(self.target_id);
        writer.append_u32_be(self.group_id);
        writer.append_u32_be(self.data_length);
        Ok(())
    }

    /// Read a header out of its 18 wire bytes.
    pub fn decode(bytes: &[u8; BPG_HEADER_SIZE]) -> Self {
        Self {
            tl: [bytes[0], bytes[1]],
            prop: u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
            target_id: u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
            group_id: u32::from_be_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]),
            data_length: u32::from_be_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]),
        }
    }

    pub fn end_of_group(&self) -> bool {
        self.prop & BPG_PROP_EG_BIT_MASK != 0
    }
}

/// Owned packet content: a UTF-8 metadata string describing the opaque
/// binary bytes that follow it on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HybridData {
    pub metadata_str: String,
    pub binary_bytes: Vec<u8>,
}

impl HybridData {
    /// Encoded body size: length prefix + metadata + binary.
    pub fn encoded_size(&self) -> usize {
        META_LEN_SIZE + self.metadata_str.len() + self.binary_bytes.len()
    }
}

/// A packet at the application layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppPacket {
    pub group_id: u32,
    pub target_id: u32,
    pub tl: PacketType,
    pub end_of_group: bool,
    pub content: HybridData,
}

/// An ordered sequence of packets sharing a group id, terminated by the
/// packet whose end-of-group bit is set.
pub type AppPacketGroup = Vec<AppPacket>;

/// Binary payload source for the encode path.
///
/// `Producer` is handed a claimed sub-slice of the output region, so a
/// large payload (a framebuffer, an encoded image) reaches the wire
/// without an intermediate copy.
pub enum BinarySource<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
    Producer {
        len: usize,
        fill: Box<dyn FnOnce(&mut [u8]) -> Result<(), BpgError> + Send + 'a>,
    },
}

impl BinarySource<'_> {
    pub fn len(&self) -> usize {
        match self {
            BinarySource::Owned(bytes) => bytes.len(),
            BinarySource::Borrowed(bytes) => bytes.len(),
            BinarySource::Producer { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Borrowed form of a packet used when encoding without owning the body.
pub struct PacketRef<'a> {
    pub group_id: u32,
    pub target_id: u32,
    pub tl: PacketType,
    pub end_of_group: bool,
    pub metadata_str: &'a str,
    pub binary: BinarySource<'a>,
}
