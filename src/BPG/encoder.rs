// BPG encoder: application packets to wire bytes through a BufferWriter

use crate::BPG::writer::BufferWriter;
use crate::BPG::Structs::Packet_Structs::{
    AppPacket, BinarySource, BpgError, PacketHeader, PacketRef, BPG_HEADER_SIZE,
    BPG_PROP_EG_BIT_MASK, META_LEN_SIZE,
};

/// Stateless packet encoder.
pub struct BpgEncoder;

impl BpgEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode a single owned packet into `writer`.
    pub fn encode_packet(
        &self,
        packet: &AppPacket,
        writer: &mut BufferWriter<'_>,
    ) -> Result<(), BpgError> {
        self.encode_ref(
            PacketRef {
                group_id: packet.group_id,
                target_id: packet.target_id,
                tl: packet.tl,
                end_of_group: packet.end_of_group,
                metadata_str: &packet.content.metadata_str,
                binary: BinarySource::Borrowed(&packet.content.binary_bytes),
            },
            writer,
        )
    }

    /// Encode a borrowed packet view. A `Producer` source is handed a
    /// claimed sub-slice of the output and writes the payload in place.
    pub fn encode_ref(
        &self,
        packet: PacketRef<'_>,
        writer: &mut BufferWriter<'_>,
    ) -> Result<(), BpgError> {
        let meta = packet.metadata_str.as_bytes();
        let binary_len = packet.binary.len();
        let data_length = META_LEN_SIZE + meta.len() + binary_len;
        if data_length > u32::MAX as usize {
            return Err(BpgError::EncodingError);
        }
        if writer.remaining() < BPG_HEADER_SIZE + data_length {
            return Err(BpgError::BufferTooSmall);
        }

        let header = PacketHeader {
            tl: packet.tl,
            prop: if packet.end_of_group {
                BPG_PROP_EG_BIT_MASK
            } else {
                0
            },
            target_id: packet.target_id,
            group_id: packet.group_id,
            data_length: data_length as u32,
        };
        header.encode(writer)?;

        writer.append_u32_be(meta.len() as u32);
        writer.append_bytes(meta);
        match packet.binary {
            BinarySource::Owned(bytes) => {
                writer.append_bytes(&bytes);
            }
            BinarySource::Borrowed(bytes) => {
                writer.append_bytes(bytes);
            }
            BinarySource::Producer { len, fill } => match writer.claim(len) {
                Some(slot) => fill(slot)?,
                None => return Err(BpgError::BufferTooSmall),
            },
        }
        Ok(())
    }

    /// Encode a group of packets back to back into the same writer.
    ///
    /// On the first failure the writer may hold a partially appended
    /// packet; the caller discards the buffer rather than transmitting
    /// the prefix.
    pub fn encode_group(
        &self,
        group: &[AppPacket],
        writer: &mut BufferWriter<'_>,
    ) -> Result<(), BpgError> {
        for packet in group {
            self.encode_packet(packet, writer)?;
        }
        Ok(())
    }
}

impl Default for BpgEncoder {
    fn default() -> Self {
        Self::new()
    }
}
