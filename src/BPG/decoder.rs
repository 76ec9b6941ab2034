// BPG streaming decoder: reassembles packets from arbitrary byte-stream
// chunking and groups them by identifier

use std::collections::{HashMap, VecDeque};

use crate::BPG::Structs::Packet_Structs::{
    AppPacket, AppPacketGroup, BpgError, HybridData, PacketHeader, BPG_HEADER_SIZE,
    DEFAULT_MAX_PACKET_BODY, META_LEN_SIZE,
};

/// Streaming decoder with a rolling input buffer and a table of
/// in-progress groups.
///
/// After `process_data` returns an error the decoder is fail-closed:
/// internal state is left as it was at the failure, and `reset` must be
/// called before feeding further input.
pub struct BpgDecoder {
    internal_buffer: VecDeque<u8>,
    active_groups: HashMap<u32, AppPacketGroup>,
    max_packet_body: usize,
}

impl BpgDecoder {
    pub fn new() -> Self {
        Self {
            internal_buffer: VecDeque::new(),
            active_groups: HashMap::new(),
            max_packet_body: DEFAULT_MAX_PACKET_BODY,
        }
    }

    /// Override the accepted `data_length` upper bound.
    pub fn with_max_packet_body(mut self, max: usize) -> Self {
        self.max_packet_body = max;
        self
    }

    /// Discard buffered input and all in-progress groups.
    pub fn reset(&mut self) {
        self.internal_buffer.clear();
        self.active_groups.clear();
    }

    /// Bytes buffered but not yet parsed into packets.
    pub fn pending_bytes(&self) -> usize {
        self.internal_buffer.len()
    }

    /// Groups started but not yet terminated.
    pub fn open_groups(&self) -> usize {
        self.active_groups.len()
    }

    /// Feed a chunk of the byte stream.
    ///
    /// `on_packet` fires once per parsed packet, in strict stream order
    /// across all groups. `on_group` fires immediately after the
    /// `on_packet` call for a group's terminating packet, before any
    /// later packet is dispatched, and hands over the group's packets in
    /// arrival order.
    pub fn process_data<P, G>(
        &mut self,
        data: &[u8],
        mut on_packet: P,
        mut on_group: G,
    ) -> Result<(), BpgError>
    where
        P: FnMut(&AppPacket),
        G: FnMut(u32, AppPacketGroup),
    {
        if data.is_empty() {
            return Ok(());
        }
        self.internal_buffer.extend(data.iter().copied());

        // Drain as many complete packets as the buffer holds
        while self.try_parse_packet(&mut on_packet, &mut on_group)? {}
        Ok(())
    }

    /// Attempt to parse one packet off the front of the buffer.
    /// Ok(false) means more input is needed.
    fn try_parse_packet<P, G>(&mut self, on_packet: &mut P, on_group: &mut G) -> Result<bool, BpgError>
    where
        P: FnMut(&AppPacket),
        G: FnMut(u32, AppPacketGroup),
    {
        if self.internal_buffer.len() < BPG_HEADER_SIZE {
            return Ok(false);
        }
        let buf = self.internal_buffer.make_contiguous();

        let mut head = [0u8; BPG_HEADER_SIZE];
        head.copy_from_slice(&buf[..BPG_HEADER_SIZE]);
        let header = PacketHeader::decode(&head);

        let data_length = header.data_length as usize;
        if data_length > self.max_packet_body {
            return Err(BpgError::InvalidPacketHeader(header.data_length));
        }
        let total = BPG_HEADER_SIZE + data_length;
        if buf.len() < total {
            return Ok(false);
        }

        let packet = Self::deserialize_packet(&header, &buf[BPG_HEADER_SIZE..total])?;
        self.internal_buffer.drain(..total);

        on_packet(&packet);

        let group_id = packet.group_id;
        let completes_group = packet.end_of_group;
        self.active_groups.entry(group_id).or_default().push(packet);
        if completes_group {
            if let Some(group) = self.active_groups.remove(&group_id) {
                on_group(group_id, group);
            }
        }
        Ok(true)
    }

    fn deserialize_packet(header: &PacketHeader, body: &[u8]) -> Result<AppPacket, BpgError> {
        if body.len() < META_LEN_SIZE {
            return Err(BpgError::DecodingError);
        }
        let meta_len = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
        if META_LEN_SIZE + meta_len > body.len() {
            log::warn!(
                "bpg decoder: metadata length {meta_len} overruns packet body of {} bytes",
                body.len()
            );
            return Err(BpgError::DecodingError);
        }

        let meta_bytes = &body[META_LEN_SIZE..META_LEN_SIZE + meta_len];
        let metadata_str = String::from_utf8_lossy(meta_bytes).into_owned();
        let binary_bytes = body[META_LEN_SIZE + meta_len..].to_vec();

        Ok(AppPacket {
            group_id: header.group_id,
            target_id: header.target_id,
            tl: header.tl,
            end_of_group: header.end_of_group(),
            content: HybridData {
                metadata_str,
                binary_bytes,
            },
        })
    }
}

impl Default for BpgDecoder {
    fn default() -> Self {
        Self::new()
    }
}
