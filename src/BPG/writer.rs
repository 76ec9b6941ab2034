// Append-only cursor over a borrowed output region

use crate::BPG::Structs::Packet_Structs::PacketType;

/// Bounds-checked writer the encoder serializes into.
///
/// Every write either fully succeeds and advances the offset, or fails
/// and leaves the writer unchanged. The writer never reallocates;
/// callers translate a failed write into `BpgError::BufferTooSmall`.
pub struct BufferWriter<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> BufferWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Bytes written so far.
    pub fn size(&self) -> usize {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Copy `src` at the cursor. Returns false on overflow.
    pub fn append_bytes(&mut self, src: &[u8]) -> bool {
        if src.len() > self.remaining() {
            return false;
        }
        self.buf[self.offset..self.offset + src.len()].copy_from_slice(src);
        self.offset += src.len();
        true
    }

    /// Append four big-endian bytes.
    pub fn append_u32_be(&mut self, v: u32) -> bool {
        self.append_bytes(&v.to_be_bytes())
    }

    /// Append a two-byte type code as raw bytes (no endian conversion).
    pub fn append_tl(&mut self, tl: PacketType) -> bool {
        self.append_bytes(&tl)
    }

    /// Reserve `n` bytes and hand them out for direct fill-in.
    /// Returns None, with the offset unchanged, if `n` exceeds the
    /// remaining space.
    pub fn claim(&mut self, n: usize) -> Option<&mut [u8]> {
        if n > self.remaining() {
            return None;
        }
        let start = self.offset;
        self.offset += n;
        Some(&mut self.buf[start..start + n])
    }

    /// The written prefix of the underlying region.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.offset]
    }
}
