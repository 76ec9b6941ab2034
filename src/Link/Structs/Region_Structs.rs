// Control block and region view for the rendezvous channel

use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;

use crate::Core::SharedMemory::SharedMemoryBackend;

/// Size of the control block at the head of every shared region.
pub const CONTROL_BLOCK_SIZE: usize = 16;

/// Channel-level error codes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    #[error("send window is busy")]
    Busy,

    #[error("channel is closed")]
    Closed,

    #[error("message of {len} bytes exceeds slot capacity of {capacity}")]
    OversizeMessage { len: usize, capacity: usize },

    #[error("region too small: need {needed} bytes, got {got}")]
    RegionTooSmall { needed: usize, got: usize },

    #[error("region base address is not 4-byte aligned")]
    MisalignedRegion,
}

/// The four 32-bit control words at the head of the region.
///
/// `#[repr(C)]` pins the ABI: the outer side addresses these words by
/// byte offset. Both sides use sequentially consistent operations on
/// all four. A signal word only transitions 0 -> 1 (publisher) and
/// 1 -> 0 (consumer); the length store precedes the signal flip.
#[repr(C)]
pub struct ControlBlock {
    pub sig_r2h: AtomicU32,
    pub len_r2h: AtomicU32,
    pub sig_h2r: AtomicU32,
    pub len_h2r: AtomicU32,
}

impl ControlBlock {
    /// View the control block at `base`.
    ///
    /// # Safety
    /// `base` must point to at least `CONTROL_BLOCK_SIZE` bytes, 4-byte
    /// aligned and valid for the lifetime `'a`.
    pub unsafe fn from_ptr<'a>(base: *mut u8) -> &'a ControlBlock {
        &*(base as *const ControlBlock)
    }

    /// Zero all four words: both directions idle, no lengths.
    pub fn clear(&self) {
        self.sig_r2h.store(0, Ordering::SeqCst);
        self.len_r2h.store(0, Ordering::SeqCst);
        self.sig_h2r.store(0, Ordering::SeqCst);
        self.len_h2r.store(0, Ordering::SeqCst);
    }
}

/// A backing region split into the control block and two one-way data
/// slots: outer->host (`r2h_capacity` bytes at offset 16), then
/// host->outer (`h2r_capacity` bytes after it). The bytes never move
/// once a channel is configured over them.
pub struct SharedRegion {
    backing: Box<dyn SharedMemoryBackend>,
    r2h_capacity: usize,
    h2r_capacity: usize,
}

impl SharedRegion {
    /// Wrap `backing` and zero the control words.
    ///
    /// Fails if the region cannot hold `16 + r2h_capacity +
    /// h2r_capacity` bytes or is not 4-byte aligned.
    pub fn new(
        backing: Box<dyn SharedMemoryBackend>,
        r2h_capacity: usize,
        h2r_capacity: usize,
    ) -> Result<Self, LinkError> {
        let needed = CONTROL_BLOCK_SIZE + r2h_capacity + h2r_capacity;
        if backing.size() < needed {
            return Err(LinkError::RegionTooSmall {
                needed,
                got: backing.size(),
            });
        }
        if (backing.as_ptr() as usize) % std::mem::align_of::<ControlBlock>() != 0 {
            return Err(LinkError::MisalignedRegion);
        }
        let region = Self {
            backing,
            r2h_capacity,
            h2r_capacity,
        };
        region.control().clear();
        Ok(region)
    }

    pub fn control(&self) -> &ControlBlock {
        unsafe { ControlBlock::from_ptr(self.backing.as_ptr()) }
    }

    pub fn r2h_capacity(&self) -> usize {
        self.r2h_capacity
    }

    pub fn h2r_capacity(&self) -> usize {
        self.h2r_capacity
    }

    pub fn base_ptr(&self) -> *mut u8 {
        self.backing.as_ptr()
    }

    /// Read `len` bytes of the outer->host slot (host consumer view).
    ///
    /// # Safety
    /// Only valid while `sig_r2h` reads 1 and `len <= r2h_capacity()`;
    /// the publishing side keeps the bytes stable until the signal is
    /// cleared.
    pub unsafe fn r2h_bytes(&self, len: usize) -> &[u8] {
        std::slice::from_raw_parts(self.backing.as_ptr().add(CONTROL_BLOCK_SIZE), len)
    }

    /// The whole host->outer slot for writing (host producer view).
    ///
    /// # Safety
    /// The caller must hold the claim exclusion and `sig_h2r` must read
    /// 0; the outer side does not touch the slot while it is idle.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn h2r_bytes_mut(&self) -> &mut [u8] {
        std::slice::from_raw_parts_mut(
            self.backing.as_ptr().add(CONTROL_BLOCK_SIZE + self.r2h_capacity),
            self.h2r_capacity,
        )
    }

    /// The whole outer->host slot for writing (outer producer view, for
    /// in-process peers and tests).
    ///
    /// # Safety
    /// The caller acts as the outer producer and `sig_r2h` must read 0.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn r2h_bytes_mut(&self) -> &mut [u8] {
        std::slice::from_raw_parts_mut(
            self.backing.as_ptr().add(CONTROL_BLOCK_SIZE),
            self.r2h_capacity,
        )
    }

    /// Read `len` bytes of the host->outer slot (outer consumer view,
    /// for in-process peers and tests).
    ///
    /// # Safety
    /// Only valid while `sig_h2r` reads 1 and `len <= h2r_capacity()`.
    pub unsafe fn h2r_bytes(&self, len: usize) -> &[u8] {
        std::slice::from_raw_parts(
            self.backing.as_ptr().add(CONTROL_BLOCK_SIZE + self.r2h_capacity),
            len,
        )
    }
}
