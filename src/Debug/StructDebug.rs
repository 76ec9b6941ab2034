use std::fmt;
use std::sync::atomic::Ordering;

use crate::Link::Channel;
use crate::Link::Structs::Region_Structs::{ControlBlock, SharedRegion};

/// Debug function for ControlBlock
///
/// Shows the current word values without touching the data slots.
pub fn debug_control_block(control: &ControlBlock, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ControlBlock")
        .field("sig_r2h", &control.sig_r2h.load(Ordering::SeqCst))
        .field("len_r2h", &control.len_r2h.load(Ordering::SeqCst))
        .field("sig_h2r", &control.sig_h2r.load(Ordering::SeqCst))
        .field("len_h2r", &control.len_h2r.load(Ordering::SeqCst))
        .finish()
}

/// Debug function for SharedRegion
///
/// Safely displays the base address and capacities; the backing stays
/// opaque.
pub fn debug_shared_region(region: &SharedRegion, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SharedRegion")
        .field("base", &format_args!("{:p}", region.base_ptr()))
        .field("r2h_capacity", &region.r2h_capacity())
        .field("h2r_capacity", &region.h2r_capacity())
        .field("backing", &"<opaque>")
        .finish()
}

/// Debug function for Channel
///
/// Shows the operating flag and the region location.
pub fn debug_channel(channel: &Channel, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Channel")
        .field("operating", &channel.is_operating())
        .field(
            "region",
            &format_args!("SharedRegion(0x{:x})", channel.region().base_ptr() as usize),
        )
        .finish_non_exhaustive()
}

impl fmt::Debug for ControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_control_block(self, f)
    }
}

impl fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_shared_region(self, f)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_channel(self, f)
    }
}
