use std::ffi::c_void;
use std::ptr;
use std::slice;
use std::sync::Arc;
use std::time::Duration;

use crate::host::HostApi;
use crate::Core::SharedMemory::ExternalSharedMemory;
use crate::Link::Structs::Region_Structs::LinkError;
use crate::Link::EchoPlugin;

// Error codes
pub const BPG_SUCCESS: i32 = 0;
pub const BPG_ERROR_NULL_POINTER: i32 = -1;
pub const BPG_ERROR_INVALID_ARG: i32 = -2;
pub const BPG_ERROR_BUSY: i32 = -3;
pub const BPG_ERROR_CLOSED: i32 = -4;
pub const BPG_ERROR_OVERSIZE: i32 = -5;
pub const BPG_ERROR_INTERNAL: i32 = -6;

/// Handle to a host API instance (opaque pointer)
pub struct HostHandle {
    inner: HostApi,
}

/// C view of the throughput counters.
#[repr(C)]
pub struct BpgThroughputStats {
    pub total_bytes: u64,
    pub total_messages: u64,
    pub dropped_messages: u64,
    pub seconds: f64,
    pub bytes_per_second: f64,
    pub messages_per_second: f64,
}

/// Inbound-bytes observer invoked by `bpg_host_pump_callbacks`.
pub type BpgMessageCallback = extern "C" fn(data: *const u8, len: usize, user_data: *mut c_void);

fn map_link_error(err: LinkError) -> i32 {
    match err {
        LinkError::Busy => BPG_ERROR_BUSY,
        LinkError::Closed => BPG_ERROR_CLOSED,
        LinkError::OversizeMessage { .. } => BPG_ERROR_OVERSIZE,
        LinkError::RegionTooSmall { .. } | LinkError::MisalignedRegion => BPG_ERROR_INVALID_ARG,
    }
}

/// Create a new host API instance.
///
/// # Returns
/// * Pointer to `HostHandle`; release with `bpg_host_free`.
#[no_mangle]
pub extern "C" fn bpg_host_new() -> *mut HostHandle {
    Box::into_raw(Box::new(HostHandle {
        inner: HostApi::new(),
    }))
}

/// Free a host handle. Tears down any configured channel.
#[no_mangle]
pub extern "C" fn bpg_host_free(handle: *mut HostHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle); // Dropped automatically
        }
    }
}

/// Health check.
///
/// # Arguments
/// * `out_buf` - Buffer the greeting bytes are written into.
/// * `out_len` - Input: size of `out_buf`. Output: greeting length.
///
/// # Returns
/// * 0 on success.
/// * BPG_ERROR_INVALID_ARG if the buffer is too small (`out_len` holds
///   the required size).
#[no_mangle]
pub extern "C" fn bpg_host_hello(
    handle: *mut HostHandle,
    out_buf: *mut u8,
    out_len: *mut usize,
) -> i32 {
    if handle.is_null() || out_len.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }

    let host = unsafe { &(*handle).inner };
    let greeting = host.hello();
    let max_len = unsafe { *out_len };
    unsafe { *out_len = greeting.len() };

    if out_buf.is_null() || max_len < greeting.len() {
        return BPG_ERROR_INVALID_ARG;
    }
    unsafe {
        ptr::copy_nonoverlapping(greeting.as_ptr(), out_buf, greeting.len());
    }
    BPG_SUCCESS
}

/// Configure the channel over a caller-owned region.
///
/// The region must stay valid and pinned until `bpg_host_cleanup` (or
/// `bpg_host_free`); the first 16 bytes are the control block, followed
/// by the outer->host then host->outer data slots.
///
/// # Arguments
/// * `region` - Pointer to the region (4-byte aligned).
/// * `region_len` - Region size; must be >= 16 + r2h_capacity + h2r_capacity.
#[no_mangle]
pub extern "C" fn bpg_host_set_shared_buffer(
    handle: *mut HostHandle,
    region: *mut u8,
    region_len: usize,
    r2h_capacity: u32,
    h2r_capacity: u32,
) -> i32 {
    if handle.is_null() || region.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }

    let host = unsafe { &(*handle).inner };
    let backing = unsafe { ExternalSharedMemory::new(region, region_len) };
    match host.set_shared_buffer(Box::new(backing), r2h_capacity, h2r_capacity) {
        Ok(()) => BPG_SUCCESS,
        Err(err) => map_link_error(err),
    }
}

/// Send bytes through the claim/commit path, waiting up to `wait_ms`
/// for the outer side to drain a pending message.
#[no_mangle]
pub extern "C" fn bpg_host_send(
    handle: *mut HostHandle,
    data: *const u8,
    len: usize,
    wait_ms: u32,
) -> i32 {
    if handle.is_null() || (data.is_null() && len > 0) {
        return BPG_ERROR_NULL_POINTER;
    }

    let host = unsafe { &(*handle).inner };
    let bytes = if len == 0 {
        &[][..]
    } else {
        unsafe { slice::from_raw_parts(data, len) }
    };
    match host.send(bytes, Duration::from_millis(wait_ms as u64)) {
        Ok(()) => BPG_SUCCESS,
        Err(err) => map_link_error(err),
    }
}

/// Queue bytes for the asynchronous send worker.
#[no_mangle]
pub extern "C" fn bpg_host_trigger(handle: *mut HostHandle, data: *const u8, len: usize) -> i32 {
    if handle.is_null() || (data.is_null() && len > 0) {
        return BPG_ERROR_NULL_POINTER;
    }

    let host = unsafe { &(*handle).inner };
    let bytes = if len == 0 {
        Vec::new()
    } else {
        unsafe { slice::from_raw_parts(data, len) }.to_vec()
    };
    match host.trigger(bytes) {
        Ok(()) => BPG_SUCCESS,
        Err(err) => map_link_error(err),
    }
}

struct CallbackContext {
    callback: BpgMessageCallback,
    user_data: *mut c_void,
}

// The foreign runtime promises its user_data is usable from the pumping
// thread; the pointer is only ever handed back to `callback`.
unsafe impl Send for CallbackContext {}
unsafe impl Sync for CallbackContext {}

/// Register the inbound-bytes observer. Records are queued by the
/// receive worker; `bpg_host_pump_callbacks` delivers them on the
/// caller's thread.
#[no_mangle]
pub extern "C" fn bpg_host_set_message_callback(
    handle: *mut HostHandle,
    callback: Option<BpgMessageCallback>,
    user_data: *mut c_void,
) -> i32 {
    if handle.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }
    let Some(callback) = callback else {
        return BPG_ERROR_NULL_POINTER;
    };

    let host = unsafe { &(*handle).inner };
    let context = CallbackContext {
        callback,
        user_data,
    };
    host.set_message_callback(move |bytes: &[u8]| {
        let context = &context;
        (context.callback)(bytes.as_ptr(), bytes.len(), context.user_data);
    });
    BPG_SUCCESS
}

/// Drain queued inbound records into the registered observer.
///
/// # Returns
/// * Number of records delivered (>= 0), or a negative error code.
#[no_mangle]
pub extern "C" fn bpg_host_pump_callbacks(handle: *mut HostHandle) -> i32 {
    if handle.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }
    let host = unsafe { &(*handle).inner };
    host.pump_message_callbacks() as i32
}

/// Install the canned echo vector (reflects every inbound message).
/// Loading real plugin libraries is the loader's concern, not the core's.
#[no_mangle]
pub extern "C" fn bpg_host_install_echo_plugin(handle: *mut HostHandle) -> i32 {
    if handle.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }
    let host = unsafe { &(*handle).inner };
    host.install_plugin(Arc::new(EchoPlugin::new()));
    BPG_SUCCESS
}

/// Push a canned message through the installed plugin.
#[no_mangle]
pub extern "C" fn bpg_host_trigger_test_callback(handle: *mut HostHandle) -> i32 {
    if handle.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }
    let host = unsafe { &(*handle).inner };
    match host.trigger_test_callback() {
        Ok(()) => BPG_SUCCESS,
        Err(err) => map_link_error(err),
    }
}

/// Zero the traffic counters and stamp the measurement start.
#[no_mangle]
pub extern "C" fn bpg_host_start_throughput_test(handle: *mut HostHandle) -> i32 {
    if handle.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }
    let host = unsafe { &(*handle).inner };
    match host.start_throughput_test() {
        Ok(()) => BPG_SUCCESS,
        Err(err) => map_link_error(err),
    }
}

/// Read the throughput counters.
#[no_mangle]
pub extern "C" fn bpg_host_get_throughput_stats(
    handle: *mut HostHandle,
    out_stats: *mut BpgThroughputStats,
) -> i32 {
    if handle.is_null() || out_stats.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }
    let host = unsafe { &(*handle).inner };
    match host.throughput_stats() {
        Ok(snapshot) => {
            unsafe {
                *out_stats = BpgThroughputStats {
                    total_bytes: snapshot.total_bytes,
                    total_messages: snapshot.total_messages,
                    dropped_messages: snapshot.dropped_messages,
                    seconds: snapshot.seconds,
                    bytes_per_second: snapshot.bytes_per_second,
                    messages_per_second: snapshot.messages_per_second,
                };
            }
            BPG_SUCCESS
        }
        Err(err) => map_link_error(err),
    }
}

/// Start emitting a canned message every `interval_ms` milliseconds.
#[no_mangle]
pub extern "C" fn bpg_host_start_periodic_send(handle: *mut HostHandle, interval_ms: u32) -> i32 {
    if handle.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }
    if interval_ms == 0 {
        return BPG_ERROR_INVALID_ARG;
    }
    let host = unsafe { &(*handle).inner };
    match host.start_periodic_send(Duration::from_millis(interval_ms as u64)) {
        Ok(()) => BPG_SUCCESS,
        Err(err) => map_link_error(err),
    }
}

/// Stop the periodic sender.
#[no_mangle]
pub extern "C" fn bpg_host_stop_periodic_send(handle: *mut HostHandle) -> i32 {
    if handle.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }
    let host = unsafe { &(*handle).inner };
    host.stop_periodic_send();
    BPG_SUCCESS
}

/// Tear down the channel; the region may be freed by its owner after
/// this returns.
#[no_mangle]
pub extern "C" fn bpg_host_cleanup(handle: *mut HostHandle) -> i32 {
    if handle.is_null() {
        return BPG_ERROR_NULL_POINTER;
    }
    let host = unsafe { &(*handle).inner };
    host.cleanup();
    BPG_SUCCESS
}
