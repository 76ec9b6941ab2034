// Shared memory backend abstraction for channel regions
// Uses memfd_create + mmap on Linux; heap and external variants cover
// tests and foreign-runtime-owned buffers

use std::alloc::Layout;
use std::io;
use std::ptr::NonNull;

/// Alignment of regions created by this module. The control block
/// itself only needs 4.
pub const REGION_ALIGN: usize = 128;

/// Shared memory backend trait for the byte region a channel lives in.
pub trait SharedMemoryBackend: Send + Sync {
    /// Get a pointer to the start of the region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the region in bytes
    fn size(&self) -> usize;
}

/// Create a new backing region with the specified size.
///
/// # Arguments
/// * `size` - Size of the region in bytes
///
/// # Returns
/// A boxed trait object implementing SharedMemoryBackend
pub fn create_shared_memory(size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(MemfdSharedMemory::create(size)?))
    }
    #[cfg(not(target_os = "linux"))]
    {
        Ok(Box::new(HeapSharedMemory::new(size)?))
    }
}

/// Process-local aligned heap region. Suitable wherever both sides of
/// the channel run in the same process (tests, demos, embedded hosts).
pub struct HeapSharedMemory {
    ptr: NonNull<u8>,
    layout: Layout,
    size: usize,
}

unsafe impl Send for HeapSharedMemory {}
unsafe impl Sync for HeapSharedMemory {}

impl HeapSharedMemory {
    pub fn new(size: usize) -> io::Result<Self> {
        let layout = Layout::from_size_align(size.max(1), REGION_ALIGN)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid region size"))?;
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        match NonNull::new(ptr) {
            Some(ptr) => Ok(Self { ptr, layout, size }),
            None => Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "region allocation failed",
            )),
        }
    }
}

impl Drop for HeapSharedMemory {
    fn drop(&mut self) {
        unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl SharedMemoryBackend for HeapSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }
}

/// View over a region owned by the foreign runtime (e.g. an ArrayBuffer
/// handed across the FFI boundary). The bytes are neither allocated nor
/// freed here.
pub struct ExternalSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
}

unsafe impl Send for ExternalSharedMemory {}
unsafe impl Sync for ExternalSharedMemory {}

impl ExternalSharedMemory {
    /// Wrap a caller-owned region.
    ///
    /// # Safety
    /// `ptr` must be non-null, 4-byte aligned, valid for reads and writes
    /// of `size` bytes, and must outlive every channel configured over it.
    /// The owner must not move or free the bytes while the channel is up.
    pub unsafe fn new(ptr: *mut u8, size: usize) -> Self {
        Self {
            ptr: NonNull::new_unchecked(ptr),
            size,
        }
    }
}

impl SharedMemoryBackend for ExternalSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }
}

#[cfg(target_os = "linux")]
use libc::c_void;
#[cfg(target_os = "linux")]
use std::ffi::CString;
#[cfg(target_os = "linux")]
use std::os::unix::io::RawFd;

/// memfd_create + mmap backed region.
#[cfg(target_os = "linux")]
pub struct MemfdSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: RawFd,
}

#[cfg(target_os = "linux")]
unsafe impl Send for MemfdSharedMemory {}
#[cfg(target_os = "linux")]
unsafe impl Sync for MemfdSharedMemory {}

#[cfg(target_os = "linux")]
impl MemfdSharedMemory {
    /// Create a new region backed by an anonymous memfd.
    pub fn create(size: usize) -> io::Result<Self> {
        let c_name = CString::new("bpg_link_region").expect("static name has no NUL");
        let fd = unsafe {
            libc::syscall(libc::SYS_memfd_create, c_name.as_ptr(), libc::MFD_CLOEXEC as u64)
                as RawFd
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // Set size
        if unsafe { libc::ftruncate(fd, size as i64) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        // Map memory
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        match NonNull::new(ptr as *mut u8) {
            Some(ptr) => Ok(Self { ptr, size, fd }),
            None => {
                unsafe { libc::close(fd) };
                Err(io::Error::new(
                    io::ErrorKind::Other,
                    "mmap returned null mapping",
                ))
            }
        }
    }

    /// The file descriptor of the backing memfd, for handing the region
    /// to another process.
    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }
}

#[cfg(target_os = "linux")]
impl Drop for MemfdSharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut c_void, self.size);
            libc::close(self.fd);
        }
    }
}

#[cfg(target_os = "linux")]
impl SharedMemoryBackend for MemfdSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }
}
