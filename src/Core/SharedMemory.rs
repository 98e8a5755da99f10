// Shared memory backend for Linux
// Regions are plain files under /dev/shm mapped with MAP_SHARED, so any
// process that knows the name can attach.

use std::fmt::Debug;
use std::io;
use std::path::PathBuf;

/// Prefix applied to every region name under /dev/shm.
pub const SHM_PREFIX: &str = "mpipe_";

/// Shared memory backend trait for cross-process memory mapping
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the mapped region in bytes
    fn size(&self) -> usize;

    /// Get the underlying file descriptor
    fn raw_handle(&self) -> RawHandle;

    /// Whether this mapping created the region (and unlinks it on drop)
    fn is_owner(&self) -> bool;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy)]
pub enum RawHandle {
    /// Unix file descriptor (Linux)
    Fd(i32),
}

/// Path of the backing file for a region name.
pub fn shm_path(name: &str) -> PathBuf {
    PathBuf::from(format!("/dev/shm/{}{}", SHM_PREFIX, name))
}

/// Create a new shared memory region with the specified size.
///
/// An existing region with the same name is truncated and replaced. The
/// returned mapping owns the region and removes the backing file when
/// dropped; processes that already attached keep their mapping.
#[cfg(target_os = "linux")]
pub fn create_shared_memory(size: usize, name: &str) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::create(size, name)?))
}

/// Attach to an existing shared memory region.
///
/// Fails with `InvalidData` if the region is smaller than `min_size`.
#[cfg(target_os = "linux")]
pub fn attach_shared_memory(
    name: &str,
    min_size: usize,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::attach(name, min_size)?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(_size: usize, _name: &str) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn attach_shared_memory(
    _name: &str,
    _min_size: usize,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(target_os = "linux")]
pub use linux::LinuxSharedMemory;

#[cfg(target_os = "linux")]
mod linux {
    use super::{shm_path, RawHandle, SharedMemoryBackend};
    use std::fs::OpenOptions;
    use std::io;
    use std::os::fd::{AsRawFd, IntoRawFd};
    use std::os::unix::fs::OpenOptionsExt;
    use std::path::PathBuf;
    use std::ptr::{self, NonNull};

    #[derive(Debug)]
    pub struct LinuxSharedMemory {
        ptr: NonNull<u8>,
        size: usize,
        fd: i32,
        path: PathBuf,
        owner: bool,
    }

    unsafe impl Send for LinuxSharedMemory {}
    unsafe impl Sync for LinuxSharedMemory {}

    impl LinuxSharedMemory {
        /// Create (or truncate) the region file and map it.
        pub fn create(size: usize, name: &str) -> io::Result<Self> {
            if size == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Shared memory size must be non-zero",
                ));
            }

            let path = shm_path(name);
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)
                .map_err(|e| {
                    io::Error::new(
                        e.kind(),
                        format!("Failed to create shared memory file at {}: {}", path.display(), e),
                    )
                })?;

            if unsafe { libc::ftruncate(file.as_raw_fd(), size as libc::off_t) } != 0 {
                let err = io::Error::last_os_error();
                let _ = std::fs::remove_file(&path);
                return Err(err);
            }

            let fd = file.into_raw_fd();
            match unsafe { map(fd, size) } {
                Ok(ptr) => Ok(Self {
                    ptr,
                    size,
                    fd,
                    path,
                    owner: true,
                }),
                Err(err) => {
                    unsafe { libc::close(fd) };
                    let _ = std::fs::remove_file(&path);
                    Err(err)
                }
            }
        }

        /// Map an existing region file.
        pub fn attach(name: &str, min_size: usize) -> io::Result<Self> {
            let path = shm_path(name);
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|e| {
                    io::Error::new(
                        e.kind(),
                        format!("Failed to open shared memory at {}: {}", path.display(), e),
                    )
                })?;

            let size = file.metadata()?.len() as usize;
            if size < min_size.max(1) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Shared memory size too small: expected at least {} bytes, got {}",
                        min_size, size
                    ),
                ));
            }

            let fd = file.into_raw_fd();
            match unsafe { map(fd, size) } {
                Ok(ptr) => Ok(Self {
                    ptr,
                    size,
                    fd,
                    path,
                    owner: false,
                }),
                Err(err) => {
                    unsafe { libc::close(fd) };
                    Err(err)
                }
            }
        }
    }

    /// mmap returns page-aligned addresses, which covers the 128-byte
    /// alignment the channel header needs.
    unsafe fn map(fd: i32, size: usize) -> io::Result<NonNull<u8>> {
        let ptr = libc::mmap(
            ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        );
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(ptr as *mut u8)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping"))
    }

    impl Drop for LinuxSharedMemory {
        fn drop(&mut self) {
            unsafe {
                libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
                libc::close(self.fd);
            }
            if self.owner {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    impl SharedMemoryBackend for LinuxSharedMemory {
        fn as_ptr(&self) -> *mut u8 {
            self.ptr.as_ptr()
        }

        fn size(&self) -> usize {
            self.size
        }

        fn raw_handle(&self) -> RawHandle {
            RawHandle::Fd(self.fd)
        }

        fn is_owner(&self) -> bool {
            self.owner
        }
    }
}
