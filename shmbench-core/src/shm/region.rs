// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedRegion - POSIX shared memory wrapper.
//!
//! Lifecycle only: create, attach, unmap, unlink. The region knows nothing
//! about what lives inside it.

use std::ffi::CString;
use std::ptr::NonNull;

use nix::errno::Errno;

use crate::error::SharedMemoryError;
use crate::types::RegionName;

/// A mapped shared memory region.
///
/// Unmaps on drop. The instance that created the region also unlinks the
/// name on drop, so the owning process releases the OS object on every exit
/// path that unwinds through it.
pub struct SharedRegion {
    /// Name of the shared memory object.
    name: RegionName,
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// Size of the mapped region in bytes.
    size: usize,
    /// Whether this instance created the object (and should unlink on drop).
    is_owner: bool,
}

// SAFETY: SharedRegion owns its mapping; moving it between threads is fine.
unsafe impl Send for SharedRegion {}

// SAFETY: the region hands out raw pointers only; synchronization of the
// bytes behind them is the job of the layout living in the region.
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Create a new named region of exactly `size` bytes, zero-filled.
    ///
    /// # Errors
    /// `AlreadyExists` if the name is taken, `PermissionDenied` on access
    /// failure, `CreateFailed`/`MapFailed` for the remaining syscall errors.
    pub fn create(name: &RegionName, size: usize) -> Result<Self, SharedMemoryError> {
        if size == 0 {
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: "Size cannot be zero".to_string(),
            });
        }

        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o660,
            )
        };

        if fd < 0 {
            return Err(match Errno::last() {
                Errno::EEXIST => SharedMemoryError::AlreadyExists {
                    name: name.to_string(),
                },
                Errno::EACCES | Errno::EPERM => SharedMemoryError::PermissionDenied {
                    name: name.to_string(),
                },
                errno => SharedMemoryError::CreateFailed {
                    name: name.to_string(),
                    reason: format!("shm_open failed: {}", errno),
                },
            });
        }

        // SAFETY: fd is a valid file descriptor
        let result = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if result < 0 {
            let errno = Errno::last();
            // SAFETY: fd is open and the name was created by us
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("ftruncate failed: {}", errno),
            });
        }

        let ptr = match Self::map(fd, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                // SAFETY: the name was created by us
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                return Err(e);
            }
        };

        // ftruncate zero-fills, but a fresh region must never show stale bytes.
        // SAFETY: ptr is valid for size bytes
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, size);
        }

        tracing::debug!(name = %name, size = size, "Created shared memory region");

        Ok(Self {
            name: name.clone(),
            ptr,
            size,
            is_owner: true,
        })
    }

    /// Attach to an existing region. The mapped size is the object's size.
    ///
    /// # Errors
    /// `NotFound` if no region has this name, `PermissionDenied` on access
    /// failure, `MapFailed` if the object cannot be mapped.
    pub fn attach(name: &RegionName) -> Result<Self, SharedMemoryError> {
        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };

        if fd < 0 {
            return Err(match Errno::last() {
                Errno::ENOENT => SharedMemoryError::NotFound {
                    name: name.to_string(),
                },
                Errno::EACCES | Errno::EPERM => SharedMemoryError::PermissionDenied {
                    name: name.to_string(),
                },
                errno => SharedMemoryError::MapFailed {
                    reason: format!("shm_open {} failed: {}", name, errno),
                },
            });
        }

        // SAFETY: an all-zero stat is a valid value to be overwritten by fstat
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        // SAFETY: fd is valid and stat is a writable stat buffer
        if unsafe { libc::fstat(fd, &mut stat) } < 0 {
            let errno = Errno::last();
            // SAFETY: fd is open
            unsafe { libc::close(fd) };
            return Err(SharedMemoryError::MapFailed {
                reason: format!("fstat {} failed: {}", name, errno),
            });
        }

        let size = stat.st_size as usize;
        if size == 0 {
            // SAFETY: fd is open
            unsafe { libc::close(fd) };
            return Err(SharedMemoryError::MapFailed {
                reason: format!("region {} has zero size (creator not done yet?)", name),
            });
        }

        let ptr = Self::map(fd, size)?;

        tracing::debug!(name = %name, size = size, "Attached shared memory region");

        Ok(Self {
            name: name.clone(),
            ptr,
            size,
            is_owner: false,
        })
    }

    /// Remove a named region. Removing a name that does not exist is not an
    /// error; it is logged and ignored.
    pub fn destroy(name: &RegionName) -> Result<(), SharedMemoryError> {
        match nix::sys::mman::shm_unlink(name.as_str()) {
            Ok(()) => {
                tracing::info!(name = %name, "Destroyed shared memory region");
                Ok(())
            }
            Err(Errno::ENOENT) => {
                tracing::warn!(name = %name, "Shared memory region already removed");
                Ok(())
            }
            Err(Errno::EACCES) | Err(Errno::EPERM) => Err(SharedMemoryError::PermissionDenied {
                name: name.to_string(),
            }),
            Err(errno) => Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_unlink failed: {}", errno),
            }),
        }
    }

    /// Map `size` bytes of `fd` read/write shared. Always closes `fd`; the
    /// mapping stays valid after the descriptor is gone.
    fn map(fd: libc::c_int, size: usize) -> Result<NonNull<u8>, SharedMemoryError> {
        // SAFETY: fd is valid, size is non-zero, offset 0 is valid
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
        let errno = Errno::last();

        // SAFETY: fd was opened by the caller and is not used again
        unsafe { libc::close(fd) };

        if ptr == libc::MAP_FAILED {
            return Err(SharedMemoryError::MapFailed {
                reason: format!("mmap failed: {}", errno),
            });
        }

        NonNull::new(ptr as *mut u8).ok_or_else(|| SharedMemoryError::MapFailed {
            reason: "mmap returned null".to_string(),
        })
    }

    fn c_name(name: &RegionName) -> Result<CString, SharedMemoryError> {
        CString::new(name.as_str()).map_err(|e| SharedMemoryError::CreateFailed {
            name: name.to_string(),
            reason: format!("Invalid name: {}", e),
        })
    }

    /// Get the name of this region.
    pub fn name(&self) -> &RegionName {
        &self.name
    }

    /// Get the size of this region in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether dropping this instance unlinks the name.
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Get a raw pointer to the start of the mapping.
    ///
    /// Callers must synchronize access to the bytes behind it.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        // SAFETY: ptr and size describe the mapping created in map()
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %Errno::last(),
                "Failed to unmap shared memory"
            );
        }

        if self.is_owner {
            if let Err(e) = Self::destroy(&self.name) {
                tracing::error!(name = %self.name, error = %e, "Failed to unlink shared memory");
            }
        }
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("is_owner", &self.is_owner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> RegionName {
        RegionName::new(format!("shmbench-region-{}-{}", tag, std::process::id())).unwrap()
    }

    #[test]
    fn test_create_rejects_zero_size() {
        assert!(matches!(
            SharedRegion::create(&unique("zero"), 0),
            Err(SharedMemoryError::CreateFailed { .. })
        ));
    }

    #[test]
    fn test_create_twice_is_already_exists() {
        let name = unique("twice");
        let _first = SharedRegion::create(&name, 4096).expect("create");
        assert!(matches!(
            SharedRegion::create(&name, 4096),
            Err(SharedMemoryError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_attach_sees_creator_writes() {
        let name = unique("attach");
        let owner = SharedRegion::create(&name, 4096).expect("create");
        let attached = SharedRegion::attach(&name).expect("attach");
        assert_eq!(attached.size(), 4096);
        assert!(!attached.is_owner());

        // SAFETY: both mappings are 4096 bytes and only this thread touches them
        unsafe {
            owner.as_ptr().add(10).write_volatile(0x5a);
            assert_eq!(attached.as_ptr().add(10).read_volatile(), 0x5a);
        }
    }

    #[test]
    fn test_attach_missing_is_not_found() {
        assert!(matches!(
            SharedRegion::attach(&unique("missing")),
            Err(SharedMemoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_owner_drop_unlinks() {
        let name = unique("drop");
        drop(SharedRegion::create(&name, 4096).expect("create"));
        assert!(matches!(
            SharedRegion::attach(&name),
            Err(SharedMemoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let name = unique("destroy");
        let region = SharedRegion::create(&name, 4096).expect("create");
        SharedRegion::destroy(&name).expect("first destroy");
        SharedRegion::destroy(&name).expect("second destroy");
        // Drop of the owner also tries to unlink; must not panic.
        drop(region);
    }
}
