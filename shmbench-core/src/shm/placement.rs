// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Typed placement of a `#[repr(C)]` layout in a region or on the heap.

use std::ptr::NonNull;

use crate::error::SharedMemoryError;
use crate::shm::SharedRegion;

/// Layouts that may live in shared memory.
///
/// # Safety
/// Implementors must be `#[repr(C)]`, contain only integers (so the all-zero
/// bit pattern is a valid value), and need no alignment beyond a page.
pub(crate) unsafe trait SharedLayout: Sized {}

enum Backing {
    Region(SharedRegion),
    /// Allocated with `Box::leak`, reclaimed in `Drop`.
    Heap,
}

/// A `T` living in memory this process has mapped.
pub(crate) struct Placement<T: SharedLayout> {
    ptr: NonNull<T>,
    backing: Backing,
}

impl<T: SharedLayout> Placement<T> {
    /// Place `T` at the start of `region`; the region must be exactly
    /// `size_of::<T>()` bytes.
    pub(crate) fn in_region(region: SharedRegion) -> Result<Self, SharedMemoryError> {
        let expected = std::mem::size_of::<T>();
        if region.size() != expected {
            return Err(SharedMemoryError::LayoutMismatch {
                name: region.name().to_string(),
                expected,
                actual: region.size(),
            });
        }

        let ptr = NonNull::new(region.as_ptr() as *mut T).ok_or_else(|| {
            SharedMemoryError::MapFailed {
                reason: "region pointer is null".to_string(),
            }
        })?;
        Ok(Self {
            ptr,
            backing: Backing::Region(region),
        })
    }

    /// A zeroed `T` on the heap.
    pub(crate) fn zeroed() -> Self {
        // SAFETY: SharedLayout guarantees all-zero is a valid T
        let boxed = unsafe { Box::<T>::new_zeroed().assume_init() };
        Self {
            ptr: NonNull::from(Box::leak(boxed)),
            backing: Backing::Heap,
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    pub(crate) fn region(&self) -> Option<&SharedRegion> {
        match &self.backing {
            Backing::Region(region) => Some(region),
            Backing::Heap => None,
        }
    }
}

impl<T: SharedLayout> Drop for Placement<T> {
    fn drop(&mut self) {
        if let Backing::Heap = self.backing {
            // SAFETY: ptr came from Box::leak in zeroed() and is freed once
            drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
        }
    }
}

// SAFETY: Placement owns its memory; cross-thread access to the bytes is
// governed by the single-writer rules of the layout's handles.
unsafe impl<T: SharedLayout> Send for Placement<T> {}

// SAFETY: see Send.
unsafe impl<T: SharedLayout> Sync for Placement<T> {}
