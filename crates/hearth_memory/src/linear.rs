//! # Linear Allocator
//!
//! A bump allocator over a fixed buffer for temporary allocations that are
//! freed all at once.

#![allow(unsafe_code)]

use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::align::{align_ptr, check_alignment};
use crate::allocator::Allocator;
use crate::error::{MemoryError, MemoryResult};

/// Alignment of a buffer obtained from a backing allocator.
const BUFFER_ALIGN: usize = 16;

/// A bump-pointer allocator over a fixed-size buffer.
///
/// Allocations are fast (just bump an offset). Individual releases are
/// ignored; memory comes back only when the allocator is cleared.
///
/// Every request consumes `size + align` bytes, so the sum of
/// `size + align` over all requests since the last clear never exceeds the
/// buffer size.
///
/// # Thread Safety
///
/// This allocator is NOT thread-safe. Use one per thread.
///
/// # Example
///
/// ```rust,ignore
/// let heap = HeapAllocator::new();
/// let mut frame = LinearAllocator::new(&heap, 64 * 1024)?;
///
/// let a = frame.allocate(256, 16)?;
/// let b = frame.allocate(128, 8)?;
///
/// // Everything goes away together.
/// frame.clear();
/// ```
pub struct LinearAllocator<'a> {
    /// Allocator the buffer is returned to, if the buffer is owned.
    backing: Option<&'a dyn Allocator>,
    /// Start of the buffer.
    start: NonNull<u8>,
    /// Buffer size in bytes.
    total_size: usize,
    /// Bytes consumed since the last clear.
    offset: Cell<usize>,
    /// Ties a borrowed buffer to this allocator.
    _buffer: PhantomData<&'a mut [u8]>,
}

impl<'a> LinearAllocator<'a> {
    /// Creates a linear allocator owning `size` bytes from `backing`.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the buffer allocation.
    pub fn new(backing: &'a dyn Allocator, size: usize) -> MemoryResult<Self> {
        let start = backing.allocate(size, BUFFER_ALIGN)?;
        tracing::debug!(size, "linear allocator created");
        Ok(Self {
            backing: Some(backing),
            start,
            total_size: size,
            offset: Cell::new(0),
            _buffer: PhantomData,
        })
    }

    /// Creates a linear allocator over a caller-provided buffer.
    #[must_use]
    pub fn from_buffer(buffer: &'a mut [u8]) -> Self {
        let total_size = buffer.len();
        Self {
            backing: None,
            start: NonNull::from(buffer).cast::<u8>(),
            total_size,
            offset: Cell::new(0),
            _buffer: PhantomData,
        }
    }

    /// Returns the buffer size in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.total_size
    }

    /// Returns the bytes consumed since the last clear.
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.offset.get()
    }

    /// Returns the bytes still available.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total_size - self.used()
    }

    /// Releases every allocation at once.
    ///
    /// Taking `&mut self` ends every borrow of the allocator, so containers
    /// built on it are gone before their memory is reused.
    #[inline]
    pub fn clear(&mut self) {
        self.offset.set(0);
    }
}

impl Allocator for LinearAllocator<'_> {
    fn allocate(&self, size: usize, align: usize) -> MemoryResult<NonNull<u8>> {
        check_alignment(align)?;

        let offset = self.offset.get();
        let remaining = self.total_size - offset;
        let needed = size.checked_add(align).ok_or(MemoryError::TooLarge {
            requested: size,
            limit: self.total_size,
        })?;
        if needed > remaining {
            return Err(MemoryError::OutOfMemory {
                requested: needed,
                remaining,
            });
        }

        let payload = align_ptr(self.start.as_ptr().wrapping_add(offset), align);
        self.offset.set(offset + needed);

        // SAFETY: payload is at most `align - 1` bytes past an in-bounds
        // offset of a non-null buffer, and `needed` bytes were free there.
        Ok(unsafe { NonNull::new_unchecked(payload) })
    }

    unsafe fn deallocate(&self, _ptr: *mut u8) {}

    unsafe fn allocated_size(&self, _ptr: NonNull<u8>) -> Option<usize> {
        None
    }

    fn total_allocated_bytes(&self) -> Option<usize> {
        Some(self.offset.get())
    }
}

impl Drop for LinearAllocator<'_> {
    fn drop(&mut self) {
        let leaked = self.offset.get();

        if let Some(backing) = self.backing {
            // SAFETY: the buffer came from `backing` in `new` and is released once.
            unsafe { backing.deallocate(self.start.as_ptr()) };
        }

        if leaked != 0 {
            tracing::error!(leaked, "linear allocator dropped without clear()");
            if cfg!(debug_assertions) && !std::thread::panicking() {
                panic!("linear allocator dropped with {leaked} bytes in use");
            }
        }
    }
}
