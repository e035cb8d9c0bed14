//! # Allocator Interface
//!
//! Every engine allocation goes through an [`Allocator`]. Containers and
//! systems receive one by reference instead of reaching for the system heap,
//! so memory can be routed, measured and checked for leaks per subsystem.

#![allow(unsafe_code)]

use std::ptr::{self, NonNull};

use crate::error::MemoryResult;

/// Alignment used when a caller has no stronger requirement.
pub const DEFAULT_ALIGN: usize = 4;

/// A source of raw memory blocks.
///
/// Implementations take `&self`: allocators are shared by reference between
/// the containers that draw from them. Whether an allocator may also be
/// shared between threads is expressed through `Sync` on the concrete type.
pub trait Allocator {
    /// Allocates `size` bytes aligned to `align`.
    ///
    /// A zero-sized request returns a valid, unique block.
    ///
    /// # Errors
    ///
    /// Fails when `align` is not a power of two, when the block is too large
    /// for the allocator's header format, or when a fixed-capacity allocator
    /// is exhausted.
    fn allocate(&self, size: usize, align: usize) -> MemoryResult<NonNull<u8>>;

    /// Releases a block. A null pointer is a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer returned by `allocate` on this same
    /// allocator that has not been released yet.
    unsafe fn deallocate(&self, ptr: *mut u8);

    /// Usable size of a live block, or `None` when the allocator does not
    /// track sizes.
    ///
    /// The reported size is at least the requested size.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block from this allocator.
    unsafe fn allocated_size(&self, ptr: NonNull<u8>) -> Option<usize>;

    /// Bytes currently allocated, or `None` when the allocator does not
    /// track them.
    fn total_allocated_bytes(&self) -> Option<usize>;

    /// Moves a block to a new allocation of `new_size` bytes.
    ///
    /// The first `min(old_size, new_size)` bytes are preserved and the old
    /// block is released. A null `ptr` behaves like `allocate`.
    ///
    /// # Safety
    ///
    /// Same contract as [`Allocator::deallocate`] for `ptr`, and `old_size`
    /// must not exceed the size the block was allocated with.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the new allocation; the old block is left
    /// untouched in that case.
    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> MemoryResult<NonNull<u8>> {
        let fresh = self.allocate(new_size, align)?;
        if !ptr.is_null() {
            ptr::copy_nonoverlapping(ptr, fresh.as_ptr(), old_size.min(new_size));
            self.deallocate(ptr);
        }
        Ok(fresh)
    }
}
