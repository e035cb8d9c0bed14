//! Uninitialized element storage shared by the containers.

#![allow(unsafe_code)]

use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};

use hearth_memory::Allocator;

use crate::error::{ContainerError, ContainerResult};

/// `capacity` slots of `T` drawn from an allocator.
///
/// Tracks memory only: which slots are initialized is up to the owner, and
/// dropping the buffer never drops elements.
pub(crate) struct RawBuffer<'a, T> {
    allocator: &'a dyn Allocator,
    ptr: NonNull<T>,
    capacity: usize,
}

impl<'a, T> RawBuffer<'a, T> {
    /// Empty buffer; allocates nothing.
    pub(crate) fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            allocator,
            ptr: NonNull::dangling(),
            capacity: 0,
        }
    }

    /// Buffer with room for exactly `capacity` elements.
    pub(crate) fn with_capacity(allocator: &'a dyn Allocator, capacity: usize) -> ContainerResult<Self> {
        let mut buffer = Self::new(allocator);
        buffer.relocate(capacity, 0)?;
        Ok(buffer)
    }

    #[inline]
    pub(crate) fn allocator(&self) -> &'a dyn Allocator {
        self.allocator
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Moves to storage for `capacity` elements, carrying over the first
    /// `live` slots. On failure the buffer is left unchanged.
    pub(crate) fn relocate(&mut self, capacity: usize, live: usize) -> ContainerResult<()> {
        debug_assert!(live <= capacity && live <= self.capacity);

        let fresh = if capacity == 0 || size_of::<T>() == 0 {
            NonNull::dangling()
        } else {
            let bytes = capacity
                .checked_mul(size_of::<T>())
                .ok_or(ContainerError::CapacityOverflow)?;
            let fresh = self.allocator.allocate(bytes, align_of::<T>())?.cast::<T>();
            // SAFETY: both regions hold at least `live` slots and are distinct.
            unsafe { ptr::copy_nonoverlapping(self.ptr.as_ptr(), fresh.as_ptr(), live) };
            fresh
        };

        self.release();
        self.ptr = fresh;
        self.capacity = capacity;
        Ok(())
    }

    fn release(&mut self) {
        if self.capacity != 0 && size_of::<T>() != 0 {
            // SAFETY: the storage came from `allocator` and is released once.
            unsafe { self.allocator.deallocate(self.ptr.as_ptr().cast::<u8>()) };
        }
    }
}

impl<T> Drop for RawBuffer<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}
