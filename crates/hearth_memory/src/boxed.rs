//! # Typed Allocation
//!
//! Placing values in allocator memory: [`construct_in`] / [`destroy_in`]
//! for manual lifetimes and [`AllocBox`] for an owning handle.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of, ManuallyDrop};
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use crate::allocator::Allocator;
use crate::error::MemoryResult;

/// Allocates room for a `T` from `allocator` and moves `value` into it.
///
/// The value must later be released with [`destroy_in`] on the same
/// allocator.
///
/// # Errors
///
/// Propagates the allocation failure; `value` is dropped in that case.
pub fn construct_in<T, A: Allocator + ?Sized>(allocator: &A, value: T) -> MemoryResult<NonNull<T>> {
    let ptr = allocator.allocate(size_of::<T>(), align_of::<T>())?.cast::<T>();
    // SAFETY: freshly allocated, sized and aligned for T.
    unsafe { ptr.as_ptr().write(value) };
    Ok(ptr)
}

/// Drops the value at `ptr` and returns its memory to `allocator`.
///
/// # Safety
///
/// `ptr` must come from [`construct_in`] on this allocator and must not be
/// used afterwards.
pub unsafe fn destroy_in<T, A: Allocator + ?Sized>(allocator: &A, ptr: NonNull<T>) {
    ptr::drop_in_place(ptr.as_ptr());
    allocator.deallocate(ptr.as_ptr().cast::<u8>());
}

/// Owning pointer to a `T` living in allocator memory.
///
/// The allocator equivalent of `Box<T>`: the value is dropped and its memory
/// released when the handle goes out of scope.
pub struct AllocBox<'a, T> {
    ptr: NonNull<T>,
    allocator: &'a dyn Allocator,
    _owns: PhantomData<T>,
}

impl<'a, T> AllocBox<'a, T> {
    /// Moves `value` into memory from `allocator`.
    ///
    /// # Errors
    ///
    /// Propagates the allocation failure.
    pub fn new_in(value: T, allocator: &'a dyn Allocator) -> MemoryResult<Self> {
        Ok(Self {
            ptr: construct_in(allocator, value)?,
            allocator,
            _owns: PhantomData,
        })
    }

    /// Allocator the value lives in.
    #[inline]
    #[must_use]
    pub fn allocator(this: &Self) -> &'a dyn Allocator {
        this.allocator
    }

    /// Moves the value out and releases its memory.
    #[must_use]
    pub fn into_inner(this: Self) -> T {
        let this = ManuallyDrop::new(this);
        // SAFETY: the value is initialized and read exactly once, after
        // which the memory is released without dropping it again.
        unsafe {
            let value = this.ptr.as_ptr().read();
            this.allocator.deallocate(this.ptr.as_ptr().cast::<u8>());
            value
        }
    }
}

impl<T> Deref for AllocBox<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the box owns an initialized T.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for AllocBox<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the box owns an initialized T and is borrowed mutably.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: fmt::Debug> fmt::Debug for AllocBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T> Drop for AllocBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the box owns the value and the memory came from `allocator`.
        unsafe { destroy_in(self.allocator, self.ptr) };
    }
}
