//! # Vector
//!
//! Dynamic array that owns its elements: values are moved on relocation and
//! dropped when removed. Same growth policy as [`Array`](crate::Array).

#![allow(unsafe_code)]

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr;

use hearth_memory::Allocator;

use crate::error::{ContainerError, ContainerResult};
use crate::from_allocator::FromAllocator;
use crate::raw::RawBuffer;

/// Growable array of owned values drawn from an explicit allocator.
///
/// # Example
///
/// ```rust,ignore
/// let mut names: Vector<String> = Vector::new(&heap);
/// names.push_back("crate".to_owned())?;
/// names.resize_with(4, String::new)?;
/// assert_eq!(names.len(), 4);
/// ```
pub struct Vector<'a, T> {
    buf: RawBuffer<'a, T>,
    len: usize,
}

impl<'a, T> Vector<'a, T> {
    /// Creates an empty vector. Nothing is allocated until the first push.
    #[must_use]
    pub fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            buf: RawBuffer::new(allocator),
            len: 0,
        }
    }

    /// Creates an empty vector with room for `capacity` elements.
    ///
    /// # Errors
    ///
    /// Fails if the allocator cannot provide the storage.
    pub fn with_capacity(allocator: &'a dyn Allocator, capacity: usize) -> ContainerResult<Self> {
        Ok(Self {
            buf: RawBuffer::with_capacity(allocator, capacity)?,
            len: 0,
        })
    }

    /// The allocator the vector draws from.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.buf.allocator()
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the vector holds no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the current storage can hold.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// The elements as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` slots are initialized.
        unsafe { std::slice::from_raw_parts(self.buf.as_ptr(), self.len) }
    }

    /// The elements as a mutable slice.
    #[inline]
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: the first `len` slots are initialized.
        unsafe { std::slice::from_raw_parts_mut(self.buf.as_ptr(), self.len) }
    }

    /// First element.
    #[inline]
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    /// Last element.
    #[inline]
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Makes room for at least `capacity` elements.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails.
    pub fn reserve(&mut self, capacity: usize) -> ContainerResult<()> {
        if capacity > self.capacity() {
            self.grow(capacity)?;
        }
        Ok(())
    }

    /// Moves the elements to storage for exactly `capacity` elements,
    /// dropping any beyond it. A capacity of zero releases the storage.
    ///
    /// # Errors
    ///
    /// Fails if the new storage cannot be allocated. Elements beyond the
    /// new capacity are dropped before the attempt.
    pub fn set_capacity(&mut self, capacity: usize) -> ContainerResult<()> {
        if capacity == self.capacity() {
            return Ok(());
        }
        self.truncate(capacity);
        self.buf.relocate(capacity, self.len)
    }

    /// Grows to `capacity * 2 + 1`, or to `min_capacity` if that is larger.
    ///
    /// # Errors
    ///
    /// Fails on overflow or if the new storage cannot be allocated.
    pub fn grow(&mut self, min_capacity: usize) -> ContainerResult<()> {
        let doubled = self
            .capacity()
            .checked_mul(2)
            .and_then(|c| c.checked_add(1))
            .ok_or(ContainerError::CapacityOverflow)?;
        self.set_capacity(doubled.max(min_capacity))
    }

    /// Shrinks the storage to the current length.
    ///
    /// # Errors
    ///
    /// Fails if the smaller storage cannot be allocated.
    pub fn condense(&mut self) -> ContainerResult<()> {
        self.set_capacity(self.len)
    }

    /// Appends one element.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails; `item` is dropped then.
    pub fn push_back(&mut self, item: T) -> ContainerResult<()> {
        if self.len == self.capacity() {
            self.grow(0)?;
        }
        // SAFETY: slot `len` is allocated and uninitialized.
        unsafe { self.buf.as_ptr().add(self.len).write(item) };
        self.len += 1;
        Ok(())
    }

    /// Appends `T::default()`.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails.
    pub fn push_default(&mut self) -> ContainerResult<()>
    where
        T: Default,
    {
        self.push_back(T::default())
    }

    /// Appends an empty value that draws from this vector's allocator.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails.
    pub fn push_new_in(&mut self) -> ContainerResult<()>
    where
        T: FromAllocator<'a>,
    {
        let item = T::from_allocator(self.allocator());
        self.push_back(item)
    }

    /// Removes and returns the last element.
    pub fn pop_back(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: slot `len` was initialized and is now outside the vector.
        Some(unsafe { self.buf.as_ptr().add(self.len).read() })
    }

    /// Removes the element at `index`, replacing it with the last one.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn swap_remove(&mut self, index: usize) -> T {
        assert!(index < self.len, "swap_remove index {index} out of bounds (len {})", self.len);
        let last = self.len - 1;
        self.as_mut_slice().swap(index, last);
        self.len -= 1;
        // SAFETY: slot `len` was initialized and is now outside the vector.
        unsafe { self.buf.as_ptr().add(self.len).read() }
    }

    /// Appends clones of `items`.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails; elements pushed before the
    /// failure stay in the vector.
    pub fn push(&mut self, items: &[T]) -> ContainerResult<()>
    where
        T: Clone,
    {
        let needed = self
            .len
            .checked_add(items.len())
            .ok_or(ContainerError::CapacityOverflow)?;
        self.reserve(needed)?;
        for item in items {
            self.push_back(item.clone())?;
        }
        Ok(())
    }

    /// Resizes to `len`, filling new slots with values from `fill`.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails.
    pub fn resize_with(&mut self, len: usize, mut fill: impl FnMut() -> T) -> ContainerResult<()> {
        if len > self.capacity() {
            self.grow(len)?;
        }
        while self.len < len {
            // SAFETY: slot `len` is allocated and uninitialized.
            unsafe { self.buf.as_ptr().add(self.len).write(fill()) };
            self.len += 1;
        }
        self.truncate(len);
        Ok(())
    }

    /// Resizes to `len`, filling new slots with `T::default()`.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails.
    pub fn resize(&mut self, len: usize) -> ContainerResult<()>
    where
        T: Default,
    {
        self.resize_with(len, T::default)
    }

    /// Resizes to `len`, filling new slots with empty values drawing from
    /// this vector's allocator.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails.
    pub fn resize_in(&mut self, len: usize) -> ContainerResult<()>
    where
        T: FromAllocator<'a>,
    {
        let allocator = self.allocator();
        self.resize_with(len, || T::from_allocator(allocator))
    }

    /// Drops every element past `len`.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let tail = self.len - len;
        self.len = len;
        // SAFETY: the tail slots are initialized and no longer reachable.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.buf.as_ptr().add(len), tail));
        }
    }

    /// Drops every element, keeping the storage.
    #[inline]
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Clones the vector into new storage from the same allocator.
    ///
    /// # Errors
    ///
    /// Fails if the allocator cannot provide the storage.
    pub fn try_clone(&self) -> ContainerResult<Self>
    where
        T: Clone,
    {
        let mut copy = Self::with_capacity(self.allocator(), self.len)?;
        copy.push(self.as_slice())?;
        Ok(copy)
    }
}

impl<T> Drop for Vector<'_, T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Deref for Vector<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for Vector<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for Vector<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for Vector<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<'a, T> FromAllocator<'a> for Vector<'a, T> {
    fn from_allocator(allocator: &'a dyn Allocator) -> Self {
        Self::new(allocator)
    }
}
