//! # Array
//!
//! Dynamic array of plain data. Elements are moved with raw memory copies
//! and never dropped, which is what `T: Pod` guarantees to be sound.

#![allow(unsafe_code)]

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr;

use bytemuck::Pod;
use hearth_memory::Allocator;

use crate::error::{ContainerError, ContainerResult};
use crate::from_allocator::FromAllocator;
use crate::raw::RawBuffer;

/// Growable array of plain-old-data elements.
///
/// Growth follows `new_capacity = capacity * 2 + 1`, raised to the
/// requested minimum when that is larger.
///
/// # Example
///
/// ```rust,ignore
/// let mut ids: Array<u32> = Array::new(&heap);
/// ids.push_back(7)?;
/// ids.push(&[8, 9])?;
/// assert_eq!(&ids[..], &[7, 8, 9]);
/// ```
pub struct Array<'a, T: Pod> {
    buf: RawBuffer<'a, T>,
    len: usize,
}

impl<'a, T: Pod> Array<'a, T> {
    /// Creates an empty array. Nothing is allocated until the first push.
    #[must_use]
    pub fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            buf: RawBuffer::new(allocator),
            len: 0,
        }
    }

    /// Creates an empty array with room for `capacity` elements.
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

    /// Creates an array holding a copy of `items`.
    ///
    /// # Errors
    ///
    /// Fails if the allocator cannot provide the storage.
    pub fn from_slice(allocator: &'a dyn Allocator, items: &[T]) -> ContainerResult<Self> {
        let mut array = Self::with_capacity(allocator, items.len())?;
        array.push(items)?;
        Ok(array)
    }

    /// The allocator the array draws from.
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

    /// Returns true if the array holds no elements.
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

    /// Sets the length to `len`. New elements are zeroed.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails; the array is unchanged then.
    pub fn resize(&mut self, len: usize) -> ContainerResult<()> {
        if len > self.capacity() {
            self.grow(len)?;
        }
        if len > self.len {
            // SAFETY: slots len..new_len are allocated, and zero is a valid T.
            unsafe { ptr::write_bytes(self.buf.as_ptr().add(self.len), 0, len - self.len) };
        }
        self.len = len;
        Ok(())
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

    /// Reallocates to exactly `capacity` elements, truncating if needed.
    /// A capacity of zero releases the storage.
    ///
    /// # Errors
    ///
    /// Fails if the new storage cannot be allocated; the array is unchanged then.
    pub fn set_capacity(&mut self, capacity: usize) -> ContainerResult<()> {
        if capacity == self.capacity() {
            return Ok(());
        }
        let len = self.len.min(capacity);
        self.buf.relocate(capacity, len)?;
        self.len = len;
        Ok(())
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
    /// Fails if growing the storage fails.
    pub fn push_back(&mut self, item: T) -> ContainerResult<()> {
        if self.len == self.capacity() {
            self.grow(0)?;
        }
        // SAFETY: slot `len` is allocated.
        unsafe { self.buf.as_ptr().add(self.len).write(item) };
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the last element.
    pub fn pop_back(&mut self) -> Option<T> {
        let item = *self.back()?;
        self.len -= 1;
        Some(item)
    }

    /// Appends a copy of `items`.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails.
    pub fn push(&mut self, items: &[T]) -> ContainerResult<()> {
        let needed = self
            .len
            .checked_add(items.len())
            .ok_or(ContainerError::CapacityOverflow)?;
        if needed > self.capacity() {
            self.grow(needed)?;
        }
        // SAFETY: slots len..needed are allocated and `items` cannot alias
        // storage the array owns exclusively.
        unsafe {
            ptr::copy_nonoverlapping(items.as_ptr(), self.buf.as_ptr().add(self.len), items.len());
        }
        self.len = needed;
        Ok(())
    }

    /// Removes every element, keeping the storage.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Copies the array into new storage from the same allocator.
    ///
    /// # Errors
    ///
    /// Fails if the allocator cannot provide the storage.
    pub fn try_clone(&self) -> ContainerResult<Self> {
        Self::from_slice(self.allocator(), self.as_slice())
    }
}

impl<T: Pod> Deref for Array<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> DerefMut for Array<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for Array<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Pod + PartialEq> PartialEq for Array<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<'a, T: Pod> FromAllocator<'a> for Array<'a, T> {
    fn from_allocator(allocator: &'a dyn Allocator) -> Self {
        Self::new(allocator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_memory::{HeapAllocator, LinearAllocator, MemoryError};

    #[test]
    fn test_push_and_growth_policy() {
        let heap = HeapAllocator::new();
        let mut array: Array<u32> = Array::new(&heap);
        assert_eq!(array.capacity(), 0);

        array.push_back(1).unwrap();
        assert_eq!(array.capacity(), 1);
        array.push_back(2).unwrap();
        assert_eq!(array.capacity(), 3);
        array.push_back(3).unwrap();
        array.push_back(4).unwrap();
        assert_eq!(array.capacity(), 7);

        assert_eq!(&array[..], &[1, 2, 3, 4]);
        assert_eq!(array.front(), Some(&1));
        assert_eq!(array.back(), Some(&4));
    }

    #[test]
    fn test_bulk_push_grows_to_fit() {
        let heap = HeapAllocator::new();
        let mut array: Array<u16> = Array::new(&heap);
        let items: Vec<u16> = (0..100).collect();

        array.push(&items).unwrap();
        assert_eq!(array.len(), 100);
        assert_eq!(array.capacity(), 100);
        assert_eq!(&array[..], &items[..]);
    }

    #[test]
    fn test_pop_back() {
        let heap = HeapAllocator::new();
        let mut array = Array::from_slice(&heap, &[1.0f32, 2.0]).unwrap();
        assert_eq!(array.pop_back(), Some(2.0));
        assert_eq!(array.pop_back(), Some(1.0));
        assert_eq!(array.pop_back(), None);
        assert!(array.is_empty());
    }

    #[test]
    fn test_resize_zero_fills() {
        let heap = HeapAllocator::new();
        let mut array = Array::from_slice(&heap, &[9u64, 9]).unwrap();
        array.resize(5).unwrap();
        assert_eq!(&array[..], &[9, 9, 0, 0, 0]);
        array.resize(1).unwrap();
        assert_eq!(&array[..], &[9]);
        assert_eq!(array.capacity(), 5);
    }

    #[test]
    fn test_capacity_management() {
        let heap = HeapAllocator::new();
        let mut array: Array<i32> = Array::new(&heap);

        array.reserve(32).unwrap();
        assert_eq!(array.capacity(), 32);
        array.push(&[1, 2, 3]).unwrap();

        array.condense().unwrap();
        assert_eq!(array.capacity(), 3);
        assert_eq!(&array[..], &[1, 2, 3]);

        array.set_capacity(2).unwrap();
        assert_eq!(&array[..], &[1, 2]);

        array.set_capacity(0).unwrap();
        assert!(array.is_empty());
        assert_eq!(heap.allocation_count(), 0);
    }

    #[test]
    fn test_clear_keeps_storage() {
        let heap = HeapAllocator::new();
        let mut array = Array::from_slice(&heap, &[1u8, 2, 3]).unwrap();
        array.clear();
        assert!(array.is_empty());
        assert_eq!(array.capacity(), 3);
    }

    #[test]
    fn test_try_clone_is_independent() {
        let heap = HeapAllocator::new();
        let mut a = Array::from_slice(&heap, &[1u32, 2, 3]).unwrap();
        let b = a.try_clone().unwrap();
        a[0] = 10;
        assert_eq!(&b[..], &[1, 2, 3]);
        assert_ne!(a, b);
        assert_eq!(heap.allocation_count(), 2);
    }

    #[test]
    fn test_failed_growth_leaves_array_intact() {
        // 20 bytes for four elements, the grown storage would need 40 more.
        let mut buffer = [0u8; 48];
        let mut linear = LinearAllocator::from_buffer(&mut buffer);
        {
            let mut array: Array<u32> = Array::with_capacity(&linear, 4).unwrap();
            array.push(&[1, 2, 3, 4]).unwrap();

            let err = array.push_back(5).unwrap_err();
            assert!(matches!(err, ContainerError::Memory(MemoryError::OutOfMemory { .. })));
            assert_eq!(&array[..], &[1, 2, 3, 4]);
        }
        linear.clear();
    }

    #[test]
    fn test_storage_released_on_drop() {
        let heap = HeapAllocator::new();
        {
            let mut array: Array<u64> = Array::new(&heap);
            for i in 0..100 {
                array.push_back(i).unwrap();
            }
            assert_eq!(heap.allocation_count(), 1);
        }
        assert_eq!(heap.allocation_count(), 0);
    }
}
