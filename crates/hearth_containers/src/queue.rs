//! # Queue
//!
//! Double-ended ring queue of plain data over an [`Array`]. The array's
//! length is the ring capacity; `read` is the offset of the front element.

use std::fmt;
use std::ops::{Index, IndexMut};

use bytemuck::Pod;
use hearth_memory::Allocator;

use crate::array::Array;
use crate::error::{ContainerError, ContainerResult};
use crate::from_allocator::FromAllocator;

/// Growable double-ended queue of plain-old-data elements.
///
/// # Example
///
/// ```rust,ignore
/// let mut events: Queue<u32> = Queue::new(&heap);
/// events.push(&[1, 2, 3])?;
/// events.push_front(0)?;
/// assert_eq!(events.pop_front(), Some(0));
/// events.consume(2);
/// assert_eq!(events.front(), Some(&3));
/// ```
pub struct Queue<'a, T: Pod> {
    ring: Array<'a, T>,
    read: usize,
    len: usize,
}

impl<'a, T: Pod> Queue<'a, T> {
    /// Creates an empty queue. Nothing is allocated until the first push.
    #[must_use]
    pub fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            ring: Array::new(allocator),
            read: 0,
            len: 0,
        }
    }

    /// The allocator the queue draws from.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.ring.allocator()
    }

    /// Number of queued elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is queued.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the ring can hold.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Free slots before the ring must grow.
    #[inline]
    #[must_use]
    pub const fn space(&self) -> usize {
        self.capacity() - self.len
    }

    /// Ring slot of the `index`-th element from the front.
    #[inline]
    fn slot(&self, index: usize) -> usize {
        (self.read + index) % self.capacity()
    }

    /// The `index`-th element from the front.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        (index < self.len).then(|| &self.ring[self.slot(index)])
    }

    /// Mutable access to the `index`-th element from the front.
    #[inline]
    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.len {
            let slot = self.slot(index);
            Some(&mut self.ring[slot])
        } else {
            None
        }
    }

    /// Front element.
    #[inline]
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.get(0)
    }

    /// Back element.
    #[inline]
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|last| self.get(last))
    }

    /// Grows the ring to `capacity` slots, keeping elements in order.
    ///
    /// A wrapped run at the end of the old ring is moved to the end of the
    /// new one so the elements stay contiguous in circular order.
    ///
    /// # Errors
    ///
    /// Fails if the new storage cannot be allocated; the queue is unchanged then.
    pub fn increase_capacity(&mut self, capacity: usize) -> ContainerResult<()> {
        let old = self.capacity();
        if capacity <= old {
            return Ok(());
        }
        self.ring.resize(capacity)?;

        if self.read + self.len > old {
            let tail = old - self.read;
            self.ring.copy_within(self.read..old, capacity - tail);
            self.read = capacity - tail;
        }
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
        self.increase_capacity(doubled.max(min_capacity))
    }

    /// Makes room for at least `capacity` queued elements.
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

    /// Appends at the back.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails.
    pub fn push_back(&mut self, item: T) -> ContainerResult<()> {
        if self.space() == 0 {
            self.grow(0)?;
        }
        let slot = self.slot(self.len);
        self.ring[slot] = item;
        self.len += 1;
        Ok(())
    }

    /// Prepends at the front.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails.
    pub fn push_front(&mut self, item: T) -> ContainerResult<()> {
        if self.space() == 0 {
            self.grow(0)?;
        }
        self.read = (self.read + self.capacity() - 1) % self.capacity();
        self.ring[self.read] = item;
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the back element.
    pub fn pop_back(&mut self) -> Option<T> {
        let item = *self.back()?;
        self.len -= 1;
        Some(item)
    }

    /// Removes and returns the front element.
    pub fn pop_front(&mut self) -> Option<T> {
        let item = *self.front()?;
        self.read = (self.read + 1) % self.capacity();
        self.len -= 1;
        Some(item)
    }

    /// Drops `count` elements from the front.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `count` elements are queued.
    pub fn consume(&mut self, count: usize) {
        assert!(count <= self.len, "consume({count}) on a queue of {}", self.len);
        if count == 0 {
            return;
        }
        self.read = (self.read + count) % self.capacity();
        self.len -= count;
    }

    /// Appends `items` at the back, in order.
    ///
    /// # Errors
    ///
    /// Fails if growing the storage fails.
    pub fn push(&mut self, items: &[T]) -> ContainerResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        if self.space() < items.len() {
            let needed = self
                .len
                .checked_add(items.len())
                .ok_or(ContainerError::CapacityOverflow)?;
            self.grow(needed)?;
        }

        let capacity = self.capacity();
        let insert = self.slot(self.len);
        let first = items.len().min(capacity - insert);
        self.ring[insert..insert + first].copy_from_slice(&items[..first]);
        self.ring[..items.len() - first].copy_from_slice(&items[first..]);
        self.len += items.len();
        Ok(())
    }

    /// The contiguous run of elements starting at the front.
    ///
    /// Shorter than [`Queue::len`] when the elements wrap around the ring.
    #[must_use]
    pub fn front_slice(&self) -> &[T] {
        let end = (self.read + self.len).min(self.capacity());
        &self.ring[self.read..end]
    }

    /// Empties the queue, keeping the storage.
    #[inline]
    pub fn clear(&mut self) {
        self.read = 0;
        self.len = 0;
    }

    /// Iterates front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).map(move |i| &self.ring[self.slot(i)])
    }
}

impl<T: Pod> Index<usize> for Queue<'_, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(item) => item,
            None => panic!("queue index {index} out of bounds (len {})", self.len),
        }
    }
}

impl<T: Pod> IndexMut<usize> for Queue<'_, T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len;
        match self.get_mut(index) {
            Some(item) => item,
            None => panic!("queue index {index} out of bounds (len {len})"),
        }
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for Queue<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T: Pod> FromAllocator<'a> for Queue<'a, T> {
    fn from_allocator(allocator: &'a dyn Allocator) -> Self {
        Self::new(allocator)
    }
}
