//! # Sort Map
//!
//! Map stored as a flat vector of `(key, value)` pairs. Mutations are cheap
//! and leave the map unsorted; lookups binary search and require a prior
//! [`SortMap::sort`].

use std::borrow::Borrow;
use std::fmt;

use hearth_memory::Allocator;

use crate::error::{ContainerError, ContainerResult};
use crate::from_allocator::FromAllocator;
use crate::vector::Vector;

/// Flat sorted map with explicit sorting.
///
/// # Example
///
/// ```rust,ignore
/// let mut lods: SortMap<u32, f32> = SortMap::new(&heap);
/// lods.set(2, 40.0)?;
/// lods.set(1, 20.0)?;
/// lods.sort();
/// assert_eq!(lods.get(&1), Some(&20.0));
/// ```
pub struct SortMap<'a, K, V> {
    data: Vector<'a, (K, V)>,
    sorted: bool,
}

impl<'a, K, V> SortMap<'a, K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            data: Vector::new(allocator),
            sorted: true,
        }
    }

    /// The allocator the map draws from.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.data.allocator()
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the map is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if no mutation happened since the last sort.
    #[inline]
    #[must_use]
    pub const fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Removes every entry. An empty map counts as sorted.
    pub fn clear(&mut self) {
        self.data.clear();
        self.sorted = true;
    }

    /// Iterates in storage order, which is key order when sorted.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.data.iter().map(|(key, value)| (key, value))
    }
}

impl<'a, K: Ord, V> SortMap<'a, K, V> {
    /// Inserts or updates `key` without keeping the order.
    ///
    /// # Errors
    ///
    /// Fails if the storage has to grow and cannot be allocated.
    pub fn set(&mut self, key: K, value: V) -> ContainerResult<()> {
        if let Some(entry) = self.data.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.data.push_back((key, value))?;
        }
        self.sorted = false;
        Ok(())
    }

    /// Removes `key` by swapping the last entry into its place.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let index = self.data.iter().position(|(k, _)| k.borrow() == key)?;
        let (_key, value) = self.data.swap_remove(index);
        self.sorted = false;
        Some(value)
    }

    /// Sorts the entries by key. Does not allocate.
    pub fn sort(&mut self) {
        if !self.sorted {
            self.data.sort_unstable_by(|a, b| a.0.cmp(&b.0));
            self.sorted = true;
        }
    }

    fn search<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.data
            .binary_search_by(|(k, _)| k.borrow().cmp(key))
            .ok()
    }

    /// Value for `key`.
    ///
    /// The map must be sorted; debug builds panic otherwise.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        debug_assert!(self.sorted, "sort map queried before sort()");
        self.search(key).map(|index| &self.data[index].1)
    }

    /// Returns true if `key` is present.
    ///
    /// The map must be sorted; debug builds panic otherwise.
    #[must_use]
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        debug_assert!(self.sorted, "sort map queried before sort()");
        self.search(key).is_some()
    }

    /// Checked [`SortMap::get`].
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotSorted`] if the map changed since the
    /// last sort.
    pub fn try_get<Q>(&self, key: &Q) -> ContainerResult<Option<&V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if !self.sorted {
            return Err(ContainerError::NotSorted);
        }
        Ok(self.search(key).map(|index| &self.data[index].1))
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for SortMap<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> FromAllocator<'a> for SortMap<'a, K, V> {
    fn from_allocator(allocator: &'a dyn Allocator) -> Self {
        Self::new(allocator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_memory::HeapAllocator;

    #[test]
    fn test_set_sort_get() {
        let heap = HeapAllocator::new();
        let mut map: SortMap<u32, &str> = SortMap::new(&heap);
        assert!(map.is_sorted());

        map.set(30, "c").unwrap();
        map.set(10, "a").unwrap();
        map.set(20, "b").unwrap();
        map.set(10, "A").unwrap();
        assert_eq!(map.len(), 3);
        assert!(!map.is_sorted());

        map.sort();
        assert!(map.is_sorted());
        assert_eq!(map.get(&10), Some(&"A"));
        assert_eq!(map.get(&20), Some(&"b"));
        assert_eq!(map.get(&25), None);
        assert!(map.has(&30));
        assert!(!map.has(&5));
        assert_eq!(map.iter().map(|(k, _)| *k).collect::<Vec<_>>(), [10, 20, 30]);
    }

    #[test]
    fn test_remove_swaps_and_unsorts() {
        let heap = HeapAllocator::new();
        let mut map: SortMap<u32, u32> = SortMap::new(&heap);
        for key in [1, 2, 3, 4] {
            map.set(key, key * 100).unwrap();
        }
        map.sort();

        assert_eq!(map.remove(&1), Some(100));
        assert_eq!(map.remove(&1), None);
        assert!(!map.is_sorted());
        assert_eq!(map.iter().map(|(k, _)| *k).collect::<Vec<_>>(), [4, 2, 3]);

        map.sort();
        assert_eq!(map.get(&4), Some(&400));
    }

    #[test]
    fn test_try_get_reports_unsorted() {
        let heap = HeapAllocator::new();
        let mut map: SortMap<u32, u32> = SortMap::new(&heap);
        map.set(1, 1).unwrap();
        assert_eq!(map.try_get(&1), Err(ContainerError::NotSorted));

        map.sort();
        assert_eq!(map.try_get(&1), Ok(Some(&1)));

        map.clear();
        assert!(map.is_sorted());
        assert_eq!(map.try_get(&1), Ok(None));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "sort map queried before sort()")]
    fn test_unsorted_get_panics_in_debug() {
        let heap = HeapAllocator::new();
        let mut map: SortMap<u32, u32> = SortMap::new(&heap);
        map.set(1, 1).unwrap();
        let _ = map.get(&1);
    }

    #[test]
    fn test_string_keys_borrowed_lookup() {
        let heap = HeapAllocator::new();
        let mut map: SortMap<String, u32> = SortMap::new(&heap);
        map.set("b".to_string(), 2).unwrap();
        map.set("a".to_string(), 1).unwrap();
        map.sort();
        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.remove("b"), Some(2));
    }
}
