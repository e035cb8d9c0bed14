//! # Hash Set
//!
//! Key-only view of [`HashMap`].

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use hearth_memory::Allocator;

use crate::error::ContainerResult;
use crate::from_allocator::FromAllocator;
use crate::hash_map::{HashMap, SipBuildHasher};

/// Robin Hood hash set drawing from an [`Allocator`].
pub struct HashSet<'a, K, S = SipBuildHasher> {
    map: HashMap<'a, K, (), S>,
}

impl<'a, K> HashSet<'a, K, SipBuildHasher> {
    /// Creates an empty set.
    #[must_use]
    pub fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            map: HashMap::new(allocator),
        }
    }
}

impl<'a, K, S> HashSet<'a, K, S> {
    /// Creates an empty set using `hasher`.
    #[must_use]
    pub fn with_hasher(allocator: &'a dyn Allocator, hasher: S) -> Self {
        Self {
            map: HashMap::with_hasher(allocator, hasher),
        }
    }

    /// Number of keys.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the set is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Removes every key, keeping the table.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Iterates over keys in table order.
    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.map.keys()
    }
}

impl<'a, K: Hash + Eq, S: BuildHasher> HashSet<'a, K, S> {
    /// Adds `key`. Returns false if it was already present.
    ///
    /// # Errors
    ///
    /// Fails if the table has to grow and cannot be allocated.
    pub fn insert(&mut self, key: K) -> ContainerResult<bool> {
        Ok(self.map.insert(key, ())?.is_none())
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.has(key)
    }

    /// Removes `key`. Returns false if it was absent.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(key).is_some()
    }
}

impl<K: fmt::Debug, S> fmt::Debug for HashSet<'_, K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, K, S: Default> FromAllocator<'a> for HashSet<'a, K, S> {
    fn from_allocator(allocator: &'a dyn Allocator) -> Self {
        Self::with_hasher(allocator, S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_memory::HeapAllocator;

    #[test]
    fn test_insert_has_remove() {
        let heap = HeapAllocator::new();
        let mut set: HashSet<&str> = HashSet::new(&heap);
        assert!(set.insert("grass").unwrap());
        assert!(!set.insert("grass").unwrap());
        assert!(set.insert("stone").unwrap());
        assert_eq!(set.len(), 2);

        assert!(set.has("grass"));
        assert!(set.remove("grass"));
        assert!(!set.remove("grass"));
        assert!(!set.has("grass"));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), ["stone"]);

        set.clear();
        assert!(set.is_empty());
    }
}
