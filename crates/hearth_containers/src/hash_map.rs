//! # Hash Map
//!
//! Open-addressing hash map with Robin Hood probing.
//!
//! Each slot has a 32-bit hash word next to its entry:
//!
//! ```text
//! 0            free slot, entry uninitialized
//! 1..2^31      live entry, word is the key's hash (never 0)
//! bit 31 set   tombstone, entry dropped; keeps its probe distance
//! ```
//!
//! Lookups stop at a free slot or at a slot whose occupant sits closer to
//! its home than the probe has travelled. Inserts swap the carried entry
//! with any richer occupant on the way.

#![allow(unsafe_code)]

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};
use std::mem;
use std::ptr;

use hearth_memory::Allocator;
use siphasher::sip::SipHasher13;

use crate::error::{ContainerError, ContainerResult};
use crate::from_allocator::FromAllocator;
use crate::raw::RawBuffer;

/// Default hasher for [`HashMap`] and [`HashSet`](crate::HashSet).
pub type SipBuildHasher = BuildHasherDefault<SipHasher13>;

/// Capacity of the first table.
pub const INITIAL_CAPACITY: usize = 16;

const FREE: u32 = 0;
const DELETED: u32 = 0x8000_0000;

#[inline]
const fn is_live(hash: u32) -> bool {
    hash != FREE && hash & DELETED == 0
}

/// Growable Robin Hood hash map drawing from an [`Allocator`].
///
/// Capacity is a power of two. The table doubles when an insert would take
/// it to 90% load, and is rebuilt in place when tombstones crowd it.
///
/// # Example
///
/// ```rust,ignore
/// let mut meshes: HashMap<StringId32, u32> = HashMap::new(&heap);
/// meshes.set(StringId32::new("crate"), 4)?;
/// assert_eq!(meshes.get(&StringId32::new("crate")), Some(&4));
/// ```
pub struct HashMap<'a, K, V, S = SipBuildHasher> {
    hashes: RawBuffer<'a, u32>,
    entries: RawBuffer<'a, (K, V)>,
    len: usize,
    tombstones: usize,
    mask: usize,
    hasher: S,
}

impl<'a, K, V> HashMap<'a, K, V, SipBuildHasher> {
    /// Creates an empty map. Nothing is allocated until the first insert.
    #[must_use]
    pub fn new(allocator: &'a dyn Allocator) -> Self {
        Self::with_hasher(allocator, SipBuildHasher::default())
    }
}

impl<'a, K, V, S> HashMap<'a, K, V, S> {
    /// Creates an empty map using `hasher`.
    #[must_use]
    pub fn with_hasher(allocator: &'a dyn Allocator, hasher: S) -> Self {
        Self {
            hashes: RawBuffer::new(allocator),
            entries: RawBuffer::new(allocator),
            len: 0,
            tombstones: 0,
            mask: 0,
            hasher,
        }
    }

    /// The allocator the map draws from.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.hashes.allocator()
    }

    /// Number of live entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the map holds no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots in the table.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.hashes.capacity()
    }

    #[inline]
    fn hash_at(&self, pos: usize) -> u32 {
        debug_assert!(pos < self.capacity());
        // SAFETY: every slot's hash word is initialized when the table is built.
        unsafe { *self.hashes.as_ptr().add(pos) }
    }

    #[inline]
    fn set_hash_at(&mut self, pos: usize, hash: u32) {
        debug_assert!(pos < self.capacity());
        // SAFETY: as above.
        unsafe { *self.hashes.as_ptr().add(pos) = hash };
    }

    #[inline]
    fn entry_at(&self, pos: usize) -> &(K, V) {
        debug_assert!(is_live(self.hash_at(pos)));
        // SAFETY: live slots hold an initialized entry.
        unsafe { &*self.entries.as_ptr().add(pos) }
    }

    #[inline]
    fn entry_at_mut(&mut self, pos: usize) -> &mut (K, V) {
        debug_assert!(is_live(self.hash_at(pos)));
        // SAFETY: as above, and `&mut self` makes the access unique.
        unsafe { &mut *self.entries.as_ptr().add(pos) }
    }

    /// Distance of slot `pos` from the home slot of `hash`.
    #[inline]
    fn probe_distance(&self, hash: u32, pos: usize) -> usize {
        pos.wrapping_sub((hash & !DELETED) as usize) & self.mask
    }

    /// Places an entry known to be absent, swapping forward Robin Hood style.
    /// The caller guarantees a free slot exists.
    fn insert_hashed(&mut self, mut hash: u32, mut entry: (K, V)) {
        let mut pos = hash as usize & self.mask;
        let mut dist = 0;
        loop {
            let occupant = self.hash_at(pos);
            if occupant == FREE {
                break;
            }
            let occupant_dist = self.probe_distance(occupant, pos);
            if !is_live(occupant) {
                if occupant_dist <= dist {
                    self.tombstones -= 1;
                    break;
                }
            } else if occupant_dist < dist {
                // SAFETY: the slot is live; its entry is moved out and the
                // slot immediately refilled.
                unsafe {
                    let slot = self.entries.as_ptr().add(pos);
                    entry = ptr::replace(slot, entry);
                }
                self.set_hash_at(pos, hash);
                hash = occupant;
                dist = occupant_dist;
            }
            pos = (pos + 1) & self.mask;
            dist += 1;
        }
        // SAFETY: the slot is free or a tombstone, so its entry is uninitialized.
        unsafe { ptr::write(self.entries.as_ptr().add(pos), entry) };
        self.set_hash_at(pos, hash);
    }

    /// Drops every live entry and marks all slots free.
    pub fn clear(&mut self) {
        self.drop_entries();
        if self.capacity() != 0 {
            // SAFETY: the hash words span `capacity` slots.
            unsafe { ptr::write_bytes(self.hashes.as_ptr(), 0, self.capacity()) };
        }
        self.len = 0;
        self.tombstones = 0;
    }

    fn drop_entries(&mut self) {
        if !mem::needs_drop::<(K, V)>() || self.len == 0 {
            return;
        }
        for pos in 0..self.capacity() {
            if is_live(self.hash_at(pos)) {
                // SAFETY: live slot, dropped once; the caller resets the hash words.
                unsafe { ptr::drop_in_place(self.entries.as_ptr().add(pos)) };
            }
        }
    }

    /// Iterates over live entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        (0..self.capacity())
            .filter(move |&pos| is_live(self.hash_at(pos)))
            .map(move |pos| {
                let (key, value) = self.entry_at(pos);
                (key, value)
            })
    }

    /// Iterates over keys in table order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Iterates over values in table order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }
}

impl<'a, K: Hash + Eq, V, S: BuildHasher> HashMap<'a, K, V, S> {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn hash_key<Q: Hash + ?Sized>(&self, key: &Q) -> u32 {
        let hash = (self.hasher.hash_one(key) as u32) & !DELETED;
        if hash == FREE {
            1
        } else {
            hash
        }
    }

    fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.len == 0 {
            return None;
        }
        let hash = self.hash_key(key);
        let mut pos = hash as usize & self.mask;
        let mut dist = 0;
        loop {
            let occupant = self.hash_at(pos);
            if occupant == FREE || dist > self.probe_distance(occupant, pos) {
                return None;
            }
            if occupant == hash && self.entry_at(pos).0.borrow() == key {
                return Some(pos);
            }
            pos = (pos + 1) & self.mask;
            dist += 1;
        }
    }

    /// Rebuilds the table with `capacity` slots, dropping tombstones.
    fn rehash(&mut self, capacity: usize) -> ContainerResult<()> {
        debug_assert!(capacity.is_power_of_two() && capacity > self.len);

        let allocator = self.allocator();
        let hashes = RawBuffer::<u32>::with_capacity(allocator, capacity)?;
        let entries = RawBuffer::with_capacity(allocator, capacity)?;
        // SAFETY: fresh storage for `capacity` hash words.
        unsafe { ptr::write_bytes(hashes.as_ptr(), 0, capacity) };

        let old_hashes = mem::replace(&mut self.hashes, hashes);
        let old_entries = mem::replace(&mut self.entries, entries);
        self.mask = capacity - 1;
        self.tombstones = 0;

        for pos in 0..old_hashes.capacity() {
            // SAFETY: the old hash words are all initialized.
            let hash = unsafe { *old_hashes.as_ptr().add(pos) };
            if is_live(hash) {
                // SAFETY: live slot; moved out once, the old buffer frees memory only.
                let entry = unsafe { ptr::read(old_entries.as_ptr().add(pos)) };
                self.insert_hashed(hash, entry);
            }
        }

        tracing::trace!(capacity, len = self.len, "hash map rehashed");
        Ok(())
    }

    /// Makes sure one more entry can be inserted.
    fn reserve_one(&mut self) -> ContainerResult<()> {
        let capacity = self.capacity();
        if capacity == 0 {
            return self.rehash(INITIAL_CAPACITY);
        }
        let threshold = capacity.saturating_mul(9);
        if (self.len + self.tombstones + 1).saturating_mul(10) < threshold {
            return Ok(());
        }
        if (self.len + 1).saturating_mul(10) >= threshold {
            let doubled = capacity
                .checked_mul(2)
                .ok_or(ContainerError::CapacityOverflow)?;
            self.rehash(doubled)
        } else {
            self.rehash(capacity)
        }
    }

    /// Grows the table so `count` entries fit without another rehash.
    ///
    /// # Errors
    ///
    /// Fails on overflow or if the table cannot be allocated.
    pub fn reserve(&mut self, count: usize) -> ContainerResult<()> {
        let mut capacity = self.capacity().max(INITIAL_CAPACITY);
        while count.saturating_mul(10) >= capacity.saturating_mul(9) {
            capacity = capacity
                .checked_mul(2)
                .ok_or(ContainerError::CapacityOverflow)?;
        }
        if capacity != self.capacity() {
            self.rehash(capacity)?;
        }
        Ok(())
    }

    /// Inserts or updates `key`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Fails if the table has to grow and cannot be allocated; the map is
    /// unchanged then.
    pub fn insert(&mut self, key: K, value: V) -> ContainerResult<Option<V>> {
        if let Some(pos) = self.find(&key) {
            return Ok(Some(mem::replace(&mut self.entry_at_mut(pos).1, value)));
        }
        self.reserve_one()?;
        let hash = self.hash_key(&key);
        self.insert_hashed(hash, (key, value));
        self.len += 1;
        Ok(None)
    }

    /// Inserts or updates `key`.
    ///
    /// # Errors
    ///
    /// Same as [`HashMap::insert`].
    pub fn set(&mut self, key: K, value: V) -> ContainerResult<()> {
        self.insert(key, value).map(drop)
    }

    /// Value for `key`.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).map(|pos| &self.entry_at(pos).1)
    }

    /// Mutable value for `key`.
    #[must_use]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = self.find(key)?;
        Some(&mut self.entry_at_mut(pos).1)
    }

    /// Value for `key`, or `default` if absent.
    #[must_use]
    pub fn get_or<'m, Q>(&'m self, key: &Q, default: &'m V) -> &'m V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).unwrap_or(default)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Removes `key`, leaving a tombstone, and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = self.find(key)?;
        // SAFETY: live slot; the tombstone written below marks it uninitialized.
        let (_key, value) = unsafe { ptr::read(self.entries.as_ptr().add(pos)) };
        let hash = self.hash_at(pos);
        self.set_hash_at(pos, hash | DELETED);
        self.len -= 1;
        self.tombstones += 1;
        Some(value)
    }
}

impl<K, V, S> Drop for HashMap<'_, K, V, S> {
    fn drop(&mut self) {
        self.drop_entries();
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for HashMap<'_, K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, S: Default> FromAllocator<'a> for HashMap<'a, K, V, S> {
    fn from_allocator(allocator: &'a dyn Allocator) -> Self {
        Self::with_hasher(allocator, S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::string_id::{IdentityBuildHasher, StringId32};
    use hearth_memory::HeapAllocator;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_insert_get_update() {
        let heap = HeapAllocator::new();
        let mut map: HashMap<u32, &str> = HashMap::new(&heap);
        assert_eq!(map.capacity(), 0);
        assert_eq!(map.get(&1), None);

        assert_eq!(map.insert(1, "one").unwrap(), None);
        assert_eq!(map.capacity(), INITIAL_CAPACITY);
        assert_eq!(map.insert(1, "uno").unwrap(), Some("one"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&"uno"));
        assert_eq!(*map.get_or(&2, &"none"), "none");

        *map.get_mut(&1).unwrap() = "eins";
        assert_eq!(map.get(&1), Some(&"eins"));
    }

    #[test]
    fn test_borrowed_lookup() {
        let heap = HeapAllocator::new();
        let mut map: HashMap<String, u32> = HashMap::new(&heap);
        map.set("grass".to_string(), 3).unwrap();
        assert!(map.has("grass"));
        assert_eq!(map.remove("grass"), Some(3));
        assert!(!map.has("grass"));
    }

    #[test]
    fn test_growth_keeps_entries() {
        let heap = HeapAllocator::new();
        let mut map: HashMap<u32, u32> = HashMap::new(&heap);
        for i in 0..14 {
            map.set(i, i * 10).unwrap();
        }
        assert_eq!(map.capacity(), 16);

        map.set(14, 140).unwrap();
        assert_eq!(map.capacity(), 32);
        for i in 0..1000 {
            map.set(i, i * 10).unwrap();
        }
        assert_eq!(map.len(), 1000);
        assert!(map.capacity().is_power_of_two());
        assert!((0..1000).all(|i| map.get(&i) == Some(&(i * 10))));
    }

    #[test]
    fn test_collisions_and_tombstones() {
        let heap = HeapAllocator::new();
        let mut map: HashMap<StringId32, u32, IdentityBuildHasher> =
            HashMap::with_hasher(&heap, IdentityBuildHasher::default());
        let key = |i: u32| StringId32::from_raw((i + 1) << 20);

        for i in 0..12 {
            map.set(key(i), i).unwrap();
        }
        for i in (0..12).step_by(2) {
            assert_eq!(map.remove(&key(i)), Some(i));
        }
        assert_eq!(map.len(), 6);
        assert_eq!(map.remove(&key(0)), None);
        for i in 0..12 {
            assert_eq!(map.get(&key(i)).copied(), (i % 2 == 1).then_some(i));
        }

        // Reinserting walks over the tombstones of the same cluster.
        for i in (0..12).step_by(2) {
            map.set(key(i), i + 100).unwrap();
        }
        assert_eq!(map.len(), 12);
        assert_eq!(map.capacity(), 16);
        assert_eq!(map.get(&key(4)), Some(&104));
        assert_eq!(map.get(&key(5)), Some(&5));
    }

    #[test]
    fn test_tombstone_churn_rehashes_in_place() {
        let heap = HeapAllocator::new();
        let mut map: HashMap<u32, u32> = HashMap::new(&heap);
        for i in 0..1000 {
            map.set(i, i).unwrap();
            assert_eq!(map.remove(&i), Some(i));
        }
        assert!(map.is_empty());
        assert_eq!(map.capacity(), INITIAL_CAPACITY);
    }

    #[test]
    fn test_reserve() {
        let heap = HeapAllocator::new();
        let mut map: HashMap<u32, u32> = HashMap::new(&heap);
        map.reserve(100).unwrap();
        let capacity = map.capacity();
        assert_eq!(capacity, 128);
        for i in 0..100 {
            map.set(i, i).unwrap();
        }
        assert_eq!(map.capacity(), capacity);
    }

    #[test]
    fn test_entries_dropped_once() {
        let drops = Rc::new(Cell::new(0));
        struct Counted(Rc<Cell<usize>>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let heap = HeapAllocator::new();
        {
            let mut map: HashMap<u32, Counted> = HashMap::new(&heap);
            for i in 0..40 {
                map.set(i, Counted(drops.clone())).unwrap();
            }
            map.set(0, Counted(drops.clone())).unwrap();
            assert_eq!(drops.get(), 1);

            drop(map.remove(&1));
            assert_eq!(drops.get(), 2);

            map.clear();
            assert_eq!(drops.get(), 41);
            assert!(map.is_empty());

            map.set(7, Counted(drops.clone())).unwrap();
        }
        assert_eq!(drops.get(), 42);
        assert_eq!(heap.allocation_count(), 0);
    }

    #[test]
    fn test_iter_visits_live_entries() {
        let heap = HeapAllocator::new();
        let mut map: HashMap<u32, u32> = HashMap::new(&heap);
        for i in 0..20 {
            map.set(i, i * 2).unwrap();
        }
        map.remove(&3);

        let mut seen: Vec<(u32, u32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        seen.sort_unstable();
        let expected: Vec<(u32, u32)> = (0..20).filter(|&i| i != 3).map(|i| (i, i * 2)).collect();
        assert_eq!(seen, expected);
        assert_eq!(map.keys().count(), 19);
        assert_eq!(map.values().sum::<u32>(), expected.iter().map(|(_, v)| v).sum::<u32>());
    }
}
