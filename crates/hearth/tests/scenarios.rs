//! End-to-end scenarios through the facade crate.

#![allow(unsafe_code)]

use hearth::containers::IdentityBuildHasher;
use hearth::memory::LeakPolicy;
use hearth::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn test_config() -> MemoryConfig {
    MemoryConfig {
        scratch_size: 64 * 1024,
        leak_policy: LeakPolicy::Log,
        ..MemoryConfig::default()
    }
}

#[test]
fn test_heap_blocks_released_in_reverse_leave_nothing() {
    let globals = MemoryGlobals::init(&test_config()).unwrap();
    let heap = globals.default_allocator();
    let baseline = heap.stats();
    let mut rng = ChaCha8Rng::seed_from_u64(0xa11c);

    let mut blocks = Vec::with_capacity(100);
    for _ in 0..100 {
        let size = rng.gen_range(1..=4096);
        let align = [1, 4, 8, 16, 64][rng.gen_range(0..5)];
        let block = heap.allocate(size, align).unwrap();
        assert_eq!(block.as_ptr() as usize % align, 0);
        unsafe { block.as_ptr().write_bytes(0x5a, size) };
        blocks.push(block);
    }
    assert_eq!(heap.stats().allocation_count, baseline.allocation_count + 100);

    for block in blocks.into_iter().rev() {
        unsafe { heap.deallocate(block.as_ptr()) };
    }
    assert_eq!(heap.stats(), baseline);
    globals.shutdown().unwrap();
}

#[test]
fn test_scratch_reuses_reclaimed_space() {
    let heap = HeapAllocator::new();
    let scratch = ScratchAllocator::new(&heap, 1024).unwrap();
    // A 64-byte request takes 68 ring bytes: 4-byte header plus payload.
    let span = 68;

    let first: Vec<_> = (0..10).map(|_| scratch.allocate(64, 4).unwrap()).collect();
    assert!(first.iter().all(|block| scratch.contains(block.as_ptr())));

    for block in &first[..5] {
        unsafe { scratch.deallocate(block.as_ptr()) };
    }
    assert_eq!(scratch.free_cursor(), 5 * span);

    let second: Vec<_> = (0..5).map(|_| scratch.allocate(64, 4).unwrap()).collect();
    assert!(second.iter().all(|block| scratch.contains(block.as_ptr())));
    assert_eq!(scratch.fallback_count(), 0);

    // The tail is exhausted; these wrap into the reclaimed front of the ring.
    let wrapped: Vec<_> = (0..4).map(|_| scratch.allocate(64, 4).unwrap()).collect();
    assert!(wrapped.iter().all(|block| scratch.contains(block.as_ptr())));
    assert!(wrapped.iter().all(|block| block.as_ptr() < first[5].as_ptr()));
    assert_eq!(scratch.allocate_cursor(), 4 * span);
    assert_eq!(scratch.fallback_count(), 0);

    // One more would end exactly on the free cursor, so it goes to the heap.
    let overflow = scratch.allocate(64, 4).unwrap();
    assert!(!scratch.contains(overflow.as_ptr()));
    assert_eq!(scratch.fallback_count(), 1);

    for block in first[5..].iter().chain(&second).chain(&wrapped).chain([&overflow]) {
        unsafe { scratch.deallocate(block.as_ptr()) };
    }
    assert_eq!(scratch.allocate_cursor(), scratch.free_cursor());
    scratch.finish().unwrap();
    heap.finish().unwrap();
}

#[test]
fn test_vector_push_then_pop_thousand() {
    let globals = MemoryGlobals::init(&test_config()).unwrap();
    {
        let mut numbers: Vector<i32> = Vector::new(globals.default_allocator());
        for i in 0..1000 {
            numbers.push_back(i).unwrap();
        }
        assert_eq!(numbers.len(), 1000);
        assert_eq!(numbers.back(), Some(&999));

        for expected in (0..1000).rev() {
            assert_eq!(numbers.pop_back(), Some(expected));
        }
        assert!(numbers.is_empty());
    }
    globals.shutdown().unwrap();
}

#[test]
fn test_colliding_string_ids_stay_retrievable() {
    let heap = HeapAllocator::new();
    {
        let mut map: HashMap<StringId32, i32, IdentityBuildHasher> =
            HashMap::with_hasher(&heap, IdentityBuildHasher::default());
        // Low 16 bits all zero: every key starts probing at slot 0.
        let key = |i: i32| StringId32::from_raw((i as u32 + 1) << 16);

        for i in 0..20 {
            map.set(key(i), i * 7).unwrap();
        }
        assert_eq!(map.len(), 20);
        assert!((0..20).all(|i| map.get(&key(i)) == Some(&(i * 7))));

        for i in (0..20).step_by(2) {
            assert_eq!(map.remove(&key(i)), Some(i * 7));
        }
        assert_eq!(map.len(), 10);
        for i in 0..20 {
            let expected = (i % 2 == 1).then_some(i * 7);
            assert_eq!(map.get(&key(i)).copied(), expected);
        }
    }
    heap.finish().unwrap();
}

#[test]
fn test_scratch_containers_on_default_globals() {
    let globals = MemoryGlobals::init(&test_config()).unwrap();
    {
        let scratch = globals.default_scratch_allocator();
        let mut visible: Vector<StringId32> = Vector::new(scratch);
        let mut lods: SortMap<StringId32, u8> = SortMap::new(scratch);
        for name in ["rock", "tree", "house", "river"] {
            let id = StringId32::new(name);
            visible.push_back(id).unwrap();
            lods.set(id, u8::try_from(name.len()).unwrap()).unwrap();
        }
        lods.sort();
        assert!(visible.iter().all(|id| lods.has(id)));
        assert_eq!(lods.get(&StringId32::new("house")), Some(&5));

        assert!(globals.check_leaks().is_err());
    }
    globals.check_leaks().unwrap();
    globals.shutdown().unwrap();
}
