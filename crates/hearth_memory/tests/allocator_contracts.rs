//! Integration tests for the allocator contracts.

#![allow(unsafe_code)]

use std::collections::VecDeque;

use hearth_memory::{
    Allocator, HeapAllocator, LinearAllocator, MemoryError, ScratchAllocator,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A live block under test: address, length and the byte it was filled with.
#[derive(Clone, Copy)]
struct Block {
    addr: *mut u8,
    len: usize,
    tag: u8,
}

impl Block {
    fn fill(addr: *mut u8, len: usize, tag: u8) -> Self {
        unsafe { std::ptr::write_bytes(addr, tag, len) };
        Self { addr, len, tag }
    }

    fn intact(&self) -> bool {
        unsafe { std::slice::from_raw_parts(self.addr, self.len) }
            .iter()
            .all(|&b| b == self.tag)
    }

    fn overlaps(&self, other: &Self) -> bool {
        let (a, b) = (self.addr as usize, other.addr as usize);
        a < b + other.len && b < a + self.len
    }
}

#[test]
fn test_heap_round_trip_restores_statistics() {
    let heap = HeapAllocator::new();

    for align in [1, 2, 4, 8, 16, 32, 64, 256, 4096] {
        for size in [0, 1, 3, 4, 7, 64, 1000, 65_536] {
            let before = heap.stats();
            let block = heap.allocate(size, align).unwrap();

            assert_eq!(block.as_ptr() as usize % align, 0, "size {size} align {align}");
            assert!(unsafe { heap.allocated_size(block) }.unwrap() >= size);

            unsafe { heap.deallocate(block.as_ptr()) };
            assert_eq!(heap.stats(), before);
        }
    }

    heap.finish().unwrap();
}

#[test]
fn test_linear_regions_increase_until_capacity() {
    let heap = HeapAllocator::new();
    let mut linear = LinearAllocator::new(&heap, 4096).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let mut first = None;
    let mut consumed = 0;
    let mut previous_end = 0usize;

    loop {
        let size = rng.gen_range(1..=200);
        let align = 1 << rng.gen_range(0..=5);
        let result = linear.allocate(size, align);

        if consumed + size + align > 4096 {
            assert!(matches!(result, Err(MemoryError::OutOfMemory { .. })));
            break;
        }

        let block = result.unwrap();
        let addr = block.as_ptr() as usize;
        assert_eq!(addr % align, 0);
        assert!(addr >= previous_end);
        previous_end = addr + size;
        consumed += size + align;
        first.get_or_insert((block, align));
    }

    let (first_block, first_align) = first.unwrap();
    linear.clear();
    assert_eq!(linear.allocate(8, first_align).unwrap(), first_block);
    linear.clear();
}

#[test]
fn test_scratch_random_interleaving_never_overlaps() {
    const RING: usize = 4096;

    let heap = HeapAllocator::new();
    let scratch = ScratchAllocator::new(&heap, RING).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0x5C7A_7C4E);
    let mut live: VecDeque<Block> = VecDeque::new();

    // At most 24 live blocks of up to 256 + 32 + 4 bytes: mostly ring, some fallback.
    for step in 0..20_000u32 {
        let allocate = live.is_empty() || (live.len() < 24 && rng.gen_bool(0.55));

        if allocate {
            let size = rng.gen_range(1..=256);
            let align = [1, 4, 8, 16, 32][rng.gen_range(0..5)];
            let ptr = scratch.allocate(size, align).unwrap();
            assert_eq!(ptr.as_ptr() as usize % align, 0);

            #[allow(clippy::cast_possible_truncation)]
            let block = Block::fill(ptr.as_ptr(), size, step as u8);
            assert!(live.iter().all(|other| !block.overlaps(other)));
            live.push_back(block);
        } else {
            // Mostly oldest first, sometimes out of order.
            let index = if rng.gen_bool(0.8) {
                0
            } else {
                rng.gen_range(0..live.len())
            };
            let block = live.remove(index).unwrap();
            assert!(block.intact(), "block overwritten at step {step}");
            unsafe { scratch.deallocate(block.addr) };
        }
    }

    while let Some(block) = live.pop_front() {
        assert!(block.intact());
        unsafe { scratch.deallocate(block.addr) };
    }

    assert_eq!(scratch.allocate_cursor(), scratch.free_cursor());
    assert_eq!(scratch.total_allocated_bytes(), Some(0));
    drop(scratch);
    heap.finish().unwrap();
}

#[test]
fn test_scratch_fallback_leaves_ring_consistent() {
    let heap = HeapAllocator::new();
    let scratch = ScratchAllocator::new(&heap, 512).unwrap();

    // Larger than the whole ring.
    let big = scratch.allocate(2048, 16).unwrap();
    assert!(!scratch.contains(big.as_ptr()));

    // Fill the ring with outstanding blocks until one spills over.
    let mut ring_blocks = Vec::new();
    let spilled = loop {
        let block = scratch.allocate(60, 4).unwrap();
        if !scratch.contains(block.as_ptr()) {
            break block;
        }
        ring_blocks.push(Block::fill(block.as_ptr(), 60, 0xA5));
    };
    assert_eq!(scratch.fallback_count(), 2);

    let (allocate_cursor, free_cursor) = (scratch.allocate_cursor(), scratch.free_cursor());
    unsafe {
        scratch.deallocate(big.as_ptr());
        scratch.deallocate(spilled.as_ptr());
    }
    assert_eq!(scratch.allocate_cursor(), allocate_cursor);
    assert_eq!(scratch.free_cursor(), free_cursor);

    for block in ring_blocks {
        assert!(block.intact());
        unsafe { scratch.deallocate(block.addr) };
    }
    assert_eq!((scratch.allocate_cursor(), scratch.free_cursor()), (0, 0));
    drop(scratch);
    heap.finish().unwrap();
}

#[test]
fn test_scratch_shared_between_threads() {
    let heap = HeapAllocator::new();
    let scratch = ScratchAllocator::new(&heap, 16 * 1024).unwrap();

    std::thread::scope(|scope| {
        for seed in 0..4u64 {
            let scratch = &scratch;
            scope.spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let mut mine = VecDeque::new();
                for step in 0..2_000u32 {
                    if mine.len() < 8 && rng.gen_bool(0.6) {
                        let size = rng.gen_range(1..=128);
                        let ptr = scratch.allocate(size, 8).unwrap();
                        #[allow(clippy::cast_possible_truncation)]
                        mine.push_back(Block::fill(ptr.as_ptr(), size, (seed as u8) ^ (step as u8)));
                    } else if let Some(block) = mine.pop_front() {
                        assert!(block.intact());
                        unsafe { scratch.deallocate(block.addr) };
                    }
                }
                for block in mine {
                    assert!(block.intact());
                    unsafe { scratch.deallocate(block.addr) };
                }
            });
        }
    });

    assert_eq!(scratch.total_allocated_bytes(), Some(0));
    drop(scratch);
    heap.finish().unwrap();
}
