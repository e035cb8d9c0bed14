//! # Scratch Allocator
//!
//! A ring buffer for short-lived allocations that are released roughly in
//! the order they were made.
//!
//! ```text
//!          free                 allocate
//!           v                      v
//! [ ....... | live | live | live | ............ ]
//! ```
//!
//! Allocation carves blocks off at the `allocate` cursor and wraps to the
//! front when the tail is too short. Release marks a block free; the `free`
//! cursor then walks forward over every leading free block. When the ring
//! cannot fit a request the backing allocator serves it instead.
//!
//! `allocate == free` always means the ring is empty, so a block may never
//! bring the allocate cursor onto the free cursor.

#![allow(unsafe_code)]

use std::ptr::{self, NonNull};

use parking_lot::Mutex;

use crate::align::{align_up, check_alignment};
use crate::allocator::Allocator;
use crate::error::{MemoryError, MemoryResult};
use crate::header::{self, FREE_BIT, HEADER_SIZE, MAX_SPAN, MIN_ALIGN};
use crate::heap::{FREED_FILL, FRESH_FILL};

/// Smallest ring size accepted.
pub const MIN_RING_SIZE: usize = 16;

/// Largest ring size accepted; every span must fit a header word.
pub const MAX_RING_SIZE: usize = MAX_SPAN & !(MIN_ALIGN - 1);

/// Alignment of the ring buffer itself.
const RING_ALIGN: usize = 16;

/// Ring cursors, as byte offsets from the start of the ring.
#[derive(Debug, Default)]
struct Cursors {
    /// Where the next block goes.
    allocate: usize,
    /// Oldest block that has not been released.
    free: usize,
    /// Requests the ring could not hold.
    fallbacks: u64,
}

/// Ring-buffer allocator with fallback to a backing allocator.
///
/// All operations are serialized by an internal mutex, so one scratch
/// allocator can serve many threads as long as its backing allocator can.
///
/// # Example
///
/// ```rust,ignore
/// let heap = HeapAllocator::new();
/// let scratch = ScratchAllocator::new(&heap, 64 * 1024)?;
///
/// let tmp = scratch.allocate(512, 16)?;
/// // ... short-lived work ...
/// unsafe { scratch.deallocate(tmp.as_ptr()) };
/// ```
pub struct ScratchAllocator<'a> {
    /// Source of the ring and of every request the ring cannot hold.
    backing: &'a (dyn Allocator + Sync),
    /// Start of the ring.
    begin: NonNull<u8>,
    /// Ring size in bytes, a multiple of 4.
    size: usize,
    /// Cursor state.
    cursors: Mutex<Cursors>,
    /// Fill fresh and released blocks with marker bytes.
    debug_fill: bool,
    /// Cleared by `finish` so the drop check does not run twice.
    armed: bool,
}

// SAFETY: the ring is only touched under `cursors`, and the backing
// allocator is required to be `Sync`.
unsafe impl Send for ScratchAllocator<'_> {}
// SAFETY: see above.
unsafe impl Sync for ScratchAllocator<'_> {}

impl<'a> ScratchAllocator<'a> {
    /// Creates a scratch allocator with a ring of `size` bytes (rounded up to
    /// a multiple of 4) taken from `backing`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if the size is below
    /// [`MIN_RING_SIZE`] or above [`MAX_RING_SIZE`], and propagates the
    /// failure of the ring allocation.
    pub fn new(backing: &'a (dyn Allocator + Sync), size: usize) -> MemoryResult<Self> {
        if !(MIN_RING_SIZE..=MAX_RING_SIZE).contains(&size) {
            return Err(MemoryError::InvalidConfig(format!(
                "scratch ring size {size} must be between {MIN_RING_SIZE} and {MAX_RING_SIZE}"
            )));
        }
        let size = align_up(size, MIN_ALIGN);
        let begin = backing.allocate(size, RING_ALIGN)?;
        tracing::debug!(size, "scratch allocator created");

        Ok(Self {
            backing,
            begin,
            size,
            cursors: Mutex::new(Cursors::default()),
            debug_fill: cfg!(debug_assertions),
            armed: true,
        })
    }

    /// Turns marker-byte filling on or off.
    #[must_use]
    pub fn with_debug_fill(mut self, debug_fill: bool) -> Self {
        self.debug_fill = debug_fill;
        self
    }

    /// Ring size in bytes.
    #[inline]
    #[must_use]
    pub const fn ring_size(&self) -> usize {
        self.size
    }

    /// Offset of the allocate cursor.
    #[inline]
    #[must_use]
    pub fn allocate_cursor(&self) -> usize {
        self.cursors.lock().allocate
    }

    /// Offset of the free cursor.
    #[inline]
    #[must_use]
    pub fn free_cursor(&self) -> usize {
        self.cursors.lock().free
    }

    /// Number of requests served by the backing allocator so far.
    #[inline]
    #[must_use]
    pub fn fallback_count(&self) -> u64 {
        self.cursors.lock().fallbacks
    }

    /// Returns true if `ptr` points into the ring.
    #[inline]
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let begin = self.begin.as_ptr() as usize;
        (begin..begin + self.size).contains(&(ptr as usize))
    }

    /// Start of the ring buffer, as handed out by the backing allocator.
    pub(crate) fn ring_ptr(&self) -> NonNull<u8> {
        self.begin
    }

    /// Reports blocks still live in the ring.
    ///
    /// Blocks served by the backing allocator are not counted here; they
    /// show up in the backing allocator's own report.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Leaked`] if the ring is not empty.
    pub fn check_leaks(&self) -> MemoryResult<()> {
        let cursors = self.cursors.lock();
        if cursors.allocate == cursors.free {
            return Ok(());
        }

        let (mut count, mut bytes) = (0, 0);
        let mut at = cursors.free;
        while at != cursors.allocate {
            let word = self.word_at(at);
            let span = (word & !FREE_BIT) as usize;
            if word & FREE_BIT == 0 {
                count += 1;
                bytes += span;
            }
            at = self.wrap(at + span);
        }

        Err(MemoryError::Leaked {
            allocator: "scratch",
            count,
            bytes,
        })
    }

    /// Shuts the allocator down and returns its ring to the backing
    /// allocator, reporting leaks as a value.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Leaked`] if the ring was not empty.
    pub fn finish(mut self) -> MemoryResult<()> {
        self.armed = false;
        self.check_leaks()
    }

    /// Maps the end of the ring back to its start.
    #[inline]
    const fn wrap(&self, offset: usize) -> usize {
        if offset == self.size {
            0
        } else {
            offset
        }
    }

    /// Reads the header word at a ring offset.
    #[inline]
    fn word_at(&self, offset: usize) -> u32 {
        debug_assert!(offset < self.size && offset % MIN_ALIGN == 0);
        // SAFETY: cursors and block boundaries are word-aligned offsets
        // inside the ring.
        unsafe { self.begin.as_ptr().add(offset).cast::<u32>().read() }
    }

    /// Carves a block out of the ring, or returns `None` if it does not fit.
    ///
    /// `size` is already a multiple of 4 and `align` at least 4.
    fn reserve(&self, cursors: &mut Cursors, size: usize, align: usize) -> Option<NonNull<u8>> {
        let begin = self.begin.as_ptr();
        let base = begin as usize;
        let placement = |header: usize| -> Option<(usize, usize)> {
            let payload = align_up(base + header + HEADER_SIZE, align) - base;
            Some((payload, payload.checked_add(size)?))
        };

        let mut header = cursors.allocate;
        let (mut payload, mut end) = placement(header)?;
        let mut skipped_tail = None;

        if cursors.allocate >= cursors.free {
            if end > self.size || payload >= self.size {
                // Tail too short: leave it as a free filler block and wrap.
                // A payload must start inside the ring, even an empty one.
                skipped_tail = Some(cursors.allocate);
                header = 0;
                (payload, end) = placement(header)?;
                if end >= cursors.free {
                    return None;
                }
            } else if end == self.size && cursors.free == 0 {
                return None;
            }
        } else if end >= cursors.free {
            return None;
        }

        // SAFETY: every offset below was checked against the ring size and
        // the free cursor, so the writes land in unused ring memory.
        unsafe {
            if let Some(tail) = skipped_tail {
                #[allow(clippy::cast_possible_truncation)]
                let span = (self.size - tail) as u32;
                begin.add(tail).cast::<u32>().write(span | FREE_BIT);
            }
            #[allow(clippy::cast_possible_truncation)]
            header::write(begin.add(header), begin.add(payload), (end - header) as u32);
        }
        cursors.allocate = self.wrap(end);

        // SAFETY: payload lies inside the ring.
        Some(unsafe { NonNull::new_unchecked(begin.add(payload)) })
    }

    /// Moves the free cursor past every released block at its position.
    fn advance_free(&self, cursors: &mut Cursors) {
        while cursors.free != cursors.allocate {
            let word = self.word_at(cursors.free);
            if word & FREE_BIT == 0 {
                break;
            }
            cursors.free = self.wrap(cursors.free + (word & !FREE_BIT) as usize);
        }
        if cursors.free == cursors.allocate {
            cursors.free = 0;
            cursors.allocate = 0;
        }
    }
}

impl Allocator for ScratchAllocator<'_> {
    fn allocate(&self, size: usize, align: usize) -> MemoryResult<NonNull<u8>> {
        check_alignment(align)?;
        let align = header::effective_align(align);
        let rounded = size.checked_add(MIN_ALIGN - 1).map(|s| s & !(MIN_ALIGN - 1));

        let mut cursors = self.cursors.lock();
        if let Some(block) = rounded.and_then(|rounded| self.reserve(&mut cursors, rounded, align)) {
            drop(cursors);
            if self.debug_fill {
                // SAFETY: the block has at least `size` payload bytes.
                unsafe { ptr::write_bytes(block.as_ptr(), FRESH_FILL, size) };
            }
            return Ok(block);
        }
        cursors.fallbacks += 1;
        drop(cursors);

        tracing::debug!(size, align, "scratch ring full, using backing allocator");
        self.backing.allocate(size, align)
    }

    unsafe fn deallocate(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        if !self.contains(ptr) {
            self.backing.deallocate(ptr);
            return;
        }

        let mut cursors = self.cursors.lock();
        let header = header::header_of(ptr);
        let word = header.read();
        if word & FREE_BIT != 0 {
            drop(cursors);
            tracing::error!(?ptr, "scratch block released twice");
            if cfg!(debug_assertions) {
                panic!("scratch block {ptr:?} released twice");
            }
            return;
        }

        if self.debug_fill {
            let payload_len = word as usize - (ptr as usize - header as usize);
            ptr::write_bytes(ptr, FREED_FILL, payload_len);
        }
        header.write(word | FREE_BIT);
        self.advance_free(&mut cursors);
    }

    unsafe fn allocated_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        if !self.contains(ptr.as_ptr()) {
            return self.backing.allocated_size(ptr);
        }
        let _cursors = self.cursors.lock();
        let header = header::header_of(ptr.as_ptr());
        let span = (header.read() & !FREE_BIT) as usize;
        Some(span - (ptr.as_ptr() as usize - header as usize))
    }

    fn total_allocated_bytes(&self) -> Option<usize> {
        let cursors = self.cursors.lock();
        Some(if cursors.allocate >= cursors.free {
            cursors.allocate - cursors.free
        } else {
            self.size - cursors.free + cursors.allocate
        })
    }
}

impl Drop for ScratchAllocator<'_> {
    fn drop(&mut self) {
        let report = if self.armed { self.check_leaks() } else { Ok(()) };

        // SAFETY: the ring came from `backing` in `new` and is released once.
        unsafe { self.backing.deallocate(self.begin.as_ptr()) };

        if let Err(leak) = report {
            tracing::error!(%leak, "scratch allocator dropped with live blocks");
            if cfg!(debug_assertions) && !std::thread::panicking() {
                panic!("{leak}");
            }
        }
    }
}
