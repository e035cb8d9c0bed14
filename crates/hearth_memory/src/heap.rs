//! # Heap Allocator
//!
//! General-purpose allocator on top of the system heap. Every block carries a
//! size header so the allocator can report block sizes and keep exact
//! allocation statistics for leak checks.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use parking_lot::Mutex;

use crate::align::check_alignment;
use crate::allocator::Allocator;
use crate::config::{LeakPolicy, MemoryConfig};
use crate::error::{MemoryError, MemoryResult};
use crate::header::{self, HEADER_SIZE, MAX_SPAN, MIN_ALIGN};

/// Byte written over fresh payloads when debug fill is on.
pub const FRESH_FILL: u8 = 0xCD;

/// Byte written over released blocks when debug fill is on.
pub const FREED_FILL: u8 = 0xDD;

/// Allocation statistics of a [`HeapAllocator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Live allocations.
    pub allocation_count: usize,
    /// Bytes held by live allocations, headers and padding included.
    pub total_allocated_bytes: usize,
}

/// Thread-safe allocator backed by the system heap.
///
/// Each request reserves `size + align + 4` bytes: room for the size header
/// and the worst-case alignment padding. Statistics are updated under a
/// mutex, so concurrent allocation from many threads keeps exact totals.
///
/// # Leaks
///
/// Dropping the allocator with live allocations is reported. Under
/// [`LeakPolicy::Fatal`] it also panics. Use [`HeapAllocator::finish`] to
/// receive the report as a value instead.
///
/// # Example
///
/// ```rust,ignore
/// let heap = HeapAllocator::new();
/// let block = heap.allocate(64, 16)?;
/// unsafe { heap.deallocate(block.as_ptr()) };
/// heap.finish()?;
/// ```
pub struct HeapAllocator {
    /// Live allocation statistics.
    stats: Mutex<HeapStats>,
    /// What dropping with live allocations does.
    leak_policy: LeakPolicy,
    /// Fill fresh and released blocks with marker bytes.
    debug_fill: bool,
    /// Cleared by `finish` so the drop check does not run twice.
    armed: bool,
}

impl HeapAllocator {
    /// Creates a heap allocator with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&MemoryConfig::default())
    }

    /// Creates a heap allocator with the leak policy and debug fill of `config`.
    #[must_use]
    pub fn with_config(config: &MemoryConfig) -> Self {
        Self {
            stats: Mutex::new(HeapStats::default()),
            leak_policy: config.leak_policy,
            debug_fill: config.debug_fill,
            armed: true,
        }
    }

    /// Overrides the leak policy.
    #[must_use]
    pub fn with_leak_policy(mut self, leak_policy: LeakPolicy) -> Self {
        self.leak_policy = leak_policy;
        self
    }

    /// Snapshot of the allocation statistics.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        *self.stats.lock()
    }

    /// Number of live allocations.
    #[inline]
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.stats.lock().allocation_count
    }

    /// Returns the leak policy.
    #[inline]
    #[must_use]
    pub const fn leak_policy(&self) -> LeakPolicy {
        self.leak_policy
    }

    /// Reports live allocations.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Leaked`] if any allocation is still live.
    pub fn check_leaks(&self) -> MemoryResult<()> {
        let stats = self.stats();
        if stats.allocation_count == 0 {
            Ok(())
        } else {
            Err(MemoryError::Leaked {
                allocator: "heap",
                count: stats.allocation_count,
                bytes: stats.total_allocated_bytes,
            })
        }
    }

    /// Shuts the allocator down, returning the leak report instead of
    /// applying the leak policy.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Leaked`] if any allocation is still live. The
    /// leaked blocks are not reclaimed.
    pub fn finish(mut self) -> MemoryResult<()> {
        self.armed = false;
        self.check_leaks()
    }

    /// Bytes a live block occupies, header and padding included.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block returned by this allocator.
    pub(crate) unsafe fn block_span(ptr: NonNull<u8>) -> usize {
        header::header_of(ptr.as_ptr()).read() as usize
    }

    /// Layout handed to the system heap for a block spanning `span` bytes.
    fn block_layout(span: usize) -> MemoryResult<Layout> {
        Layout::from_size_align(span, MIN_ALIGN).map_err(|_| MemoryError::TooLarge {
            requested: span,
            limit: MAX_SPAN,
        })
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for HeapAllocator {
    fn allocate(&self, size: usize, align: usize) -> MemoryResult<NonNull<u8>> {
        check_alignment(align)?;
        let align = header::effective_align(align);

        let span = size
            .checked_add(align + HEADER_SIZE)
            .filter(|&span| span <= MAX_SPAN)
            .ok_or(MemoryError::TooLarge {
                requested: size,
                limit: MAX_SPAN.saturating_sub(align + HEADER_SIZE),
            })?;
        let layout = Self::block_layout(span)?;

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(raw) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };

        let payload = header::payload_for(raw.as_ptr(), align);
        // SAFETY: the block spans `span` bytes from `raw`. The payload is at
        // most `align` bytes past `raw`, so header, padding and `size` payload
        // bytes all lie inside it.
        unsafe {
            #[allow(clippy::cast_possible_truncation)]
            header::write(raw.as_ptr(), payload, span as u32);
            if self.debug_fill {
                ptr::write_bytes(payload, FRESH_FILL, size);
            }
        }

        {
            let mut stats = self.stats.lock();
            stats.allocation_count += 1;
            stats.total_allocated_bytes += span;
        }

        // SAFETY: payload lies inside a non-null allocation.
        Ok(unsafe { NonNull::new_unchecked(payload) })
    }

    unsafe fn deallocate(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }

        let header = header::header_of(ptr);
        let span = header.read() as usize;

        {
            let mut stats = self.stats.lock();
            debug_assert!(stats.allocation_count > 0, "heap release without allocation");
            stats.allocation_count -= 1;
            stats.total_allocated_bytes -= span;
        }

        if self.debug_fill {
            ptr::write_bytes(header.cast::<u8>(), FREED_FILL, span);
        }

        // SAFETY: the header sits at the start of a block allocated with
        // exactly this layout.
        alloc::dealloc(
            header.cast::<u8>(),
            Layout::from_size_align_unchecked(span, MIN_ALIGN),
        );
    }

    unsafe fn allocated_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        let header = header::header_of(ptr.as_ptr());
        Some(header.read() as usize - (ptr.as_ptr() as usize - header as usize))
    }

    fn total_allocated_bytes(&self) -> Option<usize> {
        Some(self.stats.lock().total_allocated_bytes)
    }
}

impl Drop for HeapAllocator {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(leak) = self.check_leaks() {
            tracing::error!(%leak, "heap allocator dropped with live allocations");
            if self.leak_policy == LeakPolicy::Fatal && !std::thread::panicking() {
                panic!("{leak}");
            }
        }
    }
}
