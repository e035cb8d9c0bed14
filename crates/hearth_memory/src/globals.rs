//! # Memory Globals
//!
//! The process-wide default heap and default scratch allocator.
//!
//! [`MemoryGlobals`] can be owned directly (tests, tools) or installed once
//! for the whole process with [`install`]. Shutting an owned instance down
//! releases the scratch ring first and then checks both allocators for
//! leaks.

#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::OnceLock;

use crate::allocator::Allocator;
use crate::config::{LeakPolicy, MemoryConfig};
use crate::error::{MemoryError, MemoryResult};
use crate::heap::HeapAllocator;
use crate::scratch::ScratchAllocator;

/// Default heap plus default scratch allocator drawing from it.
pub struct MemoryGlobals {
    /// Heap, leaked from a `Box` so the scratch allocator can borrow it for
    /// `'static`. Reclaimed in `teardown`.
    heap: NonNull<HeapAllocator>,
    /// `None` once torn down.
    scratch: Option<ScratchAllocator<'static>>,
    /// Leak policy applied when dropped without `shutdown`.
    leak_policy: LeakPolicy,
}

// SAFETY: both allocators are Sync and the heap pointer is uniquely owned.
unsafe impl Send for MemoryGlobals {}
// SAFETY: see above.
unsafe impl Sync for MemoryGlobals {}

impl MemoryGlobals {
    /// Creates the default heap and a scratch ring of `config.scratch_size`
    /// bytes carved from it.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] for an unusable configuration
    /// and propagates the failure of the ring allocation.
    pub fn init(config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;

        let heap = NonNull::from(Box::leak(Box::new(HeapAllocator::with_config(config))));
        // SAFETY: the heap stays allocated until `teardown`, which drops the
        // scratch allocator before reclaiming it.
        let heap_ref: &'static HeapAllocator = unsafe { heap.as_ref() };

        let scratch = match ScratchAllocator::new(heap_ref, config.scratch_size) {
            Ok(scratch) => scratch.with_debug_fill(config.debug_fill),
            Err(e) => {
                // SAFETY: nothing borrows the heap any more.
                drop(unsafe { Box::from_raw(heap.as_ptr()) });
                return Err(e);
            }
        };

        tracing::info!(
            scratch_size = scratch.ring_size(),
            leak_policy = ?config.leak_policy,
            "memory globals initialized"
        );

        Ok(Self {
            heap,
            scratch: Some(scratch),
            leak_policy: config.leak_policy,
        })
    }

    /// The default heap allocator.
    #[inline]
    #[must_use]
    pub fn default_allocator(&self) -> &HeapAllocator {
        // SAFETY: the heap outlives every borrow of `self`.
        unsafe { self.heap.as_ref() }
    }

    /// The default scratch allocator.
    ///
    /// # Panics
    ///
    /// Panics if called after shutdown, which safe code cannot do.
    #[inline]
    #[must_use]
    pub fn default_scratch_allocator(&self) -> &ScratchAllocator<'_> {
        match &self.scratch {
            Some(scratch) => scratch,
            None => unreachable!("memory globals used after shutdown"),
        }
    }

    /// Reports live allocations in either allocator.
    ///
    /// The scratch ring itself is an allocation of the default heap and is
    /// not counted.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Leaked`] for the first allocator with live
    /// allocations, scratch first.
    pub fn check_leaks(&self) -> MemoryResult<()> {
        let scratch = self.default_scratch_allocator();
        scratch.check_leaks()?;

        let heap = self.default_allocator();
        let stats = heap.stats();
        // SAFETY: the ring is a live heap block.
        let ring_span = unsafe { HeapAllocator::block_span(scratch.ring_ptr()) };
        let count = stats.allocation_count.saturating_sub(1);
        if count == 0 {
            Ok(())
        } else {
            Err(MemoryError::Leaked {
                allocator: "heap",
                count,
                bytes: stats.total_allocated_bytes.saturating_sub(ring_span),
            })
        }
    }

    /// Tears both allocators down, scratch first, and reports leaks.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Leaked`] if either allocator still had live
    /// allocations. The scratch report wins when both leak.
    pub fn shutdown(mut self) -> MemoryResult<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> MemoryResult<()> {
        let Some(scratch) = self.scratch.take() else {
            return Ok(());
        };
        let scratch_report = scratch.finish();

        // SAFETY: the heap was leaked in `init`, the scratch allocator that
        // borrowed it is gone, and the remaining borrows are tied to `self`.
        let heap = unsafe { Box::from_raw(self.heap.as_ptr()) };
        let heap_report = heap.finish();

        tracing::info!("memory globals shut down");
        scratch_report.and(heap_report)
    }
}

impl Drop for MemoryGlobals {
    fn drop(&mut self) {
        if let Err(leak) = self.teardown() {
            tracing::error!(%leak, "memory globals dropped with live allocations");
            if self.leak_policy == LeakPolicy::Fatal && !std::thread::panicking() {
                panic!("{leak}");
            }
        }
    }
}

static INSTALLED: OnceLock<MemoryGlobals> = OnceLock::new();

/// Installs the process-wide memory globals.
///
/// The installed globals live until the process exits.
///
/// # Errors
///
/// Returns [`MemoryError::AlreadyInitialized`] on a second call, and
/// propagates configuration and allocation failures.
pub fn install(config: &MemoryConfig) -> MemoryResult<&'static MemoryGlobals> {
    if INSTALLED.get().is_some() {
        return Err(MemoryError::AlreadyInitialized);
    }
    let fresh = MemoryGlobals::init(config)?;
    INSTALLED
        .set(fresh)
        .map_err(|_rejected| MemoryError::AlreadyInitialized)?;
    globals()
}

/// The installed process-wide globals.
///
/// # Errors
///
/// Returns [`MemoryError::NotInitialized`] before [`install`].
pub fn globals() -> MemoryResult<&'static MemoryGlobals> {
    INSTALLED.get().ok_or(MemoryError::NotInitialized)
}

/// The process-wide default heap allocator.
///
/// # Errors
///
/// Returns [`MemoryError::NotInitialized`] before [`install`].
pub fn default_allocator() -> MemoryResult<&'static HeapAllocator> {
    Ok(globals()?.default_allocator())
}

/// The process-wide default scratch allocator.
///
/// # Errors
///
/// Returns [`MemoryError::NotInitialized`] before [`install`].
pub fn default_scratch_allocator() -> MemoryResult<&'static ScratchAllocator<'static>> {
    Ok(globals()?.default_scratch_allocator())
}

/// Checks the process-wide allocators for live allocations.
///
/// # Errors
///
/// Returns [`MemoryError::NotInitialized`] before [`install`] and
/// [`MemoryError::Leaked`] if either allocator has live allocations.
pub fn check_leaks() -> MemoryResult<()> {
    globals()?.check_leaks()
}
