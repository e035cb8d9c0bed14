//! # HEARTH Memory
//!
//! The allocator layer of the engine. Nothing in the engine talks to the
//! system heap directly: every allocation goes through an [`Allocator`]
//! passed in by the caller.
//!
//! ## Allocators
//!
//! | Allocator | Use | Release |
//! |-----------|-----|---------|
//! | [`HeapAllocator`] | general purpose, thread-safe | individual |
//! | [`LinearAllocator`] | per-frame / per-task bump | all at once |
//! | [`ScratchAllocator`] | short-lived, mostly FIFO | individual |
//! | [`ProxyAllocator`] | names a subsystem for the profiler | forwarded |
//!
//! ## Architecture Rules
//!
//! 1. **Explicit allocators** - containers hold a reference to the allocator they draw from
//! 2. **Leaks are errors** - heap and scratch allocators check for live blocks at shutdown
//! 3. **No silent misuse** - contract violations assert in debug builds
//!
//! ## Example
//!
//! ```rust,ignore
//! use hearth_memory::{MemoryConfig, MemoryGlobals, Allocator};
//!
//! let globals = MemoryGlobals::init(&MemoryConfig::default())?;
//! let block = globals.default_scratch_allocator().allocate(256, 16)?;
//! unsafe { globals.default_scratch_allocator().deallocate(block.as_ptr()) };
//! globals.shutdown()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod align;
pub mod allocator;
pub mod boxed;
pub mod config;
pub mod error;
pub mod globals;
mod header;
pub mod heap;
pub mod linear;
pub mod profiler;
pub mod proxy;
pub mod scratch;

pub use allocator::{Allocator, DEFAULT_ALIGN};
pub use boxed::{construct_in, destroy_in, AllocBox};
pub use config::{LeakPolicy, MemoryConfig, DEFAULT_SCRATCH_SIZE};
pub use error::{MemoryError, MemoryResult};
pub use globals::{
    check_leaks, default_allocator, default_scratch_allocator, globals, install, MemoryGlobals,
};
pub use heap::{HeapAllocator, HeapStats};
pub use linear::LinearAllocator;
pub use profiler::{MemoryEvent, ProfilerSink, RecordingSink, PROFILER_TARGET};
pub use proxy::ProxyAllocator;
pub use scratch::{ScratchAllocator, MAX_RING_SIZE, MIN_RING_SIZE};
