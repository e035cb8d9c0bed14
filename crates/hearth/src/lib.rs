//! # HEARTH
//!
//! The engine's memory subsystem behind one crate.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    hearth_containers                     │
//! │   Array · Vector · Queue · HashMap · HashSet · SortMap   │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ &dyn Allocator
//! ┌────────────────────────────▼─────────────────────────────┐
//! │                      hearth_memory                       │
//! │        Heap · Linear · Scratch (ring) · Proxy            │
//! │        MemoryGlobals: default heap + default scratch     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Startup and shutdown
//!
//! ```rust,ignore
//! use hearth::prelude::*;
//!
//! let globals = MemoryGlobals::init(&MemoryConfig::from_file("memory.toml")?)?;
//! {
//!     let mut names: Vector<String> = Vector::new(globals.default_allocator());
//!     names.push_back("grass".into())?;
//! }
//! globals.shutdown()?; // reports leaks
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub use hearth_containers as containers;
pub use hearth_memory as memory;

/// The allocator trait, the allocators, and the containers.
pub mod prelude {
    pub use hearth_containers::{
        Array, ContainerError, ContainerResult, FromAllocator, HashMap, HashSet, Queue, SortMap,
        StringId32, StringId64, Vector,
    };
    pub use hearth_memory::{
        Allocator, AllocBox, HeapAllocator, LinearAllocator, MemoryConfig, MemoryError,
        MemoryGlobals, MemoryResult, ProxyAllocator, ScratchAllocator,
    };
}
