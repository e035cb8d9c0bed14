//! # HEARTH Containers
//!
//! Collections that draw every byte from an explicit
//! [`Allocator`](hearth_memory::Allocator) reference.
//!
//! ## Containers
//!
//! | Container | Elements | Notes |
//! |-----------|----------|-------|
//! | [`Array`] | `Pod` | bitwise relocation, zeroed on resize |
//! | [`Vector`] | any | elements dropped on shrink and clear |
//! | [`Queue`] | `Pod` | ring deque over an `Array` |
//! | [`HashMap`] / [`HashSet`] | `Hash + Eq` | Robin Hood open addressing |
//! | [`SortMap`] | `Ord` | flat, sorted on request |
//!
//! Growth is `capacity * 2 + 1` for the array types. Every operation that
//! may allocate returns a [`ContainerResult`]; a failed allocation leaves
//! the container unchanged.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hearth_containers::{HashMap, StringId32, Vector};
//! use hearth_memory::HeapAllocator;
//!
//! let heap = HeapAllocator::new();
//! let mut names: Vector<String> = Vector::new(&heap);
//! names.push_back("grass".into())?;
//!
//! let mut lookup: HashMap<StringId32, usize> = HashMap::new(&heap);
//! lookup.set(StringId32::new("grass"), 0)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod array;
pub mod error;
pub mod from_allocator;
pub mod hash_map;
pub mod hash_set;
pub mod queue;
mod raw;
pub mod sort_map;
pub mod string_id;
pub mod vector;

pub use array::Array;
pub use error::{ContainerError, ContainerResult};
pub use from_allocator::FromAllocator;
pub use hash_map::{HashMap, SipBuildHasher};
pub use hash_set::HashSet;
pub use queue::Queue;
pub use sort_map::SortMap;
pub use string_id::{IdentityBuildHasher, IdentityHasher, StringId32, StringId64};
pub use vector::Vector;
