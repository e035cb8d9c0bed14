//! # Container Error Types

use hearth_memory::MemoryError;
use thiserror::Error;

/// Errors that can occur in container operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// The allocator could not provide storage.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Requested capacity does not fit in the address space.
    #[error("capacity overflow")]
    CapacityOverflow,

    /// A sort map was queried after a mutation without `sort()`.
    #[error("sort map queried before sort()")]
    NotSorted,
}

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;
