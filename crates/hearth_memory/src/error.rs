//! # Memory Error Types
//!
//! Failures the allocator family reports instead of aborting.

use thiserror::Error;

/// Errors that can occur in the memory subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Requested alignment is zero or not a power of two.
    #[error("invalid alignment {0}: must be a non-zero power of two")]
    InvalidAlignment(usize),

    /// Block (payload plus header and padding) does not fit a 31-bit size header.
    #[error("allocation of {requested} bytes exceeds the {limit} byte block limit")]
    TooLarge {
        /// Bytes requested by the caller.
        requested: usize,
        /// Largest payload the allocator can describe.
        limit: usize,
    },

    /// A fixed-capacity allocator has no room left.
    #[error("out of memory: needed {requested} bytes, {remaining} remaining")]
    OutOfMemory {
        /// Bytes the request would consume, including alignment slack.
        requested: usize,
        /// Bytes still available.
        remaining: usize,
    },

    /// Configuration rejected while loading or validating.
    #[error("invalid memory configuration: {0}")]
    InvalidConfig(String),

    /// Allocations were still live when the allocator was checked.
    #[error("{allocator} allocator leaked {count} allocations ({bytes} bytes)")]
    Leaked {
        /// Which allocator reported the leak.
        allocator: &'static str,
        /// Number of live allocations.
        count: usize,
        /// Bytes still accounted to them.
        bytes: usize,
    },

    /// Process-wide globals were installed twice.
    #[error("memory globals are already initialized")]
    AlreadyInitialized,

    /// Process-wide globals were used before `install`.
    #[error("memory globals are not initialized")]
    NotInitialized,
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MemoryError::OutOfMemory {
            requested: 64,
            remaining: 8,
        };
        assert_eq!(err.to_string(), "out of memory: needed 64 bytes, 8 remaining");

        let err = MemoryError::Leaked {
            allocator: "heap",
            count: 2,
            bytes: 96,
        };
        assert_eq!(err.to_string(), "heap allocator leaked 2 allocations (96 bytes)");
    }
}
