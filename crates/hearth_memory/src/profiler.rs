//! # Memory Profiler Events
//!
//! Named allocators report every allocation and release as a
//! [`MemoryEvent`]. Events always go to `tracing` under the
//! `hearth::profiler` target; a [`ProfilerSink`] can collect them as well.

use std::borrow::Cow;

use parking_lot::Mutex;

/// `tracing` target used for allocation events.
pub const PROFILER_TARGET: &str = "hearth::profiler";

/// One allocation or release seen by a named allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryEvent {
    /// A block was allocated.
    Allocate {
        /// Name of the reporting allocator.
        allocator: Cow<'static, str>,
        /// Block size, as reported by the wrapped allocator when it tracks sizes.
        size: usize,
    },
    /// A block was released.
    Deallocate {
        /// Name of the reporting allocator.
        allocator: Cow<'static, str>,
        /// Block size, or 0 when the wrapped allocator does not track sizes.
        size: usize,
    },
}

impl MemoryEvent {
    /// Name of the allocator that produced the event.
    #[must_use]
    pub fn allocator(&self) -> &str {
        match self {
            Self::Allocate { allocator, .. } | Self::Deallocate { allocator, .. } => allocator,
        }
    }

    /// Signed byte delta of the event.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn delta(&self) -> isize {
        match self {
            Self::Allocate { size, .. } => *size as isize,
            Self::Deallocate { size, .. } => -(*size as isize),
        }
    }
}

/// Receiver of allocation events.
pub trait ProfilerSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: MemoryEvent);
}

/// Sink that keeps every event in memory.
///
/// Intended for tests and tools; the event list grows without bound.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MemoryEvent>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<MemoryEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns the recorded events.
    pub fn take(&self) -> Vec<MemoryEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Net bytes allocated minus released through `allocator`.
    #[must_use]
    pub fn net_bytes(&self, allocator: &str) -> isize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.allocator() == allocator)
            .map(MemoryEvent::delta)
            .sum()
    }
}

impl ProfilerSink for RecordingSink {
    fn record(&self, event: MemoryEvent) {
        self.events.lock().push(event);
    }
}
