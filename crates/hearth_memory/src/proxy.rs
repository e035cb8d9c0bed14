//! # Proxy Allocator
//!
//! Gives a subsystem its own named allocator without giving it its own
//! memory: every request is forwarded to a wrapped allocator and reported to
//! the profiler under the proxy's name.

#![allow(unsafe_code)]

use std::borrow::Cow;
use std::ptr::NonNull;

use crate::allocator::Allocator;
use crate::error::MemoryResult;
use crate::profiler::{MemoryEvent, ProfilerSink, PROFILER_TARGET};

/// Named pass-through allocator.
///
/// The proxy does not track sizes itself: [`Allocator::allocated_size`] and
/// [`Allocator::total_allocated_bytes`] always report `None`. Events are
/// sized by the wrapped allocator, or 0 if it does not track sizes either.
pub struct ProxyAllocator<'a, A: Allocator + ?Sized = dyn Allocator> {
    /// Allocator doing the actual work.
    allocator: &'a A,
    /// Name used in profiler events.
    name: Cow<'static, str>,
    /// Optional event collector.
    sink: Option<&'a dyn ProfilerSink>,
}

impl<'a, A: Allocator + ?Sized> ProxyAllocator<'a, A> {
    /// Wraps `allocator` under `name`.
    pub fn new(allocator: &'a A, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            allocator,
            name: name.into(),
            sink: None,
        }
    }

    /// Also delivers events to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: &'a dyn ProfilerSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Name reported to the profiler.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped allocator.
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &'a A {
        self.allocator
    }

    fn emit(&self, event: MemoryEvent) {
        match &event {
            MemoryEvent::Allocate { size, .. } => {
                tracing::trace!(target: PROFILER_TARGET, allocator = %self.name, size, "allocate_memory");
            }
            MemoryEvent::Deallocate { size, .. } => {
                tracing::trace!(target: PROFILER_TARGET, allocator = %self.name, size, "deallocate_memory");
            }
        }
        if let Some(sink) = self.sink {
            sink.record(event);
        }
    }
}

impl<A: Allocator + ?Sized> Allocator for ProxyAllocator<'_, A> {
    fn allocate(&self, size: usize, align: usize) -> MemoryResult<NonNull<u8>> {
        let block = self.allocator.allocate(size, align)?;
        // SAFETY: block is live and came from the wrapped allocator.
        let reported = unsafe { self.allocator.allocated_size(block) }.unwrap_or(0);
        self.emit(MemoryEvent::Allocate {
            allocator: self.name.clone(),
            size: reported,
        });
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: *mut u8) {
        let Some(block) = NonNull::new(ptr) else {
            return;
        };
        let reported = self.allocator.allocated_size(block).unwrap_or(0);
        self.emit(MemoryEvent::Deallocate {
            allocator: self.name.clone(),
            size: reported,
        });
        self.allocator.deallocate(ptr);
    }

    unsafe fn allocated_size(&self, _ptr: NonNull<u8>) -> Option<usize> {
        None
    }

    fn total_allocated_bytes(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapAllocator;
    use crate::linear::LinearAllocator;
    use crate::profiler::RecordingSink;

    #[test]
    fn test_forwards_and_reports() {
        let heap = HeapAllocator::new();
        let sink = RecordingSink::new();
        let proxy = ProxyAllocator::new(&heap, "physics").with_sink(&sink);

        let block = proxy.allocate(100, 16).unwrap();
        assert_eq!(heap.allocation_count(), 1);
        let usable = unsafe { heap.allocated_size(block) }.unwrap();

        unsafe { proxy.deallocate(block.as_ptr()) };
        assert_eq!(heap.allocation_count(), 0);

        assert_eq!(
            sink.events(),
            vec![
                MemoryEvent::Allocate {
                    allocator: "physics".into(),
                    size: usable,
                },
                MemoryEvent::Deallocate {
                    allocator: "physics".into(),
                    size: usable,
                },
            ]
        );
        assert_eq!(sink.net_bytes("physics"), 0);
    }

    #[test]
    fn test_does_not_track_sizes() {
        let heap = HeapAllocator::new();
        let proxy = ProxyAllocator::new(&heap, String::from("audio"));
        assert_eq!(proxy.name(), "audio");

        let block = proxy.allocate(8, 4).unwrap();
        unsafe {
            assert_eq!(proxy.allocated_size(block), None);
            proxy.deallocate(block.as_ptr());
            proxy.deallocate(std::ptr::null_mut());
        }
        assert_eq!(proxy.total_allocated_bytes(), None);
        drop(proxy);
        heap.finish().unwrap();
    }

    #[test]
    fn test_nested_proxies_report_under_own_names() {
        let heap = HeapAllocator::new();
        let sink = RecordingSink::new();
        let outer = ProxyAllocator::new(&heap, "render").with_sink(&sink);
        let inner = ProxyAllocator::new(&outer as &dyn Allocator, "render.meshes").with_sink(&sink);

        let block = inner.allocate(32, 4).unwrap();
        unsafe { inner.deallocate(block.as_ptr()) };

        let names: Vec<_> = sink.take().iter().map(|e| e.allocator().to_owned()).collect();
        assert_eq!(names, ["render", "render.meshes", "render.meshes", "render"]);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_attribution_balances_over_untracked_allocators() {
        let heap = HeapAllocator::new();
        let sink = RecordingSink::new();
        let outer = ProxyAllocator::new(&heap, "render").with_sink(&sink);
        let inner = ProxyAllocator::new(&outer as &dyn Allocator, "render.meshes").with_sink(&sink);

        let blocks: Vec<_> = [8, 100, 3]
            .into_iter()
            .map(|size| inner.allocate(size, 8).unwrap())
            .collect();
        assert!(sink.net_bytes("render") >= 111);
        for block in blocks {
            unsafe { inner.deallocate(block.as_ptr()) };
        }
        assert_eq!(sink.net_bytes("render"), 0);
        assert_eq!(sink.net_bytes("render.meshes"), 0);

        let mut buffer = [0u8; 256];
        let linear = LinearAllocator::from_buffer(&mut buffer);
        let frame = ProxyAllocator::new(&linear, "frame").with_sink(&sink);
        let block = frame.allocate(64, 16).unwrap();
        unsafe { frame.deallocate(block.as_ptr()) };
        assert_eq!(sink.net_bytes("frame"), 0);

        drop(inner);
        drop(outer);
        heap.finish().unwrap();
    }
}
