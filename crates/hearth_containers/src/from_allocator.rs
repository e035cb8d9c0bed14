//! Construction of allocator-aware values.

use hearth_memory::Allocator;

/// A value that is built around an allocator instead of a default.
///
/// Containers use it to create elements that are containers themselves,
/// so nested storage draws from the same allocator as the parent.
///
/// ```rust,ignore
/// let mut rows: Vector<Array<f32>> = Vector::new(&heap);
/// rows.resize_in(16)?; // every row uses `heap`
/// ```
pub trait FromAllocator<'a> {
    /// Creates an empty value drawing from `allocator`.
    fn from_allocator(allocator: &'a dyn Allocator) -> Self;
}
