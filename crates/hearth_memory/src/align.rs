//! # Alignment Helpers
//!
//! Power-of-two rounding for offsets and pointers.

use crate::error::{MemoryError, MemoryResult};

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two.
#[inline]
#[must_use]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Moves `ptr` forward to the next address that is a multiple of `align`.
///
/// The result keeps the provenance of `ptr`; it is only dereferenceable if it
/// still lies inside the allocation `ptr` came from.
#[inline]
#[must_use]
pub fn align_ptr(ptr: *mut u8, align: usize) -> *mut u8 {
    let addr = ptr as usize;
    ptr.wrapping_add(align_up(addr, align) - addr)
}

/// Rejects alignments that are zero or not a power of two.
///
/// # Errors
///
/// Returns [`MemoryError::InvalidAlignment`] for an unusable alignment.
#[inline]
pub fn check_alignment(align: usize) -> MemoryResult<()> {
    if align.is_power_of_two() {
        Ok(())
    } else {
        Err(MemoryError::InvalidAlignment(align))
    }
}
