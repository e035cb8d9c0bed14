//! # Block Headers
//!
//! Heap and scratch blocks are laid out as:
//!
//! ```text
//! [ size: u32 ][ pad: u32 = 0xFFFF_FFFF ]* [ payload ... ]
//! ```
//!
//! The size word holds the total span of the block, header included. The
//! scratch allocator marks released blocks by setting the top bit. Pad words
//! fill the gap between the header and the aligned payload, so the header can
//! be recovered from the payload pointer alone by walking back over them.

#![allow(unsafe_code)]

use crate::align::align_ptr;

/// Size of the header word in bytes.
pub(crate) const HEADER_SIZE: usize = std::mem::size_of::<u32>();

/// Value of every padding word between header and payload.
pub(crate) const PAD_VALUE: u32 = u32::MAX;

/// Top bit of the header word: block has been released.
pub(crate) const FREE_BIT: u32 = 0x8000_0000;

/// Largest span a header word can describe.
pub(crate) const MAX_SPAN: usize = (FREE_BIT - 1) as usize;

/// Payloads are never less than word aligned, so pad words stay aligned.
pub(crate) const MIN_ALIGN: usize = std::mem::align_of::<u32>();

/// Alignment actually used for a request.
#[inline]
pub(crate) const fn effective_align(align: usize) -> usize {
    if align < MIN_ALIGN {
        MIN_ALIGN
    } else {
        align
    }
}

/// First `align`-aligned payload address after a header at `header`.
#[inline]
pub(crate) fn payload_for(header: *mut u8, align: usize) -> *mut u8 {
    align_ptr(header.wrapping_add(HEADER_SIZE), align)
}

/// Writes the header word at `header` and pads up to `payload`.
///
/// # Safety
///
/// `header..payload` must be writable memory, `header` must be 4-byte
/// aligned and `payload` must come from [`payload_for`] on the same header.
#[inline]
pub(crate) unsafe fn write(header: *mut u8, payload: *mut u8, span: u32) {
    header.cast::<u32>().write(span);
    let mut pad = header.add(HEADER_SIZE).cast::<u32>();
    while pad.cast::<u8>() < payload {
        pad.write(PAD_VALUE);
        pad = pad.add(1);
    }
}

/// Recovers the header word that precedes `payload`.
///
/// # Safety
///
/// `payload` must have been produced by [`payload_for`] and initialized with
/// [`write`], and the block must still be owned by its allocator.
#[inline]
pub(crate) unsafe fn header_of(payload: *mut u8) -> *mut u32 {
    let mut word = payload.cast::<u32>().sub(1);
    while word.read() == PAD_VALUE {
        word = word.sub(1);
    }
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip_through_padding() {
        let mut words = [0u32; 32];
        let header = words.as_mut_ptr().cast::<u8>();

        for align in [4, 8, 16, 32, 64] {
            let payload = payload_for(header, align);
            assert_eq!(payload as usize % align, 0);
            assert!(payload as usize >= header as usize + HEADER_SIZE);

            unsafe {
                write(header, payload, 100);
                let found = header_of(payload);
                assert_eq!(found.cast::<u8>(), header);
                assert_eq!(found.read(), 100);
            }
        }
    }

    #[test]
    fn test_free_bit_never_collides_with_padding() {
        assert_ne!((MAX_SPAN as u32 & !3) | FREE_BIT, PAD_VALUE);
        assert_eq!(effective_align(1), 4);
        assert_eq!(effective_align(16), 16);
    }
}
