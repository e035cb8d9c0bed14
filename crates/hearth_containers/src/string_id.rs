//! # String Ids
//!
//! Hashed string identifiers used as map keys in place of the strings
//! themselves. The id is the SipHash-1-3 of the string's bytes, truncated to
//! the id width.

use std::fmt;
use std::hash::{BuildHasherDefault, Hasher};

use bytemuck::{Pod, Zeroable};
use siphasher::sip::SipHasher13;

fn sip13(bytes: &[u8]) -> u64 {
    let mut hasher = SipHasher13::new();
    hasher.write(bytes);
    hasher.finish()
}

/// 32-bit hashed string id.
///
/// `Hash` feeds the raw id to the hasher, so an [`IdentityBuildHasher`]
/// sees exactly the id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct StringId32(u32);

impl StringId32 {
    /// Hashes `name` into an id.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(name: &str) -> Self {
        Self(sip13(name.as_bytes()) as u32)
    }

    /// Wraps an id computed elsewhere, e.g. by the resource compiler.
    #[inline]
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// The raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<&str> for StringId32 {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Debug for StringId32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringId32({:08x})", self.0)
    }
}

impl fmt::Display for StringId32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// 64-bit hashed string id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct StringId64(u64);

impl StringId64 {
    /// Hashes `name` into an id.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(sip13(name.as_bytes()))
    }

    /// Wraps an id computed elsewhere.
    #[inline]
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<&str> for StringId64 {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Debug for StringId64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringId64({:016x})", self.0)
    }
}

impl fmt::Display for StringId64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hasher that passes integer keys through unchanged.
///
/// Meant for keys that are already hashes, such as string ids. Byte input
/// is folded in big-endian order.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = (self.0 << 8) | u64::from(byte);
        }
    }

    fn write_u32(&mut self, n: u32) {
        self.0 = u64::from(n);
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

/// [`BuildHasher`](std::hash::BuildHasher) for [`IdentityHasher`].
pub type IdentityBuildHasher = BuildHasherDefault<IdentityHasher>;
