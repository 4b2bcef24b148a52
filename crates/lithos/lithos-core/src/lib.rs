//! Fixed-capacity strings shared by the lithos crates.
//!
//! Names that cross a process boundary (shared memory segment names,
//! transport identifiers) have a hard upper bound on their length. Encoding
//! that bound in the type means an over-long name is rejected once, where it
//! is built, instead of at every call site that hands it to the OS.

use std::ffi::CString;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BoundedStringError {
    #[error("string of {len} bytes exceeds capacity of {capacity} bytes")]
    CapacityExceeded { len: usize, capacity: usize },

    #[error("string contains an interior NUL byte at offset {position}")]
    InteriorNul { position: usize },
}

/// UTF-8 string stored inline with at most `CAP` bytes.
///
/// Never contains a NUL byte, so it always converts into a C string.
#[derive(Clone, Copy)]
pub struct BoundedString<const CAP: usize> {
    len: usize,
    buf: [u8; CAP],
}

impl<const CAP: usize> BoundedString<CAP> {
    pub const CAPACITY: usize = CAP;

    /// Creates an empty string.
    pub const fn new() -> Self {
        Self {
            len: 0,
            buf: [0; CAP],
        }
    }

    /// Copies `s` into a new bounded string.
    ///
    /// # Errors
    /// - `CapacityExceeded` if `s` is longer than `CAP` bytes
    /// - `InteriorNul` if `s` contains a NUL byte
    pub fn try_from_str(s: &str) -> Result<Self, BoundedStringError> {
        let bytes = s.as_bytes();
        if bytes.len() > CAP {
            return Err(BoundedStringError::CapacityExceeded {
                len: bytes.len(),
                capacity: CAP,
            });
        }
        if let Some(position) = bytes.iter().position(|&b| b == 0) {
            return Err(BoundedStringError::InteriorNul { position });
        }

        let mut buf = [0u8; CAP];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            len: bytes.len(),
            buf,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        // SAFETY: buf[..len] was copied from a &str and is never mutated afterwards.
        unsafe { std::str::from_utf8_unchecked(&self.buf[..self.len]) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        CAP
    }

    /// Returns an owned, NUL-terminated copy for FFI calls.
    pub fn to_c_string(&self) -> CString {
        // SAFETY: construction rejects interior NUL bytes.
        unsafe { CString::from_vec_unchecked(self.buf[..self.len].to_vec()) }
    }
}

impl<const CAP: usize> Default for BoundedString<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> Deref for BoundedString<CAP> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl<const CAP: usize> AsRef<str> for BoundedString<CAP> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<const CAP: usize> TryFrom<&str> for BoundedString<CAP> {
    type Error = BoundedStringError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::try_from_str(s)
    }
}

impl<const CAP: usize> FromStr for BoundedString<CAP> {
    type Err = BoundedStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_str(s)
    }
}

// Bytes past `len` are always zero, but comparing only the live prefix keeps
// equality independent of that.
impl<const CAP: usize> PartialEq for BoundedString<CAP> {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl<const CAP: usize> Eq for BoundedString<CAP> {}

impl<const CAP: usize> PartialEq<str> for BoundedString<CAP> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<const CAP: usize> PartialEq<&str> for BoundedString<CAP> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl<const CAP: usize> Hash for BoundedString<CAP> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl<const CAP: usize> fmt::Display for BoundedString<CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const CAP: usize> fmt::Debug for BoundedString<CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Small = BoundedString<8>;

    #[test]
    fn accepts_up_to_capacity() {
        let s = Small::try_from("/abcdefg").unwrap();
        assert_eq!(s.len(), 8);
        assert_eq!(s, "/abcdefg");
        assert_eq!(s.capacity(), 8);
        assert_eq!(Small::CAPACITY, 8);
    }

    #[test]
    fn rejects_over_capacity() {
        let err = Small::try_from("/abcdefgh").unwrap_err();
        assert_eq!(
            err,
            BoundedStringError::CapacityExceeded {
                len: 9,
                capacity: 8
            }
        );
    }

    /// A NUL byte would silently truncate the name once it is handed to the OS.
    #[test]
    fn rejects_interior_nul() {
        let err = Small::try_from("/a\0b").unwrap_err();
        assert_eq!(err, BoundedStringError::InteriorNul { position: 2 });
    }

    #[test]
    fn default_is_empty() {
        let s = Small::default();
        assert!(s.is_empty());
        assert_eq!(s.as_str(), "");
    }

    #[test]
    fn c_string_round_trips_the_bytes() {
        let s: BoundedString<128> = "/lithos_segment".parse().unwrap();
        assert_eq!(s.to_c_string().as_bytes(), b"/lithos_segment");
    }

    /// Multi-byte characters count by their encoded length.
    #[test]
    fn capacity_counts_bytes_not_chars() {
        assert!(BoundedString::<4>::try_from("ééé").is_err());
        assert!(BoundedString::<6>::try_from("ééé").is_ok());
    }
}
