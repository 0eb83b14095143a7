//! Compact 64-bit identifiers for applications and methods.
//!
//! On the wire an identifier is length-prefixed: the first byte `L` (at most 8) says how many
//! significant bytes follow. Those bytes are read as a little-endian integer and moved into the
//! most-significant `L` bytes of a 64-bit word, so short identifiers share one numeric namespace
//! with long ones.
//!
//! On the operand stack identifiers are plain 8-byte little-endian words with no prefix.

use std::fmt;

use thiserror::Error;

/// Largest number of significant bytes an encoded identifier may declare.
pub const MAX_IDENTIFIER_LEN: usize = 8;

/// A 64-bit application or method identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Identifier(u64);

impl Identifier {
    /// Wraps a raw 64-bit value.
    #[inline]
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw 64-bit value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Decodes a length-prefixed identifier.
    ///
    /// Significant bytes missing from the end of `bytes` are read as zero. Bytes past the
    /// declared length are ignored.
    ///
    /// # Errors
    /// Returns [`IdentifierError::Empty`] for an empty input and [`IdentifierError::TooLong`] when the
    /// length prefix is greater than [`MAX_IDENTIFIER_LEN`].
    pub fn decode(bytes: &[u8]) -> Result<Self, IdentifierError> {
        let (&len, rest) = bytes.split_first().ok_or(IdentifierError::Empty)?;
        let len = usize::from(len);
        if len > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong(len));
        }

        let mut word = [0u8; MAX_IDENTIFIER_LEN];
        let available = rest.len().min(len);
        word[..available].copy_from_slice(&rest[..available]);

        let shift = u32::try_from((MAX_IDENTIFIER_LEN - len) * 8).unwrap_or(u32::MAX);
        let value = u64::from_le_bytes(word).checked_shl(shift).unwrap_or(0);
        Ok(Self(value))
    }
}

impl From<u64> for Identifier {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Identifier> for u64 {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::LowerHex for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Error returned when a length-prefixed identifier cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The input had no length prefix.
    #[error("identifier encoding is empty")]
    Empty,
    /// The length prefix declared more than eight significant bytes.
    #[error("identifier declares {0} significant bytes, at most 8 are allowed")]
    TooLong(usize),
}
