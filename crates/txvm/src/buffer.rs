//! Growable, capacity-bounded byte buffers.
//!
//! Operand stacks and local frames are both [`DynamicBuffer`]s; they differ only in the initial
//! size and ceiling chosen by [`EngineLimits`](crate::EngineLimits).
//!
//! Every operation either succeeds completely or fails without touching the buffer contents.

use thiserror::Error;

use crate::binary::{self, WORD};

/// Error raised by [`DynamicBuffer`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Growing the buffer would exceed its configured maximum size.
    #[error("buffer limit exceeded: requested {requested} bytes, maximum is {max}")]
    MemoryLimitExceeded {
        /// Length that was requested.
        requested: usize,
        /// Configured ceiling.
        max: usize,
    },
    /// A read, write or pop touched bytes outside the buffer.
    #[error("buffer access out of bounds: {len} bytes at offset {offset}, buffer holds {size}")]
    OutOfBounds {
        /// First byte of the access.
        offset: usize,
        /// Number of bytes accessed.
        len: usize,
        /// Length of the buffer at the time of the access.
        size: usize,
    },
}

/// An owned byte buffer that grows on demand up to a fixed maximum size.
///
/// Invariant: `len() <= max_size()` at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicBuffer {
    content: Vec<u8>,
    max_size: usize,
}

impl DynamicBuffer {
    /// Creates an empty buffer with room for `initial_capacity` bytes before reallocating.
    #[must_use]
    pub fn new(initial_capacity: usize, max_size: usize) -> Self {
        Self {
            content: Vec::with_capacity(initial_capacity.min(max_size)),
            max_size,
        }
    }

    /// Creates a buffer holding `len` zero bytes.
    #[must_use]
    pub fn zeroed(len: usize, max_size: usize) -> Self {
        Self {
            content: vec![0; len.min(max_size)],
            max_size,
        }
    }

    /// Wraps existing bytes.
    ///
    /// # Errors
    /// Fails with [`BufferError::MemoryLimitExceeded`] if `content` is already longer than `max_size`.
    pub fn from_vec(content: Vec<u8>, max_size: usize) -> Result<Self, BufferError> {
        if content.len() > max_size {
            return Err(BufferError::MemoryLimitExceeded {
                requested: content.len(),
                max: max_size,
            });
        }
        Ok(Self { content, max_size })
    }

    /// Current length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Returns true if the buffer holds no bytes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Bytes that can be held without reallocating.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.content.capacity()
    }

    /// The configured ceiling.
    #[inline]
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// The buffer contents.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.content
    }

    /// Consumes the buffer and returns its contents.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.content
    }

    /// Grows the buffer to at least `len` bytes, zero-filling new bytes.
    ///
    /// When a reallocation is needed the new allocation is `min(max_size, 2 * len)` bytes and the
    /// existing bytes are carried over.
    ///
    /// # Errors
    /// Fails with [`BufferError::MemoryLimitExceeded`] if `len > max_size`; the buffer is unchanged.
    pub fn ensure_len(&mut self, len: usize) -> Result<(), BufferError> {
        if len <= self.content.len() {
            return Ok(());
        }
        if len > self.max_size {
            return Err(BufferError::MemoryLimitExceeded {
                requested: len,
                max: self.max_size,
            });
        }
        if len > self.content.capacity() {
            let new_capacity = self.max_size.min(len.saturating_mul(2));
            let mut grown = Vec::with_capacity(new_capacity);
            grown.extend_from_slice(&self.content);
            self.content = grown;
        }
        self.content.resize(len, 0);
        Ok(())
    }

    /// Truncates the buffer to `len` bytes without releasing its allocation.
    ///
    /// Does nothing if the buffer is already shorter.
    #[inline]
    pub fn shrink_to(&mut self, len: usize) {
        self.content.truncate(len);
    }

    /// Returns the top `n` bytes.
    ///
    /// # Errors
    /// Fails with [`BufferError::OutOfBounds`] if fewer than `n` bytes are held.
    pub fn top(&self, n: usize) -> Result<&[u8], BufferError> {
        let start = self.content.len().checked_sub(n).ok_or(self.out_of_bounds(0, n))?;
        Ok(&self.content[start..])
    }

    /// Reads the 8-byte word at `offset`.
    ///
    /// # Errors
    /// Fails with [`BufferError::OutOfBounds`] if the word is not fully inside the buffer.
    pub fn read64(&self, offset: usize) -> Result<[u8; WORD], BufferError> {
        binary::read_word(&self.content, offset).ok_or(self.out_of_bounds(offset, WORD))
    }

    /// Overwrites the 8-byte word at `offset`.
    ///
    /// # Errors
    /// Fails with [`BufferError::OutOfBounds`] if the word is not fully inside the buffer.
    pub fn write64(&mut self, offset: usize, word: [u8; WORD]) -> Result<(), BufferError> {
        let err = self.out_of_bounds(offset, WORD);
        binary::put_word(&mut self.content, offset, word).ok_or(err)
    }

    /// Appends one 8-byte word.
    ///
    /// # Errors
    /// Fails with [`BufferError::MemoryLimitExceeded`] if the buffer is full.
    pub fn push64(&mut self, word: [u8; WORD]) -> Result<(), BufferError> {
        self.push_bytes(&word)
    }

    /// Appends `bytes`.
    ///
    /// # Errors
    /// Fails with [`BufferError::MemoryLimitExceeded`] if the result would exceed the ceiling.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        let top = self.content.len();
        self.ensure_len(top + bytes.len())?;
        self.content[top..].copy_from_slice(bytes);
        Ok(())
    }

    /// Removes and returns the top 8-byte word.
    ///
    /// # Errors
    /// Fails with [`BufferError::OutOfBounds`] if fewer than 8 bytes are held.
    pub fn pop64(&mut self) -> Result<[u8; WORD], BufferError> {
        let top = self.content.len().checked_sub(WORD).ok_or(self.out_of_bounds(0, WORD))?;
        let word = self.read64(top)?;
        self.content.truncate(top);
        Ok(word)
    }

    /// Returns true if `additional` more bytes fit under the ceiling.
    #[inline]
    #[must_use]
    pub fn can_grow_by(&self, additional: usize) -> bool {
        self.content
            .len()
            .checked_add(additional)
            .is_some_and(|len| len <= self.max_size)
    }

    fn out_of_bounds(&self, offset: usize, len: usize) -> BufferError {
        BufferError::OutOfBounds {
            offset,
            len,
            size: self.content.len(),
        }
    }
}
