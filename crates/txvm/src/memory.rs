//! The memory module contract and an in-memory implementation.
//!
//! The engine talks to two [`Module`]s: the method area, which holds immutable bytecode addressed
//! by application id then method id, and the heap, which holds mutable per-application state and
//! supports a stack of checkpoints. Beyond selecting the active root the engine treats heap layout
//! as opaque.

use std::fmt::Write;

use ahash::AHashMap;
use thiserror::Error;

use crate::{binary, identifier::Identifier};

/// Error raised by bounds-checked [`Module`] reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// No byte range is selected, either because the root or the child does not exist.
    #[error("no byte range is loaded")]
    NothingLoaded,
    /// The access falls outside the selected byte range.
    #[error("memory access out of bounds: {len} bytes at offset {offset}, range holds {size}")]
    OutOfBounds {
        /// First byte of the access.
        offset: usize,
        /// Number of bytes accessed.
        len: usize,
        /// Length of the selected range.
        size: usize,
    },
    /// The destination slice cannot hold the loaded bytes.
    #[error("destination too small: {len} bytes at offset {offset}, destination holds {size}")]
    DestinationTooSmall {
        /// First byte written in the destination.
        offset: usize,
        /// Number of bytes written.
        len: usize,
        /// Length of the destination.
        size: usize,
    },
}

/// Addressing and checkpoint contract for the method area and the heap.
///
/// Reads are relative to the byte range chosen by the last [`load_root`](Module::load_root) /
/// [`load_child`](Module::load_child) pair. Selecting an id that does not exist never fails; the
/// failure surfaces on the first read instead.
pub trait Module {
    /// Switches the active root (an application for the method area, a context for the heap).
    fn load_root(&mut self, id: Identifier) -> &mut Self;

    /// Selects the active byte range within the current root.
    fn load_child(&mut self, id: Identifier);

    /// Copies 8 bytes starting at `offset` into `dst[dst_offset..dst_offset + 8]`.
    ///
    /// # Errors
    /// Fails if the source or destination range is out of bounds.
    fn load64(&mut self, offset: usize, dst: &mut [u8], dst_offset: usize) -> Result<(), MemoryError>;

    /// Reads one byte.
    ///
    /// # Errors
    /// Fails if `offset` is outside the selected range.
    fn load_byte(&mut self, offset: usize) -> Result<u8, MemoryError>;

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    /// Fails if the two bytes are not fully inside the selected range.
    fn load_u16(&mut self, offset: usize) -> Result<u16, MemoryError>;

    /// Pushes a checkpoint of the current state.
    fn save(&mut self);

    /// Pops the latest checkpoint, keeping every change made since it.
    fn discard(&mut self);

    /// Pops the latest checkpoint, undoing every change made since it.
    fn restore(&mut self);
}

type Chunks = AHashMap<Identifier, AHashMap<Identifier, Vec<u8>>>;

/// In-memory [`Module`] backed by nested hash maps.
///
/// Checkpoints are full snapshots of the chunk table, which keeps `restore` exact at the cost of
/// copying state on `save`. Every root/child switch, read and checkpoint operation is appended to
/// an access log so tests can assert the exact order of module interactions.
#[derive(Debug, Clone, Default)]
pub struct MemoryModule {
    chunks: Chunks,
    checkpoints: Vec<Chunks>,
    root: Option<Identifier>,
    child: Option<Identifier>,
    access_log: String,
}

impl MemoryModule {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a byte range, builder style.
    #[must_use]
    pub fn with_chunk(mut self, root: impl Into<Identifier>, child: impl Into<Identifier>, bytes: Vec<u8>) -> Self {
        self.insert_chunk(root.into(), child.into(), bytes);
        self
    }

    /// Inserts or replaces a byte range.
    pub fn insert_chunk(&mut self, root: Identifier, child: Identifier, bytes: Vec<u8>) {
        self.chunks.entry(root).or_default().insert(child, bytes);
    }

    /// Removes a byte range, returning its previous contents.
    pub fn remove_chunk(&mut self, root: Identifier, child: Identifier) -> Option<Vec<u8>> {
        let children = self.chunks.get_mut(&root)?;
        let removed = children.remove(&child);
        if children.is_empty() {
            self.chunks.remove(&root);
        }
        removed
    }

    /// Returns a byte range without logging the access.
    #[must_use]
    pub fn chunk(&self, root: Identifier, child: Identifier) -> Option<&[u8]> {
        self.chunks.get(&root)?.get(&child).map(Vec::as_slice)
    }

    /// Number of checkpoints currently on the stack.
    #[must_use]
    pub fn checkpoint_depth(&self) -> usize {
        self.checkpoints.len()
    }

    /// The access log, entries separated by three spaces.
    #[must_use]
    pub fn access_log(&self) -> &str {
        self.access_log.trim_end()
    }

    /// Clears the access log.
    pub fn clear_access_log(&mut self) {
        self.access_log.clear();
    }

    /// Writes an 8-byte word into the selected range.
    ///
    /// # Errors
    /// Fails if nothing is selected or the word is not fully inside the range.
    pub fn store64(&mut self, offset: usize, word: [u8; binary::WORD]) -> Result<(), MemoryError> {
        self.store_bytes(offset, &word)
    }

    /// Writes `bytes` into the selected range, growing it if the write ends past its end.
    ///
    /// # Errors
    /// Fails if nothing is selected or `offset` is past the end of the range.
    pub fn store_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), MemoryError> {
        let _ = write!(self.access_log, "[{offset}]<-{}   ", hex(bytes));
        let current = self.current_mut().ok_or(MemoryError::NothingLoaded)?;
        if offset > current.len() {
            return Err(MemoryError::OutOfBounds {
                offset,
                len: bytes.len(),
                size: current.len(),
            });
        }
        let end = offset + bytes.len();
        if end > current.len() {
            current.resize(end, 0);
        }
        current[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    fn current(&self) -> Option<&[u8]> {
        self.chunks.get(&self.root?)?.get(&self.child?).map(Vec::as_slice)
    }

    fn current_mut(&mut self) -> Option<&mut Vec<u8>> {
        let (root, child) = (self.root?, self.child?);
        self.chunks.get_mut(&root)?.get_mut(&child)
    }

    fn read(&self, offset: usize, len: usize) -> Result<&[u8], MemoryError> {
        let current = self.current().ok_or(MemoryError::NothingLoaded)?;
        offset
            .checked_add(len)
            .and_then(|end| current.get(offset..end))
            .ok_or(MemoryError::OutOfBounds {
                offset,
                len,
                size: current.len(),
            })
    }
}

impl Module for MemoryModule {
    fn load_root(&mut self, id: Identifier) -> &mut Self {
        self.root = Some(id);
        self.child = None;
        let _ = write!(self.access_log, "root<-{id:x}   ");
        self
    }

    fn load_child(&mut self, id: Identifier) {
        self.child = Some(id);
        let _ = write!(self.access_log, "child<-{id:x}   ");
    }

    fn load64(&mut self, offset: usize, dst: &mut [u8], dst_offset: usize) -> Result<(), MemoryError> {
        let word = binary::read_word(self.read(offset, binary::WORD)?, 0).ok_or(MemoryError::NothingLoaded)?;
        let size = dst.len();
        binary::put_word(dst, dst_offset, word).ok_or(MemoryError::DestinationTooSmall {
            offset: dst_offset,
            len: binary::WORD,
            size,
        })?;
        let _ = write!(self.access_log, "[{offset}]->{}   ", hex(&word));
        Ok(())
    }

    fn load_byte(&mut self, offset: usize) -> Result<u8, MemoryError> {
        let byte = self.read(offset, 1)?[0];
        let _ = write!(self.access_log, "[{offset}]->{byte:x}   ");
        Ok(byte)
    }

    fn load_u16(&mut self, offset: usize) -> Result<u16, MemoryError> {
        let value = binary::read_u16(self.read(offset, 2)?, 0).ok_or(MemoryError::NothingLoaded)?;
        let _ = write!(self.access_log, "[{offset}]->{value:x}   ");
        Ok(value)
    }

    fn save(&mut self) {
        self.checkpoints.push(self.chunks.clone());
        self.access_log.push_str("Save   ");
    }

    fn discard(&mut self) {
        self.checkpoints.pop();
        self.access_log.push_str("Discard   ");
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.checkpoints.pop() {
            self.chunks = snapshot;
        }
        self.access_log.push_str("Restore   ");
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
