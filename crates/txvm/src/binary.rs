//! Little-endian reads and writes over byte slices.
//!
//! All helpers are bounds-checked and return `None` instead of panicking, so callers can turn an
//! out-of-range access into a recoverable fault.

/// Width in bytes of every stack word.
pub const WORD: usize = 8;

/// Reads the 8-byte word starting at `offset`.
#[inline]
#[must_use]
pub fn read_word(src: &[u8], offset: usize) -> Option<[u8; WORD]> {
    let end = offset.checked_add(WORD)?;
    src.get(offset..end)?.try_into().ok()
}

/// Overwrites the 8 bytes starting at `offset` with `word`.
#[inline]
#[must_use]
pub fn put_word(dst: &mut [u8], offset: usize, word: [u8; WORD]) -> Option<()> {
    let end = offset.checked_add(WORD)?;
    dst.get_mut(offset..end)?.copy_from_slice(&word);
    Some(())
}

/// Reads a little-endian `u16` starting at `offset`.
#[inline]
#[must_use]
pub fn read_u16(src: &[u8], offset: usize) -> Option<u16> {
    let end = offset.checked_add(2)?;
    let bytes: [u8; 2] = src.get(offset..end)?.try_into().ok()?;
    Some(u16::from_le_bytes(bytes))
}

/// Reads a little-endian `i64` starting at `offset`.
#[inline]
#[must_use]
pub fn read_i64(src: &[u8], offset: usize) -> Option<i64> {
    read_word(src, offset).map(i64::from_le_bytes)
}
