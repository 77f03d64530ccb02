//! Decompression of compressed string payloads.
//!
//! The decoder only needs one operation: expand a compressed buffer into a
//! buffer of a known length. It is kept behind a trait so callers can plug in
//! another implementation, or a counting wrapper in tests.

use thiserror::Error;

/// Failure reported by a [`Decompressor`].
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct DecompressError {
    pub reason: String,
}

impl DecompressError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Expands a compressed string payload.
///
/// # Arguments
///
/// * `input` - the compressed bytes exactly as stored.
/// * `expected_len` - the uncompressed length declared in the dump.
///
/// # Returns
///
/// The uncompressed bytes. Implementations may return fewer or more bytes than
/// `expected_len`; the caller treats any length difference as corruption.
pub trait Decompressor {
    fn decompress(
        &self,
        input: &[u8],
        expected_len: usize,
    ) -> Result<Vec<u8>, DecompressError>;
}

/// LZF, the only compression the dump format uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lzf;

impl Decompressor for Lzf {
    fn decompress(
        &self,
        input: &[u8],
        expected_len: usize,
    ) -> Result<Vec<u8>, DecompressError> {
        if expected_len == 0 {
            return Ok(Vec::new());
        }
        lzf::decompress(input, expected_len).map_err(|e| DecompressError::new(format!("lzf: {e:?}")))
    }
}

impl<T: Decompressor + ?Sized> Decompressor for &T {
    fn decompress(
        &self,
        input: &[u8],
        expected_len: usize,
    ) -> Result<Vec<u8>, DecompressError> {
        (**self).decompress(input, expected_len)
    }
}

impl<T: Decompressor + ?Sized> Decompressor for Box<T> {
    fn decompress(
        &self,
        input: &[u8],
        expected_len: usize,
    ) -> Result<Vec<u8>, DecompressError> {
        (**self).decompress(input, expected_len)
    }
}
