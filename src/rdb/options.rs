use serde::{Deserialize, Serialize};

/// Largest string payload accepted by default (512 MiB, the server's own
/// limit for a single string value).
pub const DEFAULT_MAX_STRING_LEN: usize = 512 * 1024 * 1024;
/// Largest element count accepted by default for a single collection.
pub const DEFAULT_MAX_COLLECTION_LEN: usize = u32::MAX as usize;

/// Tunables of a [`Decoder`](super::Decoder).
///
/// Limits guard against corrupt length fields: a declared length above a
/// limit is reported as a corrupt payload before any byte of it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Compare the footer against the running checksum.
    pub verify_checksum: bool,
    /// Maximum length of a single string, compressed or not.
    pub max_string_len: usize,
    /// Maximum number of elements, pairs or packed nodes in one value.
    pub max_collection_len: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            max_string_len: DEFAULT_MAX_STRING_LEN,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
        }
    }
}

impl DecoderOptions {
    pub fn verify_checksum(
        mut self,
        verify: bool,
    ) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub fn max_string_len(
        mut self,
        len: usize,
    ) -> Self {
        self.max_string_len = len;
        self
    }

    pub fn max_collection_len(
        mut self,
        len: usize,
    ) -> Self {
        self.max_collection_len = len;
        self
    }
}
