//! Compact in-memory encodings embedded as single string blobs.
//!
//! - `ziplist`: legacy list/hash/zset encoding with back-pointers.
//! - `listpack`: successor of ziplist with per-entry back-lengths.
//! - `intset`: sorted array of fixed-width integers.
//! - `zipmap`: legacy small-hash encoding.
//!
//! All decoders are pure functions over the blob. They never read past it and
//! report every structural inconsistency as a [`PackedError`].

pub mod intset;
pub mod listpack;
pub mod ziplist;
pub mod zipmap;

use bytes::Bytes;
use thiserror::Error;

/// Structural problem inside a packed blob.
///
/// `position` is relative to the start of the blob; the value decoder turns it
/// into a stream offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {structure} at byte {position}: {reason}")]
pub struct PackedError {
    pub structure: &'static str,
    pub position: usize,
    pub reason: String,
}

/// One element of a ziplist or listpack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackedEntry {
    Bytes(Bytes),
    Int(i64),
}

impl PackedEntry {
    /// Byte form of the element; integers become decimal text.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Bytes(b) => b,
            Self::Int(v) => Bytes::from(v.to_string()),
        }
    }

    /// Element read as a score. Integers convert directly, strings are parsed
    /// as decimal text.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Bytes(b) => super::primitive::parse_double(b),
            Self::Int(v) => Some(*v as f64),
        }
    }
}

/// Bounds-checked little reader over a blob.
pub(crate) struct BlobReader<'a> {
    blob: &'a Bytes,
    pos: usize,
    structure: &'static str,
}

impl<'a> BlobReader<'a> {
    pub fn new(
        blob: &'a Bytes,
        structure: &'static str,
    ) -> Self {
        Self {
            blob,
            pos: 0,
            structure,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.blob.len()
    }

    pub fn error_at(
        &self,
        position: usize,
        reason: impl Into<String>,
    ) -> PackedError {
        PackedError {
            structure: self.structure,
            position,
            reason: reason.into(),
        }
    }

    pub fn error(
        &self,
        reason: impl Into<String>,
    ) -> PackedError {
        self.error_at(self.pos, reason)
    }

    pub fn peek(&self) -> Result<u8, PackedError> {
        self.blob
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error("unexpected end of blob"))
    }

    /// Zero-copy slice of the next `n` bytes.
    pub fn take(
        &mut self,
        n: usize,
    ) -> Result<Bytes, PackedError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.blob.len())
            .ok_or_else(|| {
                self.error(format!(
                    "needs {n} bytes, {} left",
                    self.blob.len() - self.pos
                ))
            })?;
        let out = self.blob.slice(self.pos..end);
        self.pos = end;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], PackedError> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, PackedError> {
        let [b] = self.array::<1>()?;
        Ok(b)
    }

    pub fn u16_le(&mut self) -> Result<u16, PackedError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32_le(&mut self) -> Result<u32, PackedError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u32_be(&mut self) -> Result<u32, PackedError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn i16_le(&mut self) -> Result<i64, PackedError> {
        Ok(i64::from(i16::from_le_bytes(self.array()?)))
    }

    /// 24-bit signed, little-endian.
    pub fn i24_le(&mut self) -> Result<i64, PackedError> {
        let [a, b, c] = self.array::<3>()?;
        let v = i32::from_le_bytes([0, a, b, c]) >> 8;
        Ok(i64::from(v))
    }

    pub fn i32_le(&mut self) -> Result<i64, PackedError> {
        Ok(i64::from(i32::from_le_bytes(self.array()?)))
    }

    pub fn i64_le(&mut self) -> Result<i64, PackedError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn skip(
        &mut self,
        n: usize,
    ) -> Result<(), PackedError> {
        self.take(n).map(drop)
    }
}

/// Groups a flat entry list into pairs; an odd count is an error.
pub fn into_pairs(
    entries: Vec<PackedEntry>,
    structure: &'static str,
) -> Result<Vec<(PackedEntry, PackedEntry)>, PackedError> {
    if entries.len() % 2 != 0 {
        return Err(PackedError {
            structure,
            position: 0,
            reason: format!("odd entry count {} in a pair encoding", entries.len()),
        });
    }
    let mut pairs = Vec::with_capacity(entries.len() / 2);
    let mut iter = entries.into_iter();
    while let (Some(a), Some(b)) = (iter.next(), iter.next()) {
        pairs.push((a, b));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i24_sign_extension() {
        let blob = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x80, 0xFF, 0xFF, 0x7F]);
        let mut r = BlobReader::new(&blob, "test");
        assert_eq!(r.i24_le().unwrap(), -1);
        assert_eq!(r.i24_le().unwrap(), -(1 << 23));
        assert_eq!(r.i24_le().unwrap(), (1 << 23) - 1);
    }

    #[test]
    fn test_take_past_end() {
        let blob = Bytes::from_static(b"abc");
        let mut r = BlobReader::new(&blob, "test");
        r.skip(2).unwrap();
        let err = r.take(2).unwrap_err();
        assert_eq!(err.position, 2);
        assert!(err.reason.contains("1 left"));
    }

    #[test]
    fn test_entry_conversions() {
        assert_eq!(
            PackedEntry::Int(-12).into_bytes(),
            Bytes::from_static(b"-12")
        );
        assert_eq!(PackedEntry::Int(7).to_f64(), Some(7.0));
        assert_eq!(
            PackedEntry::Bytes(Bytes::from_static(b"2.5")).to_f64(),
            Some(2.5)
        );
        assert_eq!(PackedEntry::Bytes(Bytes::from_static(b"x")).to_f64(), None);
    }

    #[test]
    fn test_pairs() {
        let entries = vec![PackedEntry::Int(1), PackedEntry::Int(2)];
        assert_eq!(into_pairs(entries, "t").unwrap().len(), 1);
        let err = into_pairs(vec![PackedEntry::Int(1)], "t").unwrap_err();
        assert!(err.reason.contains("odd"));
    }
}
