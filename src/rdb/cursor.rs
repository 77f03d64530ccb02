use std::io::{self, Read};

use bytes::Bytes;
use rdbstream_error::{RdbError, RdbResult};

use super::checksum::Crc64;

/// Upper bound on a single buffer growth step. A corrupt length of several
/// gigabytes then fails with `TruncatedStream` after the source runs dry
/// instead of allocating the whole amount up front.
const READ_CHUNK: usize = 64 * 1024;

/// Read-only cursor over the byte source.
///
/// Tracks the absolute offset and folds every consumed byte into the running
/// checksum. Both are advanced by [`ByteCursor::advance`] and nowhere else, so
/// they cannot drift apart.
pub struct ByteCursor<R> {
    inner: R,
    offset: u64,
    checksum: Crc64,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl<R: Read> ByteCursor<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            checksum: Crc64::new(),
        }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Checksum of everything consumed through [`read_exact`](Self::read_exact)
    /// and friends.
    pub fn checksum(&self) -> u64 {
        self.checksum.value()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads exactly `n` bytes, folding them into the checksum.
    pub fn read_exact(
        &mut self,
        n: usize,
    ) -> RdbResult<Bytes> {
        let start = self.offset;
        let mut buf = Vec::with_capacity(n.min(READ_CHUNK));
        while buf.len() < n {
            let filled = buf.len();
            let step = (n - filled).min(READ_CHUNK);
            buf.resize(filled + step, 0);
            let got = self.read_some(&mut buf[filled..])?;
            buf.truncate(filled + got);
            if got == 0 {
                return Err(RdbError::TruncatedStream {
                    offset: start,
                    needed: n,
                    available: filled,
                });
            }
        }
        self.advance(&buf, true);
        Ok(Bytes::from(buf))
    }

    /// Fixed-size read into an array, folded into the checksum.
    pub fn read_array<const N: usize>(&mut self) -> RdbResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        self.advance(&buf, true);
        Ok(buf)
    }

    /// Fixed-size read that advances the offset but leaves the checksum
    /// untouched. Only the footer is read this way.
    pub fn read_unchecked<const N: usize>(&mut self) -> RdbResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        self.advance(&buf, false);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> RdbResult<u8> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    pub fn read_u16_le(&mut self) -> RdbResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32_le(&mut self) -> RdbResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64_le(&mut self) -> RdbResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_be(&mut self) -> RdbResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64_be(&mut self) -> RdbResult<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// The single place where offset and checksum move.
    fn advance(
        &mut self,
        bytes: &[u8],
        fold: bool,
    ) {
        if fold {
            self.checksum.update(bytes);
        }
        self.offset += bytes.len() as u64;
    }

    fn fill(
        &mut self,
        buf: &mut [u8],
    ) -> RdbResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let got = self.read_some(&mut buf[filled..])?;
            if got == 0 {
                return Err(RdbError::TruncatedStream {
                    offset: self.offset,
                    needed: buf.len(),
                    available: filled,
                });
            }
            filled += got;
        }
        Ok(())
    }

    /// One read from the source. A source that signals end of data with
    /// `UnexpectedEof` instead of `Ok(0)` (decompressing readers do this on
    /// truncated input) is treated as having run dry.
    fn read_some(
        &mut self,
        buf: &mut [u8],
    ) -> RdbResult<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
                Err(e) => {
                    return Err(RdbError::Io {
                        offset: self.offset,
                        source: e,
                    })
                }
            }
        }
    }
}
