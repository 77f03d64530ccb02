//! Prologue and footer of a dump.
//!
//! ```text
//! "REDIS" | 4 ASCII digits | ... body ... | 0xFF | checksum u64 LE (v5+)
//! ```

use std::io::Read;

use rdbstream_error::{RdbError, RdbResult};
use tracing::{debug, warn};

use super::cursor::ByteCursor;

/// Magic marker at the start of every dump.
pub const MAGIC: &[u8; 5] = b"REDIS";
/// Newest dump version this decoder understands.
pub const MAX_SUPPORTED_VERSION: u32 = 11;
/// First version that carries a checksum footer.
pub const FOOTER_MIN_VERSION: u32 = 5;

/// Parsed prologue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
}

impl Header {
    pub fn has_footer(&self) -> bool {
        self.version >= FOOTER_MIN_VERSION
    }
}

/// Reads and validates the 9-byte prologue.
pub fn parse_header<R: Read>(cursor: &mut ByteCursor<R>) -> RdbResult<Header> {
    let magic: [u8; 5] = cursor.read_array()?;
    if &magic != MAGIC {
        return Err(RdbError::BadMagic { found: magic });
    }

    let raw: [u8; 4] = cursor.read_array()?;
    if !raw.iter().all(u8::is_ascii_digit) {
        return Err(RdbError::BadVersion { raw });
    }
    let version = raw
        .iter()
        .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));

    if version == 0 || version > MAX_SUPPORTED_VERSION {
        return Err(RdbError::UnsupportedVersion {
            version,
            max: MAX_SUPPORTED_VERSION,
        });
    }

    Ok(Header { version })
}

/// Validates the trailing checksum right after the EOF opcode.
///
/// The expected value is captured before the footer is read, and the footer
/// itself is never folded into the accumulator. A zero footer means the writer
/// did not compute a checksum. Versions without a footer succeed immediately.
pub fn verify_footer<R: Read>(
    cursor: &mut ByteCursor<R>,
    header: &Header,
    verify: bool,
) -> RdbResult<()> {
    if !header.has_footer() {
        return Ok(());
    }

    let expected = cursor.checksum();
    let offset = cursor.offset();
    let found = u64::from_le_bytes(cursor.read_unchecked()?);

    if found == 0 {
        debug!(offset, "checksum disabled by writer, footer not verified");
        return Ok(());
    }
    if !verify {
        debug!(offset, found, "checksum verification disabled");
        return Ok(());
    }
    if found != expected {
        warn!(offset, expected, found, "dump checksum mismatch");
        return Err(RdbError::ChecksumMismatch {
            offset,
            expected,
            found,
        });
    }

    debug!(offset, checksum = found, "dump checksum verified");
    Ok(())
}
