//! Ziplist decoding.
//!
//! ```text
//! zlbytes u32 | zltail u32 | zllen u16 | entry* | 0xFF
//! entry = prevlen (1 byte, or 0xFE + u32) | encoding [+ data]
//! ```

use bytes::Bytes;

use super::{BlobReader, PackedEntry, PackedError};

const STRUCTURE: &str = "ziplist";
const HEADER_SIZE: usize = 10;
const END: u8 = 0xFF;
const BIG_PREVLEN: u8 = 0xFE;
/// `zllen` saturates here; the real count then has to be walked.
const UNKNOWN_COUNT: u16 = u16::MAX;

const INT_16: u8 = 0xC0;
const INT_32: u8 = 0xD0;
const INT_64: u8 = 0xE0;
const INT_24: u8 = 0xF0;
const INT_8: u8 = 0xFE;

/// Decodes every entry of a ziplist, validating header, back-pointers and
/// terminator.
pub fn decode(blob: &Bytes) -> Result<Vec<PackedEntry>, PackedError> {
    let mut r = BlobReader::new(blob, STRUCTURE);
    let zlbytes = r.u32_le()? as usize;
    let zltail = r.u32_le()? as usize;
    let zllen = r.u16_le()?;

    if zlbytes != r.len() {
        return Err(r.error_at(
            0,
            format!("header declares {zlbytes} bytes, blob has {}", r.len()),
        ));
    }

    let mut entries = Vec::with_capacity(usize::from(zllen.min(1024)));
    let mut prev_size = 0usize;
    let mut last_start = HEADER_SIZE;

    loop {
        let start = r.position();
        if r.peek()? == END {
            r.skip(1)?;
            break;
        }

        let prevlen = match r.u8()? {
            BIG_PREVLEN => r.u32_le()? as usize,
            b => usize::from(b),
        };
        if prevlen != prev_size {
            return Err(r.error_at(
                start,
                format!("prevlen {prevlen} does not match previous entry size {prev_size}"),
            ));
        }

        entries.push(read_entry(&mut r)?);
        prev_size = r.position() - start;
        last_start = start;
    }

    if r.position() != r.len() {
        return Err(r.error(format!(
            "{} trailing bytes after terminator",
            r.len() - r.position()
        )));
    }
    if zltail != last_start {
        return Err(r.error_at(
            4,
            format!("zltail {zltail} does not point at the last entry ({last_start})"),
        ));
    }
    if zllen != UNKNOWN_COUNT && usize::from(zllen) != entries.len() {
        return Err(r.error_at(
            8,
            format!("header declares {zllen} entries, found {}", entries.len()),
        ));
    }

    Ok(entries)
}

fn read_entry(r: &mut BlobReader<'_>) -> Result<PackedEntry, PackedError> {
    let at = r.position();
    let enc = r.u8()?;
    let entry = match enc >> 6 {
        0b00 => PackedEntry::Bytes(r.take(usize::from(enc & 0x3F))?),
        0b01 => {
            let len = (usize::from(enc & 0x3F) << 8) | usize::from(r.u8()?);
            PackedEntry::Bytes(r.take(len)?)
        }
        0b10 => {
            let len = r.u32_be()? as usize;
            PackedEntry::Bytes(r.take(len)?)
        }
        _ => match enc {
            INT_16 => PackedEntry::Int(r.i16_le()?),
            INT_32 => PackedEntry::Int(r.i32_le()?),
            INT_64 => PackedEntry::Int(r.i64_le()?),
            INT_24 => PackedEntry::Int(r.i24_le()?),
            INT_8 => PackedEntry::Int(i64::from(r.u8()? as i8)),
            0xF1..=0xFD => PackedEntry::Int(i64::from(enc & 0x0F) - 1),
            _ => return Err(r.error_at(at, format!("invalid entry encoding 0x{enc:02X}"))),
        },
    };
    Ok(entry)
}
