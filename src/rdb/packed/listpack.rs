//! Listpack decoding.
//!
//! ```text
//! total u32 | count u16 | (encoding [+ data] | backlen)* | 0xFF
//! ```
//!
//! `backlen` stores the size of encoding + data in 1 to 5 bytes, 7 bits per
//! byte, so the list can be walked from the tail. Every byte except the first
//! one has its high bit set.

use bytes::Bytes;

use super::{BlobReader, PackedEntry, PackedError};

const STRUCTURE: &str = "listpack";
const END: u8 = 0xFF;
const UNKNOWN_COUNT: u16 = u16::MAX;

const STR_32: u8 = 0xF0;
const INT_16: u8 = 0xF1;
const INT_24: u8 = 0xF2;
const INT_32: u8 = 0xF3;
const INT_64: u8 = 0xF4;

pub fn decode(blob: &Bytes) -> Result<Vec<PackedEntry>, PackedError> {
    let mut r = BlobReader::new(blob, STRUCTURE);
    let total = r.u32_le()? as usize;
    let count = r.u16_le()?;

    if total != r.len() {
        return Err(r.error_at(
            0,
            format!("header declares {total} bytes, blob has {}", r.len()),
        ));
    }

    let mut entries = Vec::with_capacity(usize::from(count.min(1024)));
    loop {
        let start = r.position();
        if r.peek()? == END {
            r.skip(1)?;
            break;
        }

        entries.push(read_entry(&mut r)?);
        let entry_len = r.position() - start;

        let backlen_at = r.position();
        let raw = r.take(backlen_size(entry_len))?;
        match decode_backlen(&raw) {
            Some(len) if len == entry_len => {}
            Some(len) => {
                return Err(r.error_at(
                    backlen_at,
                    format!("backlen {len} does not match entry size {entry_len}"),
                ))
            }
            None => return Err(r.error_at(backlen_at, "malformed backlen")),
        }
    }

    if r.position() != r.len() {
        return Err(r.error(format!(
            "{} trailing bytes after terminator",
            r.len() - r.position()
        )));
    }
    if count != UNKNOWN_COUNT && usize::from(count) != entries.len() {
        return Err(r.error_at(
            4,
            format!("header declares {count} entries, found {}", entries.len()),
        ));
    }

    Ok(entries)
}

fn read_entry(r: &mut BlobReader<'_>) -> Result<PackedEntry, PackedError> {
    let at = r.position();
    let enc = r.u8()?;
    let entry = match enc {
        0x00..=0x7F => PackedEntry::Int(i64::from(enc)),
        0x80..=0xBF => PackedEntry::Bytes(r.take(usize::from(enc & 0x3F))?),
        0xC0..=0xDF => {
            let raw = (i64::from(enc & 0x1F) << 8) | i64::from(r.u8()?);
            // 13-bit two's complement.
            let v = if raw >= 1 << 12 { raw - (1 << 13) } else { raw };
            PackedEntry::Int(v)
        }
        0xE0..=0xEF => {
            let len = (usize::from(enc & 0x0F) << 8) | usize::from(r.u8()?);
            PackedEntry::Bytes(r.take(len)?)
        }
        STR_32 => {
            let len = r.u32_le()? as usize;
            PackedEntry::Bytes(r.take(len)?)
        }
        INT_16 => PackedEntry::Int(r.i16_le()?),
        INT_24 => PackedEntry::Int(r.i24_le()?),
        INT_32 => PackedEntry::Int(r.i32_le()?),
        INT_64 => PackedEntry::Int(r.i64_le()?),
        _ => return Err(r.error_at(at, format!("invalid entry encoding 0x{enc:02X}"))),
    };
    Ok(entry)
}

/// Number of bytes used to store the back-length of an entry of `len` bytes.
pub fn backlen_size(len: usize) -> usize {
    match len {
        0..=127 => 1,
        128..=16382 => 2,
        16383..=2097150 => 3,
        2097151..=268435454 => 4,
        _ => 5,
    }
}

/// Decodes a stored back-length. The most significant 7-bit group comes
/// first and is the only byte without the continuation bit.
fn decode_backlen(raw: &[u8]) -> Option<usize> {
    let (first, rest) = raw.split_first()?;
    if first & 0x80 != 0 || rest.iter().any(|b| b & 0x80 == 0) {
        return None;
    }
    Some(
        raw.iter()
            .fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7F)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Appends `len` in back-length form.
    fn push_backlen(
        out: &mut Vec<u8>,
        len: usize,
    ) {
        let n = backlen_size(len);
        for i in (0..n).rev() {
            let group = ((len >> (7 * i)) & 0x7F) as u8;
            out.push(if i == n - 1 { group } else { group | 0x80 });
        }
    }

    fn build(bodies: &[&[u8]]) -> Vec<u8> {
        let mut out = vec![0u8; 6];
        for body in bodies {
            out.extend_from_slice(body);
            push_backlen(&mut out, body.len());
        }
        out.push(END);
        let total = out.len() as u32;
        out[0..4].copy_from_slice(&total.to_le_bytes());
        out[4..6].copy_from_slice(&(bodies.len() as u16).to_le_bytes());
        out
    }

    fn ok(bytes: Vec<u8>) -> Vec<PackedEntry> {
        decode(&Bytes::from(bytes)).unwrap()
    }

    #[test]
    fn test_backlen_sizes() {
        assert_eq!(backlen_size(1), 1);
        assert_eq!(backlen_size(127), 1);
        assert_eq!(backlen_size(128), 2);
        assert_eq!(backlen_size(16383), 3);
        assert_eq!(backlen_size(300_000_000), 5);
    }

    #[test]
    fn test_backlen_decoding() {
        let mut out = Vec::new();
        push_backlen(&mut out, 300);
        assert_eq!(out.len(), 2);
        assert_eq!(decode_backlen(&out), Some(300));
        assert_eq!(decode_backlen(&[0x85, 0x01]), None);
    }

    #[test]
    fn test_all_encodings() {
        let mut mid = vec![0xE0 | 0x01, 0x2C];
        mid.extend(std::iter::repeat(b'm').take(300));
        let mut wide = vec![STR_32];
        wide.extend_from_slice(&5000u32.to_le_bytes());
        wide.extend(std::iter::repeat(b'w').take(5000));
        let entries = ok(build(&[
            &[0x05],
            &[0x7F],
            b"\x83xyz",
            &[0xDF, 0xFF],
            &[0xD0, 0x00],
            &[0xCF, 0xFF],
            &mid,
            &wide,
            &[INT_16, 0x00, 0x80],
            &[INT_24, 0xFF, 0xFF, 0xFF],
            &[INT_32, 0x00, 0x00, 0x00, 0x80],
            &[INT_64, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F],
        ]));
        assert_eq!(entries[0], PackedEntry::Int(5));
        assert_eq!(entries[1], PackedEntry::Int(127));
        assert_eq!(entries[2], PackedEntry::Bytes(Bytes::from_static(b"xyz")));
        assert_eq!(entries[3], PackedEntry::Int(-1));
        assert_eq!(entries[4], PackedEntry::Int(-4096));
        assert_eq!(entries[5], PackedEntry::Int(4095));
        assert_eq!(entries[6], PackedEntry::Bytes(Bytes::from(vec![b'm'; 300])));
        assert_eq!(entries[7], PackedEntry::Bytes(Bytes::from(vec![b'w'; 5000])));
        assert_eq!(entries[8], PackedEntry::Int(i64::from(i16::MIN)));
        assert_eq!(entries[9], PackedEntry::Int(-1));
        assert_eq!(entries[10], PackedEntry::Int(i64::from(i32::MIN)));
        assert_eq!(entries[11], PackedEntry::Int(i64::MAX));
    }

    #[test]
    fn test_empty() {
        assert!(ok(build(&[])).is_empty());
    }

    #[test]
    fn test_backlen_mismatch() {
        let mut bytes = build(&[b"\x82ab"]);
        bytes[6 + 3] = 2;
        let err = decode(&Bytes::from(bytes)).unwrap_err();
        assert!(err.reason.contains("backlen"));
    }

    #[test]
    fn test_invalid_encodings() {
        for enc in 0xF5..=0xFEu8 {
            let bytes = build(&[&[enc]]);
            let err = decode(&Bytes::from(bytes)).unwrap_err();
            assert!(err.reason.contains("invalid entry encoding"), "{enc:#x}");
        }
    }

    #[test]
    fn test_total_and_count_checks() {
        let mut bytes = build(&[&[0x01]]);
        bytes[0] += 1;
        assert!(decode(&Bytes::from(bytes)).is_err());

        let mut bytes = build(&[&[0x01], &[0x02]]);
        bytes[4] = 1;
        assert!(decode(&Bytes::from(bytes.clone())).is_err());
        bytes[4] = 0xFF;
        bytes[5] = 0xFF;
        assert_eq!(ok(bytes).len(), 2);
    }

    #[test]
    fn test_trailing_garbage() {
        let mut bytes = build(&[&[0x01]]);
        bytes.push(0x00);
        let total = bytes.len() as u32;
        bytes[0..4].copy_from_slice(&total.to_le_bytes());
        assert!(decode(&Bytes::from(bytes)).is_err());
    }
}
