//! Length prefixes, encoded strings and doubles.
//!
//! A length prefix starts with a tag byte whose two high bits select the form:
//!
//! | bits | form                                             |
//! |------|--------------------------------------------------|
//! | `00` | 6-bit length in the low bits                     |
//! | `01` | 14-bit length, low bits + next byte              |
//! | `10` | `0x80`: u32 BE follows, `0x81`: u64 BE follows    |
//! | `11` | special string encoding in the low bits          |

use std::io::Read;

use bytes::Bytes;
use rdbstream_error::{RdbError, RdbResult};

use super::{compression::Decompressor, cursor::ByteCursor};

const LEN_6BIT: u8 = 0;
const LEN_14BIT: u8 = 1;
const LEN_WIDE: u8 = 2;
const LEN_32BIT: u8 = 0x80;
const LEN_64BIT: u8 = 0x81;

const ENC_INT8: u8 = 0;
const ENC_INT16: u8 = 1;
const ENC_INT32: u8 = 2;
const ENC_LZF: u8 = 3;
/// Upper bound of LZF output per input byte (a 3-byte back-reference copies
/// at most 264 bytes).
const LZF_MAX_EXPANSION: usize = 88;

/// Textual double markers.
const DOUBLE_NAN: u8 = 253;
const DOUBLE_POS_INF: u8 = 254;
const DOUBLE_NEG_INF: u8 = 255;

/// Special string encodings selected by the `11` length form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Int8,
    Int16,
    Int32,
    Lzf,
}

/// A decoded length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Plain(u64),
    Encoded(StringEncoding),
}

/// Reads a length prefix that may also announce a special string encoding.
pub fn read_length_or_encoding<R: Read>(cursor: &mut ByteCursor<R>) -> RdbResult<Length> {
    let offset = cursor.offset();
    let b = cursor.read_u8()?;
    let len = match b >> 6 {
        LEN_6BIT => u64::from(b & 0x3F),
        LEN_14BIT => {
            let next = cursor.read_u8()?;
            (u64::from(b & 0x3F) << 8) | u64::from(next)
        }
        LEN_WIDE => match b {
            LEN_32BIT => u64::from(cursor.read_u32_be()?),
            LEN_64BIT => cursor.read_u64_be()?,
            _ => {
                return Err(RdbError::corrupt(
                    offset,
                    format!("invalid length prefix 0x{b:02X}"),
                ))
            }
        },
        _ => {
            let enc = match b & 0x3F {
                ENC_INT8 => StringEncoding::Int8,
                ENC_INT16 => StringEncoding::Int16,
                ENC_INT32 => StringEncoding::Int32,
                ENC_LZF => StringEncoding::Lzf,
                other => {
                    return Err(RdbError::corrupt(
                        offset,
                        format!("unknown string encoding {other}"),
                    ))
                }
            };
            return Ok(Length::Encoded(enc));
        }
    };
    Ok(Length::Plain(len))
}

/// Reads a plain length. A special encoding here is corruption.
pub fn read_length<R: Read>(cursor: &mut ByteCursor<R>) -> RdbResult<u64> {
    let offset = cursor.offset();
    match read_length_or_encoding(cursor)? {
        Length::Plain(len) => Ok(len),
        Length::Encoded(enc) => Err(RdbError::corrupt(
            offset,
            format!("expected a length, found {enc:?} string encoding"),
        )),
    }
}

/// Converts a declared length to `usize`, rejecting anything above `max`.
pub fn bounded(
    offset: u64,
    len: u64,
    max: usize,
    what: &str,
) -> RdbResult<usize> {
    usize::try_from(len)
        .ok()
        .filter(|&l| l <= max)
        .ok_or_else(|| RdbError::corrupt(offset, format!("{what} {len} exceeds limit {max}")))
}

/// Reads a string in any of its encodings.
///
/// Integer encodings are rendered as decimal text. Compressed payloads are
/// expanded through `decompressor` and must come out at exactly the declared
/// length.
pub fn read_string<R: Read, D: Decompressor + ?Sized>(
    cursor: &mut ByteCursor<R>,
    decompressor: &D,
    max_len: usize,
) -> RdbResult<Bytes> {
    let offset = cursor.offset();
    match read_length_or_encoding(cursor)? {
        Length::Plain(len) => {
            let len = bounded(offset, len, max_len, "string length")?;
            cursor.read_exact(len)
        }
        Length::Encoded(StringEncoding::Int8) => {
            let v = i8::from_le_bytes(cursor.read_array()?);
            Ok(int_to_bytes(i64::from(v)))
        }
        Length::Encoded(StringEncoding::Int16) => {
            let v = i16::from_le_bytes(cursor.read_array()?);
            Ok(int_to_bytes(i64::from(v)))
        }
        Length::Encoded(StringEncoding::Int32) => {
            let v = cursor.read_i32_le()?;
            Ok(int_to_bytes(i64::from(v)))
        }
        Length::Encoded(StringEncoding::Lzf) => {
            let clen_offset = cursor.offset();
            let clen = read_length(cursor)?;
            let clen = bounded(clen_offset, clen, max_len, "compressed length")?;
            let len_offset = cursor.offset();
            let len = read_length(cursor)?;
            let len = bounded(len_offset, len, max_len, "uncompressed length")?;
            if len > clen.saturating_mul(LZF_MAX_EXPANSION) {
                return Err(RdbError::corrupt(
                    len_offset,
                    format!("{clen} compressed bytes cannot expand to {len}"),
                ));
            }
            let payload = cursor.read_exact(clen)?;
            let out = decompressor
                .decompress(&payload, len)
                .map_err(|e| RdbError::corrupt(offset, format!("decompression failed: {e}")))?;
            if out.len() != len {
                return Err(RdbError::corrupt(
                    offset,
                    format!(
                        "decompressed {} bytes, header declares {len}",
                        out.len()
                    ),
                ));
            }
            Ok(Bytes::from(out))
        }
    }
}

/// Reads a double stored as length-prefixed ASCII text.
pub fn read_text_double<R: Read>(cursor: &mut ByteCursor<R>) -> RdbResult<f64> {
    let offset = cursor.offset();
    match cursor.read_u8()? {
        DOUBLE_NAN => Ok(f64::NAN),
        DOUBLE_POS_INF => Ok(f64::INFINITY),
        DOUBLE_NEG_INF => Ok(f64::NEG_INFINITY),
        len => {
            let text = cursor.read_exact(usize::from(len))?;
            parse_double(&text).ok_or_else(|| {
                RdbError::corrupt(
                    offset,
                    format!("invalid double {:?}", String::from_utf8_lossy(&text)),
                )
            })
        }
    }
}

/// Reads an IEEE-754 double, 8 bytes little-endian.
pub fn read_binary_double<R: Read>(cursor: &mut ByteCursor<R>) -> RdbResult<f64> {
    Ok(f64::from_le_bytes(cursor.read_array()?))
}

/// Parses ASCII decimal text as written by `%.17g`.
pub fn parse_double(text: &[u8]) -> Option<f64> {
    std::str::from_utf8(text).ok()?.parse().ok()
}

pub fn int_to_bytes(v: i64) -> Bytes {
    Bytes::from(v.to_string())
}
