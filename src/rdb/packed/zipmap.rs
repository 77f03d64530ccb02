//! Zipmap decoding.
//!
//! ```text
//! zmlen u8 | (len key | len free value [free bytes])* | 0xFF
//! ```
//!
//! Lengths take one byte below 254, otherwise `0xFE` followed by a u32.
//! `zmlen` is only a hint once it reaches 254.

use bytes::Bytes;

use super::{BlobReader, PackedError};

const STRUCTURE: &str = "zipmap";
const END: u8 = 0xFF;
const BIGLEN: u8 = 0xFE;

pub fn decode(blob: &Bytes) -> Result<Vec<(Bytes, Bytes)>, PackedError> {
    let mut r = BlobReader::new(blob, STRUCTURE);
    let zmlen = r.u8()?;

    let mut pairs = Vec::new();
    loop {
        let first = r.u8()?;
        if first == END {
            break;
        }
        let key_len = read_len(&mut r, first)?;
        let key = r.take(key_len)?;

        let first = r.u8()?;
        if first == END {
            return Err(r.error("key without a value"));
        }
        let value_len = read_len(&mut r, first)?;
        let free = usize::from(r.u8()?);
        let value = r.take(value_len)?;
        r.skip(free)?;

        pairs.push((key, value));
    }

    if r.position() != r.len() {
        return Err(r.error(format!(
            "{} trailing bytes after terminator",
            r.len() - r.position()
        )));
    }
    if zmlen < BIGLEN && usize::from(zmlen) != pairs.len() {
        return Err(r.error_at(
            0,
            format!("header declares {zmlen} pairs, found {}", pairs.len()),
        ));
    }
    Ok(pairs)
}

fn read_len(
    r: &mut BlobReader<'_>,
    first: u8,
) -> Result<usize, PackedError> {
    if first == BIGLEN {
        Ok(r.u32_le()? as usize)
    } else {
        Ok(usize::from(first))
    }
}
