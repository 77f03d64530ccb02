//! Intset decoding: `encoding u32 | length u32 | length × signed int`, all
//! little-endian, members strictly ascending.

use bytes::Bytes;

use super::{BlobReader, PackedError};

const STRUCTURE: &str = "intset";
const HEADER_SIZE: usize = 8;

pub fn decode(blob: &Bytes) -> Result<Vec<i64>, PackedError> {
    let mut r = BlobReader::new(blob, STRUCTURE);
    let width = r.u32_le()?;
    let len = r.u32_le()? as usize;

    if !matches!(width, 2 | 4 | 8) {
        return Err(r.error_at(0, format!("invalid integer width {width}")));
    }
    let width = width as usize;

    let expected = len
        .checked_mul(width)
        .and_then(|body| body.checked_add(HEADER_SIZE));
    if expected != Some(r.len()) {
        return Err(r.error_at(
            4,
            format!(
                "{len} members of {width} bytes do not fit a {}-byte blob",
                r.len()
            ),
        ));
    }

    let mut members = Vec::with_capacity(len);
    for _ in 0..len {
        let at = r.position();
        let v = match width {
            2 => r.i16_le()?,
            4 => r.i32_le()?,
            _ => r.i64_le()?,
        };
        if members.last().is_some_and(|&prev| prev >= v) {
            return Err(r.error_at(at, format!("member {v} breaks ascending order")));
        }
        members.push(v);
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(
        width: u32,
        values: &[i64],
    ) -> Bytes {
        let mut out = Vec::new();
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&(values.len() as u32).to_le_bytes());
        for &v in values {
            match width {
                2 => out.extend_from_slice(&(v as i16).to_le_bytes()),
                4 => out.extend_from_slice(&(v as i32).to_le_bytes()),
                _ => out.extend_from_slice(&v.to_le_bytes()),
            }
        }
        Bytes::from(out)
    }

    #[test]
    fn test_widths() {
        assert_eq!(decode(&build(2, &[-3, 0, 7])).unwrap(), vec![-3, 0, 7]);
        assert_eq!(
            decode(&build(4, &[-70000, 70000])).unwrap(),
            vec![-70000, 70000]
        );
        assert_eq!(
            decode(&build(8, &[i64::MIN, i64::MAX])).unwrap(),
            vec![i64::MIN, i64::MAX]
        );
        assert!(decode(&build(2, &[])).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_width() {
        let err = decode(&build(3, &[])).unwrap_err();
        assert!(err.reason.contains("width"));
    }

    #[test]
    fn test_length_mismatch() {
        let mut bytes = build(2, &[1, 2]).to_vec();
        bytes.push(0);
        assert!(decode(&Bytes::from(bytes)).is_err());
    }

    #[test]
    fn test_order_enforced() {
        assert!(decode(&build(4, &[5, 5])).is_err());
        assert!(decode(&build(4, &[6, 5])).is_err());
    }
}
