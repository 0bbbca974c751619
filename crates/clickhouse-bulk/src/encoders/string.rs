//! Length-prefixed strings and the base-128 varint shared by collections.

use bytes::BufMut;

use super::primitive::mismatch;
use crate::error::ValueError;
use crate::types::Value;

/// Largest length written as a single prefix byte.
const SHORT_STRING_MAX: usize = 0x7F;

/// Write `value` as a base-128 varint, least significant group first.
pub fn put_varint<B: BufMut + ?Sized>(mut value: u64, buf: &mut B) {
    while value > 0x7F {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes [`put_varint`] writes for `value`.
#[must_use]
pub const fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Encoded size of a string of `len` bytes, prefix included.
#[must_use]
pub const fn string_len(len: usize) -> usize {
    if len <= SHORT_STRING_MAX {
        1 + len
    } else {
        varint_len(len as u64) + len
    }
}

/// Write the length prefix and the UTF-8 bytes of `s`.
pub fn put_str<B: BufMut + ?Sized>(s: &str, buf: &mut B) {
    let bytes = s.as_bytes();
    if bytes.len() <= SHORT_STRING_MAX {
        buf.put_u8(bytes.len() as u8);
    } else {
        put_varint(bytes.len() as u64, buf);
    }
    buf.put_slice(bytes);
}

pub(crate) fn encode_string<B: BufMut + ?Sized>(
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    match value {
        Value::String(s) => {
            put_str(s, buf);
            Ok(())
        }
        other => Err(mismatch("String", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint() {
        let mut buf = Vec::new();
        put_varint(0, &mut buf);
        put_varint(127, &mut buf);
        put_varint(128, &mut buf);
        put_varint(300, &mut buf);
        assert_eq!(buf, [0x00, 0x7F, 0x80, 0x01, 0xAC, 0x02]);
    }

    #[test]
    fn test_varint_len_matches_output() {
        for value in [0, 1, 127, 128, 16_383, 16_384, 5000, u64::from(u32::MAX), u64::MAX] {
            let mut buf = Vec::new();
            put_varint(value, &mut buf);
            assert_eq!(buf.len(), varint_len(value), "value {value}");
        }
    }

    #[test]
    fn test_short_string() {
        let mut buf = Vec::new();
        encode_string(Value::String("hi"), &mut buf).unwrap();
        assert_eq!(buf, [0x02, 0x68, 0x69]);
        assert_eq!(string_len(2), 3);
    }

    #[test]
    fn test_long_string_prefix() {
        let s = "a".repeat(5000);
        let mut buf = Vec::new();
        put_str(&s, &mut buf);
        assert_eq!(&buf[..2], &[0x88, 0x27]);
        assert_eq!(buf.len(), 5002);
        assert_eq!(string_len(5000), 5002);
    }

    #[test]
    fn test_multibyte_uses_byte_length() {
        let s = "é".repeat(64);
        let mut buf = Vec::new();
        put_str(&s, &mut buf);
        assert_eq!(&buf[..2], &[0x80, 0x01]);
        assert_eq!(buf.len(), string_len(s.len()));
    }

    #[test]
    fn test_mismatch() {
        let mut buf = Vec::new();
        assert!(encode_string(Value::Int32(1), &mut buf).is_err());
    }
}
