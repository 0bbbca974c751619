//! 128 and 256-bit integers.
//!
//! Values are written as fixed-width little-endian two's complement. Native
//! `i128`/`u128` inputs avoid allocating; big integers go through
//! [`put_twos_complement`], which decimals share.

use bytes::BufMut;
use num_bigint::{BigInt, BigUint, Sign};

use super::primitive::integer;
use crate::error::ValueError;
use crate::types::{BigIntWidth, Value};

/// Encoder for `Int128`, `UInt128`, `Int256` and `UInt256` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigIntEncoder {
    width: BigIntWidth,
    signed: bool,
}

impl BigIntEncoder {
    /// Create an encoder for the given width and signedness.
    #[must_use]
    pub const fn new(width: BigIntWidth, signed: bool) -> Self {
        Self { width, signed }
    }

    /// Wire width in bytes.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width.bytes()
    }

    fn label(&self) -> String {
        let prefix = if self.signed { "Int" } else { "UInt" };
        format!("{prefix}{}", self.width.bits())
    }

    /// Write one value.
    pub fn encode<B: BufMut + ?Sized>(
        &self,
        value: Value<'_>,
        buf: &mut B,
    ) -> Result<(), ValueError> {
        let width = self.width();
        match value {
            Value::BigInt(v) => self.put_big(v, buf),
            Value::BigUint(v) => self.put_magnitude(v, buf),
            Value::UInt128(v) => {
                if self.signed && width == 16 && v > i128::MAX as u128 {
                    return Err(self.overflow(&v));
                }
                buf.put_u128_le(v);
                buf.put_bytes(0, width - 16);
                Ok(())
            }
            other => {
                let v = integer(other, &self.label())?;
                if v < 0 && !self.signed {
                    return Err(self.negative(&v));
                }
                buf.put_i128_le(v);
                buf.put_bytes(if v < 0 { 0xFF } else { 0x00 }, width - 16);
                Ok(())
            }
        }
    }

    fn put_big<B: BufMut + ?Sized>(&self, value: &BigInt, buf: &mut B) -> Result<(), ValueError> {
        match value.sign() {
            Sign::Minus if !self.signed => Err(self.negative(value)),
            // Non-negative values for unsigned targets are plain magnitudes.
            Sign::Plus | Sign::NoSign if !self.signed => self.put_magnitude(value.magnitude(), buf),
            _ => put_twos_complement(value, self.width(), buf)
                .map_err(|_| self.overflow(value)),
        }
    }

    fn put_magnitude<B: BufMut + ?Sized>(
        &self,
        value: &BigUint,
        buf: &mut B,
    ) -> Result<(), ValueError> {
        let width = self.width();
        let limit = if self.signed { width * 8 - 1 } else { width * 8 };
        if value.bits() > limit as u64 {
            return Err(self.overflow(value));
        }
        let bytes = value.to_bytes_le();
        buf.put_slice(&bytes);
        buf.put_bytes(0, width - bytes.len());
        Ok(())
    }

    fn overflow(&self, value: &dyn std::fmt::Display) -> ValueError {
        ValueError::overflow(format!("{value} does not fit {}", self.label()))
    }

    fn negative(&self, value: &dyn std::fmt::Display) -> ValueError {
        ValueError::overflow(format!(
            "negative value {value} cannot be written to {}",
            self.label()
        ))
    }
}

/// Write `value` as `width` bytes of little-endian two's complement.
///
/// Negative values are padded with `0xFF` above their significant bytes.
pub fn put_twos_complement<B: BufMut + ?Sized>(
    value: &BigInt,
    width: usize,
    buf: &mut B,
) -> Result<(), ValueError> {
    let bytes = value.to_signed_bytes_le();
    if bytes.len() > width {
        return Err(ValueError::overflow(format!(
            "{value} needs {} bytes, {width} available",
            bytes.len()
        )));
    }
    let fill = if value.sign() == Sign::Minus { 0xFF } else { 0x00 };
    buf.put_slice(&bytes);
    buf.put_bytes(fill, width - bytes.len());
    Ok(())
}
