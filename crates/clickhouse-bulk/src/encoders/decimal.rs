//! Fixed-point decimal encoder with precision and scale validation.
//!
//! The logical value is scaled by `10^scale` and the resulting mantissa is
//! written as two's complement at the width implied by the precision.

use bytes::BufMut;
use num_bigint::BigInt;

use super::integer::put_twos_complement;
use super::primitive::integer;
use crate::error::{TypeError, ValueError};
use crate::types::Decimal;
use crate::types::Value;
use crate::types::decimal::pow10;
use crate::types::tag::decimal_width;

/// Largest supported decimal precision.
pub const MAX_PRECISION: u8 = 76;

/// Validated decimal configuration.
///
/// Ensures precision and scale are valid at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalEncoder {
    precision: u8,
    scale: u8,
    width: usize,
}

impl DecimalEncoder {
    /// Create a new decimal encoder.
    ///
    /// # Errors
    ///
    /// Returns a reason if precision is outside 1..=76 or scale exceeds it.
    pub fn new(precision: u8, scale: u8) -> Result<Self, TypeError> {
        let width = decimal_width(precision).ok_or_else(|| {
            TypeError::invalid_parameter(format!(
                "decimal precision must be between 1 and {MAX_PRECISION}, got {precision}"
            ))
        })?;
        if scale > precision {
            return Err(TypeError::invalid_parameter(format!(
                "decimal scale ({scale}) cannot exceed precision ({precision})"
            )));
        }
        Ok(Self {
            precision,
            scale,
            width,
        })
    }

    /// Returns the precision value.
    #[must_use]
    pub const fn precision(&self) -> u8 {
        self.precision
    }

    /// Returns the scale value.
    #[must_use]
    pub const fn scale(&self) -> u8 {
        self.scale
    }

    /// Wire width in bytes.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Mantissa of `value` at this encoder's scale, truncated toward zero.
    pub fn mantissa(&self, value: Value<'_>) -> Result<BigInt, ValueError> {
        let scale = u32::from(self.scale);
        let mantissa = match value {
            Value::Decimal(d) => d.scale_mantissa(scale),
            Value::BigInt(v) => v * pow10(scale),
            Value::BigUint(v) => BigInt::from(v.clone()) * pow10(scale),
            Value::Float32(v) => from_float(f64::from(v), scale)?,
            Value::Float64(v) => from_float(v, scale)?,
            other => BigInt::from(integer(other, "Decimal")?) * pow10(scale),
        };
        Ok(mantissa)
    }

    /// Write one value.
    pub fn encode<B: BufMut + ?Sized>(
        &self,
        value: Value<'_>,
        buf: &mut B,
    ) -> Result<(), ValueError> {
        let mantissa = self.mantissa(value)?;
        put_twos_complement(&mantissa, self.width, buf).map_err(|_| {
            ValueError::overflow(format!(
                "{} does not fit Decimal({}, {})",
                Decimal::new(mantissa.clone(), u32::from(self.scale)),
                self.precision,
                self.scale
            ))
        })
    }
}

fn from_float(value: f64, scale: u32) -> Result<BigInt, ValueError> {
    Decimal::from_f64(value)
        .map(|d| d.scale_mantissa(scale))
        .ok_or_else(|| ValueError::mismatch(format!("{value} is not a finite decimal")))
}
