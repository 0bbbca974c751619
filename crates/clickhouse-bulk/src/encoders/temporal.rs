//! Temporal instants as `DateTime` and `DateTime64(p)`.
//!
//! `DateTime64(p)` is `seconds * 10^p + nanos * 10^p / 10^9` since the Unix
//! epoch, written as a signed 64-bit little-endian integer. `DateTime` is the
//! whole-second count as an unsigned 32-bit integer; sub-second digits are
//! dropped.

use bytes::BufMut;
use chrono::{DateTime, Utc};

use super::primitive::mismatch;
use crate::error::ValueError;
use crate::types::{DateTimePrecision, Value};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Encoder for `DateTime64` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeEncoder {
    precision: DateTimePrecision,
}

impl DateTimeEncoder {
    /// Create an encoder at the given precision.
    #[must_use]
    pub const fn new(precision: DateTimePrecision) -> Self {
        Self { precision }
    }

    /// Returns the precision.
    #[must_use]
    pub const fn precision(&self) -> DateTimePrecision {
        self.precision
    }

    /// Ticks since the epoch at this precision.
    pub fn ticks(&self, instant: &DateTime<Utc>) -> Result<i64, ValueError> {
        let multiplier = self.precision.multiplier();
        let seconds = instant.timestamp();
        let nanos = i64::from(instant.timestamp_subsec_nanos());
        seconds
            .checked_mul(multiplier)
            .and_then(|whole| whole.checked_add(nanos / (NANOS_PER_SECOND / multiplier)))
            .ok_or_else(|| {
                ValueError::overflow(format!(
                    "{instant} does not fit DateTime64({})",
                    self.precision.exponent()
                ))
            })
    }

    /// Write one value.
    pub fn encode<B: BufMut + ?Sized>(
        &self,
        value: Value<'_>,
        buf: &mut B,
    ) -> Result<(), ValueError> {
        match value {
            Value::DateTime(instant) => {
                buf.put_i64_le(self.ticks(&instant)?);
                Ok(())
            }
            other => Err(mismatch("DateTime64", other)),
        }
    }
}

/// Write one `DateTime` value.
pub fn encode_datetime<B: BufMut + ?Sized>(
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    match value {
        Value::DateTime(instant) => {
            let seconds = u32::try_from(instant.timestamp()).map_err(|_| {
                ValueError::overflow(format!("{instant} is outside the DateTime range"))
            })?;
            buf.put_u32_le(seconds);
            Ok(())
        }
        other => Err(mismatch("DateTime", other)),
    }
}
