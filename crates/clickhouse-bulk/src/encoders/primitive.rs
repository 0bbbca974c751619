//! Fixed-width primitives: booleans, integers and floats.
//!
//! All values are little-endian at their natural width. Integer columns
//! accept any integer value that fits; floats accept either float width.

use bytes::BufMut;

use crate::error::ValueError;
use crate::types::Value;

/// Widen any integer value to `i128`.
pub(crate) fn integer(value: Value<'_>, target: &str) -> Result<i128, ValueError> {
    let wide = match value {
        Value::Int8(v) => i128::from(v),
        Value::Int16(v) => i128::from(v),
        Value::Int32(v) => i128::from(v),
        Value::Int64(v) => i128::from(v),
        Value::UInt8(v) => i128::from(v),
        Value::UInt16(v) => i128::from(v),
        Value::UInt32(v) => i128::from(v),
        Value::UInt64(v) => i128::from(v),
        Value::Int128(v) => v,
        Value::UInt128(v) => i128::try_from(v)
            .map_err(|_| ValueError::overflow(format!("{v} does not fit {target}")))?,
        Value::Enum(v) => i128::from(v),
        other => return Err(mismatch(target, other)),
    };
    Ok(wide)
}

pub(crate) fn mismatch(target: &str, value: Value<'_>) -> ValueError {
    ValueError::mismatch(format!("expected a {target} value, got {}", value.kind()))
}

pub(crate) fn encode_bool<B: BufMut + ?Sized>(
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    match value {
        Value::Bool(v) => {
            buf.put_u8(u8::from(v));
            Ok(())
        }
        other => Err(mismatch("Bool", other)),
    }
}

macro_rules! fixed_int {
    ($($fn_name:ident: $ty:ty => $put:ident, $label:literal;)*) => {
        $(
            pub(crate) fn $fn_name<B: BufMut + ?Sized>(
                value: Value<'_>,
                buf: &mut B,
            ) -> Result<(), ValueError> {
                let wide = integer(value, $label)?;
                let narrow = <$ty>::try_from(wide).map_err(|_| {
                    ValueError::overflow(format!("{wide} does not fit {}", $label))
                })?;
                buf.$put(narrow);
                Ok(())
            }
        )*
    };
}

fixed_int! {
    encode_i8: i8 => put_i8, "Int8";
    encode_i16: i16 => put_i16_le, "Int16";
    encode_i32: i32 => put_i32_le, "Int32";
    encode_i64: i64 => put_i64_le, "Int64";
    encode_u8: u8 => put_u8, "UInt8";
    encode_u16: u16 => put_u16_le, "UInt16";
    encode_u32: u32 => put_u32_le, "UInt32";
    encode_u64: u64 => put_u64_le, "UInt64";
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn encode_f32<B: BufMut + ?Sized>(
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    let v = match value {
        Value::Float32(v) => v,
        Value::Float64(v) => v as f32,
        other => integer(other, "Float32")? as f32,
    };
    buf.put_f32_le(v);
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn encode_f64<B: BufMut + ?Sized>(
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    let v = match value {
        Value::Float64(v) => v,
        Value::Float32(v) => f64::from(v),
        other => integer(other, "Float64")? as f64,
    };
    buf.put_f64_le(v);
    Ok(())
}
