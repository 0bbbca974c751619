//! Tag-to-encoder dispatch.
//!
//! [`Encoder::from_tag`] validates type parameters once, when a schema is
//! compiled. The resulting tree is immutable and walked for every value.

use bytes::BufMut;

use super::composite::{self, EnumEncoder};
use super::decimal::DecimalEncoder;
use super::integer::BigIntEncoder;
use super::network;
use super::primitive;
use super::string::{self, string_len};
use super::temporal::{self, DateTimeEncoder};
use crate::error::{TypeError, ValueError};
use crate::types::{NullableEncoding, TypeTag, Value};

/// Compiled encoder for one wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoder {
    /// `Bool`.
    Bool,
    /// `Int8`.
    Int8,
    /// `Int16`.
    Int16,
    /// `Int32`.
    Int32,
    /// `Int64`.
    Int64,
    /// `UInt8`.
    UInt8,
    /// `UInt16`.
    UInt16,
    /// `UInt32`.
    UInt32,
    /// `UInt64`.
    UInt64,
    /// `Float32`.
    Float32,
    /// `Float64`.
    Float64,
    /// `Decimal(p, s)`.
    Decimal(DecimalEncoder),
    /// `(U)Int128` and `(U)Int256`.
    BigInt(BigIntEncoder),
    /// `String`.
    String,
    /// `DateTime`.
    DateTime,
    /// `DateTime64(p)`.
    DateTime64(DateTimeEncoder),
    /// `IPv4`.
    Ipv4,
    /// `IPv6`.
    Ipv6,
    /// `UUID`.
    Uuid,
    /// `Enum`.
    Enum(EnumEncoder),
    /// `Nullable(T)`.
    Nullable(Box<Encoder>, NullableEncoding),
    /// `Array(T)`.
    Array(Box<Encoder>),
    /// `Map(K, V)`.
    Map(Box<Encoder>, Box<Encoder>),
    /// `Tuple(..)`.
    Tuple(Vec<Encoder>),
}

impl Encoder {
    /// Build the encoder for `tag`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-parameter reason when a type parameter is out of
    /// range.
    pub fn from_tag(tag: &TypeTag) -> Result<Self, TypeError> {
        let encoder = match tag {
            TypeTag::Bool => Self::Bool,
            TypeTag::Int8 => Self::Int8,
            TypeTag::Int16 => Self::Int16,
            TypeTag::Int32 => Self::Int32,
            TypeTag::Int64 => Self::Int64,
            TypeTag::UInt8 => Self::UInt8,
            TypeTag::UInt16 => Self::UInt16,
            TypeTag::UInt32 => Self::UInt32,
            TypeTag::UInt64 => Self::UInt64,
            TypeTag::Float32 => Self::Float32,
            TypeTag::Float64 => Self::Float64,
            TypeTag::Decimal { precision, scale } => {
                Self::Decimal(DecimalEncoder::new(*precision, *scale)?)
            }
            TypeTag::BigInt { width, signed } => Self::BigInt(BigIntEncoder::new(*width, *signed)),
            TypeTag::String => Self::String,
            TypeTag::DateTime => Self::DateTime,
            TypeTag::DateTime64 { precision } => {
                Self::DateTime64(DateTimeEncoder::new(*precision))
            }
            TypeTag::Ipv4 => Self::Ipv4,
            TypeTag::Ipv6 => Self::Ipv6,
            TypeTag::Uuid => Self::Uuid,
            TypeTag::Enum { members } => Self::Enum(EnumEncoder::new(*members)?),
            TypeTag::Nullable(inner, layout) => {
                if matches!(**inner, TypeTag::Nullable(..)) {
                    return Err(TypeError::invalid_parameter(
                        "Nullable(Nullable(..)) is not a valid type",
                    ));
                }
                Self::Nullable(Box::new(Self::from_tag(inner)?), *layout)
            }
            TypeTag::Array(element) => Self::Array(Box::new(Self::from_tag(element)?)),
            TypeTag::Map(key, value) => Self::Map(
                Box::new(Self::from_tag(key)?),
                Box::new(Self::from_tag(value)?),
            ),
            TypeTag::Tuple(slots) => {
                if slots.is_empty() {
                    return Err(TypeError::invalid_parameter(
                        "tuple must have at least one slot",
                    ));
                }
                Self::Tuple(
                    slots
                        .iter()
                        .map(Self::from_tag)
                        .collect::<Result<_, _>>()?,
                )
            }
        };
        Ok(encoder)
    }

    /// Wire size when it does not depend on the value.
    #[must_use]
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float32 | Self::Ipv4 | Self::DateTime => Some(4),
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::DateTime64(_) => Some(8),
            Self::Ipv6 | Self::Uuid => Some(16),
            Self::Decimal(d) => Some(d.width()),
            Self::BigInt(b) => Some(b.width()),
            Self::Enum(e) => Some(e.width()),
            Self::Nullable(_, NullableEncoding::PresenceFlag) => Some(1),
            Self::Tuple(slots) => slots.iter().map(Self::fixed_width).sum(),
            Self::String | Self::Nullable(..) | Self::Array(_) | Self::Map(..) => None,
        }
    }

    /// Exact number of bytes [`encode`](Self::encode) writes for `value`.
    pub fn encoded_len(&self, value: Value<'_>) -> Result<usize, ValueError> {
        if let Some(width) = self.fixed_width() {
            return Ok(width);
        }
        match self {
            Self::String => match value {
                Value::String(s) => Ok(string_len(s.len())),
                other => Err(primitive::mismatch("String", other)),
            },
            Self::Nullable(inner, layout) => composite::nullable_len(inner, *layout, value),
            Self::Array(element) => composite::array_len(element, value),
            Self::Map(key, val) => composite::map_len(key, val, value),
            Self::Tuple(slots) => composite::tuple_len(slots, value),
            _ => Ok(0),
        }
    }

    /// Write one value.
    pub fn encode<B: BufMut + ?Sized>(
        &self,
        value: Value<'_>,
        buf: &mut B,
    ) -> Result<(), ValueError> {
        match self {
            Self::Bool => primitive::encode_bool(value, buf),
            Self::Int8 => primitive::encode_i8(value, buf),
            Self::Int16 => primitive::encode_i16(value, buf),
            Self::Int32 => primitive::encode_i32(value, buf),
            Self::Int64 => primitive::encode_i64(value, buf),
            Self::UInt8 => primitive::encode_u8(value, buf),
            Self::UInt16 => primitive::encode_u16(value, buf),
            Self::UInt32 => primitive::encode_u32(value, buf),
            Self::UInt64 => primitive::encode_u64(value, buf),
            Self::Float32 => primitive::encode_f32(value, buf),
            Self::Float64 => primitive::encode_f64(value, buf),
            Self::Decimal(d) => d.encode(value, buf),
            Self::BigInt(b) => b.encode(value, buf),
            Self::String => string::encode_string(value, buf),
            Self::DateTime => temporal::encode_datetime(value, buf),
            Self::DateTime64(d) => d.encode(value, buf),
            Self::Ipv4 => network::encode_ipv4(value, buf),
            Self::Ipv6 => network::encode_ipv6(value, buf),
            Self::Uuid => network::encode_uuid(value, buf),
            Self::Enum(e) => e.encode(value, buf),
            Self::Nullable(inner, layout) => composite::encode_nullable(inner, *layout, value, buf),
            Self::Array(element) => composite::encode_array(element, value, buf),
            Self::Map(key, val) => composite::encode_map(key, val, value, buf),
            Self::Tuple(slots) => composite::encode_tuple(slots, value, buf),
        }
    }
}
