//! Dynamically-shaped rows.
//!
//! [`DynamicRow`] is an ordered list of named [`DynValue`]s for sources whose
//! shape is only known at run time. Column types are inferred from the value
//! variants of the first row unless an explicit tag is supplied.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use uuid::Uuid;

use super::decimal::Decimal;
use super::tag::TypeTag;
use super::value::{RowBinaryValue, Value};
use crate::error::TypeError;
use crate::schema::ColumnMeta;

/// Owned field value of a dynamically-shaped row.
#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 8-bit integer.
    Int8(i8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// Signed 128-bit integer.
    Int128(i128),
    /// Unsigned 128-bit integer.
    UInt128(u128),
    /// Single precision float.
    Float32(f32),
    /// Double precision float.
    Float64(f64),
    /// Arbitrary-precision integer.
    BigInt(BigInt),
    /// Arbitrary-precision decimal.
    Decimal(Decimal),
    /// UTF-8 text.
    String(String),
    /// Instant in UTC.
    DateTime(DateTime<Utc>),
    /// IP address.
    Ip(IpAddr),
    /// UUID.
    Uuid(Uuid),
    /// Sequence of values.
    Array(Vec<DynValue>),
    /// Ordered key/value pairs.
    Map(Vec<(DynValue, DynValue)>),
    /// Fixed-arity tuple.
    Tuple(Vec<DynValue>),
}

impl DynValue {
    /// Infer the wire type from the value variant.
    ///
    /// Nulls and empty collections carry no type information; declare those
    /// columns explicitly.
    ///
    /// # Errors
    ///
    /// Returns a reason when no type can be inferred.
    pub fn infer_tag(&self, meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        let tag = match self {
            Self::Null => {
                return Err(TypeError::unsupported(
                    "cannot infer a type from a null value",
                ));
            }
            Self::Bool(_) => TypeTag::Bool,
            Self::Int8(_) => TypeTag::Int8,
            Self::Int16(_) => TypeTag::Int16,
            Self::Int32(_) => TypeTag::Int32,
            Self::Int64(_) => TypeTag::Int64,
            Self::UInt8(_) => TypeTag::UInt8,
            Self::UInt16(_) => TypeTag::UInt16,
            Self::UInt32(_) => TypeTag::UInt32,
            Self::UInt64(_) => TypeTag::UInt64,
            Self::Int128(_) => i128::type_tag(meta)?,
            Self::UInt128(_) => u128::type_tag(meta)?,
            Self::Float32(_) => TypeTag::Float32,
            Self::Float64(_) => TypeTag::Float64,
            Self::BigInt(_) => BigInt::type_tag(meta)?,
            Self::Decimal(_) => Decimal::type_tag(meta)?,
            Self::String(_) => TypeTag::String,
            Self::DateTime(_) => DateTime::<Utc>::type_tag(meta)?,
            Self::Ip(IpAddr::V4(_)) => TypeTag::Ipv4,
            Self::Ip(IpAddr::V6(_)) => TypeTag::Ipv6,
            Self::Uuid(_) => TypeTag::Uuid,
            Self::Array(items) => {
                let first = items
                    .first()
                    .ok_or_else(|| {
                    TypeError::unsupported("cannot infer the element type of an empty array")
                })?;
                TypeTag::array(first.infer_tag(meta)?)
            }
            Self::Map(entries) => {
                let (key, value) = entries
                    .first()
                    .ok_or_else(|| {
                    TypeError::unsupported("cannot infer the entry types of an empty map")
                })?;
                TypeTag::map(key.infer_tag(meta)?, value.infer_tag(meta)?)
            }
            Self::Tuple(slots) => {
                if slots.is_empty() {
                    return Err(TypeError::unsupported(
                        "empty tuple has no wire representation",
                    ));
                }
                TypeTag::Tuple(
                    slots
                        .iter()
                        .map(|slot| slot.infer_tag(meta))
                        .collect::<Result<_, _>>()?,
                )
            }
        };
        Ok(tag)
    }
}

impl RowBinaryValue for DynValue {
    fn type_tag(_meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Err(TypeError::unsupported(
            "dynamic values take their type from data; use DynamicBulkCopy",
        ))
    }

    fn to_value(&self) -> Value<'_> {
        match self {
            Self::Null => Value::Null,
            Self::Bool(v) => Value::Bool(*v),
            Self::Int8(v) => Value::Int8(*v),
            Self::Int16(v) => Value::Int16(*v),
            Self::Int32(v) => Value::Int32(*v),
            Self::Int64(v) => Value::Int64(*v),
            Self::UInt8(v) => Value::UInt8(*v),
            Self::UInt16(v) => Value::UInt16(*v),
            Self::UInt32(v) => Value::UInt32(*v),
            Self::UInt64(v) => Value::UInt64(*v),
            Self::Int128(v) => Value::Int128(*v),
            Self::UInt128(v) => Value::UInt128(*v),
            Self::Float32(v) => Value::Float32(*v),
            Self::Float64(v) => Value::Float64(*v),
            Self::BigInt(v) => Value::BigInt(v),
            Self::Decimal(v) => Value::Decimal(v),
            Self::String(v) => Value::String(v),
            Self::DateTime(v) => Value::DateTime(*v),
            Self::Ip(v) => Value::Ip(*v),
            Self::Uuid(v) => Value::Uuid(*v),
            Self::Array(items) => Value::Array(items),
            Self::Map(entries) => Value::Map(entries),
            Self::Tuple(slots) => Value::Tuple(slots),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for DynValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    i128 => Int128,
    u128 => UInt128,
    f32 => Float32,
    f64 => Float64,
    BigInt => BigInt,
    Decimal => Decimal,
    String => String,
    DateTime<Utc> => DateTime,
    IpAddr => Ip,
    Uuid => Uuid,
}

impl From<&str> for DynValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for DynValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Row whose fields are only known at run time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicRow {
    fields: Vec<(String, DynValue)>,
}

impl DynamicRow {
    /// Create an empty row.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<DynValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Append a field.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<DynValue>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Look a field up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DynValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Field value at `index`, or `None` past the end.
    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<&DynValue> {
        self.fields.get(index).map(|(_, value)| value)
    }

    /// Field name and value at `index`.
    #[must_use]
    pub fn field_at(&self, index: usize) -> Option<(&str, &DynValue)> {
        self.fields
            .get(index)
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Position of the field called `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field == name)
    }

    /// Iterate over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DynValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>, V: Into<DynValue>> FromIterator<(N, V)> for DynamicRow {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}
