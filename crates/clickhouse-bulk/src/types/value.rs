//! Borrowed field values and the trait that maps Rust types onto wire types.
//!
//! Field accessors return a [`Value`], a `Copy` view into the row. Scalars
//! are carried inline; strings, big numbers and collections are borrowed,
//! so reading a field never allocates.
//!
//! [`RowBinaryValue`] is the per-type half of the encoder registry: it picks
//! the [`TypeTag`] for a Rust type (honouring column metadata) and produces
//! the value view. Implement it by hand for your own enums:
//!
//! ```rust,ignore
//! use clickhouse_bulk::{ColumnMeta, RowBinaryValue, TypeError, TypeTag, Value};
//!
//! enum Side { Buy, Sell }
//!
//! impl RowBinaryValue for Side {
//!     fn type_tag(_meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
//!         Ok(TypeTag::Enum { members: 2 })
//!     }
//!
//!     fn to_value(&self) -> Value<'_> {
//!         Value::Enum(match self { Self::Buy => 0, Self::Sell => 1 })
//!     }
//! }
//! ```

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use num_bigint::{BigInt, BigUint};
use uuid::Uuid;

use super::decimal::Decimal;
use super::tag::TypeTag;
use crate::error::{TypeError, ValueError};
use crate::schema::ColumnMeta;

/// Borrowed view of one field value.
#[derive(Clone, Copy)]
pub enum Value<'a> {
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
    /// Arbitrary-precision signed integer.
    BigInt(&'a BigInt),
    /// Arbitrary-precision unsigned integer.
    BigUint(&'a BigUint),
    /// Arbitrary-precision decimal.
    Decimal(&'a Decimal),
    /// UTF-8 text.
    String(&'a str),
    /// Instant in UTC.
    DateTime(DateTime<Utc>),
    /// IP address of either family.
    Ip(IpAddr),
    /// UUID.
    Uuid(Uuid),
    /// Enumeration ordinal.
    Enum(u32),
    /// Variable-length sequence.
    Array(&'a dyn Sequence),
    /// Key/value collection.
    Map(&'a dyn Mapping),
    /// Fixed-arity tuple.
    Tuple(&'a dyn Sequence),
}

impl Value<'_> {
    /// Returns true for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in mismatch messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::Int8(_) => "Int8",
            Self::Int16(_) => "Int16",
            Self::Int32(_) => "Int32",
            Self::Int64(_) => "Int64",
            Self::UInt8(_) => "UInt8",
            Self::UInt16(_) => "UInt16",
            Self::UInt32(_) => "UInt32",
            Self::UInt64(_) => "UInt64",
            Self::Int128(_) => "Int128",
            Self::UInt128(_) => "UInt128",
            Self::Float32(_) => "Float32",
            Self::Float64(_) => "Float64",
            Self::BigInt(_) => "BigInt",
            Self::BigUint(_) => "BigUint",
            Self::Decimal(_) => "Decimal",
            Self::String(_) => "String",
            Self::DateTime(_) => "DateTime",
            Self::Ip(_) => "Ip",
            Self::Uuid(_) => "Uuid",
            Self::Enum(_) => "Enum",
            Self::Array(_) => "Array",
            Self::Map(_) => "Map",
            Self::Tuple(_) => "Tuple",
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::Int8(v) => write!(f, "Int8({v})"),
            Self::Int16(v) => write!(f, "Int16({v})"),
            Self::Int32(v) => write!(f, "Int32({v})"),
            Self::Int64(v) => write!(f, "Int64({v})"),
            Self::UInt8(v) => write!(f, "UInt8({v})"),
            Self::UInt16(v) => write!(f, "UInt16({v})"),
            Self::UInt32(v) => write!(f, "UInt32({v})"),
            Self::UInt64(v) => write!(f, "UInt64({v})"),
            Self::Int128(v) => write!(f, "Int128({v})"),
            Self::UInt128(v) => write!(f, "UInt128({v})"),
            Self::Float32(v) => write!(f, "Float32({v})"),
            Self::Float64(v) => write!(f, "Float64({v})"),
            Self::BigInt(v) => write!(f, "BigInt({v})"),
            Self::BigUint(v) => write!(f, "BigUint({v})"),
            Self::Decimal(v) => write!(f, "Decimal({v})"),
            Self::String(v) => write!(f, "String({v:?})"),
            Self::DateTime(v) => write!(f, "DateTime({v})"),
            Self::Ip(v) => write!(f, "Ip({v})"),
            Self::Uuid(v) => write!(f, "Uuid({v})"),
            Self::Enum(v) => write!(f, "Enum({v})"),
            Self::Array(v) => write!(f, "Array(len={})", v.len()),
            Self::Map(v) => write!(f, "Map(len={})", v.len()),
            Self::Tuple(v) => write!(f, "Tuple(len={})", v.len()),
        }
    }
}

/// Ordered collection readable as a sequence of values.
///
/// Backs both `Array` and `Tuple` columns.
pub trait Sequence: Sync {
    /// Number of elements.
    fn len(&self) -> usize;

    /// Returns true if there are no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every element in iteration order, stopping at the first error.
    fn try_for_each_value(
        &self,
        f: &mut dyn FnMut(Value<'_>) -> Result<(), ValueError>,
    ) -> Result<(), ValueError>;
}

/// Collection of key/value pairs, visited in source iteration order.
pub trait Mapping: Sync {
    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns true if there are no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every entry, stopping at the first error.
    fn try_for_each_entry(
        &self,
        f: &mut dyn FnMut(Value<'_>, Value<'_>) -> Result<(), ValueError>,
    ) -> Result<(), ValueError>;
}

/// Rust type with a natural RowBinary representation.
pub trait RowBinaryValue {
    /// Wire type for this Rust type under the given column metadata.
    ///
    /// # Errors
    ///
    /// Returns a reason when the type cannot be encoded.
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError>;

    /// Borrowed view of this value.
    fn to_value(&self) -> Value<'_>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Scalars
// ═══════════════════════════════════════════════════════════════════════════

macro_rules! impl_scalar {
    ($($ty:ty => $tag:ident, $variant:ident;)*) => {
        $(
            impl RowBinaryValue for $ty {
                fn type_tag(_meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
                    Ok(TypeTag::$tag)
                }

                fn to_value(&self) -> Value<'_> {
                    Value::$variant(*self)
                }
            }
        )*
    };
}

impl_scalar! {
    bool => Bool, Bool;
    i8 => Int8, Int8;
    i16 => Int16, Int16;
    i32 => Int32, Int32;
    i64 => Int64, Int64;
    u8 => UInt8, UInt8;
    u16 => UInt16, UInt16;
    u32 => UInt32, UInt32;
    u64 => UInt64, UInt64;
    f32 => Float32, Float32;
    f64 => Float64, Float64;
    Uuid => Uuid, Uuid;
}

impl RowBinaryValue for i128 {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::BigInt {
            width: meta.big_int_width(),
            signed: true,
        })
    }

    fn to_value(&self) -> Value<'_> {
        Value::Int128(*self)
    }
}

impl RowBinaryValue for u128 {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::BigInt {
            width: meta.big_int_width(),
            signed: false,
        })
    }

    fn to_value(&self) -> Value<'_> {
        Value::UInt128(*self)
    }
}

impl RowBinaryValue for BigInt {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::BigInt {
            width: meta.big_int_width(),
            signed: true,
        })
    }

    fn to_value(&self) -> Value<'_> {
        Value::BigInt(self)
    }
}

impl RowBinaryValue for BigUint {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::BigInt {
            width: meta.big_int_width(),
            signed: false,
        })
    }

    fn to_value(&self) -> Value<'_> {
        Value::BigUint(self)
    }
}

impl RowBinaryValue for Decimal {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::Decimal {
            precision: meta.precision(),
            scale: meta.scale(),
        })
    }

    fn to_value(&self) -> Value<'_> {
        Value::Decimal(self)
    }
}

impl RowBinaryValue for str {
    fn type_tag(_meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::String)
    }

    fn to_value(&self) -> Value<'_> {
        Value::String(self)
    }
}

impl RowBinaryValue for String {
    fn type_tag(_meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::String)
    }

    fn to_value(&self) -> Value<'_> {
        Value::String(self)
    }
}

impl RowBinaryValue for Cow<'_, str> {
    fn type_tag(_meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::String)
    }

    fn to_value(&self) -> Value<'_> {
        Value::String(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Temporal and network
// ═══════════════════════════════════════════════════════════════════════════

fn datetime_tag(meta: &ColumnMeta) -> TypeTag {
    TypeTag::DateTime64 {
        precision: meta.datetime_precision(),
    }
}

impl RowBinaryValue for DateTime<Utc> {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(datetime_tag(meta))
    }

    fn to_value(&self) -> Value<'_> {
        Value::DateTime(*self)
    }
}

impl RowBinaryValue for DateTime<FixedOffset> {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(datetime_tag(meta))
    }

    fn to_value(&self) -> Value<'_> {
        Value::DateTime(self.to_utc())
    }
}

/// Naive date-times are taken to be in UTC.
impl RowBinaryValue for NaiveDateTime {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(datetime_tag(meta))
    }

    fn to_value(&self) -> Value<'_> {
        Value::DateTime(self.and_utc())
    }
}

/// Calendar dates are written as midnight UTC.
impl RowBinaryValue for NaiveDate {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(datetime_tag(meta))
    }

    fn to_value(&self) -> Value<'_> {
        Value::DateTime(self.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl RowBinaryValue for Ipv4Addr {
    fn type_tag(_meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::Ipv4)
    }

    fn to_value(&self) -> Value<'_> {
        Value::Ip(IpAddr::V4(*self))
    }
}

impl RowBinaryValue for Ipv6Addr {
    fn type_tag(_meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::Ipv6)
    }

    fn to_value(&self) -> Value<'_> {
        Value::Ip(IpAddr::V6(*self))
    }
}

/// Mixed-family addresses go to an IPv6 column; IPv4 values are mapped.
impl RowBinaryValue for IpAddr {
    fn type_tag(_meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::Ipv6)
    }

    fn to_value(&self) -> Value<'_> {
        Value::Ip(*self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Wrappers and collections
// ═══════════════════════════════════════════════════════════════════════════

impl<T: RowBinaryValue + ?Sized> RowBinaryValue for &T {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        T::type_tag(meta)
    }

    fn to_value(&self) -> Value<'_> {
        (**self).to_value()
    }
}

impl<T: RowBinaryValue + ?Sized> RowBinaryValue for Box<T> {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        T::type_tag(meta)
    }

    fn to_value(&self) -> Value<'_> {
        (**self).to_value()
    }
}

impl<T: RowBinaryValue + ?Sized> RowBinaryValue for Arc<T> {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        T::type_tag(meta)
    }

    fn to_value(&self) -> Value<'_> {
        (**self).to_value()
    }
}

impl<T: RowBinaryValue> RowBinaryValue for Option<T> {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        let inner = T::type_tag(meta)?;
        if matches!(inner, TypeTag::Nullable(..)) {
            return Err(TypeError::unsupported(
                "nested Option has no wire representation",
            ));
        }
        Ok(TypeTag::Nullable(Box::new(inner), meta.nullable_encoding()))
    }

    fn to_value(&self) -> Value<'_> {
        self.as_ref().map_or(Value::Null, RowBinaryValue::to_value)
    }
}

impl<T: RowBinaryValue + Sync> Sequence for Vec<T> {
    fn len(&self) -> usize {
        Self::len(self)
    }

    fn try_for_each_value(
        &self,
        f: &mut dyn FnMut(Value<'_>) -> Result<(), ValueError>,
    ) -> Result<(), ValueError> {
        self.iter().try_for_each(|item| f(item.to_value()))
    }
}

impl<T: RowBinaryValue + Sync> RowBinaryValue for Vec<T> {
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::array(T::type_tag(meta)?))
    }

    fn to_value(&self) -> Value<'_> {
        Value::Array(self)
    }
}

/// Ordered key/value pairs, written in vector order.
impl<K, V> Mapping for Vec<(K, V)>
where
    K: RowBinaryValue + Sync,
    V: RowBinaryValue + Sync,
{
    fn len(&self) -> usize {
        Self::len(self)
    }

    fn try_for_each_entry(
        &self,
        f: &mut dyn FnMut(Value<'_>, Value<'_>) -> Result<(), ValueError>,
    ) -> Result<(), ValueError> {
        self.iter()
            .try_for_each(|(key, value)| f(key.to_value(), value.to_value()))
    }
}

impl<K, V, S> Mapping for HashMap<K, V, S>
where
    K: RowBinaryValue + Sync,
    V: RowBinaryValue + Sync,
    S: BuildHasher + Sync,
{
    fn len(&self) -> usize {
        Self::len(self)
    }

    fn try_for_each_entry(
        &self,
        f: &mut dyn FnMut(Value<'_>, Value<'_>) -> Result<(), ValueError>,
    ) -> Result<(), ValueError> {
        self.iter()
            .try_for_each(|(key, value)| f(key.to_value(), value.to_value()))
    }
}

impl<K, V> Mapping for BTreeMap<K, V>
where
    K: RowBinaryValue + Sync,
    V: RowBinaryValue + Sync,
{
    fn len(&self) -> usize {
        Self::len(self)
    }

    fn try_for_each_entry(
        &self,
        f: &mut dyn FnMut(Value<'_>, Value<'_>) -> Result<(), ValueError>,
    ) -> Result<(), ValueError> {
        self.iter()
            .try_for_each(|(key, value)| f(key.to_value(), value.to_value()))
    }
}

impl<K, V, S> RowBinaryValue for HashMap<K, V, S>
where
    K: RowBinaryValue + Sync,
    V: RowBinaryValue + Sync,
    S: BuildHasher + Sync,
{
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::map(K::type_tag(meta)?, V::type_tag(meta)?))
    }

    fn to_value(&self) -> Value<'_> {
        Value::Map(self)
    }
}

impl<K, V> RowBinaryValue for BTreeMap<K, V>
where
    K: RowBinaryValue + Sync,
    V: RowBinaryValue + Sync,
{
    fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
        Ok(TypeTag::map(K::type_tag(meta)?, V::type_tag(meta)?))
    }

    fn to_value(&self) -> Value<'_> {
        Value::Map(self)
    }
}

macro_rules! impl_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: RowBinaryValue + Sync),+> Sequence for ($($name,)+) {
            fn len(&self) -> usize {
                [$(stringify!($name)),+].len()
            }

            fn try_for_each_value(
                &self,
                f: &mut dyn FnMut(Value<'_>) -> Result<(), ValueError>,
            ) -> Result<(), ValueError> {
                $( f(self.$idx.to_value())?; )+
                Ok(())
            }
        }

        impl<$($name: RowBinaryValue + Sync),+> RowBinaryValue for ($($name,)+) {
            fn type_tag(meta: &ColumnMeta) -> Result<TypeTag, TypeError> {
                Ok(TypeTag::Tuple(vec![$($name::type_tag(meta)?),+]))
            }

            fn to_value(&self) -> Value<'_> {
                Value::Tuple(self)
            }
        }
    };
}

impl_tuple!(A: 0);
impl_tuple!(A: 0, B: 1);
impl_tuple!(A: 0, B: 1, C: 2);
impl_tuple!(A: 0, B: 1, C: 2, D: 3);
impl_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
