//! Enumerations, nullable values and collections.
//!
//! Collections are counted with a base-128 varint and then encode their
//! elements with the inner encoder, in source iteration order. An absent
//! collection is written as an empty one.

use bytes::BufMut;

use super::factory::Encoder;
use super::primitive::{integer, mismatch};
use super::string::{put_varint, varint_len};
use crate::error::{TypeError, ValueError};
use crate::types::tag::enum_width;
use crate::types::{NullableEncoding, Value};

/// Encoder for enumeration ordinals.
///
/// The width comes from the number of declared members, not from the largest
/// ordinal, so an ordinal outside that width is an overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumEncoder {
    members: usize,
    width: usize,
}

impl EnumEncoder {
    /// Create an encoder for an enumeration with `members` variants.
    ///
    /// # Errors
    ///
    /// Returns a reason if the enumeration has no members.
    pub fn new(members: usize) -> Result<Self, TypeError> {
        if members == 0 {
            return Err(TypeError::invalid_parameter(
                "enumeration must declare at least one member",
            ));
        }
        Ok(Self {
            members,
            width: enum_width(members),
        })
    }

    /// Wire width in bytes.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of declared members.
    #[must_use]
    pub const fn members(&self) -> usize {
        self.members
    }

    /// Write one ordinal.
    pub fn encode<B: BufMut + ?Sized>(
        &self,
        value: Value<'_>,
        buf: &mut B,
    ) -> Result<(), ValueError> {
        let ordinal = integer(value, "Enum")?;
        let overflow = || {
            ValueError::overflow(format!(
                "ordinal {ordinal} does not fit a {}-byte enumeration",
                self.width
            ))
        };
        match self.width {
            1 => buf.put_u8(u8::try_from(ordinal).map_err(|_| overflow())?),
            2 => buf.put_u16_le(u16::try_from(ordinal).map_err(|_| overflow())?),
            _ => buf.put_u32_le(u32::try_from(ordinal).map_err(|_| overflow())?),
        }
        Ok(())
    }
}

pub(crate) fn encode_nullable<B: BufMut + ?Sized>(
    inner: &Encoder,
    layout: NullableEncoding,
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    match (layout, value) {
        (NullableEncoding::Marker, Value::Null) => buf.put_u8(1),
        (NullableEncoding::Marker, present) => {
            buf.put_u8(0);
            inner.encode(present, buf)?;
        }
        (NullableEncoding::PresenceFlag, Value::Null) => buf.put_u8(0),
        (NullableEncoding::PresenceFlag, _) => buf.put_u8(1),
    }
    Ok(())
}

pub(crate) fn nullable_len(
    inner: &Encoder,
    layout: NullableEncoding,
    value: Value<'_>,
) -> Result<usize, ValueError> {
    match (layout, value) {
        (NullableEncoding::Marker, Value::Null) | (NullableEncoding::PresenceFlag, _) => Ok(1),
        (NullableEncoding::Marker, present) => Ok(1 + inner.encoded_len(present)?),
    }
}

pub(crate) fn encode_array<B: BufMut + ?Sized>(
    element: &Encoder,
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    match value {
        Value::Null => put_varint(0, buf),
        Value::Array(items) => {
            put_varint(items.len() as u64, buf);
            items.try_for_each_value(&mut |item| element.encode(item, buf))?;
        }
        other => return Err(mismatch("Array", other)),
    }
    Ok(())
}

pub(crate) fn array_len(element: &Encoder, value: Value<'_>) -> Result<usize, ValueError> {
    match value {
        Value::Null => Ok(1),
        Value::Array(items) => {
            let mut total = varint_len(items.len() as u64);
            if let Some(width) = element.fixed_width() {
                return Ok(total + width * items.len());
            }
            items.try_for_each_value(&mut |item| {
                total += element.encoded_len(item)?;
                Ok(())
            })?;
            Ok(total)
        }
        other => Err(mismatch("Array", other)),
    }
}

pub(crate) fn encode_map<B: BufMut + ?Sized>(
    key: &Encoder,
    value_encoder: &Encoder,
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    match value {
        Value::Null => put_varint(0, buf),
        Value::Map(entries) => {
            put_varint(entries.len() as u64, buf);
            entries.try_for_each_entry(&mut |k, v| {
                key.encode(k, buf)?;
                value_encoder.encode(v, buf)
            })?;
        }
        other => return Err(mismatch("Map", other)),
    }
    Ok(())
}

pub(crate) fn map_len(
    key: &Encoder,
    value_encoder: &Encoder,
    value: Value<'_>,
) -> Result<usize, ValueError> {
    match value {
        Value::Null => Ok(1),
        Value::Map(entries) => {
            let mut total = varint_len(entries.len() as u64);
            entries.try_for_each_entry(&mut |k, v| {
                total += key.encoded_len(k)? + value_encoder.encoded_len(v)?;
                Ok(())
            })?;
            Ok(total)
        }
        other => Err(mismatch("Map", other)),
    }
}

pub(crate) fn encode_tuple<B: BufMut + ?Sized>(
    slots: &[Encoder],
    value: Value<'_>,
    buf: &mut B,
) -> Result<(), ValueError> {
    let items = tuple_items(slots, value)?;
    let mut index = 0;
    items.try_for_each_value(&mut |item| {
        slot(slots, index)?.encode(item, buf)?;
        index += 1;
        Ok(())
    })
}

pub(crate) fn tuple_len(slots: &[Encoder], value: Value<'_>) -> Result<usize, ValueError> {
    let items = tuple_items(slots, value)?;
    let mut index = 0;
    let mut total = 0;
    items.try_for_each_value(&mut |item| {
        total += slot(slots, index)?.encoded_len(item)?;
        index += 1;
        Ok(())
    })?;
    Ok(total)
}

fn slot(slots: &[Encoder], index: usize) -> Result<&Encoder, ValueError> {
    slots.get(index).ok_or_else(|| {
        ValueError::mismatch(format!(
            "tuple yielded more than the {} declared slots",
            slots.len()
        ))
    })
}

fn tuple_items<'a>(
    slots: &[Encoder],
    value: Value<'a>,
) -> Result<&'a dyn crate::types::Sequence, ValueError> {
    match value {
        Value::Tuple(items) if items.len() == slots.len() => Ok(items),
        Value::Tuple(items) => Err(ValueError::mismatch(format!(
            "tuple has {} slots, column expects {}",
            items.len(),
            slots.len()
        ))),
        other => Err(mismatch("Tuple", other)),
    }
}
