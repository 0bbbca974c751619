//! Semantic type tags.
//!
//! [`TypeTag`] is the closed set of wire types this crate can encode. Every
//! field of a row shape resolves to exactly one tag before any row is
//! written; the encoder registry dispatches on it.
//!
//! # Type Table
//!
//! | Tag | Destination type | Wire size |
//! |-----|------------------|-----------|
//! | `Bool` | Bool | 1 |
//! | `Int8`..`Int64` | Int8..Int64 | 1/2/4/8 |
//! | `UInt8`..`UInt64` | UInt8..UInt64 | 1/2/4/8 |
//! | `Float32`/`Float64` | Float32/Float64 | 4/8 |
//! | `Decimal { p, s }` | Decimal(p, s) | 4/8/16/32 by precision |
//! | `BigInt { width, signed }` | (U)Int128/(U)Int256 | 16/32 |
//! | `String` | String | varint length + bytes |
//! | `DateTime` | DateTime | 4 |
//! | `DateTime64 { precision }` | DateTime64(p) | 8 |
//! | `Ipv4`/`Ipv6` | IPv4/IPv6 | 4/16 |
//! | `Enum { members }` | Enum | 1/2/4 by member count |
//! | `Nullable(T)` | Nullable(T) | flag (+ T) |
//! | `Array(T)` | Array(T) | varint count + elements |
//! | `Map(K, V)` | Map(K, V) | varint count + pairs |
//! | `Tuple(..)` | Tuple(..) | slots in order |
//! | `Uuid` | UUID | 16 |

use std::fmt;

use crate::error::TypeError;

/// Sub-second precision of a temporal column.
///
/// The discriminant is the decimal exponent applied to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DateTimePrecision {
    /// Whole seconds.
    #[default]
    Second = 0,
    /// Milliseconds.
    Millisecond = 3,
    /// Microseconds.
    Microsecond = 6,
    /// Nanoseconds.
    Nanosecond = 9,
}

impl DateTimePrecision {
    /// Decimal exponent (0, 3, 6 or 9).
    #[must_use]
    pub const fn exponent(self) -> u32 {
        self as u32
    }

    /// Ticks per second at this precision.
    #[must_use]
    pub const fn multiplier(self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Millisecond => 1_000,
            Self::Microsecond => 1_000_000,
            Self::Nanosecond => 1_000_000_000,
        }
    }

    /// Build from a decimal exponent.
    ///
    /// Only 0, 3, 6 and 9 are supported.
    #[must_use]
    pub const fn from_exponent(exponent: u32) -> Option<Self> {
        match exponent {
            0 => Some(Self::Second),
            3 => Some(Self::Millisecond),
            6 => Some(Self::Microsecond),
            9 => Some(Self::Nanosecond),
            _ => None,
        }
    }
}

/// Width of an arbitrary-precision integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BigIntWidth {
    /// 128 bits (16 bytes).
    #[default]
    Bits128,
    /// 256 bits (32 bytes).
    Bits256,
}

impl BigIntWidth {
    /// Width in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Bits128 => 16,
            Self::Bits256 => 32,
        }
    }

    /// Width in bits.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.bytes() as u64 * 8
    }
}

/// How a nullable column is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NullableEncoding {
    /// Null marker byte (`1` = null, `0` = present) followed by the inner
    /// value when present. This is what the destination parses.
    #[default]
    Marker,
    /// Single has-value byte (`1` = present, `0` = null) and no payload.
    ///
    /// Matches the legacy bulk writer byte for byte. Only useful against
    /// consumers that expect that layout.
    PresenceFlag,
}

/// Closed classification of every encodable field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Boolean, one byte.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// IEEE 754 single precision.
    Float32,
    /// IEEE 754 double precision.
    Float64,
    /// Fixed-point decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// 128 or 256-bit integer.
    BigInt {
        /// Wire width.
        width: BigIntWidth,
        /// Whether negative values are allowed.
        signed: bool,
    },
    /// UTF-8 string.
    String,
    /// Whole seconds since the Unix epoch, unsigned 32-bit.
    DateTime,
    /// Instant since the Unix epoch.
    DateTime64 {
        /// Sub-second precision.
        precision: DateTimePrecision,
    },
    /// IPv4 address.
    Ipv4,
    /// IPv6 address.
    Ipv6,
    /// Enumeration ordinal.
    Enum {
        /// Number of declared members.
        members: usize,
    },
    /// Optional value.
    Nullable(Box<TypeTag>, NullableEncoding),
    /// Variable-length sequence.
    Array(Box<TypeTag>),
    /// Key/value pairs.
    Map(Box<TypeTag>, Box<TypeTag>),
    /// Fixed-arity tuple.
    Tuple(Vec<TypeTag>),
    /// UUID.
    Uuid,
}

impl TypeTag {
    /// Wrap in `Nullable` with the default marker layout.
    #[must_use]
    pub fn nullable(inner: Self) -> Self {
        Self::Nullable(Box::new(inner), NullableEncoding::default())
    }

    /// Wrap in `Array`.
    #[must_use]
    pub fn array(element: Self) -> Self {
        Self::Array(Box::new(element))
    }

    /// Build a `Map`.
    #[must_use]
    pub fn map(key: Self, value: Self) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// Wire size when it does not depend on the value.
    #[must_use]
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float32 | Self::Ipv4 | Self::DateTime => Some(4),
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::DateTime64 { .. } => Some(8),
            Self::Ipv6 | Self::Uuid => Some(16),
            Self::BigInt { width, .. } => Some(width.bytes()),
            Self::Decimal { precision, .. } => decimal_width(*precision),
            Self::Enum { members } => Some(enum_width(*members)),
            Self::Tuple(slots) => slots.iter().map(Self::fixed_width).sum(),
            Self::String | Self::Nullable(..) | Self::Array(_) | Self::Map(..) => None,
        }
    }

    /// Parse a destination type name such as `Decimal(18, 6)` or
    /// `Map(String, Array(UInt64))`.
    ///
    /// # Errors
    ///
    /// Returns an unsupported-type reason when the name has no encoder, or
    /// an invalid-parameter reason when its parameters are out of range.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let mut parser = Parser {
            input: input.trim(),
            pos: 0,
        };
        let tag = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != parser.input.len() {
            return Err(TypeError::unsupported(format!(
                "unexpected trailing input in type '{input}' at offset {}",
                parser.pos
            )));
        }
        Ok(tag)
    }
}

/// Byte width of a decimal with the given precision.
#[must_use]
pub const fn decimal_width(precision: u8) -> Option<usize> {
    match precision {
        1..=9 => Some(4),
        10..=18 => Some(8),
        19..=38 => Some(16),
        39..=76 => Some(32),
        _ => None,
    }
}

/// Byte width of an enumeration, chosen by its member count.
#[must_use]
pub const fn enum_width(members: usize) -> usize {
    if members <= u8::MAX as usize {
        1
    } else if members <= i16::MAX as usize {
        2
    } else {
        4
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("Bool"),
            Self::Int8 => f.write_str("Int8"),
            Self::Int16 => f.write_str("Int16"),
            Self::Int32 => f.write_str("Int32"),
            Self::Int64 => f.write_str("Int64"),
            Self::UInt8 => f.write_str("UInt8"),
            Self::UInt16 => f.write_str("UInt16"),
            Self::UInt32 => f.write_str("UInt32"),
            Self::UInt64 => f.write_str("UInt64"),
            Self::Float32 => f.write_str("Float32"),
            Self::Float64 => f.write_str("Float64"),
            Self::Decimal { precision, scale } => write!(f, "Decimal({precision}, {scale})"),
            Self::BigInt { width, signed } => {
                let prefix = if *signed { "Int" } else { "UInt" };
                write!(f, "{prefix}{}", width.bits())
            }
            Self::String => f.write_str("String"),
            Self::DateTime => f.write_str("DateTime"),
            Self::DateTime64 { precision } => write!(f, "DateTime64({})", precision.exponent()),
            Self::Ipv4 => f.write_str("IPv4"),
            Self::Ipv6 => f.write_str("IPv6"),
            Self::Enum { members } => write!(f, "Enum({members} members)"),
            Self::Nullable(inner, _) => write!(f, "Nullable({inner})"),
            Self::Array(inner) => write!(f, "Array({inner})"),
            Self::Map(key, value) => write!(f, "Map({key}, {value})"),
            Self::Tuple(slots) => {
                f.write_str("Tuple(")?;
                for (i, slot) in slots.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{slot}")?;
                }
                f.write_str(")")
            }
            Self::Uuid => f.write_str("UUID"),
        }
    }
}

impl std::str::FromStr for TypeTag {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Type name parser
// ═══════════════════════════════════════════════════════════════════════════

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while let Some(c) = self.input[self.pos..].chars().next() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.input[self.pos..].starts_with(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), TypeError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(TypeError::unsupported(format!(
                "expected '{expected}' at offset {} in '{}'",
                self.pos, self.input
            )))
        }
    }

    fn ident(&mut self) -> &str {
        self.skip_ws();
        let start = self.pos;
        let rest = &self.input[start..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.pos += len;
        &self.input[start..start + len]
    }

    fn number(&mut self) -> Result<u32, TypeError> {
        let word = self.ident().to_string();
        word.parse::<u32>().map_err(|_| {
            TypeError::unsupported(format!(
                "expected a number, got '{word}' in '{}'",
                self.input
            ))
        })
    }

    fn parse_type(&mut self) -> Result<TypeTag, TypeError> {
        let name = self.ident().to_string();
        let tag = match name.as_str() {
            "Bool" | "Boolean" => TypeTag::Bool,
            "Int8" => TypeTag::Int8,
            "Int16" => TypeTag::Int16,
            "Int32" => TypeTag::Int32,
            "Int64" => TypeTag::Int64,
            "UInt8" => TypeTag::UInt8,
            "UInt16" => TypeTag::UInt16,
            "UInt32" => TypeTag::UInt32,
            "UInt64" => TypeTag::UInt64,
            "Float32" => TypeTag::Float32,
            "Float64" => TypeTag::Float64,
            "Int128" | "UInt128" | "Int256" | "UInt256" => TypeTag::BigInt {
                width: if name.ends_with("128") {
                    BigIntWidth::Bits128
                } else {
                    BigIntWidth::Bits256
                },
                signed: !name.starts_with('U'),
            },
            "String" => TypeTag::String,
            "UUID" => TypeTag::Uuid,
            "IPv4" => TypeTag::Ipv4,
            "IPv6" => TypeTag::Ipv6,
            "DateTime" => {
                if self.eat('(') {
                    self.skip_timezone()?;
                }
                TypeTag::DateTime
            }
            "DateTime64" => {
                self.expect('(')?;
                let exponent = self.number()?;
                let precision = DateTimePrecision::from_exponent(exponent)
                    .ok_or_else(|| {
                    TypeError::invalid_parameter(format!(
                        "DateTime64 precision {exponent} is not supported"
                    ))
                })?;
                if self.eat(',') {
                    self.skip_timezone_literal()?;
                }
                self.expect(')')?;
                TypeTag::DateTime64 { precision }
            }
            "Decimal" => {
                self.expect('(')?;
                let precision = self.number()?;
                self.expect(',')?;
                let scale = self.number()?;
                self.expect(')')?;
                decimal_tag(precision, scale)?
            }
            "Decimal32" | "Decimal64" | "Decimal128" | "Decimal256" => {
                self.expect('(')?;
                let scale = self.number()?;
                self.expect(')')?;
                let precision = match name.as_str() {
                    "Decimal32" => 9,
                    "Decimal64" => 18,
                    "Decimal128" => 38,
                    _ => 76,
                };
                decimal_tag(precision, scale)?
            }
            "Nullable" => {
                self.expect('(')?;
                let inner = self.parse_type()?;
                self.expect(')')?;
                TypeTag::nullable(inner)
            }
            "Array" => {
                self.expect('(')?;
                let inner = self.parse_type()?;
                self.expect(')')?;
                TypeTag::array(inner)
            }
            "Map" => {
                self.expect('(')?;
                let key = self.parse_type()?;
                self.expect(',')?;
                let value = self.parse_type()?;
                self.expect(')')?;
                TypeTag::map(key, value)
            }
            "Tuple" => {
                self.expect('(')?;
                let mut slots = vec![self.parse_type()?];
                while self.eat(',') {
                    slots.push(self.parse_type()?);
                }
                self.expect(')')?;
                TypeTag::Tuple(slots)
            }
            "Point" => TypeTag::Tuple(vec![TypeTag::Float64, TypeTag::Float64]),
            "" => {
                return Err(TypeError::unsupported(format!(
                    "empty type name in '{}'",
                    self.input
                )));
            }
            other => {
                return Err(TypeError::unsupported(format!(
                    "type '{other}' has no RowBinary encoder"
                )));
            }
        };
        Ok(tag)
    }

    fn skip_timezone(&mut self) -> Result<(), TypeError> {
        self.skip_timezone_literal()?;
        self.expect(')')
    }

    fn skip_timezone_literal(&mut self) -> Result<(), TypeError> {
        self.expect('\'')?;
        match self.input[self.pos..].find('\'') {
            Some(end) => {
                self.pos += end + 1;
                Ok(())
            }
            None => Err(TypeError::unsupported(format!(
                "unterminated time zone in '{}'",
                self.input
            ))),
        }
    }
}

fn decimal_tag(precision: u32, scale: u32) -> Result<TypeTag, TypeError> {
    let precision = u8::try_from(precision).map_err(|_| {
        TypeError::invalid_parameter(format!("decimal precision {precision} is out of range"))
    })?;
    let scale = u8::try_from(scale).map_err(|_| {
        TypeError::invalid_parameter(format!("decimal scale {scale} is out of range"))
    })?;
    Ok(TypeTag::Decimal { precision, scale })
}
