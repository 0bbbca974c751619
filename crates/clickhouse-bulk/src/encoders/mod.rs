//! Type encoder registry.
//!
//! Each submodule owns the byte layout of one family of wire types:
//!
//! - [`primitive`] - booleans, fixed integers, floats
//! - [`decimal`] - fixed-point decimals
//! - [`integer`] - 128 and 256-bit integers
//! - [`temporal`] - `DateTime` and `DateTime64` instants
//! - [`string`] - strings and the base-128 varint
//! - [`network`] - IPv4, IPv6, UUID
//! - [`composite`] - enumerations, nullable values, arrays, maps, tuples
//!
//! [`factory`] ties them together behind [`Encoder`].

pub mod composite;
pub mod decimal;
pub mod factory;
pub mod integer;
pub mod network;
pub mod primitive;
pub mod string;
pub mod temporal;

pub use composite::EnumEncoder;
pub use decimal::DecimalEncoder;
pub use factory::Encoder;
pub use integer::{BigIntEncoder, put_twos_complement};
pub use string::{put_varint, varint_len};
pub use temporal::DateTimeEncoder;
