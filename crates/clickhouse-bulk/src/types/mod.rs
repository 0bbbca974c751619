//! Data model shared by the encoder registry and the schema compiler.
//!
//! - [`tag`] - closed set of wire types and the type name parser
//! - [`value`] - borrowed field values and the Rust-type mapping trait
//! - [`decimal`] - arbitrary-precision decimal numbers
//! - [`dynamic`] - owned values for run-time shaped rows

pub mod decimal;
pub mod dynamic;
pub mod tag;
pub mod value;

pub use decimal::{Decimal, MAX_DIVISION_PRECISION};
pub use dynamic::{DynValue, DynamicRow};
pub use tag::{BigIntWidth, DateTimePrecision, NullableEncoding, TypeTag};
pub use value::{Mapping, RowBinaryValue, Sequence, Value};
