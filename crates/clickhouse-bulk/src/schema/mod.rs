//! Row shapes and schema compilation.
//!
//! - [`shape`] - fields a row type exposes, with per-field metadata
//! - [`compiler`] - schema keys, insert headers, compiled row encoders

pub mod compiler;
pub mod shape;

pub use compiler::{ColumnPlan, CompiledSchema, SchemaKey, compile, quote_identifier};
pub use shape::{Accessor, ColumnMeta, FieldDef, Record, Shape, TypeSpec};
