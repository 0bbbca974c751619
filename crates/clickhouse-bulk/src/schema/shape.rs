//! Row shapes: the fields a row type exposes and how to read them.
//!
//! A [`Shape`] lists named fields, each with a wire type and an accessor that
//! borrows the field off a row. Types are resolved when the field is
//! declared; a type without an encoder is remembered and reported when a
//! schema that selects the field is compiled.
//!
//! # Example
//!
//! ```rust,ignore
//! use clickhouse_bulk::{ColumnMeta, Record, Shape};
//!
//! struct Trade {
//!     id: u64,
//!     symbol: String,
//!     price: Decimal,
//! }
//!
//! impl Record for Trade {
//!     fn shape() -> Shape<Self> {
//!         Shape::new()
//!             .field("id", |t: &Trade| &t.id)
//!             .field("symbol", |t: &Trade| &t.symbol)
//!             .field_with("price", ColumnMeta::new().with_decimal(18, 6), |t: &Trade| &t.price)
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::TypeError;
use crate::types::{
    BigIntWidth, DateTimePrecision, NullableEncoding, RowBinaryValue, TypeTag, Value,
};

/// Default decimal precision when no override is given.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 16;

/// Default decimal scale when no override is given.
pub const DEFAULT_DECIMAL_SCALE: u8 = 4;

/// Per-field overrides: output name and format parameters.
///
/// Defaults: decimal precision 16 and scale 4, 128-bit big integers,
/// whole-second instants, marker-style nullable layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnMeta {
    name: Option<String>,
    precision: u8,
    scale: u8,
    big_int_width: BigIntWidth,
    datetime_precision: DateTimePrecision,
    nullable: NullableEncoding,
}

impl Default for ColumnMeta {
    fn default() -> Self {
        Self {
            name: None,
            precision: DEFAULT_DECIMAL_PRECISION,
            scale: DEFAULT_DECIMAL_SCALE,
            big_int_width: BigIntWidth::Bits128,
            datetime_precision: DateTimePrecision::Second,
            nullable: NullableEncoding::Marker,
        }
    }
}

impl ColumnMeta {
    /// Create metadata with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the field under another column name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set decimal precision and scale.
    #[must_use]
    pub const fn with_decimal(mut self, precision: u8, scale: u8) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    /// Set the big integer width.
    #[must_use]
    pub const fn with_big_int_width(mut self, width: BigIntWidth) -> Self {
        self.big_int_width = width;
        self
    }

    /// Set the instant precision.
    #[must_use]
    pub const fn with_datetime_precision(mut self, precision: DateTimePrecision) -> Self {
        self.datetime_precision = precision;
        self
    }

    /// Set the nullable layout.
    #[must_use]
    pub const fn with_nullable_encoding(mut self, layout: NullableEncoding) -> Self {
        self.nullable = layout;
        self
    }

    /// Output column name override.
    #[must_use]
    pub fn column_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Decimal precision.
    #[must_use]
    pub const fn precision(&self) -> u8 {
        self.precision
    }

    /// Decimal scale.
    #[must_use]
    pub const fn scale(&self) -> u8 {
        self.scale
    }

    /// Big integer width.
    #[must_use]
    pub const fn big_int_width(&self) -> BigIntWidth {
        self.big_int_width
    }

    /// Instant precision.
    #[must_use]
    pub const fn datetime_precision(&self) -> DateTimePrecision {
        self.datetime_precision
    }

    /// Nullable layout.
    #[must_use]
    pub const fn nullable_encoding(&self) -> NullableEncoding {
        self.nullable
    }
}

/// Reads one field off a row.
pub type Accessor<R> = Arc<dyn for<'a> Fn(&'a R) -> Value<'a> + Send + Sync>;

/// Wire type of a declared field, or why it has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    /// Resolved wire type.
    Tag(TypeTag),
    /// The field's type cannot be encoded.
    Invalid(TypeError),
}

impl From<Result<TypeTag, TypeError>> for TypeSpec {
    fn from(result: Result<TypeTag, TypeError>) -> Self {
        result.map_or_else(Self::Invalid, Self::Tag)
    }
}

/// One readable field of a row shape.
pub struct FieldDef<R> {
    name: String,
    column: Option<String>,
    spec: TypeSpec,
    accessor: Accessor<R>,
}

impl<R> FieldDef<R> {
    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column name: the override if present, else the field name.
    #[must_use]
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    /// Declared wire type.
    #[must_use]
    pub const fn spec(&self) -> &TypeSpec {
        &self.spec
    }

    /// Field accessor.
    #[must_use]
    pub const fn accessor(&self) -> &Accessor<R> {
        &self.accessor
    }
}

impl<R> Clone for FieldDef<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            column: self.column.clone(),
            spec: self.spec.clone(),
            accessor: Arc::clone(&self.accessor),
        }
    }
}

impl<R> fmt::Debug for FieldDef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Pins closure signatures to the higher-ranked accessor form.
fn accessor<R, F>(f: F) -> Accessor<R>
where
    F: for<'a> Fn(&'a R) -> Value<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Ordered set of readable fields of a row type.
pub struct Shape<R> {
    name: String,
    fields: Vec<FieldDef<R>>,
}

impl<R: 'static> Shape<R> {
    /// Create an empty shape named after the row type.
    #[must_use]
    pub fn new() -> Self {
        let full = std::any::type_name::<R>();
        let short = full.rsplit("::").next().unwrap_or(full);
        Self::named(short)
    }

    /// Create an empty shape with an explicit name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declare a field whose type comes from its Rust type.
    #[must_use]
    pub fn field<T, F>(self, name: impl Into<String>, get: F) -> Self
    where
        T: RowBinaryValue + ?Sized + 'static,
        F: Fn(&R) -> &T + Send + Sync + 'static,
    {
        self.field_with(name, ColumnMeta::default(), get)
    }

    /// Declare a field with metadata overrides.
    #[must_use]
    pub fn field_with<T, F>(mut self, name: impl Into<String>, meta: ColumnMeta, get: F) -> Self
    where
        T: RowBinaryValue + ?Sized + 'static,
        F: Fn(&R) -> &T + Send + Sync + 'static,
    {
        self.fields.push(FieldDef {
            name: name.into(),
            column: meta.column_name().map(str::to_string),
            spec: T::type_tag(&meta).into(),
            accessor: accessor(move |row: &R| get(row).to_value()),
        });
        self
    }

    /// Declare a field with an explicit wire type and a raw value accessor.
    #[must_use]
    pub fn field_tagged<F>(self, name: impl Into<String>, tag: TypeTag, get: F) -> Self
    where
        F: for<'a> Fn(&'a R) -> Value<'a> + Send + Sync + 'static,
    {
        self.field_spec(name.into(), TypeSpec::Tag(tag), get)
    }

    /// Declare a field by destination type name, such as `"Decimal(38, 10)"`.
    #[must_use]
    pub fn field_typed<F>(self, name: impl Into<String>, type_name: &str, get: F) -> Self
    where
        F: for<'a> Fn(&'a R) -> Value<'a> + Send + Sync + 'static,
    {
        self.field_spec(name.into(), TypeTag::parse(type_name).into(), get)
    }

    pub(crate) fn field_spec<F>(mut self, name: String, spec: TypeSpec, get: F) -> Self
    where
        F: for<'a> Fn(&'a R) -> Value<'a> + Send + Sync + 'static,
    {
        self.fields.push(FieldDef {
            name,
            column: None,
            spec,
            accessor: accessor(get),
        });
        self
    }
}

impl<R> Shape<R> {
    /// Shape name, used in error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef<R>] {
        &self.fields
    }

    /// Field whose column name is exactly `column`.
    #[must_use]
    pub fn find(&self, column: &str) -> Option<&FieldDef<R>> {
        self.fields.iter().find(|f| f.column_name() == column)
    }
}

impl<R: 'static> Default for Shape<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for Shape<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Row type with a statically known shape.
pub trait Record: Send + Sync + 'static {
    /// Fields this row type exposes.
    fn shape() -> Shape<Self>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decimal;

    struct Trade {
        id: u64,
        symbol: String,
        price: Decimal,
        note: Option<String>,
    }

    fn shape() -> Shape<Trade> {
        Shape::new()
            .field("id", |t: &Trade| &t.id)
            .field_with("symbol", ColumnMeta::new().with_name("ticker"), |t: &Trade| {
                &t.symbol
            })
            .field_with("price", ColumnMeta::new().with_decimal(18, 6), |t: &Trade| {
                &t.price
            })
            .field("note", |t: &Trade| &t.note)
    }

    #[test]
    fn test_shape_name_defaults_to_type() {
        assert_eq!(shape().name(), "Trade");
        assert_eq!(Shape::<Trade>::named("trades").name(), "trades");
    }

    #[test]
    fn test_column_override() {
        let shape = shape();
        assert!(shape.find("symbol").is_none());
        let field = shape.find("ticker").unwrap();
        assert_eq!(field.name(), "symbol");
        assert_eq!(field.spec(), &TypeSpec::Tag(TypeTag::String));
    }

    #[test]
    fn test_meta_applied() {
        let shape = shape();
        assert_eq!(
            shape.find("price").unwrap().spec(),
            &TypeSpec::Tag(TypeTag::Decimal {
                precision: 18,
                scale: 6
            })
        );
        assert_eq!(
            shape.find("note").unwrap().spec(),
            &TypeSpec::Tag(TypeTag::nullable(TypeTag::String))
        );
    }

    #[test]
    fn test_accessor_reads_row() {
        let shape = shape();
        let trade = Trade {
            id: 9,
            symbol: "ABC".to_string(),
            price: "1.5".parse().unwrap(),
            note: None,
        };
        let id = (shape.find("id").unwrap().accessor())(&trade);
        assert!(matches!(id, Value::UInt64(9)));
        let note = (shape.find("note").unwrap().accessor())(&trade);
        assert!(note.is_null());
    }

    #[test]
    fn test_typed_fields() {
        let shape = Shape::<Trade>::named("t")
            .field_typed("code", "LowCardinality(String)", |_| Value::Null)
            .field_typed("wide", "Int256", |t| Value::UInt64(t.id));
        assert!(matches!(
            shape.find("code").unwrap().spec(),
            TypeSpec::Invalid(err) if err.is_unsupported()
        ));
        assert!(matches!(
            shape.find("wide").unwrap().spec(),
            TypeSpec::Tag(TypeTag::BigInt { .. })
        ));
    }

    #[test]
    fn test_defaults() {
        let meta = ColumnMeta::default();
        assert_eq!(meta.precision(), 16);
        assert_eq!(meta.scale(), 4);
        assert_eq!(meta.big_int_width(), BigIntWidth::Bits128);
        assert_eq!(meta.datetime_precision(), DateTimePrecision::Second);
        assert_eq!(meta.nullable_encoding(), NullableEncoding::Marker);
    }
}
