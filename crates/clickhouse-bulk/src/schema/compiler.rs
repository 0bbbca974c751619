//! Schema compilation.
//!
//! Turns a [`SchemaKey`] and a row [`Shape`] into a [`CompiledSchema`]: the
//! insert header plus one `(accessor, encoder)` pair per requested column,
//! in request order. Every configuration problem surfaces here, before a
//! single row is read.

use std::fmt;

use tracing::debug;

use super::shape::{Accessor, Shape, TypeSpec};
use crate::encoders::Encoder;
use crate::error::{Error, Result};
use crate::observability::TARGET;
use crate::types::{TypeTag, Value};

/// Table name plus ordered output columns.
///
/// Two keys are equal only if the columns appear in the same order, since
/// the order defines the wire layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    table: String,
    columns: Vec<String>,
}

impl SchemaKey {
    /// Create a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is blank or no columns are given.
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = table.into();
        if table.trim().is_empty() {
            return Err(Error::invalid_table(table));
        }
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(Error::empty_columns(table));
        }
        Ok(Self { table, columns })
    }

    /// Destination table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Output columns in wire order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `INSERT INTO <table> (<columns>) FORMAT RowBinary` plus a line break.
    #[must_use]
    pub fn header(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_identifier(c)).collect();
        format!(
            "INSERT INTO {} ({}) FORMAT RowBinary\n",
            self.table,
            columns.join(", ")
        )
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.table, self.columns.join(", "))
    }
}

/// Quote a column name with backticks, escaping `\` and `` ` ``.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('`');
    for c in name.chars() {
        if matches!(c, '`' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('`');
    quoted
}

/// One output column: where to read it and how to write it.
pub struct ColumnPlan<R> {
    name: String,
    tag: TypeTag,
    encoder: Encoder,
    accessor: Accessor<R>,
}

impl<R> ColumnPlan<R> {
    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire type.
    #[must_use]
    pub const fn tag(&self) -> &TypeTag {
        &self.tag
    }

    /// Compiled encoder.
    #[must_use]
    pub const fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Read this column off `row`.
    pub fn value<'a>(&self, row: &'a R) -> Value<'a> {
        (self.accessor)(row)
    }
}

impl<R> fmt::Debug for ColumnPlan<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnPlan")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Insert header plus the ordered column plans for one schema key.
///
/// Immutable once built; safe to share across tasks and reuse for any
/// number of rows.
pub struct CompiledSchema<R> {
    key: SchemaKey,
    header: String,
    shape: String,
    columns: Vec<ColumnPlan<R>>,
}

impl<R> CompiledSchema<R> {
    /// Key this schema was compiled for.
    #[must_use]
    pub const fn key(&self) -> &SchemaKey {
        &self.key
    }

    /// Insert header, line break included.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Name of the row shape.
    #[must_use]
    pub fn shape_name(&self) -> &str {
        &self.shape
    }

    /// Column plans in wire order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnPlan<R>] {
        &self.columns
    }

    /// Append the encoding of `row` to `buf`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns an encoding error naming the column. `buf` is left as it
    /// was before the call.
    pub fn encode_row(&self, row: &R, buf: &mut Vec<u8>) -> Result<usize> {
        let start = buf.len();
        for column in &self.columns {
            if let Err(err) = column.encoder.encode(column.value(row), buf) {
                buf.truncate(start);
                return Err(Error::from_value_error(&column.name, err));
            }
        }
        Ok(buf.len() - start)
    }
}

impl<R> fmt::Debug for CompiledSchema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("key", &self.key)
            .field("shape", &self.shape)
            .field("columns", &self.columns)
            .finish()
    }
}

/// Compile `shape` for `key`.
///
/// # Errors
///
/// - missing column: a requested column has no field on the shape
/// - unsupported type: the selected field's type has no encoder
/// - invalid type parameter: the encoder rejected the type's parameters
pub fn compile<R>(key: &SchemaKey, shape: &Shape<R>) -> Result<CompiledSchema<R>> {
    let columns = key
        .columns()
        .iter()
        .map(|column| {
            let field = shape
                .find(column)
                .ok_or_else(|| Error::missing_column(column.as_str(), shape.name()))?;
            let tag = match field.spec() {
                TypeSpec::Tag(tag) => tag.clone(),
                TypeSpec::Invalid(err) => {
                    return Err(Error::from_type_error(field.name(), err.clone()));
                }
            };
            let encoder =
                Encoder::from_tag(&tag).map_err(|err| Error::from_type_error(field.name(), err))?;
            Ok(ColumnPlan {
                name: column.clone(),
                tag,
                encoder,
                accessor: field.accessor().clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        target: TARGET,
        schema = %key,
        shape = shape.name(),
        columns = columns.len(),
        "compiled schema"
    );

    Ok(CompiledSchema {
        header: key.header(),
        key: key.clone(),
        shape: shape.name().to_string(),
        columns,
    })
}
