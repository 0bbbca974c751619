//! Copies of dynamically shaped rows.
//!
//! Field types are taken from the first row pulled from the source, unless
//! declared up front with [`DynamicBulkCopy::with_type`]. The resulting
//! schema depends on data, so it lives only for one copy and is not shared
//! through the serializer cache.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt::Display;

use futures::{Stream, stream};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use super::body::{BodyStream, body_channel};
use super::{CopySummary, RowPlan, run};
use crate::config::WriterConfig;
use crate::error::Result;
use crate::observability;
use crate::schema::{ColumnMeta, CompiledSchema, SchemaKey, Shape, TypeSpec, compile};
use crate::types::{DynValue, DynamicRow, RowBinaryValue, TypeTag, Value};

/// Bulk insert of [`DynamicRow`]s into one table.
#[derive(Debug, Clone)]
pub struct DynamicBulkCopy {
    key: SchemaKey,
    header: String,
    types: HashMap<String, TypeTag>,
    meta: ColumnMeta,
    config: WriterConfig,
}

impl DynamicBulkCopy {
    /// Prepare a copy of `columns` into `table`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the table name is blank or no
    /// columns are given.
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = SchemaKey::new(table, columns).map_err(observability::report)?;
        Ok(Self {
            header: key.header(),
            key,
            types: HashMap::new(),
            meta: ColumnMeta::default(),
            config: WriterConfig::default(),
        })
    }

    /// Declare the wire type of `column` instead of inferring it.
    ///
    /// Needed for columns whose first value is null or an empty collection.
    #[must_use]
    pub fn with_type(mut self, column: impl Into<String>, tag: TypeTag) -> Self {
        self.types.insert(column.into(), tag);
        self
    }

    /// Parameters used when inferring decimal, big integer and date-time
    /// types.
    #[must_use]
    pub fn with_meta(mut self, meta: ColumnMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Replace the writer configuration.
    #[must_use]
    pub const fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Schema key of this copy.
    pub const fn key(&self) -> &SchemaKey {
        &self.key
    }

    /// Insert header, line break included.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Compile the schema using `first` as the sample row.
    ///
    /// # Errors
    ///
    /// - missing column: the sample has no such field and no type was declared
    /// - unsupported type: the field's type cannot be inferred from its value
    /// - invalid type parameter: a declared or inferred type is invalid
    pub fn compile_for(&self, first: &DynamicRow) -> Result<CompiledSchema<DynamicRow>> {
        let mut shape = Shape::named("DynamicRow");
        for column in self.key.columns() {
            let hint = first.position(column);
            let spec = match (self.types.get(column), hint.and_then(|i| first.value_at(i))) {
                (Some(tag), _) => TypeSpec::Tag(tag.clone()),
                (None, Some(value)) => value.infer_tag(&self.meta).into(),
                (None, None) => continue,
            };
            let name = column.clone();
            shape = shape.field_spec(column.clone(), spec, move |row: &DynamicRow| {
                field_value(row, &name, hint)
            });
        }
        compile(&self.key, &shape)
    }

    /// Copy every row of `rows` into `sink`.
    pub async fn write<W, I>(&self, sink: W, rows: I, cancel: &CancellationToken) -> Result<CopySummary>
    where
        W: AsyncWrite + Unpin,
        I: IntoIterator,
        I::Item: Borrow<DynamicRow>,
    {
        let rows = stream::iter(rows.into_iter().map(Ok::<_, Infallible>));
        self.write_stream(sink, rows, cancel).await
    }

    /// Copy rows pulled from an asynchronous source into `sink`.
    ///
    /// An empty source produces the header alone.
    pub async fn write_stream<W, S, B, E>(
        &self,
        sink: W,
        rows: S,
        cancel: &CancellationToken,
    ) -> Result<CopySummary>
    where
        W: AsyncWrite + Unpin,
        S: Stream<Item = std::result::Result<B, E>>,
        B: Borrow<DynamicRow>,
        E: Display,
    {
        let plan = DeferredPlan {
            copy: self,
            schema: None,
        };
        run(&self.key, &self.header, plan, &self.config, sink, rows, cancel).await
    }

    /// Run the copy on a spawned task and return the body as a stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn into_body<S, B, E>(self, rows: S, cancel: CancellationToken) -> BodyStream
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: Borrow<DynamicRow> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (sink, body) = body_channel(self.config.channel_capacity);
        let failure = sink.failure_handle();
        tokio::spawn(async move {
            if let Err(err) = self.write_stream(sink, rows, &cancel).await {
                failure.fail(err).await;
            }
        });
        body
    }
}

/// Compiles on the first row, then reuses the result.
struct DeferredPlan<'a> {
    copy: &'a DynamicBulkCopy,
    schema: Option<CompiledSchema<DynamicRow>>,
}

impl RowPlan<DynamicRow> for DeferredPlan<'_> {
    fn schema_for(&mut self, row: &DynamicRow) -> Result<&CompiledSchema<DynamicRow>> {
        let schema = match self.schema.take() {
            Some(schema) => schema,
            None => {
                let schema = self.copy.compile_for(row)?;
                observability::record_compilation();
                schema
            }
        };
        let schema: &CompiledSchema<DynamicRow> = self.schema.insert(schema);
        Ok(schema)
    }
}

fn field_value<'a>(row: &'a DynamicRow, name: &str, hint: Option<usize>) -> Value<'a> {
    hint.and_then(|i| row.field_at(i))
        .filter(|(field, _)| *field == name)
        .map(|(_, value)| value)
        .or_else(|| row.get(name))
        .map_or(Value::Null, DynValue::to_value)
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::types::NullableEncoding;

    fn row(id: i32, name: &str) -> DynamicRow {
        DynamicRow::new().with("id", id).with("name", name)
    }

    #[tokio::test]
    async fn test_shape_from_first_row() {
        let copy = DynamicBulkCopy::new("t", ["name", "id"]).unwrap();
        let mut sink = Vec::new();
        let summary = copy
            .write(&mut sink, [row(1, "a"), row(2, "bc")], &CancellationToken::new())
            .await
            .unwrap();

        let mut expected = copy.header().as_bytes().to_vec();
        expected.extend_from_slice(&[0x01, b'a', 1, 0, 0, 0]);
        expected.extend_from_slice(&[0x02, b'b', b'c', 2, 0, 0, 0]);
        assert_eq!(sink, expected);
        assert_eq!(summary.rows, 2);
    }

    #[tokio::test]
    async fn test_empty_source_emits_header_only() {
        let copy = DynamicBulkCopy::new("t", ["id"]).unwrap();
        let mut sink = Vec::new();
        let summary = copy
            .write(&mut sink, Vec::<DynamicRow>::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(sink, b"INSERT INTO t (`id`) FORMAT RowBinary\n");
    }

    #[tokio::test]
    async fn test_fields_found_by_name_in_later_rows() {
        let copy = DynamicBulkCopy::new("t", ["id", "name"]).unwrap();
        let reordered = DynamicRow::new().with("name", "z").with("id", 7_i32);
        let mut sink = Vec::new();
        copy.write(&mut sink, [row(1, "a"), reordered], &CancellationToken::new())
            .await
            .unwrap();
        assert!(sink.ends_with(&[7, 0, 0, 0, 0x01, b'z']));
    }

    #[test]
    fn test_null_first_value_needs_declared_type() {
        let first = DynamicRow::new().with("id", 1_i32).with("note", DynValue::Null);
        let copy = DynamicBulkCopy::new("t", ["id", "note"]).unwrap();
        assert!(copy.compile_for(&first).unwrap_err().is_unsupported_type());

        let copy = copy.with_type(
            "note",
            TypeTag::Nullable(Box::new(TypeTag::String), NullableEncoding::Marker),
        );
        let schema = copy.compile_for(&first).unwrap();
        let mut buf = Vec::new();
        schema.encode_row(&first, &mut buf).unwrap();
        assert_eq!(buf, [1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_missing_column() {
        let copy = DynamicBulkCopy::new("t", ["id", "price"]).unwrap();
        let err = copy.compile_for(&row(1, "a")).unwrap_err();
        assert!(err.is_missing_column());
        assert!(err.to_string().contains("price"));
    }

    #[tokio::test]
    async fn test_missing_column_surfaces_on_first_row() {
        let copy = DynamicBulkCopy::new("t", ["price"]).unwrap();
        let mut sink = Vec::new();
        let err = copy
            .write(&mut sink, [row(1, "a")], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_missing_column());
    }

    #[tokio::test]
    async fn test_into_body() {
        let copy = DynamicBulkCopy::new("t", ["id"]).unwrap();
        let rows = stream::iter((0..3).map(|id| Ok::<_, Infallible>(row(id, "x"))));
        let chunks: Vec<_> = copy.into_body(rows, CancellationToken::new()).collect().await;
        let bytes: Vec<u8> = chunks
            .into_iter()
            .flat_map(|chunk| chunk.unwrap().to_vec())
            .collect();
        assert!(bytes.ends_with(&[0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0]));
    }
}
