//! Streaming driver.
//!
//! A copy writes the insert header, then pulls rows one at a time from a
//! finite source and encodes each through the compiled schema into a
//! [`RowBinaryWriter`]. On success the writer is flushed and the sink shut
//! down. On failure the buffered bytes are flushed best-effort, the error is
//! reported and returned; bytes already handed to the sink stay there.
//!
//! - [`BulkCopy`] - rows of a [`Record`] type, schema compiled up front
//! - [`DynamicBulkCopy`] - [`DynamicRow`](crate::DynamicRow)s, schema
//!   compiled from the first row
//! - [`body`] - bounded pipe turning a copy into a stream of body chunks

pub mod body;
pub mod dynamic;

use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

use futures::{Stream, StreamExt, stream};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub use body::{BodyStream, ChannelSink, FailureHandle, body_channel};
pub use dynamic::DynamicBulkCopy;

use crate::cache::SerializerCache;
use crate::config::WriterConfig;
use crate::error::{Error, Result};
use crate::observability::{self, TARGET};
use crate::schema::{CompiledSchema, Record, SchemaKey, compile};
use crate::writer::RowBinaryWriter;

/// Outcome of a completed copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    /// Rows encoded.
    pub rows: u64,
    /// Bytes written, header included.
    pub bytes: u64,
}

/// Resolves the compiled schema for each pulled row.
trait RowPlan<R> {
    fn schema_for(&mut self, row: &R) -> Result<&CompiledSchema<R>>;
}

impl<R> RowPlan<R> for &CompiledSchema<R> {
    fn schema_for(&mut self, _row: &R) -> Result<&CompiledSchema<R>> {
        Ok(*self)
    }
}

/// Bulk insert of typed rows into one table.
///
/// The schema is compiled (or fetched from the cache) when the copy is
/// created, so configuration errors surface before any row is read.
///
/// # Example
///
/// ```rust,ignore
/// let copy = BulkCopy::<Trade>::new("trades", ["id", "price"])?;
/// let summary = copy.write(&mut sink, &trades, &CancellationToken::new()).await?;
/// ```
pub struct BulkCopy<R> {
    schema: Arc<CompiledSchema<R>>,
    config: WriterConfig,
}

impl<R: Record> BulkCopy<R> {
    /// Prepare a copy through the process-wide serializer cache.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is invalid or `R` cannot
    /// supply one of the columns.
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_cache(SerializerCache::global(), table, columns)
    }

    /// Prepare a copy through `cache`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_cache<I, S>(
        cache: &SerializerCache,
        table: impl Into<String>,
        columns: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = SchemaKey::new(table, columns).map_err(observability::report)?;
        let schema = cache
            .get_or_compile(&key, || compile(&key, &R::shape()))
            .map_err(observability::report)?;
        Ok(Self {
            schema,
            config: WriterConfig::default(),
        })
    }

    /// Replace the writer configuration.
    #[must_use]
    pub const fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Insert header, line break included.
    pub fn header(&self) -> &str {
        self.schema.header()
    }

    /// Compiled schema shared with the cache.
    pub const fn schema(&self) -> &Arc<CompiledSchema<R>> {
        &self.schema
    }

    /// Writer configuration.
    pub const fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Copy every row of `rows` into `sink`.
    pub async fn write<W, I>(&self, sink: W, rows: I, cancel: &CancellationToken) -> Result<CopySummary>
    where
        W: AsyncWrite + Unpin,
        I: IntoIterator,
        I::Item: Borrow<R>,
    {
        let rows = stream::iter(rows.into_iter().map(Ok::<_, Infallible>));
        self.write_stream(sink, rows, cancel).await
    }

    /// Copy rows pulled from an asynchronous source into `sink`.
    ///
    /// A source error stops the copy and is returned as a source error.
    pub async fn write_stream<W, S, B, E>(
        &self,
        sink: W,
        rows: S,
        cancel: &CancellationToken,
    ) -> Result<CopySummary>
    where
        W: AsyncWrite + Unpin,
        S: Stream<Item = std::result::Result<B, E>>,
        B: Borrow<R>,
        E: Display,
    {
        let schema: &CompiledSchema<R> = &self.schema;
        run(
            schema.key(),
            schema.header(),
            schema,
            &self.config,
            sink,
            rows,
            cancel,
        )
        .await
    }

    /// Run the copy on a spawned task and return the body as a stream.
    ///
    /// A failure of the copy is the stream's final item. Must be called
    /// from within a tokio runtime.
    pub fn into_body<S, B, E>(self, rows: S, cancel: CancellationToken) -> BodyStream
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: Borrow<R> + Send + 'static,
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

impl<R> Clone for BulkCopy<R> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            config: self.config,
        }
    }
}

impl<R> std::fmt::Debug for BulkCopy<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkCopy")
            .field("schema", &self.schema.key())
            .field("config", &self.config)
            .finish()
    }
}

async fn run<R, P, W, S, B, E>(
    key: &SchemaKey,
    header: &str,
    plan: P,
    config: &WriterConfig,
    sink: W,
    rows: S,
    cancel: &CancellationToken,
) -> Result<CopySummary>
where
    R: Sync,
    P: RowPlan<R>,
    W: AsyncWrite + Unpin,
    S: Stream<Item = std::result::Result<B, E>>,
    B: Borrow<R>,
    E: Display,
{
    let span = tracing::info_span!(
        target: TARGET,
        "bulk_copy",
        table = key.table(),
        columns = key.columns().len()
    );

    async move {
        if cancel.is_cancelled() {
            return Err(observability::report(Error::cancelled()));
        }

        let mut writer = RowBinaryWriter::new(sink, config).with_cancellation(cancel.clone());
        match pump(&mut writer, header, plan, rows, cancel).await {
            Ok(()) => {
                let rows = writer.rows_written();
                let (_, bytes) = writer.finish().await.map_err(observability::report)?;
                tracing::info!(target: TARGET, rows, bytes, "bulk copy complete");
                observability::record_copy(rows, bytes);
                Ok(CopySummary { rows, bytes })
            }
            Err(err) => {
                let rows = writer.rows_written();
                writer.abort().await;
                tracing::debug!(target: TARGET, rows, "bulk copy aborted");
                Err(observability::report(err))
            }
        }
    }
    .instrument(span)
    .await
}

async fn pump<R, P, W, S, B, E>(
    writer: &mut RowBinaryWriter<W>,
    header: &str,
    mut plan: P,
    rows: S,
    cancel: &CancellationToken,
) -> Result<()>
where
    R: Sync,
    P: RowPlan<R>,
    W: AsyncWrite + Unpin,
    S: Stream<Item = std::result::Result<B, E>>,
    B: Borrow<R>,
    E: Display,
{
    writer.write_header(header).await?;

    let mut rows = std::pin::pin!(rows);
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::cancelled()),
            next = rows.next() => next,
        };
        let Some(row) = next else {
            return Ok(());
        };
        let row = row.map_err(|e| Error::source(e.to_string()))?;
        let row: &R = row.borrow();
        let schema = plan.schema_for(row)?;
        writer.write_row(schema, row).await?;
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::schema::Shape;

    #[derive(Debug, Clone)]
    struct Item {
        id: i32,
        name: String,
    }

    impl Record for Item {
        fn shape() -> Shape<Self> {
            Shape::new()
                .field("id", |r: &Self| &r.id)
                .field("name", |r: &Self| &r.name)
        }
    }

    fn items(count: i32) -> Vec<Item> {
        (0..count)
            .map(|id| Item {
                id,
                name: format!("item-{id}"),
            })
            .collect()
    }

    fn item_copy() -> BulkCopy<Item> {
        BulkCopy::with_cache(&SerializerCache::new(), "items", ["id", "name"]).unwrap()
    }

    #[tokio::test]
    async fn test_write_rows() {
        let copy = item_copy();
        let mut sink = Vec::new();
        let rows = vec![Item {
            id: 42,
            name: "hi".to_string(),
        }];
        let summary = copy
            .write(&mut sink, &rows, &CancellationToken::new())
            .await
            .unwrap();

        let header = "INSERT INTO items (`id`, `name`) FORMAT RowBinary\n";
        let mut expected = header.as_bytes().to_vec();
        expected.extend_from_slice(&[0x2A, 0, 0, 0, 0x02, b'h', b'i']);
        assert_eq!(sink, expected);
        assert_eq!(summary, CopySummary { rows: 1, bytes: expected.len() as u64 });
    }

    #[tokio::test]
    async fn test_empty_source_writes_header() {
        let copy = item_copy();
        let mut sink = Vec::new();
        let summary = copy
            .write(&mut sink, Vec::<Item>::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(sink, copy.header().as_bytes());
    }

    #[tokio::test]
    async fn test_cancelled_before_header() {
        let copy = item_copy();
        let token = CancellationToken::new();
        token.cancel();
        let mut sink = Vec::new();
        let err = copy.write(&mut sink, items(3), &token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_while_pulling() {
        let copy = item_copy();
        let token = CancellationToken::new();
        let rows = stream::iter(items(2).into_iter().map(Ok::<_, Infallible>))
            .chain(stream::pending());
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            cancel.cancel();
        });
        let err = copy.write_stream(Vec::new(), rows, &token).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_source_error_stops_copy() {
        let copy = item_copy();
        let rows = stream::iter(vec![Ok(items(1).remove(0)), Err("connection reset")]);
        let mut sink = Vec::new();
        let err = copy
            .write_stream(&mut sink, rows, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_source());
        assert!(err.to_string().contains("connection reset"));
        assert!(sink.starts_with(copy.header().as_bytes()));
    }

    #[tokio::test]
    async fn test_sink_failure() {
        let sink = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::ConnectionReset, "peer gone"))
            .build();
        let err = item_copy()
            .with_config(WriterConfig::default().with_flush_threshold(8).with_buffer_size(16))
            .write(sink, items(10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_io());
    }

    #[tokio::test]
    async fn test_into_body() {
        let copy = item_copy();
        let header = copy.header().to_string();
        let schema = Arc::clone(copy.schema());
        let rows = stream::iter(items(100).into_iter().map(Ok::<_, Infallible>));
        let body = copy
            .with_config(WriterConfig::small())
            .into_body(rows, CancellationToken::new());
        let chunks: Vec<_> = body.collect().await;
        let bytes: Vec<u8> = chunks
            .into_iter()
            .flat_map(|chunk| chunk.unwrap().to_vec())
            .collect();
        assert!(bytes.starts_with(header.as_bytes()));

        let mut expected = header.into_bytes();
        for item in items(100) {
            schema.encode_row(&item, &mut expected).unwrap();
        }
        assert_eq!(bytes, expected);
    }

    #[tokio::test]
    async fn test_into_body_reports_failure_last() {
        let rows = stream::iter(vec![Ok(items(1).remove(0)), Err("upstream failed")]);
        let mut body = item_copy().into_body(rows, CancellationToken::new());
        let mut last = None;
        while let Some(item) = body.next().await {
            last = Some(item);
        }
        assert!(last.unwrap().unwrap_err().is_source());
    }

    #[test]
    fn test_configuration_error_before_rows() {
        let err = BulkCopy::<Item>::with_cache(&SerializerCache::new(), "items", ["id", "price"])
            .unwrap_err();
        assert!(err.is_missing_column());
    }
}
