//! Buffered RowBinary writer.
//!
//! Encodes rows into a pooled region and hands filled prefixes to an
//! [`AsyncWrite`] sink. A value is never split across a region boundary:
//! before each column the writer makes sure the region has room for it,
//! flushing first and growing the region only when a single value is larger
//! than the whole region. A row that fails to encode leaves no bytes behind
//! in the region.

pub mod buffer;

use std::fmt;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

pub use buffer::{BufferPool, PooledBuffer};

use crate::config::WriterConfig;
use crate::error::{Error, Result};
use crate::observability::TARGET;
use crate::schema::CompiledSchema;

/// Single-owner writer for one insert body.
pub struct RowBinaryWriter<W> {
    sink: W,
    buf: PooledBuffer,
    buffer_size: usize,
    flush_threshold: usize,
    cancel: Option<CancellationToken>,
    flushed: u64,
    rows: u64,
    failed: bool,
}

impl<W: AsyncWrite + Unpin> RowBinaryWriter<W> {
    /// Create a writer renting its region from the global pool.
    pub fn new(sink: W, config: &WriterConfig) -> Self {
        Self::with_pool(sink, config, BufferPool::global())
    }

    /// Create a writer renting its region from `pool`.
    pub fn with_pool(sink: W, config: &WriterConfig, pool: &BufferPool) -> Self {
        Self {
            sink,
            buf: pool.acquire(config.buffer_size),
            buffer_size: config.buffer_size,
            flush_threshold: config.flush_threshold,
            cancel: None,
            flushed: 0,
            rows: 0,
            failed: false,
        }
    }

    /// Abort flushes with a cancellation error once `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Bytes produced so far, flushed or not.
    pub fn bytes_written(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }

    /// Rows encoded so far.
    pub const fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Bytes waiting in the region.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// The underlying sink.
    pub const fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Append the insert header.
    pub async fn write_header(&mut self, header: &str) -> Result<()> {
        self.reserve(header.len()).await?;
        self.buf.extend_from_slice(header.as_bytes());
        Ok(())
    }

    /// Encode one row through `schema`.
    ///
    /// On error the row's bytes still in the region are discarded. Bytes of
    /// the row flushed before the failure stay in the sink.
    pub async fn write_row<R: Sync>(&mut self, schema: &CompiledSchema<R>, row: &R) -> Result<()> {
        let start = self.buf.len();
        let flushed = self.flushed;
        if let Err(err) = self.write_columns(schema, row).await {
            // After a flush inside the row, the region holds only this row.
            let keep = if self.flushed == flushed { start } else { 0 };
            self.buf.truncate(keep);
            return Err(err);
        }
        self.rows += 1;
        Ok(())
    }

    async fn write_columns<R: Sync>(&mut self, schema: &CompiledSchema<R>, row: &R) -> Result<()> {
        for column in schema.columns() {
            let encoder = column.encoder();
            let needed = match encoder.fixed_width() {
                Some(width) if width <= self.flush_threshold => self.flush_threshold,
                _ => encoder
                    .encoded_len(column.value(row))
                    .map_err(|e| Error::from_value_error(column.name(), e))?,
            };
            self.reserve(needed).await?;
            encoder
                .encode(column.value(row), &mut *self.buf)
                .map_err(|e| Error::from_value_error(column.name(), e))?;
        }
        Ok(())
    }

    /// Write the filled prefix of the region to the sink.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }

        let written = match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => return Err(Error::cancelled()),
                    result = self.sink.write_all(&self.buf) => result,
                }
            }
            None => self.sink.write_all(&self.buf).await,
        };
        if let Err(err) = written {
            self.failed = true;
            return Err(err.into());
        }

        tracing::trace!(target: TARGET, bytes = self.buf.len(), "flushed region");
        self.flushed += self.buf.len() as u64;
        self.buf.clear();
        Ok(())
    }

    /// Flush, then flush and shut down the sink.
    ///
    /// Returns the sink and the total number of bytes written.
    pub async fn finish(mut self) -> Result<(W, u64)> {
        self.flush().await?;
        self.sink.flush().await?;
        self.sink.shutdown().await?;
        Ok((self.sink, self.flushed))
    }

    /// Best-effort flush of whatever the region holds, then give the sink back.
    ///
    /// Bytes already flushed are never retracted. A cancelled writer, or
    /// one whose sink already failed, drops its buffered bytes without
    /// touching the sink again.
    pub async fn abort(mut self) -> W {
        let cancelled = self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled);
        if cancelled || self.failed {
            return self.sink;
        }
        if let Err(err) = self.flush().await {
            tracing::warn!(
                target: TARGET,
                error = %err,
                buffered = self.buf.len(),
                "dropping buffered bytes after failure"
            );
        }
        self.sink
    }

    async fn reserve(&mut self, needed: usize) -> Result<()> {
        if self.buf.len() + needed <= self.buffer_size && self.buf.remaining() >= needed {
            return Ok(());
        }
        self.flush().await?;
        if self.buf.remaining() < needed {
            tracing::trace!(
                target: TARGET,
                needed,
                buffer_size = self.buffer_size,
                "growing region"
            );
            self.buf.grow(needed);
        }
        Ok(())
    }
}

impl<W> fmt::Debug for RowBinaryWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowBinaryWriter")
            .field("buffered", &self.buf.len())
            .field("buffer_size", &self.buffer_size)
            .field("flush_threshold", &self.flush_threshold)
            .field("flushed", &self.flushed)
            .field("rows", &self.rows)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}
