//! Schema-compiled RowBinary bulk inserts for ClickHouse.
//!
//! Turns a finite stream of typed or dynamically shaped rows into the body
//! of an `INSERT INTO <table> (<columns>) FORMAT RowBinary` request: one
//! header line followed by the little-endian binary encoding of every row,
//! with no delimiters.
//!
//! # Features
//!
//! - Encoder registry covering integers up to 256 bits, floats, decimals up
//!   to 76 digits, strings, `DateTime64`, IPv4/IPv6, UUID, enums, nullable
//!   values, arrays, maps and tuples
//! - Per-schema compilation: column lookup and encoder selection happen once
//!   per `(table, columns)` pair, then the compiled plan is reused
//! - Process-wide serializer cache with lock-free reads
//! - Pooled output regions flushed to any [`tokio::io::AsyncWrite`] sink
//! - Bounded body channel for transports that want a `Stream` of chunks
//! - Structured logging via `tracing`; counters via `metrics` behind the
//!   `metrics` feature
//!
//! The crate never opens connections. Posting the body and compressing it
//! are the caller's concern.
//!
//! # Example
//!
//! ```rust,ignore
//! use clickhouse_bulk::{BulkCopy, Record, Shape};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Trade {
//!     id: u64,
//!     symbol: String,
//! }
//!
//! impl Record for Trade {
//!     fn shape() -> Shape<Self> {
//!         Shape::new()
//!             .field("id", |t: &Self| &t.id)
//!             .field("symbol", |t: &Self| &t.symbol)
//!     }
//! }
//!
//! let copy = BulkCopy::<Trade>::new("trades", ["id", "symbol"])?;
//! let body = copy.into_body(trades_stream, CancellationToken::new());
//! // hand `body` to the HTTP client
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod config;
pub mod copy;
pub mod encoders;
pub mod error;
pub mod observability;
pub mod schema;
pub mod types;
pub mod writer;

// Re-export main types for convenience
pub use cache::SerializerCache;
pub use config::WriterConfig;
pub use copy::{
    BodyStream, BulkCopy, ChannelSink, CopySummary, DynamicBulkCopy, FailureHandle, body_channel,
};
pub use encoders::Encoder;
pub use error::{Error, Result, TypeError, ValueError};
pub use schema::{
    ColumnMeta, CompiledSchema, Record, SchemaKey, Shape, TypeSpec, compile, quote_identifier,
};
pub use types::{
    BigIntWidth, DateTimePrecision, Decimal, DynValue, DynamicRow, Mapping, NullableEncoding,
    RowBinaryValue, Sequence, TypeTag, Value,
};
pub use writer::{BufferPool, RowBinaryWriter};
