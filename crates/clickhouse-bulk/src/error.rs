//! Error hierarchy for clickhouse-bulk.
//!
//! Follows the "canonical error struct" pattern from Microsoft Rust Guidelines.
//! Exposes `is_xxx()` methods rather than internal `ErrorKind` for future-proofing.
//!
//! Errors fall into three families:
//!
//! - configuration errors, raised once per schema key while compiling
//! - encoding errors, raised per value while a row is written
//! - I/O errors, raised while flushing to the sink (including cancellation)

use std::fmt;

use thiserror::Error;

/// Root error type for clickhouse-bulk.
///
/// # Example
///
/// ```rust,ignore
/// use clickhouse_bulk::Error;
///
/// fn handle_error(err: Error) {
///     if err.is_missing_column() {
///         eprintln!("row type does not expose a requested column");
///     } else if err.is_cancelled() {
///         eprintln!("copy was cancelled");
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,
}

/// Internal error classification.
///
/// This enum is `pub(crate)` to allow adding variants without breaking changes.
/// External code should use the `is_xxx()` predicate methods instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub(crate) enum ErrorKind {
    /// Table name is empty or blank.
    #[error("invalid table name: {0:?}")]
    InvalidTable(String),

    /// Column list is empty.
    #[error("column list for table '{table}' is empty")]
    EmptyColumns { table: String },

    /// Requested column has no readable field on the row shape.
    #[error("column '{column}' not found in {shape}")]
    MissingColumn { column: String, shape: String },

    /// Field type has no registered encoder.
    #[error("unsupported type for field '{column}': {reason}")]
    UnsupportedType { column: String, reason: String },

    /// Type parameters are out of range (decimal precision, enum members, ...).
    #[error("invalid type parameter: {0}")]
    InvalidTypeParameter(String),

    /// Cached plan was compiled for a different row type.
    #[error("schema {key} is bound to row type {expected}, not {actual}")]
    RowTypeMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    /// Value does not fit the fixed-width wire target.
    #[error("overflow in column '{column}': {message}")]
    Overflow { column: String, message: String },

    /// Runtime value shape does not match the compiled column type.
    #[error("value mismatch in column '{column}': {message}")]
    ValueMismatch { column: String, message: String },

    /// Failure writing to the output sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation was cancelled by the caller.
    #[error("bulk copy cancelled")]
    Cancelled,

    /// Row source failed while being pulled.
    #[error("row source error: {0}")]
    Source(String),
}

impl Error {
    // ═══════════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════════

    /// Create error for an empty table name.
    #[must_use]
    pub fn invalid_table(table: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidTable(table.into()),
        }
    }

    /// Create error for an empty column list.
    #[must_use]
    pub fn empty_columns(table: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::EmptyColumns {
                table: table.into(),
            },
        }
    }

    /// Create error for a column the row shape does not expose.
    #[must_use]
    pub fn missing_column(column: impl Into<String>, shape: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::MissingColumn {
                column: column.into(),
                shape: shape.into(),
            },
        }
    }

    /// Create error for a field whose type has no encoder.
    #[must_use]
    pub fn unsupported_type(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UnsupportedType {
                column: column.into(),
                reason: reason.into(),
            },
        }
    }

    /// Create error for out-of-range type parameters.
    #[must_use]
    pub fn invalid_type_parameter(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidTypeParameter(message.into()),
        }
    }

    /// Create error for a cached plan bound to another row type.
    #[must_use]
    pub fn row_type_mismatch(
        key: impl fmt::Display,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::RowTypeMismatch {
                key: key.to_string(),
                expected: expected.into(),
                actual: actual.into(),
            },
        }
    }

    /// Create error for a value that overflows its wire width.
    #[must_use]
    pub fn overflow(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Overflow {
                column: column.into(),
                message: message.into(),
            },
        }
    }

    /// Create error for a value of the wrong runtime shape.
    #[must_use]
    pub fn value_mismatch(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ValueMismatch {
                column: column.into(),
                message: message.into(),
            },
        }
    }

    /// Create error for a cancelled operation.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self {
            kind: ErrorKind::Cancelled,
        }
    }

    /// Create error for a failing row source.
    #[must_use]
    pub fn source(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Source(message.into()),
        }
    }

    /// Attach a field name to a type resolution failure.
    #[must_use]
    pub fn from_type_error(field: &str, err: TypeError) -> Self {
        match err.kind {
            TypeErrorKind::Unsupported => Self::unsupported_type(field, err.message),
            TypeErrorKind::InvalidParameter => {
                Self::invalid_type_parameter(format!("field '{field}': {}", err.message))
            }
        }
    }

    /// Attach a column name to a per-value encoder failure.
    #[must_use]
    pub fn from_value_error(column: &str, err: ValueError) -> Self {
        match err.kind {
            ValueErrorKind::Overflow => Self::overflow(column, err.message),
            ValueErrorKind::Mismatch => Self::value_mismatch(column, err.message),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Predicate Methods (is_xxx)
    // ═══════════════════════════════════════════════════════════════════════

    /// Returns true if this error was raised while compiling a schema.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidTable(_)
                | ErrorKind::EmptyColumns { .. }
                | ErrorKind::MissingColumn { .. }
                | ErrorKind::UnsupportedType { .. }
                | ErrorKind::InvalidTypeParameter(_)
                | ErrorKind::RowTypeMismatch { .. }
        )
    }

    /// Returns true if this is a missing column error.
    #[must_use]
    pub const fn is_missing_column(&self) -> bool {
        matches!(self.kind, ErrorKind::MissingColumn { .. })
    }

    /// Returns true if this is an unsupported type error.
    #[must_use]
    pub const fn is_unsupported_type(&self) -> bool {
        matches!(self.kind, ErrorKind::UnsupportedType { .. })
    }

    /// Returns true if this is an invalid type parameter error.
    #[must_use]
    pub const fn is_invalid_type_parameter(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidTypeParameter(_))
    }

    /// Returns true if a cached plan belongs to another row type.
    #[must_use]
    pub const fn is_row_type_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::RowTypeMismatch { .. })
    }

    /// Returns true if this error was raised while encoding a value.
    #[must_use]
    pub const fn is_encoding(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Overflow { .. } | ErrorKind::ValueMismatch { .. }
        )
    }

    /// Returns true if this is an overflow error.
    #[must_use]
    pub const fn is_overflow(&self) -> bool {
        matches!(self.kind, ErrorKind::Overflow { .. })
    }

    /// Returns true if this is a value mismatch error.
    #[must_use]
    pub const fn is_value_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::ValueMismatch { .. })
    }

    /// Returns true if this is an I/O error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io(_))
    }

    /// Returns true if the operation was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if the row source failed.
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self.kind, ErrorKind::Source(_))
    }

    /// Short, stable label for log fields and metric labels.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.kind {
            ErrorKind::InvalidTable(_)
            | ErrorKind::EmptyColumns { .. }
            | ErrorKind::MissingColumn { .. }
            | ErrorKind::UnsupportedType { .. }
            | ErrorKind::InvalidTypeParameter(_)
            | ErrorKind::RowTypeMismatch { .. } => "configuration",
            ErrorKind::Overflow { .. } | ErrorKind::ValueMismatch { .. } => "encoding",
            ErrorKind::Io(_) => "io",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Source(_) => "source",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io(err),
        }
    }
}

/// Result type alias for clickhouse-bulk operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single value encoder.
///
/// Encoders do not know which column they serve; the compiled row encoder
/// turns this into an [`Error`] naming the column. User implementations of
/// [`Sequence`](crate::Sequence) and [`Mapping`](crate::Mapping) propagate
/// it unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueError {
    kind: ValueErrorKind,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueErrorKind {
    Overflow,
    Mismatch,
}

impl ValueError {
    /// Value needs more bytes than the wire width allows.
    #[must_use]
    pub fn overflow(message: impl Into<String>) -> Self {
        Self {
            kind: ValueErrorKind::Overflow,
            message: message.into(),
        }
    }

    /// Value shape does not match the column type.
    #[must_use]
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self {
            kind: ValueErrorKind::Mismatch,
            message: message.into(),
        }
    }

    /// Returns true if this is an overflow.
    #[must_use]
    pub const fn is_overflow(&self) -> bool {
        matches!(self.kind, ValueErrorKind::Overflow)
    }

    /// Human readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValueError {}

/// Why a type cannot be encoded.
///
/// Raised while resolving a field's wire type or building its encoder; the
/// schema compiler turns it into an [`Error`] naming the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    kind: TypeErrorKind,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeErrorKind {
    Unsupported,
    InvalidParameter,
}

impl TypeError {
    /// The type has no encoder.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self {
            kind: TypeErrorKind::Unsupported,
            message: message.into(),
        }
    }

    /// A type parameter is out of range.
    #[must_use]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self {
            kind: TypeErrorKind::InvalidParameter,
            message: message.into(),
        }
    }

    /// Returns true if the type has no encoder.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.kind, TypeErrorKind::Unsupported)
    }

    /// Returns true if a type parameter is out of range.
    #[must_use]
    pub const fn is_invalid_parameter(&self) -> bool {
        matches!(self.kind, TypeErrorKind::InvalidParameter)
    }

    /// Human readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TypeError {}
