//! Logging targets, error reporting and optional metrics.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! application's job. With the `metrics` feature enabled, counters are
//! recorded through the `metrics` facade as well.

use crate::error::Error;

/// Target of every event this crate emits.
pub const TARGET: &str = "clickhouse_bulk";

// Copy metrics
#[cfg(feature = "metrics")]
const METRIC_ROWS: &str = "clickhouse_bulk_rows_total";
#[cfg(feature = "metrics")]
const METRIC_BYTES: &str = "clickhouse_bulk_bytes_total";
#[cfg(feature = "metrics")]
const METRIC_ERRORS: &str = "clickhouse_bulk_errors_total";

// Cache metrics
#[cfg(feature = "metrics")]
const METRIC_COMPILATIONS: &str = "clickhouse_bulk_schema_compilations_total";

/// Register descriptions for the crate's counters with the installed recorder.
#[cfg(feature = "metrics")]
pub fn describe_metrics() {
    use metrics::describe_counter;

    describe_counter!(METRIC_ROWS, "Total rows encoded by completed copies");
    describe_counter!(METRIC_BYTES, "Total bytes written by completed copies");
    describe_counter!(METRIC_ERRORS, "Total failed copies by error category");
    describe_counter!(METRIC_COMPILATIONS, "Total schema compilations");
}

/// Log a propagating error and count it, then hand it back unchanged.
pub(crate) fn report(err: Error) -> Error {
    tracing::error!(
        target: TARGET,
        category = err.category(),
        error = %err,
        "bulk copy failed"
    );

    #[cfg(feature = "metrics")]
    metrics::counter!(METRIC_ERRORS, "category" => err.category()).increment(1);

    err
}

/// Record a completed copy.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub(crate) fn record_copy(rows: u64, bytes: u64) {
    #[cfg(feature = "metrics")]
    {
        metrics::counter!(METRIC_ROWS).increment(rows);
        metrics::counter!(METRIC_BYTES).increment(bytes);
    }
}

/// Record one schema compilation.
pub(crate) fn record_compilation() {
    #[cfg(feature = "metrics")]
    metrics::counter!(METRIC_COMPILATIONS).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_preserves_error() {
        let err = report(Error::missing_column("price", "Item"));
        assert!(err.is_missing_column());
        assert!(err.to_string().contains("price"));

        let err = report(Error::cancelled());
        assert!(err.is_cancelled());
        assert_eq!(err.category(), Error::cancelled().category());
    }

    #[test]
    fn test_recording_without_recorder() {
        record_copy(10, 1024);
        record_compilation();
    }

    #[test]
    fn test_report_under_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter("clickhouse_bulk=trace")
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let err = report(Error::source("upstream closed"));
            assert!(err.is_source());
        });
    }
}
