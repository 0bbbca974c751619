//! Writer configuration.

use std::env;

/// Environment variable names
mod vars {
    pub const BUFFER_SIZE: &str = "CLICKHOUSE_BULK_BUFFER_SIZE";
    pub const FLUSH_THRESHOLD: &str = "CLICKHOUSE_BULK_FLUSH_THRESHOLD";
    pub const CHANNEL_CAPACITY: &str = "CLICKHOUSE_BULK_CHANNEL_CAPACITY";
}

const DEFAULT_BUFFER_SIZE: usize = 4096;
const DEFAULT_FLUSH_THRESHOLD: usize = 64;
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Buffering and backpressure settings for one copy operation.
///
/// The buffer is always kept larger than the flush threshold; builder
/// methods clamp values that would violate that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Size of the pooled output region in bytes.
    ///
    /// Default: 4096.
    pub buffer_size: usize,

    /// Headroom reserved before writing a fixed-width value.
    ///
    /// Values whose encoded width is at most this many bytes flush the
    /// region when less than this much space remains. Default: 64.
    pub flush_threshold: usize,

    /// Number of chunks a body channel holds before the producer waits.
    ///
    /// Default: 16.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl WriterConfig {
    /// Set the region size.
    #[must_use]
    pub const fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self.clamp()
    }

    /// Set the fixed-width flush threshold.
    #[must_use]
    pub const fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self.clamp()
    }

    /// Set the body channel capacity (at least 1).
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Small regions for many concurrent low-volume copies.
    #[must_use]
    pub const fn small() -> Self {
        Self {
            buffer_size: 1024,
            flush_threshold: 32,
            channel_capacity: 4,
        }
    }

    /// Large regions for high-volume copies.
    #[must_use]
    pub const fn large() -> Self {
        Self {
            buffer_size: 64 * 1024,
            flush_threshold: 64,
            channel_capacity: 64,
        }
    }

    /// Defaults overridden by `CLICKHOUSE_BULK_*` environment variables.
    ///
    /// Unparsable or zero values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = read_nonzero(vars::BUFFER_SIZE) {
            config = config.with_buffer_size(size);
        }

        if let Some(threshold) = read_nonzero(vars::FLUSH_THRESHOLD) {
            config = config.with_flush_threshold(threshold);
        }

        if let Some(capacity) = read_nonzero(vars::CHANNEL_CAPACITY) {
            config = config.with_channel_capacity(capacity);
        }

        config
    }

    const fn clamp(mut self) -> Self {
        if self.flush_threshold == 0 {
            self.flush_threshold = 1;
        }
        if self.buffer_size <= self.flush_threshold {
            self.buffer_size = self.flush_threshold * 2;
        }
        self
    }
}

fn read_nonzero(name: &str) -> Option<usize> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => {
            tracing::warn!(target: crate::observability::TARGET, var = name, value = %raw, "ignoring invalid setting");
            None
        }
        Ok(value) => Some(value),
    }
}
