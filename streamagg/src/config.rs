//! Aggregate configuration
//!
//! Defaults can be overridden from the environment:
//!
//! - `STREAMAGG_BUFFER_SIZE`: push-mode buffer size in bytes, must be positive
//! - `STREAMAGG_CLOSE_SINK`: `1`/`true`/`yes` or `0`/`false`/`no`

use tracing::warn;

/// The default size, in bytes, of the buffer the push adapter reads into.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

pub const ENV_BUFFER_SIZE: &str = "STREAMAGG_BUFFER_SIZE";
pub const ENV_CLOSE_SINK: &str = "STREAMAGG_CLOSE_SINK";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateConfig {
    /// Capacity of the internal buffer; bounds the bytes in flight in push mode
    pub buffer_size: usize,
    /// Shut down the sink's write side once every source is drained
    pub close_sink_on_finish: bool,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            close_sink_on_finish: true,
        }
    }
}

impl AggregateConfig {
    /// Defaults, overridden by the `STREAMAGG_*` environment variables.
    ///
    /// Malformed values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BUFFER_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.buffer_size = n,
                _ => warn!(var = ENV_BUFFER_SIZE, value = %raw, "ignoring invalid buffer size"),
            }
        }

        if let Some(raw) = lookup(ENV_CLOSE_SINK) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.close_sink_on_finish = true,
                "0" | "false" | "no" => config.close_sink_on_finish = false,
                _ => warn!(var = ENV_CLOSE_SINK, value = %raw, "ignoring invalid flag"),
            }
        }

        config
    }

    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    #[must_use]
    pub fn with_close_sink_on_finish(mut self, close: bool) -> Self {
        self.close_sink_on_finish = close;
        self
    }
}
