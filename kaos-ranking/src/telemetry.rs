//! Log output for games embedding the ranking core.
//!
//! # Example
//!
//! ```rust,ignore
//! use kaos_ranking::telemetry::{init_tracing, TracingConfig};
//!
//! // Compact console output at info
//! init_tracing(TracingConfig::default())?;
//!
//! // Or JSON lines with ranking internals at debug
//! init_tracing(TracingConfig::default().with_level("kaos_ranking=debug").with_json())?;
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter};

/// Tracing configuration.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// One JSON object per line instead of compact text.
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json_output {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        registry.with(fmt_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .compact();
        registry.with(fmt_layer).try_init()
    }
}
