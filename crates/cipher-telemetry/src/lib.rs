//! # Cipher Telemetry
//!
//! Logging and metrics for the cipher server workspace.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` registry with an `EnvFilter` and either a
//!   pretty or a JSON formatting layer.
//! - **Metrics**: Prometheus counters, gauges and histograms in a private
//!   registry, exported in text format by [`encode_metrics`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cipher_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // ...
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CS_SERVICE_NAME` | `cipher-server` | Service name in log lines |
//! | `CS_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `CS_CONSOLE_OUTPUT` | `true` | Emit logs to stdout |
//! | `CS_JSON_LOGS` | `false` | JSON instead of pretty logs |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::LoggingGuard;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, BLOCKS_ENCRYPTED,
    GRANTED_BUDGET, RECOVERY_FAULTS, REQUESTS, REQUEST_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Install the log subscriber and register all metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    let logging_guard = logging::init_logging(&config)?;

    Ok(TelemetryGuard {
        _logging: logging_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Span carrying the component name.
///
/// ```rust,ignore
/// let _span = component_span!("serve", component = "cipher-server", client = %caller).entered();
/// ```
#[macro_export]
macro_rules! component_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Convenience macro for setting a gauge.
#[macro_export]
macro_rules! metric_set {
    ($metric:expr, $value:expr) => {
        $metric.set($value)
    };
    ($metric:expr, $labels:expr, $value:expr) => {
        $metric.with_label_values($labels).set($value)
    };
}
