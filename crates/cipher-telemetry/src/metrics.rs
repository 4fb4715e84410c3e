//! Prometheus metrics for the cipher server workspace.
//!
//! All metrics follow the naming convention: `cs_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts,
    HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // SERVER METRICS
    // =========================================================================

    /// Blocks encrypted by all server instances
    pub static ref BLOCKS_ENCRYPTED: Counter = Counter::new(
        "cs_server_blocks_encrypted_total",
        "Total number of cipher blocks encrypted"
    ).expect("metric creation failed");

    /// Requests by outcome
    pub static ref REQUESTS: CounterVec = CounterVec::new(
        Opts::new("cs_server_requests_total", "Requests handled by the cipher server"),
        &["outcome"]  // outcome: completed/rejected/restored
    ).expect("metric creation failed");

    /// Client-observed request latency
    pub static ref REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "cs_server_request_duration_seconds",
            "Time from call to reply as seen by the client"
        ).buckets(exponential_buckets(0.00001, 2.0, 20).expect("valid buckets")),
        &["policy"]
    ).expect("metric creation failed");

    // =========================================================================
    // RECOVERY METRICS
    // =========================================================================

    /// Budget faults by policy and outcome
    pub static ref RECOVERY_FAULTS: CounterVec = CounterVec::new(
        Opts::new("cs_recovery_faults_total", "Budget faults handled by the recovery controller"),
        &["policy", "outcome"]  // outcome: rolled_back/donated/extended/ignored/failed
    ).expect("metric creation failed");

    /// Budget currently granted to each client by the extend policy
    pub static ref GRANTED_BUDGET: GaugeVec = GaugeVec::new(
        Opts::new("cs_recovery_granted_budget", "Budget granted per client"),
        &["client"]
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Server
        Box::new(BLOCKS_ENCRYPTED.clone()),
        Box::new(REQUESTS.clone()),
        Box::new(REQUEST_DURATION.clone()),
        // Recovery
        Box::new(RECOVERY_FAULTS.clone()),
        Box::new(GRANTED_BUDGET.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
    ($histogram:expr, $labels:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram.with_label_values($labels))
    };
}
