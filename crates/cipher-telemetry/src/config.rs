//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for log lines
    pub service_name: String,

    /// Component within the service (server, recovery, runtime)
    pub component: Option<String>,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "cipher-server".to_string(),
            component: None,
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CS_SERVICE_NAME`: Service name (default: cipher-server)
    /// - `CS_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `CS_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `CS_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("CS_SERVICE_NAME")
                .unwrap_or_else(|_| "cipher-server".to_string()),

            component: None,

            log_level: env::var("CS_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("CS_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("CS_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Configuration for a named component.
    pub fn for_component(component: &str) -> Self {
        let mut config = Self::from_env();
        config.component = Some(component.to_string());
        config
    }

    /// Service name including the component, if any.
    pub fn full_service_name(&self) -> String {
        match &self.component {
            Some(component) => format!("{}-{}", self.service_name, component),
            None => self.service_name.clone(),
        }
    }
}
