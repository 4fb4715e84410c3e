//! # Cipher Server Bench Runtime
//!
//! Runs one workload against an interruptible cipher server under the
//! recovery policy named by `CS_POLICY`, then prints a JSON report.
//!
//! ## Usage
//!
//! ```bash
//! CS_POLICY=rollback CS_BUDGET=4 CS_REQUEST_BLOCKS=10 bench-runtime
//! CS_POLICY=extend CS_EXTEND_INCREMENT=1 CS_JSON_LOGS=true bench-runtime
//! ```
//!
//! See [`bench_runtime::config`] for every variable.

use anyhow::{Context, Result};
use bench_runtime::{Deployment, RuntimeConfig};
use cipher_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_component("bench"))
        .context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!("===========================================");
    info!("  Interruptible Cipher Server Benchmark");
    info!("===========================================");
    info!("Policy: {}", config.policy);
    info!(
        "Clients: {}, jobs per client: {}, blocks per job: {}",
        config.workload.clients, config.workload.requests, config.workload.request_blocks
    );
    info!("Client grant: {}", config.budget.client);

    let deployment = Deployment::start(&config).context("Failed to start deployment")?;
    let outcome = deployment
        .run_workload(&config.workload, &config.cipher)
        .await;
    let stats = deployment
        .shutdown()
        .await
        .context("Recovery controller failed")?;
    let mut report = outcome.context("Workload failed")?;
    report.recovery = stats;

    println!("{}", serde_json::to_string_pretty(&report)?);

    match encode_metrics() {
        Ok(metrics) => debug!("Final metrics:\n{metrics}"),
        Err(e) => warn!("Failed to encode metrics: {e}"),
    }
    info!("Benchmark complete");
    Ok(())
}
