//! Recovery Service - budget-fault controller
//!
//! ```text
//! Kernel ──FaultEvent──→ RecoveryController
//!                            │
//!                            ├── stale (server idle / other thread) ──→ Ignored
//!                            ├── Rollback  ──→ revoke, restore, reply failure, resume
//!                            ├── Emergency ──→ lend client context, resume, return it
//!                            └── Extend    ──→ raise client grant, resume
//! ```
//!
//! Any kernel failure while applying a policy is fatal: it is logged,
//! counted, and returned; [`RecoveryController::run`] stops on it.

use crate::domain::{
    BudgetLedger, ExtendConfig, IgnoreReason, RecoveryOutcome, RecoveryPolicy, RecoveryStats,
};
use crate::error::{RecoveryError, RecoveryResult};
use crate::policies::{emergency, extend, rollback};
use crate::ports::inbound::RecoveryApi;
use async_trait::async_trait;
use cipher_telemetry::{component_span, metric_inc, metric_set, GRANTED_BUDGET, RECOVERY_FAULTS};
use cs_01_cipher_server::{CipherServerApi, Kernel};
use parking_lot::Mutex;
use shared_types::{BudgetGrant, FaultEvent, SchedContextId, ThreadId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn, Instrument};

/// Recovery configuration
#[derive(Clone, Debug)]
pub struct RecoveryConfig {
    /// Protocol applied to every fault
    pub policy: RecoveryPolicy,
    /// Budget lent to a rolled-back server so it can reach idle
    pub recovery_grant: BudgetGrant,
    /// Extend policy parameters
    pub extend: ExtendConfig,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            policy: RecoveryPolicy::Rollback,
            recovery_grant: BudgetGrant::new(16, 16),
            extend: ExtendConfig::default(),
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> RecoveryResult<()> {
        if !self.recovery_grant.is_valid() {
            return Err(RecoveryError::InvalidConfig(format!(
                "recovery grant {} is not 0 < budget <= period",
                self.recovery_grant
            )));
        }
        self.extend.validate()
    }
}

/// Applies one recovery policy to the faults of one server.
pub struct RecoveryController<K: Kernel> {
    kernel: Arc<K>,
    server: Arc<dyn CipherServerApi>,
    config: RecoveryConfig,
    recovery_context: Option<SchedContextId>,
    ledger: Mutex<BudgetLedger>,
    client_contexts: Mutex<HashMap<ThreadId, SchedContextId>>,
    stats: Mutex<RecoveryStats>,
    force_done: Notify,
}

impl<K: Kernel> RecoveryController<K> {
    pub fn new(
        kernel: Arc<K>,
        server: Arc<dyn CipherServerApi>,
        config: RecoveryConfig,
    ) -> RecoveryResult<Self> {
        config.validate()?;
        let ledger = BudgetLedger::new(config.extend)?;
        Ok(Self {
            kernel,
            server,
            config,
            recovery_context: None,
            ledger: Mutex::new(ledger),
            client_contexts: Mutex::new(HashMap::new()),
            stats: Mutex::new(RecoveryStats::default()),
            force_done: Notify::new(),
        })
    }

    /// Context the rollback policy lends to the server. Must be unbound.
    pub fn with_recovery_context(mut self, context: SchedContextId) -> Self {
        self.recovery_context = Some(context);
        self
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Handle faults until `shutdown` turns `true` or a fatal error occurs.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> RecoveryResult<RecoveryStats> {
        info!(policy = %self.config.policy, server = %self.server.thread(), "Recovery controller running");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let fault = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                fault = self.kernel.fault_wait() => fault.map_err(|e| {
                    error!(error = %e, "Fault delivery failed");
                    RecoveryError::from(e)
                })?,
            };
            self.handle_fault(fault).await?;
        }
        let stats = self.stats();
        let still_extended: Vec<(ThreadId, u64)> = self.ledger.lock().extended_clients().collect();
        info!(?stats, ?still_extended, "Recovery controller stopped");
        Ok(stats)
    }

    async fn apply(&self, fault: &FaultEvent) -> RecoveryResult<RecoveryOutcome> {
        if fault.thread != self.server.thread() {
            return Ok(RecoveryOutcome::Ignored(IgnoreReason::ForeignThread));
        }
        if !self.server.status().is_busy() {
            return Ok(RecoveryOutcome::Ignored(IgnoreReason::ServerIdle));
        }

        let kernel = self.kernel.as_ref();
        match self.config.policy {
            RecoveryPolicy::Rollback => {
                let recovery = self
                    .recovery_context
                    .map(|context| (context, self.config.recovery_grant));
                rollback::roll_back(kernel, self.server.as_ref(), recovery, fault).await
            }
            RecoveryPolicy::Emergency => {
                emergency::donate(kernel, self.server.as_ref(), &self.force_done, fault).await
            }
            RecoveryPolicy::Extend => {
                extend::extend(kernel, &self.ledger, &self.client_contexts, fault)
            }
        }
    }
}

#[async_trait]
impl<K: Kernel> RecoveryApi for RecoveryController<K> {
    fn policy(&self) -> RecoveryPolicy {
        self.config.policy
    }

    async fn handle_fault(&self, fault: FaultEvent) -> RecoveryResult<RecoveryOutcome> {
        let policy = self.config.policy;
        let span = component_span!(
            "recovery",
            policy = %policy,
            thread = %fault.thread,
            caller = ?fault.caller
        );
        let result = self.apply(&fault).instrument(span).await;

        match &result {
            Ok(outcome) => {
                self.stats.lock().record(outcome);
                metric_inc!(RECOVERY_FAULTS, &[policy.as_str(), outcome.label()]);
                match outcome {
                    RecoveryOutcome::Ignored(reason) => {
                        warn!(%policy, thread = %fault.thread, ?reason, "Stale fault ignored")
                    }
                    _ => debug!(%policy, ?outcome, "Fault handled"),
                }
            }
            Err(e) => {
                metric_inc!(RECOVERY_FAULTS, &[policy.as_str(), "failed"]);
                error!(%policy, thread = %fault.thread, error = %e, "Recovery failed");
            }
        }
        result
    }

    async fn handle_next_fault(&self) -> RecoveryResult<RecoveryOutcome> {
        let fault = self.kernel.fault_wait().await?;
        self.handle_fault(fault).await
    }

    /// Only a donation already in flight is affected; nothing is stored.
    fn force_done(&self) {
        self.force_done.notify_waiters();
    }

    fn job_complete(&self, client: ThreadId) -> RecoveryResult<()> {
        if self.config.policy != RecoveryPolicy::Extend {
            return Ok(());
        }
        let was_extended = self.ledger.lock().reset(client);
        let context = self.client_contexts.lock().remove(&client);
        if let Some(context) = context {
            self.kernel.configure(context, self.config.extend.base)?;
        }

        let label = client.to_string();
        metric_set!(
            GRANTED_BUDGET,
            &[label.as_str()],
            self.config.extend.base.budget as f64
        );
        debug!(%client, was_extended, "Job complete, budget reset");
        Ok(())
    }

    fn granted_budget(&self, client: ThreadId) -> u64 {
        self.ledger.lock().granted(client)
    }

    fn stats(&self) -> RecoveryStats {
        *self.stats.lock()
    }
}
