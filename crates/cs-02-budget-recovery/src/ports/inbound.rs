//! Driving Ports (API - Inbound)

use crate::domain::{RecoveryOutcome, RecoveryPolicy, RecoveryStats};
use crate::error::RecoveryResult;
use async_trait::async_trait;
use shared_types::{FaultEvent, ThreadId};

/// Budget-fault recovery API.
#[async_trait]
pub trait RecoveryApi: Send + Sync {
    /// Policy this controller applies.
    fn policy(&self) -> RecoveryPolicy;

    /// Apply the policy to one fault. Returns only after the policy's
    /// sequence has finished (for rollback and emergency, after the server
    /// is idle again).
    async fn handle_fault(&self, fault: FaultEvent) -> RecoveryResult<RecoveryOutcome>;

    /// Wait for the next fault and handle it.
    async fn handle_next_fault(&self) -> RecoveryResult<RecoveryOutcome>;

    /// End an in-progress emergency donation without waiting for the server
    /// to go idle. Has no effect when no donation is running.
    fn force_done(&self);

    /// The client's job finished: reset its extended budget.
    fn job_complete(&self, client: ThreadId) -> RecoveryResult<()>;

    /// Budget currently granted to `client` by the extend policy.
    fn granted_budget(&self, client: ThreadId) -> u64;

    /// Totals so far.
    fn stats(&self) -> RecoveryStats;
}
