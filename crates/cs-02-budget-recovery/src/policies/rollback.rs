//! Rollback: discard progress, restart clean.
//!
//! 1. Revoke the server's reply cap (the donated context goes home).
//! 2. Arm the checkpoint restore without resuming.
//! 3. Bind and configure the recovery context on the server.
//! 4. Read the cursor, reply `remaining = original_length` via the cap.
//! 5. Resume, wait for idle, unbind the recovery context.

use crate::domain::{IgnoreReason, RecoveryOutcome};
use crate::error::{RecoveryError, RecoveryResult};
use cs_01_cipher_server::{CipherServerApi, Kernel};
use shared_types::{BudgetGrant, FaultEvent, Reply, SchedContextId, BLOCK_SIZE};
use tracing::{debug, info};

pub(crate) async fn roll_back<K: Kernel>(
    kernel: &K,
    server: &dyn CipherServerApi,
    recovery: Option<(SchedContextId, BudgetGrant)>,
    fault: &FaultEvent,
) -> RecoveryResult<RecoveryOutcome> {
    let thread = server.thread();
    let Some(original) = server.in_flight() else {
        return Ok(RecoveryOutcome::Ignored(IgnoreReason::ServerIdle));
    };
    let checkpoint = server
        .checkpoint()
        .ok_or(RecoveryError::NoCheckpoint(thread))?;
    let (context, grant) = recovery.ok_or(RecoveryError::MissingRecoveryContext)?;
    let epoch = server.status().idle_epoch;

    let Some(cap) = kernel.revoke_reply(thread)? else {
        return Ok(RecoveryOutcome::Ignored(IgnoreReason::NoReplyCap));
    };
    debug!(%thread, %cap, "Reply cap revoked");

    kernel.checkpoint_restore(checkpoint, false)?;
    kernel.bind(context, thread)?;
    kernel.configure(context, grant)?;

    let last = server.read_active();
    let discarded_blocks = last
        .map(|snapshot| original.remaining.saturating_sub(snapshot.remaining) / BLOCK_SIZE)
        .unwrap_or(0);
    info!(
        %thread,
        client = ?fault.caller,
        original_length = original.remaining,
        last_remaining = ?last.map(|snapshot| snapshot.remaining),
        discarded_blocks,
        "Rolling back, reporting failure"
    );
    kernel.reply_via(cap, Ok(Reply::failure(original.remaining)))?;

    kernel.resume(thread)?;
    server.wait_idle_after(epoch).await?;
    kernel.unbind(context)?;
    debug!(%thread, %context, "Recovery context withdrawn");

    Ok(RecoveryOutcome::RolledBack {
        client: fault.caller,
        original_length: original.remaining,
        discarded_blocks,
    })
}
