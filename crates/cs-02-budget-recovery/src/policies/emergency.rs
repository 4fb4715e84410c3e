//! Emergency budget: keep progress, borrow the client's context.
//!
//! 1. Unbind the server's exhausted context and the client's context;
//!    bind the client's to the server; resume.
//! 2. The server continues from its active snapshot.
//! 3. When the server is idle (or `force_done` fires) the contexts go back
//!    where they came from. The server is rebound first, so it can never
//!    pick the client's context up again through a lazy donation.
//!
//! `force_done` only ends a donation that is already in flight; a call made
//! with none running is dropped.
//!
//! The loan is withdrawn after the server reports idle. A call that reaches
//! the server inside that window starts on the lent context. If that call
//! comes from another client, the server may take that client's context by
//! lazy donation, and rebinding then fails with `ThreadAlreadyBound`. Callers
//! wait for the resting binding before calling again (see
//! `Deployment::settle` in `bench-runtime`).

use crate::domain::RecoveryOutcome;
use crate::error::{RecoveryError, RecoveryResult};
use cs_01_cipher_server::{CipherServerApi, Kernel};
use shared_types::FaultEvent;
use tokio::sync::Notify;
use tracing::{error, info, warn};

pub(crate) async fn donate<K: Kernel>(
    kernel: &K,
    server: &dyn CipherServerApi,
    force_done: &Notify,
    fault: &FaultEvent,
) -> RecoveryResult<RecoveryOutcome> {
    let thread = server.thread();
    let client = fault.caller.ok_or(RecoveryError::NoCaller(thread))?;
    let client_context = kernel
        .bound_context(client)?
        .ok_or(RecoveryError::NoClientContext(client))?;
    let server_context = fault.sched_context;
    let epoch = server.status().idle_epoch;

    // Registered before the loan, so a force issued while it is out is seen.
    let forced_signal = force_done.notified();
    tokio::pin!(forced_signal);
    forced_signal.as_mut().enable();

    kernel.unbind(server_context)?;
    kernel.unbind(client_context)?;
    kernel.bind(client_context, thread)?;
    info!(
        %thread,
        %client,
        donated = %client_context,
        resume_from = ?server.read_active().map(|snapshot| snapshot.remaining),
        "Donating client budget to server"
    );
    kernel.resume(thread)?;

    let forced = loop {
        tokio::select! {
            status = server.wait_idle_after(epoch) => {
                status?;
                break false;
            }
            _ = forced_signal.as_mut() => break true,
            next = kernel.fault_wait() => {
                let next = next?;
                if next.thread != thread {
                    warn!(%thread, foreign = %next.thread, "Foreign fault ignored during donation");
                    continue;
                }
                error!(%thread, %client, context = %next.sched_context, "Fault during donation");
                return Err(RecoveryError::DonatedBudgetExhausted { server: thread, client });
            }
        }
    };

    kernel.unbind(client_context)?;
    kernel.bind(server_context, thread)?;
    kernel.bind(client_context, client)?;
    info!(%thread, %client, forced, "Donated budget returned");

    Ok(RecoveryOutcome::Donated { client, forced })
}
