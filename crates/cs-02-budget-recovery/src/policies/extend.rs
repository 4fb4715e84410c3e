//! Extend: keep progress, raise the faulting client's budget.
//!
//! The context that ran dry is the client's own, donated to the passive
//! server for the call. Reconfiguring it replenishes it to the new grant.

use crate::domain::{BudgetLedger, RecoveryOutcome};
use crate::error::{RecoveryError, RecoveryResult};
use cipher_telemetry::{metric_set, GRANTED_BUDGET};
use cs_01_cipher_server::Kernel;
use parking_lot::Mutex;
use shared_types::{FaultEvent, SchedContextId, ThreadId};
use std::collections::HashMap;
use tracing::{info, warn};

pub(crate) fn extend<K: Kernel>(
    kernel: &K,
    ledger: &Mutex<BudgetLedger>,
    client_contexts: &Mutex<HashMap<ThreadId, SchedContextId>>,
    fault: &FaultEvent,
) -> RecoveryResult<RecoveryOutcome> {
    let client = fault.caller.ok_or(RecoveryError::NoCaller(fault.thread))?;
    let context = fault.sched_context;

    let extension = ledger.lock().extend(client);
    client_contexts.lock().insert(client, context);
    if extension.at_ceiling {
        warn!(%client, grant = %extension.grant, "Budget ceiling reached, replenishing only");
    }

    kernel.configure(context, extension.grant)?;
    kernel.resume(fault.thread)?;
    let label = client.to_string();
    metric_set!(
        GRANTED_BUDGET,
        &[label.as_str()],
        extension.grant.budget as f64
    );
    info!(%client, %context, grant = %extension.grant, "Budget extended");

    Ok(RecoveryOutcome::Extended {
        client,
        grant: extension.grant,
        at_ceiling: extension.at_ceiling,
    })
}
