//! The simulated kernel and its port implementations.

use crate::state::{check_grant, Envelope, KernelState, ParkReason, Parked, PendingReply};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{
    BudgetGrant, CheckpointId, CheckpointPort, FaultEvent, FaultPort, IpcPort, KernelError,
    KernelResult, ReplyCapId, ReplyMessage, Request, Resumption, SchedContextId, SchedulingPort,
    ThreadId,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// In-process kernel. Share it behind an `Arc`.
pub struct SimKernel {
    state: Mutex<KernelState>,
    faults_tx: mpsc::UnboundedSender<FaultEvent>,
    faults_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<FaultEvent>>,
}

impl Default for SimKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl SimKernel {
    pub fn new() -> Self {
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(KernelState::default()),
            faults_tx,
            faults_rx: tokio::sync::Mutex::new(faults_rx),
        }
    }

    pub fn create_thread(&self, name: &str) -> ThreadId {
        let id = self.state.lock().create_thread(name);
        debug!(thread = %id, name, "Thread created");
        id
    }

    pub fn create_sched_context(&self, grant: BudgetGrant) -> KernelResult<SchedContextId> {
        let id = self.state.lock().create_context(grant)?;
        debug!(context = %id, %grant, "Scheduling context created");
        Ok(id)
    }

    /// Period boundary: every context is replenished to its budget.
    pub fn next_period(&self) {
        let mut state = self.state.lock();
        for context in state.contexts.values_mut() {
            context.remaining = context.grant.budget;
        }
        state.wake_unbound();
    }

    pub fn remaining_budget(&self, context: SchedContextId) -> KernelResult<u64> {
        Ok(self.state.lock().context(context)?.remaining)
    }

    /// Total budget ever charged to `context`.
    pub fn consumed_budget(&self, context: SchedContextId) -> KernelResult<u64> {
        Ok(self.state.lock().context(context)?.consumed)
    }

    pub fn grant(&self, context: SchedContextId) -> KernelResult<BudgetGrant> {
        Ok(self.state.lock().context(context)?.grant)
    }

    /// Why `thread` is parked, if it is.
    pub fn park_reason(&self, thread: ThreadId) -> KernelResult<Option<ParkReason>> {
        Ok(self
            .state
            .lock()
            .thread(thread)?
            .parked
            .as_ref()
            .map(|parked| parked.reason))
    }

    /// Deduct up to `units` from the thread's context. Returns the units still
    /// owed, or a wake receiver if the thread had to park.
    fn try_charge(
        &self,
        thread: ThreadId,
        units: u64,
    ) -> KernelResult<Result<(), (u64, oneshot::Receiver<Resumption>)>> {
        let mut state = self.state.lock();

        let Some(context) = state.donate_if_passive(thread) else {
            state.thread(thread)?;
            let (wake, rx) = oneshot::channel();
            state.thread_mut(thread)?.parked = Some(Parked {
                reason: ParkReason::NoContext,
                wake,
            });
            debug!(%thread, "Parked without a scheduling context");
            return Ok(Err((units, rx)));
        };

        let sc = state.context_mut(context)?;
        let taken = sc.remaining.min(units);
        sc.remaining -= taken;
        sc.consumed += taken;
        let owed = units - taken;
        if owed == 0 {
            return Ok(Ok(()));
        }

        let (wake, rx) = oneshot::channel();
        let record = state.thread_mut(thread)?;
        record.parked = Some(Parked {
            reason: ParkReason::BudgetExhausted,
            wake,
        });
        let fault = FaultEvent {
            thread,
            sched_context: context,
            caller: record.serving.as_ref().map(|serving| serving.caller),
        };
        info!(
            %thread,
            name = %record.name,
            %context,
            caller = ?fault.caller,
            "Budget exhausted, raising fault"
        );
        // The receiver lives as long as `self`.
        let _ = self.faults_tx.send(fault);
        Ok(Err((owed, rx)))
    }
}

#[async_trait]
impl SchedulingPort for SimKernel {
    fn bind(&self, context: SchedContextId, thread: ThreadId) -> KernelResult<()> {
        let mut state = self.state.lock();
        state.bind(context, thread)?;
        state.wake_unbound();
        Ok(())
    }

    fn unbind(&self, context: SchedContextId) -> KernelResult<()> {
        self.state.lock().unbind(context).map(|_| ())
    }

    fn configure(&self, context: SchedContextId, grant: BudgetGrant) -> KernelResult<()> {
        check_grant(grant)?;
        let mut state = self.state.lock();
        let sc = state.context_mut(context)?;
        sc.grant = grant;
        sc.remaining = grant.budget;
        debug!(%context, %grant, "Scheduling context configured");
        Ok(())
    }

    fn bound_context(&self, thread: ThreadId) -> KernelResult<Option<SchedContextId>> {
        Ok(self.state.lock().thread(thread)?.bound)
    }

    fn resume(&self, thread: ThreadId) -> KernelResult<()> {
        self.state.lock().resume(thread)
    }

    async fn charge(&self, thread: ThreadId, units: u64) -> KernelResult<Resumption> {
        let mut owed = units;
        while owed > 0 {
            let (left, wake) = match self.try_charge(thread, owed)? {
                Ok(()) => return Ok(Resumption::Continue),
                Err(parked) => parked,
            };
            owed = left;
            match wake.await {
                Ok(Resumption::Continue) => continue,
                Ok(restore @ Resumption::Restore(_)) => return Ok(restore),
                Err(_) => {
                    return Err(KernelError::ChannelClosed(format!(
                        "wake channel of {thread}"
                    )))
                }
            }
        }
        Ok(Resumption::Continue)
    }
}

impl CheckpointPort for SimKernel {
    fn checkpoint_save(&self, thread: ThreadId) -> KernelResult<CheckpointId> {
        let mut state = self.state.lock();
        state.thread(thread)?;
        let checkpoint = state.new_checkpoint(thread);
        debug!(%thread, %checkpoint, "Checkpoint saved");
        Ok(checkpoint)
    }

    fn checkpoint_restore(&self, checkpoint: CheckpointId, resume: bool) -> KernelResult<()> {
        let mut state = self.state.lock();
        let owner = *state
            .checkpoints
            .get(&checkpoint)
            .ok_or(KernelError::UnknownCheckpoint(checkpoint))?;
        let record = state.thread_mut(owner)?;
        if record.parked.is_none() {
            return Err(KernelError::NotSuspended(owner));
        }
        record.pending_restore = Some(checkpoint);
        debug!(%checkpoint, thread = %owner, resume, "Checkpoint restore armed");
        if resume {
            state.resume(owner)?;
        }
        Ok(())
    }
}

#[async_trait]
impl FaultPort for SimKernel {
    async fn fault_wait(&self) -> KernelResult<FaultEvent> {
        self.faults_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| KernelError::ChannelClosed("fault channel".into()))
    }
}

#[async_trait]
impl IpcPort for SimKernel {
    async fn call(
        &self,
        caller: ThreadId,
        server: ThreadId,
        request: Request,
    ) -> KernelResult<ReplyMessage> {
        let (reply, rx) = oneshot::channel();
        {
            let state = self.state.lock();
            state.thread(caller)?;
            state
                .thread(server)?
                .inbox_tx
                .send(Envelope {
                    caller,
                    request,
                    reply,
                })
                .map_err(|_| KernelError::ChannelClosed(format!("inbox of {server}")))?;
        }
        rx.await
            .map_err(|_| KernelError::ChannelClosed(format!("reply to {caller}")))
    }

    async fn recv(&self, server: ThreadId) -> KernelResult<Request> {
        let inbox = {
            let mut state = self.state.lock();
            // A reply cap still held from an earlier call is discarded.
            state.take_reply(server)?;
            state.thread(server)?.inbox_rx.clone()
        };

        let envelope = inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| KernelError::ChannelClosed(format!("inbox of {server}")))?;

        let mut state = self.state.lock();
        state.thread_mut(server)?.serving = Some(PendingReply {
            caller: envelope.caller,
            donated: None,
            reply: envelope.reply,
        });
        state.donate_if_passive(server);
        debug!(%server, caller = %envelope.caller, "Call received");
        Ok(envelope.request)
    }

    fn reply(&self, server: ThreadId, message: ReplyMessage) -> KernelResult<bool> {
        let pending = self.state.lock().take_reply(server)?;
        match pending {
            Some(pending) => {
                // The caller may have given up waiting.
                let _ = pending.reply.send(message);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn revoke_reply(&self, server: ThreadId) -> KernelResult<Option<ReplyCapId>> {
        let mut state = self.state.lock();
        let Some(pending) = state.take_reply(server)? else {
            return Ok(None);
        };
        let caller = pending.caller;
        let cap = state.new_reply_cap(pending);
        debug!(%server, %caller, %cap, "Reply cap revoked");
        Ok(Some(cap))
    }

    fn reply_via(&self, cap: ReplyCapId, message: ReplyMessage) -> KernelResult<()> {
        let pending = self
            .state
            .lock()
            .reply_caps
            .remove(&cap)
            .ok_or(KernelError::UnknownReplyCap(cap))?;
        let _ = pending.reply.send(message);
        Ok(())
    }
}
