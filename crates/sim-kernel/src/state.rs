//! Kernel object tables.
//!
//! Everything in here is synchronous and runs under the kernel lock; the
//! async halves of the primitives live in [`crate::kernel`].

use shared_types::{
    BudgetGrant, CheckpointId, KernelError, KernelResult, ReplyCapId, ReplyMessage, Request,
    Resumption, SchedContextId, ThreadId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Why a thread is parked inside `charge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkReason {
    /// Bound context ran dry. Only `resume` wakes it.
    BudgetExhausted,
    /// No context at all. Woken as soon as one becomes available.
    NoContext,
}

pub(crate) struct Parked {
    pub reason: ParkReason,
    pub wake: oneshot::Sender<Resumption>,
}

/// A call in the server's inbox.
pub(crate) struct Envelope {
    pub caller: ThreadId,
    pub request: Request,
    pub reply: oneshot::Sender<ReplyMessage>,
}

/// The right to answer one call.
pub(crate) struct PendingReply {
    pub caller: ThreadId,
    /// Caller context lent to the server for this call.
    pub donated: Option<SchedContextId>,
    pub reply: oneshot::Sender<ReplyMessage>,
}

pub(crate) struct ThreadRecord {
    pub name: String,
    pub bound: Option<SchedContextId>,
    pub parked: Option<Parked>,
    pub pending_restore: Option<CheckpointId>,
    /// Call currently being served, if the thread holds a reply cap.
    pub serving: Option<PendingReply>,
    pub inbox_tx: mpsc::UnboundedSender<Envelope>,
    pub inbox_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>>,
}

impl ThreadRecord {
    fn new(name: String) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            name,
            bound: None,
            parked: None,
            pending_restore: None,
            serving: None,
            inbox_tx,
            inbox_rx: Arc::new(tokio::sync::Mutex::new(inbox_rx)),
        }
    }
}

pub(crate) struct SchedContext {
    pub grant: BudgetGrant,
    pub remaining: u64,
    pub consumed: u64,
    pub bound_to: Option<ThreadId>,
}

/// All kernel objects.
#[derive(Default)]
pub(crate) struct KernelState {
    next_id: u32,
    pub threads: HashMap<ThreadId, ThreadRecord>,
    pub contexts: HashMap<SchedContextId, SchedContext>,
    pub checkpoints: HashMap<CheckpointId, ThreadId>,
    pub reply_caps: HashMap<ReplyCapId, PendingReply>,
}

impl KernelState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn create_thread(&mut self, name: &str) -> ThreadId {
        let id = ThreadId(self.next_id());
        self.threads.insert(id, ThreadRecord::new(name.to_string()));
        id
    }

    pub fn create_context(&mut self, grant: BudgetGrant) -> KernelResult<SchedContextId> {
        check_grant(grant)?;
        let id = SchedContextId(self.next_id());
        self.contexts.insert(
            id,
            SchedContext {
                grant,
                remaining: grant.budget,
                consumed: 0,
                bound_to: None,
            },
        );
        Ok(id)
    }

    pub fn new_checkpoint(&mut self, owner: ThreadId) -> CheckpointId {
        let id = CheckpointId(self.next_id());
        self.checkpoints.insert(id, owner);
        id
    }

    pub fn new_reply_cap(&mut self, pending: PendingReply) -> ReplyCapId {
        let id = ReplyCapId(self.next_id());
        self.reply_caps.insert(id, pending);
        id
    }

    pub fn thread(&self, id: ThreadId) -> KernelResult<&ThreadRecord> {
        self.threads.get(&id).ok_or(KernelError::UnknownThread(id))
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> KernelResult<&mut ThreadRecord> {
        self.threads
            .get_mut(&id)
            .ok_or(KernelError::UnknownThread(id))
    }

    pub fn context(&self, id: SchedContextId) -> KernelResult<&SchedContext> {
        self.contexts
            .get(&id)
            .ok_or(KernelError::UnknownSchedContext(id))
    }

    pub fn context_mut(&mut self, id: SchedContextId) -> KernelResult<&mut SchedContext> {
        self.contexts
            .get_mut(&id)
            .ok_or(KernelError::UnknownSchedContext(id))
    }

    pub fn bind(&mut self, context: SchedContextId, thread: ThreadId) -> KernelResult<()> {
        if let Some(holder) = self.context(context)?.bound_to {
            return Err(KernelError::ContextInUse {
                context,
                thread: holder,
            });
        }
        let record = self.thread_mut(thread)?;
        if let Some(existing) = record.bound {
            return Err(KernelError::ThreadAlreadyBound {
                thread,
                context: existing,
            });
        }
        record.bound = Some(context);
        self.context_mut(context)?.bound_to = Some(thread);
        debug!(%context, %thread, "Scheduling context bound");
        Ok(())
    }

    pub fn unbind(&mut self, context: SchedContextId) -> KernelResult<ThreadId> {
        let thread = self
            .context_mut(context)?
            .bound_to
            .take()
            .ok_or(KernelError::ContextNotBound(context))?;
        if let Some(record) = self.threads.get_mut(&thread) {
            record.bound = None;
        }
        debug!(%context, %thread, "Scheduling context unbound");
        Ok(thread)
    }

    /// Lend the caller's context to a server that has none. Returns the
    /// context the server can now run on.
    pub fn donate_if_passive(&mut self, server: ThreadId) -> Option<SchedContextId> {
        let record = self.threads.get(&server)?;
        if record.bound.is_some() {
            return record.bound;
        }
        let caller = record.serving.as_ref()?.caller;
        let context = self.threads.get(&caller)?.bound?;

        self.threads.get_mut(&caller)?.bound = None;
        self.contexts.get_mut(&context)?.bound_to = Some(server);
        let record = self.threads.get_mut(&server)?;
        record.bound = Some(context);
        if let Some(serving) = record.serving.as_mut() {
            serving.donated = Some(context);
        }
        debug!(%context, %caller, %server, "Scheduling context donated");
        Some(context)
    }

    /// Take the reply cap away from `server`, handing any donated context
    /// back to the caller.
    pub fn take_reply(&mut self, server: ThreadId) -> KernelResult<Option<PendingReply>> {
        let Some(mut pending) = self.thread_mut(server)?.serving.take() else {
            return Ok(None);
        };
        if let Some(context) = pending.donated.take() {
            let still_on_server = self.context(context)?.bound_to == Some(server);
            if still_on_server {
                self.unbind(context)?;
            }
            let caller_free = self.thread(pending.caller)?.bound.is_none();
            if self.context(context)?.bound_to.is_none() && caller_free {
                self.bind(context, pending.caller)?;
            }
            debug!(%context, caller = %pending.caller, "Donated context returned");
        }
        Ok(Some(pending))
    }

    /// Wake `thread` out of a budget fault.
    pub fn resume(&mut self, thread: ThreadId) -> KernelResult<()> {
        let record = self.thread(thread)?;
        match &record.parked {
            Some(parked) if parked.reason == ParkReason::BudgetExhausted => {}
            _ => return Err(KernelError::NotSuspended(thread)),
        }
        let context = record.bound.ok_or(KernelError::NoBudget(thread))?;
        if self.context(context)?.remaining == 0 {
            return Err(KernelError::NoBudget(thread));
        }

        let record = self.thread_mut(thread)?;
        let resumption = match record.pending_restore.take() {
            Some(checkpoint) => Resumption::Restore(checkpoint),
            None => Resumption::Continue,
        };
        if let Some(parked) = record.parked.take() {
            // A dropped receiver means the thread's task is gone.
            let _ = parked.wake.send(resumption);
        }
        debug!(%thread, ?resumption, "Thread resumed");
        Ok(())
    }

    /// Retry every thread parked for lack of a context that could now get one.
    pub fn wake_unbound(&mut self) {
        let runnable: Vec<ThreadId> = self
            .threads
            .iter()
            .filter(|(_, record)| {
                matches!(&record.parked, Some(p) if p.reason == ParkReason::NoContext)
            })
            .filter(|(_, record)| {
                record.bound.is_some()
                    || record
                        .serving
                        .as_ref()
                        .and_then(|serving| self.threads.get(&serving.caller))
                        .is_some_and(|caller| caller.bound.is_some())
            })
            .map(|(id, _)| *id)
            .collect();

        for id in runnable {
            if let Some(parked) = self.threads.get_mut(&id).and_then(|r| r.parked.take()) {
                let _ = parked.wake.send(Resumption::Continue);
                debug!(thread = %id, "Thread woken with a context");
            }
        }
    }
}

pub(crate) fn check_grant(grant: BudgetGrant) -> KernelResult<()> {
    if grant.is_valid() {
        Ok(())
    } else {
        Err(KernelError::InvalidGrant {
            budget: grant.budget,
            period: grant.period,
        })
    }
}
