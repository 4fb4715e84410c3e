//! # Environment Ports
//!
//! The primitives the cipher server and the recovery controller consume from
//! whatever kernel hosts them. A real microkernel maps these onto capability
//! invocations; `sim-kernel` implements them in-process.
//!
//! | Port | Primitives |
//! |------|------------|
//! | `SchedulingPort` | bind / unbind / configure / resume / charge |
//! | `CheckpointPort` | save / restore |
//! | `FaultPort` | fault_wait |
//! | `IpcPort` | call / recv / reply / revoke_reply / reply_via |

use crate::entities::{BudgetGrant, CheckpointId, ReplyCapId, SchedContextId, ThreadId};
use crate::errors::KernelResult;
use crate::ipc::{FaultEvent, ReplyMessage, Request, Resumption};
use async_trait::async_trait;

/// Budget-bearing scheduling contexts and the threads that run on them.
#[async_trait]
pub trait SchedulingPort: Send + Sync {
    /// Attach `context` to `thread`. Both must currently be unbound.
    fn bind(&self, context: SchedContextId, thread: ThreadId) -> KernelResult<()>;

    /// Detach `context` from whichever thread holds it.
    fn unbind(&self, context: SchedContextId) -> KernelResult<()>;

    /// Set budget and period; the context is replenished to the new budget.
    fn configure(&self, context: SchedContextId, grant: BudgetGrant) -> KernelResult<()>;

    /// Context currently bound to `thread`, if any.
    fn bound_context(&self, thread: ThreadId) -> KernelResult<Option<SchedContextId>>;

    /// Wake a thread parked on a budget fault. Its bound context must have
    /// budget left.
    fn resume(&self, thread: ThreadId) -> KernelResult<()>;

    /// Consume `units` of budget before doing that much work. Parks the
    /// thread (and raises a fault) when the budget is exhausted; returns how
    /// the thread was eventually allowed to continue.
    async fn charge(&self, thread: ThreadId, units: u64) -> KernelResult<Resumption>;
}

/// Save and replay a thread's execution context.
pub trait CheckpointPort: Send + Sync {
    /// Capture the current context of `thread`.
    fn checkpoint_save(&self, thread: ThreadId) -> KernelResult<CheckpointId>;

    /// Arrange for the suspended owner of `checkpoint` to return to it. With
    /// `resume == false` the restore is delivered on the next `resume`.
    fn checkpoint_restore(&self, checkpoint: CheckpointId, resume: bool) -> KernelResult<()>;
}

/// Delivery of asynchronous budget faults.
#[async_trait]
pub trait FaultPort: Send + Sync {
    /// Block until the next fault.
    async fn fault_wait(&self) -> KernelResult<FaultEvent>;
}

/// Synchronous call/reply between client and server threads.
#[async_trait]
pub trait IpcPort: Send + Sync {
    /// Send `request` to `server` and block for the reply.
    async fn call(
        &self,
        caller: ThreadId,
        server: ThreadId,
        request: Request,
    ) -> KernelResult<ReplyMessage>;

    /// Block until a call arrives for `server`; the server then holds its
    /// reply cap.
    async fn recv(&self, server: ThreadId) -> KernelResult<Request>;

    /// Answer the call `server` is serving. Returns `false` if its reply cap
    /// was revoked in the meantime.
    fn reply(&self, server: ThreadId, message: ReplyMessage) -> KernelResult<bool>;

    /// Take the reply cap away from `server`. `None` if it holds none.
    fn revoke_reply(&self, server: ThreadId) -> KernelResult<Option<ReplyCapId>>;

    /// Answer through a previously revoked reply cap.
    fn reply_via(&self, cap: ReplyCapId, message: ReplyMessage) -> KernelResult<()>;
}

/// Everything the cipher server and recovery controller need from a kernel.
pub trait Kernel: SchedulingPort + CheckpointPort + FaultPort + IpcPort + 'static {}

impl<T> Kernel for T where T: SchedulingPort + CheckpointPort + FaultPort + IpcPort + 'static {}
