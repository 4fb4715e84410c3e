//! # Deployment
//!
//! One simulated kernel, one cipher server, N clients and the recovery
//! controller, each server-side piece on its own task.
//!
//! ```text
//! client-0 ─┐                              ┌── recovery ctx (rollback only)
//! client-1 ─┼──call──→ cipher-server ←bind─┤
//! client-N ─┘               │              └── server ctx (emergency only)
//!                           └──fault──→ RecoveryController
//! ```
//!
//! Passive policies leave the server without a context of its own: it runs
//! on whatever its caller donates.

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use cs_01_cipher_server::{
    CipherClient, CipherResult, CipherServer, CipherServerApi, ServerConfig, ServerHandle,
    SharedRegion,
};
use cs_02_budget_recovery::{RecoveryController, RecoveryPolicy, RecoveryResult, RecoveryStats};
use shared_types::{SchedContextId, SchedulingPort};
use sim_kernel::SimKernel;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SETTLE_POLL: Duration = Duration::from_millis(1);

/// A client thread and the context bound to it.
pub struct ClientSlot {
    pub client: CipherClient<SimKernel>,
    pub context: SchedContextId,
}

/// A running server, its clients and its recovery controller.
pub struct Deployment {
    pub(crate) policy: RecoveryPolicy,
    pub(crate) kernel: Arc<SimKernel>,
    pub(crate) server: Arc<ServerHandle>,
    pub(crate) server_context: Option<SchedContextId>,
    pub(crate) controller: Arc<RecoveryController<SimKernel>>,
    pub(crate) clients: Vec<ClientSlot>,
    shutdown_tx: watch::Sender<bool>,
    server_task: JoinHandle<CipherResult<()>>,
    controller_task: JoinHandle<RecoveryResult<RecoveryStats>>,
}

impl Deployment {
    /// Build and start everything. Must be called inside a Tokio runtime.
    pub fn start(config: &RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        let policy = config.policy;
        let kernel = Arc::new(SimKernel::new());

        let server_thread = kernel.create_thread("cipher-server");
        let server_context = if policy.server_is_passive() {
            None
        } else {
            let context = kernel.create_sched_context(config.budget.server)?;
            kernel.bind(context, server_thread)?;
            Some(context)
        };

        let server = CipherServer::new(
            kernel.clone(),
            server_thread,
            &config.cipher.key,
            ServerConfig {
                iv: config.cipher.iv,
                ..ServerConfig::default()
            },
            Arc::new(SharedRegion::new()),
        );
        let handle = server.handle();
        let server_task = tokio::spawn(server.run());

        let mut controller =
            RecoveryController::new(kernel.clone(), handle.clone(), config.recovery_config())?;
        if policy == RecoveryPolicy::Rollback {
            let recovery = kernel.create_sched_context(config.budget.recovery)?;
            controller = controller.with_recovery_context(recovery);
        }
        let controller = Arc::new(controller);

        let mut clients = Vec::with_capacity(config.workload.clients);
        for i in 0..config.workload.clients {
            let thread = kernel.create_thread(&format!("client-{i}"));
            let context = kernel.create_sched_context(config.budget.client)?;
            kernel.bind(context, thread)?;
            clients.push(ClientSlot {
                client: CipherClient::new(kernel.clone(), thread, handle.clone()),
                context,
            });
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let controller_task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run(shutdown_rx).await })
        };

        info!(
            %policy,
            server = %server_thread,
            server_context = ?server_context,
            clients = clients.len(),
            "Deployment started"
        );

        Ok(Self {
            policy,
            kernel,
            server: handle,
            server_context,
            controller,
            clients,
            shutdown_tx,
            server_task,
            controller_task,
        })
    }

    pub fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    pub fn kernel(&self) -> &Arc<SimKernel> {
        &self.kernel
    }

    pub fn server(&self) -> &Arc<ServerHandle> {
        &self.server
    }

    pub fn controller(&self) -> &Arc<RecoveryController<SimKernel>> {
        &self.controller
    }

    pub fn clients(&self) -> &[ClientSlot] {
        &self.clients
    }

    /// Wait until the server is idle and back on its resting binding.
    ///
    /// Recovery hands the client its reply before it withdraws any context
    /// it lent the server; a call issued in between would run on that loan.
    pub async fn settle(&self, deadline: Duration) -> RuntimeResult<()> {
        let thread = self.server.thread();
        let settled = async {
            loop {
                let bound = self.kernel.bound_context(thread)?;
                if !self.server.is_busy() && bound == self.server_context {
                    return Ok::<_, RuntimeError>(());
                }
                tokio::time::sleep(SETTLE_POLL).await;
            }
        };
        tokio::time::timeout(deadline, settled)
            .await
            .map_err(|_| RuntimeError::Timeout {
                thread,
                after: deadline,
            })?
    }

    /// Stop the controller and the server. Returns the controller's totals.
    pub async fn shutdown(self) -> RuntimeResult<RecoveryStats> {
        if self.shutdown_tx.send(true).is_err() {
            warn!("Recovery controller already gone");
        }
        let stats = self
            .controller_task
            .await
            .map_err(|_| RuntimeError::ControllerStopped)??;

        // The server blocks in recv forever; nothing else would end it.
        self.server_task.abort();
        debug!(?stats, "Deployment shut down");
        Ok(stats)
    }
}
