//! Cipher Service - the server loop
//!
//! ```text
//! checkpoint_save ──→ [IDLE] ──recv──→ [ACTIVE]
//!                       ↑                 │ per block:
//!                       │                 │   read active snapshot
//!                       │                 │   charge budget ──Restore──→ retire ──┐
//!                       │                 │   encrypt one block                   │
//!                       │                 │   publish(snapshot.advance(ct))       │
//!                       │                 ↓                                       │
//!                       ├── reply(0) ── complete                                  │
//!                       ├── reply(Err) ── rejected                                │
//!                       └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Budget is charged *before* each block, so a fault can only land between
//! two published snapshots and a request whose block count equals the
//! remaining budget completes without faulting.

use crate::domain::{
    double_buffered_cursor, initial_snapshot, CursorReader, CursorWriter, RequestDefaults,
    ServerPhase, ServerStatus, SharedRegion, Snapshot,
};
use crate::error::{CipherError, CipherResult};
use crate::ports::inbound::CipherServerApi;
use crate::ports::outbound::Kernel;
use async_trait::async_trait;
use cipher_telemetry::{metric_inc, BLOCKS_ENCRYPTED, REQUESTS};
use parking_lot::Mutex;
use shared_crypto::{CbcEngine, CipherKey};
use shared_types::{
    Block, CheckpointId, ProtocolViolation, Reply, Request, Resumption, ThreadId, BLOCK_SIZE,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// IV substituted for new requests
    pub iv: Block,
    /// Budget units charged per block
    pub charge_per_block: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            iv: [0u8; BLOCK_SIZE],
            charge_per_block: 1,
        }
    }
}

/// Shared, read-only view of a running server.
pub struct ServerHandle {
    thread: ThreadId,
    cursor: CursorReader,
    region: Arc<SharedRegion>,
    status: watch::Sender<ServerStatus>,
    checkpoint: OnceLock<CheckpointId>,
    in_flight: Mutex<Option<Snapshot>>,
    blocks_encrypted: AtomicU64,
}

impl ServerHandle {
    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.status.borrow().is_busy()
    }

    fn begin(&self, initial: Snapshot) {
        *self.in_flight.lock() = Some(initial);
        self.status.send_modify(|status| status.phase = ServerPhase::Active);
    }

    /// Back at the receive point. `record` bumps the matching counter.
    fn enter_idle(&self, record: impl FnOnce(&mut ServerStatus)) {
        *self.in_flight.lock() = None;
        self.status.send_modify(|status| {
            record(status);
            status.phase = ServerPhase::Idle;
            status.idle_epoch += 1;
        });
    }
}

#[async_trait]
impl CipherServerApi for ServerHandle {
    fn thread(&self) -> ThreadId {
        self.thread
    }

    fn read_active(&self) -> Option<Snapshot> {
        self.cursor.read_active()
    }

    fn cursor(&self) -> CursorReader {
        self.cursor.clone()
    }

    fn status(&self) -> ServerStatus {
        *self.status.borrow()
    }

    fn checkpoint(&self) -> Option<CheckpointId> {
        self.checkpoint.get().copied()
    }

    fn in_flight(&self) -> Option<Snapshot> {
        *self.in_flight.lock()
    }

    fn blocks_encrypted(&self) -> u64 {
        self.blocks_encrypted.load(Ordering::Relaxed)
    }

    async fn wait_idle_after(&self, epoch: u64) -> CipherResult<ServerStatus> {
        let mut rx = self.status.subscribe();
        let status = rx
            .wait_for(|status| status.idle_epoch > epoch)
            .await
            .map_err(|_| CipherError::ServerStopped)?;
        Ok(*status)
    }
}

/// How one request ended.
enum Served {
    Completed,
    Rejected(ProtocolViolation),
    Restored(CheckpointId),
}

/// One cipher server instance. Consumed by [`CipherServer::run`].
pub struct CipherServer<K: Kernel> {
    kernel: Arc<K>,
    engine: CbcEngine,
    config: ServerConfig,
    writer: CursorWriter,
    handle: Arc<ServerHandle>,
}

impl<K: Kernel> CipherServer<K> {
    /// Create a server that runs as `thread` over `region`.
    pub fn new(
        kernel: Arc<K>,
        thread: ThreadId,
        key: &CipherKey,
        config: ServerConfig,
        region: Arc<SharedRegion>,
    ) -> Self {
        let (writer, cursor) = double_buffered_cursor();
        let (status, _) = watch::channel(ServerStatus::default());
        let handle = Arc::new(ServerHandle {
            thread,
            cursor,
            region,
            status,
            checkpoint: OnceLock::new(),
            in_flight: Mutex::new(None),
            blocks_encrypted: AtomicU64::new(0),
        });
        Self {
            kernel,
            engine: CbcEngine::new(key),
            config,
            writer,
            handle,
        }
    }

    pub fn handle(&self) -> Arc<ServerHandle> {
        self.handle.clone()
    }

    /// Serve requests until a kernel primitive fails.
    pub async fn run(mut self) -> CipherResult<()> {
        let thread = self.handle.thread;
        let result = self.serve_forever().await;
        if let Err(e) = &result {
            error!(%thread, error = %e, "Cipher server stopped on fatal error");
        }
        result
    }

    async fn serve_forever(&mut self) -> CipherResult<()> {
        let thread = self.handle.thread;
        let checkpoint = self.kernel.checkpoint_save(thread)?;
        let _ = self.handle.checkpoint.set(checkpoint);
        self.handle.enter_idle(|_| {});
        info!(%thread, %checkpoint, "Cipher server idle");

        loop {
            let request = self.kernel.recv(thread).await?;

            match self.serve(&request).await? {
                Served::Completed => {
                    self.writer.retire();
                    self.handle.enter_idle(|status| status.completed += 1);
                    metric_inc!(REQUESTS, &["completed"]);
                    if !self.kernel.reply(thread, Ok(Reply::success()))? {
                        warn!(%thread, "Reply cap revoked before completion reply");
                    }
                }
                Served::Rejected(violation) => {
                    warn!(%thread, %violation, "Request rejected");
                    self.writer.retire();
                    self.handle.enter_idle(|status| status.rejected += 1);
                    metric_inc!(REQUESTS, &["rejected"]);
                    self.kernel.reply(thread, Err(violation))?;
                }
                Served::Restored(checkpoint) => {
                    info!(%thread, %checkpoint, "Restored to checkpoint, request abandoned");
                    self.writer.retire();
                    self.handle.enter_idle(|status| status.restored += 1);
                    metric_inc!(REQUESTS, &["restored"]);
                }
            }
        }
    }

    async fn serve(&mut self, request: &Request) -> CipherResult<Served> {
        let thread = self.handle.thread;
        let defaults = RequestDefaults {
            iv: self.config.iv,
            region_len: self.handle.region.len(),
        };
        let initial = match initial_snapshot(request, &defaults) {
            Ok(snapshot) => snapshot,
            Err(violation) => return Ok(Served::Rejected(violation)),
        };

        self.handle.begin(initial);
        self.writer.publish(initial);
        info!(
            %thread,
            fresh = request.is_fresh(),
            blocks = initial.blocks_remaining(),
            "Request started"
        );

        loop {
            let Some(snapshot) = self.writer.current() else {
                return Err(CipherError::ServerStopped);
            };
            if snapshot.is_complete() {
                info!(%thread, blocks = initial.blocks_remaining(), "Request complete");
                return Ok(Served::Completed);
            }

            if let Resumption::Restore(checkpoint) = self
                .kernel
                .charge(thread, self.config.charge_per_block)
                .await?
            {
                return Ok(Served::Restored(checkpoint));
            }

            let out_of_bounds = ProtocolViolation::OutOfBounds {
                cursor: snapshot.plaintext_cursor,
                remaining: snapshot.remaining,
                region: self.handle.region.len(),
            };
            let Some(plaintext) = self.handle.region.read_block(snapshot.plaintext_cursor)
            else {
                return Ok(Served::Rejected(out_of_bounds));
            };
            let (ciphertext, next_vector) = self.engine.encrypt_block(&snapshot.vector, &plaintext);
            if !self
                .handle
                .region
                .write_block(snapshot.ciphertext_cursor, &ciphertext)
            {
                return Ok(Served::Rejected(out_of_bounds));
            }

            let next = snapshot.advance(next_vector);
            self.writer.publish(next);
            self.handle.blocks_encrypted.fetch_add(1, Ordering::Relaxed);
            metric_inc!(BLOCKS_ENCRYPTED);
            debug!(%thread, remaining = next.remaining, "Block published");
        }
    }
}
