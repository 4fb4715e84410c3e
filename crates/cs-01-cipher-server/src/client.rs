//! Client side of the request protocol.

use crate::domain::Snapshot;
use crate::error::{CipherError, CipherResult};
use crate::ports::inbound::CipherServerApi;
use crate::ports::outbound::Kernel;
use crate::service::ServerHandle;
use shared_crypto::pad;
use shared_types::{Reply, Request, ThreadId};
use std::sync::Arc;
use tracing::debug;

/// A thread that calls one cipher server.
pub struct CipherClient<K: Kernel> {
    kernel: Arc<K>,
    thread: ThreadId,
    server: Arc<ServerHandle>,
}

impl<K: Kernel> Clone for CipherClient<K> {
    fn clone(&self) -> Self {
        Self {
            kernel: self.kernel.clone(),
            thread: self.thread,
            server: self.server.clone(),
        }
    }
}

impl<K: Kernel> CipherClient<K> {
    pub fn new(kernel: Arc<K>, thread: ThreadId, server: Arc<ServerHandle>) -> Self {
        Self {
            kernel,
            thread,
            server,
        }
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    pub fn server(&self) -> &Arc<ServerHandle> {
        &self.server
    }

    /// Send `request` and validate the reply against the requested length.
    ///
    /// A non-zero `remaining` is returned as-is; callers decide whether to
    /// resubmit.
    pub async fn call(&self, request: Request) -> CipherResult<Reply> {
        let requested = match request.vector {
            None => self.server.region().len(),
            Some(_) => request.remaining,
        };
        debug!(client = %self.thread, requested, fresh = request.is_fresh(), "Calling cipher server");

        let reply = self
            .kernel
            .call(self.thread, self.server.thread(), request)
            .await??;
        reply.validate(requested)?;
        Ok(reply)
    }

    /// Load already padded plaintext into the region and request all of it.
    pub async fn submit(&self, plaintext: &[u8]) -> CipherResult<Reply> {
        let region = self.server.region();
        let _guard = region.lock_submit().await;
        region.load_plaintext(plaintext)?;
        self.call(Request::fresh()).await
    }

    /// Continue a job from a snapshot.
    pub async fn resume(&self, snapshot: &Snapshot) -> CipherResult<Reply> {
        self.call(snapshot.to_request()).await
    }

    /// Pad, encrypt and return the ciphertext. A failure report becomes
    /// [`CipherError::RequestFailed`].
    pub async fn encrypt(&self, plaintext: &[u8]) -> CipherResult<Vec<u8>> {
        let padded = pad(plaintext);
        let region = self.server.region();
        let _guard = region.lock_submit().await;
        region.load_plaintext(&padded)?;

        let reply = self.call(Request::fresh()).await?;
        if !reply.is_success() {
            return Err(CipherError::RequestFailed {
                remaining: reply.remaining,
                requested: padded.len(),
            });
        }
        Ok(region.ciphertext())
    }
}
