//! # Integration Flows
//!
//! A real cipher server and recovery controller over the simulated kernel.
//! Faults are driven one at a time with `handle_next_fault`, so each test
//! controls exactly when recovery runs.

pub mod cipher_flows;
pub mod recovery_flows;
pub mod runtime_flows;

#[cfg(test)]
pub(crate) mod harness {
    use cs_01_cipher_server::{
        CipherClient, CipherServer, CipherServerApi, ServerConfig, ServerHandle, SharedRegion,
    };
    use cs_02_budget_recovery::{RecoveryConfig, RecoveryController, RecoveryPolicy};
    use shared_crypto::CipherKey;
    use shared_types::{Block, BudgetGrant, SchedContextId, SchedulingPort, BLOCK_SIZE};
    use sim_kernel::SimKernel;
    use std::sync::Arc;
    use std::time::Duration;

    pub const DEADLINE: Duration = Duration::from_secs(5);

    /// NIST SP 800-38A, F.2.5 CBC-AES256.Encrypt.
    pub mod nist {
        pub const KEY: &str = "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4";
        pub const IV: &str = "000102030405060708090a0b0c0d0e0f";
        pub const PLAINTEXT: [&str; 4] = [
            "6bc1bee22e409f96e93d7e117393172a",
            "ae2d8a571e03ac9c9eb76fac45af8e51",
            "30c81c46a35ce411e5fbc1191a0a52ef",
            "f69f2445df4f9b17ad2b417be66c3710",
        ];
        pub const CIPHERTEXT: [&str; 4] = [
            "f58c4c04d6e5f1ba779eabfb5f7bfbd6",
            "9cfc4e967edb808d679f777bc6702c7d",
            "39f23369a9d9bacfa530e26304231461",
            "b2eb05e2c39be9fcda6c19078c6a9d1b",
        ];
    }

    pub fn nist_key() -> CipherKey {
        CipherKey::from_slice(&hex::decode(nist::KEY).unwrap()).unwrap()
    }

    pub fn nist_iv() -> Block {
        hex::decode(nist::IV).unwrap().try_into().unwrap()
    }

    /// `blocks` distinct plaintext blocks.
    pub fn blocks(blocks: usize) -> Vec<u8> {
        (0..blocks * BLOCK_SIZE).map(|i| (i * 7 + 3) as u8).collect()
    }

    pub struct Harness {
        pub kernel: Arc<SimKernel>,
        pub server: Arc<ServerHandle>,
        pub server_context: Option<SchedContextId>,
        pub key: CipherKey,
        pub iv: Block,
    }

    impl Harness {
        /// Server with no context of its own.
        pub fn passive(key: CipherKey, iv: Block) -> Self {
            Self::start(key, iv, None)
        }

        /// Server bound to its own context with `grant`.
        pub fn active(key: CipherKey, iv: Block, grant: BudgetGrant) -> Self {
            Self::start(key, iv, Some(grant))
        }

        fn start(key: CipherKey, iv: Block, grant: Option<BudgetGrant>) -> Self {
            let kernel = Arc::new(SimKernel::new());
            let thread = kernel.create_thread("cipher-server");
            let server_context = grant.map(|grant| {
                let context = kernel.create_sched_context(grant).unwrap();
                kernel.bind(context, thread).unwrap();
                context
            });

            let server = CipherServer::new(
                kernel.clone(),
                thread,
                &key,
                ServerConfig {
                    iv,
                    ..ServerConfig::default()
                },
                Arc::new(SharedRegion::new()),
            );
            let handle = server.handle();
            tokio::spawn(server.run());

            Self {
                kernel,
                server: handle,
                server_context,
                key,
                iv,
            }
        }

        /// New client thread bound to a fresh context.
        pub fn client(&self, name: &str, grant: BudgetGrant) -> (CipherClient<SimKernel>, SchedContextId) {
            let thread = self.kernel.create_thread(name);
            let context = self.kernel.create_sched_context(grant).unwrap();
            self.kernel.bind(context, thread).unwrap();
            (
                CipherClient::new(self.kernel.clone(), thread, self.server.clone()),
                context,
            )
        }

        pub fn controller(&self, config: RecoveryConfig) -> RecoveryController<SimKernel> {
            RecoveryController::new(self.kernel.clone(), self.server.clone(), config).unwrap()
        }

        pub fn policy_controller(&self, policy: RecoveryPolicy) -> RecoveryController<SimKernel> {
            self.controller(RecoveryConfig {
                policy,
                ..RecoveryConfig::default()
            })
        }

        pub fn server_thread(&self) -> shared_types::ThreadId {
            self.server.thread()
        }
    }
}
