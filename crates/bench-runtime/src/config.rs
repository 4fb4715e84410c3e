//! # Runtime Configuration
//!
//! Workload, budget and cipher parameters for one benchmark run.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CS_POLICY` | `extend` | `rollback`, `emergency` or `extend` |
//! | `CS_CLIENTS` | `2` | Client threads, served round-robin |
//! | `CS_REQUESTS` | `4` | Jobs per client |
//! | `CS_REQUEST_BLOCKS` | `8` | Blocks per job after padding |
//! | `CS_MAX_ATTEMPTS` | `3` | Submissions per job before giving up |
//! | `CS_REQUEST_TIMEOUT_MS` | `5000` | Per-call reply deadline |
//! | `CS_BUDGET` / `CS_PERIOD` | `6` / `16` | Client scheduling grant |
//! | `CS_SERVER_BUDGET` | `4` | Server's own budget (emergency only) |
//! | `CS_RECOVERY_BUDGET` | `16` | Budget lent by rollback |
//! | `CS_EXTEND_INCREMENT` / `CS_EXTEND_CEILING` | `2` / `16` | Extend steps |
//! | `CS_KEY` | random | 64 hex chars |
//! | `CS_IV` | zero | 32 hex chars |

use cs_02_budget_recovery::{ExtendConfig, RecoveryConfig, RecoveryError, RecoveryPolicy};
use shared_crypto::{CipherKey, CryptoError};
use shared_types::{Block, BudgetGrant, BLOCK_SIZE};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name}: cannot parse {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{name} must be at least 1")]
    Zero { name: &'static str },

    #[error("{name} grant {grant} is not 0 < budget <= period")]
    InvalidGrant { name: &'static str, grant: BudgetGrant },

    #[error("{name}: {source}")]
    InvalidHex {
        name: &'static str,
        source: hex::FromHexError,
    },

    #[error("CS_IV must be 16 bytes, got {0}")]
    IvLength(usize),

    #[error("invalid key: {0}")]
    Key(#[from] CryptoError),

    #[error("invalid recovery parameters: {0}")]
    Recovery(#[from] RecoveryError),

    #[error(
        "emergency donation cannot finish a job: server budget {server} + client budget {client} < {blocks} blocks"
    )]
    InsufficientDonation { server: u64, client: u64, blocks: usize },
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub policy: RecoveryPolicy,
    pub workload: WorkloadConfig,
    pub budget: BudgetConfig,
    pub cipher: CipherConfig,
}

/// What the clients submit.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub clients: usize,
    /// Jobs per client.
    pub requests: usize,
    /// Blocks per job, after padding.
    pub request_blocks: usize,
    /// Submissions per job before it is counted as given up.
    pub max_attempts: usize,
    pub request_timeout: Duration,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            clients: 2,
            requests: 4,
            request_blocks: 8,
            max_attempts: 3,
            request_timeout: Duration::from_millis(5_000),
        }
    }
}

impl WorkloadConfig {
    /// Plaintext length that pads to exactly `request_blocks` blocks.
    pub fn plaintext_len(&self) -> usize {
        self.request_blocks * BLOCK_SIZE - 1
    }
}

/// Scheduling grants.
#[derive(Debug, Clone)]
pub struct BudgetConfig {
    /// Each client's own context.
    pub client: BudgetGrant,
    /// The server's own context; only bound under the emergency policy.
    pub server: BudgetGrant,
    /// Context lent to the server by rollback.
    pub recovery: BudgetGrant,
    pub extend_increment: u64,
    pub extend_ceiling: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            client: BudgetGrant::new(6, 16),
            server: BudgetGrant::new(4, 16),
            recovery: BudgetGrant::new(16, 16),
            extend_increment: 2,
            extend_ceiling: 16,
        }
    }
}

/// Key and IV.
#[derive(Debug, Clone)]
pub struct CipherConfig {
    pub key: CipherKey,
    pub iv: Block,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            key: CipherKey::generate(),
            iv: [0u8; BLOCK_SIZE],
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            policy: RecoveryPolicy::Extend,
            workload: WorkloadConfig::default(),
            budget: BudgetConfig::default(),
            cipher: CipherConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(policy) = parse(&lookup, "CS_POLICY")? {
            config.policy = policy;
        }

        let workload = &mut config.workload;
        if let Some(clients) = parse(&lookup, "CS_CLIENTS")? {
            workload.clients = clients;
        }
        if let Some(requests) = parse(&lookup, "CS_REQUESTS")? {
            workload.requests = requests;
        }
        if let Some(blocks) = parse(&lookup, "CS_REQUEST_BLOCKS")? {
            workload.request_blocks = blocks;
        }
        if let Some(attempts) = parse(&lookup, "CS_MAX_ATTEMPTS")? {
            workload.max_attempts = attempts;
        }
        if let Some(ms) = parse(&lookup, "CS_REQUEST_TIMEOUT_MS")? {
            workload.request_timeout = Duration::from_millis(ms);
        }

        let budget = &mut config.budget;
        let period = parse(&lookup, "CS_PERIOD")?.unwrap_or(budget.client.period);
        let client_budget = parse(&lookup, "CS_BUDGET")?.unwrap_or(budget.client.budget);
        budget.client = BudgetGrant::new(client_budget, period);
        if let Some(server_budget) = parse(&lookup, "CS_SERVER_BUDGET")? {
            budget.server = BudgetGrant::new(server_budget, budget.server.period.max(server_budget));
        }
        if let Some(recovery) = parse(&lookup, "CS_RECOVERY_BUDGET")? {
            budget.recovery = BudgetGrant::new(recovery, budget.recovery.period.max(recovery));
        }
        if let Some(increment) = parse(&lookup, "CS_EXTEND_INCREMENT")? {
            budget.extend_increment = increment;
        }
        if let Some(ceiling) = parse(&lookup, "CS_EXTEND_CEILING")? {
            budget.extend_ceiling = ceiling;
        }

        if let Some(key) = lookup("CS_KEY") {
            let bytes = hex::decode(key.trim()).map_err(|source| ConfigError::InvalidHex {
                name: "CS_KEY",
                source,
            })?;
            config.cipher.key = CipherKey::from_slice(&bytes)?;
        }
        if let Some(iv) = lookup("CS_IV") {
            let bytes = hex::decode(iv.trim()).map_err(|source| ConfigError::InvalidHex {
                name: "CS_IV",
                source,
            })?;
            config.cipher.iv = bytes
                .as_slice()
                .try_into()
                .map_err(|_| ConfigError::IvLength(bytes.len()))?;
        }

        Ok(config)
    }

    /// Reject configurations the deployment cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let workload = &self.workload;
        for (name, value) in [
            ("CS_CLIENTS", workload.clients),
            ("CS_REQUESTS", workload.requests),
            ("CS_REQUEST_BLOCKS", workload.request_blocks),
            ("CS_MAX_ATTEMPTS", workload.max_attempts),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { name });
            }
        }

        for (name, grant) in [
            ("client", self.budget.client),
            ("server", self.budget.server),
            ("recovery", self.budget.recovery),
        ] {
            if !grant.is_valid() {
                return Err(ConfigError::InvalidGrant { name, grant });
            }
        }
        self.recovery_config().validate()?;

        // A second fault while the client's context is lent out is fatal.
        if self.policy == RecoveryPolicy::Emergency {
            let server = self.budget.server.budget;
            let client = self.budget.client.budget;
            if server + client < workload.request_blocks as u64 {
                return Err(ConfigError::InsufficientDonation {
                    server,
                    client,
                    blocks: workload.request_blocks,
                });
            }
        }
        Ok(())
    }

    /// Recovery controller parameters.
    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            policy: self.policy,
            recovery_grant: self.budget.recovery,
            extend: ExtendConfig {
                base: self.budget.client,
                increment: self.budget.extend_increment,
                ceiling: self.budget.extend_ceiling,
            },
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
