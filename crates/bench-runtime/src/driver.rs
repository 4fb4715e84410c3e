//! # Workload Driver
//!
//! Clients take turns, round-robin, each submitting one job per round. Every
//! attempt starts in a fresh scheduling period. A failure report (rollback)
//! is answered by resubmitting the whole job, up to `max_attempts` times.
//! A rejected request ends its job; a kernel failure ends the run.

use crate::config::{CipherConfig, WorkloadConfig};
use crate::deployment::{ClientSlot, Deployment};
use crate::error::{RuntimeError, RuntimeResult};
use cipher_telemetry::{time_histogram, REQUEST_DURATION};
use cs_01_cipher_server::CipherServerApi;
use cs_02_budget_recovery::{RecoveryApi, RecoveryPolicy, RecoveryStats};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use shared_crypto::{cbc_encrypt, pad};
use std::time::Instant;
use tracing::{debug, info, warn};

/// How one job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        attempts: usize,
        failures: usize,
        /// Ciphertext matched a reference CBC encryption.
        verified: bool,
    },
    GaveUp {
        attempts: usize,
    },
    /// The server refused the request; resubmitting would not help.
    Rejected {
        attempts: usize,
    },
}

/// Totals for one workload run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub policy: RecoveryPolicy,
    pub jobs: u64,
    pub completed: u64,
    pub gave_up: u64,
    pub rejected: u64,
    pub attempts: u64,
    /// Replies with `remaining > 0`.
    pub failure_replies: u64,
    /// Completed jobs whose ciphertext was wrong.
    pub corrupted: u64,
    pub blocks_encrypted: u64,
    pub elapsed_ms: u64,
    pub recovery: RecoveryStats,
}

impl RunReport {
    fn record(&mut self, outcome: JobOutcome) {
        self.jobs += 1;
        match outcome {
            JobOutcome::Completed {
                attempts,
                failures,
                verified,
            } => {
                self.completed += 1;
                self.attempts += attempts as u64;
                self.failure_replies += failures as u64;
                if !verified {
                    self.corrupted += 1;
                }
            }
            JobOutcome::GaveUp { attempts } => {
                self.gave_up += 1;
                self.attempts += attempts as u64;
                self.failure_replies += attempts as u64;
            }
            JobOutcome::Rejected { attempts } => {
                self.rejected += 1;
                self.attempts += attempts as u64;
                self.failure_replies += attempts.saturating_sub(1) as u64;
            }
        }
    }
}

impl Deployment {
    /// Run `workload.requests` rounds over every client.
    pub async fn run_workload(
        &self,
        workload: &WorkloadConfig,
        cipher: &CipherConfig,
    ) -> RuntimeResult<RunReport> {
        let started = Instant::now();
        let mut rng = StdRng::from_entropy();
        let mut report = RunReport {
            policy: self.policy,
            ..RunReport::default()
        };

        for round in 0..workload.requests {
            for slot in &self.clients {
                let mut plaintext = vec![0u8; workload.plaintext_len()];
                rng.fill_bytes(&mut plaintext);
                let outcome = self.run_job(slot, &plaintext, workload, cipher).await?;
                report.record(outcome);
            }
            debug!(round, completed = report.completed, "Round finished");
        }

        report.blocks_encrypted = self.server.blocks_encrypted();
        report.recovery = self.controller.stats();
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            policy = %self.policy,
            jobs = report.jobs,
            completed = report.completed,
            gave_up = report.gave_up,
            rejected = report.rejected,
            elapsed_ms = report.elapsed_ms,
            "Workload finished"
        );
        Ok(report)
    }

    async fn run_job(
        &self,
        slot: &ClientSlot,
        plaintext: &[u8],
        workload: &WorkloadConfig,
        cipher: &CipherConfig,
    ) -> RuntimeResult<JobOutcome> {
        let client = slot.client.thread();
        let expected = cbc_encrypt(&cipher.key, &cipher.iv, &pad(plaintext))?;
        let mut failures = 0;

        for attempt in 1..=workload.max_attempts {
            self.settle(workload.request_timeout).await?;
            self.kernel.next_period();

            let result = {
                let _timer = time_histogram!(REQUEST_DURATION, &[self.policy.as_str()]);
                tokio::time::timeout(workload.request_timeout, slot.client.encrypt(plaintext))
                    .await
                    .map_err(|_| RuntimeError::Timeout {
                        thread: client,
                        after: workload.request_timeout,
                    })?
            };

            match result {
                Ok(ciphertext) => {
                    self.controller.job_complete(client)?;
                    let verified = ciphertext == expected;
                    if !verified {
                        warn!(%client, attempt, "Ciphertext differs from reference encryption");
                    }
                    return Ok(JobOutcome::Completed {
                        attempts: attempt,
                        failures,
                        verified,
                    });
                }
                Err(e) if e.is_retryable() => {
                    failures += 1;
                    info!(%client, attempt, error = %e, "Request failed, resubmitting");
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(%client, attempt, error = %e, "Request rejected");
                    return Ok(JobOutcome::Rejected { attempts: attempt });
                }
            }
        }

        warn!(%client, attempts = workload.max_attempts, "Job abandoned");
        Ok(JobOutcome::GaveUp {
            attempts: workload.max_attempts,
        })
    }
}
