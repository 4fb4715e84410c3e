//! # Recovery Flows
//!
//! One budget fault per scenario, handled by each policy:
//!
//! | Scenario | Policy | Client sees | Progress |
//! |----------|--------|-------------|----------|
//! | B | Rollback | `remaining = original_length` | discarded |
//! | C | Emergency | success | kept |
//! | D | Extend | success | kept |

#[cfg(test)]
mod tests {
    use super::super::harness::{blocks, nist_iv, nist_key, Harness, DEADLINE};
    use cs_01_cipher_server::CipherServerApi;
    use cs_02_budget_recovery::{
        ExtendConfig, IgnoreReason, RecoveryApi, RecoveryConfig, RecoveryError, RecoveryOutcome,
        RecoveryPolicy,
    };
    use shared_crypto::cbc_encrypt;
    use shared_types::{
        BudgetGrant, FaultEvent, FaultPort, IpcPort, Reply, SchedulingPort, BLOCK_SIZE,
    };
    use sim_kernel::ParkReason;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time::timeout;

    fn extend_config(base: BudgetGrant, increment: u64, ceiling: u64) -> RecoveryConfig {
        RecoveryConfig {
            policy: RecoveryPolicy::Extend,
            extend: ExtendConfig {
                base,
                increment,
                ceiling,
            },
            ..RecoveryConfig::default()
        }
    }

    // =============================================================================
    // SCENARIO B: ROLLBACK
    // =============================================================================

    #[tokio::test]
    async fn test_rollback_reports_full_length_then_fresh_request_succeeds() {
        let h = Harness::passive(nist_key(), nist_iv());
        let recovery = h
            .kernel
            .create_sched_context(BudgetGrant::new(16, 16))
            .unwrap();
        let controller = h
            .policy_controller(RecoveryPolicy::Rollback)
            .with_recovery_context(recovery);
        let (client, context) = h.client("client", BudgetGrant::new(4, 16));
        let plaintext = blocks(10);

        let call = {
            let client = client.clone();
            let plaintext = plaintext.clone();
            tokio::spawn(async move { client.submit(&plaintext).await })
        };
        let outcome = timeout(DEADLINE, controller.handle_next_fault())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            outcome,
            RecoveryOutcome::RolledBack {
                client: Some(client.thread()),
                original_length: 10 * BLOCK_SIZE,
                discarded_blocks: 4,
            }
        );
        let reply = call.await.unwrap().unwrap();
        assert_eq!(reply, Reply::failure(10 * BLOCK_SIZE));
        assert!(!reply.is_success());

        // Server is idle and passive again; the client has its context back.
        let status = h.server.status();
        assert!(!status.is_busy());
        assert_eq!(status.restored, 1);
        assert_eq!(h.server.read_active(), None);
        assert_eq!(h.kernel.bound_context(h.server_thread()).unwrap(), None);
        assert_eq!(h.kernel.bound_context(client.thread()).unwrap(), Some(context));

        h.kernel
            .configure(context, BudgetGrant::new(16, 16))
            .unwrap();
        let reply = timeout(DEADLINE, client.submit(&plaintext))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, Reply::success());
        assert_eq!(
            h.server.region().ciphertext(),
            cbc_encrypt(&h.key, &h.iv, &plaintext).unwrap()
        );
    }

    #[tokio::test]
    async fn test_rollback_of_idle_server_sends_no_second_reply() {
        let h = Harness::passive(nist_key(), nist_iv());
        let recovery = h
            .kernel
            .create_sched_context(BudgetGrant::new(16, 16))
            .unwrap();
        let controller = h
            .policy_controller(RecoveryPolicy::Rollback)
            .with_recovery_context(recovery);
        let (client, context) = h.client("client", BudgetGrant::new(2, 16));

        let call = {
            let client = client.clone();
            tokio::spawn(async move { client.submit(&blocks(4)).await })
        };
        timeout(DEADLINE, controller.handle_next_fault())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(call.await.unwrap().unwrap(), Reply::failure(4 * BLOCK_SIZE));

        // The same fault again, after the server is back at its receive point.
        let stale = FaultEvent {
            thread: h.server_thread(),
            sched_context: context,
            caller: Some(client.thread()),
        };
        let outcome = controller.handle_fault(stale).await.unwrap();
        assert_eq!(outcome, RecoveryOutcome::Ignored(IgnoreReason::ServerIdle));
        assert_eq!(h.kernel.revoke_reply(h.server_thread()).unwrap(), None);

        let stats = controller.stats();
        assert_eq!(stats.faults, 2);
        assert_eq!(stats.rolled_back, 1);
        assert_eq!(stats.ignored, 1);
    }

    // =============================================================================
    // SCENARIO C: EMERGENCY DONATION
    // =============================================================================

    #[tokio::test]
    async fn test_emergency_donation_keeps_progress() {
        let h = Harness::active(nist_key(), nist_iv(), BudgetGrant::new(4, 16));
        let server_context = h.server_context.unwrap();
        let controller = h.policy_controller(RecoveryPolicy::Emergency);
        let (client, client_context) = h.client("client", BudgetGrant::new(8, 16));
        let plaintext = blocks(10);

        let call = {
            let client = client.clone();
            let plaintext = plaintext.clone();
            tokio::spawn(async move { client.submit(&plaintext).await })
        };
        let outcome = timeout(DEADLINE, controller.handle_next_fault())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            outcome,
            RecoveryOutcome::Donated {
                client: client.thread(),
                forced: false,
            }
        );
        assert_eq!(call.await.unwrap().unwrap(), Reply::success());
        assert_eq!(h.server.blocks_encrypted(), 10);
        assert_eq!(h.server.status().restored, 0);
        assert_eq!(
            h.server.region().ciphertext(),
            cbc_encrypt(&h.key, &h.iv, &plaintext).unwrap()
        );

        // Four blocks on the server's budget, six on the client's.
        assert_eq!(h.kernel.remaining_budget(server_context).unwrap(), 0);
        assert_eq!(h.kernel.remaining_budget(client_context).unwrap(), 2);
        assert_eq!(
            h.kernel.bound_context(h.server_thread()).unwrap(),
            Some(server_context)
        );
        assert_eq!(
            h.kernel.bound_context(client.thread()).unwrap(),
            Some(client_context)
        );
    }

    #[tokio::test]
    async fn test_force_done_with_no_donation_running_is_dropped() {
        let h = Harness::active(nist_key(), nist_iv(), BudgetGrant::new(4, 16));
        let controller = h.policy_controller(RecoveryPolicy::Emergency);
        let (client, client_context) = h.client("client", BudgetGrant::new(8, 16));
        let plaintext = blocks(10);

        // Nothing is on loan yet, so this must not end the next donation.
        controller.force_done();
        let call = {
            let client = client.clone();
            let plaintext = plaintext.clone();
            tokio::spawn(async move { client.submit(&plaintext).await })
        };

        let outcome = timeout(DEADLINE, controller.handle_next_fault())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            outcome,
            RecoveryOutcome::Donated {
                client: client.thread(),
                forced: false,
            }
        );
        assert_eq!(call.await.unwrap().unwrap(), Reply::success());
        assert_eq!(h.server.blocks_encrypted(), 10);
        assert_eq!(h.kernel.remaining_budget(client_context).unwrap(), 2);
        assert_eq!(controller.stats().donated, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_force_done_during_donation_returns_loan_early_without_losing_work() {
        const JOB: usize = 1 << 15;
        const CLIENT_BUDGET: u64 = 1 << 16;
        let h = Harness::active(nist_key(), nist_iv(), BudgetGrant::new(4, 16));
        let server_context = h.server_context.unwrap();
        let controller = Arc::new(h.policy_controller(RecoveryPolicy::Emergency));
        let (client, client_context) =
            h.client("client", BudgetGrant::new(CLIENT_BUDGET, CLIENT_BUDGET));
        let plaintext = blocks(JOB);

        let call = {
            let client = client.clone();
            let plaintext = plaintext.clone();
            tokio::spawn(async move { client.submit(&plaintext).await })
        };
        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.handle_next_fault().await })
        };

        // The client's context leaves it only while lent to the server.
        timeout(DEADLINE, async {
            while h.kernel.bound_context(client.thread()).unwrap().is_some() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        controller.force_done();

        let first = timeout(DEADLINE, first).await.unwrap().unwrap().unwrap();
        assert_eq!(
            first,
            RecoveryOutcome::Donated {
                client: client.thread(),
                forced: true,
            }
        );
        assert!(h.server.status().is_busy());

        // Back on its own empty context the server faults again.
        let second = timeout(DEADLINE, controller.handle_next_fault())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            second,
            RecoveryOutcome::Donated {
                client: client.thread(),
                forced: false,
            }
        );

        assert_eq!(call.await.unwrap().unwrap(), Reply::success());
        assert_eq!(h.server.blocks_encrypted(), JOB as u64);
        assert_eq!(
            h.server.region().ciphertext(),
            cbc_encrypt(&h.key, &h.iv, &plaintext).unwrap()
        );
        // Four blocks on the server's budget, the rest across both loans.
        assert_eq!(h.kernel.remaining_budget(server_context).unwrap(), 0);
        assert_eq!(
            h.kernel.remaining_budget(client_context).unwrap(),
            CLIENT_BUDGET - (JOB as u64 - 4)
        );
        assert_eq!(
            h.kernel.bound_context(h.server_thread()).unwrap(),
            Some(server_context)
        );
        assert_eq!(
            h.kernel.bound_context(client.thread()).unwrap(),
            Some(client_context)
        );
    }

    #[tokio::test]
    async fn test_second_fault_on_donated_budget_is_fatal() {
        let h = Harness::active(nist_key(), nist_iv(), BudgetGrant::new(4, 16));
        let controller = h.policy_controller(RecoveryPolicy::Emergency);
        let (client, client_context) = h.client("client", BudgetGrant::new(2, 16));

        let call = {
            let client = client.clone();
            tokio::spawn(async move { client.submit(&blocks(10)).await })
        };
        let err = timeout(DEADLINE, controller.handle_next_fault())
            .await
            .unwrap()
            .unwrap_err();

        assert_eq!(
            err,
            RecoveryError::DonatedBudgetExhausted {
                server: h.server_thread(),
                client: client.thread(),
            }
        );
        // Four blocks on its own budget, two on the client's.
        assert_eq!(h.server.blocks_encrypted(), 6);
        assert_eq!(h.kernel.remaining_budget(client_context).unwrap(), 0);
        call.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_foreign_fault_during_donation_is_skipped() {
        const JOB: usize = 1 << 15;
        const CLIENT_BUDGET: u64 = 1 << 16;
        let h = Harness::active(nist_key(), nist_iv(), BudgetGrant::new(4, 16));
        let controller = Arc::new(h.policy_controller(RecoveryPolicy::Emergency));
        let (client, _) = h.client("client", BudgetGrant::new(CLIENT_BUDGET, CLIENT_BUDGET));
        let other = h.kernel.create_thread("other");
        let other_context = h
            .kernel
            .create_sched_context(BudgetGrant::new(1, 16))
            .unwrap();
        h.kernel.bind(other_context, other).unwrap();

        let call = {
            let client = client.clone();
            tokio::spawn(async move { client.submit(&blocks(JOB)).await })
        };
        let donation = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.handle_next_fault().await })
        };

        timeout(DEADLINE, async {
            while h.kernel.bound_context(client.thread()).unwrap().is_some() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        let stray = {
            let kernel = h.kernel.clone();
            tokio::spawn(async move { kernel.charge(other, 2).await })
        };

        let outcome = timeout(DEADLINE, donation).await.unwrap().unwrap().unwrap();
        assert_eq!(
            outcome,
            RecoveryOutcome::Donated {
                client: client.thread(),
                forced: false,
            }
        );
        assert_eq!(call.await.unwrap().unwrap(), Reply::success());
        assert_eq!(h.server.blocks_encrypted(), JOB as u64);
        assert_eq!(
            h.kernel.park_reason(other).unwrap(),
            Some(ParkReason::BudgetExhausted)
        );
        // The foreign fault was consumed by the donation, not left queued.
        assert!(
            timeout(Duration::from_millis(50), h.kernel.fault_wait())
                .await
                .is_err()
        );
        stray.abort();
    }

    // =============================================================================
    // SCENARIO D: EXTEND
    // =============================================================================

    #[tokio::test]
    async fn test_extend_grants_increment_and_resets_on_job_complete() {
        let h = Harness::passive(nist_key(), nist_iv());
        let base = BudgetGrant::new(4, 16);
        let controller = h.controller(extend_config(base, 2, 16));
        let (client, context) = h.client("client", base);
        let plaintext = blocks(10);

        let call = {
            let client = client.clone();
            let plaintext = plaintext.clone();
            tokio::spawn(async move { client.submit(&plaintext).await })
        };
        let outcome = timeout(DEADLINE, controller.handle_next_fault())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            outcome,
            RecoveryOutcome::Extended {
                client: client.thread(),
                grant: BudgetGrant::new(6, 16),
                at_ceiling: false,
            }
        );
        assert_eq!(call.await.unwrap().unwrap(), Reply::success());
        assert_eq!(
            h.server.region().ciphertext(),
            cbc_encrypt(&h.key, &h.iv, &plaintext).unwrap()
        );
        assert_eq!(controller.granted_budget(client.thread()), 6);
        assert_eq!(h.kernel.grant(context).unwrap(), BudgetGrant::new(6, 16));

        controller.job_complete(client.thread()).unwrap();
        assert_eq!(controller.granted_budget(client.thread()), 4);
        assert_eq!(h.kernel.grant(context).unwrap(), base);
        assert_eq!(h.kernel.remaining_budget(context).unwrap(), 4);
    }

    #[tokio::test]
    async fn test_extend_saturates_at_ceiling() {
        let h = Harness::passive(nist_key(), nist_iv());
        let base = BudgetGrant::new(4, 8);
        let controller = h.controller(extend_config(base, 2, 6));
        let (client, _) = h.client("client", base);

        let call = {
            let client = client.clone();
            tokio::spawn(async move { client.submit(&blocks(16)).await })
        };

        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let outcome = timeout(DEADLINE, controller.handle_next_fault())
                .await
                .unwrap()
                .unwrap();
            outcomes.push(outcome);
        }

        assert_eq!(
            outcomes,
            vec![
                RecoveryOutcome::Extended {
                    client: client.thread(),
                    grant: BudgetGrant::new(6, 8),
                    at_ceiling: false,
                },
                RecoveryOutcome::Extended {
                    client: client.thread(),
                    grant: BudgetGrant::new(6, 8),
                    at_ceiling: true,
                },
            ]
        );
        assert_eq!(call.await.unwrap().unwrap(), Reply::success());
        assert_eq!(h.server.blocks_encrypted(), 16);
    }

    #[tokio::test]
    async fn test_extend_tracks_each_client_separately() {
        let h = Harness::passive(nist_key(), nist_iv());
        let base = BudgetGrant::new(4, 16);
        let controller = h.controller(extend_config(base, 2, 16));
        let (alice, _) = h.client("alice", base);
        let (bob, _) = h.client("bob", base);

        // Round 1: alice then bob, one fault each.
        for (client, length) in [(&alice, 10), (&bob, 6)] {
            let call = {
                let client = client.clone();
                tokio::spawn(async move { client.submit(&blocks(length)).await })
            };
            timeout(DEADLINE, controller.handle_next_fault())
                .await
                .unwrap()
                .unwrap();
            assert!(call.await.unwrap().unwrap().is_success());
        }
        assert_eq!(controller.granted_budget(alice.thread()), 6);
        assert_eq!(controller.granted_budget(bob.thread()), 6);

        // Round 2: alice has not completed her job, so her grant keeps growing.
        h.kernel.next_period();
        let call = {
            let alice = alice.clone();
            tokio::spawn(async move { alice.submit(&blocks(10)).await })
        };
        let outcome = timeout(DEADLINE, controller.handle_next_fault())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            outcome,
            RecoveryOutcome::Extended {
                client: alice.thread(),
                grant: BudgetGrant::new(8, 16),
                at_ceiling: false,
            }
        );
        assert!(call.await.unwrap().unwrap().is_success());

        controller.job_complete(alice.thread()).unwrap();
        assert_eq!(controller.granted_budget(alice.thread()), 4);
        assert_eq!(controller.granted_budget(bob.thread()), 6);
    }

    // =============================================================================
    // CONTROLLER LOOP
    // =============================================================================

    #[tokio::test]
    async fn test_run_loop_handles_faults_until_shutdown() {
        let h = Harness::passive(nist_key(), nist_iv());
        let base = BudgetGrant::new(4, 16);
        let controller = Arc::new(h.controller(extend_config(base, 4, 16)));
        let (client, _) = h.client("client", base);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run(shutdown_rx).await })
        };

        let reply = timeout(DEADLINE, client.submit(&blocks(12)))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.is_success());

        shutdown_tx.send(true).unwrap();
        let stats = timeout(DEADLINE, task).await.unwrap().unwrap().unwrap();
        // 4 blocks, fault, 8 more on the extended grant.
        assert_eq!(stats.faults, 1);
        assert_eq!(stats.extended, 1);
    }
}
