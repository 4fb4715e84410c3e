//! # Runtime Flows
//!
//! Whole deployments built from environment-style configuration, one per
//! policy, over the same workload.

#[cfg(test)]
mod tests {
    use bench_runtime::{Deployment, RuntimeConfig};
    use cs_02_budget_recovery::RecoveryPolicy;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> RuntimeConfig {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        RuntimeConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap()
    }

    fn workload(policy: &str) -> RuntimeConfig {
        config(&[
            ("CS_POLICY", policy),
            ("CS_CLIENTS", "3"),
            ("CS_REQUESTS", "2"),
            ("CS_REQUEST_BLOCKS", "10"),
            ("CS_BUDGET", "4"),
            ("CS_SERVER_BUDGET", "6"),
            ("CS_MAX_ATTEMPTS", "2"),
            ("CS_KEY", "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4"),
        ])
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_progress_keeping_policies_complete_every_job() {
        for policy in ["emergency", "extend"] {
            let config = workload(policy);
            let deployment = Deployment::start(&config).unwrap();
            let report = deployment
                .run_workload(&config.workload, &config.cipher)
                .await
                .unwrap();
            let stats = deployment.shutdown().await.unwrap();

            assert_eq!(report.jobs, 6, "{policy}");
            assert_eq!(report.completed, 6, "{policy}");
            assert_eq!(report.failure_replies, 0, "{policy}");
            assert_eq!(report.corrupted, 0, "{policy}");
            assert_eq!(report.blocks_encrypted, 60, "{policy}");
            assert!(stats.faults >= 6, "{policy}: {stats:?}");
            assert_eq!(stats.ignored, 0, "{policy}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rollback_starves_jobs_larger_than_budget() {
        let config = workload("rollback");
        assert_eq!(config.policy, RecoveryPolicy::Rollback);
        let deployment = Deployment::start(&config).unwrap();
        let report = deployment
            .run_workload(&config.workload, &config.cipher)
            .await
            .unwrap();
        let stats = deployment.shutdown().await.unwrap();

        assert_eq!(report.completed, 0);
        assert_eq!(report.gave_up, 6);
        assert_eq!(report.failure_replies, 12);
        assert_eq!(stats.rolled_back, 12);
        // Four blocks per attempt, every one of them discarded.
        assert_eq!(report.blocks_encrypted, 12 * 4);
    }
}
