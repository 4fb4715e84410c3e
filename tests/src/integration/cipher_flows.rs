//! # Cipher Flows
//!
//! Request protocol end to end: known-answer encryption, budget boundary,
//! rejected requests, and continuing a job from a snapshot.

#[cfg(test)]
mod tests {
    use super::super::harness::{blocks, nist, nist_iv, nist_key, Harness, DEADLINE};
    use cs_01_cipher_server::{CipherError, CipherServerApi, Snapshot};
    use shared_crypto::{cbc_encrypt, CipherKey};
    use shared_types::{BudgetGrant, FaultPort, ProtocolViolation, Reply, Request, BLOCK_SIZE};
    use std::time::Duration;
    use tokio::time::timeout;

    // =============================================================================
    // SCENARIO A: FRESH REQUEST, NO FAULT
    // =============================================================================

    #[tokio::test]
    async fn test_three_blocks_match_known_answer() {
        let h = Harness::passive(nist_key(), nist_iv());
        let (client, context) = h.client("client", BudgetGrant::new(16, 16));

        let plaintext: Vec<u8> = nist::PLAINTEXT[..3]
            .iter()
            .flat_map(|block| hex::decode(block).unwrap())
            .collect();
        let reply = timeout(DEADLINE, client.submit(&plaintext))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reply, Reply::success());
        let expected: Vec<u8> = nist::CIPHERTEXT[..3]
            .iter()
            .flat_map(|block| hex::decode(block).unwrap())
            .collect();
        assert_eq!(h.server.region().ciphertext(), expected);
        assert_eq!(h.server.blocks_encrypted(), 3);
        // The passive server ran on the client's donated context.
        assert_eq!(h.kernel.remaining_budget(context).unwrap(), 13);
    }

    #[tokio::test]
    async fn test_budget_equal_to_block_count_completes_without_fault() {
        let h = Harness::passive(nist_key(), nist_iv());
        let (client, context) = h.client("client", BudgetGrant::new(5, 16));

        let reply = timeout(DEADLINE, client.submit(&blocks(5)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reply, Reply::success());
        assert_eq!(h.kernel.remaining_budget(context).unwrap(), 0);
        assert!(
            timeout(Duration::from_millis(50), h.kernel.fault_wait())
                .await
                .is_err(),
            "no fault may be raised when the budget covers every block exactly"
        );
    }

    #[tokio::test]
    async fn test_encrypt_pads_and_round_trips() {
        let key = CipherKey::from_bytes([0x5c; 32]);
        let h = Harness::passive(key.clone(), [0x0f; BLOCK_SIZE]);
        let (client, _) = h.client("client", BudgetGrant::new(64, 64));

        let message = b"the cursor is always safe to read";
        let ciphertext = timeout(DEADLINE, client.encrypt(message))
            .await
            .unwrap()
            .unwrap();

        let decrypted = shared_crypto::cbc_decrypt(&key, &[0x0f; BLOCK_SIZE], &ciphertext).unwrap();
        assert_eq!(shared_crypto::depad(&decrypted).unwrap(), message);
    }

    // =============================================================================
    // REJECTED REQUESTS
    // =============================================================================

    #[tokio::test]
    async fn test_misaligned_resume_is_rejected() {
        let h = Harness::passive(nist_key(), nist_iv());
        let (client, _) = h.client("client", BudgetGrant::new(16, 16));
        h.server.region().load_plaintext(&blocks(4)).unwrap();

        let err = timeout(
            DEADLINE,
            client.call(Request::resume(nist_iv(), 0, 0, 20)),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert_eq!(
            err,
            CipherError::Protocol(ProtocolViolation::Misaligned { remaining: 20 })
        );
        assert_eq!(h.server.blocks_encrypted(), 0);
        assert_eq!(h.server.status().rejected, 1);
        assert!(!h.server.status().is_busy());
    }

    #[tokio::test]
    async fn test_resume_past_region_end_is_rejected() {
        let h = Harness::passive(nist_key(), nist_iv());
        let (client, _) = h.client("client", BudgetGrant::new(16, 16));
        h.server.region().load_plaintext(&blocks(3)).unwrap();

        let err = timeout(
            DEADLINE,
            client.call(Request::resume(nist_iv(), 32, 32, 32)),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(
            err,
            CipherError::Protocol(ProtocolViolation::OutOfBounds { region: 48, .. })
        ));

        // The server keeps serving after a rejection.
        let reply = timeout(DEADLINE, client.submit(&blocks(3)))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.is_success());
    }

    // =============================================================================
    // RESUMED REQUEST
    // =============================================================================

    #[tokio::test]
    async fn test_resume_continues_chaining_from_snapshot() {
        let h = Harness::active(nist_key(), nist_iv(), BudgetGrant::new(100, 100));
        let (client, _) = h.client("client", BudgetGrant::new(16, 16));

        let plaintext = blocks(6);
        let full = cbc_encrypt(&h.key, &h.iv, &plaintext).unwrap();
        h.server.region().load_plaintext(&plaintext).unwrap();

        // As if the first three blocks had already been done.
        let mut vector = [0u8; BLOCK_SIZE];
        vector.copy_from_slice(&full[2 * BLOCK_SIZE..3 * BLOCK_SIZE]);
        let snapshot = Snapshot {
            vector,
            plaintext_cursor: 3 * BLOCK_SIZE,
            ciphertext_cursor: 3 * BLOCK_SIZE,
            remaining: 3 * BLOCK_SIZE,
        };

        let reply = timeout(DEADLINE, client.resume(&snapshot))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reply, Reply::success());
        assert_eq!(h.server.blocks_encrypted(), 3);
        let ciphertext = h.server.region().ciphertext();
        assert_eq!(&ciphertext[3 * BLOCK_SIZE..], &full[3 * BLOCK_SIZE..]);
        assert!(ciphertext[..3 * BLOCK_SIZE].iter().all(|b| *b == 0));
    }
}
