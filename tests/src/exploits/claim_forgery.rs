//! # Claim Forgery
//!
//! A peer that wants to inflate (or deflate) everyone's estimate has to get a
//! high-proximity claim accepted. These tests try the obvious shortcuts:
//!
//! - claim a proximity the key does not have
//! - edit a valid claim after signing
//! - swap in somebody else's key
//! - skimp on proof of work
//! - replay an old claim
//! - flood cheap low claims past the proximity pre-filter

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rsa::RsaPrivateKey;

    use nse_core::protocol::claim::{HEADER_LENGTH, SIGNATURE_LENGTH};
    use nse_core::test_utils::{fixture_key, second_fixture_key, third_fixture_key, FixedTimeSource};
    use nse_core::{
        build_claim, unpack_claim, BuildOptions, ClaimReceiver, EstimationConfig, GossipIngress,
        InMemoryRoundLedger, IngestOutcome, Rejection, UnpackOptions, ValidationFailure,
    };

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    // Fixture proximities at CLAIM_TIME (300 s rounds): node_a 4, node_b 8, node_c 1.
    const CLAIM_TIME: u64 = 1_700_009_000;
    const TEST_POW_BITS: u32 = 4;

    const STRICT: UnpackOptions = UnpackOptions {
        min_proximity: 0,
        proof_of_work_bits: TEST_POW_BITS,
    };

    fn build(key: &RsaPrivateKey, round_time: u64, proximity: Option<u8>) -> Vec<u8> {
        build_claim(
            key,
            round_time,
            BuildOptions {
                proximity,
                proof_of_work_bits: TEST_POW_BITS,
                hop_count: 0,
            },
        )
        .unwrap()
    }

    fn ingress(now: u64, config: EstimationConfig) -> (GossipIngress, Arc<InMemoryRoundLedger>) {
        let ledger = Arc::new(InMemoryRoundLedger::new());
        let ingress = GossipIngress::new(ledger.clone(), Arc::new(FixedTimeSource::new(now)), config);
        (ingress, ledger)
    }

    // =========================================================================
    // EXPLOIT TESTS: Forged proximity
    // =========================================================================

    #[test]
    fn test_inflated_proximity_rejected_despite_valid_signature() {
        // Properly signed and stamped, but the key only reaches 4 bits.
        let forged = build(&fixture_key(), CLAIM_TIME, Some(40));

        assert_eq!(
            unpack_claim(&forged, STRICT),
            Err(ValidationFailure::ProximityMismatch {
                claimed: 40,
                calculated: 4
            })
        );

        let (ingress, ledger) = ingress(CLAIM_TIME, EstimationConfig::for_testing());
        assert!(!ingress.receive_claim(&forged).unwrap().is_accepted());
        assert_eq!(ledger.round_count(), 0);
    }

    #[test]
    fn test_deflated_proximity_rejected() {
        let forged = build(&second_fixture_key(), CLAIM_TIME, Some(2));
        assert!(matches!(
            unpack_claim(&forged, STRICT),
            Err(ValidationFailure::ProximityMismatch {
                claimed: 2,
                calculated: 8
            })
        ));
    }

    #[test]
    fn test_proximity_byte_edited_after_signing() {
        let mut claim = build(&second_fixture_key(), CLAIM_TIME, None);
        claim[3] = 30;
        assert!(unpack_claim(&claim, STRICT).is_err());
    }

    // =========================================================================
    // EXPLOIT TESTS: Tampering and key substitution
    // =========================================================================

    #[test]
    fn test_hop_count_is_free_to_rewrite() {
        let mut claim = build(&fixture_key(), CLAIM_TIME, None);
        claim[1] = 0x12;
        claim[2] = 0x34;

        let unpacked = unpack_claim(&claim, STRICT).unwrap();
        assert_eq!(unpacked.hop_count, 0x1234);
        assert_eq!(unpacked.proximity, 4);
    }

    #[test]
    fn test_round_time_moved_after_signing() {
        let mut claim = build(&fixture_key(), CLAIM_TIME, None);
        // Last byte of round_time, inside the signed region.
        claim[13] ^= 0x01;
        assert!(unpack_claim(&claim, STRICT).is_err());
    }

    #[test]
    fn test_signature_bit_flip() {
        let mut claim = build(&fixture_key(), CLAIM_TIME, None);
        let last = claim.len() - 1;
        claim[last] ^= 0x80;
        assert_eq!(unpack_claim(&claim, STRICT), Err(ValidationFailure::InvalidSignature));
    }

    #[test]
    fn test_key_substitution_breaks_signature() {
        // Body and signature from node_c, key from node_b (same DER length).
        let victim = build(&second_fixture_key(), CLAIM_TIME, None);
        let mut forged = build(&third_fixture_key(), CLAIM_TIME, None);
        let key_range = HEADER_LENGTH..victim.len() - SIGNATURE_LENGTH;
        assert_eq!(forged.len(), victim.len());
        forged[key_range.clone()].copy_from_slice(&victim[key_range]);

        // The proximity byte still says 1, node_b's key says 8.
        assert!(unpack_claim(&forged, STRICT).is_err());
    }

    // =========================================================================
    // EXPLOIT TESTS: Proof of work
    // =========================================================================

    #[test]
    fn test_cheaper_proof_of_work_not_accepted() {
        let claim = build(&fixture_key(), CLAIM_TIME, None);
        let demanding = UnpackOptions {
            proof_of_work_bits: 24,
            ..STRICT
        };
        assert_eq!(
            unpack_claim(&claim, demanding),
            Err(ValidationFailure::InvalidProofOfWork { bits: 24 })
        );
    }

    #[test]
    fn test_nonce_edit_invalidates_claim() {
        let mut claim = build(&fixture_key(), CLAIM_TIME, None);
        // Last nonce byte.
        claim[21] ^= 0xff;
        assert!(unpack_claim(&claim, STRICT).is_err());
    }

    // =========================================================================
    // EXPLOIT TESTS: Replay and flooding
    // =========================================================================

    #[test]
    fn test_replay_of_previous_round_rejected() {
        let old = build(&second_fixture_key(), CLAIM_TIME, None);
        let (ingress, ledger) = ingress(CLAIM_TIME + 300, EstimationConfig::for_testing());

        assert!(matches!(
            ingress.receive_claim(&old).unwrap(),
            IngestOutcome::Rejected(Rejection::Stale { .. })
        ));
        assert_eq!(ledger.round_count(), 0);
    }

    #[test]
    fn test_replay_within_round_counted_once() {
        let claim = build(&second_fixture_key(), CLAIM_TIME, None);
        let (ingress, ledger) = ingress(CLAIM_TIME, EstimationConfig::for_testing());

        let verdicts: Vec<bool> = (0..5)
            .map(|_| ingress.receive_claim(&claim).unwrap().is_accepted())
            .collect();
        assert_eq!(verdicts, vec![true, false, false, false, false]);
        assert_eq!(ledger.round_count(), 1);
    }

    #[test]
    fn test_low_claims_dropped_by_prefilter() {
        let config = EstimationConfig {
            min_proximity: 5,
            ..EstimationConfig::for_testing()
        };
        let (ingress, ledger) = ingress(CLAIM_TIME, config);

        for key in [fixture_key(), third_fixture_key()] {
            let outcome = ingress.receive_claim(&build(&key, CLAIM_TIME, None)).unwrap();
            assert!(matches!(
                outcome,
                IngestOutcome::Rejected(Rejection::Invalid(ValidationFailure::ProximityTooLow { minimum: 5, .. }))
            ));
        }
        assert_eq!(ledger.round_count(), 0);

        let outcome = ingress
            .receive_claim(&build(&second_fixture_key(), CLAIM_TIME, None))
            .unwrap();
        assert!(outcome.is_accepted());
    }
}
