//! # Multi-Node Convergence Tests
//!
//! Several nodes, each with its own ledger, joined by an in-process relay that
//! floods every announced claim to every other node. Exercises the round
//! scheduler's suppression together with ingress on the receiving side.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use rsa::RsaPrivateKey;

    use nse_core::test_utils::{
        fixture_key, second_fixture_key, third_fixture_key, ControllableTimeSource, FixedTimeSource,
    };
    use nse_core::{
        build_claim, AnnounceError, Announcer, BuildOptions, ClaimReceiver, ControlResponder,
        Estimate, EstimateApi, EstimationConfig, GossipIngress, InMemoryRoundLedger,
        IngestOutcome, RoundLedger, RoundOutcome, RoundScheduler, TimeSource,
    };

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    // Fixture proximities at CLAIM_TIME (300 s rounds): node_a 4, node_b 8, node_c 1.
    const CLAIM_TIME: u64 = 1_700_009_000;

    // At ROUND_START (100 s rounds): node_a 12, node_b 4, node_c 1.
    const ROUND_FREQUENCY: u64 = 100;
    const ROUND_START: u64 = 1_700_195_300;
    const ROUND: i64 = 17_001_953;

    struct TestNode {
        ledger: Arc<InMemoryRoundLedger>,
        ingress: GossipIngress,
        responder: ControlResponder,
    }

    impl TestNode {
        fn new(time_source: Arc<dyn TimeSource>, config: EstimationConfig) -> Arc<Self> {
            let ledger = Arc::new(InMemoryRoundLedger::new());
            Arc::new(Self {
                ingress: GossipIngress::new(ledger.clone(), time_source.clone(), config),
                responder: ControlResponder::new(ledger.clone(), time_source, config),
                ledger,
            })
        }

        fn estimate(&self) -> Estimate {
            self.responder.estimate().unwrap()
        }
    }

    /// Floods each claim to every node except its origin.
    #[derive(Default)]
    struct FloodRelay {
        nodes: Mutex<Vec<Arc<TestNode>>>,
        delivered: Mutex<Vec<(usize, IngestOutcome)>>,
    }

    impl FloodRelay {
        fn join(&self, node: Arc<TestNode>) -> usize {
            let mut nodes = self.nodes.lock();
            nodes.push(node);
            nodes.len() - 1
        }

        fn flood(&self, origin: usize, claim: &[u8]) {
            let nodes = self.nodes.lock().clone();
            for (index, node) in nodes.iter().enumerate().filter(|(i, _)| *i != origin) {
                let outcome = node.ingress.receive_claim(claim).unwrap();
                self.delivered.lock().push((index, outcome));
            }
        }
    }

    /// One node's attachment to the relay.
    struct RelayPort {
        origin: usize,
        relay: Arc<FloodRelay>,
    }

    impl Announcer for RelayPort {
        fn announce(&self, claim: Vec<u8>) -> Result<(), AnnounceError> {
            self.relay.flood(self.origin, &claim);
            Ok(())
        }
    }

    fn claim(key: &RsaPrivateKey, round_time: u64) -> Vec<u8> {
        build_claim(
            key,
            round_time,
            BuildOptions {
                proof_of_work_bits: EstimationConfig::for_testing().proof_of_work_bits,
                ..BuildOptions::default()
            },
        )
        .unwrap()
    }

    // =========================================================================
    // INTEGRATION TESTS: Round participation across nodes
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_closest_node_floods_and_others_stay_quiet() {
        let config = EstimationConfig {
            frequency: ROUND_FREQUENCY,
            ..EstimationConfig::for_testing()
        };
        let clock: Arc<dyn TimeSource> = Arc::new(FixedTimeSource::new(ROUND_START));
        let relay = Arc::new(FloodRelay::default());

        let keys = [fixture_key(), second_fixture_key(), third_fixture_key()];
        let mut nodes = Vec::new();
        let mut schedulers = Vec::new();
        for key in keys {
            let node = TestNode::new(clock.clone(), config);
            let origin = relay.join(node.clone());
            let port = Arc::new(RelayPort {
                origin,
                relay: relay.clone(),
            });
            schedulers.push(RoundScheduler::new(
                Arc::new(key),
                node.ledger.clone(),
                port,
                clock.clone(),
                config,
            ));
            nodes.push(node);
        }

        let mut runs = schedulers.into_iter().map(|s| s.run());
        let (a, b, c) = tokio::join!(
            runs.next().unwrap(),
            runs.next().unwrap(),
            runs.next().unwrap()
        );

        // node_a waits about 3 s, node_b about 10 s, node_c half the round.
        assert_eq!(
            a,
            RoundOutcome::Announced {
                round: ROUND,
                proximity: 12
            }
        );
        assert_eq!(
            b,
            RoundOutcome::Suppressed {
                round: ROUND,
                own_proximity: 4,
                recorded: 12
            }
        );
        assert_eq!(
            c,
            RoundOutcome::Suppressed {
                round: ROUND,
                own_proximity: 1,
                recorded: 12
            }
        );

        // Exactly one flood, accepted by both receivers.
        let delivered = relay.delivered.lock().clone();
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|(_, outcome)| outcome.is_accepted()));

        // 2^(12 - 0.332747) ≈ 3252.1
        let expected = Estimate {
            peers: 3252,
            std_deviation: 0,
        };
        assert_eq!(nodes[1].estimate(), expected);
        assert_eq!(nodes[2].estimate(), expected);

        // The originator only learns rounds from its peers.
        assert_eq!(nodes[0].estimate(), Estimate::default());
    }

    #[test]
    fn test_observers_converge_regardless_of_arrival_order() {
        let config = EstimationConfig::for_testing();
        let clock: Arc<dyn TimeSource> = Arc::new(FixedTimeSource::new(CLAIM_TIME));
        let claims = [
            claim(&third_fixture_key(), CLAIM_TIME),
            claim(&fixture_key(), CLAIM_TIME),
            claim(&second_fixture_key(), CLAIM_TIME),
        ];

        let ascending = TestNode::new(clock.clone(), config);
        let accepted: Vec<bool> = claims
            .iter()
            .map(|c| ascending.ingress.receive_claim(c).unwrap().is_accepted())
            .collect();
        assert_eq!(accepted, vec![true, true, true]);

        let descending = TestNode::new(clock, config);
        let accepted: Vec<bool> = claims
            .iter()
            .rev()
            .map(|c| descending.ingress.receive_claim(c).unwrap().is_accepted())
            .collect();
        assert_eq!(accepted, vec![true, false, false]);

        assert_eq!(ascending.estimate(), descending.estimate());
        assert_eq!(ascending.estimate().peers, 203);
    }

    #[test]
    fn test_lagging_clock_counts_backlog_round_once_it_arrives() {
        let config = EstimationConfig::for_testing();
        let clock = Arc::new(ControllableTimeSource::new(CLAIM_TIME - 300));
        let node = TestNode::new(clock.clone(), config);

        let outcome = node
            .ingress
            .receive_claim(&claim(&second_fixture_key(), CLAIM_TIME))
            .unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::Accepted {
                proximity: 8,
                backlog: true,
                ..
            }
        ));

        // Recorded, but ahead of this node's current round.
        assert_eq!(node.estimate(), Estimate::default());

        clock.advance(300);
        assert_eq!(node.estimate().peers, 203);
    }
}
