//! # Node Flow Integration Tests
//!
//! A complete `NodeRuntime` on loopback sockets, with the test playing the
//! gossip relay and a control client:
//!
//! ```text
//! [Test relay] ──GOSSIP_NOTIFICATION──→ [GossipHandler] → [GossipIngress] → [Ledger]
//!              ←──GOSSIP_VALIDATION───                                        │
//! [Control client] ──NSE_QUERY──→ [ControlHandler] → [ControlResponder] ←─────┘
//!                  ←─NSE_ESTIMATE─
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use rsa::RsaPrivateKey;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use nse_core::protocol::api::{gossip_notify, nse_query, FRAME_HEADER_LENGTH};
    use nse_core::protocol::GossipNotification;
    use nse_core::test_utils::{
        fixture_key, second_fixture_key, third_fixture_key, FixedTimeSource,
    };
    use nse_core::{
        build_claim, BuildOptions, Estimate, Frame, InMemoryRoundLedger, MessageType,
    };
    use nse_node::{NodeConfig, NodeRuntime};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    // Fixture proximities at CLAIM_TIME (300 s rounds): node_a 4, node_b 8, node_c 1.
    const CLAIM_TIME: u64 = 1_700_009_000;
    const DATA_TYPE: u16 = 520;
    const TEST_POW_BITS: u32 = 4;

    fn claim(key: &RsaPrivateKey, round_time: u64) -> Vec<u8> {
        build_claim(
            key,
            round_time,
            BuildOptions {
                proof_of_work_bits: TEST_POW_BITS,
                ..BuildOptions::default()
            },
        )
        .unwrap()
    }

    fn notification(message_id: u16, payload: Vec<u8>) -> Bytes {
        Frame::GossipNotification(GossipNotification {
            message_id,
            data_type: DATA_TYPE,
            payload: payload.into(),
        })
        .encode()
        .unwrap()
    }

    async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
        let mut header = [0u8; FRAME_HEADER_LENGTH];
        stream.read_exact(&mut header).await.unwrap();
        let size = u16::from_be_bytes([header[0], header[1]]) as usize;
        let mut frame = header.to_vec();
        frame.resize(size, 0);
        stream.read_exact(&mut frame[FRAME_HEADER_LENGTH..]).await.unwrap();
        frame
    }

    /// Accept the node's relay connection and consume its subscription.
    async fn accept_link(relay: &TcpListener) -> TcpStream {
        let (mut link, _) = relay.accept().await.unwrap();
        assert_eq!(read_frame(&mut link).await, gossip_notify(DATA_TYPE).to_vec());
        link
    }

    /// Deliver one notification and return the node's verdict.
    async fn relay_claim(link: &mut TcpStream, message_id: u16, payload: Vec<u8>) -> bool {
        link.write_all(&notification(message_id, payload)).await.unwrap();
        match Frame::decode(&read_frame(link).await, &[MessageType::GossipValidation]).unwrap() {
            Frame::GossipValidation { message_id: id, valid } => {
                assert_eq!(id, message_id);
                valid
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    async fn query(node: &NodeRuntime) -> Estimate {
        let mut client = TcpStream::connect(node.control_address().unwrap()).await.unwrap();
        client.write_all(&nse_query()).await.unwrap();
        let mut answer = [0u8; 12];
        client.read_exact(&mut answer).await.unwrap();
        match Frame::decode(&answer, &[MessageType::NseEstimate]).unwrap() {
            Frame::NseEstimate(estimate) => estimate,
            other => panic!("unexpected frame {other:?}"),
        }
    }

    async fn start_node(relay: &TcpListener) -> (NodeRuntime, TcpStream) {
        let mut config = NodeConfig::default();
        config.nse.api_address = "127.0.0.1:0".to_string();
        config.nse.proof_of_work_bits = TEST_POW_BITS;
        config.gossip.api_address = relay.local_addr().unwrap().to_string();

        let mut node = NodeRuntime::new(config, fixture_key(), Arc::new(InMemoryRoundLedger::new()))
            .with_time_source(Arc::new(FixedTimeSource::new(CLAIM_TIME)));
        node.start().await.unwrap();
        let link = accept_link(relay).await;
        (node, link)
    }

    // =========================================================================
    // INTEGRATION TESTS: Relay → Ledger → Control API
    // =========================================================================

    #[tokio::test]
    async fn test_relayed_claim_reaches_estimate() {
        let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (node, mut link) = start_node(&relay).await;

        assert_eq!(query(&node).await, Estimate::default());

        assert!(relay_claim(&mut link, 1, claim(&second_fixture_key(), CLAIM_TIME)).await);

        // 2^(8 - 0.332747) ≈ 203.27
        assert_eq!(
            query(&node).await,
            Estimate {
                peers: 203,
                std_deviation: 0
            }
        );

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_claims_leave_estimate_unchanged() {
        let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (node, mut link) = start_node(&relay).await;

        let best = claim(&second_fixture_key(), CLAIM_TIME);
        assert!(relay_claim(&mut link, 1, best.clone()).await);

        // Weaker claim, replay, previous round, garbage.
        assert!(!relay_claim(&mut link, 2, claim(&third_fixture_key(), CLAIM_TIME)).await);
        assert!(!relay_claim(&mut link, 3, best).await);
        assert!(!relay_claim(&mut link, 4, claim(&fixture_key(), CLAIM_TIME - 300)).await);
        assert!(!relay_claim(&mut link, 5, vec![0xAB; 64]).await);

        assert_eq!(query(&node).await.peers, 203);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_better_claim_raises_round_best() {
        let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (node, mut link) = start_node(&relay).await;

        assert!(relay_claim(&mut link, 1, claim(&third_fixture_key(), CLAIM_TIME)).await);
        let low = query(&node).await;

        assert!(relay_claim(&mut link, 2, claim(&second_fixture_key(), CLAIM_TIME)).await);
        let high = query(&node).await;

        assert!(high.peers > low.peers);
        assert_eq!(high.peers, 203);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_node_resubscribes_after_relay_drop() {
        let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (node, mut link) = start_node(&relay).await;

        assert!(relay_claim(&mut link, 1, claim(&third_fixture_key(), CLAIM_TIME)).await);
        drop(link);

        // A lost link is retried at once and subscribes again.
        let mut link = accept_link(&relay).await;
        assert!(relay_claim(&mut link, 2, claim(&second_fixture_key(), CLAIM_TIME)).await);
        assert_eq!(query(&node).await.peers, 203);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_control_clients_share_one_ledger() {
        let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (node, mut link) = start_node(&relay).await;

        assert!(relay_claim(&mut link, 1, claim(&fixture_key(), CLAIM_TIME)).await);

        let (first, second) = tokio::join!(query(&node), query(&node));
        assert_eq!(first, second);
        // 2^(4 - 0.332747) ≈ 12.7
        assert_eq!(first.peers, 13);

        node.shutdown().await;
    }
}
