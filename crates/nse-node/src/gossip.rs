//! Relay ("gossip") client.
//!
//! Subscribes to the claim data type, answers every notification with one
//! validation, and forwards announced claims. The supervisor reconnects after
//! a lost connection with `base ^ failures` second backoff; only the very first
//! connection attempt is fatal.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use nse_core::protocol::api::{gossip_announce, gossip_notify, gossip_validation};
use nse_core::{ChannelAnnouncer, ClaimReceiver, Frame, MessageType};

use crate::config::NodeConfig;
use crate::connection::{drive, Action, CloseReason, ConnectionHandler, SessionId};

/// Longest prefix of an invalid message written to the debug log.
const LOGGED_PREFIX: usize = 80;

/// Relay connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GossipSettings {
    pub address: SocketAddr,
    pub data_type: u16,
    pub ttl: u8,
    pub reconnect_base: f64,
    pub reconnect_max_delay: Option<Duration>,
}

impl GossipSettings {
    pub fn from_config(config: &NodeConfig) -> Result<Self, crate::config::ConfigError> {
        Ok(Self {
            address: config.gossip_address()?,
            data_type: config.nse.data_type,
            ttl: config.nse.gossip_ttl,
            reconnect_base: config.gossip.reconnect_base,
            reconnect_max_delay: config.reconnect_max_delay(),
        })
    }
}

/// Exponential reconnect delay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectBackoff {
    base: f64,
    max_delay: Option<Duration>,
    failures: u32,
}

impl ReconnectBackoff {
    pub fn new(base: f64, max_delay: Option<Duration>) -> Self {
        Self {
            base,
            max_delay,
            failures: 0,
        }
    }

    /// Delay before the next attempt: `base ^ failures` seconds, then count
    /// one more failure.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = i32::try_from(self.failures).unwrap_or(i32::MAX);
        let delay = Duration::try_from_secs_f64(self.base.powi(exponent)).unwrap_or(Duration::MAX);
        self.failures = self.failures.saturating_add(1);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Clear the failure count, returning it.
    pub fn reset(&mut self) -> u32 {
        std::mem::take(&mut self.failures)
    }
}

/// One relay connection.
pub struct GossipHandler {
    ingress: Arc<dyn ClaimReceiver>,
    data_type: u16,
    ttl: u8,
}

impl GossipHandler {
    pub fn new(ingress: Arc<dyn ClaimReceiver>, data_type: u16, ttl: u8) -> Self {
        Self {
            ingress,
            data_type,
            ttl,
        }
    }

    fn validate(&self, data_type: u16, payload: &[u8]) -> bool {
        if data_type != self.data_type {
            debug!(data_type, expected = self.data_type, "Notification for another data type");
            return false;
        }
        match self.ingress.receive_claim(payload) {
            Ok(outcome) => outcome.is_accepted(),
            Err(e) => {
                error!(error = %e, "Cannot record claim");
                false
            }
        }
    }
}

impl ConnectionHandler for GossipHandler {
    fn on_connected(&mut self, _session: SessionId, peer: SocketAddr) -> Action {
        info!(%peer, data_type = self.data_type, "Connected to relay");
        Action::Reply(gossip_notify(self.data_type))
    }

    fn on_data(&mut self, frame: &[u8]) -> Action {
        match Frame::decode(frame, &[MessageType::GossipNotification]) {
            Ok(Frame::GossipNotification(notification)) => {
                let valid = self.validate(notification.data_type, &notification.payload);
                debug!(message_id = notification.message_id, valid, "Validated notification");
                Action::Reply(gossip_validation(notification.message_id, valid))
            }
            Ok(_) => Action::Nothing,
            Err(e) => {
                warn!(error = %e, "Invalid relay message");
                debug!(
                    len = frame.len(),
                    prefix = %hex::encode(&frame[..frame.len().min(LOGGED_PREFIX)]),
                    "Ignored relay message"
                );
                Action::Nothing
            }
        }
    }

    fn on_outbound(&mut self, claim: Vec<u8>) -> Action {
        match gossip_announce(self.ttl, self.data_type, claim) {
            Ok(frame) => Action::Reply(frame),
            Err(e) => {
                error!(error = %e, "Cannot frame announcement");
                Action::Nothing
            }
        }
    }

    fn on_closed(&mut self, reason: &CloseReason) {
        match reason {
            CloseReason::Shutdown => debug!("Relay connection closed for shutdown"),
            other => error!(reason = ?other, "Lost relay connection"),
        }
    }
}

/// Owns the relay connection for the node's lifetime.
pub struct GossipClient {
    settings: GossipSettings,
    ingress: Arc<dyn ClaimReceiver>,
    announcer: Arc<ChannelAnnouncer>,
    backoff: ReconnectBackoff,
}

impl GossipClient {
    pub fn new(
        settings: GossipSettings,
        ingress: Arc<dyn ClaimReceiver>,
        announcer: Arc<ChannelAnnouncer>,
    ) -> Self {
        let backoff = ReconnectBackoff::new(settings.reconnect_base, settings.reconnect_max_delay);
        Self {
            settings,
            ingress,
            announcer,
            backoff,
        }
    }

    /// Connect once and hand the connection to a supervisor task.
    ///
    /// # Errors
    ///
    /// The first connection failure is returned to the caller.
    pub async fn start(self, shutdown: watch::Receiver<bool>) -> std::io::Result<JoinHandle<()>> {
        let stream = TcpStream::connect(self.settings.address).await.map_err(|e| {
            error!(address = %self.settings.address, error = %e, "Cannot connect to relay");
            e
        })?;
        Ok(tokio::spawn(self.supervise(stream, shutdown)))
    }

    async fn supervise(mut self, first: TcpStream, mut shutdown: watch::Receiver<bool>) {
        let mut connected = Some(first);
        loop {
            if let Some(stream) = connected.take() {
                if self.run_session(stream, shutdown.clone()).await == CloseReason::Shutdown {
                    return;
                }
            }
            if *shutdown.borrow() {
                return;
            }

            match TcpStream::connect(self.settings.address).await {
                Ok(stream) => {
                    let attempts = self.backoff.reset();
                    if attempts > 0 {
                        info!(attempts, "Re-established relay connection");
                    }
                    connected = Some(stream);
                }
                Err(e) => {
                    warn!(address = %self.settings.address, error = %e, "Failed to connect to relay");
                    let delay = self.backoff.next_delay();
                    debug!(delay_secs = delay.as_secs_f64(), "Waiting before the next reconnect attempt");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => return,
                    }
                }
            }
        }
    }

    async fn run_session(&self, stream: TcpStream, shutdown: watch::Receiver<bool>) -> CloseReason {
        let session = SessionId::next();
        let peer = stream.peer_addr().unwrap_or(self.settings.address);
        let handler = GossipHandler::new(
            Arc::clone(&self.ingress),
            self.settings.data_type,
            self.settings.ttl,
        );

        let (tx, rx) = mpsc::unbounded_channel();
        self.announcer.attach(tx);
        let reason = drive(session, peer, stream, handler, Some(rx), shutdown)
            .instrument(tracing::info_span!("gossip", %session))
            .await;
        self.announcer.detach();
        reason
    }
}
