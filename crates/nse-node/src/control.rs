//! Local control API: answers `NSE_QUERY` with `NSE_ESTIMATE`.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

use nse_core::protocol::api::nse_estimate;
use nse_core::{EstimateApi, Frame, MessageType};

use crate::connection::{drive, Action, CloseReason, ConnectionHandler, SessionId};

/// Longest prefix of an invalid message written to the debug log.
const LOGGED_PREFIX: usize = 80;

/// One control connection.
pub struct ControlHandler {
    estimates: Arc<dyn EstimateApi>,
    enforce_localhost: bool,
}

impl ControlHandler {
    pub fn new(estimates: Arc<dyn EstimateApi>, enforce_localhost: bool) -> Self {
        Self {
            estimates,
            enforce_localhost,
        }
    }
}

impl ConnectionHandler for ControlHandler {
    fn on_connected(&mut self, _session: SessionId, peer: SocketAddr) -> Action {
        if self.enforce_localhost && !peer.ip().is_loopback() {
            warn!(%peer, "Blocked control connection from a non-loopback address");
            return Action::Close;
        }
        info!(%peer, "Accepted control connection");
        Action::Nothing
    }

    fn on_data(&mut self, frame: &[u8]) -> Action {
        if let Err(e) = Frame::decode(frame, &[MessageType::NseQuery]) {
            warn!(error = %e, "Invalid control message");
            debug!(
                len = frame.len(),
                prefix = %hex::encode(&frame[..frame.len().min(LOGGED_PREFIX)]),
                "Dropped control message"
            );
            return Action::Close;
        }

        match self.estimates.estimate() {
            Ok(estimate) => {
                debug!(peers = estimate.peers, std_deviation = estimate.std_deviation, "Answering query");
                Action::Reply(nse_estimate(estimate))
            }
            Err(e) => {
                error!(error = %e, "Cannot compute estimate");
                Action::Close
            }
        }
    }

    fn on_closed(&mut self, reason: &CloseReason) {
        if let CloseReason::Io(e) = reason {
            debug!(error = %e, "Control connection failed");
        }
    }
}

/// Accepts control connections until shutdown.
pub struct ControlListener {
    listener: TcpListener,
    estimates: Arc<dyn EstimateApi>,
    enforce_localhost: bool,
}

impl ControlListener {
    /// Bind the listener.
    pub async fn bind(
        address: SocketAddr,
        estimates: Arc<dyn EstimateApi>,
        enforce_localhost: bool,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            listener,
            estimates,
            enforce_localhost,
        })
    }

    /// Actual bound address (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve connections, one task each, until shutdown is signalled.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) {
        if let Ok(address) = self.local_addr() {
            info!(%address, "Control API listening");
        }
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let session = SessionId::next();
                        let handler = ControlHandler::new(Arc::clone(&self.estimates), self.enforce_localhost);
                        let span = tracing::info_span!("control", %session);
                        tokio::spawn(
                            drive(session, peer, stream, handler, None, shutdown.clone()).instrument(span),
                        );
                    }
                    Err(e) => warn!(error = %e, "Failed to accept control connection"),
                },
                _ = shutdown.changed() => {
                    info!("Control API stopped");
                    return;
                }
            }
        }
    }
}
