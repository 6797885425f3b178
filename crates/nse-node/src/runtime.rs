//! Node wiring: one ledger shared by the relay client, the control listener
//! and the periodic round loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rsa::RsaPrivateKey;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};

use nse_core::{
    Announcer, ChannelAnnouncer, ControlResponder, EstimateApi, EstimationConfig, GossipIngress,
    LedgerError, RoundClock, RoundLedger, RoundScheduler, SystemTimeSource, TimeSource,
};

use crate::config::NodeConfig;
use crate::control::ControlListener;
use crate::gossip::{GossipClient, GossipSettings};

/// Open the configured round ledger.
#[cfg(feature = "rocksdb")]
pub fn open_ledger(config: &NodeConfig) -> Result<Arc<dyn RoundLedger>, LedgerError> {
    info!(path = %config.nse.database.display(), "Opening RocksDB round ledger");
    Ok(Arc::new(nse_core::RocksDbRoundLedger::open(&config.nse.database)?))
}

/// Open the configured round ledger.
#[cfg(not(feature = "rocksdb"))]
pub fn open_ledger(config: &NodeConfig) -> Result<Arc<dyn RoundLedger>, LedgerError> {
    tracing::warn!(
        path = %config.nse.database.display(),
        "Built without the rocksdb feature, rounds are kept in memory only"
    );
    Ok(Arc::new(nse_core::InMemoryRoundLedger::new()))
}

/// Spawns one [`RoundScheduler`] per round, on each round boundary.
pub struct RoundLoop {
    key: Arc<RsaPrivateKey>,
    ledger: Arc<dyn RoundLedger>,
    announcer: Arc<dyn Announcer>,
    time_source: Arc<dyn TimeSource>,
    config: EstimationConfig,
}

impl RoundLoop {
    pub fn new(
        key: Arc<RsaPrivateKey>,
        ledger: Arc<dyn RoundLedger>,
        announcer: Arc<dyn Announcer>,
        time_source: Arc<dyn TimeSource>,
        config: EstimationConfig,
    ) -> Self {
        Self {
            key,
            ledger,
            announcer,
            time_source,
            config,
        }
    }

    /// Time until the next round boundary.
    pub fn until_next_round(&self) -> Duration {
        let clock = RoundClock::new(self.config.frequency);
        Duration::from_secs(clock.remaining_in_round(self.time_source.now()) + 1)
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let clock = RoundClock::new(self.config.frequency);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.until_next_round()) => {}
                _ = shutdown.changed() => {
                    debug!("Round loop stopped");
                    return;
                }
            }

            let round = clock.current_round(self.time_source.now());
            debug!(round, "Starting round participation");
            let scheduler = RoundScheduler::new(
                Arc::clone(&self.key),
                Arc::clone(&self.ledger),
                Arc::clone(&self.announcer),
                Arc::clone(&self.time_source),
                self.config,
            );
            tokio::spawn(
                async move {
                    scheduler.run().await;
                }
                .instrument(tracing::info_span!("round", round)),
            );
        }
    }
}

/// The running node.
pub struct NodeRuntime {
    config: NodeConfig,
    key: Arc<RsaPrivateKey>,
    ledger: Arc<dyn RoundLedger>,
    time_source: Arc<dyn TimeSource>,
    announcer: Arc<ChannelAnnouncer>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
    control_address: Option<SocketAddr>,
}

impl NodeRuntime {
    pub fn new(config: NodeConfig, key: RsaPrivateKey, ledger: Arc<dyn RoundLedger>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            key: Arc::new(key),
            ledger,
            time_source: Arc::new(SystemTimeSource),
            announcer: Arc::new(ChannelAnnouncer::new()),
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
            control_address: None,
        }
    }

    /// Replace the wall clock.
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Estimate source backed by this node's ledger.
    pub fn estimates(&self) -> Arc<dyn EstimateApi> {
        Arc::new(ControlResponder::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.time_source),
            self.config.estimation(),
        ))
    }

    /// Bound control API address, once started.
    pub fn control_address(&self) -> Option<SocketAddr> {
        self.control_address
    }

    /// Start the node.
    ///
    /// ## Startup Sequence
    ///
    /// 1. Connect to the relay (fatal on failure)
    /// 2. Bind the control listener
    /// 3. Start the round loop
    pub async fn start(&mut self) -> Result<()> {
        let estimation = self.config.estimation();
        info!(
            frequency = estimation.frequency,
            proof_of_work_bits = estimation.proof_of_work_bits,
            respected_rounds = estimation.respected_rounds,
            "Starting network size estimation node"
        );

        let ingress = Arc::new(GossipIngress::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.time_source),
            estimation,
        ));
        let settings = GossipSettings::from_config(&self.config)?;
        let relay = settings.address;
        let gossip = GossipClient::new(settings, ingress, Arc::clone(&self.announcer))
            .start(self.shutdown_rx.clone())
            .await
            .with_context(|| format!("Cannot connect to relay at {relay}"))?;
        self.tasks.push(gossip);

        let api_address = self.config.api_address()?;
        let listener = ControlListener::bind(api_address, self.estimates(), self.config.nse.enforce_localhost)
            .await
            .with_context(|| format!("Cannot bind control API on {api_address}"))?;
        self.control_address = Some(listener.local_addr()?);
        self.tasks.push(tokio::spawn(listener.serve(self.shutdown_rx.clone())));

        let round_loop = RoundLoop::new(
            Arc::clone(&self.key),
            Arc::clone(&self.ledger),
            Arc::clone(&self.announcer) as Arc<dyn Announcer>,
            Arc::clone(&self.time_source),
            estimation,
        );
        self.tasks.push(tokio::spawn(round_loop.run(self.shutdown_rx.clone())));

        info!("Node started");
        Ok(())
    }

    /// Signal shutdown and wait for the long-lived tasks.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Task ended abnormally");
            }
        }
        info!("Shutdown complete");
    }
}
