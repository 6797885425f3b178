use std::sync::Arc;

use tracing::debug;

use crate::domain::{estimate_and_deviation, Estimate, EstimationConfig, LedgerError, RoundClock};
use crate::ports::inbound::EstimateApi;
use crate::ports::outbound::{RoundLedger, TimeSource};

/// Answers local estimate queries from the most recent recorded rounds.
pub struct ControlResponder {
    ledger: Arc<dyn RoundLedger>,
    time_source: Arc<dyn TimeSource>,
    clock: RoundClock,
    respected_rounds: usize,
}

impl ControlResponder {
    pub fn new(
        ledger: Arc<dyn RoundLedger>,
        time_source: Arc<dyn TimeSource>,
        config: EstimationConfig,
    ) -> Self {
        Self {
            ledger,
            time_source,
            clock: RoundClock::new(config.frequency),
            respected_rounds: config.respected_rounds,
        }
    }
}

impl EstimateApi for ControlResponder {
    fn estimate(&self) -> Result<Estimate, LedgerError> {
        let current = self.clock.current_round(self.time_source.now());
        let proximities: Vec<u8> = self
            .ledger
            .recent_rounds(current, self.respected_rounds)?
            .iter()
            .map(|r| r.proximity)
            .collect();

        let estimate = estimate_and_deviation(&proximities);
        debug!(
            rounds = proximities.len(),
            peers = estimate.peers,
            std_deviation = estimate.std_deviation,
            "Computed estimate"
        );
        Ok(estimate)
    }
}
