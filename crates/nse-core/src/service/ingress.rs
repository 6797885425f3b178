use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{
    place_round, EstimationConfig, LedgerError, RecordOutcome, RoundCandidate, RoundClock,
    RoundPlacement,
};
use crate::ports::inbound::{ClaimReceiver, IngestOutcome, Rejection};
use crate::ports::outbound::{RoundLedger, TimeSource};
use crate::protocol::claim::{unpack_claim, UnpackOptions};

/// Longest prefix of a rejected message written to the debug log.
const LOGGED_PREFIX: usize = 80;

/// Validates claims delivered by the relay and records round bests.
///
/// Every call yields exactly one accept/reject decision; malformed input never
/// surfaces as an error.
pub struct GossipIngress {
    ledger: Arc<dyn RoundLedger>,
    time_source: Arc<dyn TimeSource>,
    config: EstimationConfig,
    clock: RoundClock,
}

impl GossipIngress {
    pub fn new(
        ledger: Arc<dyn RoundLedger>,
        time_source: Arc<dyn TimeSource>,
        config: EstimationConfig,
    ) -> Self {
        Self {
            ledger,
            time_source,
            clock: RoundClock::new(config.frequency),
            config,
        }
    }
}

impl ClaimReceiver for GossipIngress {
    fn receive_claim(&self, message: &[u8]) -> Result<IngestOutcome, LedgerError> {
        let options = UnpackOptions {
            min_proximity: self.config.min_proximity,
            proof_of_work_bits: self.config.proof_of_work_bits,
        };
        let claim = match unpack_claim(message, options) {
            Ok(claim) => claim,
            Err(failure) => {
                debug!(
                    %failure,
                    prefix = %hex::encode(&message[..message.len().min(LOGGED_PREFIX)]),
                    "Dropping invalid claim"
                );
                return Ok(IngestOutcome::Rejected(Rejection::Invalid(failure)));
            }
        };

        let now = self.time_source.now();
        let round = self.clock.round_of(claim.round_time);
        let current = self.clock.current_round(now);
        let peer = self.ledger.resolve_peer(&claim.public_key_der, now)?;

        let backlog = match place_round(round, current, self.config.max_backlog_rounds) {
            RoundPlacement::Current => false,
            RoundPlacement::Backlog { .. } => true,
            RoundPlacement::Stale { .. } => {
                debug!(round, current, peer_id = %peer.id, "Dropping claim for a past round");
                return Ok(IngestOutcome::Rejected(Rejection::Stale { round, current }));
            }
            RoundPlacement::TooFarAhead { .. } => {
                debug!(round, current, peer_id = %peer.id, "Dropping claim too far ahead");
                return Ok(IngestOutcome::Rejected(Rejection::TooFarAhead { round, current }));
            }
        };

        let candidate = RoundCandidate {
            round,
            proximity: claim.proximity,
            hop_count: claim.hop_count,
            peer_id: peer.id,
            backlog,
            seen_at: now,
        };
        match self.ledger.record_claim(candidate)? {
            RecordOutcome::Kept { best } => {
                debug!(round, proximity = claim.proximity, best, "Claim does not beat the round's best");
                Ok(IngestOutcome::Rejected(Rejection::NotBetter { round, best }))
            }
            RecordOutcome::Created(_) | RecordOutcome::Raised { .. } => {
                info!(
                    round,
                    proximity = claim.proximity,
                    peer_id = %peer.id,
                    backlog,
                    "New best proximity for round"
                );
                Ok(IngestOutcome::Accepted {
                    round,
                    proximity: claim.proximity,
                    peer_id: peer.id,
                    backlog,
                })
            }
        }
    }
}
