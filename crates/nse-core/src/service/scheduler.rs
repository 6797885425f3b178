use std::sync::Arc;
use std::time::Duration;

use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::{
    calculate_proximity, flood_delay, size_from_proximity, AnnounceError, BuildError,
    EstimationConfig, LedgerError, RoundClock, RoundIndex,
};
use crate::ports::outbound::{Announcer, RoundLedger, TimeSource};
use crate::protocol::claim::{build_claim, BuildOptions};

/// Upper bound of the multiplicative delay jitter.
const MAX_JITTER: f64 = 0.05;

/// Why a round ended without announcing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundFailure {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Announce(#[from] AnnounceError),
}

/// Terminal state of one round's participation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// An equal or better claim was recorded while waiting.
    Suppressed {
        round: RoundIndex,
        own_proximity: u16,
        recorded: u8,
    },
    /// Our claim was handed to the announcer.
    Announced { round: RoundIndex, proximity: u16 },
    Failed { round: RoundIndex, reason: RoundFailure },
}

/// What a round intends to do before it starts waiting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundPlan {
    pub round: RoundIndex,
    /// UNIX time the round began; the claim is built for this value.
    pub round_start: u64,
    pub own_proximity: u16,
    pub previous_estimate: f64,
    /// Delay before jitter.
    pub delay: Duration,
}

/// Drives one round of participation: wait a proximity-dependent delay, then
/// flood our claim unless someone at least as close already has.
///
/// Create a fresh scheduler per round; `run` consumes it.
pub struct RoundScheduler {
    key: Arc<RsaPrivateKey>,
    public_key: RsaPublicKey,
    ledger: Arc<dyn RoundLedger>,
    announcer: Arc<dyn Announcer>,
    time_source: Arc<dyn TimeSource>,
    config: EstimationConfig,
}

impl RoundScheduler {
    pub fn new(
        key: Arc<RsaPrivateKey>,
        ledger: Arc<dyn RoundLedger>,
        announcer: Arc<dyn Announcer>,
        time_source: Arc<dyn TimeSource>,
        config: EstimationConfig,
    ) -> Self {
        let public_key = key.to_public_key();
        Self {
            key,
            public_key,
            ledger,
            announcer,
            time_source,
            config,
        }
    }

    /// Compute this round's proximity and flood delay from the current time.
    pub fn plan(&self) -> Result<RoundPlan, LedgerError> {
        let clock = RoundClock::new(self.config.frequency);
        let now = self.time_source.now();
        let round = clock.current_round(now);
        let round_start = clock.round_start(now);
        let own_proximity = calculate_proximity(&self.public_key, round_start);

        let previous_estimate = self
            .ledger
            .best_round(round - 1)?
            .map(|r| size_from_proximity(f64::from(r.proximity)))
            .unwrap_or(1.0);
        let delay = flood_delay(clock.frequency(), own_proximity, previous_estimate).max(0.0);

        Ok(RoundPlan {
            round,
            round_start,
            own_proximity,
            previous_estimate,
            delay: Duration::from_secs_f64(delay),
        })
    }

    /// Run the round to completion.
    pub async fn run(self) -> RoundOutcome {
        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(e) => {
                let round = RoundClock::new(self.config.frequency).current_round(self.time_source.now());
                error!(round, error = %e, "Cannot plan round");
                return RoundOutcome::Failed {
                    round,
                    reason: e.into(),
                };
            }
        };

        let wait = plan.delay.mul_f64(1.0 + rand::random::<f64>() * MAX_JITTER);
        debug!(
            round = plan.round,
            proximity = plan.own_proximity,
            previous_estimate = plan.previous_estimate,
            delay_secs = wait.as_secs_f64(),
            "Waiting before flooding"
        );
        tokio::time::sleep(wait).await;

        match self.finish(&plan) {
            Ok(outcome) => outcome,
            Err(reason) => {
                match &reason {
                    RoundFailure::Announce(e) => warn!(round = plan.round, error = %e, "Failed to announce claim"),
                    other => error!(round = plan.round, error = %other, "Round failed"),
                }
                RoundOutcome::Failed {
                    round: plan.round,
                    reason,
                }
            }
        }
    }

    fn finish(&self, plan: &RoundPlan) -> Result<RoundOutcome, RoundFailure> {
        if let Some(best) = self.ledger.best_round(plan.round)? {
            if u16::from(best.proximity) >= plan.own_proximity {
                debug!(
                    round = plan.round,
                    recorded = best.proximity,
                    peer_id = %best.peer_id,
                    "Suppressing flood, an equal or better claim is known"
                );
                return Ok(RoundOutcome::Suppressed {
                    round: plan.round,
                    own_proximity: plan.own_proximity,
                    recorded: best.proximity,
                });
            }
        }

        let claim = build_claim(
            self.key.as_ref(),
            plan.round_start,
            BuildOptions {
                proximity: u8::try_from(plan.own_proximity).ok(),
                proof_of_work_bits: self.config.proof_of_work_bits,
                hop_count: 0,
            },
        )?;
        self.announcer.announce(claim)?;
        info!(round = plan.round, proximity = plan.own_proximity, "Announced own claim");
        Ok(RoundOutcome::Announced {
            round: plan.round,
            proximity: plan.own_proximity,
        })
    }
}
