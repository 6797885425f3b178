//! # Driving Ports (Inbound API)
//!
//! What the node's transports call into: the relay client feeds received
//! claims to a [`ClaimReceiver`], the control listener asks an
//! [`EstimateApi`].

use crate::domain::{Estimate, LedgerError, PeerId, RoundIndex, ValidationFailure};

/// Why an ingested claim did not change the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Failed wire validation.
    Invalid(ValidationFailure),
    /// Round already over.
    Stale { round: RoundIndex, current: RoundIndex },
    /// Round beyond the backlog tolerance.
    TooFarAhead { round: RoundIndex, current: RoundIndex },
    /// Not strictly better than the recorded best.
    NotBetter { round: RoundIndex, best: u8 },
}

/// Result of ingesting one claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted {
        round: RoundIndex,
        proximity: u8,
        peer_id: PeerId,
        backlog: bool,
    },
    Rejected(Rejection),
}

impl IngestOutcome {
    /// The validity flag returned to the relay.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Ingests claims delivered by the relay.
pub trait ClaimReceiver: Send + Sync {
    /// Validate and record one claim.
    ///
    /// Malformed input is an `Ok(Rejected)`; only storage failures are errors.
    fn receive_claim(&self, message: &[u8]) -> Result<IngestOutcome, LedgerError>;
}

/// Answers local estimate queries.
pub trait EstimateApi: Send + Sync {
    /// Current estimate over the respected window of rounds.
    fn estimate(&self) -> Result<Estimate, LedgerError>;
}
