//! # Outbound Ports (Driven Ports)
//!
//! Capabilities the estimation services need from the host node: storage of
//! peers and per-round bests, a way to flood claims, and a clock.

use crate::domain::{
    AnnounceError, LedgerError, Peer, PeerId, RecordOutcome, Round, RoundCandidate, RoundIndex,
    Timestamp,
};

/// Persistence contract for peers and per-round best claims.
///
/// Production: `RocksDbRoundLedger` (feature `rocksdb`)
/// Testing: `InMemoryRoundLedger`
///
/// Every method is one short critical section; implementations serialize
/// their own read-modify-write cycles so callers never hold a lock.
pub trait RoundLedger: Send + Sync {
    /// Find the peer owning `public_key_der`, creating it on first sight.
    ///
    /// A new peer starts with `interaction_count = 1`; an existing peer's
    /// count is incremented and `updated_at` set to `now`.
    fn resolve_peer(&self, public_key_der: &[u8], now: Timestamp) -> Result<Peer, LedgerError>;

    /// Look up a peer by id.
    fn peer(&self, id: PeerId) -> Result<Option<Peer>, LedgerError>;

    /// Best record for one round index, if any.
    fn best_round(&self, round: RoundIndex) -> Result<Option<Round>, LedgerError>;

    /// Atomically merge a candidate into its round.
    ///
    /// Creates the round if absent, raises it only for a strictly higher
    /// proximity, and otherwise leaves it untouched.
    fn record_claim(&self, candidate: RoundCandidate) -> Result<RecordOutcome, LedgerError>;

    /// Up to `limit` rounds with index `<= up_to`, most recent first.
    fn recent_rounds(&self, up_to: RoundIndex, limit: usize) -> Result<Vec<Round>, LedgerError>;
}

/// Hands a built claim to the flooding layer.
pub trait Announcer: Send + Sync {
    /// Queue `claim` for flooding. Failures are reported, never retried here.
    fn announce(&self, claim: Vec<u8>) -> Result<(), AnnounceError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in seconds since epoch.
    fn now(&self) -> Timestamp;
}
