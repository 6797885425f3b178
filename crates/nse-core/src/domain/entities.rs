//! Core Domain Entities for Network Size Estimation
//!
//! `ProtocolClaim` is the transient, validated form of a wire message.
//! `Peer` and `Round` are the two records kept by the round ledger.

use rsa::RsaPublicKey;

/// Unix timestamp in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "rocksdb", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new timestamp.
    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds to timestamp (saturating).
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

/// Round index: `floor(round_time / frequency)`.
pub type RoundIndex = i64;

/// Surrogate key of a persisted peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "rocksdb", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerId(pub u64);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A proximity claim that passed every wire-level check.
///
/// The proximity has been recomputed from `public_key` and `round_time`, so it
/// can be trusted. `hop_count` is informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolClaim {
    /// Round-window identifier (UNIX time of the round start).
    pub round_time: u64,
    /// Leading-bit match count of the claimant's key against the round hash.
    pub proximity: u8,
    /// Relay hop counter.
    pub hop_count: u16,
    /// Claimant's 4096-bit RSA public key.
    pub public_key: RsaPublicKey,
    /// DER (SubjectPublicKeyInfo) encoding of `public_key`, as found on the wire.
    pub public_key_der: Vec<u8>,
}

/// A known claimant identity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "rocksdb", derive(serde::Serialize, serde::Deserialize))]
pub struct Peer {
    pub id: PeerId,
    /// DER-encoded public key; unique per peer.
    pub public_key: Vec<u8>,
    /// Number of times this key has been seen.
    pub interaction_count: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Best claim recorded for one round index.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "rocksdb", derive(serde::Serialize, serde::Deserialize))]
pub struct Round {
    /// Surrogate key; equals the round index for ledgers keyed by round.
    pub id: u64,
    pub round: RoundIndex,
    /// Best proximity seen for this round so far.
    pub proximity: u8,
    pub max_hops: u16,
    /// Claimant of the best proximity.
    pub peer_id: PeerId,
    /// Recorded before the round became current.
    pub backlog: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A validated claim ready to be merged into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundCandidate {
    pub round: RoundIndex,
    pub proximity: u8,
    pub hop_count: u16,
    pub peer_id: PeerId,
    pub backlog: bool,
    pub seen_at: Timestamp,
}

/// Result of merging a candidate into the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First claim for this round.
    Created(Round),
    /// Strictly better than the previous best.
    Raised { previous: u8, round: Round },
    /// Not better than the recorded best; nothing changed.
    Kept { best: u8 },
}

impl RecordOutcome {
    /// Whether the ledger changed.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Kept { .. })
    }
}

/// Network size estimate as returned to control-API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Estimate {
    pub peers: u32,
    pub std_deviation: u32,
}
