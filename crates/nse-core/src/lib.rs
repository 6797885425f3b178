//! # Network Size Estimation Engine
//!
//! Every participant compares its RSA identity against a hash of the current
//! time round. The closest participants flood a signed, proof-of-work-stamped
//! claim through a relay; every node keeps the best claim per round and turns
//! the recent bests into a network-size estimate.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** proximity, estimate and delay math, round rules
//! - **Protocol Layer:** claim codec, proof of work, relay/control frames
//! - **Ports Layer:** `RoundLedger`, `Announcer`, `TimeSource`, inbound APIs
//! - **Service Layer:** `RoundScheduler`, `GossipIngress`, `ControlResponder`
//! - **Adapters Layer:** in-memory and RocksDB ledgers, clock, channel announcer
//!
//! Transports, configuration and process bootstrap live in `nse-node`.
//!
//! ## Example
//!
//! ```rust
//! use nse_core::{estimate_and_deviation, RoundClock, Timestamp};
//!
//! let clock = RoundClock::new(300);
//! assert_eq!(clock.current_round(Timestamp::new(3_000_123)), 10_000);
//!
//! let estimate = estimate_and_deviation(&[10]);
//! assert_eq!(estimate.peers, 813);
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod protocol;
pub mod service;

/// Fixture keys, clocks and mock announcer.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// =============================================================================
// CORE RE-EXPORTS
// =============================================================================

// Domain
pub use domain::{
    AnnounceError, BuildError, Estimate, EstimationConfig, LedgerError, Peer, PeerId,
    ProtocolClaim, RecordOutcome, Round, RoundCandidate, RoundIndex, Timestamp,
    ValidationFailure,
};
pub use domain::{
    calculate_proximity, estimate_and_deviation, flood_delay, place_round, size_from_proximity,
    std_deviation, ProximityInput, RoundClock, RoundPlacement,
};

// Protocol
pub use protocol::{
    build_claim, unpack_claim, BuildOptions, Frame, FrameError, KeyMaterial, MessageType,
    UnpackOptions, DEFAULT_PROOF_OF_WORK_BITS,
};

// Port traits
pub use ports::{
    Announcer, ClaimReceiver, EstimateApi, IngestOutcome, Rejection, RoundLedger, TimeSource,
};

// Services
pub use service::{
    ControlResponder, GossipIngress, RoundFailure, RoundOutcome, RoundPlan, RoundScheduler,
};

// Adapters
pub use adapters::{ChannelAnnouncer, InMemoryRoundLedger, SystemTimeSource};
#[cfg(feature = "rocksdb")]
pub use adapters::RocksDbRoundLedger;
