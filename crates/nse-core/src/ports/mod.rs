//! Ports Layer - Hexagonal Architecture Interfaces
//!
//! - Inbound (Driving): `ClaimReceiver`, `EstimateApi`
//! - Outbound (Driven): `RoundLedger`, `Announcer`, `TimeSource`

pub mod inbound;
pub mod outbound;

pub use inbound::{ClaimReceiver, EstimateApi, IngestOutcome, Rejection};
pub use outbound::{Announcer, RoundLedger, TimeSource};
