//! Domain Layer - Pure estimation logic with no I/O
//!
//! - Entities: claims, peers, round records, estimates
//! - Estimation parameters
//! - Proximity of a key to a round value
//! - Estimate, deviation and flood delay mathematics
//! - Round clock, acceptance window and best-claim merge rules

mod config;
mod entities;
mod errors;
pub mod estimate;
pub mod proximity;
pub mod rounds;

pub use config::EstimationConfig;
pub use entities::*;
pub use errors::*;
pub use estimate::{estimate_and_deviation, flood_delay, size_from_proximity, std_deviation};
pub use proximity::{calculate_proximity, ProximityInput};
pub use rounds::{merge_best, place_round, RoundClock, RoundPlacement};
