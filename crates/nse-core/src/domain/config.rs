//! Estimation parameters shared by the scheduler, ingress and responder.

use crate::protocol::pow::DEFAULT_PROOF_OF_WORK_BITS;

/// Network-wide and local estimation parameters.
///
/// `frequency` and `proof_of_work_bits` must match every other node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimationConfig {
    /// Round length in seconds.
    pub frequency: u64,
    /// Rounds considered by an estimate.
    pub respected_rounds: usize,
    /// How many rounds ahead a claim may be and still be recorded.
    pub max_backlog_rounds: u64,
    pub proof_of_work_bits: u32,
    /// Claims below this proximity are dropped before any crypto.
    pub min_proximity: u8,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            frequency: 300,
            respected_rounds: 8,
            max_backlog_rounds: 2,
            proof_of_work_bits: DEFAULT_PROOF_OF_WORK_BITS,
            min_proximity: 0,
        }
    }
}

impl EstimationConfig {
    /// Cheap proof of work for tests.
    pub fn for_testing() -> Self {
        Self {
            proof_of_work_bits: 4,
            ..Self::default()
        }
    }
}
