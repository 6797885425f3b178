//! Round clock, acceptance window and best-claim merge rules.

use super::{Round, RoundCandidate, RoundIndex, Timestamp};

/// Maps wall-clock time onto fixed-length rounds of `frequency` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundClock {
    frequency: u64,
}

impl RoundClock {
    /// Create a clock; a zero frequency is raised to one second.
    pub fn new(frequency_secs: u64) -> Self {
        Self {
            frequency: frequency_secs.max(1),
        }
    }

    /// Round length in seconds.
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// `floor(time / frequency)`.
    pub fn round_of(&self, time: u64) -> RoundIndex {
        (time / self.frequency) as RoundIndex
    }

    /// Round containing `now`.
    pub fn current_round(&self, now: Timestamp) -> RoundIndex {
        self.round_of(now.as_secs())
    }

    /// UNIX time at which the round containing `now` began.
    pub fn round_start(&self, now: Timestamp) -> u64 {
        let secs = now.as_secs();
        secs - secs % self.frequency
    }

    /// Whole seconds left in the round containing `now`, minus one.
    pub fn remaining_in_round(&self, now: Timestamp) -> u64 {
        (self.frequency - now.as_secs() % self.frequency).saturating_sub(1)
    }
}

/// Where a claimed round falls relative to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPlacement {
    Current,
    /// Ahead of the current round, within tolerance.
    Backlog { ahead: u64 },
    Stale { behind: u64 },
    TooFarAhead { ahead: u64 },
}

impl RoundPlacement {
    /// Whether claims in this placement may touch the ledger.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Current | Self::Backlog { .. })
    }
}

/// Classify `claimed` against `current` given the backlog tolerance.
pub fn place_round(claimed: RoundIndex, current: RoundIndex, max_backlog_rounds: u64) -> RoundPlacement {
    match claimed.cmp(&current) {
        std::cmp::Ordering::Equal => RoundPlacement::Current,
        std::cmp::Ordering::Less => RoundPlacement::Stale {
            behind: current.abs_diff(claimed),
        },
        std::cmp::Ordering::Greater => {
            let ahead = claimed.abs_diff(current);
            if ahead <= max_backlog_rounds {
                RoundPlacement::Backlog { ahead }
            } else {
                RoundPlacement::TooFarAhead { ahead }
            }
        }
    }
}

/// Merge a candidate into the existing best record for its round.
///
/// Returns the record to store, or `None` when the candidate is not strictly
/// better. Ledgers call this inside their read-modify-write critical section.
pub fn merge_best(existing: Option<&Round>, candidate: &RoundCandidate, next_id: u64) -> Option<Round> {
    match existing {
        None => Some(Round {
            id: next_id,
            round: candidate.round,
            proximity: candidate.proximity,
            max_hops: candidate.hop_count,
            peer_id: candidate.peer_id,
            backlog: candidate.backlog,
            created_at: candidate.seen_at,
            updated_at: candidate.seen_at,
        }),
        Some(best) if candidate.proximity > best.proximity => Some(Round {
            proximity: candidate.proximity,
            max_hops: best.max_hops.max(candidate.hop_count),
            peer_id: candidate.peer_id,
            updated_at: candidate.seen_at,
            ..best.clone()
        }),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PeerId;

    fn candidate(round: RoundIndex, proximity: u8, hops: u16, peer: u64) -> RoundCandidate {
        RoundCandidate {
            round,
            proximity,
            hop_count: hops,
            peer_id: PeerId(peer),
            backlog: false,
            seen_at: Timestamp::new(1000),
        }
    }

    #[test]
    fn test_round_clock() {
        let clock = RoundClock::new(300);
        let now = Timestamp::new(3_000_123);
        assert_eq!(clock.current_round(now), 10_000);
        assert_eq!(clock.round_start(now), 3_000_000);
        assert_eq!(clock.remaining_in_round(now), 176);
        assert_eq!(clock.remaining_in_round(Timestamp::new(3_000_299)), 0);
    }

    #[test]
    fn test_zero_frequency_is_clamped() {
        let clock = RoundClock::new(0);
        assert_eq!(clock.frequency(), 1);
        assert_eq!(clock.current_round(Timestamp::new(42)), 42);
    }

    #[test]
    fn test_backlog_boundary() {
        assert_eq!(place_round(10, 10, 2), RoundPlacement::Current);
        assert_eq!(place_round(12, 10, 2), RoundPlacement::Backlog { ahead: 2 });
        assert_eq!(place_round(13, 10, 2), RoundPlacement::TooFarAhead { ahead: 3 });
        assert_eq!(place_round(9, 10, 2), RoundPlacement::Stale { behind: 1 });
        assert!(place_round(12, 10, 2).is_accepted());
        assert!(!place_round(13, 10, 2).is_accepted());
        assert!(!place_round(9, 10, 2).is_accepted());
    }

    #[test]
    fn test_merge_creates_first_record() {
        let merged = merge_best(None, &candidate(7, 3, 2, 1), 99).unwrap();
        assert_eq!(merged.id, 99);
        assert_eq!(merged.proximity, 3);
        assert_eq!(merged.max_hops, 2);
    }

    #[test]
    fn test_merge_requires_strictly_greater() {
        let best = merge_best(None, &candidate(7, 5, 4, 1), 1).unwrap();
        assert!(merge_best(Some(&best), &candidate(7, 5, 9, 2), 2).is_none());
        assert!(merge_best(Some(&best), &candidate(7, 4, 9, 2), 2).is_none());

        let raised = merge_best(Some(&best), &candidate(7, 6, 1, 2), 2).unwrap();
        assert_eq!(raised.id, best.id);
        assert_eq!(raised.proximity, 6);
        assert_eq!(raised.max_hops, 4);
        assert_eq!(raised.peer_id, PeerId(2));
    }
}
