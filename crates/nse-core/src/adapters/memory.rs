//! In-memory round ledger.
//!
//! Used by tests and by nodes started without a persistent database. All state
//! sits behind one mutex, so each trait call is a single critical section.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::domain::{
    merge_best, LedgerError, Peer, PeerId, RecordOutcome, Round, RoundCandidate, RoundIndex,
    Timestamp,
};
use crate::ports::outbound::RoundLedger;

#[derive(Debug, Default)]
struct LedgerState {
    peers: HashMap<PeerId, Peer>,
    peer_ids: HashMap<Vec<u8>, PeerId>,
    rounds: BTreeMap<RoundIndex, Round>,
    next_peer_id: u64,
    next_round_id: u64,
}

/// `RoundLedger` backed by ordinary collections.
#[derive(Debug, Default)]
pub struct InMemoryRoundLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryRoundLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known peers.
    pub fn peer_count(&self) -> usize {
        self.state.lock().peers.len()
    }

    /// Number of rounds with a recorded best.
    pub fn round_count(&self) -> usize {
        self.state.lock().rounds.len()
    }
}

impl RoundLedger for InMemoryRoundLedger {
    fn resolve_peer(&self, public_key_der: &[u8], now: Timestamp) -> Result<Peer, LedgerError> {
        let mut state = self.state.lock();
        if let Some(id) = state.peer_ids.get(public_key_der).copied() {
            let peer = state.peers.get_mut(&id).ok_or(LedgerError::UnknownPeer(id.0))?;
            peer.interaction_count = peer.interaction_count.saturating_add(1);
            peer.updated_at = now;
            return Ok(peer.clone());
        }

        state.next_peer_id += 1;
        let peer = Peer {
            id: PeerId(state.next_peer_id),
            public_key: public_key_der.to_vec(),
            interaction_count: 1,
            created_at: now,
            updated_at: now,
        };
        state.peer_ids.insert(peer.public_key.clone(), peer.id);
        state.peers.insert(peer.id, peer.clone());
        Ok(peer)
    }

    fn peer(&self, id: PeerId) -> Result<Option<Peer>, LedgerError> {
        Ok(self.state.lock().peers.get(&id).cloned())
    }

    fn best_round(&self, round: RoundIndex) -> Result<Option<Round>, LedgerError> {
        Ok(self.state.lock().rounds.get(&round).cloned())
    }

    fn record_claim(&self, candidate: RoundCandidate) -> Result<RecordOutcome, LedgerError> {
        let mut state = self.state.lock();
        let existing = state.rounds.get(&candidate.round).cloned();
        let next_id = state.next_round_id + 1;

        let Some(merged) = merge_best(existing.as_ref(), &candidate, next_id) else {
            return Ok(RecordOutcome::Kept {
                best: existing.map(|r| r.proximity).unwrap_or_default(),
            });
        };

        state.rounds.insert(merged.round, merged.clone());
        Ok(match existing {
            None => {
                state.next_round_id = next_id;
                RecordOutcome::Created(merged)
            }
            Some(previous) => RecordOutcome::Raised {
                previous: previous.proximity,
                round: merged,
            },
        })
    }

    fn recent_rounds(&self, up_to: RoundIndex, limit: usize) -> Result<Vec<Round>, LedgerError> {
        Ok(self
            .state
            .lock()
            .rounds
            .range(..=up_to)
            .rev()
            .take(limit)
            .map(|(_, round)| round.clone())
            .collect())
    }
}
