//! # RocksDB Round Ledger
//!
//! Persistent `RoundLedger`. Records are bincode-encoded under prefixed keys:
//!
//! - `peer:<id>` - `Peer`
//! - `peer_key:<der>` - peer id owning a public key
//! - `round:<index>` - best `Round` for an index
//! - `meta:next_peer_id` - id counter
//!
//! Integers in keys are big-endian; round indices are offset by `2^63` so the
//! byte order matches numeric order. Read-modify-write cycles hold the write
//! half of the lock and commit through one `WriteBatch`.

use std::path::Path;

use parking_lot::RwLock;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{
    merge_best, LedgerError, Peer, PeerId, RecordOutcome, Round, RoundCandidate, RoundIndex,
    Timestamp,
};
use crate::ports::outbound::RoundLedger;

const PEER_PREFIX: &[u8] = b"peer:";
const PEER_KEY_PREFIX: &[u8] = b"peer_key:";
const ROUND_PREFIX: &[u8] = b"round:";
const NEXT_PEER_ID: &[u8] = b"meta:next_peer_id";

/// RocksDB-backed `RoundLedger`.
pub struct RocksDbRoundLedger {
    db: RwLock<DB>,
}

impl RocksDbRoundLedger {
    /// Open or create a ledger at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = DB::open(&opts, path.as_ref()).map_err(|e| {
            LedgerError::StorageUnavailable(format!("Failed to open RocksDB: {}", e))
        })?;
        Ok(Self { db: RwLock::new(db) })
    }

    fn peer_key(id: PeerId) -> Vec<u8> {
        [PEER_PREFIX, &id.0.to_be_bytes()[..]].concat()
    }

    fn peer_index_key(der: &[u8]) -> Vec<u8> {
        [PEER_KEY_PREFIX, der].concat()
    }

    fn round_key(round: RoundIndex) -> Vec<u8> {
        let ordered = (round as u64) ^ (1 << 63);
        [ROUND_PREFIX, &ordered.to_be_bytes()[..]].concat()
    }

    fn get<T: DeserializeOwned>(db: &DB, key: &[u8]) -> Result<Option<T>, LedgerError> {
        db.get(key)
            .map_err(|e| LedgerError::StorageUnavailable(format!("RocksDB get failed: {}", e)))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn get_u64(db: &DB, key: &[u8]) -> Result<Option<u64>, LedgerError> {
        let Some(bytes) = db
            .get(key)
            .map_err(|e| LedgerError::StorageUnavailable(format!("RocksDB get failed: {}", e)))?
        else {
            return Ok(None);
        };
        let raw: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| LedgerError::Corrupted(format!("{} bytes for a u64", bytes.len())))?;
        Ok(Some(u64::from_be_bytes(raw)))
    }

    fn write(db: &DB, batch: WriteBatch) -> Result<(), LedgerError> {
        db.write(batch)
            .map_err(|e| LedgerError::StorageUnavailable(format!("RocksDB batch write failed: {}", e)))
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    bincode::serialize(value).map_err(|e| LedgerError::Corrupted(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LedgerError> {
    bincode::deserialize(bytes).map_err(|e| LedgerError::Corrupted(e.to_string()))
}

impl RoundLedger for RocksDbRoundLedger {
    fn resolve_peer(&self, public_key_der: &[u8], now: Timestamp) -> Result<Peer, LedgerError> {
        let db = self.db.write();
        let index_key = Self::peer_index_key(public_key_der);
        let mut batch = WriteBatch::default();

        let peer = match Self::get_u64(&db, &index_key)? {
            Some(id) => {
                let mut peer: Peer =
                    Self::get(&db, &Self::peer_key(PeerId(id)))?.ok_or(LedgerError::UnknownPeer(id))?;
                peer.interaction_count = peer.interaction_count.saturating_add(1);
                peer.updated_at = now;
                peer
            }
            None => {
                let id = Self::get_u64(&db, NEXT_PEER_ID)?.unwrap_or(0) + 1;
                batch.put(NEXT_PEER_ID, id.to_be_bytes());
                batch.put(&index_key, id.to_be_bytes());
                Peer {
                    id: PeerId(id),
                    public_key: public_key_der.to_vec(),
                    interaction_count: 1,
                    created_at: now,
                    updated_at: now,
                }
            }
        };

        batch.put(Self::peer_key(peer.id), encode(&peer)?);
        Self::write(&db, batch)?;
        Ok(peer)
    }

    fn peer(&self, id: PeerId) -> Result<Option<Peer>, LedgerError> {
        Self::get(&self.db.read(), &Self::peer_key(id))
    }

    fn best_round(&self, round: RoundIndex) -> Result<Option<Round>, LedgerError> {
        Self::get(&self.db.read(), &Self::round_key(round))
    }

    fn record_claim(&self, candidate: RoundCandidate) -> Result<RecordOutcome, LedgerError> {
        let db = self.db.write();
        let key = Self::round_key(candidate.round);
        let existing: Option<Round> = Self::get(&db, &key)?;

        let Some(merged) = merge_best(existing.as_ref(), &candidate, candidate.round as u64) else {
            return Ok(RecordOutcome::Kept {
                best: existing.map(|r| r.proximity).unwrap_or_default(),
            });
        };

        let mut batch = WriteBatch::default();
        batch.put(&key, encode(&merged)?);
        Self::write(&db, batch)?;

        Ok(match existing {
            None => RecordOutcome::Created(merged),
            Some(previous) => RecordOutcome::Raised {
                previous: previous.proximity,
                round: merged,
            },
        })
    }

    fn recent_rounds(&self, up_to: RoundIndex, limit: usize) -> Result<Vec<Round>, LedgerError> {
        let db = self.db.read();
        let start = Self::round_key(up_to);
        let mut rounds = Vec::with_capacity(limit.min(64));

        for item in db.iterator(IteratorMode::From(&start[..], Direction::Reverse)) {
            if rounds.len() >= limit {
                break;
            }
            let (key, value) =
                item.map_err(|e| LedgerError::StorageUnavailable(format!("RocksDB scan failed: {}", e)))?;
            if !key.starts_with(ROUND_PREFIX) {
                break;
            }
            rounds.push(decode(&value)?);
        }
        Ok(rounds)
    }
}
