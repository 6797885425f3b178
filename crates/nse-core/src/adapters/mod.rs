//! Adapters Layer - concrete implementations of the outbound ports
//!
//! - `InMemoryRoundLedger`: collections behind a mutex
//! - `RocksDbRoundLedger`: persistent ledger (feature `rocksdb`)
//! - `SystemTimeSource`: wall clock
//! - `ChannelAnnouncer`: hands claims to the relay transport

pub mod channel;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_ledger;
pub mod time;

pub use channel::ChannelAnnouncer;
pub use memory::InMemoryRoundLedger;
#[cfg(feature = "rocksdb")]
pub use rocksdb_ledger::RocksDbRoundLedger;
pub use time::SystemTimeSource;
