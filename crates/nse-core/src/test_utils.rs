//! Test utilities for network size estimation.
//!
//! Fixture keys, controllable clocks and a recording announcer.
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use nse_core::test_utils::ControllableTimeSource;
//! use nse_core::TimeSource;
//!
//! let clock = ControllableTimeSource::new(1000);
//! clock.advance(300);
//! assert_eq!(clock.now().as_secs(), 1300);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::domain::{AnnounceError, Timestamp};
use crate::ports::outbound::{Announcer, TimeSource};

/// PEM of the primary 4096-bit fixture key.
pub const FIXTURE_KEY_PEM: &str = include_str!("../fixtures/node_a.pem");
/// PEM of a second, unrelated 4096-bit key.
pub const SECOND_FIXTURE_KEY_PEM: &str = include_str!("../fixtures/node_b.pem");
/// PEM of a third 4096-bit key.
pub const THIRD_FIXTURE_KEY_PEM: &str = include_str!("../fixtures/node_c.pem");
/// PEM of a 2048-bit key.
pub const UNDERSIZED_KEY_PEM: &str = include_str!("../fixtures/undersized.pem");

fn parse(pem: &str) -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs8_pem(pem).expect("fixture PEM is valid PKCS#8")
}

/// Primary fixture key.
pub fn fixture_key() -> RsaPrivateKey {
    parse(FIXTURE_KEY_PEM)
}

/// Public half of [`fixture_key`].
pub fn fixture_public_key() -> RsaPublicKey {
    fixture_key().to_public_key()
}

/// A second identity, for multi-peer scenarios.
pub fn second_fixture_key() -> RsaPrivateKey {
    parse(SECOND_FIXTURE_KEY_PEM)
}

pub fn third_fixture_key() -> RsaPrivateKey {
    parse(THIRD_FIXTURE_KEY_PEM)
}

/// 2048-bit key; every build with it must fail.
pub fn undersized_key() -> RsaPrivateKey {
    parse(UNDERSIZED_KEY_PEM)
}

/// A time source that returns a fixed timestamp.
#[derive(Debug, Clone)]
pub struct FixedTimeSource {
    timestamp: u64,
}

impl FixedTimeSource {
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.timestamp)
    }
}

/// A time source tests can move forward.
#[derive(Debug, Default)]
pub struct ControllableTimeSource {
    secs: AtomicU64,
}

impl ControllableTimeSource {
    pub fn new(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.secs.load(Ordering::SeqCst))
    }
}

/// Announcer that keeps every claim it is given.
#[derive(Debug, Default)]
pub struct RecordingAnnouncer {
    announced: Mutex<Vec<Vec<u8>>>,
    offline: bool,
}

impl RecordingAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// An announcer whose transport is always down.
    pub fn offline() -> Self {
        Self {
            announced: Mutex::new(Vec::new()),
            offline: true,
        }
    }

    pub fn announced(&self) -> Vec<Vec<u8>> {
        self.announced.lock().clone()
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, claim: Vec<u8>) -> Result<(), AnnounceError> {
        if self.offline {
            return Err(AnnounceError::TransportUnavailable);
        }
        self.announced.lock().push(claim);
        Ok(())
    }
}
