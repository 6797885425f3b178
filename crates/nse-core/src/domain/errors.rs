//! Domain Errors for Network Size Estimation
//!
//! Wire-level failures are values (`ValidationFailure`), never panics: invalid
//! claims are expected background noise. `BuildError` covers misuse on the
//! sending side and is surfaced immediately.

use thiserror::Error;

/// Why an incoming claim was rejected by `unpack`.
///
/// The sender only ever learns "rejected"; the variants exist for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// Wrong length, bad header, truncated or unparsable key.
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    /// Digest does not satisfy the required trailing zero bits.
    #[error("Invalid proof of work for {bits} bits")]
    InvalidProofOfWork {
        /// Required difficulty
        bits: u32,
    },

    /// RSA-PSS verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Claimed proximity is below the receiver's minimum.
    #[error("Proximity {claimed} is smaller than minimum {minimum}")]
    ProximityTooLow {
        /// Proximity found in the header
        claimed: u8,
        /// Configured minimum
        minimum: u8,
    },

    /// Claimed proximity disagrees with the value recomputed from the key.
    #[error("Claimed proximity {claimed} does not match calculated {calculated}")]
    ProximityMismatch {
        /// Proximity found in the header
        claimed: u8,
        /// Proximity recomputed from key and round time
        calculated: u16,
    },
}

/// Errors while constructing an outgoing claim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Only 4096-bit keys are supported.
    #[error("Only RSA keys of 4096 bits are supported, got {0} bits")]
    UnsupportedKeySize(usize),

    /// The key cannot sign.
    #[error("RSA key doesn't contain a private part")]
    MissingPrivateKey,

    /// A 256-bit match does not fit the one-byte wire field.
    #[error("Proximity {0} does not fit the wire format")]
    ProximityOutOfRange(u16),

    /// The PoW difficulty exceeds the digest width.
    #[error("Proof of work of {0} bits exceeds the 256-bit digest")]
    ProofOfWorkTooHard(u32),

    /// No nonce in the 64-bit space satisfied the difficulty.
    #[error("Nonce space exhausted without a {0}-bit proof of work")]
    NonceSpaceExhausted(u32),

    /// DER export or signing failed.
    #[error("Cryptographic failure: {0}")]
    Crypto(String),
}

/// Errors from the round ledger (storage contract).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Storage backend unavailable or failing.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A stored record could not be decoded.
    #[error("Corrupted record: {0}")]
    Corrupted(String),

    /// Referenced peer does not exist.
    #[error("Unknown peer: {0}")]
    UnknownPeer(u64),
}

/// Errors from the announce capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnounceError {
    /// No relay connection is live; a reconnect is pending.
    #[error("Relay transport unavailable")]
    TransportUnavailable,
}
