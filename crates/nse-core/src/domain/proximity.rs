//! Proximity calculation.
//!
//! The proximity of a key to a value is the number of leading bits shared by
//! `SHA-256(value)` and the 256 most-significant bits of the key modulus.
//! Anyone holding only the public key can recompute it.

use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};

/// Width of the compared bit strings.
pub const PROXIMITY_BITS: u16 = 256;

/// Value a proximity is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityInput<'a> {
    /// Encoded as its minimal big-endian byte string.
    Integer(u64),
    /// Hashed as-is.
    Bytes(&'a [u8]),
}

impl From<u64> for ProximityInput<'_> {
    fn from(value: u64) -> Self {
        Self::Integer(value)
    }
}

impl<'a> From<&'a [u8]> for ProximityInput<'a> {
    fn from(value: &'a [u8]) -> Self {
        Self::Bytes(value)
    }
}

/// Minimal big-endian encoding of an integer; zero is a single zero byte.
pub fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    bytes[skip..].to_vec()
}

/// Count the leading bits shared by `SHA-256(value)` and the key modulus.
///
/// Returns a value in `0..=256`.
pub fn calculate_proximity<'a>(public_key: &RsaPublicKey, value: impl Into<ProximityInput<'a>>) -> u16 {
    let digest = match value.into() {
        ProximityInput::Integer(v) => Sha256::digest(minimal_be_bytes(v)),
        ProximityInput::Bytes(b) => Sha256::digest(b),
    };

    let modulus = public_key.n().to_bytes_be();
    let modulus_bits = public_key.n().bits();
    let pad = modulus.len() * 8 - modulus_bits;
    let comparable = modulus_bits.min(PROXIMITY_BITS as usize);

    let mut proximity = 0u16;
    for i in 0..comparable {
        if bit_at(&digest, i) != bit_at(&modulus, pad + i) {
            break;
        }
        proximity += 1;
    }
    proximity
}

/// Bit `index` of a big-endian byte string, counted from the most significant bit.
#[inline]
fn bit_at(bytes: &[u8], index: usize) -> bool {
    (bytes[index / 8] >> (7 - index % 8)) & 1 == 1
}
