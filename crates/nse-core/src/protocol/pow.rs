//! Proof of Work over the hashed claim header.
//!
//! A body satisfies a difficulty of `bits` when the `bits` least-significant
//! bits of `SHA-256(body)` are zero, i.e. the big-endian integer formed by the
//! digest's trailing `ceil(bits / 8)` bytes is divisible by `2^bits`. Build and
//! unpack share this one convention.

use sha2::{Digest, Sha256};

/// Default difficulty in bits.
pub const DEFAULT_PROOF_OF_WORK_BITS: u32 = 20;

/// Largest meaningful difficulty (the digest width).
pub const MAX_PROOF_OF_WORK_BITS: u32 = 256;

/// Check whether `SHA-256(body)` meets the difficulty.
pub fn satisfies(bits: u32, body: &[u8]) -> bool {
    has_trailing_zero_bits(&Sha256::digest(body), bits)
}

/// Check that the last `bits` bits of a big-endian digest are zero.
pub fn has_trailing_zero_bits(digest: &[u8], bits: u32) -> bool {
    let bits = bits as usize;
    if bits > digest.len() * 8 {
        return false;
    }
    let full_bytes = bits / 8;
    let rest = bits % 8;
    let tail = &digest[digest.len() - full_bytes..];
    if tail.iter().any(|b| *b != 0) {
        return false;
    }
    if rest == 0 {
        return true;
    }
    let mask = (1u8 << rest) - 1;
    digest[digest.len() - full_bytes - 1] & mask == 0
}

/// Brute-force the nonce space.
///
/// `body` holds the complete hashed bytes; the eight bytes at `nonce_offset`
/// are overwritten with each big-endian candidate. Returns the first nonce
/// that satisfies the difficulty, leaving it written into `body`, or `None`
/// once the 64-bit space is exhausted.
pub fn search(bits: u32, body: &mut [u8], nonce_offset: usize) -> Option<u64> {
    (0..=u64::MAX).find(|nonce| {
        body[nonce_offset..nonce_offset + 8].copy_from_slice(&nonce.to_be_bytes());
        satisfies(bits, body)
    })
}
