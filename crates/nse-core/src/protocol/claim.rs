//! Proximity claim codec.
//!
//! ```text
//! reserved:u8 | hop_count:u16 | proximity:u8 | key_length:u16 |
//! round_time:u64 | pow_nonce:u64 | public_key_der | signature:512
//! ```
//!
//! All integers are big-endian. The proof of work and the signature both cover
//! everything from `proximity` up to the signature, so relays may bump the hop
//! count without invalidating the claim.

use bytes::{Buf, BufMut, BytesMut};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha512};

use super::pow::{self, DEFAULT_PROOF_OF_WORK_BITS, MAX_PROOF_OF_WORK_BITS};
use crate::domain::{calculate_proximity, BuildError, ProtocolClaim, ValidationFailure};

/// Header length including the reserved leading byte.
pub const HEADER_LENGTH: usize = 22;
/// Length of an RSA-4096 signature.
pub const SIGNATURE_LENGTH: usize = 512;
/// Bytes skipped before the signed region (reserved byte and hop count).
pub const SIGNED_OFFSET: usize = 3;
/// Shortest message worth parsing.
pub const MIN_MESSAGE_LENGTH: usize = 2 * SIGNATURE_LENGTH;
/// The only supported modulus size.
pub const REQUIRED_KEY_BITS: usize = 4096;

/// Offset of the nonce inside the signed region.
const NONCE_OFFSET: usize = 1 + 2 + 8;

/// Key handed to [`build_claim`].
///
/// Keys are often loaded from files that may hold only the public half; that
/// case is rejected rather than silently producing an unsigned claim.
#[derive(Debug, Clone, Copy)]
pub enum KeyMaterial<'a> {
    Private(&'a RsaPrivateKey),
    Public(&'a RsaPublicKey),
}

impl<'a> From<&'a RsaPrivateKey> for KeyMaterial<'a> {
    fn from(key: &'a RsaPrivateKey) -> Self {
        Self::Private(key)
    }
}

impl<'a> From<&'a RsaPublicKey> for KeyMaterial<'a> {
    fn from(key: &'a RsaPublicKey) -> Self {
        Self::Public(key)
    }
}

/// Options for [`build_claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Use this proximity instead of computing it from the key.
    pub proximity: Option<u8>,
    pub proof_of_work_bits: u32,
    pub hop_count: u16,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            proximity: None,
            proof_of_work_bits: DEFAULT_PROOF_OF_WORK_BITS,
            hop_count: 0,
        }
    }
}

/// Options for [`unpack_claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackOptions {
    pub min_proximity: u8,
    pub proof_of_work_bits: u32,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            min_proximity: 0,
            proof_of_work_bits: DEFAULT_PROOF_OF_WORK_BITS,
        }
    }
}

/// Build a signed, proof-of-work-stamped claim for `round_time`.
///
/// Fails before any proof-of-work search if the key cannot sign or is not
/// exactly 4096 bits.
pub fn build_claim<'a>(
    key: impl Into<KeyMaterial<'a>>,
    round_time: u64,
    options: BuildOptions,
) -> Result<Vec<u8>, BuildError> {
    let key = match key.into() {
        KeyMaterial::Private(key) => key,
        KeyMaterial::Public(_) => return Err(BuildError::MissingPrivateKey),
    };
    let key_bits = key.n().bits();
    if key_bits != REQUIRED_KEY_BITS {
        return Err(BuildError::UnsupportedKeySize(key_bits));
    }
    if options.proof_of_work_bits > MAX_PROOF_OF_WORK_BITS {
        return Err(BuildError::ProofOfWorkTooHard(options.proof_of_work_bits));
    }

    let public_key = key.to_public_key();
    let proximity = match options.proximity {
        Some(p) => p,
        None => {
            let p = calculate_proximity(&public_key, round_time);
            u8::try_from(p).map_err(|_| BuildError::ProximityOutOfRange(p))?
        }
    };

    let der = public_key
        .to_public_key_der()
        .map_err(|e| BuildError::Crypto(e.to_string()))?;
    let der = der.as_bytes();
    let key_length = u16::try_from(der.len())
        .map_err(|_| BuildError::Crypto(format!("public key of {} bytes", der.len())))?;

    let mut signed = signed_region(proximity, key_length, round_time, 0, der);
    pow::search(options.proof_of_work_bits, &mut signed, NONCE_OFFSET)
        .ok_or(BuildError::NonceSpaceExhausted(options.proof_of_work_bits))?;

    let digest = Sha512::digest(&signed);
    let signature = key
        .sign_with_rng(&mut rand::thread_rng(), Pss::new::<Sha512>(), &digest)
        .map_err(|e| BuildError::Crypto(e.to_string()))?;
    if signature.len() != SIGNATURE_LENGTH {
        return Err(BuildError::Crypto(format!(
            "signature of {} bytes",
            signature.len()
        )));
    }

    let mut message = BytesMut::with_capacity(SIGNED_OFFSET + signed.len() + SIGNATURE_LENGTH);
    message.put_u8(0);
    message.put_u16(options.hop_count);
    message.put_slice(&signed);
    message.put_slice(&signature);
    Ok(message.to_vec())
}

/// Validate a claim received from the network.
///
/// Checks run cheapest first; the proximity pre-filter only ever
/// short-circuits to a rejection.
pub fn unpack_claim(message: &[u8], options: UnpackOptions) -> Result<ProtocolClaim, ValidationFailure> {
    if message.len() < MIN_MESSAGE_LENGTH {
        return Err(ValidationFailure::InvalidFormat(format!(
            "message of {} bytes is shorter than {}",
            message.len(),
            MIN_MESSAGE_LENGTH
        )));
    }

    let mut header = &message[..HEADER_LENGTH];
    header.advance(1);
    let hop_count = header.get_u16();
    let proximity = header.get_u8();
    let key_length = header.get_u16() as usize;
    let round_time = header.get_u64();

    let expected = HEADER_LENGTH + key_length + SIGNATURE_LENGTH;
    if message.len() != expected {
        return Err(ValidationFailure::InvalidFormat(format!(
            "message of {} bytes, header announces {}",
            message.len(),
            expected
        )));
    }

    if proximity < options.min_proximity {
        return Err(ValidationFailure::ProximityTooLow {
            claimed: proximity,
            minimum: options.min_proximity,
        });
    }

    let signature_start = message.len() - SIGNATURE_LENGTH;
    let signed = &message[SIGNED_OFFSET..signature_start];
    if !pow::satisfies(options.proof_of_work_bits, signed) {
        return Err(ValidationFailure::InvalidProofOfWork {
            bits: options.proof_of_work_bits,
        });
    }

    let der = &message[HEADER_LENGTH..signature_start];
    let public_key = RsaPublicKey::from_public_key_der(der)
        .map_err(|e| ValidationFailure::InvalidFormat(format!("public key: {e}")))?;
    if public_key.n().bits() != REQUIRED_KEY_BITS {
        return Err(ValidationFailure::InvalidFormat(format!(
            "public key of {} bits",
            public_key.n().bits()
        )));
    }

    let digest = Sha512::digest(signed);
    public_key
        .verify(Pss::new::<Sha512>(), &digest, &message[signature_start..])
        .map_err(|_| ValidationFailure::InvalidSignature)?;

    let calculated = calculate_proximity(&public_key, round_time);
    if calculated != u16::from(proximity) {
        return Err(ValidationFailure::ProximityMismatch {
            claimed: proximity,
            calculated,
        });
    }

    Ok(ProtocolClaim {
        round_time,
        proximity,
        hop_count,
        public_key,
        public_key_der: der.to_vec(),
    })
}

/// Bytes covered by both the proof of work and the signature.
fn signed_region(proximity: u8, key_length: u16, round_time: u64, nonce: u64, der: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(HEADER_LENGTH - SIGNED_OFFSET + der.len());
    buf.put_u8(proximity);
    buf.put_u16(key_length);
    buf.put_u64(round_time);
    buf.put_u64(nonce);
    buf.put_slice(der);
    buf.to_vec()
}
