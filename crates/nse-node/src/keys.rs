//! RSA identity loading and generation.

use std::fs;
use std::path::Path;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use thiserror::Error;
use tracing::info;

use nse_core::protocol::REQUIRED_KEY_BITS;

/// Key file failures. All of them are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Cannot access key file {path}: {error}")]
    Io { path: String, error: String },

    #[error("Cannot parse key file {path}: {error}")]
    Parse { path: String, error: String },

    #[error("Key file {0} holds a public key, a private key is required")]
    MissingPrivateKey(String),

    #[error("Key in {path} has {bits} bits, exactly {REQUIRED_KEY_BITS} are required")]
    UnsupportedKeySize { path: String, bits: usize },

    #[error("Refusing to overwrite existing key file {0}")]
    AlreadyExists(String),

    #[error("Key generation failed: {0}")]
    Generate(String),
}

/// Load a 4096-bit RSA private key from a PEM file.
///
/// Accepts PKCS#8 (`PRIVATE KEY`) and PKCS#1 (`RSA PRIVATE KEY`) encodings.
pub fn load_private_key<P: AsRef<Path>>(path: P) -> Result<RsaPrivateKey, KeyError> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let pem = fs::read_to_string(path).map_err(|e| KeyError::Io {
        path: origin.clone(),
        error: e.to_string(),
    })?;
    parse_private_key(&pem, &origin)
}

/// Parse PEM text; `origin` names the source in errors.
pub fn parse_private_key(pem: &str, origin: &str) -> Result<RsaPrivateKey, KeyError> {
    if pem.contains("PUBLIC KEY-----") {
        return Err(KeyError::MissingPrivateKey(origin.to_string()));
    }
    let key = RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|pkcs8_err| {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|_| pkcs8_err.to_string())
        })
        .map_err(|error| KeyError::Parse {
            path: origin.to_string(),
            error,
        })?;

    let bits = key.n().bits();
    if bits != REQUIRED_KEY_BITS {
        return Err(KeyError::UnsupportedKeySize {
            path: origin.to_string(),
            bits,
        });
    }
    Ok(key)
}

/// Write `key` as PKCS#8 PEM.
pub fn write_private_key<P: AsRef<Path>>(key: &RsaPrivateKey, path: P, force: bool) -> Result<(), KeyError> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    if path.exists() && !force {
        return Err(KeyError::AlreadyExists(origin));
    }
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeyError::Generate(e.to_string()))?;
    fs::write(path, pem.as_bytes()).map_err(|e| KeyError::Io {
        path: origin.clone(),
        error: e.to_string(),
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| KeyError::Io {
            path: origin,
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Generate a fresh 4096-bit identity and store it at `path`.
pub fn generate_key<P: AsRef<Path>>(path: P, force: bool) -> Result<RsaPrivateKey, KeyError> {
    let path = path.as_ref();
    if path.exists() && !force {
        return Err(KeyError::AlreadyExists(path.display().to_string()));
    }
    info!(path = %path.display(), bits = REQUIRED_KEY_BITS, "Generating RSA key");
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), REQUIRED_KEY_BITS)
        .map_err(|e| KeyError::Generate(e.to_string()))?;
    write_private_key(&key, path, force)?;
    Ok(key)
}
