//! Optional compress-then-encrypt wrapper applied around a transfer
//! stream before it reaches a transport carrier.
//!
//! Compression uses `zstd`; confidentiality and integrity use
//! ChaCha20-Poly1305 AEAD with a key derived from an operator-supplied
//! passphrase via Argon2id. Key material is zeroized on drop so it
//! doesn't linger in process memory after a job completes.

use crate::error::EngineError;
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use zeroize::Zeroize;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Key material derived from a passphrase. Zeroized on drop; never
/// `Debug`/`Clone` so it can't leak into a log line by accident.
pub struct DerivedKey([u8; 32]);

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Derive a 256-bit key from `passphrase` and `salt` using Argon2id with
/// its library defaults (spec leaves the KDF parameters unspecified;
/// Argon2's own defaults are used rather than inventing tuning numbers).
pub fn derive_key(passphrase: &str, salt: &[u8; SALT_LEN]) -> Result<DerivedKey, EngineError> {
    let argon2 = Argon2::default();
    let mut out = [0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut out)
        .map_err(|e| EngineError::UserError {
            message: format!("key derivation failed: {}", e),
        })?;
    Ok(DerivedKey(out))
}

/// Generate a fresh random salt for a new encrypted session.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// An encrypted, compressed blob ready to hand to a transport carrier.
/// `salt` and `nonce` travel alongside the ciphertext since the receiver
/// needs them to reverse the transform.
pub struct SealedPayload {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Compress `plaintext` with zstd, then seal it with ChaCha20-Poly1305
/// under a key derived from `passphrase`. The salt and nonce are
/// generated fresh for every call.
pub fn seal(plaintext: &[u8], passphrase: &str) -> Result<SealedPayload, EngineError> {
    let compressed = zstd::encode_all(plaintext, DEFAULT_ZSTD_LEVEL).map_err(|e| EngineError::UserError {
        message: format!("compression failed: {}", e),
    })?;

    let salt = generate_salt();
    let key = derive_key(passphrase, &salt)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.0));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, compressed.as_slice())
        .map_err(|_| EngineError::UserError {
            message: "encryption failed".to_string(),
        })?;

    Ok(SealedPayload {
        salt,
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Reverse of [`seal`]: decrypt, then decompress, returning the
/// original plaintext. A wrong passphrase or corrupted ciphertext fails
/// AEAD verification and surfaces as an `IntegrityViolation`.
pub fn unseal(payload: &SealedPayload, passphrase: &str) -> Result<Vec<u8>, EngineError> {
    let key = derive_key(passphrase, &payload.salt)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.0));
    let nonce = Nonce::from_slice(&payload.nonce);

    let compressed = cipher
        .decrypt(nonce, payload.ciphertext.as_slice())
        .map_err(|_| EngineError::IntegrityViolation {
            path: std::path::PathBuf::from("<sealed-payload>"),
            expected: "valid AEAD tag".to_string(),
            actual: "authentication failed".to_string(),
        })?;

    zstd::decode_all(compressed.as_slice()).map_err(|e| EngineError::UserError {
        message: format!("decompression failed: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_unseal_round_trips() {
        let plaintext = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let sealed = seal(&plaintext, "correct horse battery staple").unwrap();
        let recovered = unseal(&sealed, "correct horse battery staple").unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn wrong_passphrase_fails_authentication() {
        let plaintext = b"secret profile data";
        let sealed = seal(plaintext, "right-passphrase").unwrap();
        let result = unseal(&sealed, "wrong-passphrase");
        assert!(matches!(result, Err(EngineError::IntegrityViolation { .. })));
    }

    #[test]
    fn distinct_calls_use_distinct_salts_and_nonces() {
        let plaintext = b"data";
        let a = seal(plaintext, "pw").unwrap();
        let b = seal(plaintext, "pw").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
    }
}
