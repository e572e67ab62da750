//! AEAD engines and random material for containers.

use aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use zeroize::Zeroize;

use crate::kdf::derive_key_material;
use crate::types::{HadesError, KdfParams, Mode};

/// AEAD authentication tag length (16 bytes for both supported ciphers).
pub const AEAD_TAG_LEN: usize = 16;

/// Chunk nonce length: 8-byte random prefix plus 4-byte big-endian counter.
pub const NONCE_LEN: usize = 12;

/// A sealed chunk cipher for one container.
///
/// The cascade seals the inner AES-GCM output again with ChaCha20-Poly1305
/// under an independently derived key. Both ciphers take 96-bit nonces, so
/// the outer layer reuses the inner nonce value.
pub enum AeadEngine {
    Aes(Aes256Gcm),
    ChaCha(ChaCha20Poly1305),
    Cascade {
        inner: Aes256Gcm,
        outer: ChaCha20Poly1305,
    },
}

impl AeadEngine {
    /// Derive the keys for `mode` and build the cipher(s). Key bytes are
    /// wiped once the ciphers own their key schedules.
    pub fn for_mode(
        mode: Mode,
        secret: &[u8],
        salt: &[u8],
        params: KdfParams,
    ) -> Result<Self, HadesError> {
        let keys = derive_key_material(secret, salt, params, mode)?;
        let engine = match mode {
            Mode::Aes256Gcm => AeadEngine::Aes(
                Aes256Gcm::new_from_slice(&keys.primary)
                    .map_err(|_| HadesError::AuthenticationFailed)?,
            ),
            Mode::ChaCha20Poly1305 => AeadEngine::ChaCha(
                ChaCha20Poly1305::new_from_slice(&keys.primary)
                    .map_err(|_| HadesError::AuthenticationFailed)?,
            ),
            Mode::Cascade => {
                let secondary = keys.secondary.as_ref().ok_or(HadesError::BadFormat)?;
                AeadEngine::Cascade {
                    inner: Aes256Gcm::new_from_slice(&keys.primary)
                        .map_err(|_| HadesError::AuthenticationFailed)?,
                    outer: ChaCha20Poly1305::new_from_slice(secondary)
                        .map_err(|_| HadesError::AuthenticationFailed)?,
                }
            }
            Mode::External => return Err(HadesError::UnsupportedMode(Mode::External.id())),
        };
        Ok(engine)
    }

    /// Ciphertext expansion per chunk.
    pub fn overhead(&self) -> usize {
        match self {
            AeadEngine::Cascade { .. } => 2 * AEAD_TAG_LEN,
            _ => AEAD_TAG_LEN,
        }
    }

    /// Seal one chunk under the given 12-byte nonce.
    pub fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>, HadesError> {
        match self {
            AeadEngine::Aes(cipher) => cipher
                .encrypt(nonce.into(), plaintext)
                .map_err(|_| HadesError::AuthenticationFailed),
            AeadEngine::ChaCha(cipher) => cipher
                .encrypt(nonce.into(), plaintext)
                .map_err(|_| HadesError::AuthenticationFailed),
            AeadEngine::Cascade { inner, outer } => {
                let mut sealed = inner
                    .encrypt(nonce.into(), plaintext)
                    .map_err(|_| HadesError::AuthenticationFailed)?;
                let out = outer
                    .encrypt(nonce.into(), sealed.as_slice())
                    .map_err(|_| HadesError::AuthenticationFailed);
                sealed.zeroize();
                out
            }
        }
    }

    /// Open one chunk; any tag failure (either cascade layer) is
    /// [`HadesError::AuthenticationFailed`].
    pub fn open(&self, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, HadesError> {
        match self {
            AeadEngine::Aes(cipher) => cipher
                .decrypt(nonce.into(), ciphertext)
                .map_err(|_| HadesError::AuthenticationFailed),
            AeadEngine::ChaCha(cipher) => cipher
                .decrypt(nonce.into(), ciphertext)
                .map_err(|_| HadesError::AuthenticationFailed),
            AeadEngine::Cascade { inner, outer } => {
                let mut intermediate = outer
                    .decrypt(nonce.into(), ciphertext)
                    .map_err(|_| HadesError::AuthenticationFailed)?;
                let out = inner
                    .decrypt(nonce.into(), intermediate.as_slice())
                    .map_err(|_| HadesError::AuthenticationFailed);
                intermediate.zeroize();
                out
            }
        }
    }
}

/// Generate the 16 random salt bytes for a new container.
pub fn generate_salt() -> Result<[u8; 16], HadesError> {
    let mut salt = [0u8; 16];
    getrandom::fill(&mut salt).map_err(std::io::Error::from)?;
    Ok(salt)
}

/// Generate the 8 random nonce-prefix bytes for a new container.
pub fn generate_nonce_prefix() -> Result<[u8; 8], HadesError> {
    let mut prefix = [0u8; 8];
    getrandom::fill(&mut prefix).map_err(std::io::Error::from)?;
    Ok(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> KdfParams {
        KdfParams {
            time_cost: 1,
            mem_kib: 8 * 1024,
            parallelism: 1,
        }
    }

    fn engine(mode: Mode) -> AeadEngine {
        AeadEngine::for_mode(mode, b"pw", &[9u8; 16], test_params()).unwrap()
    }

    #[test]
    fn seal_open_round_trip_all_modes() {
        let nonce = [1u8; NONCE_LEN];
        for mode in [Mode::Aes256Gcm, Mode::ChaCha20Poly1305, Mode::Cascade] {
            let e = engine(mode);
            let sealed = e.seal(&nonce, b"hello").unwrap();
            assert_eq!(sealed.len(), 5 + e.overhead());
            assert_eq!(e.open(&nonce, &sealed).unwrap(), b"hello");
        }
    }

    #[test]
    fn tampered_chunk_is_rejected() {
        let nonce = [1u8; NONCE_LEN];
        for mode in [Mode::Aes256Gcm, Mode::ChaCha20Poly1305, Mode::Cascade] {
            let e = engine(mode);
            let mut sealed = e.seal(&nonce, b"hello").unwrap();
            sealed[0] ^= 0x01;
            assert!(matches!(
                e.open(&nonce, &sealed),
                Err(HadesError::AuthenticationFailed)
            ));
        }
    }

    #[test]
    fn wrong_nonce_is_rejected() {
        let e = engine(Mode::Aes256Gcm);
        let sealed = e.seal(&[1u8; NONCE_LEN], b"hello").unwrap();
        assert!(matches!(
            e.open(&[2u8; NONCE_LEN], &sealed),
            Err(HadesError::AuthenticationFailed)
        ));
    }

    #[test]
    fn external_mode_has_no_engine() {
        assert!(matches!(
            AeadEngine::for_mode(Mode::External, b"pw", &[0u8; 16], test_params()),
            Err(HadesError::UnsupportedMode(6))
        ));
    }
}
