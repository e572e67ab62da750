//! Key derivation functions.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::types::{HadesError, KdfParams, Mode};

/// Domain suffix mixed into the secondary (cascade) derivation input.
const CASCADE_SUFFIX: &[u8] = b"paranoid";

/// Keys for one container: the cascade mode carries an independently
/// derived key for the outer layer.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    pub primary: [u8; 32],
    pub secondary: Option<[u8; 32]>,
}

/// Derive a 32-byte key with Argon2id over (secret, salt).
pub fn derive_key(
    secret: &[u8],
    salt: &[u8],
    params: KdfParams,
) -> Result<[u8; 32], HadesError> {
    let argon_params = Params::new(params.mem_kib, params.time_cost, params.parallelism, Some(32))
        .map_err(|_| HadesError::OutOfMemory)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
    let mut out = [0u8; 32];
    argon2
        .hash_password_into(secret, salt, &mut out)
        .map_err(|_| HadesError::OutOfMemory)?;
    Ok(out)
}

/// Derive the key material for `mode`.
///
/// The cascade's outer key is derived over `secret ∥ "paranoid"` with the
/// time cost doubled, so the two layers never share a key.
pub fn derive_key_material(
    secret: &[u8],
    salt: &[u8],
    params: KdfParams,
    mode: Mode,
) -> Result<KeyMaterial, HadesError> {
    let primary = derive_key(secret, salt, params)?;
    let secondary = if mode == Mode::Cascade {
        let mut input = Zeroizing::new(Vec::with_capacity(secret.len() + CASCADE_SUFFIX.len()));
        input.extend_from_slice(secret);
        input.extend_from_slice(CASCADE_SUFFIX);
        let outer_params = KdfParams {
            time_cost: params.time_cost * 2,
            ..params
        };
        Some(derive_key(&input, salt, outer_params)?)
    } else {
        None
    };
    Ok(KeyMaterial { primary, secondary })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keep the memory cost low; these tests only care about determinism.
    fn test_params() -> KdfParams {
        KdfParams {
            time_cost: 1,
            mem_kib: 8 * 1024,
            parallelism: 1,
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let salt = [7u8; 16];
        let a = derive_key(b"secret", &salt, test_params()).unwrap();
        let b = derive_key(b"secret", &salt, test_params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn salt_changes_key() {
        let a = derive_key(b"secret", &[0u8; 16], test_params()).unwrap();
        let b = derive_key(b"secret", &[1u8; 16], test_params()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn cascade_keys_are_independent() {
        let salt = [3u8; 16];
        let keys = derive_key_material(b"pw", &salt, test_params(), Mode::Cascade).unwrap();
        let secondary = keys.secondary.expect("cascade derives a secondary key");
        assert_ne!(keys.primary, secondary);
    }

    #[test]
    fn single_modes_have_no_secondary() {
        let salt = [3u8; 16];
        for mode in [Mode::Aes256Gcm, Mode::ChaCha20Poly1305] {
            let keys = derive_key_material(b"pw", &salt, test_params(), mode).unwrap();
            assert!(keys.secondary.is_none());
        }
    }
}
