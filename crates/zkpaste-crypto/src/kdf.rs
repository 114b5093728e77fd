//! Key derivation: Argon2id password → wrapping key

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use zkpaste_core::{PasteError, PasteResult};

use crate::keys::AeadKey;
use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit key derived from a human password via Argon2id.
///
/// Only ever used to wrap a content key, never the paste body itself.
/// Zeroized on drop.
#[derive(Clone)]
pub struct WrappingKey {
    bytes: [u8; KEY_SIZE],
}

impl WrappingKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl AeadKey for WrappingKey {
    fn key_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for WrappingKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappingKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id memory cost in KiB (64 MiB).
pub const ARGON2_MEM_COST_KIB: u32 = 65536;
/// Argon2id iterations.
pub const ARGON2_TIME_COST: u32 = 4;
pub const ARGON2_PARALLELISM: u32 = 1;

/// Argon2id parameters for KDF
///
/// Nothing about them is stored with a paste, so creator and viewer must
/// agree: production code always uses [`KdfParams::default`]. Other values
/// exist for tests and benchmarks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    pub mem_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: ARGON2_MEM_COST_KIB,
            time_cost: ARGON2_TIME_COST,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

/// Fresh random 16-byte salt, one per paste.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit wrapping key from a password and salt using Argon2id.
///
/// The salt is stored alongside the wrapped key; it does not need to be secret.
pub fn derive_key_from_password(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> PasteResult<WrappingKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| PasteError::Config(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| PasteError::Other(anyhow::anyhow!("Argon2id KDF failed: {e}")))?;

    Ok(WrappingKey::from_bytes(key))
}

#[cfg(test)]
pub(crate) fn fast_params() -> KdfParams {
    KdfParams {
        mem_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_kdf_deterministic() {
        let password = SecretString::from("test-password-123");
        let salt = [1u8; SALT_SIZE];

        let key1 = derive_key_from_password(&password, &salt, &fast_params()).unwrap();
        let key2 = derive_key_from_password(&password, &salt, &fast_params()).unwrap();

        assert_eq!(
            key1.as_bytes(),
            key2.as_bytes(),
            "KDF must be deterministic"
        );
    }

    #[test]
    fn test_kdf_different_passwords() {
        let salt = [1u8; SALT_SIZE];

        let key1 =
            derive_key_from_password(&SecretString::from("password-a"), &salt, &fast_params())
                .unwrap();
        let key2 =
            derive_key_from_password(&SecretString::from("password-b"), &salt, &fast_params())
                .unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different passwords must produce different keys"
        );
    }

    #[test]
    fn test_kdf_different_salts() {
        let password = SecretString::from("same-password");

        let key1 = derive_key_from_password(&password, &[1u8; SALT_SIZE], &fast_params()).unwrap();
        let key2 = derive_key_from_password(&password, &[2u8; SALT_SIZE], &fast_params()).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different salts must produce different keys"
        );
    }

    #[test]
    fn test_default_params_match_policy() {
        let params = KdfParams::default();
        assert_eq!(params.mem_cost_kib, 65536);
        assert_eq!(params.time_cost, 4);
        assert_eq!(params.parallelism, 1);
    }

    #[test]
    fn test_salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = KdfParams {
            mem_cost_kib: 1,
            time_cost: 1,
            parallelism: 1,
        };
        let result = derive_key_from_password(&SecretString::from("pw"), &[0u8; 16], &params);
        assert!(matches!(result, Err(PasteError::Config(_))));
    }
}
