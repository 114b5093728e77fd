//! Content keys: generation and raw/JWK export-import

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use zkpaste_core::{PasteError, PasteResult};

use crate::encoding::{from_url_safe_base64, to_url_safe_base64};
use crate::KEY_SIZE;

/// Anything that can key AES-256-GCM.
pub trait AeadKey {
    fn key_bytes(&self) -> &[u8; KEY_SIZE];
}

/// A per-paste 256-bit AES-GCM key. Zeroized on drop.
#[derive(Clone)]
pub struct ContentKey {
    bytes: [u8; KEY_SIZE],
}

impl ContentKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    fn from_slice(bytes: &[u8]) -> PasteResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            PasteError::KeyFormat(format!(
                "key has wrong size: {} bytes (expected {KEY_SIZE})",
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl AeadKey for ContentKey {
    fn key_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit content key.
pub fn generate_key() -> ContentKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    ContentKey::from_bytes(bytes)
}

/// Export as unpadded URL-safe base64, for the `&key=` URL fragment.
pub fn export_key_raw(key: &ContentKey) -> String {
    to_url_safe_base64(key.as_bytes())
}

pub fn import_key_raw(s: &str) -> PasteResult<ContentKey> {
    let mut bytes = from_url_safe_base64(s.trim())
        .map_err(|e| PasteError::KeyFormat(format!("raw key: {e}")))?;
    let key = ContentKey::from_slice(&bytes);
    bytes.zeroize();
    key
}

/// JSON Web Key for a symmetric AES-256-GCM key (RFC 7517/7518).
///
/// Field set and order match what browsers emit from `exportKey("jwk")`, so
/// wrapped keys stay interchangeable with web clients.
#[derive(Serialize, Deserialize)]
struct Jwk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ext: Option<bool>,
    k: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_ops: Option<Vec<String>>,
    kty: String,
}

impl Drop for Jwk {
    fn drop(&mut self) {
        self.k.zeroize();
    }
}

/// Export as a JWK JSON string.
pub fn export_key(key: &ContentKey) -> PasteResult<String> {
    let jwk = Jwk {
        alg: Some("A256GCM".into()),
        ext: Some(true),
        k: export_key_raw(key),
        key_ops: Some(vec!["encrypt".into(), "decrypt".into()]),
        kty: "oct".into(),
    };
    serde_json::to_string(&jwk).map_err(|e| PasteError::KeyFormat(format!("JWK serialization: {e}")))
}

/// Import a JWK JSON string. `kty` must be `oct`; `alg`, if present, `A256GCM`.
pub fn import_key(json: &str) -> PasteResult<ContentKey> {
    let jwk: Jwk =
        serde_json::from_str(json).map_err(|e| PasteError::KeyFormat(format!("JWK parse: {e}")))?;

    if jwk.kty != "oct" {
        return Err(PasteError::KeyFormat(format!(
            "JWK kty must be \"oct\" (got {:?})",
            jwk.kty
        )));
    }
    if let Some(alg) = jwk.alg.as_deref() {
        if alg != "A256GCM" {
            return Err(PasteError::KeyFormat(format!(
                "JWK alg must be \"A256GCM\" (got {alg:?})"
            )));
        }
    }

    import_key_raw(&jwk.k)
}
