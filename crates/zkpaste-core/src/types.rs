//! Wire records exchanged with the paste backend.
//!
//! Everything here is either ciphertext (base64) or metadata the server is
//! allowed to see. The language tag and the plaintext burn token are never
//! part of these records; they live inside the encrypted envelope.

use serde::{Deserialize, Serialize};

use crate::error::{PasteError, PasteResult};
use crate::language::Language;

/// One AEAD output: base64 IV (12 bytes) and base64 ciphertext-with-tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub iv: String,
    pub data: String,
}

/// Password-wrapped content key, all fields base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordWrap {
    /// 16-byte Argon2id salt
    pub salt: String,
    /// IV used to wrap the content key
    pub key_iv: String,
    /// Wrapped (encrypted) content key
    pub encrypted_key: String,
}

/// Proof-of-work challenge as issued by `GET /challenge`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowChallenge {
    pub salt: String,
    pub difficulty: u32,
    pub timestamp: u64,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowSolution {
    pub nonce: String,
}

/// Body of `POST /paste`.
///
/// Build it with [`CreatePastePayload::new`] so `has_password` always agrees
/// with the presence of the wrap fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePastePayload {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub burn_after_read: bool,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub has_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burn_token_hash: Option<String>,
}

impl CreatePastePayload {
    pub fn new(
        envelope: Envelope,
        created_at: i64,
        expires_at: Option<i64>,
        burn_token_hash: Option<String>,
        wrap: Option<PasswordWrap>,
    ) -> Self {
        let has_password = wrap.is_some();
        let (salt, key_iv, encrypted_key) = match wrap {
            Some(w) => (Some(w.salt), Some(w.key_iv), Some(w.encrypted_key)),
            None => (None, None, None),
        };

        Self {
            envelope,
            created_at,
            expires_at,
            burn_after_read: burn_token_hash.is_some(),
            views: 0,
            has_password,
            salt,
            encrypted_key,
            key_iv,
            burn_token_hash,
        }
    }

    /// Returns the password wrap, or `None` for key-in-URL pastes.
    ///
    /// Fails with `CorruptData` when `has_password` disagrees with the
    /// presence of `salt`/`encryptedKey`/`keyIv`.
    pub fn password_wrap(&self) -> PasteResult<Option<PasswordWrap>> {
        match (
            self.has_password,
            &self.salt,
            &self.key_iv,
            &self.encrypted_key,
        ) {
            (true, Some(salt), Some(key_iv), Some(encrypted_key)) => Ok(Some(PasswordWrap {
                salt: salt.clone(),
                key_iv: key_iv.clone(),
                encrypted_key: encrypted_key.clone(),
            })),
            (true, _, _, _) => Err(PasteError::CorruptData(
                "password-protected paste is missing salt, encryptedKey, or keyIv".into(),
            )),
            (false, None, None, None) => Ok(None),
            (false, _, _, _) => Err(PasteError::CorruptData(
                "paste without password carries password-wrap fields".into(),
            )),
        }
    }
}

/// Response of `POST /paste`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePasteResponse {
    pub id: String,
}

/// Response of `GET /paste/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPaste {
    pub id: String,
    #[serde(flatten)]
    pub body: CreatePastePayload,
}

/// Response of `GET /paste/{id}/metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasteMetadata {
    pub exists: bool,
    pub has_password: bool,
    pub burn_after_read: bool,
    pub created_at: Option<i64>,
    pub expires_at: Option<i64>,
}

/// A successfully decrypted paste, as handed to a viewer.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedPaste {
    pub id: String,
    pub text: String,
    pub language: Language,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub burn_after_read: bool,
    pub views: i64,
    /// Revealed only after a successful decrypt; authorizes the burn delete.
    pub burn_token: Option<String>,
}

impl std::fmt::Debug for DecryptedPaste {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedPaste")
            .field("id", &self.id)
            .field("text_len", &self.text.len())
            .field("language", &self.language)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("burn_after_read", &self.burn_after_read)
            .field("views", &self.views)
            .field("burn_token", &self.burn_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
