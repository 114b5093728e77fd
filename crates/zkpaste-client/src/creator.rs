//! Paste creation: challenge → PoW → seal → size check → upload → share link

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use zkpaste_core::config::PasteConfig;
use zkpaste_core::types::CreatePastePayload;
use zkpaste_core::{Language, PasteError, PasteResult};
use zkpaste_crypto::{
    build_envelope, export_key_raw, generate_burn_token, generate_key, hash_burn_token,
    wrap_content_key, KdfParams,
};
use zkpaste_pow::PowSolver;

use crate::backend::{PasteBackend, PowHeaders};
use crate::fragment::{share_url, ShareFragment};
use crate::now_millis;

/// The single user-facing message for any creation failure.
pub const MSG_CREATE_FAILED: &str = "Failed to create paste";

pub struct CreateRequest {
    pub text: String,
    pub language: Language,
    /// Zero means the paste never expires.
    pub ttl: Duration,
    pub burn_after_read: bool,
    pub password: Option<SecretString>,
}

impl CreateRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: Language::Plaintext,
            ttl: Duration::ZERO,
            burn_after_read: false,
            password: None,
        }
    }
}

impl std::fmt::Debug for CreateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateRequest")
            .field("text_len", &self.text.len())
            .field("language", &self.language)
            .field("ttl", &self.ttl)
            .field("burn_after_read", &self.burn_after_read)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPaste {
    pub id: String,
    pub share_url: String,
    pub fragment: ShareFragment,
    pub expires_at: Option<i64>,
    pub has_password: bool,
}

pub struct PasteCreator<B> {
    backend: B,
    kdf: KdfParams,
    max_payload_bytes: usize,
    share_origin: String,
    share_path: String,
}

impl<B: PasteBackend> PasteCreator<B> {
    pub fn new(backend: B, config: &PasteConfig) -> Self {
        Self {
            backend,
            kdf: KdfParams::default(),
            max_payload_bytes: config.limits.max_payload_bytes,
            share_origin: config.server.share_origin().to_owned(),
            share_path: config.server.share_path.clone(),
        }
    }

    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Create a paste. Steps run strictly in order; the first failure aborts.
    ///
    /// A blank or whitespace-only password counts as no password.
    pub async fn create(&self, mut request: CreateRequest) -> PasteResult<CreatedPaste> {
        if request.text.trim().is_empty() {
            return Err(PasteError::EmptyContent);
        }
        request.password = request
            .password
            .take()
            .filter(|p| !p.expose_secret().trim().is_empty());

        let challenge = self
            .backend
            .get_challenge()
            .await
            .map_err(|e| PasteError::Challenge(format!("fetching challenge: {e}")))?;

        let solution = PowSolver::new().start(&challenge)?.solution().await?;
        let pow = PowHeaders::new(&challenge, solution);
        debug!(difficulty = challenge.difficulty, nonce = %pow.nonce, "challenge solved");

        let has_password = request.password.is_some();
        let kdf = self.kdf.clone();
        let (payload, url_key) = tokio::task::spawn_blocking(move || seal(request, &kdf))
            .await
            .map_err(|e| PasteError::Other(anyhow::anyhow!("seal task failed: {e}")))??;

        let size = serde_json::to_vec(&payload)
            .map_err(|e| PasteError::Other(anyhow::anyhow!("payload serialization: {e}")))?
            .len();
        if size > self.max_payload_bytes {
            return Err(PasteError::PayloadTooLarge {
                size,
                limit: self.max_payload_bytes,
            });
        }

        // Not retried: the PoW salt is single-use.
        let id = self.backend.create_paste(&payload, &pow).await?;

        let fragment = ShareFragment::new(id.clone(), url_key);
        let url = share_url(&self.share_origin, &self.share_path, &fragment);
        info!(
            %id,
            size,
            has_password,
            burn_after_read = payload.burn_after_read,
            "paste created"
        );

        Ok(CreatedPaste {
            id,
            share_url: url,
            fragment,
            expires_at: payload.expires_at,
            has_password,
        })
    }
}

/// Key generation, envelope, expiry, and key export or wrap.
///
/// Returns the upload payload and, for pastes without password, the raw key
/// for the link.
fn seal(
    request: CreateRequest,
    kdf: &KdfParams,
) -> PasteResult<(CreatePastePayload, Option<String>)> {
    let key = generate_key();

    let burn_token = request.burn_after_read.then(generate_burn_token);
    let burn_token_hash = burn_token.as_deref().map(hash_burn_token);

    let envelope = build_envelope(&request.text, request.language, burn_token.as_deref(), &key)?;

    let created_at = now_millis();
    let expires_at = (!request.ttl.is_zero()).then(|| created_at + request.ttl.as_millis() as i64);

    let (wrap, url_key) = match &request.password {
        Some(password) => (Some(wrap_content_key(password, &key, kdf)?), None),
        None => (None, Some(export_key_raw(&key))),
    };

    Ok((
        CreatePastePayload::new(envelope, created_at, expires_at, burn_token_hash, wrap),
        url_key,
    ))
}
