//! Retrieval state machine
//!
//! ```text
//! Loading ──▶ PasswordRequired ◀─┐
//!    │              │  submit     │ wrong password
//!    │              ▼             │
//!    └────────▶ Decrypting ───────┘
//!                   │
//!                   ├──▶ Success(paste)   (burn delete spawned after entry)
//!                   └──▶ Error{message}
//! ```
//!
//! Metadata is fetched first so a password gate is discovered without
//! downloading the ciphertext. The ciphertext is fetched once and reused
//! across password attempts.
//!
//! The burn-after-read delete runs as a background task so a slow or failing
//! backend never holds back `Success`. Short-lived callers that need the
//! delete to land before they exit await [`PasteViewer::settle`].

use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zkpaste_core::config::PasteConfig;
use zkpaste_core::types::{DecryptedPaste, EncryptedPaste, PasswordWrap};
use zkpaste_core::{PasteError, PasteResult};
use zkpaste_crypto::{
    import_key_raw, parse_envelope, unwrap_content_key, ContentKey, KdfParams, PasteContent,
};

use crate::backend::PasteBackend;
use crate::fragment::ShareFragment;
use crate::retry::RetryPolicy;

pub const MSG_NOT_FOUND: &str = "Paste not found, expired, or burned.";
pub const MSG_KEY_MISSING: &str = "Decryption key missing.";
pub const MSG_KEY_INVALID: &str = "Decryption failed. Key invalid.";
pub const MSG_INCORRECT_PASSWORD: &str = "Incorrect password.";
pub const MSG_LOAD_FAILED: &str = "Failed to load paste.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerState {
    Loading,
    PasswordRequired { error: Option<String> },
    Decrypting,
    Success(DecryptedPaste),
    Error {
        message: String,
        hint: Option<&'static str>,
    },
}

impl ViewerState {
    pub fn name(&self) -> &'static str {
        match self {
            ViewerState::Loading => "loading",
            ViewerState::PasswordRequired { .. } => "password_required",
            ViewerState::Decrypting => "decrypting",
            ViewerState::Success(_) => "success",
            ViewerState::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ViewerState::Success(_) | ViewerState::Error { .. })
    }

    fn error(message: &str, cause: &PasteError) -> Self {
        ViewerState::Error {
            message: message.to_owned(),
            hint: cause.user_hint(),
        }
    }

    /// Terminal state for a failed fetch.
    fn fetch_failed(cause: &PasteError) -> Self {
        match cause {
            PasteError::NotFound => Self::error(MSG_NOT_FOUND, cause),
            _ => Self::error(MSG_LOAD_FAILED, cause),
        }
    }
}

/// Drives one retrieval of one paste.
pub struct PasteViewer<B> {
    backend: B,
    fragment: ShareFragment,
    retry: RetryPolicy,
    kdf: KdfParams,
    state: ViewerState,
    started: bool,
    fetched: Option<EncryptedPaste>,
    burn: Option<JoinHandle<()>>,
}

impl<B: PasteBackend + Clone + 'static> PasteViewer<B> {
    pub fn new(backend: B, fragment: ShareFragment, config: &PasteConfig) -> Self {
        Self {
            backend,
            fragment,
            retry: RetryPolicy::from(&config.retry),
            kdf: KdfParams::default(),
            state: ViewerState::Loading,
            started: false,
            fetched: None,
            burn: None,
        }
    }

    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn into_state(self) -> ViewerState {
        self.state
    }

    pub fn paste_id(&self) -> &str {
        &self.fragment.id
    }

    /// Wait for a pending burn-after-read delete, if one was issued.
    pub async fn settle(&mut self) {
        if let Some(task) = self.burn.take() {
            if let Err(e) = task.await {
                warn!(id = %self.fragment.id, error = %e, "burn delete task failed");
            }
        }
    }

    fn transition(&mut self, next: ViewerState) {
        debug!(
            id = %self.fragment.id,
            from = self.state.name(),
            to = next.name(),
            "viewer transition"
        );
        self.state = next;
    }

    /// Fetch metadata and, when no password is needed, decrypt with the key
    /// from the link. Valid only once, from `Loading`.
    pub async fn load(&mut self) -> PasteResult<&ViewerState> {
        if self.started || self.state != ViewerState::Loading {
            return Err(PasteError::InvalidTransition(format!(
                "load from {}",
                self.state.name()
            )));
        }
        self.started = true;

        let id = self.fragment.id.clone();
        let metadata = self
            .retry
            .run("get_metadata", || self.backend.get_metadata(&id))
            .await
            .and_then(|m| if m.exists { Ok(m) } else { Err(PasteError::NotFound) });

        let metadata = match metadata {
            Ok(m) => m,
            Err(e) => {
                debug!(%id, error = %e, "metadata fetch failed");
                self.transition(ViewerState::fetch_failed(&e));
                return Ok(&self.state);
            }
        };

        if metadata.has_password {
            self.transition(ViewerState::PasswordRequired { error: None });
            return Ok(&self.state);
        }

        let Some(raw_key) = self.fragment.key.as_deref() else {
            self.transition(ViewerState::error(MSG_KEY_MISSING, &PasteError::MissingKey));
            return Ok(&self.state);
        };
        let key = match import_key_raw(raw_key) {
            Ok(k) => k,
            Err(e) => {
                debug!(%id, error = %e, "key in link does not import");
                self.transition(ViewerState::error(MSG_KEY_INVALID, &e));
                return Ok(&self.state);
            }
        };

        self.transition(ViewerState::Decrypting);
        let paste = match self.fetch().await {
            Ok(p) => p,
            Err(e) => {
                self.transition(ViewerState::fetch_failed(&e));
                return Ok(&self.state);
            }
        };

        if let Err(e) = paste.body.password_wrap().and_then(|wrap| match wrap {
            None => Ok(()),
            Some(_) => Err(PasteError::CorruptData(
                "metadata and paste disagree on password protection".into(),
            )),
        }) {
            warn!(%id, error = %e, "inconsistent paste record");
            self.transition(ViewerState::error(MSG_LOAD_FAILED, &e));
            return Ok(&self.state);
        }

        match decrypt_with_key(&paste, key).await {
            Ok(content) => self.succeed(paste, content),
            Err(e) => {
                debug!(%id, error = %e, "decrypt with link key failed");
                let message = match e {
                    PasteError::Authentication | PasteError::KeyFormat(_) => MSG_KEY_INVALID,
                    _ => MSG_LOAD_FAILED,
                };
                self.transition(ViewerState::error(message, &e));
            }
        }
        Ok(&self.state)
    }

    /// Try a password. Valid only from `PasswordRequired`; an incorrect
    /// password returns there with an error message.
    pub async fn submit_password(&mut self, password: &SecretString) -> PasteResult<&ViewerState> {
        if !matches!(self.state, ViewerState::PasswordRequired { .. }) {
            return Err(PasteError::InvalidTransition(format!(
                "submit_password from {}",
                self.state.name()
            )));
        }
        self.transition(ViewerState::Decrypting);

        let id = self.fragment.id.clone();
        let paste = match self.fetch().await {
            Ok(p) => p,
            Err(e) => {
                self.transition(ViewerState::fetch_failed(&e));
                return Ok(&self.state);
            }
        };

        let wrap = match paste.body.password_wrap() {
            Ok(Some(wrap)) => wrap,
            Ok(None) => {
                let e = PasteError::CorruptData("password-protected paste has no key wrap".into());
                warn!(%id, error = %e, "inconsistent paste record");
                self.transition(ViewerState::error(MSG_LOAD_FAILED, &e));
                return Ok(&self.state);
            }
            Err(e) => {
                warn!(%id, error = %e, "inconsistent paste record");
                self.transition(ViewerState::error(MSG_LOAD_FAILED, &e));
                return Ok(&self.state);
            }
        };

        match decrypt_with_password(&paste, wrap, password, self.kdf.clone()).await {
            Ok(content) => self.succeed(paste, content),
            Err(PasteError::IncorrectPassword) => {
                debug!(%id, "incorrect password");
                self.transition(ViewerState::PasswordRequired {
                    error: Some(MSG_INCORRECT_PASSWORD.to_owned()),
                });
            }
            Err(e) => {
                debug!(%id, error = %e, "decrypt with password failed");
                let message = match e {
                    PasteError::Authentication => MSG_KEY_INVALID,
                    _ => MSG_LOAD_FAILED,
                };
                self.transition(ViewerState::error(message, &e));
            }
        }
        Ok(&self.state)
    }

    async fn fetch(&mut self) -> PasteResult<EncryptedPaste> {
        if let Some(paste) = &self.fetched {
            return Ok(paste.clone());
        }
        let id = self.fragment.id.clone();
        let paste = self
            .retry
            .run("get_paste", || self.backend.get_paste(&id))
            .await?;
        self.fetched = Some(paste.clone());
        Ok(paste)
    }

    /// Enter `Success`, then issue the burn delete for burn-after-read
    /// pastes. The delete never changes the state; failures are only logged.
    fn succeed(&mut self, paste: EncryptedPaste, content: PasteContent) {
        let decrypted = DecryptedPaste {
            id: paste.id,
            text: content.text,
            language: content.language,
            created_at: paste.body.created_at,
            expires_at: paste.body.expires_at,
            burn_after_read: paste.body.burn_after_read,
            views: paste.body.views,
            burn_token: content.burn_token,
        };
        self.fetched = None;

        let burn = match (decrypted.burn_after_read, &decrypted.burn_token) {
            (true, Some(token)) => Some((decrypted.id.clone(), token.clone())),
            (true, None) => {
                warn!(
                    id = %decrypted.id,
                    "burn-after-read paste carries no burn token; cannot delete"
                );
                None
            }
            (false, _) => None,
        };

        self.transition(ViewerState::Success(decrypted));

        if let Some((id, token)) = burn {
            let backend = self.backend.clone();
            self.burn = Some(tokio::spawn(async move {
                match backend.delete_paste(&id, Some(&token)).await {
                    Ok(()) => info!(%id, "burn-after-read paste deleted"),
                    Err(e) => warn!(%id, error = %e, "burn delete failed"),
                }
            }));
        }
    }
}

async fn decrypt_with_key(paste: &EncryptedPaste, key: ContentKey) -> PasteResult<PasteContent> {
    let envelope = paste.body.envelope.clone();
    tokio::task::spawn_blocking(move || {
        parse_envelope(&envelope, &key).map(|parsed| parsed.into_content())
    })
    .await
    .map_err(|e| PasteError::Other(anyhow::anyhow!("decrypt task failed: {e}")))?
}

async fn decrypt_with_password(
    paste: &EncryptedPaste,
    wrap: PasswordWrap,
    password: &SecretString,
    kdf: KdfParams,
) -> PasteResult<PasteContent> {
    let envelope = paste.body.envelope.clone();
    let password = SecretString::from(password.expose_secret());
    tokio::task::spawn_blocking(move || {
        let key = unwrap_content_key(&password, &wrap, &kdf)?;
        parse_envelope(&envelope, &key).map(|parsed| parsed.into_content())
    })
    .await
    .map_err(|e| PasteError::Other(anyhow::anyhow!("decrypt task failed: {e}")))?
}
