//! In-process [`PasteBackend`] for tests and offline use
//!
//! Behaves like the real service where the client can observe it: single-use
//! PoW salts that expire after five minutes, a 90 second grace TTL on the first read of a burn-after-read
//! paste without password, view counting on every other read, and burn-token
//! checks on delete. Challenges carry no server signature.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::RngCore;
use tracing::debug;

use zkpaste_core::types::{CreatePastePayload, EncryptedPaste, PasteMetadata, PowChallenge};
use zkpaste_core::{PasteError, PasteResult};
use zkpaste_crypto::encoding::to_hex;
use zkpaste_crypto::verify_burn_token;

use crate::backend::{PasteBackend, PowHeaders};
use crate::now_millis;

/// Grace period (ms) a burn-after-read paste survives after its first read.
pub const BURN_GRACE_MS: i64 = 90_000;

/// Default challenge difficulty, matching the hosted service.
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// How long (ms) an issued PoW salt stays redeemable.
pub const CHALLENGE_TTL_MS: i64 = 5 * 60 * 1000;

/// A recorded `DELETE /paste/{id}` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    pub id: String,
    pub burn_token: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Unredeemed PoW salts and when they were issued.
    open_challenges: HashMap<String, i64>,
    pastes: HashMap<String, CreatePastePayload>,
    deletes: Vec<DeleteCall>,
    /// Statuses returned by upcoming `get_paste` calls before serving normally.
    get_failures: VecDeque<u16>,
    get_calls: usize,
    metadata_calls: usize,
}

#[derive(Debug)]
pub struct MemoryBackend {
    difficulty: u32,
    challenge_ttl_ms: i64,
    inner: Mutex<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn is_expired(paste: &CreatePastePayload, now: i64) -> bool {
    paste.expires_at.is_some_and(|at| at <= now)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_difficulty(DEFAULT_DIFFICULTY)
    }

    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            challenge_ttl_ms: CHALLENGE_TTL_MS,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_challenge_ttl(mut self, ttl_ms: i64) -> Self {
        self.challenge_ttl_ms = ttl_ms;
        self
    }

    fn lock(&self) -> PasteResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| PasteError::Other(anyhow::anyhow!("memory backend lock poisoned")))
    }

    /// Make the next `get_paste` calls fail with these HTTP statuses, in order.
    pub fn fail_next_gets(&self, statuses: impl IntoIterator<Item = u16>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.get_failures.extend(statuses);
        }
    }

    /// Issued salts that are neither redeemed nor pruned yet.
    pub fn open_challenges(&self) -> usize {
        self.inner
            .lock()
            .map(|i| i.open_challenges.len())
            .unwrap_or_default()
    }

    pub fn get_calls(&self) -> usize {
        self.inner.lock().map(|i| i.get_calls).unwrap_or_default()
    }

    pub fn metadata_calls(&self) -> usize {
        self.inner.lock().map(|i| i.metadata_calls).unwrap_or_default()
    }

    pub fn deletes(&self) -> Vec<DeleteCall> {
        self.inner
            .lock()
            .map(|i| i.deletes.clone())
            .unwrap_or_default()
    }

    /// The stored record, exactly as the server sees it.
    pub fn stored(&self, id: &str) -> Option<CreatePastePayload> {
        self.inner
            .lock()
            .ok()
            .and_then(|i| i.pastes.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.pastes.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a record directly, bypassing proof-of-work.
    pub fn insert(&self, id: &str, payload: CreatePastePayload) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.pastes.insert(id.to_owned(), payload);
        }
    }
}

#[async_trait]
impl PasteBackend for MemoryBackend {
    async fn get_challenge(&self) -> PasteResult<PowChallenge> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = to_hex(&salt);

        let now = now_millis();
        let ttl = self.challenge_ttl_ms;
        let mut inner = self.lock()?;
        inner
            .open_challenges
            .retain(|_, issued| *issued + ttl > now);
        inner.open_challenges.insert(salt.clone(), now);
        drop(inner);

        Ok(PowChallenge {
            salt,
            difficulty: self.difficulty,
            timestamp: (now / 1000) as u64,
            signature: String::new(),
        })
    }

    async fn create_paste(
        &self,
        payload: &CreatePastePayload,
        pow: &PowHeaders,
    ) -> PasteResult<String> {
        let mut inner = self.lock()?;

        let now = now_millis();
        match inner.open_challenges.remove(&pow.salt) {
            Some(issued) if issued + self.challenge_ttl_ms > now => {}
            Some(_) => {
                debug!("rejecting upload with expired PoW salt");
                return Err(PasteError::Server { status: 403 });
            }
            None => {
                debug!("rejecting upload with unknown or reused PoW salt");
                return Err(PasteError::Server { status: 403 });
            }
        }
        if !zkpaste_pow::meets_difficulty(&pow.salt, &pow.nonce, self.difficulty) {
            debug!("rejecting upload with invalid PoW nonce");
            return Err(PasteError::Server { status: 403 });
        }
        if payload.password_wrap().is_err() {
            return Err(PasteError::Server { status: 400 });
        }

        let id = uuid::Uuid::new_v4().to_string();
        inner.pastes.insert(id.clone(), payload.clone());
        debug!(%id, "stored paste");
        Ok(id)
    }

    async fn get_metadata(&self, id: &str) -> PasteResult<PasteMetadata> {
        let mut inner = self.lock()?;
        inner.metadata_calls += 1;

        let now = now_millis();
        match inner.pastes.get(id) {
            Some(p) if !is_expired(p, now) => Ok(PasteMetadata {
                exists: true,
                has_password: p.has_password,
                burn_after_read: p.burn_after_read,
                created_at: Some(p.created_at),
                expires_at: p.expires_at,
            }),
            _ => Err(PasteError::NotFound),
        }
    }

    async fn get_paste(&self, id: &str) -> PasteResult<EncryptedPaste> {
        let mut inner = self.lock()?;
        inner.get_calls += 1;

        if let Some(status) = inner.get_failures.pop_front() {
            return Err(PasteError::from_status(status));
        }

        let now = now_millis();
        if inner.pastes.get(id).is_some_and(|p| is_expired(p, now)) {
            inner.pastes.remove(id);
        }
        let paste = inner.pastes.get_mut(id).ok_or(PasteError::NotFound)?;

        if paste.burn_after_read && !paste.has_password {
            let grace = now + BURN_GRACE_MS;
            paste.expires_at = Some(paste.expires_at.map_or(grace, |at| at.min(grace)));
        } else {
            paste.views += 1;
        }

        Ok(EncryptedPaste {
            id: id.to_owned(),
            body: paste.clone(),
        })
    }

    async fn delete_paste(&self, id: &str, burn_token: Option<&str>) -> PasteResult<()> {
        let mut inner = self.lock()?;
        inner.deletes.push(DeleteCall {
            id: id.to_owned(),
            burn_token: burn_token.map(str::to_owned),
        });

        let paste = inner.pastes.get(id).ok_or(PasteError::NotFound)?;
        if paste.burn_after_read {
            if let Some(stored_hash) = &paste.burn_token_hash {
                if !verify_burn_token(burn_token.unwrap_or_default(), stored_hash) {
                    return Err(PasteError::Server { status: 401 });
                }
            }
        }

        inner.pastes.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkpaste_core::types::{Envelope, PowSolution};
    use zkpaste_crypto::{generate_burn_token, hash_burn_token};

    fn payload(burn_hash: Option<String>) -> CreatePastePayload {
        CreatePastePayload::new(
            Envelope {
                iv: "aXY=".into(),
                data: "ZGF0YQ==".into(),
            },
            now_millis(),
            None,
            burn_hash,
            None,
        )
    }

    async fn solved_headers(backend: &MemoryBackend) -> PowHeaders {
        let challenge = backend.get_challenge().await.unwrap();
        let solution = zkpaste_pow::solve(&challenge).await.unwrap();
        PowHeaders::new(&challenge, solution)
    }

    #[tokio::test]
    async fn test_pow_salt_is_single_use() {
        let backend = MemoryBackend::with_difficulty(1);
        let pow = solved_headers(&backend).await;

        backend.create_paste(&payload(None), &pow).await.unwrap();
        let reused = backend.create_paste(&payload(None), &pow).await;
        assert!(matches!(reused, Err(PasteError::Server { status: 403 })));
    }

    #[tokio::test]
    async fn test_stale_challenges_expire() {
        let backend = MemoryBackend::with_difficulty(0).with_challenge_ttl(0);
        let pow = solved_headers(&backend).await;
        assert!(matches!(
            backend.create_paste(&payload(None), &pow).await,
            Err(PasteError::Server { status: 403 })
        ));

        for _ in 0..10 {
            backend.get_challenge().await.unwrap();
        }
        // Each request prunes everything issued before it.
        assert_eq!(backend.open_challenges(), 1);
    }

    #[tokio::test]
    async fn test_redeemed_challenges_are_forgotten() {
        let backend = MemoryBackend::with_difficulty(0);
        let pow = solved_headers(&backend).await;
        assert_eq!(backend.open_challenges(), 1);
        backend.create_paste(&payload(None), &pow).await.unwrap();
        assert_eq!(backend.open_challenges(), 0);
    }

    #[tokio::test]
    async fn test_invalid_nonce_rejected() {
        let backend = MemoryBackend::with_difficulty(8);
        let challenge = backend.get_challenge().await.unwrap();
        // Difficulty 8 makes an accidental match on a fixed nonce vanishingly unlikely.
        let pow = PowHeaders::new(
            &challenge,
            PowSolution {
                nonce: "not-a-solution".into(),
            },
        );
        assert!(backend.create_paste(&payload(None), &pow).await.is_err());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_views_and_burn_grace() {
        let backend = MemoryBackend::with_difficulty(0);

        let pow = solved_headers(&backend).await;
        let plain = backend.create_paste(&payload(None), &pow).await.unwrap();
        assert_eq!(backend.get_paste(&plain).await.unwrap().body.views, 1);
        assert_eq!(backend.get_paste(&plain).await.unwrap().body.views, 2);

        let token = generate_burn_token();
        let pow = solved_headers(&backend).await;
        let burn = backend
            .create_paste(&payload(Some(hash_burn_token(&token))), &pow)
            .await
            .unwrap();
        let read = backend.get_paste(&burn).await.unwrap();
        assert_eq!(read.body.views, 0);
        assert!(read.body.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_checks_burn_token() {
        let backend = MemoryBackend::with_difficulty(0);
        let token = generate_burn_token();
        let pow = solved_headers(&backend).await;
        let id = backend
            .create_paste(&payload(Some(hash_burn_token(&token))), &pow)
            .await
            .unwrap();

        assert!(matches!(
            backend.delete_paste(&id, Some("wrong")).await,
            Err(PasteError::Server { status: 401 })
        ));
        assert!(backend.delete_paste(&id, None).await.is_err());
        backend.delete_paste(&id, Some(&token)).await.unwrap();
        assert!(matches!(
            backend.get_paste(&id).await,
            Err(PasteError::NotFound)
        ));
        assert_eq!(backend.deletes().len(), 3);
    }

    #[tokio::test]
    async fn test_expired_paste_not_found() {
        let backend = MemoryBackend::new();
        let mut p = payload(None);
        p.expires_at = Some(now_millis() - 1);
        backend.insert("old", p);

        assert!(matches!(
            backend.get_metadata("old").await,
            Err(PasteError::NotFound)
        ));
        assert!(matches!(
            backend.get_paste("old").await,
            Err(PasteError::NotFound)
        ));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_injected_get_failures() {
        let backend = MemoryBackend::new();
        backend.insert("a", payload(None));
        backend.fail_next_gets([503, 404]);

        assert!(matches!(
            backend.get_paste("a").await,
            Err(PasteError::TransientServer { status: 503 })
        ));
        assert!(matches!(
            backend.get_paste("a").await,
            Err(PasteError::NotFound)
        ));
        assert!(backend.get_paste("a").await.is_ok());
        assert_eq!(backend.get_calls(), 3);
    }
}
