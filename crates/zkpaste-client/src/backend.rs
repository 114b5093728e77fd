//! The paste backend as seen by the client
//!
//! Routes (relative to the API prefix):
//! ```text
//! GET    /challenge            -> PowChallenge
//! POST   /paste                -> {id}        (X-PoW-* headers)
//! GET    /paste/{id}/metadata  -> PasteMetadata
//! GET    /paste/{id}           -> EncryptedPaste
//! DELETE /paste/{id}                          (optional X-Burn-Token)
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use zkpaste_core::types::{
    CreatePastePayload, EncryptedPaste, PasteMetadata, PowChallenge, PowSolution,
};
use zkpaste_core::PasteResult;

pub const HEADER_POW_SALT: &str = "X-PoW-Salt";
pub const HEADER_POW_NONCE: &str = "X-PoW-Nonce";
pub const HEADER_POW_TIMESTAMP: &str = "X-PoW-Timestamp";
pub const HEADER_POW_SIGNATURE: &str = "X-PoW-Signature";
pub const HEADER_BURN_TOKEN: &str = "X-Burn-Token";

/// Proof-of-work evidence attached to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowHeaders {
    pub salt: String,
    pub nonce: String,
    pub timestamp: u64,
    pub signature: String,
}

impl PowHeaders {
    pub fn new(challenge: &PowChallenge, solution: PowSolution) -> Self {
        Self {
            salt: challenge.salt.clone(),
            nonce: solution.nonce,
            timestamp: challenge.timestamp,
            signature: challenge.signature.clone(),
        }
    }

    /// `(header name, value)` pairs in wire form.
    pub fn pairs(&self) -> [(&'static str, String); 4] {
        [
            (HEADER_POW_SALT, self.salt.clone()),
            (HEADER_POW_NONCE, self.nonce.clone()),
            (HEADER_POW_TIMESTAMP, self.timestamp.to_string()),
            (HEADER_POW_SIGNATURE, self.signature.clone()),
        ]
    }
}

#[async_trait]
pub trait PasteBackend: Send + Sync {
    async fn get_challenge(&self) -> PasteResult<PowChallenge>;

    /// Upload a paste; returns its server-assigned id.
    async fn create_paste(
        &self,
        payload: &CreatePastePayload,
        pow: &PowHeaders,
    ) -> PasteResult<String>;

    async fn get_metadata(&self, id: &str) -> PasteResult<PasteMetadata>;

    /// Fails with `NotFound` for absent, expired, or burned pastes.
    async fn get_paste(&self, id: &str) -> PasteResult<EncryptedPaste>;

    async fn delete_paste(&self, id: &str, burn_token: Option<&str>) -> PasteResult<()>;
}

#[async_trait]
impl<T: PasteBackend + ?Sized> PasteBackend for Arc<T> {
    async fn get_challenge(&self) -> PasteResult<PowChallenge> {
        (**self).get_challenge().await
    }

    async fn create_paste(
        &self,
        payload: &CreatePastePayload,
        pow: &PowHeaders,
    ) -> PasteResult<String> {
        (**self).create_paste(payload, pow).await
    }

    async fn get_metadata(&self, id: &str) -> PasteResult<PasteMetadata> {
        (**self).get_metadata(id).await
    }

    async fn get_paste(&self, id: &str) -> PasteResult<EncryptedPaste> {
        (**self).get_paste(id).await
    }

    async fn delete_paste(&self, id: &str, burn_token: Option<&str>) -> PasteResult<()> {
        (**self).delete_paste(id, burn_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow_header_pairs() {
        let challenge = PowChallenge {
            salt: "abcd".into(),
            difficulty: 4,
            timestamp: 1_700_000_000,
            signature: "sig".into(),
        };
        let headers = PowHeaders::new(
            &challenge,
            PowSolution {
                nonce: "1234".into(),
            },
        );

        let pairs = headers.pairs();
        assert_eq!(pairs[0], ("X-PoW-Salt", "abcd".to_string()));
        assert_eq!(pairs[1], ("X-PoW-Nonce", "1234".to_string()));
        assert_eq!(pairs[2], ("X-PoW-Timestamp", "1700000000".to_string()));
        assert_eq!(pairs[3], ("X-PoW-Signature", "sig".to_string()));
    }
}
