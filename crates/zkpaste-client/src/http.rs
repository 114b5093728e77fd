//! reqwest implementation of [`PasteBackend`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use zkpaste_core::config::ServerConfig;
use zkpaste_core::types::{
    CreatePastePayload, CreatePasteResponse, EncryptedPaste, PasteMetadata, PowChallenge,
};
use zkpaste_core::{PasteError, PasteResult};

use crate::backend::{PasteBackend, PowHeaders, HEADER_BURN_TOKEN};
use crate::fragment::is_valid_paste_id;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    server: ServerConfig,
}

impl HttpBackend {
    pub fn new(server: &ServerConfig) -> PasteResult<Self> {
        if server.base_url.starts_with("http://")
            && !server.base_url.contains("://localhost")
            && !server.base_url.contains("://127.0.0.1")
        {
            warn!(
                base_url = %server.base_url,
                "backend uses plaintext HTTP; ciphertext and metadata travel unencrypted"
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(server.request_timeout_secs))
            .user_agent(concat!("zkpaste/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PasteError::Transport(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            server: server.clone(),
        })
    }

    fn url(&self, route: &str) -> String {
        self.server.api_url(route)
    }

    /// URL under `/paste/{id}`; ids that would escape the segment are refused.
    fn paste_url(&self, id: &str, suffix: &str) -> PasteResult<String> {
        if !is_valid_paste_id(id) {
            return Err(PasteError::KeyFormat("paste id has invalid characters".into()));
        }
        Ok(self.url(&format!("/paste/{id}{suffix}")))
    }
}

fn transport(e: reqwest::Error) -> PasteError {
    PasteError::Transport(e.to_string())
}

/// Map non-2xx statuses onto the error taxonomy.
fn check_status(resp: Response) -> PasteResult<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        debug!(status = status.as_u16(), url = %resp.url(), "backend returned error status");
        Err(PasteError::from_status(status.as_u16()))
    }
}

async fn json_body<T: DeserializeOwned>(resp: Response) -> PasteResult<T> {
    resp.json::<T>()
        .await
        .map_err(|e| PasteError::Transport(format!("decoding response body: {e}")))
}

#[async_trait]
impl PasteBackend for HttpBackend {
    async fn get_challenge(&self) -> PasteResult<PowChallenge> {
        let resp = self
            .client
            .get(self.url("/challenge"))
            .send()
            .await
            .map_err(transport)?;
        json_body(check_status(resp)?).await
    }

    async fn create_paste(
        &self,
        payload: &CreatePastePayload,
        pow: &PowHeaders,
    ) -> PasteResult<String> {
        let mut req = self.client.post(self.url("/paste")).json(payload);
        for (name, value) in pow.pairs() {
            req = req.header(name, value);
        }

        let resp = req.send().await.map_err(transport)?;
        let created: CreatePasteResponse = json_body(check_status(resp)?).await?;
        Ok(created.id)
    }

    async fn get_metadata(&self, id: &str) -> PasteResult<PasteMetadata> {
        let resp = self
            .client
            .get(self.paste_url(id, "/metadata")?)
            .send()
            .await
            .map_err(transport)?;
        json_body(check_status(resp)?).await
    }

    async fn get_paste(&self, id: &str) -> PasteResult<EncryptedPaste> {
        let resp = self
            .client
            .get(self.paste_url(id, "")?)
            .send()
            .await
            .map_err(transport)?;
        json_body(check_status(resp)?).await
    }

    async fn delete_paste(&self, id: &str, burn_token: Option<&str>) -> PasteResult<()> {
        let mut req = self.client.delete(self.paste_url(id, "")?);
        if let Some(token) = burn_token {
            req = req.header(HEADER_BURN_TOKEN, token);
        }

        let resp = req.send().await.map_err(transport)?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(PasteError::NotFound),
            s => Err(PasteError::from_status(s.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        let backend = HttpBackend::new(&ServerConfig {
            base_url: "https://paste.example.com/".into(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            backend.url("/paste/abc/metadata"),
            "https://paste.example.com/api/v1/paste/abc/metadata"
        );
        assert_eq!(
            backend.url("/challenge"),
            "https://paste.example.com/api/v1/challenge"
        );
        assert_eq!(
            backend.paste_url("3f2a-b_9", "/metadata").unwrap(),
            "https://paste.example.com/api/v1/paste/3f2a-b_9/metadata"
        );
    }

    #[tokio::test]
    async fn test_unsafe_ids_never_reach_the_network() {
        // Nothing listens here; an attempted request would be a Transport error.
        let backend = HttpBackend::new(&ServerConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        })
        .unwrap();

        for id in ["..", "a?x", "a/b", ""] {
            assert!(matches!(
                backend.delete_paste(id, Some("tok")).await,
                Err(PasteError::KeyFormat(_))
            ));
            assert!(matches!(
                backend.get_paste(id).await,
                Err(PasteError::KeyFormat(_))
            ));
        }
    }
}
