//! zkpaste-client: the client side of the zkpaste protocol
//!
//! - [`backend`]: the REST surface as a trait, with [`HttpBackend`] and the
//!   in-process [`MemoryBackend`]
//! - [`creator`]: challenge, proof-of-work, seal, upload
//! - [`viewer`]: metadata, optional password prompt, fetch, decrypt, burn
//!
//! Plaintext, keys and passwords never leave this crate; the backend only
//! ever receives ciphertext, the burn-token hash and timing metadata.

pub mod backend;
pub mod creator;
pub mod fragment;
pub mod http;
pub mod memory;
pub mod retry;
pub mod viewer;

pub use backend::{PasteBackend, PowHeaders};
pub use creator::{CreateRequest, CreatedPaste, PasteCreator, MSG_CREATE_FAILED};
pub use fragment::{share_url, ShareFragment};
pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use retry::RetryPolicy;
pub use viewer::{PasteViewer, ViewerState};

/// Milliseconds since the Unix epoch, the unit of `createdAt`/`expiresAt`.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
