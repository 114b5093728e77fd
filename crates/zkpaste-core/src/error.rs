use thiserror::Error;

pub type PasteResult<T> = Result<T, PasteError>;

#[derive(Debug, Error)]
pub enum PasteError {
    /// AEAD tag check failed: wrong key or tampered ciphertext.
    #[error("authentication failed: wrong key or tampered data")]
    Authentication,

    /// The password-derived wrapping key could not unwrap the content key.
    #[error("incorrect password")]
    IncorrectPassword,

    /// Password-wrap fields are missing or inconsistent.
    #[error("corrupt paste data: {0}")]
    CorruptData(String),

    /// Absent, expired, or burned. Deliberately not distinguished.
    #[error("paste not found, expired, or burned")]
    NotFound,

    #[error("paste is too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("proof-of-work challenge error: {0}")]
    Challenge(String),

    /// HTTP 429 or 5xx. Retried with backoff before surfacing.
    #[error("transient server error: HTTP {status}")]
    TransientServer { status: u16 },

    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid key format: {0}")]
    KeyFormat(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("decryption key missing")]
    MissingKey,

    #[error("paste content is empty")]
    EmptyContent,

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PasteError {
    /// HTTP statuses worth retrying: 429 and the whole 5xx range.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => PasteError::NotFound,
            429 | 500..=599 => PasteError::TransientServer { status },
            _ => PasteError::Server { status },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, PasteError::TransientServer { .. })
    }

    /// Categorized hint safe to show next to the generic failure message.
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            PasteError::IncorrectPassword => Some("Incorrect password"),
            PasteError::NotFound => Some("Paste not found, expired, or burned"),
            PasteError::PayloadTooLarge { .. } => Some("Paste is too large"),
            _ => None,
        }
    }
}
