//! Paste envelope: `{text, language, burnToken}` → JSON → gzip → AES-256-GCM
//!
//! The language tag and the plaintext burn token live inside the ciphertext
//! so the server learns neither.
//!
//! Parsing is permissive for envelopes written before the structured format
//! existed: if the decrypted bytes are not a JSON object with a string
//! `text` member, the whole payload is treated as plain text. Legacy
//! envelopes were also uncompressed. Compressed payloads are recognised by
//! their magic bytes, neither of which can begin a UTF-8 string: gzip's
//! `1f 8b` (0x8b is a continuation byte) and, for envelopes written by older
//! zkpaste builds, the zstd frame magic (0xB5 likewise).

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::Value;

use zkpaste_core::types::Envelope;
use zkpaste_core::{Language, PasteError, PasteResult};

use crate::cipher::{decrypt, encrypt};
use crate::keys::ContentKey;

/// gzip member header (RFC 1952)
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// zstd frame magic number (little-endian 0xFD2FB528)
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Upper bound on a decompressed payload, well above any uploadable paste.
pub const MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

/// Decrypted paste body.
#[derive(Clone, PartialEq, Eq)]
pub struct PasteContent {
    pub text: String,
    pub language: Language,
    pub burn_token: Option<String>,
}

impl std::fmt::Debug for PasteContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasteContent")
            .field("text_len", &self.text.len())
            .field("language", &self.language)
            .field("burn_token", &self.burn_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Outcome of [`parse_envelope`]: which decoding path produced the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEnvelope {
    /// A `{text, language, burnToken}` document; language already allowlisted.
    Structured(PasteContent),
    /// Not a structured document; the whole payload is the text.
    RawFallback(String),
}

impl ParsedEnvelope {
    pub fn into_content(self) -> PasteContent {
        match self {
            ParsedEnvelope::Structured(content) => content,
            ParsedEnvelope::RawFallback(text) => PasteContent {
                text,
                language: Language::Plaintext,
                burn_token: None,
            },
        }
    }
}

#[derive(Serialize)]
struct OutgoingPayload<'a> {
    text: &'a str,
    language: &'a str,
    #[serde(rename = "burnToken", skip_serializing_if = "Option::is_none")]
    burn_token: Option<&'a str>,
}

/// Serialize, compress, and encrypt a paste body under `key`.
pub fn build_envelope(
    text: &str,
    language: Language,
    burn_token: Option<&str>,
    key: &ContentKey,
) -> PasteResult<Envelope> {
    let json = serde_json::to_vec(&OutgoingPayload {
        text,
        language: language.as_str(),
        burn_token,
    })
    .map_err(|e| PasteError::Other(anyhow::anyhow!("envelope serialization: {e}")))?;

    let compressed = compress(&json)?;

    tracing::debug!(
        json_len = json.len(),
        compressed_len = compressed.len(),
        "envelope payload compressed"
    );

    encrypt(&compressed, key)
}

/// Decrypt and decode an envelope.
///
/// Fails only if decryption fails ([`PasteError::Authentication`]) or a
/// compressed payload is corrupt or oversized. Undecodable JSON is not an
/// error: it yields [`ParsedEnvelope::RawFallback`].
pub fn parse_envelope(envelope: &Envelope, key: &ContentKey) -> PasteResult<ParsedEnvelope> {
    let decrypted = decrypt(envelope, key)?;

    let plaintext = if decrypted.starts_with(&GZIP_MAGIC) {
        bounded_read(GzDecoder::new(decrypted.as_slice()), "gzip")?
    } else if decrypted.starts_with(&ZSTD_MAGIC) {
        let decoder = zstd::stream::read::Decoder::new(decrypted.as_slice())
            .map_err(|e| PasteError::Compression(format!("zstd decoder: {e}")))?;
        bounded_read(decoder, "zstd")?
    } else {
        tracing::debug!("envelope payload is uncompressed (legacy format)");
        decrypted
    };

    Ok(decode_payload(plaintext))
}

/// Only a JSON object whose `text` is a string counts as structured.
fn decode_payload(plaintext: Vec<u8>) -> ParsedEnvelope {
    let doc = match serde_json::from_slice::<Value>(&plaintext) {
        Ok(Value::Object(doc)) => doc,
        _ => return raw_fallback(plaintext),
    };
    let Some(text) = doc.get("text").and_then(Value::as_str) else {
        return raw_fallback(plaintext);
    };

    let language = doc
        .get("language")
        .and_then(Value::as_str)
        .map(Language::coerce)
        .unwrap_or_default();
    let burn_token = doc
        .get("burnToken")
        .and_then(Value::as_str)
        .map(str::to_owned);

    ParsedEnvelope::Structured(PasteContent {
        text: text.to_owned(),
        language,
        burn_token,
    })
}

fn raw_fallback(plaintext: Vec<u8>) -> ParsedEnvelope {
    ParsedEnvelope::RawFallback(match String::from_utf8(plaintext) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn compress(data: &[u8]) -> PasteResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PasteError::Compression(format!("gzip compress: {e}")))?;
    encoder
        .finish()
        .map_err(|e| PasteError::Compression(format!("gzip finish: {e}")))
}

fn bounded_read(decoder: impl Read, codec: &str) -> PasteResult<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| PasteError::Compression(format!("{codec} decompress: {e}")))?;

    if out.len() > MAX_DECOMPRESSED_SIZE {
        return Err(PasteError::Compression(format!(
            "decompressed payload exceeds {MAX_DECOMPRESSED_SIZE} bytes"
        )));
    }
    Ok(out)
}
