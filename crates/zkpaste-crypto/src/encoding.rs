//! Binary/text conversions: standard base64, URL-safe base64, hex.
//!
//! Standard base64 (padded) is used for every field that travels in a JSON
//! body. URL-safe base64 (no padding) is used only for the raw key in the
//! URL fragment, where `+`, `/` and `=` would need escaping.

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use zkpaste_core::{PasteError, PasteResult};

pub fn to_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn from_base64(s: &str) -> PasteResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| PasteError::Encoding(format!("base64 decode: {e}")))
}

pub fn to_url_safe_base64(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Accepts URL-safe base64 with or without trailing `=` padding.
pub fn from_url_safe_base64(s: &str) -> PasteResult<Vec<u8>> {
    let result = if s.ends_with('=') {
        URL_SAFE.decode(s)
    } else {
        URL_SAFE_NO_PAD.decode(s)
    };
    result.map_err(|e| PasteError::Encoding(format!("url-safe base64 decode: {e}")))
}

pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

pub fn from_hex(s: &str) -> PasteResult<Vec<u8>> {
    hex::decode(s).map_err(|e| PasteError::Encoding(format!("hex decode: {e}")))
}
