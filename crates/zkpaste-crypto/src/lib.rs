//! zkpaste-crypto: client-side E2E encryption for zkpaste
//!
//! The server only ever sees ciphertext. Pipeline for a paste body:
//!
//! ```text
//! {text, language, burnToken} -> JSON -> gzip -> AES-256-GCM(content key, random 96-bit IV)
//! ```
//!
//! Key handling:
//! ```text
//! Content Key (per-paste, 256-bit random)
//!   ├── no password: exported raw, URL-safe base64, carried in the URL fragment
//!   └── password:    exported as JWK, AES-256-GCM wrapped by
//!                    Wrapping Key (Argon2id(password, 16-byte salt))
//! ```

pub mod burn;
pub mod cipher;
pub mod encoding;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod password;
pub mod wrap;

pub use burn::{generate_burn_token, hash_burn_token, verify_burn_token, BurnToken};
pub use cipher::{decrypt, encrypt};
pub use envelope::{build_envelope, parse_envelope, ParsedEnvelope, PasteContent};
pub use kdf::{derive_key_from_password, generate_salt, KdfParams, WrappingKey};
pub use keys::{
    export_key, export_key_raw, generate_key, import_key, import_key_raw, AeadKey, ContentKey,
};
pub use password::generate_password;
pub use wrap::{unwrap_content_key, wrap_content_key};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM IV (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of an Argon2id salt
pub const SALT_SIZE: usize = 16;
