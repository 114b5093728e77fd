//! Password wrapping of a content key
//!
//! The content key is exported as JWK and AES-256-GCM encrypted under an
//! Argon2id-derived wrapping key. The salt, IV, and wrapped key go to the
//! server; the password never does.

use secrecy::SecretString;
use zeroize::Zeroize;

use zkpaste_core::types::{Envelope, PasswordWrap};
use zkpaste_core::{PasteError, PasteResult};

use crate::cipher::{decrypt, encrypt};
use crate::encoding::{from_base64, to_base64};
use crate::kdf::{derive_key_from_password, generate_salt, KdfParams};
use crate::keys::{export_key, import_key, import_key_raw, ContentKey};
use crate::SALT_SIZE;

/// Wrap `key` under a key derived from `password` and a fresh salt.
pub fn wrap_content_key(
    password: &SecretString,
    key: &ContentKey,
    params: &KdfParams,
) -> PasteResult<PasswordWrap> {
    let salt = generate_salt();
    let wrapping_key = derive_key_from_password(password, &salt, params)?;

    let mut jwk = export_key(key)?;
    let wrapped = encrypt(jwk.as_bytes(), &wrapping_key);
    jwk.zeroize();
    let wrapped = wrapped?;

    Ok(PasswordWrap {
        salt: to_base64(&salt),
        key_iv: wrapped.iv,
        encrypted_key: wrapped.data,
    })
}

/// Recover the content key from a password wrap.
///
/// A wrapping key that fails to authenticate means the password is wrong:
/// [`PasteError::IncorrectPassword`]. Malformed wrap fields, or a key that
/// decrypts but does not parse, are [`PasteError::CorruptData`].
pub fn unwrap_content_key(
    password: &SecretString,
    wrap: &PasswordWrap,
    params: &KdfParams,
) -> PasteResult<ContentKey> {
    let salt: [u8; SALT_SIZE] = from_base64(&wrap.salt)
        .map_err(|e| PasteError::CorruptData(format!("password salt: {e}")))?
        .try_into()
        .map_err(|v: Vec<u8>| {
            PasteError::CorruptData(format!(
                "password salt has wrong size: {} bytes (expected {SALT_SIZE})",
                v.len()
            ))
        })?;

    let wrapping_key = derive_key_from_password(password, &salt, params)?;

    let wrapped = Envelope {
        iv: wrap.key_iv.clone(),
        data: wrap.encrypted_key.clone(),
    };
    let mut plaintext = decrypt(&wrapped, &wrapping_key).map_err(|e| match e {
        PasteError::Authentication => PasteError::IncorrectPassword,
        other => other,
    })?;

    let key = std::str::from_utf8(&plaintext)
        .map_err(|_| PasteError::CorruptData("unwrapped key is not UTF-8".into()))
        .and_then(|s| import_key(s).or_else(|_| import_key_raw(s)))
        .map_err(|e| match e {
            PasteError::CorruptData(_) => e,
            other => PasteError::CorruptData(format!("unwrapped key: {other}")),
        });
    plaintext.zeroize();
    key
}
