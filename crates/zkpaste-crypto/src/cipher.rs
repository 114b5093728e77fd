//! AES-256-GCM encryption of arbitrary bytes into an [`Envelope`]
//!
//! Envelope format (both fields standard base64):
//! ```text
//! iv:   [12 bytes: random IV, fresh per call]
//! data: [N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! No AAD is used: an envelope is self-contained and the server-side record
//! it travels in is not authenticated by it.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use zkpaste_core::types::Envelope;
use zkpaste_core::{PasteError, PasteResult};

use crate::encoding::{from_base64, to_base64};
use crate::keys::AeadKey;
use crate::{IV_SIZE, TAG_SIZE};

/// Encrypt `plaintext` under `key` with a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &impl AeadKey) -> PasteResult<Envelope> {
    let cipher = Aes256Gcm::new(key.key_bytes().into());

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| PasteError::Other(anyhow::anyhow!("AES-256-GCM encryption failed: {e}")))?;

    Ok(Envelope {
        iv: to_base64(&iv),
        data: to_base64(&ciphertext),
    })
}

/// Decrypt an envelope.
///
/// Every failure is reported as [`PasteError::Authentication`]: a malformed
/// IV or ciphertext is indistinguishable from tampering, and no partial
/// plaintext is ever returned.
pub fn decrypt(envelope: &Envelope, key: &impl AeadKey) -> PasteResult<Vec<u8>> {
    let iv = from_base64(&envelope.iv).map_err(|e| {
        tracing::debug!(error = %e, "envelope IV is not valid base64");
        PasteError::Authentication
    })?;
    let ciphertext = from_base64(&envelope.data).map_err(|e| {
        tracing::debug!(error = %e, "envelope data is not valid base64");
        PasteError::Authentication
    })?;

    if iv.len() != IV_SIZE {
        tracing::debug!(iv_len = iv.len(), "envelope IV has wrong size");
        return Err(PasteError::Authentication);
    }
    if ciphertext.len() < TAG_SIZE {
        tracing::debug!(len = ciphertext.len(), "envelope ciphertext shorter than tag");
        return Err(PasteError::Authentication);
    }

    let cipher = Aes256Gcm::new(key.key_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| PasteError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_key, ContentKey};
    use crate::KEY_SIZE;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key();
        let plaintext = b"hello, encrypted world!";

        let envelope = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&envelope, &key).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = generate_key();
        let envelope = encrypt(b"", &key).unwrap();
        assert_eq!(decrypt(&envelope, &key).unwrap(), b"");
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let key1 = generate_key();
        let key2 = generate_key();

        let envelope = encrypt(b"secret data", &key1).unwrap();
        let result = decrypt(&envelope, &key2);

        assert!(matches!(result, Err(PasteError::Authentication)));
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = generate_key();
        let a = encrypt(b"same", &key).unwrap();
        let b = encrypt(b"same", &key).unwrap();

        assert_ne!(a.iv, b.iv, "IV must never repeat for a key");
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_encrypted_size() {
        let key = generate_key();
        let envelope = encrypt(&[0u8; 1000], &key).unwrap();

        assert_eq!(from_base64(&envelope.iv).unwrap().len(), IV_SIZE);
        // plaintext (1000) + tag (16)
        assert_eq!(from_base64(&envelope.data).unwrap().len(), 1000 + TAG_SIZE);
    }

    #[test]
    fn test_tampered_ciphertext() {
        let key = generate_key();
        let mut envelope = encrypt(b"secret data", &key).unwrap();

        let mut raw = from_base64(&envelope.data).unwrap();
        raw[0] ^= 0xFF;
        envelope.data = to_base64(&raw);

        assert!(matches!(
            decrypt(&envelope, &key),
            Err(PasteError::Authentication)
        ));
    }

    #[test]
    fn test_malformed_envelope_is_authentication_failure() {
        let key = ContentKey::from_bytes([1u8; KEY_SIZE]);
        let good = encrypt(b"x", &key).unwrap();

        let bad_iv = Envelope {
            iv: to_base64(&[0u8; 8]),
            data: good.data.clone(),
        };
        assert!(matches!(decrypt(&bad_iv, &key), Err(PasteError::Authentication)));

        let not_b64 = Envelope {
            iv: good.iv.clone(),
            data: "%%%".into(),
        };
        assert!(matches!(decrypt(&not_b64, &key), Err(PasteError::Authentication)));

        let truncated = Envelope {
            iv: good.iv,
            data: to_base64(&[0u8; 4]),
        };
        assert!(matches!(decrypt(&truncated, &key), Err(PasteError::Authentication)));
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_bytes(data in proptest::collection::vec(any::<u8>(), 0..=4096)) {
            let key = generate_key();
            let envelope = encrypt(&data, &key).unwrap();
            prop_assert_eq!(decrypt(&envelope, &key).unwrap(), data);
        }
    }
}
