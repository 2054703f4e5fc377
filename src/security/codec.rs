//! Symmetric codec for confidential card fields
//!
//! The card number and verification code are persisted only as ciphertext
//! produced here. The cipher key is derived from a configured secret: SHA-256
//! of the secret, truncated to the 128-bit AES key size.
//!
//! [`ConfidentialFieldCodec::encrypt`] is deterministic. AES-GCM-SIV is used
//! with a synthetic nonce derived from the key and the plaintext, so equal
//! plaintexts give equal ciphertexts and the card store can enforce number
//! uniqueness on the ciphertext column. Fields that are never looked up by
//! value, such as the verification code, go through
//! [`ConfidentialFieldCodec::encrypt_randomized`] instead, which draws the
//! nonce from the OS generator. Both store base64 of `nonce || ciphertext`,
//! so one `decrypt` reads either form.

use crate::types::CardError;
use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes128GcmSiv, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

const KEY_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const NONCE_DOMAIN: &[u8] = b"bankcards-field-nonce";

/// Source of the secret the codec key is derived from
///
/// Injected at construction so the secret is never ambient global state.
pub trait KeyProvider: Send + Sync {
    fn secret(&self) -> &[u8];
}

/// Key provider holding a secret supplied by configuration
#[derive(Clone)]
pub struct StaticSecret(Vec<u8>);

impl StaticSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }
}

impl KeyProvider for StaticSecret {
    fn secret(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for StaticSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticSecret(..)")
    }
}

/// Encrypts and decrypts persisted card fields
pub struct ConfidentialFieldCodec {
    cipher: Aes128GcmSiv,
    key: [u8; KEY_LEN],
}

impl ConfidentialFieldCodec {
    /// Derive the cipher key from the provider's secret
    ///
    /// # Errors
    ///
    /// Returns an encryption error if the secret is empty.
    pub fn new(keys: &dyn KeyProvider) -> Result<Self, CardError> {
        let secret = keys.secret();
        if secret.is_empty() {
            return Err(CardError::encryption("encryption secret must not be empty"));
        }

        let digest = Sha256::digest(secret);
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest[..KEY_LEN]);

        let cipher = Aes128GcmSiv::new_from_slice(&key)
            .map_err(|_| CardError::encryption("invalid key length"))?;

        Ok(Self { cipher, key })
    }

    fn synthetic_nonce(&self, plaintext: &[u8]) -> [u8; NONCE_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(NONCE_DOMAIN);
        hasher.update(self.key);
        hasher.update(plaintext);
        let digest = hasher.finalize();

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        nonce
    }

    /// Encrypt `plaintext` into base64 text
    ///
    /// Equal plaintexts always give the same text.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CardError> {
        let nonce = self.synthetic_nonce(plaintext.as_bytes());
        self.seal(&nonce, plaintext)
    }

    /// Encrypt `plaintext` under a random nonce
    ///
    /// Equal plaintexts give unrelated texts.
    pub fn encrypt_randomized(&self, plaintext: &str) -> Result<String, CardError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| CardError::encryption(&format!("nonce generation failed: {}", e)))?;
        self.seal(&nonce, plaintext)
    }

    fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &str) -> Result<String, CardError> {
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(nonce), plaintext.as_bytes())
            .map_err(|_| CardError::encryption("failed to encrypt field"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt base64 text produced by either encryption method
    ///
    /// # Errors
    ///
    /// Returns an encryption error for malformed base64, truncated input,
    /// a failed authentication tag (wrong key or tampering) or non-UTF-8
    /// plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CardError> {
        let sealed = STANDARD
            .decode(encoded)
            .map_err(|e| CardError::encryption(&format!("malformed ciphertext: {}", e)))?;

        if sealed.len() <= NONCE_LEN {
            return Err(CardError::encryption("ciphertext is truncated"));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CardError::encryption("failed to decrypt field"))?;

        String::from_utf8(plaintext)
            .map_err(|_| CardError::encryption("decrypted field is not valid UTF-8"))
    }
}

impl fmt::Debug for ConfidentialFieldCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfidentialFieldCodec").finish_non_exhaustive()
    }
}
