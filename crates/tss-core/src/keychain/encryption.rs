//! Password-based encryption of signing material

use super::Encryptor;
use crate::mpc::async_trait;
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

/// Envelope produced by [`PasswordEncryptor`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    v: u32,
    salt: String,
    nonce: String,
    ct: String,
}

/// ChaCha20-Poly1305 keyed by HKDF-SHA256 over the password and a random salt
#[derive(Debug, Clone, Default)]
pub struct PasswordEncryptor;

impl PasswordEncryptor {
    /// Current version of the envelope format
    pub const CURRENT_VERSION: u32 = 1;

    const INFO: &'static [u8] = b"tss-signing-material";

    pub fn new() -> Self {
        Self
    }

    fn cipher(password: &str, salt: &[u8]) -> Result<ChaCha20Poly1305> {
        let hk = Hkdf::<Sha256>::new(Some(salt), password.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(Self::INFO, &mut key)
            .map_err(|e| Error::Encryption(e.to_string()))?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        key.zeroize();
        Ok(cipher)
    }

    pub fn encrypt_str(&self, input: &str, password: &str) -> Result<String> {
        let salt: [u8; 32] = rand::random();
        let nonce_bytes: [u8; 12] = rand::random();

        let ciphertext = Self::cipher(password, &salt)?
            .encrypt(Nonce::from_slice(&nonce_bytes), input.as_bytes())
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let envelope = Envelope {
            v: Self::CURRENT_VERSION,
            salt: STANDARD.encode(salt),
            nonce: STANDARD.encode(nonce_bytes),
            ct: STANDARD.encode(ciphertext),
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    pub fn decrypt_str(&self, ciphertext: &str, password: &str) -> Result<String> {
        let envelope: Envelope = serde_json::from_str(ciphertext)
            .map_err(|e| Error::Deserialization(e.to_string()))?;
        if envelope.v != Self::CURRENT_VERSION {
            return Err(Error::Encryption(format!(
                "unsupported envelope version {}",
                envelope.v
            )));
        }

        let decode = |field: &str| {
            STANDARD
                .decode(field)
                .map_err(|e| Error::Deserialization(e.to_string()))
        };
        let salt = decode(&envelope.salt)?;
        let nonce = decode(&envelope.nonce)?;
        let ct = decode(&envelope.ct)?;
        if nonce.len() != 12 {
            return Err(Error::Deserialization("Invalid nonce length".into()));
        }

        let plaintext = Self::cipher(password, &salt)?
            .decrypt(Nonce::from_slice(&nonce), ct.as_ref())
            .map_err(|_| {
                Error::Encryption("Decryption failed - invalid password or corrupted data".into())
            })?;

        String::from_utf8(plaintext).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[async_trait]
impl Encryptor for PasswordEncryptor {
    async fn encrypt(&self, input: &str, password: &str) -> Result<String> {
        self.encrypt_str(input, password)
    }

    async fn decrypt(&self, ciphertext: &str, password: &str) -> Result<String> {
        self.decrypt_str(ciphertext, password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let encryptor = PasswordEncryptor::new();
        let sealed = encryptor.encrypt_str("signing material", "hunter2").unwrap();
        assert!(!sealed.contains("signing material"));
        assert_eq!(
            encryptor.decrypt_str(&sealed, "hunter2").unwrap(),
            "signing material"
        );
    }

    #[test]
    fn test_wrong_password_fails() {
        let encryptor = PasswordEncryptor::new();
        let sealed = encryptor.encrypt_str("secret", "right").unwrap();
        assert!(matches!(
            encryptor.decrypt_str(&sealed, "wrong"),
            Err(Error::Encryption(_))
        ));
    }

    #[test]
    fn test_fresh_salt_per_encryption() {
        let encryptor = PasswordEncryptor::new();
        let a = encryptor.encrypt_str("same", "pw").unwrap();
        let b = encryptor.encrypt_str("same", "pw").unwrap();
        assert_ne!(a, b);
    }
}
