use super::utils::{address_from_public_key, ShortId};
use crate::{Error, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

/// Recoverable secp256k1 signature: r || s || recovery id
pub const SIGNATURE_LEN: usize = 65;

/// secp256k1 signer for P-chain credentials
#[derive(Clone, Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// From a 32-byte private key in hex
    pub fn from_private_key_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value.strip_prefix("0x").unwrap_or(value))
            .map_err(|_| Error::InvalidKey("private key is not hex".into()))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|_| Error::InvalidKey("private key is not a valid secp256k1 scalar".into()))?;
        Ok(Self { signing_key })
    }

    pub fn public_key(&self) -> [u8; 33] {
        let point = self.signing_key.verifying_key().to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        out
    }

    pub fn address(&self) -> ShortId {
        address_from_public_key(&self.public_key())
    }

    /// Sign a 32-byte digest
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; SIGNATURE_LEN]> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| Error::InvalidSignature(e.to_string()))?;
        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }
}

/// Address of the key that produced `signature` over `digest`
pub fn recover_address(digest: &[u8; 32], signature: &[u8; SIGNATURE_LEN]) -> Result<ShortId> {
    let invalid = || Error::InvalidSignature("malformed recoverable signature".into());
    let parsed = Signature::from_slice(&signature[..64]).map_err(|_| invalid())?;
    let recovery_id = RecoveryId::from_byte(signature[64]).ok_or_else(invalid)?;
    let key = VerifyingKey::recover_from_prehash(digest, &parsed, recovery_id)
        .map_err(|_| invalid())?;
    Ok(address_from_public_key(key.to_encoded_point(true).as_bytes()))
}
