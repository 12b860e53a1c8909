use crate::{Error, Result};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// 20-byte address or node id
pub type ShortId = [u8; 20];

const NODE_ID_PREFIX: &str = "NodeID-";
const CHECKSUM_LEN: usize = 4;

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// base58 of the bytes followed by the last four bytes of their SHA-256
pub fn cb58_encode(bytes: &[u8]) -> String {
    let digest = sha256(bytes);
    let mut with_checksum = bytes.to_vec();
    with_checksum.extend_from_slice(&digest[32 - CHECKSUM_LEN..]);
    bs58::encode(with_checksum).into_string()
}

pub fn cb58_decode(value: &str) -> Result<Vec<u8>> {
    let decoded = bs58::decode(value)
        .into_vec()
        .map_err(|e| Error::parse("cb58", e))?;
    if decoded.len() < CHECKSUM_LEN {
        return Err(Error::parse("cb58", "shorter than its checksum"));
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
    if sha256(payload)[32 - CHECKSUM_LEN..] != *checksum {
        return Err(Error::parse("cb58", format!("bad checksum in {}", value)));
    }
    Ok(payload.to_vec())
}

pub fn cb58_decode_array<const N: usize>(field: &str, value: &str) -> Result<[u8; N]> {
    let bytes = cb58_decode(value).map_err(|_| Error::build(field, value))?;
    bytes.try_into().map_err(|_| Error::build(field, value))
}

pub fn parse_node_id(value: &str) -> Result<ShortId> {
    let encoded = value
        .strip_prefix(NODE_ID_PREFIX)
        .ok_or_else(|| Error::build("nodeID", value))?;
    cb58_decode_array("nodeID", encoded)
}

pub fn format_node_id(id: &ShortId) -> String {
    format!("{}{}", NODE_ID_PREFIX, cb58_encode(id))
}

/// ripemd160(sha256(compressed public key))
pub fn address_from_public_key(compressed: &[u8]) -> ShortId {
    Ripemd160::digest(sha256(compressed)).into()
}

/// Hex address (optional `0x`) or 33-byte compressed public key in hex
pub fn parse_address(field: &str, value: &str) -> Result<ShortId> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed).map_err(|_| Error::build(field, value))?;
    match bytes.len() {
        20 => {
            let mut id = [0u8; 20];
            id.copy_from_slice(&bytes);
            Ok(id)
        }
        33 if bytes[0] == 0x02 || bytes[0] == 0x03 => Ok(address_from_public_key(&bytes)),
        _ => Err(Error::build(field, value)),
    }
}

pub fn format_address(id: &ShortId) -> String {
    hex::encode(id)
}

pub fn is_valid_address(value: &str) -> bool {
    parse_address("address", value).is_ok()
}
