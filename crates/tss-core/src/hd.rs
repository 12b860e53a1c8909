//! Non-hardened hierarchical derivation over a combined key
//!
//! A step only needs the public key and chaincode, so every party computes
//! the same tweak locally and adds it to its own share. Because the Lagrange
//! coefficients of any signing pair sum to one, the tweaked shares still
//! interpolate to `x + t`, the secret of `Y + t*G`.

use crate::curve::{base_mul, Chaincode};
use crate::{Error, Result};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use derivation_path::{ChildIndex, DerivationPath};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use tracing::trace;

type HmacSha512 = Hmac<Sha512>;

/// Result of walking a derivation path
#[derive(Clone)]
pub struct HdNode {
    pub public_key: EdwardsPoint,
    pub chaincode: Chaincode,
    /// Sum of all step tweaks; each party adds it to its share
    pub tweak: Scalar,
}

/// Parse `m/0/1` style paths; an empty path or `m` yields the root
pub fn parse_path(path: &str) -> Result<Vec<u32>> {
    let path = path.trim();
    if path.is_empty() || path == "m" {
        return Ok(Vec::new());
    }

    let parsed: DerivationPath = path
        .parse()
        .map_err(|e| Error::Derivation(format!("Invalid path {}: {:?}", path, e)))?;

    parsed
        .path()
        .iter()
        .map(|child| match child {
            ChildIndex::Normal(index) => Ok(*index),
            ChildIndex::Hardened(_) => Err(Error::Derivation(
                "Hardened derivation not supported in threshold setting".into(),
            )),
        })
        .collect()
}

/// Single non-hardened step
pub fn derive_child(
    public_key: &EdwardsPoint,
    chaincode: &Chaincode,
    index: u32,
) -> Result<(Scalar, EdwardsPoint, Chaincode)> {
    let mut mac =
        HmacSha512::new_from_slice(chaincode).map_err(|e| Error::Derivation(e.to_string()))?;
    mac.update(&[0x02]);
    mac.update(public_key.compress().as_bytes());
    mac.update(&index.to_le_bytes());
    let digest = mac.finalize().into_bytes();

    let mut tweak_bytes = [0u8; 32];
    tweak_bytes.copy_from_slice(&digest[..32]);
    let tweak = Scalar::from_bytes_mod_order(tweak_bytes);

    let mut child_chaincode = [0u8; 32];
    child_chaincode.copy_from_slice(&digest[32..]);

    Ok((tweak, public_key + base_mul(&tweak), child_chaincode))
}

/// Walk `path` from the root key
pub fn derive_path(public_key: &EdwardsPoint, chaincode: &Chaincode, path: &str) -> Result<HdNode> {
    let mut node = HdNode {
        public_key: *public_key,
        chaincode: *chaincode,
        tweak: Scalar::ZERO,
    };

    for index in parse_path(path)? {
        let (tweak, child_key, child_chaincode) =
            derive_child(&node.public_key, &node.chaincode, index)?;
        trace!(index, "derived child");
        node.tweak += tweak;
        node.public_key = child_key;
        node.chaincode = child_chaincode;
    }

    Ok(node)
}
