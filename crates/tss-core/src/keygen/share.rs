//! Per-party key share generation

use crate::curve::{clamp, sha512};
use crate::{shamir, Error, KeyShare, PartyIndex, Result, UShare, YShare};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use std::collections::BTreeMap;
use tracing::{debug, instrument};
use zeroize::Zeroize;

/// Largest supported party count
const MAX_PARTIES: u32 = 255;

/// Generate a fresh key share for party `index` using the OS CSPRNG
pub fn key_share(index: PartyIndex, threshold: u32, total_parties: u32) -> Result<KeyShare> {
    key_share_with_rng(index, threshold, total_parties, &mut OsRng)
}

/// Generate a fresh key share drawing randomness from `rng`
///
/// The secret is expanded from a 32-byte seed the way an Ed25519 signing key
/// is: the clamped lower half of `SHA-512(seed)` becomes the polynomial's
/// constant term and the upper half is kept as the nonce prefix.
#[instrument(skip(rng))]
pub fn key_share_with_rng<R: RngCore + CryptoRng>(
    index: PartyIndex,
    threshold: u32,
    total_parties: u32,
    rng: &mut R,
) -> Result<KeyShare> {
    validate(index, threshold, total_parties)?;

    let mut seed = [0u8; 32];
    rng.fill_bytes(&mut seed);
    let mut chaincode = [0u8; 32];
    rng.fill_bytes(&mut chaincode);

    let mut expanded = sha512(&[&seed[..]]);
    let mut secret_bytes = [0u8; 32];
    secret_bytes.copy_from_slice(&expanded[..32]);
    let secret = Scalar::from_bytes_mod_order(clamp(secret_bytes));
    expanded.zeroize();
    secret_bytes.zeroize();

    let split = shamir::split(secret, threshold, total_parties, rng)?;
    let y = split.commitments[0];

    let own = split
        .shares
        .get(&index)
        .copied()
        .ok_or_else(|| Error::InvalidParameter(format!("no share for index {}", index)))?;

    let u_share = UShare {
        i: index,
        t: threshold,
        n: total_parties,
        y,
        seed,
        chaincode,
        u: own,
    };
    seed.zeroize();

    let y_shares: BTreeMap<PartyIndex, YShare> = split
        .shares
        .iter()
        .filter(|(recipient, _)| **recipient != index)
        .map(|(&recipient, share)| {
            (
                recipient,
                YShare {
                    i: recipient,
                    j: index,
                    y,
                    v: split.commitments.clone(),
                    u: *share,
                    chaincode,
                },
            )
        })
        .collect();

    debug!(party = index, peers = y_shares.len(), "generated key share");

    Ok(KeyShare { u_share, y_shares })
}

fn validate(index: PartyIndex, threshold: u32, total_parties: u32) -> Result<()> {
    if total_parties < 2 || total_parties > MAX_PARTIES {
        return Err(Error::InvalidParameter(format!(
            "total parties must be between 2 and {}, got {}",
            MAX_PARTIES, total_parties
        )));
    }
    if index < 1 || index > total_parties {
        return Err(Error::InvalidParameter(format!(
            "index must be between 1 and {}, got {}",
            total_parties, index
        )));
    }
    if threshold < 2 || threshold > total_parties {
        return Err(Error::InvalidParameter(format!(
            "threshold must be between 2 and {}, got {}",
            total_parties, threshold
        )));
    }
    Ok(())
}
