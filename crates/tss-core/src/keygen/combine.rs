//! Combination of received shares into a party's view of the wallet key

use crate::curve::{add_chaincodes, sha512};
use crate::{hd, shamir, Combined, DerivedKey, Error, JShare, PShare, PartyIndex, Result, UShare, YShare};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, warn};

/// Combine this party's own share with the shares every other party sent it
///
/// Each peer share must be addressed to this party and pass its Feldman
/// commitment check. A failure is reported as [`Error::KeyCombine`] and must
/// abort keychain creation.
#[instrument(skip_all, fields(party = u_share.i))]
pub fn key_combine(u_share: &UShare, y_shares: &[YShare]) -> Result<Combined> {
    let expected = u_share.n.saturating_sub(1) as usize;
    if y_shares.len() != expected {
        return Err(Error::KeyCombine(format!(
            "expected {} peer shares, got {}",
            expected,
            y_shares.len()
        )));
    }

    let mut origins = BTreeSet::new();
    for share in y_shares {
        check_peer_share(u_share, share)?;
        if !origins.insert(share.j) {
            return Err(Error::KeyCombine(format!(
                "duplicate share from party {}",
                share.j
            )));
        }
    }

    let y = y_shares.iter().fold(u_share.y, |acc, share| acc + share.y);
    let x = y_shares.iter().fold(u_share.u, |acc, share| acc + share.u);
    let chaincode = y_shares
        .iter()
        .fold(u_share.chaincode, |acc, share| add_chaincodes(&acc, &share.chaincode));

    let expanded = sha512(&[&u_share.seed[..]]);
    let mut prefix = [0u8; 32];
    prefix.copy_from_slice(&expanded[32..]);

    let j_shares: BTreeMap<PartyIndex, JShare> = y_shares
        .iter()
        .map(|share| {
            (
                share.j,
                JShare {
                    i: share.j,
                    j: u_share.i,
                },
            )
        })
        .collect();

    debug!(peers = j_shares.len(), "combined key shares");

    Ok(Combined {
        p_share: PShare {
            i: u_share.i,
            t: u_share.t,
            n: u_share.n,
            y,
            u: x,
            prefix,
            chaincode,
        },
        j_shares,
    })
}

fn check_peer_share(u_share: &UShare, share: &YShare) -> Result<()> {
    if share.i != u_share.i {
        return Err(Error::KeyCombine(format!(
            "share from party {} is addressed to party {}, not {}",
            share.j, share.i, u_share.i
        )));
    }
    if share.j == u_share.i || share.j < 1 || share.j > u_share.n {
        return Err(Error::KeyCombine(format!(
            "share has invalid origin {}",
            share.j
        )));
    }
    if share.v.len() != u_share.t as usize {
        return Err(Error::KeyCombine(format!(
            "share from party {} carries {} commitments, expected {}",
            share.j,
            share.v.len(),
            u_share.t
        )));
    }
    if share.v[0] != share.y {
        return Err(Error::KeyCombine(format!(
            "share from party {} commits to a different public key",
            share.j
        )));
    }
    if !shamir::verify(&share.u, &share.v, share.i) {
        warn!(from = share.j, "peer share failed commitment check");
        return Err(Error::KeyCombine(format!(
            "share from party {} failed commitment check",
            share.j
        )));
    }
    Ok(())
}

/// Combine, then move the combined key along a non-hardened derivation path
///
/// Every party derives the same public key and chaincode; each only learns
/// its own tweaked share.
#[instrument(skip(u_share, y_shares), fields(party = u_share.i))]
pub fn key_derive(u_share: &UShare, y_shares: &[YShare], path: &str) -> Result<DerivedKey> {
    let combined = key_combine(u_share, y_shares)?;
    let root = &combined.p_share;
    let node = hd::derive_path(&root.y, &root.chaincode, path)?;

    Ok(DerivedKey {
        p_share: PShare {
            i: root.i,
            t: root.t,
            n: root.n,
            y: node.public_key,
            u: root.u + node.tweak,
            prefix: root.prefix,
            chaincode: node.chaincode,
        },
        j_shares: combined.j_shares.clone(),
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::base_mul;
    use crate::keygen::key_share;
    use crate::KeyShare;
    use curve25519_dalek::scalar::Scalar;

    fn incoming(shares: &[&KeyShare], recipient: PartyIndex) -> Vec<YShare> {
        shares
            .iter()
            .map(|share| share.y_shares[&recipient].clone())
            .collect()
    }

    fn three_parties() -> (KeyShare, KeyShare, KeyShare) {
        (
            key_share(1, 2, 3).unwrap(),
            key_share(2, 2, 3).unwrap(),
            key_share(3, 2, 3).unwrap(),
        )
    }

    #[test]
    fn test_all_parties_agree_on_common_keychain() {
        let (a, b, c) = three_parties();
        let ca = key_combine(&a.u_share, &incoming(&[&b, &c], 1)).unwrap();
        let cb = key_combine(&b.u_share, &incoming(&[&a, &c], 2)).unwrap();
        let cc = key_combine(&c.u_share, &incoming(&[&a, &b], 3)).unwrap();

        assert_eq!(ca.common_keychain(), cb.common_keychain());
        assert_eq!(cb.common_keychain(), cc.common_keychain());
        assert_eq!(ca.common_keychain().as_str().len(), 128);
    }

    #[test]
    fn test_shares_interpolate_to_public_key() {
        let (a, b, c) = three_parties();
        let ca = key_combine(&a.u_share, &incoming(&[&b, &c], 1)).unwrap();
        let cc = key_combine(&c.u_share, &incoming(&[&a, &b], 3)).unwrap();

        let mut points = BTreeMap::new();
        points.insert(1, ca.p_share.u);
        points.insert(3, cc.p_share.u);
        let secret = shamir::combine(&points).unwrap();
        assert_eq!(base_mul(&secret), ca.p_share.y);
    }

    #[test]
    fn test_tampered_share_is_rejected() {
        let (a, b, c) = three_parties();
        let mut shares = incoming(&[&b, &c], 1);
        shares[0].u += Scalar::ONE;
        assert!(matches!(
            key_combine(&a.u_share, &shares),
            Err(Error::KeyCombine(_))
        ));
    }

    #[test]
    fn test_misaddressed_and_missing_shares_are_rejected() {
        let (a, b, c) = three_parties();
        let wrong = vec![b.y_shares[&3].clone(), c.y_shares[&1].clone()];
        assert!(matches!(
            key_combine(&a.u_share, &wrong),
            Err(Error::KeyCombine(_))
        ));

        let missing = incoming(&[&b], 1);
        assert!(matches!(
            key_combine(&a.u_share, &missing),
            Err(Error::KeyCombine(_))
        ));

        let duplicated = vec![b.y_shares[&1].clone(), b.y_shares[&1].clone()];
        assert!(matches!(
            key_combine(&a.u_share, &duplicated),
            Err(Error::KeyCombine(_))
        ));
    }

    #[test]
    fn test_derived_keys_agree() {
        let (a, b, c) = three_parties();
        let da = key_derive(&a.u_share, &incoming(&[&b, &c], 1), "m/0/1").unwrap();
        let db = key_derive(&b.u_share, &incoming(&[&a, &c], 2), "m/0/1").unwrap();
        assert_eq!(da.p_share.y, db.p_share.y);
        assert_eq!(da.p_share.chaincode, db.p_share.chaincode);

        let mut points = BTreeMap::new();
        points.insert(1, da.p_share.u);
        points.insert(2, db.p_share.u);
        assert_eq!(base_mul(&shamir::combine(&points).unwrap()), da.p_share.y);

        let root = key_combine(&a.u_share, &incoming(&[&b, &c], 1)).unwrap();
        assert_ne!(root.p_share.y, da.p_share.y);
    }
}
