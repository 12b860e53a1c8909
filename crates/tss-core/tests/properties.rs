use curve25519_dalek::Scalar;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::BTreeMap;
use tss_core::curve::{add_chaincodes, base_mul};
use tss_core::hd::derive_path;
use tss_core::keygen::{key_combine, key_derive, key_share_with_rng};
use tss_core::{shamir, KeyShare, YShare};

fn wallet(seed: u64) -> Vec<KeyShare> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (1..=3)
        .map(|i| key_share_with_rng(i, 2, 3, &mut rng).unwrap())
        .collect()
}

fn incoming(shares: &[KeyShare], recipient: u32) -> Vec<YShare> {
    shares
        .iter()
        .filter(|share| share.u_share.i != recipient)
        .map(|share| share.y_shares[&recipient].clone())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn chaincode_addition_commutes(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
        prop_assert_eq!(add_chaincodes(&a, &b), add_chaincodes(&b, &a));
        prop_assert_eq!(add_chaincodes(&a, &[0u8; 32]), a);
    }

    #[test]
    fn any_two_shares_reconstruct(seed in any::<u64>(), pick in 0usize..3) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let secret = Scalar::from(seed) + Scalar::ONE;
        let split = shamir::split(secret, 2, 3, &mut rng).unwrap();

        let pair: BTreeMap<u32, Scalar> = split
            .shares
            .iter()
            .filter(|(index, _)| **index as usize != pick + 1)
            .map(|(index, share)| (*index, *share))
            .collect();
        prop_assert_eq!(pair.len(), 2);
        prop_assert_eq!(shamir::combine(&pair).unwrap(), secret);

        for (index, share) in &split.shares {
            prop_assert!(shamir::verify(share, &split.commitments, *index));
        }
    }

    #[test]
    fn derivation_tracks_private_tweak(
        secret in any::<u64>(),
        chaincode in any::<[u8; 32]>(),
        a in 0u32..1000,
        b in 0u32..1000,
    ) {
        let x = Scalar::from(secret) + Scalar::ONE;
        let path = format!("m/{}/{}", a, b);
        let node = derive_path(&base_mul(&x), &chaincode, &path).unwrap();
        prop_assert_eq!(node.public_key, base_mul(&(x + node.tweak)));
    }

    #[test]
    fn every_party_derives_the_same_key(seed in any::<u64>(), index in 0u32..100) {
        let shares = wallet(seed);
        let path = format!("m/{}", index);

        let derived: Vec<_> = (1..=3)
            .map(|i| {
                let own = &shares[(i - 1) as usize];
                key_derive(&own.u_share, &incoming(&shares, i), &path).unwrap()
            })
            .collect();

        let expected = derived[0].p_share.common_keychain();
        for key in &derived {
            prop_assert_eq!(&key.p_share.common_keychain(), &expected);
        }

        // tweaked shares of any pair still interpolate to the derived key
        let pair: BTreeMap<u32, Scalar> = derived[..2]
            .iter()
            .map(|key| (key.p_share.i, key.p_share.u))
            .collect();
        prop_assert_eq!(base_mul(&shamir::combine(&pair).unwrap()), derived[0].p_share.y);

        let root = key_combine(&shares[0].u_share, &incoming(&shares, 1)).unwrap();
        prop_assert_eq!(root.p_share.i, 1);
    }
}
