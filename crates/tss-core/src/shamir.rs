//! Shamir secret sharing with Feldman commitments over the Ed25519 scalar field

use crate::curve::{base_mul, random_scalar};
use crate::{Error, PartyIndex, Result};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand_core::{CryptoRng, RngCore};
use std::collections::BTreeMap;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Random polynomial `f(z) = a_0 + a_1 z + ... + a_{t-1} z^{t-1}` with `a_0` the secret
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    /// Sample a polynomial of degree `threshold - 1` with the given constant term
    pub fn with_secret<R: RngCore + CryptoRng>(
        secret: Scalar,
        threshold: u32,
        rng: &mut R,
    ) -> Self {
        let mut coefficients = Vec::with_capacity(threshold as usize);
        coefficients.push(secret);
        for _ in 1..threshold {
            coefficients.push(random_scalar(rng));
        }
        Self { coefficients }
    }

    /// Horner evaluation at `x`
    pub fn evaluate(&self, x: PartyIndex) -> Scalar {
        let x = Scalar::from(x as u64);
        self.coefficients
            .iter()
            .rev()
            .fold(Scalar::ZERO, |acc, coeff| acc * x + coeff)
    }

    /// Feldman commitments `a_k * G`
    pub fn commitments(&self) -> Vec<EdwardsPoint> {
        self.coefficients.iter().map(base_mul).collect()
    }
}

/// Output of [`split`]
pub struct SecretShares {
    /// Share for each party index `1..=n`
    pub shares: BTreeMap<PartyIndex, Scalar>,
    /// Feldman commitments; `commitments[0]` is the public key of the secret
    pub commitments: Vec<EdwardsPoint>,
}

/// Split `secret` into `n` shares, any `threshold` of which reconstruct it
pub fn split<R: RngCore + CryptoRng>(
    secret: Scalar,
    threshold: u32,
    n: u32,
    rng: &mut R,
) -> Result<SecretShares> {
    if threshold < 2 || threshold > n {
        return Err(Error::InvalidParameter(format!(
            "threshold {} must be between 2 and {}",
            threshold, n
        )));
    }

    let poly = Polynomial::with_secret(secret, threshold, rng);
    let shares = (1..=n).map(|i| (i, poly.evaluate(i))).collect();

    Ok(SecretShares {
        shares,
        commitments: poly.commitments(),
    })
}

/// Feldman check: `share * G == sum_k commitments[k] * index^k`
pub fn verify(share: &Scalar, commitments: &[EdwardsPoint], index: PartyIndex) -> bool {
    if commitments.is_empty() {
        return false;
    }
    let x = Scalar::from(index as u64);
    let mut power = Scalar::ONE;
    let mut expected = EdwardsPoint::identity();
    for commitment in commitments {
        expected += commitment * power;
        power *= x;
    }
    base_mul(share) == expected
}

/// Lagrange basis polynomial for `index` over `indices`, evaluated at zero
pub fn lagrange_coefficient(index: PartyIndex, indices: &[PartyIndex]) -> Result<Scalar> {
    if !indices.contains(&index) {
        return Err(Error::InvalidParameter(format!(
            "index {} not among signers {:?}",
            index, indices
        )));
    }

    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != indices.len() {
        return Err(Error::InvalidParameter(format!(
            "duplicate index in signers {:?}",
            indices
        )));
    }

    let i = Scalar::from(index as u64);
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;

    for &other in indices {
        if other == index {
            continue;
        }
        if other == 0 {
            return Err(Error::InvalidParameter("party index 0 is reserved".into()));
        }
        let j = Scalar::from(other as u64);
        numerator *= j;
        denominator *= j - i;
    }

    Ok(numerator * denominator.invert())
}

/// Interpolate the shared value at zero from `(index, share)` pairs
pub fn combine(points: &BTreeMap<PartyIndex, Scalar>) -> Result<Scalar> {
    if points.is_empty() {
        return Err(Error::InvalidParameter("no shares to combine".into()));
    }
    let indices: Vec<PartyIndex> = points.keys().copied().collect();
    let mut secret = Scalar::ZERO;
    for (&index, share) in points {
        secret += lagrange_coefficient(index, &indices)? * share;
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_any_two_of_three_reconstruct() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let secret = random_scalar(&mut rng);
        let split = split(secret, 2, 3, &mut rng).unwrap();

        for (a, b) in [(1, 2), (1, 3), (2, 3)] {
            let mut pair = BTreeMap::new();
            pair.insert(a, split.shares[&a]);
            pair.insert(b, split.shares[&b]);
            assert_eq!(combine(&pair).unwrap(), secret);
        }
    }

    #[test]
    fn test_single_share_reveals_nothing_useful() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let secret = random_scalar(&mut rng);
        let split = split(secret, 2, 3, &mut rng).unwrap();

        let mut single = BTreeMap::new();
        single.insert(1, split.shares[&1]);
        assert_ne!(combine(&single).unwrap(), secret);
    }

    #[test]
    fn test_feldman_verify() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let split = split(random_scalar(&mut rng), 2, 3, &mut rng).unwrap();

        for (index, share) in &split.shares {
            assert!(verify(share, &split.commitments, *index));
        }
        assert!(!verify(&split.shares[&1], &split.commitments, 2));
        assert!(!verify(&(split.shares[&1] + Scalar::ONE), &split.commitments, 1));
    }

    #[test]
    fn test_lagrange_pair_sums_to_one() {
        for (a, b) in [(1, 2), (1, 3), (2, 3)] {
            let la = lagrange_coefficient(a, &[a, b]).unwrap();
            let lb = lagrange_coefficient(b, &[a, b]).unwrap();
            assert_eq!(la + lb, Scalar::ONE);
        }
    }

    #[test]
    fn test_invalid_threshold() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        assert!(split(Scalar::ONE, 4, 3, &mut rng).is_err());
        assert!(split(Scalar::ONE, 1, 3, &mut rng).is_err());
        assert!(lagrange_coefficient(1, &[2, 3]).is_err());
        assert!(lagrange_coefficient(1, &[1, 2, 2]).is_err());
    }
}
