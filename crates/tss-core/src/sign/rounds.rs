//! Pure round functions of the two-party signing protocol
//!
//! Nonces are additive: each party samples `r_i`, commits to `R_i = r_i*G`,
//! and only opens the commitment after the counterpart's commitment has
//! arrived, so neither side can bias `R = R_i + R_j`. With `lambda_i` the
//! Lagrange coefficient of the signing pair, the partial signature is
//! `s_i = r_i + k * lambda_i * x_i` and `R || (s_i + s_j)` is a plain Ed25519
//! signature under the combined key.

use super::messages::*;
use crate::curve::{base_mul, scalar_from_hash};
use crate::{shamir, Error, JShare, PShare, PartyIndex, Result};
use curve25519_dalek::edwards::EdwardsPoint;
use ed25519_dalek::{Signature as DalekSignature, VerifyingKey};
use merlin::Transcript;
use rand::rngs::OsRng;
use rand_core::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

fn nonce_commitment(
    from: PartyIndex,
    to: PartyIndex,
    y: &EdwardsPoint,
    r_point: &EdwardsPoint,
    blind: &[u8; 32],
) -> [u8; 32] {
    let mut transcript = Transcript::new(b"tss-eddsa-nonce-commitment");
    transcript.append_u64(b"from", from as u64);
    transcript.append_u64(b"to", to as u64);
    transcript.append_message(b"Y", y.compress().as_bytes());
    transcript.append_message(b"R", r_point.compress().as_bytes());
    transcript.append_message(b"blind", blind);

    let mut out = [0u8; 32];
    transcript.challenge_bytes(b"commitment", &mut out);
    out
}

fn check_pair(
    what: &str,
    got: (PartyIndex, PartyIndex),
    expected: (PartyIndex, PartyIndex),
) -> Result<()> {
    if got != expected {
        return Err(Error::SigningAborted(format!(
            "{} index pair ({}, {}) does not match expected ({}, {})",
            what, got.0, got.1, expected.0, expected.1
        )));
    }
    Ok(())
}

/// Start a signing attempt with the counterpart described by `y_share`
///
/// Every call draws fresh randomness; the nonce is never derived from the
/// message alone.
pub fn sign_share(x_share: &PShare, y_share: &JShare) -> Result<SignShare> {
    if y_share.j != x_share.i {
        return Err(Error::SigningAborted(format!(
            "counterpart record belongs to party {}, not {}",
            y_share.j, x_share.i
        )));
    }
    if y_share.i == x_share.i || y_share.i < 1 || y_share.i > x_share.n {
        return Err(Error::SigningAborted(format!(
            "invalid counterpart index {}",
            y_share.i
        )));
    }

    let mut entropy = [0u8; 64];
    OsRng.fill_bytes(&mut entropy);
    let mut blind = [0u8; 32];
    OsRng.fill_bytes(&mut blind);

    let r = scalar_from_hash(&[
        &x_share.prefix[..],
        &entropy[..],
        &x_share.i.to_le_bytes()[..],
        &y_share.i.to_le_bytes()[..],
    ]);
    entropy.zeroize();
    let r_point = base_mul(&r);

    let commitment = nonce_commitment(x_share.i, y_share.i, &x_share.y, &r_point, &blind);

    Ok(SignShare {
        k_share: KShare {
            i: x_share.i,
            j: y_share.i,
            commitment,
        },
        w_share: WShare {
            i: x_share.i,
            j: y_share.i,
            y: x_share.y,
            x: x_share.u,
            r,
            r_point,
            blind,
        },
    })
}

/// Convert pass; called twice per party with different inputs
pub fn sign_convert(input: ConvertInput<'_>) -> Result<ConvertOutput> {
    match input {
        ConvertInput::Reveal {
            w_share,
            peer_k_share,
        } => {
            check_pair(
                "k share",
                (peer_k_share.i, peer_k_share.j),
                (w_share.j, w_share.i),
            )?;

            Ok(ConvertOutput::Revealed {
                a_share: AShare {
                    i: w_share.i,
                    j: w_share.j,
                    r_point: w_share.r_point,
                    blind: w_share.blind,
                },
                mu_share: MuShare {
                    i: w_share.i,
                    j: w_share.j,
                    y: w_share.y,
                    x: w_share.x,
                    r: w_share.r,
                    r_point: w_share.r_point,
                    peer_commitment: peer_k_share.commitment,
                },
            })
        }
        ConvertInput::Bind {
            mu_share,
            peer_a_share,
        } => {
            check_pair(
                "a share",
                (peer_a_share.i, peer_a_share.j),
                (mu_share.j, mu_share.i),
            )?;

            let opened = nonce_commitment(
                peer_a_share.i,
                peer_a_share.j,
                &mu_share.y,
                &peer_a_share.r_point,
                &peer_a_share.blind,
            );
            if !bool::from(opened[..].ct_eq(&mu_share.peer_commitment[..])) {
                return Err(Error::SigningAborted(format!(
                    "nonce commitment from party {} does not open",
                    peer_a_share.i
                )));
            }
            if peer_a_share.r_point.is_small_order() {
                return Err(Error::SigningAborted(format!(
                    "party {} sent a small-order nonce point",
                    peer_a_share.i
                )));
            }

            Ok(ConvertOutput::Bound {
                g_share: GShare {
                    i: mu_share.i,
                    j: mu_share.j,
                    y: mu_share.y,
                    x: mu_share.x,
                    r: mu_share.r,
                    r_point: mu_share.r_point + peer_a_share.r_point,
                },
            })
        }
    }
}

/// Fix the signing pair and weight the key share by its Lagrange coefficient
pub fn sign_combine(input: SignCombineInput<'_>) -> Result<SignCombineOutput> {
    let g_share = input.g_share;
    check_pair(
        "sign index",
        (input.sign_index.i, input.sign_index.j),
        (g_share.i, g_share.j),
    )?;

    let lambda = shamir::lagrange_coefficient(g_share.i, &[g_share.i, g_share.j])
        .map_err(|e| Error::SigningAborted(e.to_string()))?;

    Ok(SignCombineOutput {
        o_share: OShare {
            i: g_share.i,
            j: g_share.j,
            y: g_share.y,
            x: lambda * g_share.x,
            r: g_share.r,
            r_point: g_share.r_point,
        },
        d_share: DShare {
            i: g_share.i,
            j: g_share.j,
            r_point: g_share.r_point,
        },
    })
}

/// Produce this party's share of the signature over `message`
pub fn sign(
    message: &[u8],
    o_share: &OShare,
    counterpart_d_share: &DShare,
) -> Result<PartialSignature> {
    check_pair(
        "d share",
        (counterpart_d_share.i, counterpart_d_share.j),
        (o_share.j, o_share.i),
    )?;

    let ours = o_share.r_point.compress();
    let theirs = counterpart_d_share.r_point.compress();
    if !bool::from(ours.as_bytes()[..].ct_eq(&theirs.as_bytes()[..])) {
        return Err(Error::SigningAborted(
            "counterpart aggregated a different nonce point".into(),
        ));
    }

    let k = scalar_from_hash(&[
        ours.as_bytes(),
        o_share.y.compress().as_bytes(),
        message,
    ]);

    Ok(PartialSignature {
        i: o_share.i,
        j: o_share.j,
        y: o_share.y,
        r_point: o_share.r_point,
        sigma: o_share.r + k * o_share.x,
    })
}

/// Aggregate exactly two partial signatures from a cooperating pair
pub fn construct_signature(partials: &[PartialSignature]) -> Result<Signature> {
    let [a, b] = partials else {
        return Err(Error::SigningAborted(format!(
            "expected 2 partial signatures, got {}",
            partials.len()
        )));
    };

    check_pair("partial signature", (b.i, b.j), (a.j, a.i))?;
    if a.r_point != b.r_point {
        return Err(Error::SigningAborted(
            "partial signatures disagree on the nonce point".into(),
        ));
    }
    if a.y != b.y {
        return Err(Error::SigningAborted(
            "partial signatures disagree on the public key".into(),
        ));
    }

    Ok(Signature {
        y: a.y.compress().to_bytes(),
        r: a.r_point.compress().to_bytes(),
        sigma: (a.sigma + b.sigma).to_bytes(),
    })
}

/// Strict Ed25519 verification against the signature's public key
pub fn verify(message: &[u8], signature: &Signature) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(&signature.y) else {
        return false;
    };
    let signature = DalekSignature::from_bytes(&signature.to_bytes());
    key.verify_strict(message, &signature).is_ok()
}

/// Verify independent signatures, in parallel when the `multi-thread` feature is on
pub fn verify_batch(items: &[(Vec<u8>, Signature)]) -> Vec<bool> {
    #[cfg(feature = "multi-thread")]
    {
        use rayon::prelude::*;
        items
            .par_iter()
            .map(|(message, signature)| verify(message, signature))
            .collect()
    }
    #[cfg(not(feature = "multi-thread"))]
    {
        items
            .iter()
            .map(|(message, signature)| verify(message, signature))
            .collect()
    }
}
