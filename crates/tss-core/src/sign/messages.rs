//! Signing round artifacts
//!
//! Public shares are sent to the counterpart through the relay. Private
//! shares never leave the party and are wiped on drop.

use crate::curve::serde_hex;
use crate::PartyIndex;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Round 1 message: commitment to the sender's nonce point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KShare {
    /// Sender
    pub i: PartyIndex,
    /// Recipient
    pub j: PartyIndex,
    #[serde(with = "serde_hex::bytes32")]
    pub commitment: [u8; 32],
}

/// Private witness produced alongside a [`KShare`]
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WShare {
    pub i: PartyIndex,
    pub j: PartyIndex,
    #[zeroize(skip)]
    pub y: EdwardsPoint,
    pub x: Scalar,
    pub r: Scalar,
    #[zeroize(skip)]
    pub r_point: EdwardsPoint,
    pub blind: [u8; 32],
}

/// Output of `sign_share`
pub struct SignShare {
    pub k_share: KShare,
    pub w_share: WShare,
}

/// Round 2 message: opening of the sender's nonce commitment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AShare {
    pub i: PartyIndex,
    pub j: PartyIndex,
    #[serde(with = "serde_hex::point")]
    pub r_point: EdwardsPoint,
    #[serde(with = "serde_hex::bytes32")]
    pub blind: [u8; 32],
}

/// Private state waiting for the counterpart's opening
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MuShare {
    pub i: PartyIndex,
    pub j: PartyIndex,
    #[zeroize(skip)]
    pub y: EdwardsPoint,
    pub x: Scalar,
    pub r: Scalar,
    #[zeroize(skip)]
    pub r_point: EdwardsPoint,
    pub peer_commitment: [u8; 32],
}

/// Private state once both nonce points are known; `r_point` is the aggregate
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct GShare {
    pub i: PartyIndex,
    pub j: PartyIndex,
    #[zeroize(skip)]
    pub y: EdwardsPoint,
    pub x: Scalar,
    pub r: Scalar,
    #[zeroize(skip)]
    pub r_point: EdwardsPoint,
}

/// The two cooperating parties as seen by the local party: `i` self, `j` counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignIndex {
    pub i: PartyIndex,
    pub j: PartyIndex,
}

/// Private signing state with the Lagrange-weighted key share
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct OShare {
    pub i: PartyIndex,
    pub j: PartyIndex,
    #[zeroize(skip)]
    pub y: EdwardsPoint,
    pub x: Scalar,
    pub r: Scalar,
    #[zeroize(skip)]
    pub r_point: EdwardsPoint,
}

/// Round 3 message: the aggregate nonce point as the sender computed it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DShare {
    pub i: PartyIndex,
    pub j: PartyIndex,
    #[serde(with = "serde_hex::point")]
    pub r_point: EdwardsPoint,
}

/// Round 4 message: one party's share of the final `s`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialSignature {
    pub i: PartyIndex,
    pub j: PartyIndex,
    #[serde(with = "serde_hex::point")]
    pub y: EdwardsPoint,
    #[serde(with = "serde_hex::point")]
    pub r_point: EdwardsPoint,
    #[serde(with = "serde_hex::scalar")]
    pub sigma: Scalar,
}

/// Input of `sign_convert`; the variant selects the pass
pub enum ConvertInput<'a> {
    /// Open our commitment once the counterpart's commitment arrived
    Reveal {
        w_share: &'a WShare,
        peer_k_share: &'a KShare,
    },
    /// Check the counterpart's opening and aggregate the nonce points
    Bind {
        mu_share: &'a MuShare,
        peer_a_share: &'a AShare,
    },
}

/// Output of `sign_convert`, mirroring [`ConvertInput`]
pub enum ConvertOutput {
    Revealed { a_share: AShare, mu_share: MuShare },
    Bound { g_share: GShare },
}

/// Input of `sign_combine`
pub struct SignCombineInput<'a> {
    pub g_share: &'a GShare,
    pub sign_index: SignIndex,
}

/// Output of `sign_combine`
pub struct SignCombineOutput {
    pub o_share: OShare,
    pub d_share: DShare,
}

/// Final Ed25519 signature with the public key it verifies under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "serde_hex::bytes32")]
    pub y: [u8; 32],
    #[serde(rename = "R", with = "serde_hex::bytes32")]
    pub r: [u8; 32],
    #[serde(with = "serde_hex::bytes32")]
    pub sigma: [u8; 32],
}

impl Signature {
    /// Standard 64-byte encoding `R || s`
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.sigma);
        bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}
