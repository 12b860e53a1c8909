//! Key material records exchanged and persisted by the three parties

use crate::curve::{serde_hex, Chaincode};
use crate::{Error, Result};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 1-based index of a party in the sharing scheme
pub type PartyIndex = u32;

/// The three key holders of a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    User,
    Backup,
    Bitgo,
}

impl Party {
    pub const fn index(self) -> PartyIndex {
        match self {
            Party::User => 1,
            Party::Backup => 2,
            Party::Bitgo => 3,
        }
    }

    pub fn from_index(index: PartyIndex) -> Result<Self> {
        match index {
            1 => Ok(Party::User),
            2 => Ok(Party::Backup),
            3 => Ok(Party::Bitgo),
            other => Err(Error::InvalidParameter(format!("unknown party index {}", other))),
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::User => write!(f, "user"),
            Party::Backup => write!(f, "backup"),
            Party::Bitgo => write!(f, "bitgo"),
        }
    }
}

/// A party's private share record
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct UShare {
    /// Owner index
    pub i: PartyIndex,
    /// Threshold
    pub t: u32,
    /// Total number of parties
    pub n: u32,
    /// Public commitment of this party's secret
    #[zeroize(skip)]
    #[serde(with = "serde_hex::point")]
    pub y: EdwardsPoint,
    /// Seed the secret and nonce prefix were expanded from
    #[serde(with = "serde_hex::bytes32")]
    pub seed: [u8; 32],
    /// This party's chaincode contribution
    #[serde(with = "serde_hex::bytes32")]
    pub chaincode: Chaincode,
    /// Own polynomial evaluated at own index
    #[serde(with = "serde_hex::scalar")]
    pub u: Scalar,
}

/// A directed share produced by party `j` for party `i`
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct YShare {
    /// Recipient index
    pub i: PartyIndex,
    /// Origin index
    pub j: PartyIndex,
    /// Origin's public commitment, equal to `v[0]`
    #[zeroize(skip)]
    #[serde(with = "serde_hex::point")]
    pub y: EdwardsPoint,
    /// Feldman commitments of the origin's polynomial
    #[zeroize(skip)]
    #[serde(with = "serde_hex::points")]
    pub v: Vec<EdwardsPoint>,
    /// Origin's polynomial evaluated at the recipient index
    #[serde(with = "serde_hex::scalar")]
    pub u: Scalar,
    /// Origin's chaincode contribution
    #[serde(with = "serde_hex::bytes32")]
    pub chaincode: Chaincode,
}

/// Output of key generation for one party
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyShare {
    pub u_share: UShare,
    /// Outgoing shares keyed by recipient index
    pub y_shares: BTreeMap<PartyIndex, YShare>,
}

/// A party's view of the combined key: aggregate public key plus its own share
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PShare {
    pub i: PartyIndex,
    pub t: u32,
    pub n: u32,
    #[zeroize(skip)]
    #[serde(with = "serde_hex::point")]
    pub y: EdwardsPoint,
    /// Share `x_i` of the aggregate secret
    #[serde(with = "serde_hex::scalar")]
    pub u: Scalar,
    /// Nonce derivation prefix
    #[serde(with = "serde_hex::bytes32")]
    pub prefix: [u8; 32],
    #[serde(with = "serde_hex::bytes32")]
    pub chaincode: Chaincode,
}

impl PShare {
    pub fn common_keychain(&self) -> CommonKeychain {
        CommonKeychain::new(&self.y, &self.chaincode)
    }
}

/// Identity of a signing counterpart: `i` is the counterpart, `j` is self
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JShare {
    pub i: PartyIndex,
    pub j: PartyIndex,
}

/// Output of `key_combine`
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combined {
    pub p_share: PShare,
    /// Counterparts keyed by their index
    pub j_shares: BTreeMap<PartyIndex, JShare>,
}

impl Combined {
    pub fn common_keychain(&self) -> CommonKeychain {
        self.p_share.common_keychain()
    }
}

/// Output of `key_derive`: a combined key moved along a derivation path
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedKey {
    pub p_share: PShare,
    pub j_shares: BTreeMap<PartyIndex, JShare>,
    pub path: String,
}

impl DerivedKey {
    /// Counterpart record for `index`
    pub fn counterpart(&self, index: PartyIndex) -> Result<JShare> {
        self.j_shares.get(&index).copied().ok_or_else(|| {
            Error::InvalidParameter(format!("party {} is not a counterpart", index))
        })
    }

    /// Derived Ed25519 public key
    pub fn public_key(&self) -> [u8; 32] {
        self.p_share.y.compress().to_bytes()
    }
}

/// Durable per-party record needed for every future signing ceremony
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningMaterial {
    pub u_share: UShare,
    pub bitgo_y_share: YShare,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_y_share: Option<YShare>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_y_share: Option<YShare>,
}

impl SigningMaterial {
    /// Incoming peer shares in the order `key_combine` expects
    pub fn peer_shares(&self) -> Result<Vec<YShare>> {
        let other = match Party::from_index(self.u_share.i)? {
            Party::User => self.backup_y_share.as_ref().ok_or_else(|| {
                Error::InvalidParameter("Invalid user key - missing backupYShare".into())
            })?,
            Party::Backup => self.user_y_share.as_ref().ok_or_else(|| {
                Error::InvalidParameter("Invalid backup key - missing userYShare".into())
            })?,
            Party::Bitgo => {
                return Err(Error::InvalidParameter(
                    "signing material is held by user or backup only".into(),
                ))
            }
        };
        Ok(vec![self.bitgo_y_share.clone(), other.clone()])
    }
}

/// Shared identifier: hex public key followed by hex chaincode, 128 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommonKeychain(String);

impl CommonKeychain {
    pub const LEN: usize = 128;

    pub fn new(y: &EdwardsPoint, chaincode: &Chaincode) -> Self {
        let mut value = hex::encode(y.compress().as_bytes());
        value.push_str(&hex::encode(chaincode));
        Self(value)
    }

    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != Self::LEN {
            return Err(Error::InvalidParameter(format!(
                "Invalid commonKeychain length, expected {}, got {}",
                Self::LEN,
                value.len()
            )));
        }
        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidParameter(
                "commonKeychain must be hex encoded".into(),
            ));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex of the combined public key
    pub fn public_key_hex(&self) -> &str {
        &self.0[..64]
    }

    pub fn chaincode_hex(&self) -> &str {
        &self.0[64..]
    }

    pub fn public_key(&self) -> Result<[u8; 32]> {
        crate::curve::chaincode_from_hex(self.public_key_hex())
    }

    pub fn chaincode(&self) -> Result<Chaincode> {
        crate::curve::chaincode_from_hex(self.chaincode_hex())
    }

    /// Base58 form of the public key, the address format of ed25519 account chains
    pub fn public_key_base58(&self) -> Result<String> {
        Ok(bs58::encode(self.public_key()?).into_string())
    }
}

impl fmt::Display for CommonKeychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CommonKeychain {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        CommonKeychain::parse(&value)
    }
}

impl From<CommonKeychain> for String {
    fn from(value: CommonKeychain) -> Self {
        value.0
    }
}

/// Keychain record as persisted by the key store
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keychain {
    pub id: String,
    pub source: Party,
    pub common_keychain: CommonKeychain,
    /// Shares the key holder hands out to the other parties (BitGo only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_shares: Option<Vec<YShare>>,
    /// Encrypted [`SigningMaterial`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_prv: Option<String>,
}

impl Keychain {
    /// Find the share this keychain's holder produced for `recipient`
    pub fn key_share_for(&self, recipient: Party) -> Option<&YShare> {
        self.key_shares
            .as_ref()?
            .iter()
            .find(|share| share.i == recipient.index() && share.j == self.source.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_keychain_parse() {
        let value = "ab".repeat(64);
        let keychain = CommonKeychain::parse(&value).unwrap();
        assert_eq!(keychain.public_key_hex(), &value[..64]);
        assert_eq!(keychain.chaincode().unwrap(), [0xab; 32]);

        assert!(CommonKeychain::parse(&value[..126]).is_err());
        assert!(CommonKeychain::parse(&"zz".repeat(64)).is_err());
    }

    #[test]
    fn test_common_keychain_serde_validates() {
        let ok = serde_json::to_string(&"00".repeat(64)).unwrap();
        assert!(serde_json::from_str::<CommonKeychain>(&ok).is_ok());
        assert!(serde_json::from_str::<CommonKeychain>("\"abcd\"").is_err());
    }

    #[test]
    fn test_party_index_roundtrip() {
        for party in [Party::User, Party::Backup, Party::Bitgo] {
            assert_eq!(Party::from_index(party.index()).unwrap(), party);
        }
        assert!(Party::from_index(0).is_err());
    }
}
