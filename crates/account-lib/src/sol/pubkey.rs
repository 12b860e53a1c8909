//! Account addresses, program ids and program derived addresses

use crate::{Error, Result};
use curve25519_dalek::edwards::CompressedEdwardsY;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";
const MAX_SEED_LEN: usize = 32;

/// 32-byte account address, displayed in base58
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pubkey(pub [u8; 32]);

/// Recent blockhash or durable nonce value; same encoding as an address
pub type Hash = Pubkey;

pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey([0; 32]);

pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133, 237,
    95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

pub const MEMO_PROGRAM_ID: Pubkey = Pubkey([
    5, 74, 83, 90, 153, 41, 33, 6, 77, 36, 232, 113, 96, 218, 56, 124, 124, 53, 181, 221, 188, 146,
    187, 129, 228, 31, 168, 64, 65, 5, 68, 141,
]);

pub const STAKE_PROGRAM_ID: Pubkey = Pubkey([
    6, 161, 216, 23, 145, 55, 84, 42, 152, 52, 55, 189, 254, 42, 122, 178, 85, 127, 83, 92, 138,
    120, 114, 43, 104, 164, 157, 192, 0, 0, 0, 0,
]);

pub const STAKE_CONFIG_ID: Pubkey = Pubkey([
    6, 161, 216, 23, 165, 2, 5, 11, 104, 7, 145, 230, 206, 109, 184, 142, 30, 91, 113, 80, 246, 31,
    198, 121, 10, 78, 180, 209, 0, 0, 0, 0,
]);

pub const SYSVAR_RECENT_BLOCKHASHES_ID: Pubkey = Pubkey([
    6, 167, 213, 23, 25, 44, 86, 142, 224, 138, 132, 95, 115, 210, 151, 136, 207, 3, 92, 49, 69,
    178, 26, 179, 68, 216, 6, 46, 169, 64, 0, 0,
]);

pub const SYSVAR_RENT_ID: Pubkey = Pubkey([
    6, 167, 213, 23, 25, 44, 92, 81, 33, 140, 201, 76, 61, 74, 241, 127, 88, 218, 238, 8, 155, 161,
    253, 68, 227, 219, 217, 138, 0, 0, 0, 0,
]);

pub const SYSVAR_CLOCK_ID: Pubkey = Pubkey([
    6, 167, 213, 23, 24, 199, 116, 201, 40, 86, 99, 152, 105, 29, 94, 182, 139, 94, 184, 163, 155,
    75, 109, 92, 115, 85, 91, 33, 0, 0, 0, 0,
]);

pub const SYSVAR_STAKE_HISTORY_ID: Pubkey = Pubkey([
    6, 167, 213, 23, 25, 53, 132, 208, 254, 237, 155, 179, 67, 29, 19, 32, 107, 229, 68, 40, 27,
    87, 184, 86, 108, 197, 55, 95, 244, 0, 0, 0,
]);

impl Pubkey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether the address is a valid ed25519 point, i.e. can sign
    pub fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }

    /// Parse an address, reporting failures against `field`
    pub fn parse_field(field: &str, value: &str) -> Result<Self> {
        value.parse().map_err(|_| Error::build(field, value))
    }

    /// Address for `seeds` under `program_id`, which must fall off the curve
    pub fn create_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<Pubkey> {
        let mut hasher = Sha256::new();
        for seed in seeds {
            if seed.len() > MAX_SEED_LEN {
                return Err(Error::InvalidKey(format!(
                    "seed of {} bytes exceeds {}",
                    seed.len(),
                    MAX_SEED_LEN
                )));
            }
            hasher.update(seed);
        }
        hasher.update(program_id.0);
        hasher.update(PDA_MARKER);

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        let address = Pubkey(bytes);
        if address.is_on_curve() {
            return Err(Error::InvalidKey("derived address is on the curve".into()));
        }
        Ok(address)
    }

    /// Highest bump seed whose derived address is off the curve
    pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8)> {
        for bump in (0..=u8::MAX).rev() {
            let bump_seed = [bump];
            let mut with_bump = seeds.to_vec();
            with_bump.push(&bump_seed);
            if let Ok(address) = Self::create_program_address(&with_bump, program_id) {
                return Ok((address, bump));
            }
        }
        Err(Error::InvalidKey("no viable bump seed".into()))
    }
}

/// Associated token account of `owner` for `mint`
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey> {
    Pubkey::find_program_address(
        &[&owner.0, &TOKEN_PROGRAM_ID.0, &mint.0],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}

impl FromStr for Pubkey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::InvalidKey(format!("{}: {}", s, e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKey(format!("{} is not 32 bytes", s)))?;
        Ok(Pubkey(bytes))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_ids_display() {
        assert_eq!(SYSTEM_PROGRAM_ID.to_string(), "11111111111111111111111111111111");
        assert_eq!(
            TOKEN_PROGRAM_ID.to_string(),
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        );
        assert_eq!(
            ASSOCIATED_TOKEN_PROGRAM_ID.to_string(),
            "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL"
        );
        assert_eq!(
            MEMO_PROGRAM_ID.to_string(),
            "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr"
        );
        assert_eq!(
            STAKE_PROGRAM_ID.to_string(),
            "Stake11111111111111111111111111111111111111"
        );
        assert_eq!(
            SYSVAR_RECENT_BLOCKHASHES_ID.to_string(),
            "SysvarRecentB1ockHashes11111111111111111111"
        );
        assert_eq!(SYSVAR_RENT_ID.to_string(), "SysvarRent111111111111111111111111111111111");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("not base58 0OIl".parse::<Pubkey>().is_err());
        assert!("3yZe7d".parse::<Pubkey>().is_err());
        let err = Pubkey::parse_field("sender", "bad").unwrap_err();
        assert_eq!(err.field(), Some("sender"));
    }

    #[test]
    fn test_associated_token_address_is_off_curve() {
        let owner: Pubkey = "GHtXQBsoZHVnNFa9YevAzFr17DJjgHXk3ycTKD5xD3Zi".parse().unwrap();
        let mint: Pubkey = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".parse().unwrap();
        let ata = associated_token_address(&owner, &mint).unwrap();
        assert_eq!(ata.to_string(), "63ycSH8GZwT17vHeVu2sRn7hH3GXwwFH9qis91EDbAut");
        assert!(!ata.is_on_curve());
        assert_eq!(ata, associated_token_address(&owner, &mint).unwrap());
        assert_ne!(ata, associated_token_address(&mint, &owner).unwrap());
    }

    #[test]
    fn test_serde_as_base58_string() {
        let json = serde_json::to_string(&TOKEN_PROGRAM_ID).unwrap();
        assert_eq!(json, "\"TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA\"");
        let back: Pubkey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TOKEN_PROGRAM_ID);
    }
}
