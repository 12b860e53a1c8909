//! Ed25519 scalar and point helpers
//!
//! Everything here is pure and stateless. Scalars are encoded as 32-byte
//! little-endian hex, points as compressed Edwards-Y hex, matching the
//! encoding Ed25519 public keys and signatures use on the wire.

use crate::{Error, Result};
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};

/// Length of a chaincode in bytes
pub const CHAINCODE_LEN: usize = 32;

/// Chaincode bytes
pub type Chaincode = [u8; CHAINCODE_LEN];

/// Sample a uniformly random scalar
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut wide = [0u8; 64];
    rng.fill_bytes(&mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// SHA-512 over the concatenated parts
pub fn sha512(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut digest = [0u8; 64];
    digest.copy_from_slice(hasher.finalize().as_slice());
    digest
}

/// SHA-512 over the concatenated parts, reduced mod the group order
pub fn scalar_from_hash(parts: &[&[u8]]) -> Scalar {
    Scalar::from_bytes_mod_order_wide(&sha512(parts))
}

/// `s * G`
pub fn base_mul(s: &Scalar) -> EdwardsPoint {
    EdwardsPoint::mul_base(s)
}

/// Ed25519 secret clamping
pub fn clamp(mut bytes: [u8; 32]) -> [u8; 32] {
    bytes[0] &= 248;
    bytes[31] &= 127;
    bytes[31] |= 64;
    bytes
}

/// Add two big-endian 256-bit chaincodes, wrapping mod 2^256
pub fn add_chaincodes(a: &Chaincode, b: &Chaincode) -> Chaincode {
    let mut out = [0u8; CHAINCODE_LEN];
    let mut carry = 0u16;
    for idx in (0..CHAINCODE_LEN).rev() {
        let sum = a[idx] as u16 + b[idx] as u16 + carry;
        out[idx] = sum as u8;
        carry = sum >> 8;
    }
    out
}

/// Decode a compressed point, rejecting encodings off the curve
pub fn point_from_bytes(bytes: &[u8]) -> Result<EdwardsPoint> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Crypto(format!("Invalid point length: {}", bytes.len())))?;
    CompressedEdwardsY(array)
        .decompress()
        .ok_or_else(|| Error::Crypto("Point is not on the curve".into()))
}

/// Decode a point that a counterpart contributed; small-order points are refused
pub fn peer_point_from_bytes(bytes: &[u8]) -> Result<EdwardsPoint> {
    let point = point_from_bytes(bytes)?;
    if point.is_small_order() {
        return Err(Error::Crypto("Point has small order".into()));
    }
    Ok(point)
}

/// Decode a canonical little-endian scalar
pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Crypto(format!("Invalid scalar length: {}", bytes.len())))?;
    Option::<Scalar>::from(Scalar::from_canonical_bytes(array))
        .ok_or_else(|| Error::Crypto("Non-canonical scalar".into()))
}

pub fn point_to_hex(point: &EdwardsPoint) -> String {
    hex::encode(point.compress().as_bytes())
}

pub fn point_from_hex(value: &str) -> Result<EdwardsPoint> {
    let bytes = hex::decode(value).map_err(|e| Error::Deserialization(e.to_string()))?;
    point_from_bytes(&bytes)
}

pub fn scalar_to_hex(scalar: &Scalar) -> String {
    hex::encode(scalar.as_bytes())
}

pub fn scalar_from_hex(value: &str) -> Result<Scalar> {
    let bytes = hex::decode(value).map_err(|e| Error::Deserialization(e.to_string()))?;
    scalar_from_bytes(&bytes)
}

pub fn chaincode_from_hex(value: &str) -> Result<Chaincode> {
    let bytes = hex::decode(value).map_err(|e| Error::Deserialization(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| Error::Deserialization("Invalid chaincode length".into()))
}

/// Serde adapters storing curve values as hex strings
pub mod serde_hex {
    pub mod scalar {
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
        use curve25519_dalek::scalar::Scalar;

        pub fn serialize<S: Serializer>(value: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&crate::curve::scalar_to_hex(value))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
            let value = String::deserialize(deserializer)?;
            crate::curve::scalar_from_hex(&value).map_err(D::Error::custom)
        }
    }

    pub mod point {
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
        use curve25519_dalek::edwards::EdwardsPoint;

        pub fn serialize<S: Serializer>(
            value: &EdwardsPoint,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&crate::curve::point_to_hex(value))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<EdwardsPoint, D::Error> {
            let value = String::deserialize(deserializer)?;
            crate::curve::point_from_hex(&value).map_err(D::Error::custom)
        }
    }

    pub mod points {
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
        use curve25519_dalek::edwards::EdwardsPoint;
        use serde::ser::SerializeSeq;

        pub fn serialize<S: Serializer>(
            values: &[EdwardsPoint],
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(values.len()))?;
            for value in values {
                seq.serialize_element(&crate::curve::point_to_hex(value))?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<EdwardsPoint>, D::Error> {
            let values = Vec::<String>::deserialize(deserializer)?;
            values
                .iter()
                .map(|value| crate::curve::point_from_hex(value).map_err(D::Error::custom))
                .collect()
        }
    }

    pub mod bytes32 {
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&hex::encode(value))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
            let value = String::deserialize(deserializer)?;
            crate::curve::chaincode_from_hex(&value).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::traits::Identity;
    use rand::rngs::OsRng;

    #[test]
    fn test_chaincode_addition_carries() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[31] = 0xff;
        b[31] = 0x01;
        let sum = add_chaincodes(&a, &b);
        assert_eq!(sum[31], 0x00);
        assert_eq!(sum[30], 0x01);

        let max = [0xffu8; 32];
        let mut one = [0u8; 32];
        one[31] = 1;
        assert_eq!(add_chaincodes(&max, &one), [0u8; 32]);
    }

    #[test]
    fn test_point_hex_roundtrip() {
        let s = random_scalar(&mut OsRng);
        let p = base_mul(&s);
        let decoded = point_from_hex(&point_to_hex(&p)).unwrap();
        assert_eq!(decoded, p);
        assert_eq!(scalar_from_hex(&scalar_to_hex(&s)).unwrap(), s);
    }

    #[test]
    fn test_rejects_small_order_peer_point() {
        let identity = EdwardsPoint::identity();
        let bytes = identity.compress().to_bytes();
        assert!(point_from_bytes(&bytes).is_ok());
        assert!(peer_point_from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_rejects_non_canonical_scalar() {
        assert!(scalar_from_bytes(&[0xff; 32]).is_err());
        assert!(scalar_from_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_clamp() {
        let clamped = clamp([0xff; 32]);
        assert_eq!(clamped[0] & 7, 0);
        assert_eq!(clamped[31] & 0x80, 0);
        assert_eq!(clamped[31] & 0x40, 0x40);
    }
}
