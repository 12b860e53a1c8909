//! Keychain creation across the user, backup and BitGo key holders
//!
//! The user and backup shares are generated locally. BitGo receives the
//! shares addressed to it through the [`KeychainStore`] and answers with its
//! own keychain plus one share for each of the other two parties. User and
//! backup then combine independently and must land on BitGo's
//! `commonKeychain`; anything else aborts creation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tss_core::keychain::{create_keychains, MemoryKeychainStore, PasswordEncryptor};
//!
//! let store = MemoryKeychainStore::new();
//! let keychains = create_keychains(&store, &PasswordEncryptor::new(), "passphrase").await?;
//! assert_eq!(keychains.user.common_keychain, keychains.bitgo.common_keychain);
//! ```

mod encryption;
mod memory;
mod signing;

pub use encryption::PasswordEncryptor;
pub use memory::MemoryKeychainStore;
pub use signing::{sign_tx_request, TxRequest, UnsignedTx};

use crate::curve::{scalar_from_hex, scalar_to_hex, serde_hex, Chaincode};
use crate::keygen::{key_combine, key_share};
use crate::mpc::async_trait;
use crate::{
    CommonKeychain, Error, KeyShare, Keychain, Party, PartyIndex, Result, SigningMaterial, YShare,
    DEFAULT_PARTIES, DEFAULT_THRESHOLD,
};
use curve25519_dalek::edwards::EdwardsPoint;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use zeroize::Zeroizing;

/// Opaque encrypt/decrypt capability used for persisted signing material
#[async_trait]
pub trait Encryptor: Send + Sync {
    async fn encrypt(&self, input: &str, password: &str) -> Result<String>;
    async fn decrypt(&self, ciphertext: &str, password: &str) -> Result<String>;
}

/// Keychain persistence and the BitGo side of keychain creation
#[async_trait]
pub trait KeychainStore: Send + Sync {
    /// Persist the user keychain
    async fn add(&self, params: AddKeychainParams) -> Result<Keychain>;

    /// Persist the backup keychain
    async fn create_backup(&self, params: AddKeychainParams) -> Result<Keychain>;

    /// Password BitGo expects its incoming shares to be sealed with
    async fn transport_key(&self) -> Result<String>;

    /// Hand BitGo its incoming shares and receive BitGo's keychain
    async fn create_bitgo(&self, params: CreateBitgoKeychainParams) -> Result<Keychain>;
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddKeychainParams {
    pub source: Party,
    pub common_keychain: CommonKeychain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_prv: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBitgoKeychainParams {
    pub user_to_bitgo: EncryptedYShare,
    pub backup_to_bitgo: EncryptedYShare,
}

/// A [`YShare`] whose private evaluation `u` is sealed for transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedYShare {
    pub i: PartyIndex,
    pub j: PartyIndex,
    #[serde(with = "serde_hex::point")]
    pub y: EdwardsPoint,
    #[serde(with = "serde_hex::points")]
    pub v: Vec<EdwardsPoint>,
    #[serde(with = "serde_hex::bytes32")]
    pub chaincode: Chaincode,
    pub encrypted_u: String,
}

impl EncryptedYShare {
    pub async fn seal<E: Encryptor>(share: &YShare, encryptor: &E, key: &str) -> Result<Self> {
        let u = Zeroizing::new(scalar_to_hex(&share.u));
        Ok(Self {
            i: share.i,
            j: share.j,
            y: share.y,
            v: share.v.clone(),
            chaincode: share.chaincode,
            encrypted_u: encryptor.encrypt(&u, key).await?,
        })
    }

    pub async fn open<E: Encryptor>(&self, encryptor: &E, key: &str) -> Result<YShare> {
        let u = Zeroizing::new(encryptor.decrypt(&self.encrypted_u, key).await?);
        Ok(YShare {
            i: self.i,
            j: self.j,
            y: self.y,
            v: self.v.clone(),
            u: scalar_from_hex(&u)?,
            chaincode: self.chaincode,
        })
    }
}

/// The three keychains of a new wallet
pub struct KeychainsTriplet {
    pub user: Keychain,
    pub backup: Keychain,
    pub bitgo: Keychain,
}

fn outgoing(key_share: &KeyShare, to: Party) -> Result<&YShare> {
    key_share.y_shares.get(&to.index()).ok_or_else(|| {
        Error::InvalidParameter(format!(
            "key share of party {} has no share for {}",
            key_share.u_share.i, to
        ))
    })
}

/// Generate user and backup shares, then create all three keychains
#[instrument(skip_all)]
pub async fn create_keychains<S: KeychainStore, E: Encryptor>(
    store: &S,
    encryptor: &E,
    passphrase: &str,
) -> Result<KeychainsTriplet> {
    let user_key_share = key_share(Party::User.index(), DEFAULT_THRESHOLD, DEFAULT_PARTIES)?;
    let backup_key_share = key_share(Party::Backup.index(), DEFAULT_THRESHOLD, DEFAULT_PARTIES)?;

    let bitgo =
        create_bitgo_keychain(store, encryptor, &user_key_share, &backup_key_share).await?;

    let (user, backup) = futures_util::future::try_join(
        create_user_keychain(
            store,
            encryptor,
            &user_key_share,
            &backup_key_share,
            &bitgo,
            passphrase,
        ),
        create_backup_keychain(
            store,
            encryptor,
            &user_key_share,
            &backup_key_share,
            &bitgo,
            passphrase,
        ),
    )
    .await?;

    info!(common_keychain = %bitgo.common_keychain, "created wallet keychains");
    Ok(KeychainsTriplet {
        user,
        backup,
        bitgo,
    })
}

/// Send BitGo the shares addressed to it, sealed with the store's transport key
pub async fn create_bitgo_keychain<S: KeychainStore, E: Encryptor>(
    store: &S,
    encryptor: &E,
    user_key_share: &KeyShare,
    backup_key_share: &KeyShare,
) -> Result<Keychain> {
    let transport_key = Zeroizing::new(store.transport_key().await?);
    let params = CreateBitgoKeychainParams {
        user_to_bitgo: EncryptedYShare::seal(
            outgoing(user_key_share, Party::Bitgo)?,
            encryptor,
            &transport_key,
        )
        .await?,
        backup_to_bitgo: EncryptedYShare::seal(
            outgoing(backup_key_share, Party::Bitgo)?,
            encryptor,
            &transport_key,
        )
        .await?,
    };
    let keychain = store.create_bitgo(params).await?;
    if keychain.source != Party::Bitgo {
        return Err(Error::Storage(format!(
            "expected a bitgo keychain, got {}",
            keychain.source
        )));
    }
    Ok(keychain)
}

/// Combine the user's shares, check against BitGo and persist the user keychain
pub async fn create_user_keychain<S: KeychainStore, E: Encryptor>(
    store: &S,
    encryptor: &E,
    user_key_share: &KeyShare,
    backup_key_share: &KeyShare,
    bitgo_keychain: &Keychain,
    passphrase: &str,
) -> Result<Keychain> {
    let params = participant_keychain(
        encryptor,
        Party::User,
        user_key_share,
        outgoing(backup_key_share, Party::User)?,
        bitgo_keychain,
        passphrase,
    )
    .await?;
    store.add(params).await
}

/// Combine the backup's shares, check against BitGo and persist the backup keychain
pub async fn create_backup_keychain<S: KeychainStore, E: Encryptor>(
    store: &S,
    encryptor: &E,
    user_key_share: &KeyShare,
    backup_key_share: &KeyShare,
    bitgo_keychain: &Keychain,
    passphrase: &str,
) -> Result<Keychain> {
    let params = participant_keychain(
        encryptor,
        Party::Backup,
        backup_key_share,
        outgoing(user_key_share, Party::Backup)?,
        bitgo_keychain,
        passphrase,
    )
    .await?;
    store.create_backup(params).await
}

#[instrument(skip_all, fields(party = %party))]
async fn participant_keychain<E: Encryptor>(
    encryptor: &E,
    party: Party,
    own: &KeyShare,
    other_to_own: &YShare,
    bitgo_keychain: &Keychain,
    passphrase: &str,
) -> Result<AddKeychainParams> {
    let (backup_y_share, user_y_share) = match party {
        Party::User => (Some(other_to_own.clone()), None),
        Party::Backup => (None, Some(other_to_own.clone())),
        Party::Bitgo => {
            return Err(Error::InvalidParameter(
                "bitgo signing material is held by the keychain store".into(),
            ))
        }
    };
    let bitgo_to_own = bitgo_keychain.key_share_for(party).ok_or_else(|| {
        Error::KeyCombine(format!("Missing BitGo to {} key share", party))
    })?;

    let combined = key_combine(&own.u_share, &[other_to_own.clone(), bitgo_to_own.clone()])?;
    let common_keychain = combined.common_keychain();
    if common_keychain != bitgo_keychain.common_keychain {
        return Err(Error::KeyCombine(format!(
            "Failed to create {} keychain - commonKeychains do not match.",
            party
        )));
    }

    let material = SigningMaterial {
        u_share: own.u_share.clone(),
        bitgo_y_share: bitgo_to_own.clone(),
        backup_y_share,
        user_y_share,
    };
    let encrypted_prv = encryptor
        .encrypt(&serde_json::to_string(&material)?, passphrase)
        .await?;

    Ok(AddKeychainParams {
        source: party,
        common_keychain,
        encrypted_prv: Some(encrypted_prv),
    })
}

/// Base58 root public key of a wallet, as used for Solana addresses
pub fn public_key_from_common_keychain(common_keychain: &str) -> Result<String> {
    CommonKeychain::parse(common_keychain)?.public_key_base58()
}

/// Decrypt a keychain's `encryptedPrv` back into signing material
pub async fn decrypt_signing_material<E: Encryptor>(
    encryptor: &E,
    encrypted_prv: &str,
    passphrase: &str,
) -> Result<SigningMaterial> {
    let plaintext = encryptor.decrypt(encrypted_prv, passphrase).await?;
    serde_json::from_str(&plaintext).map_err(|e| Error::Deserialization(e.to_string()))
}
