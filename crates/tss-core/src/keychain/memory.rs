//! In-memory keychain store that also plays the BitGo key holder

use super::{AddKeychainParams, CreateBitgoKeychainParams, KeychainStore, PasswordEncryptor};
use crate::keygen::{key_combine, key_derive, key_share};
use crate::mpc::async_trait;
use crate::{
    DerivedKey, Error, Keychain, Party, Result, UShare, YShare, DEFAULT_PARTIES,
    DEFAULT_THRESHOLD,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroizing;

/// BitGo's private half of a keychain
#[derive(Clone)]
struct BitgoMaterial {
    u_share: UShare,
    incoming: Vec<YShare>,
}

/// Keychains held in process; clones share the same maps
#[derive(Clone)]
pub struct MemoryKeychainStore {
    keychains: Arc<DashMap<String, Keychain>>,
    bitgo: Arc<DashMap<String, BitgoMaterial>>,
    transport_key: Arc<Zeroizing<String>>,
    encryptor: PasswordEncryptor,
}

impl Default for MemoryKeychainStore {
    fn default() -> Self {
        Self {
            keychains: Arc::default(),
            bitgo: Arc::default(),
            transport_key: Arc::new(Zeroizing::new(hex::encode(rand::random::<[u8; 32]>()))),
            encryptor: PasswordEncryptor::new(),
        }
    }
}

impl MemoryKeychainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Result<Keychain> {
        self.keychains
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::Storage(format!("keychain {} not found", id)))
    }

    pub fn len(&self) -> usize {
        self.keychains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keychains.is_empty()
    }

    /// BitGo's signing key for the keychain `id`, moved along `path`
    pub fn bitgo_signing_key(&self, id: &str, path: &str) -> Result<DerivedKey> {
        let material = self
            .bitgo
            .get(id)
            .ok_or_else(|| Error::Storage(format!("no bitgo key material for {}", id)))?;
        key_derive(&material.u_share, &material.incoming, path)
    }

    fn insert(&self, source: Party, params: AddKeychainParams) -> Result<Keychain> {
        if params.source != source {
            return Err(Error::Storage(format!(
                "expected a {} keychain, got {}",
                source, params.source
            )));
        }
        let keychain = Keychain {
            id: Uuid::new_v4().to_string(),
            source,
            common_keychain: params.common_keychain,
            key_shares: None,
            encrypted_prv: params.encrypted_prv,
        };
        self.keychains.insert(keychain.id.clone(), keychain.clone());
        debug!(id = %keychain.id, source = %source, "keychain stored");
        Ok(keychain)
    }
}

#[async_trait]
impl KeychainStore for MemoryKeychainStore {
    async fn add(&self, params: AddKeychainParams) -> Result<Keychain> {
        self.insert(Party::User, params)
    }

    async fn create_backup(&self, params: AddKeychainParams) -> Result<Keychain> {
        self.insert(Party::Backup, params)
    }

    async fn transport_key(&self) -> Result<String> {
        Ok(self.transport_key.as_str().to_owned())
    }

    async fn create_bitgo(&self, params: CreateBitgoKeychainParams) -> Result<Keychain> {
        let incoming = vec![
            params
                .user_to_bitgo
                .open(&self.encryptor, &self.transport_key)
                .await?,
            params
                .backup_to_bitgo
                .open(&self.encryptor, &self.transport_key)
                .await?,
        ];
        let own = key_share(Party::Bitgo.index(), DEFAULT_THRESHOLD, DEFAULT_PARTIES)?;
        let combined = key_combine(&own.u_share, &incoming)?;

        let outgoing = [Party::User, Party::Backup]
            .iter()
            .map(|party| {
                own.y_shares.get(&party.index()).cloned().ok_or_else(|| {
                    Error::KeyCombine(format!("missing bitgo share for {}", party))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let keychain = Keychain {
            id: Uuid::new_v4().to_string(),
            source: Party::Bitgo,
            common_keychain: combined.common_keychain(),
            key_shares: Some(outgoing),
            encrypted_prv: None,
        };
        self.bitgo.insert(
            keychain.id.clone(),
            BitgoMaterial {
                u_share: own.u_share.clone(),
                incoming,
            },
        );
        self.keychains.insert(keychain.id.clone(), keychain.clone());

        info!(id = %keychain.id, "bitgo keychain created");
        Ok(keychain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keychain::EncryptedYShare;

    async fn sealed(store: &MemoryKeychainStore, share: &YShare) -> EncryptedYShare {
        let key = store.transport_key().await.unwrap();
        EncryptedYShare::seal(share, &PasswordEncryptor::new(), &key)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_bitgo_rejects_misaddressed_shares() {
        let store = MemoryKeychainStore::new();
        let user = key_share(1, 2, 3).unwrap();
        let backup = key_share(2, 2, 3).unwrap();

        // user's share for the backup is not addressed to BitGo
        let params = CreateBitgoKeychainParams {
            user_to_bitgo: sealed(&store, &user.y_shares[&2]).await,
            backup_to_bitgo: sealed(&store, &backup.y_shares[&3]).await,
        };
        assert!(matches!(
            store.create_bitgo(params).await,
            Err(Error::KeyCombine(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_bitgo_rejects_shares_sealed_with_another_key() {
        let store = MemoryKeychainStore::new();
        let user = key_share(1, 2, 3).unwrap();
        let backup = key_share(2, 2, 3).unwrap();
        let encryptor = PasswordEncryptor::new();

        let params = CreateBitgoKeychainParams {
            user_to_bitgo: EncryptedYShare::seal(&user.y_shares[&3], &encryptor, "guess")
                .await
                .unwrap(),
            backup_to_bitgo: sealed(&store, &backup.y_shares[&3]).await,
        };
        assert!(matches!(
            store.create_bitgo(params).await,
            Err(Error::Encryption(_))
        ));
        assert!(store.is_empty());
        assert_ne!(
            store.transport_key().await.unwrap(),
            MemoryKeychainStore::new().transport_key().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_add_checks_source() {
        let store = MemoryKeychainStore::new();
        let keychain = {
            let user = key_share(1, 2, 3).unwrap();
            let backup = key_share(2, 2, 3).unwrap();
            store
                .create_bitgo(CreateBitgoKeychainParams {
                    user_to_bitgo: sealed(&store, &user.y_shares[&3]).await,
                    backup_to_bitgo: sealed(&store, &backup.y_shares[&3]).await,
                })
                .await
                .unwrap()
        };
        assert_eq!(keychain.key_shares.as_ref().map(Vec::len), Some(2));
        assert!(keychain.key_share_for(Party::User).is_some());
        assert!(keychain.key_share_for(Party::Backup).is_some());

        let params = AddKeychainParams {
            source: Party::Backup,
            common_keychain: keychain.common_keychain.clone(),
            encrypted_prv: None,
        };
        assert!(matches!(store.add(params.clone()).await, Err(Error::Storage(_))));

        let backup = store.create_backup(params).await.unwrap();
        assert_eq!(store.get(&backup.id).unwrap().source, Party::Backup);
        assert!(store.get("missing").is_err());
        assert!(store.bitgo_signing_key(&keychain.id, "m/0").is_ok());
    }
}
