//! # TSS Core
//!
//! Threshold EdDSA over Ed25519 for 2-of-3 wallets held by a user, a backup
//! and BitGo.
//!
//! This crate provides:
//! - Key share generation and combination with Feldman-verified shares
//! - Non-hardened HD derivation applied to the combined key
//! - The two-party signing ceremony and its relay abstraction
//! - Keychain creation and password-encrypted signing material
//!
//! Any two of the three parties produce a standard Ed25519 signature that
//! verifies against the wallet's public key. The full private key never
//! exists in one place.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tss_core::keychain::{create_keychains, sign_tx_request, MemoryKeychainStore, PasswordEncryptor};
//! use tss_core::mpc::{CancellationToken, MemoryRelay};
//! use tss_core::{Party, TssConfig};
//!
//! let store = MemoryKeychainStore::new();
//! let encryptor = PasswordEncryptor::new();
//! let keychains = create_keychains(&store, &encryptor, "passphrase").await?;
//!
//! let signature = sign_tx_request(
//!     &MemoryRelay::new(),
//!     &encryptor,
//!     &tx_request,
//!     keychains.user.encrypted_prv.as_deref().unwrap_or_default(),
//!     "passphrase",
//!     Party::Backup,
//!     &TssConfig::default(),
//!     &CancellationToken::new(),
//! )
//! .await?;
//! ```

pub mod config;
pub mod curve;
pub mod error;
pub mod hd;
pub mod keychain;
pub mod keygen;
pub mod mpc;
pub mod shamir;
pub mod sign;
pub mod types;

pub use config::TssConfig;
pub use error::{Error, Result};
pub use keygen::{key_combine, key_derive, key_share, key_share_with_rng};
pub use sign::Signature;
pub use types::{
    CommonKeychain, Combined, DerivedKey, JShare, KeyShare, Keychain, PShare, Party, PartyIndex,
    SigningMaterial, UShare, YShare,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Signers required for a wallet signature
pub const DEFAULT_THRESHOLD: u32 = 2;

/// Key holders of a wallet
pub const DEFAULT_PARTIES: u32 = 3;
