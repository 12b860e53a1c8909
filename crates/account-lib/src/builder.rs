//! Lifecycle shared by every chain's builders and transactions
//!
//! A builder is created for one coin, configured field by field, optionally
//! given signing keys, then `build()` validates and produces a transaction.
//! `from_raw()` is the inverse of `build()` followed by
//! `to_broadcast_format()` / `serialize()`, so a partially signed transaction
//! can travel to the next co-signer and be rebuilt there unchanged.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Send,
    WalletInitialization,
    StakingActivate,
    StakingDeactivate,
    StakingWithdraw,
    AssociatedTokenAccountInitialization,
    AddValidator,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How far signature collection has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningState {
    /// No signature collected yet
    Unbuilt,
    PartiallySigned(usize),
    FullySigned,
}

impl SigningState {
    pub fn from_counts(collected: usize, required: usize) -> Self {
        match collected {
            0 if required > 0 => SigningState::Unbuilt,
            k if k < required => SigningState::PartiallySigned(k),
            _ => SigningState::FullySigned,
        }
    }

    pub fn is_fully_signed(&self) -> bool {
        matches!(self, SigningState::FullySigned)
    }
}

/// Value moved from or to an address, as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub address: String,
    pub value: String,
    pub coin: String,
}

/// Human readable summary of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub outputs: Vec<Entry>,
    pub output_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub signing_state: SigningState,
}

/// A built transaction of any family
pub trait BaseTransaction {
    /// Chain transaction id, once the id-bearing signature exists
    fn id(&self) -> Option<String>;

    fn transaction_type(&self) -> TransactionType;

    /// Bytes the signing ceremony signs
    fn signable_payload(&self) -> Vec<u8>;

    fn signing_state(&self) -> SigningState;

    /// Addresses whose signatures are still outstanding
    fn missing_signers(&self) -> Vec<String>;

    fn inputs(&self) -> &[Entry];

    fn outputs(&self) -> &[Entry];

    /// Encoding of the current state, signed or not, for co-signers
    fn serialize(&self) -> Result<String>;

    /// Final encoding; requires every signature and seals the transaction
    fn to_broadcast_format(&mut self) -> Result<String>;

    fn is_sealed(&self) -> bool;

    /// Attach a signature produced elsewhere, e.g. by the TSS ceremony
    fn add_signature(&mut self, public_key: &str, signature: &[u8]) -> Result<()>;

    fn to_json(&self) -> Result<serde_json::Value>;

    fn explain(&self) -> Result<Explanation>;
}

/// Builder lifecycle common to every family
pub trait TransactionBuilder {
    type Transaction: BaseTransaction;

    fn transaction_type(&self) -> TransactionType;

    /// Load builder state from a previously built transaction
    fn from_raw(&mut self, raw: &str) -> Result<&mut Self>;

    /// Queue a private key to sign with during `build()`
    fn sign(&mut self, key: &str) -> Result<&mut Self>;

    fn build(&mut self) -> Result<Self::Transaction>;
}
