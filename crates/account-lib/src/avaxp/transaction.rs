use super::keypair::{recover_address, SIGNATURE_LEN};
use super::tx::{encode_signed, AddValidatorTx, Credential};
use super::utils::{cb58_encode, format_address, format_node_id, parse_address, sha256, ShortId};
use crate::builder::{BaseTransaction, Entry, Explanation, SigningState, TransactionType};
use crate::{Error, Result};
use serde_json::json;
use tracing::debug;

const EMPTY_SIGNATURE: [u8; SIGNATURE_LEN] = [0; SIGNATURE_LEN];

/// An `AddValidatorTx` with one credential per input
///
/// Every input is spent by the same signer pair, so a signer owns the same
/// slot in every credential and one signature fills that slot everywhere.
#[derive(Debug, Clone)]
pub struct AvaxPTransaction {
    coin: String,
    tx: AddValidatorTx,
    unsigned: Vec<u8>,
    digest: [u8; 32],
    /// Signer of each credential slot, in sig index order
    signers: Vec<ShortId>,
    credentials: Vec<Credential>,
    inputs: Vec<Entry>,
    outputs: Vec<Entry>,
    sealed: bool,
}

impl AvaxPTransaction {
    pub(crate) fn new(coin: &str, tx: AddValidatorTx, signers: Vec<ShortId>) -> Result<Self> {
        let unsigned = tx.encode()?;
        let digest = sha256(&unsigned);
        let credentials = tx
            .base
            .inputs
            .iter()
            .map(|_| Credential {
                signatures: vec![EMPTY_SIGNATURE; signers.len()],
            })
            .collect();
        let inputs = tx
            .base
            .inputs
            .iter()
            .map(|input| Entry {
                address: format!("{}:{}", cb58_encode(&input.tx_id), input.output_index),
                value: input.amount.to_string(),
                coin: coin.to_string(),
            })
            .collect();
        let outputs = vec![Entry {
            address: format_node_id(&tx.validator.node_id),
            value: tx.validator.weight.to_string(),
            coin: coin.to_string(),
        }];
        Ok(Self {
            coin: coin.to_string(),
            tx,
            unsigned,
            digest,
            signers,
            credentials,
            inputs,
            outputs,
            sealed: false,
        })
    }

    pub fn coin(&self) -> &str {
        &self.coin
    }

    pub fn tx(&self) -> &AddValidatorTx {
        &self.tx
    }

    pub(crate) fn unsigned_bytes(&self) -> &[u8] {
        &self.unsigned
    }

    pub(crate) fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub(crate) fn signers(&self) -> &[ShortId] {
        &self.signers
    }

    pub(crate) fn attach(&mut self, signer: &ShortId, signature: [u8; SIGNATURE_LEN]) -> Result<()> {
        if self.sealed {
            return Err(Error::Sealed);
        }
        let slot = self
            .signers
            .iter()
            .position(|candidate| candidate == signer)
            .ok_or_else(|| {
                Error::InvalidKey(format!(
                    "{} is not a signer of this transaction",
                    format_address(signer)
                ))
            })?;
        if self.slot_filled(slot) {
            return Err(Error::DuplicateSigner(format_address(signer)));
        }
        if recover_address(&self.digest, &signature)? != *signer {
            return Err(Error::InvalidSignature(format_address(signer)));
        }
        for credential in &mut self.credentials {
            credential.signatures[slot] = signature;
        }
        debug!(signer = %format_address(signer), slot, "credential signature attached");
        Ok(())
    }

    fn slot_filled(&self, slot: usize) -> bool {
        self.credentials
            .first()
            .map(|credential| credential.signatures[slot] != EMPTY_SIGNATURE)
            .unwrap_or(false)
    }

    fn collected(&self) -> usize {
        (0..self.signers.len())
            .filter(|slot| self.slot_filled(*slot))
            .count()
    }

    fn signed_bytes(&self) -> Result<Vec<u8>> {
        encode_signed(&self.unsigned, &self.credentials)
    }
}

impl BaseTransaction for AvaxPTransaction {
    fn id(&self) -> Option<String> {
        if !self.signing_state().is_fully_signed() {
            return None;
        }
        self.signed_bytes()
            .ok()
            .map(|bytes| cb58_encode(&sha256(&bytes)))
    }

    fn transaction_type(&self) -> TransactionType {
        TransactionType::AddValidator
    }

    fn signable_payload(&self) -> Vec<u8> {
        self.digest.to_vec()
    }

    fn signing_state(&self) -> SigningState {
        SigningState::from_counts(self.collected(), self.signers.len())
    }

    fn missing_signers(&self) -> Vec<String> {
        self.signers
            .iter()
            .enumerate()
            .filter(|(slot, _)| !self.slot_filled(*slot))
            .map(|(_, signer)| format_address(signer))
            .collect()
    }

    fn inputs(&self) -> &[Entry] {
        &self.inputs
    }

    fn outputs(&self) -> &[Entry] {
        &self.outputs
    }

    fn serialize(&self) -> Result<String> {
        Ok(hex::encode(self.signed_bytes()?))
    }

    fn to_broadcast_format(&mut self) -> Result<String> {
        if !self.signing_state().is_fully_signed() {
            return Err(Error::NotFullySigned {
                collected: self.collected(),
                required: self.signers.len(),
            });
        }
        self.sealed = true;
        self.serialize()
    }

    fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn add_signature(&mut self, public_key: &str, signature: &[u8]) -> Result<()> {
        let signer = parse_address("publicKey", public_key)?;
        let signature: [u8; SIGNATURE_LEN] = signature.try_into().map_err(|_| {
            Error::InvalidSignature(format!(
                "{}: expected {} bytes, got {}",
                public_key,
                SIGNATURE_LEN,
                signature.len()
            ))
        })?;
        self.attach(&signer, signature)
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        let owners = |addresses: &[ShortId]| -> Vec<String> {
            addresses.iter().map(format_address).collect()
        };
        let stake_owners = self
            .tx
            .stake
            .first()
            .map(|output| owners(&output.owners.addresses))
            .unwrap_or_default();
        Ok(json!({
            "id": self.id(),
            "type": TransactionType::AddValidator,
            "networkID": self.tx.base.network_id,
            "blockchainID": cb58_encode(&self.tx.base.blockchain_id),
            "nodeID": format_node_id(&self.tx.validator.node_id),
            "startTime": self.tx.validator.start_time.to_string(),
            "endTime": self.tx.validator.end_time.to_string(),
            "stakeAmount": self.tx.validator.weight.to_string(),
            "delegationFeeRate": self.tx.shares,
            "fromAddresses": stake_owners,
            "rewardAddresses": owners(&self.tx.rewards_owner.addresses),
            "inputs": self.inputs,
            "memo": String::from_utf8_lossy(&self.tx.base.memo),
            "signers": owners(&self.signers),
            "numSignatures": self.collected(),
        }))
    }

    fn explain(&self) -> Result<Explanation> {
        let memo = (!self.tx.base.memo.is_empty())
            .then(|| String::from_utf8_lossy(&self.tx.base.memo).into_owned());
        Ok(Explanation {
            id: self.id(),
            tx_type: TransactionType::AddValidator,
            outputs: self.outputs.clone(),
            output_amount: self.tx.validator.weight.to_string(),
            memo,
            signing_state: self.signing_state(),
        })
    }
}
