use super::params::InstructionParams;
use super::pubkey::Pubkey;
use super::wire::{self, Message, PACKET_DATA_SIZE, SIGNATURE_LEN};
use crate::builder::{BaseTransaction, Entry, Explanation, SigningState, TransactionType};
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde_json::json;
use tracing::debug;

/// A compiled Solana transaction and the signatures collected for it
#[derive(Debug, Clone)]
pub struct SolTransaction {
    coin: String,
    tx_type: TransactionType,
    message: Message,
    message_bytes: Vec<u8>,
    signatures: Vec<Option<[u8; SIGNATURE_LEN]>>,
    instructions_data: Vec<InstructionParams>,
    inputs: Vec<Entry>,
    outputs: Vec<Entry>,
    sealed: bool,
}

impl SolTransaction {
    pub(crate) fn new(
        coin: &str,
        tx_type: TransactionType,
        message: Message,
        instructions_data: Vec<InstructionParams>,
    ) -> Result<Self> {
        let message_bytes = message.serialize()?;
        let slots = message.header.num_required_signatures as usize;
        let (inputs, outputs) = entries(coin, &instructions_data);
        let tx = Self {
            coin: coin.to_string(),
            tx_type,
            message,
            message_bytes,
            signatures: vec![None; slots],
            instructions_data,
            inputs,
            outputs,
            sealed: false,
        };
        let size = tx.wire_bytes()?.len();
        if size > PACKET_DATA_SIZE {
            return Err(Error::build(
                "transaction",
                format!("{} bytes exceeds the {} byte packet limit", size, PACKET_DATA_SIZE),
            ));
        }
        Ok(tx)
    }

    pub(crate) fn signable_payload_bytes(&self) -> &[u8] {
        &self.message_bytes
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn instructions_data(&self) -> &[InstructionParams] {
        &self.instructions_data
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.message.fee_payer()
    }

    /// Durable nonce account and authority, when the nonce is durable
    pub fn durable_nonce(&self) -> Option<(&Pubkey, &Pubkey)> {
        self.instructions_data.iter().find_map(|params| match params {
            InstructionParams::NonceAdvance {
                wallet_nonce_address,
                auth_wallet_address,
            } => Some((wallet_nonce_address, auth_wallet_address)),
            _ => None,
        })
    }

    pub fn memo(&self) -> Option<&str> {
        self.instructions_data.iter().find_map(|params| match params {
            InstructionParams::Memo { memo } => Some(memo.as_str()),
            _ => None,
        })
    }

    /// Signatures currently attached, keyed by signer
    pub fn signatures(&self) -> Vec<(Pubkey, [u8; SIGNATURE_LEN])> {
        self.message
            .signer_keys()
            .iter()
            .zip(&self.signatures)
            .filter_map(|(key, slot)| slot.map(|signature| (*key, signature)))
            .collect()
    }

    pub(crate) fn attach(&mut self, signer: &Pubkey, signature: [u8; SIGNATURE_LEN]) -> Result<()> {
        if self.sealed {
            return Err(Error::Sealed);
        }
        let slot = self
            .message
            .signer_keys()
            .iter()
            .position(|key| key == signer)
            .ok_or_else(|| {
                Error::InvalidKey(format!("{} is not a signer of this transaction", signer))
            })?;
        if self.signatures[slot].is_some() {
            return Err(Error::DuplicateSigner(signer.to_string()));
        }

        let verifying_key = VerifyingKey::from_bytes(signer.as_bytes())
            .map_err(|_| Error::InvalidKey(format!("{} is not an ed25519 key", signer)))?;
        verifying_key
            .verify(&self.message_bytes, &Signature::from_bytes(&signature))
            .map_err(|_| Error::InvalidSignature(signer.to_string()))?;

        self.signatures[slot] = Some(signature);
        debug!(signer = %signer, slot, "signature attached");
        Ok(())
    }

    fn wire_bytes(&self) -> Result<Vec<u8>> {
        let slots: Vec<[u8; SIGNATURE_LEN]> = self
            .signatures
            .iter()
            .map(|slot| slot.unwrap_or([0; SIGNATURE_LEN]))
            .collect();
        wire::encode_transaction(&slots, &self.message_bytes)
    }

    fn collected(&self) -> usize {
        self.signatures.iter().filter(|slot| slot.is_some()).count()
    }
}

fn entries(coin: &str, instructions_data: &[InstructionParams]) -> (Vec<Entry>, Vec<Entry>) {
    let entry = |address: &Pubkey, value: u64, coin: &str| Entry {
        address: address.to_string(),
        value: value.to_string(),
        coin: coin.to_string(),
    };
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for params in instructions_data {
        match params {
            InstructionParams::Transfer {
                from_address,
                to_address,
                amount,
            } => {
                inputs.push(entry(from_address, *amount, coin));
                outputs.push(entry(to_address, *amount, coin));
            }
            InstructionParams::TokenTransfer {
                from_address,
                to_address,
                amount,
                token_name,
                ..
            } => {
                inputs.push(entry(from_address, *amount, token_name));
                outputs.push(entry(to_address, *amount, token_name));
            }
            InstructionParams::CreateNonceAccount {
                from_address,
                nonce_address,
                amount,
                ..
            } => {
                inputs.push(entry(from_address, *amount, coin));
                outputs.push(entry(nonce_address, *amount, coin));
            }
            InstructionParams::StakingActivate {
                from_address,
                staking_address,
                amount,
                ..
            } => {
                inputs.push(entry(from_address, *amount, coin));
                outputs.push(entry(staking_address, *amount, coin));
            }
            InstructionParams::StakingWithdraw {
                from_address,
                staking_address,
                amount,
            } => {
                inputs.push(entry(staking_address, *amount, coin));
                outputs.push(entry(from_address, *amount, coin));
            }
            _ => {}
        }
    }
    (inputs, outputs)
}

impl BaseTransaction for SolTransaction {
    fn id(&self) -> Option<String> {
        self.signatures
            .first()
            .copied()
            .flatten()
            .map(|signature| bs58::encode(signature).into_string())
    }

    fn transaction_type(&self) -> TransactionType {
        self.tx_type
    }

    fn signable_payload(&self) -> Vec<u8> {
        self.message_bytes.clone()
    }

    fn signing_state(&self) -> SigningState {
        SigningState::from_counts(self.collected(), self.signatures.len())
    }

    fn missing_signers(&self) -> Vec<String> {
        self.message
            .signer_keys()
            .iter()
            .zip(&self.signatures)
            .filter(|(_, slot)| slot.is_none())
            .map(|(key, _)| key.to_string())
            .collect()
    }

    fn inputs(&self) -> &[Entry] {
        &self.inputs
    }

    fn outputs(&self) -> &[Entry] {
        &self.outputs
    }

    fn serialize(&self) -> Result<String> {
        Ok(STANDARD.encode(self.wire_bytes()?))
    }

    fn to_broadcast_format(&mut self) -> Result<String> {
        if !self.signing_state().is_fully_signed() {
            return Err(Error::NotFullySigned {
                collected: self.collected(),
                required: self.signatures.len(),
            });
        }
        self.sealed = true;
        self.serialize()
    }

    fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn add_signature(&mut self, public_key: &str, signature: &[u8]) -> Result<()> {
        let signer: Pubkey = public_key.parse()?;
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
        let durable_nonce = self.durable_nonce().map(|(nonce, auth)| {
            json!({ "walletNonceAddress": nonce, "authWalletAddress": auth })
        });
        Ok(json!({
            "id": self.id(),
            "type": self.tx_type,
            "feePayer": self.fee_payer(),
            "nonce": self.message.recent_blockhash,
            "durableNonce": durable_nonce,
            "numSignatures": self.collected(),
            "instructionsData": self.instructions_data,
        }))
    }

    fn explain(&self) -> Result<Explanation> {
        let output_amount: u128 = self
            .outputs
            .iter()
            .filter(|entry| entry.coin == self.coin)
            .map(|entry| entry.value.parse::<u128>().unwrap_or_default())
            .sum();
        Ok(Explanation {
            id: self.id(),
            tx_type: self.tx_type,
            outputs: self.outputs.clone(),
            output_amount: output_amount.to_string(),
            memo: self.memo().map(str::to_string),
            signing_state: self.signing_state(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signing_key(byte: u8) -> SigningKey {
        SigningKey::from_bytes(&[byte; 32])
    }

    fn transfer_tx(from: &SigningKey) -> SolTransaction {
        let from_key = Pubkey(from.verifying_key().to_bytes());
        let params = vec![InstructionParams::Transfer {
            from_address: from_key,
            to_address: Pubkey([9; 32]),
            amount: 1_000,
        }];
        let instructions: Vec<_> = params.iter().flat_map(|p| p.instructions()).collect();
        let message = Message::compile(&from_key, &instructions, Pubkey([5; 32])).unwrap();
        SolTransaction::new("tsol", TransactionType::Send, message, params).unwrap()
    }

    #[test]
    fn test_signature_lifecycle() {
        let key = signing_key(1);
        let mut tx = transfer_tx(&key);
        assert_eq!(tx.signing_state(), SigningState::Unbuilt);
        assert!(tx.id().is_none());
        assert!(matches!(
            tx.to_broadcast_format(),
            Err(Error::NotFullySigned {
                collected: 0,
                required: 1
            })
        ));

        let signature = key.sign(&tx.signable_payload()).to_bytes();
        let signer = Pubkey(key.verifying_key().to_bytes()).to_string();
        tx.add_signature(&signer, &signature).unwrap();
        assert!(tx.signing_state().is_fully_signed());
        assert_eq!(tx.id().unwrap(), bs58::encode(signature).into_string());
        assert!(matches!(
            tx.add_signature(&signer, &signature),
            Err(Error::DuplicateSigner(_))
        ));

        let broadcast = tx.to_broadcast_format().unwrap();
        assert!(tx.is_sealed());
        assert_eq!(broadcast, tx.serialize().unwrap());
        assert!(matches!(
            tx.add_signature(&signer, &signature),
            Err(Error::Sealed)
        ));
    }

    #[test]
    fn test_rejects_bad_signatures() {
        let key = signing_key(1);
        let mut tx = transfer_tx(&key);
        let signer = Pubkey(key.verifying_key().to_bytes()).to_string();

        let forged = signing_key(2).sign(&tx.signable_payload()).to_bytes();
        assert!(matches!(
            tx.add_signature(&signer, &forged),
            Err(Error::InvalidSignature(_))
        ));
        assert!(matches!(
            tx.add_signature(&signer, &[0u8; 10]),
            Err(Error::InvalidSignature(_))
        ));

        let outsider = Pubkey(signing_key(3).verifying_key().to_bytes()).to_string();
        assert!(matches!(
            tx.add_signature(&outsider, &forged),
            Err(Error::InvalidKey(_))
        ));
        assert_eq!(tx.missing_signers(), vec![signer]);
    }

    #[test]
    fn test_explain_transfer() {
        let tx = transfer_tx(&signing_key(1));
        let explanation = tx.explain().unwrap();
        assert_eq!(explanation.output_amount, "1000");
        assert_eq!(explanation.outputs[0].address, Pubkey([9; 32]).to_string());
        assert_eq!(tx.inputs()[0].coin, "tsol");

        let json = tx.to_json().unwrap();
        assert_eq!(json["numSignatures"], 0);
        assert_eq!(json["instructionsData"][0]["type"], "transfer");
        assert!(json["durableNonce"].is_null());
    }

    #[test]
    fn test_oversized_transaction_rejected() {
        let from = Pubkey(signing_key(1).verifying_key().to_bytes());
        let memo = "m".repeat(1200);
        let params = vec![
            InstructionParams::Transfer {
                from_address: from,
                to_address: Pubkey([9; 32]),
                amount: 1,
            },
            InstructionParams::Memo { memo },
        ];
        let instructions: Vec<_> = params.iter().flat_map(|p| p.instructions()).collect();
        let message = Message::compile(&from, &instructions, Pubkey([5; 32])).unwrap();
        let err = SolTransaction::new("tsol", TransactionType::Send, message, params).unwrap_err();
        assert_eq!(err.field(), Some("transaction"));
    }
}
