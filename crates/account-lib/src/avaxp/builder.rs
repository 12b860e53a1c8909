//! `AddValidatorTx` builder for a 2-of-3 wallet
//!
//! From addresses are given as `[user, bitgo, backup]`. The spending pair is
//! user + bitgo, or backup + bitgo in recovery mode. Sig indices point into
//! the sorted owner list of the spent outputs.

use super::keypair::{KeyPair, SIGNATURE_LEN};
use super::transaction::AvaxPTransaction;
use super::tx::{
    decode_signed, sort_canonical, AddValidatorTx, BaseTx, Credential, OutputOwners,
    TransferableInput, TransferableOutput, Validator, TRANSFER_OUTPUT_TYPE,
};
use super::utils::{
    cb58_decode_array, cb58_encode, format_address, parse_address, parse_node_id, ShortId,
};
use crate::builder::{TransactionBuilder, TransactionType};
use crate::coins::{CoinConfig, CoinParams};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const REQUIRED_THRESHOLD: u32 = 2;
pub const MIN_STAKE_DURATION: u64 = 14 * 24 * 60 * 60;
pub const MAX_STAKE_DURATION: u64 = 365 * 24 * 60 * 60;
/// Delegation fee is expressed in parts per million
pub const MAX_DELEGATION_FEE: u32 = 1_000_000;

/// P-chain id: 32 zero bytes on every network
const PLATFORM_CHAIN_ID: [u8; 32] = [0; 32];

/// Unspent output as reported by the indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Output type id; only secp256k1 transfer outputs can be spent
    #[serde(rename = "outputID")]
    pub output_id: u32,
    /// nAVAX
    pub amount: String,
    /// cb58 id of the transaction that created the output
    pub txid: String,
    pub outputidx: String,
}

struct DecodedUtxo {
    tx_id: [u8; 32],
    output_index: u32,
    amount: u64,
}

impl Utxo {
    fn decode(&self) -> Result<DecodedUtxo> {
        if self.output_id != TRANSFER_OUTPUT_TYPE {
            return Err(Error::build(
                "utxos",
                format!("outputID {} is not a transfer output", self.output_id),
            ));
        }
        Ok(DecodedUtxo {
            tx_id: cb58_decode_array("utxos", &self.txid)?,
            output_index: self
                .outputidx
                .parse()
                .map_err(|_| Error::build("utxos", &self.outputidx))?,
            amount: self
                .amount
                .parse()
                .map_err(|_| Error::build("utxos", &self.amount))?,
        })
    }
}

#[derive(Clone, Debug)]
struct ParsedState {
    sig_indices: Vec<u32>,
    unsigned: Vec<u8>,
    credentials: Vec<Credential>,
}

#[derive(Clone, Debug)]
pub struct ValidatorBuilder {
    coin: String,
    network_id: u32,
    asset_id: [u8; 32],
    min_stake: u64,
    min_delegation_fee: u32,
    threshold: u32,
    locktime: u64,
    from_addresses: Vec<ShortId>,
    reward_addresses: Vec<ShortId>,
    utxos: Vec<Utxo>,
    memo: Vec<u8>,
    node_id: Option<ShortId>,
    start_time: Option<u64>,
    end_time: Option<u64>,
    stake_amount: Option<u64>,
    delegation_fee_rate: Option<u32>,
    recover_mode: bool,
    signers: Vec<KeyPair>,
    parsed: Option<ParsedState>,
}

impl ValidatorBuilder {
    pub fn new(coin: &CoinConfig) -> Result<Self> {
        let (network_id, asset_id, min_stake, min_delegation_fee) = match &coin.params {
            CoinParams::AvaxP {
                network_id,
                asset_id,
                min_stake,
                min_delegation_fee,
            } => (*network_id, asset_id, *min_stake, *min_delegation_fee),
            _ => {
                return Err(Error::NotSupported(format!(
                    "{} is not an Avalanche P-chain coin",
                    coin.name
                )))
            }
        };
        Ok(Self {
            coin: coin.name.clone(),
            network_id,
            asset_id: cb58_decode_array("assetID", asset_id)?,
            min_stake,
            min_delegation_fee,
            threshold: REQUIRED_THRESHOLD,
            locktime: 0,
            from_addresses: Vec::new(),
            reward_addresses: Vec::new(),
            utxos: Vec::new(),
            memo: Vec::new(),
            node_id: None,
            start_time: None,
            end_time: None,
            stake_amount: None,
            delegation_fee_rate: None,
            recover_mode: false,
            signers: Vec::new(),
            parsed: None,
        })
    }

    pub fn threshold(&mut self, value: u32) -> Result<&mut Self> {
        if value != REQUIRED_THRESHOLD {
            return Err(Error::build(
                "threshold",
                format!("{} (must be set to {})", value, REQUIRED_THRESHOLD),
            ));
        }
        self.threshold = value;
        Ok(self)
    }

    pub fn locktime(&mut self, value: u64) -> &mut Self {
        self.locktime = value;
        self
    }

    /// Wallet addresses or compressed public keys in `[user, bitgo, backup]` order
    pub fn from_pubkey(&mut self, keys: &[&str]) -> Result<&mut Self> {
        let addresses = keys
            .iter()
            .map(|key| parse_address("fromAddresses", key))
            .collect::<Result<Vec<_>>>()?;
        self.from_addresses = addresses;
        self.parsed = None;
        Ok(self)
    }

    pub fn reward_addresses(&mut self, addresses: &[&str]) -> Result<&mut Self> {
        self.reward_addresses = addresses
            .iter()
            .map(|address| parse_address("rewardAddresses", address))
            .collect::<Result<_>>()?;
        Ok(self)
    }

    pub fn utxos(&mut self, utxos: Vec<Utxo>) -> Result<&mut Self> {
        if utxos.is_empty() {
            return Err(Error::build("utxos", "empty list"));
        }
        for utxo in &utxos {
            utxo.decode()?;
        }
        self.utxos = utxos;
        Ok(self)
    }

    pub fn memo(&mut self, memo: &str) -> &mut Self {
        self.memo = memo.as_bytes().to_vec();
        self
    }

    pub fn node_id(&mut self, node_id: &str) -> Result<&mut Self> {
        self.node_id = Some(parse_node_id(node_id)?);
        Ok(self)
    }

    /// Unix seconds
    pub fn start_time(&mut self, value: u64) -> &mut Self {
        self.start_time = Some(value);
        self
    }

    /// Unix seconds
    pub fn end_time(&mut self, value: u64) -> &mut Self {
        self.end_time = Some(value);
        self
    }

    /// nAVAX to lock as validator weight
    pub fn stake_amount(&mut self, value: u64) -> Result<&mut Self> {
        if value < self.min_stake {
            return Err(Error::build(
                "stakeAmount",
                format!("{} (minimum is {})", value, self.min_stake),
            ));
        }
        self.stake_amount = Some(value);
        Ok(self)
    }

    /// Parts per million
    pub fn delegation_fee_rate(&mut self, value: u32) -> Result<&mut Self> {
        if value < self.min_delegation_fee || value > MAX_DELEGATION_FEE {
            return Err(Error::build(
                "delegationFeeRate",
                format!(
                    "{} (must be between {} and {})",
                    value, self.min_delegation_fee, MAX_DELEGATION_FEE
                ),
            ));
        }
        self.delegation_fee_rate = Some(value);
        Ok(self)
    }

    /// Spend with backup + bitgo instead of user + bitgo
    ///
    /// A builder loaded with `from_raw` keeps the signer pair of the parsed
    /// transaction, since its owners are sorted and no longer carry roles.
    /// Call `from_pubkey` to pick the pair again.
    pub fn recover_mode(&mut self, recover: bool) -> &mut Self {
        self.recover_mode = recover;
        if self.parsed.is_some() {
            debug!(coin = %self.coin, recover, "signer pair fixed by parsed transaction");
        }
        self
    }

    fn owners(&self) -> OutputOwners {
        OutputOwners::new(self.locktime, self.threshold, &self.from_addresses)
    }

    /// Sig indices of the spending pair within the sorted owners
    fn sig_indices(&self, owners: &OutputOwners) -> Result<Vec<u32>> {
        if let Some(parsed) = &self.parsed {
            return Ok(parsed.sig_indices.clone());
        }
        if self.from_addresses.len() != 3 || owners.addresses.len() != 3 {
            return Err(Error::build(
                "fromAddresses",
                format!(
                    "{} distinct addresses (expected user, bitgo and backup)",
                    owners.addresses.len()
                ),
            ));
        }
        let (first, second) = if self.recover_mode {
            (self.from_addresses[2], self.from_addresses[1])
        } else {
            (self.from_addresses[0], self.from_addresses[1])
        };
        let mut indices = [first, second]
            .iter()
            .map(|signer| {
                owners
                    .addresses
                    .iter()
                    .position(|owner| owner == signer)
                    .map(|position| position as u32)
                    .ok_or_else(|| Error::build("fromAddresses", format_address(signer)))
            })
            .collect::<Result<Vec<_>>>()?;
        indices.sort_unstable();
        Ok(indices)
    }

    fn validate_times(&self) -> Result<(u64, u64)> {
        let start = self
            .start_time
            .ok_or_else(|| Error::build("startTime", "none"))?;
        let end = self.end_time.ok_or_else(|| Error::build("endTime", "none"))?;
        if end <= start {
            return Err(Error::build(
                "endTime",
                format!("{} (must be after start time {})", end, start),
            ));
        }
        let duration = end - start;
        if !(MIN_STAKE_DURATION..=MAX_STAKE_DURATION).contains(&duration) {
            return Err(Error::build(
                "endTime",
                format!(
                    "{} (staking duration {}s outside {}s..={}s)",
                    end, duration, MIN_STAKE_DURATION, MAX_STAKE_DURATION
                ),
            ));
        }
        Ok((start, end))
    }

    /// Take UTXOs in order until the stake is covered; all of them once parsed
    fn select_inputs(&self, stake: u64, sig_indices: &[u32]) -> Result<(Vec<TransferableInput>, u64)> {
        let mut inputs = Vec::new();
        let mut total: u64 = 0;
        for utxo in &self.utxos {
            if total >= stake && self.parsed.is_none() {
                break;
            }
            let decoded = utxo.decode()?;
            total = total
                .checked_add(decoded.amount)
                .ok_or_else(|| Error::build("utxos", "amount overflow"))?;
            inputs.push(TransferableInput {
                tx_id: decoded.tx_id,
                output_index: decoded.output_index,
                asset_id: self.asset_id,
                amount: decoded.amount,
                sig_indices: sig_indices.to_vec(),
            });
        }
        if total < stake {
            return Err(Error::build(
                "utxos",
                format!("insufficient funds: {} available, {} needed", total, stake),
            ));
        }
        Ok((inputs, total - stake))
    }
}

impl TransactionBuilder for ValidatorBuilder {
    type Transaction = AvaxPTransaction;

    fn transaction_type(&self) -> TransactionType {
        TransactionType::AddValidator
    }

    fn from_raw(&mut self, raw: &str) -> Result<&mut Self> {
        let bytes = hex::decode(raw.trim().strip_prefix("0x").unwrap_or(raw.trim()))
            .map_err(|e| Error::parse("raw transaction", e))?;
        let (tx, unsigned, credentials) = decode_signed(&bytes)?;

        if tx.base.network_id != self.network_id {
            return Err(Error::parse(
                "networkID",
                format!("{} (expected {})", tx.base.network_id, self.network_id),
            ));
        }
        if tx.base.blockchain_id != PLATFORM_CHAIN_ID {
            return Err(Error::parse("blockchainID", cb58_encode(&tx.base.blockchain_id)));
        }
        let stake = tx
            .stake
            .first()
            .ok_or_else(|| Error::parse("stake", "no stake output"))?;
        if tx.stake.len() != 1 || stake.asset_id != self.asset_id {
            return Err(Error::parse("stake", "expected a single AVAX stake output"));
        }
        let first_input = tx
            .base
            .inputs
            .first()
            .ok_or_else(|| Error::parse("inputs", "no inputs"))?;
        let sig_indices = first_input.sig_indices.clone();
        if tx.base.inputs.iter().any(|input| input.sig_indices != sig_indices) {
            return Err(Error::NotSupported(
                "inputs spent by different signer sets".into(),
            ));
        }
        if let Some(index) = sig_indices
            .iter()
            .find(|index| **index as usize >= stake.owners.addresses.len())
        {
            return Err(Error::parse("sigIndices", format!("{} out of range", index)));
        }
        for slot in 0..sig_indices.len() {
            if credentials
                .iter()
                .any(|credential| credential.signatures[slot] != credentials[0].signatures[slot])
            {
                return Err(Error::parse("credentials", "inputs signed by different keys"));
            }
        }

        self.threshold = stake.owners.threshold;
        self.locktime = stake.owners.locktime;
        self.from_addresses = stake.owners.addresses.clone();
        self.reward_addresses = tx.rewards_owner.addresses.clone();
        self.utxos = tx
            .base
            .inputs
            .iter()
            .map(|input| Utxo {
                output_id: TRANSFER_OUTPUT_TYPE,
                amount: input.amount.to_string(),
                txid: cb58_encode(&input.tx_id),
                outputidx: input.output_index.to_string(),
            })
            .collect();
        self.memo = tx.base.memo.clone();
        self.node_id = Some(tx.validator.node_id);
        self.start_time = Some(tx.validator.start_time);
        self.end_time = Some(tx.validator.end_time);
        self.stake_amount = Some(tx.validator.weight);
        self.delegation_fee_rate = Some(tx.shares);
        self.parsed = Some(ParsedState {
            sig_indices,
            unsigned,
            credentials,
        });
        debug!(coin = %self.coin, "loaded raw add validator transaction");
        Ok(self)
    }

    /// Hex secp256k1 private key
    fn sign(&mut self, key: &str) -> Result<&mut Self> {
        let keypair = KeyPair::from_private_key_hex(key)?;
        if self
            .signers
            .iter()
            .any(|queued| queued.address() == keypair.address())
        {
            return Err(Error::DuplicateSigner(format_address(&keypair.address())));
        }
        self.signers.push(keypair);
        Ok(self)
    }

    #[instrument(skip(self), fields(coin = %self.coin))]
    fn build(&mut self) -> Result<AvaxPTransaction> {
        if self.from_addresses.is_empty() {
            return Err(Error::build("fromAddresses", "none"));
        }
        if self.reward_addresses.is_empty() {
            return Err(Error::build("rewardAddresses", "none"));
        }
        if self.utxos.is_empty() {
            return Err(Error::build("utxos", "none"));
        }
        let node_id = self.node_id.ok_or_else(|| Error::build("nodeID", "none"))?;
        let stake_amount = self
            .stake_amount
            .ok_or_else(|| Error::build("stakeAmount", "none"))?;
        let shares = self
            .delegation_fee_rate
            .ok_or_else(|| Error::build("delegationFeeRate", "none"))?;
        let (start_time, end_time) = self.validate_times()?;
        if stake_amount < self.min_stake {
            return Err(Error::build("stakeAmount", stake_amount));
        }
        if shares < self.min_delegation_fee || shares > MAX_DELEGATION_FEE {
            return Err(Error::build("delegationFeeRate", shares));
        }

        let owners = self.owners();
        let sig_indices = self.sig_indices(&owners)?;
        let (mut inputs, change) = self.select_inputs(stake_amount, &sig_indices)?;
        let mut outputs = Vec::new();
        if change > 0 {
            outputs.push(TransferableOutput {
                asset_id: self.asset_id,
                amount: change,
                owners: owners.clone(),
            });
        }
        sort_canonical(&mut outputs, &mut inputs)?;

        let signers: Vec<ShortId> = sig_indices
            .iter()
            .map(|index| owners.addresses[*index as usize])
            .collect();
        let tx = AddValidatorTx {
            base: BaseTx {
                network_id: self.network_id,
                blockchain_id: PLATFORM_CHAIN_ID,
                outputs,
                inputs,
                memo: self.memo.clone(),
            },
            validator: Validator {
                node_id,
                start_time,
                end_time,
                weight: stake_amount,
            },
            stake: vec![TransferableOutput {
                asset_id: self.asset_id,
                amount: stake_amount,
                owners,
            }],
            rewards_owner: OutputOwners::new(0, 1, &self.reward_addresses),
            shares,
        };
        let mut transaction = AvaxPTransaction::new(&self.coin, tx, signers)?;

        if let Some(parsed) = &self.parsed {
            if parsed.unsigned == transaction.unsigned_bytes() {
                if let Some(credential) = parsed.credentials.first() {
                    let signers = transaction.signers().to_vec();
                    for (signer, signature) in signers.iter().zip(&credential.signatures) {
                        if *signature != [0u8; SIGNATURE_LEN] {
                            transaction.attach(signer, *signature)?;
                        }
                    }
                }
            }
        }

        let digest = *transaction.digest();
        for keypair in &self.signers {
            transaction.attach(&keypair.address(), keypair.sign_digest(&digest)?)?;
        }
        debug!(change, "built add validator transaction");
        Ok(transaction)
    }
}
