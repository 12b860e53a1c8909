//! P-chain `AddValidatorTx` and its signed envelope
//!
//! ```text
//! unsigned = version(u16) || 12 || base_tx || validator || stake || rewards_owner || shares
//! signed   = unsigned || creds(u32 count, 9 || sigs(u32 count, 65 bytes each))
//! ```

use super::codec::{Reader, Writer, CODEC_VERSION};
use super::keypair::SIGNATURE_LEN;
use super::utils::ShortId;
use crate::{Error, Result};

pub const ADD_VALIDATOR_TX_TYPE: u32 = 12;
pub const TRANSFER_INPUT_TYPE: u32 = 5;
pub const TRANSFER_OUTPUT_TYPE: u32 = 7;
pub const OUTPUT_OWNERS_TYPE: u32 = 11;
pub const CREDENTIAL_TYPE: u32 = 9;

const OUTPUT_LEN: usize = 32 + 4 + 8 + 8 + 4 + 4;
const INPUT_LEN: usize = 32 + 4 + 32 + 4 + 8 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOwners {
    pub locktime: u64,
    pub threshold: u32,
    /// Sorted ascending
    pub addresses: Vec<ShortId>,
}

impl OutputOwners {
    pub fn new(locktime: u64, threshold: u32, addresses: &[ShortId]) -> Self {
        let mut addresses = addresses.to_vec();
        addresses.sort();
        addresses.dedup();
        Self {
            locktime,
            threshold,
            addresses,
        }
    }

    fn encode(&self, writer: &mut Writer) -> Result<()> {
        writer.u64(self.locktime).u32(self.threshold);
        writer.length(self.addresses.len())?;
        for address in &self.addresses {
            writer.raw(address);
        }
        Ok(())
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let locktime = reader.u64("locktime")?;
        let threshold = reader.u32("threshold")?;
        let count = reader.count("addresses", 20)?;
        let addresses = (0..count)
            .map(|_| reader.array::<20>("addresses"))
            .collect::<Result<Vec<_>>>()?;
        if threshold as usize > addresses.len() {
            return Err(Error::parse(
                "threshold",
                format!("{} exceeds {} owners", threshold, addresses.len()),
            ));
        }
        Ok(Self {
            locktime,
            threshold,
            addresses,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableOutput {
    pub asset_id: [u8; 32],
    pub amount: u64,
    pub owners: OutputOwners,
}

impl TransferableOutput {
    fn encode(&self, writer: &mut Writer) -> Result<()> {
        writer
            .raw(&self.asset_id)
            .u32(TRANSFER_OUTPUT_TYPE)
            .u64(self.amount);
        self.owners.encode(writer)
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let asset_id = reader.array::<32>("assetID")?;
        reader.type_id("output", TRANSFER_OUTPUT_TYPE)?;
        let amount = reader.u64("amount")?;
        Ok(Self {
            asset_id,
            amount,
            owners: OutputOwners::decode(reader)?,
        })
    }

    fn encoded(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        self.encode(&mut writer)?;
        Ok(writer.finish())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableInput {
    pub tx_id: [u8; 32],
    pub output_index: u32,
    pub asset_id: [u8; 32],
    pub amount: u64,
    /// Indexes into the spent output's owners; ascending
    pub sig_indices: Vec<u32>,
}

impl TransferableInput {
    fn encode(&self, writer: &mut Writer) -> Result<()> {
        writer
            .raw(&self.tx_id)
            .u32(self.output_index)
            .raw(&self.asset_id)
            .u32(TRANSFER_INPUT_TYPE)
            .u64(self.amount);
        writer.length(self.sig_indices.len())?;
        for index in &self.sig_indices {
            writer.u32(*index);
        }
        Ok(())
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let tx_id = reader.array::<32>("txID")?;
        let output_index = reader.u32("outputIndex")?;
        let asset_id = reader.array::<32>("assetID")?;
        reader.type_id("input", TRANSFER_INPUT_TYPE)?;
        let amount = reader.u64("amount")?;
        let count = reader.count("sigIndices", 4)?;
        let sig_indices = (0..count)
            .map(|_| reader.u32("sigIndices"))
            .collect::<Result<Vec<_>>>()?;
        if sig_indices.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::parse("sigIndices", "not strictly ascending"));
        }
        Ok(Self {
            tx_id,
            output_index,
            asset_id,
            amount,
            sig_indices,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTx {
    pub network_id: u32,
    pub blockchain_id: [u8; 32],
    pub outputs: Vec<TransferableOutput>,
    pub inputs: Vec<TransferableInput>,
    pub memo: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub node_id: ShortId,
    pub start_time: u64,
    pub end_time: u64,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub stake: Vec<TransferableOutput>,
    pub rewards_owner: OutputOwners,
    /// Delegation fee, parts per million
    pub shares: u32,
}

fn encode_outputs(outputs: &[TransferableOutput], writer: &mut Writer) -> Result<()> {
    writer.length(outputs.len())?;
    for output in outputs {
        output.encode(writer)?;
    }
    Ok(())
}

fn decode_outputs(reader: &mut Reader<'_>, field: &str) -> Result<Vec<TransferableOutput>> {
    let count = reader.count(field, OUTPUT_LEN)?;
    (0..count).map(|_| TransferableOutput::decode(reader)).collect()
}

/// Sort outputs by their encoding and inputs by (tx id, index)
pub fn sort_canonical(outputs: &mut [TransferableOutput], inputs: &mut [TransferableInput]) -> Result<()> {
    let mut keyed = outputs
        .iter()
        .map(|output| Ok((output.encoded()?, output.clone())))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    for (slot, (_, output)) in outputs.iter_mut().zip(keyed) {
        *slot = output;
    }
    inputs.sort_by(|a, b| (a.tx_id, a.output_index).cmp(&(b.tx_id, b.output_index)));
    Ok(())
}

impl AddValidatorTx {
    /// Unsigned encoding, codec version included
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        writer
            .u16(CODEC_VERSION)
            .u32(ADD_VALIDATOR_TX_TYPE)
            .u32(self.base.network_id)
            .raw(&self.base.blockchain_id);
        encode_outputs(&self.base.outputs, &mut writer)?;
        writer.length(self.base.inputs.len())?;
        for input in &self.base.inputs {
            input.encode(&mut writer)?;
        }
        writer.bytes(&self.base.memo)?;
        writer
            .raw(&self.validator.node_id)
            .u64(self.validator.start_time)
            .u64(self.validator.end_time)
            .u64(self.validator.weight);
        encode_outputs(&self.stake, &mut writer)?;
        writer.u32(OUTPUT_OWNERS_TYPE);
        self.rewards_owner.encode(&mut writer)?;
        writer.u32(self.shares);
        Ok(writer.finish())
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let version = reader.u16("codec version")?;
        if version != CODEC_VERSION {
            return Err(Error::NotSupported(format!("codec version {}", version)));
        }
        reader.type_id("transaction", ADD_VALIDATOR_TX_TYPE)?;
        let network_id = reader.u32("networkID")?;
        let blockchain_id = reader.array::<32>("blockchainID")?;
        let outputs = decode_outputs(reader, "outputs")?;
        let input_count = reader.count("inputs", INPUT_LEN)?;
        let inputs = (0..input_count)
            .map(|_| TransferableInput::decode(reader))
            .collect::<Result<Vec<_>>>()?;
        let memo = reader.bytes("memo")?.to_vec();
        let validator = Validator {
            node_id: reader.array::<20>("nodeID")?,
            start_time: reader.u64("startTime")?,
            end_time: reader.u64("endTime")?,
            weight: reader.u64("weight")?,
        };
        let stake = decode_outputs(reader, "stake")?;
        reader.type_id("rewardsOwner", OUTPUT_OWNERS_TYPE)?;
        let rewards_owner = OutputOwners::decode(reader)?;
        let shares = reader.u32("shares")?;
        Ok(Self {
            base: BaseTx {
                network_id,
                blockchain_id,
                outputs,
                inputs,
                memo,
            },
            validator,
            stake,
            rewards_owner,
            shares,
        })
    }
}

/// Signatures for one input, ordered like its sig indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub signatures: Vec<[u8; SIGNATURE_LEN]>,
}

pub fn encode_signed(unsigned: &[u8], credentials: &[Credential]) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    writer.raw(unsigned);
    writer.length(credentials.len())?;
    for credential in credentials {
        writer.u32(CREDENTIAL_TYPE);
        writer.length(credential.signatures.len())?;
        for signature in &credential.signatures {
            writer.raw(signature);
        }
    }
    Ok(writer.finish())
}

/// Decode a signed or unsigned transaction
///
/// Returns the transaction, its unsigned bytes and the credentials, which
/// are empty when the input carries none.
pub fn decode_signed(bytes: &[u8]) -> Result<(AddValidatorTx, Vec<u8>, Vec<Credential>)> {
    let mut reader = Reader::new(bytes);
    let tx = AddValidatorTx::decode(&mut reader)?;
    let unsigned = bytes[..reader.position()].to_vec();
    let mut credentials = Vec::new();
    if reader.remaining() > 0 {
        let count = reader.count("credentials", 8)?;
        for _ in 0..count {
            reader.type_id("credential", CREDENTIAL_TYPE)?;
            let sig_count = reader.count("signatures", SIGNATURE_LEN)?;
            let signatures = (0..sig_count)
                .map(|_| reader.array::<SIGNATURE_LEN>("signatures"))
                .collect::<Result<Vec<_>>>()?;
            credentials.push(Credential { signatures });
        }
    }
    reader.finish("transaction")?;
    if !credentials.is_empty() && credentials.len() != tx.base.inputs.len() {
        return Err(Error::parse(
            "credentials",
            format!(
                "{} credentials for {} inputs",
                credentials.len(),
                tx.base.inputs.len()
            ),
        ));
    }
    for (credential, input) in credentials.iter().zip(&tx.base.inputs) {
        if credential.signatures.len() != input.sig_indices.len() {
            return Err(Error::parse(
                "credentials",
                "signature count differs from sig indices",
            ));
        }
    }
    Ok((tx, unsigned, credentials))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AddValidatorTx {
        let owners = OutputOwners::new(0, 2, &[[3; 20], [1; 20], [2; 20]]);
        AddValidatorTx {
            base: BaseTx {
                network_id: 5,
                blockchain_id: [0; 32],
                outputs: vec![TransferableOutput {
                    asset_id: [7; 32],
                    amount: 5,
                    owners: owners.clone(),
                }],
                inputs: vec![TransferableInput {
                    tx_id: [9; 32],
                    output_index: 1,
                    asset_id: [7; 32],
                    amount: 25,
                    sig_indices: vec![0, 2],
                }],
                memo: b"validator".to_vec(),
            },
            validator: Validator {
                node_id: [4; 20],
                start_time: 1_000,
                end_time: 1_000 + 30 * 86_400,
                weight: 20,
            },
            stake: vec![TransferableOutput {
                asset_id: [7; 32],
                amount: 20,
                owners,
            }],
            rewards_owner: OutputOwners::new(0, 1, &[[1; 20]]),
            shares: 20_000,
        }
    }

    #[test]
    fn test_owners_sorted_and_deduplicated() {
        let owners = OutputOwners::new(0, 2, &[[3; 20], [1; 20], [3; 20]]);
        assert_eq!(owners.addresses, vec![[1; 20], [3; 20]]);
    }

    #[test]
    fn test_signed_envelope() {
        let tx = sample();
        let unsigned = tx.encode().unwrap();
        assert_eq!(&unsigned[..6], &[0, 0, 0, 0, 0, 12]);

        let credentials = vec![Credential {
            signatures: vec![[1; SIGNATURE_LEN], [0; SIGNATURE_LEN]],
        }];
        let signed = encode_signed(&unsigned, &credentials).unwrap();
        let (decoded, decoded_unsigned, decoded_credentials) = decode_signed(&signed).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded_unsigned, unsigned);
        assert_eq!(decoded_credentials, credentials);

        let (_, _, none) = decode_signed(&unsigned).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let unsigned = sample().encode().unwrap();
        let wrong_count = encode_signed(
            &unsigned,
            &[Credential {
                signatures: vec![[1; SIGNATURE_LEN]],
            }],
        )
        .unwrap();
        assert!(decode_signed(&wrong_count).is_err());

        let mut other_type = unsigned.clone();
        other_type[5] = 14;
        assert!(matches!(
            decode_signed(&other_type),
            Err(Error::NotSupported(_))
        ));

        assert!(decode_signed(&unsigned[..unsigned.len() - 1]).is_err());
    }
}
