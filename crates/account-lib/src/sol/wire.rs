//! Legacy message and transaction wire format
//!
//! ```text
//! transaction = compact(signatures) || message
//! message     = header(3) || compact(keys) || blockhash(32) || compact(instructions)
//! instruction = program_index(1) || compact(account_indexes) || compact(data)
//! ```
//!
//! `compact` is a compact-u16 length prefix: 7 bits per byte, high bit set
//! while more bytes follow, at most three bytes.

use super::instruction::{AccountMeta, Instruction};
use super::pubkey::{Hash, Pubkey};
use crate::{Error, Result};

/// Largest transaction a validator accepts in one packet
pub const PACKET_DATA_SIZE: usize = 1232;
pub const SIGNATURE_LEN: usize = 64;

pub fn encode_compact_u16(value: usize, out: &mut Vec<u8>) -> Result<()> {
    if value > u16::MAX as usize {
        return Err(Error::Serialization(format!(
            "length {} does not fit a compact-u16",
            value
        )));
    }
    let mut rem = value;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return Ok(());
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Cursor over a raw transaction
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::parse(
                field,
                format!("needs {} bytes, {} left", len, self.remaining()),
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    pub fn u32_le(&mut self, field: &str) -> Result<u32> {
        let mut out = [0u8; 4];
        out.copy_from_slice(self.take(4, field)?);
        Ok(u32::from_le_bytes(out))
    }

    pub fn u64_le(&mut self, field: &str) -> Result<u64> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.take(8, field)?);
        Ok(u64::from_le_bytes(out))
    }

    pub fn array32(&mut self, field: &str) -> Result<[u8; 32]> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.take(32, field)?);
        Ok(out)
    }

    pub fn compact_u16(&mut self, field: &str) -> Result<usize> {
        let mut value = 0usize;
        for shift in [0, 7, 14] {
            let byte = self.u8(field)?;
            value |= ((byte & 0x7f) as usize) << shift;
            if byte & 0x80 == 0 {
                if value > u16::MAX as usize {
                    return Err(Error::parse(field, "compact-u16 overflow"));
                }
                return Ok(value);
            }
        }
        Err(Error::parse(field, "compact-u16 longer than three bytes"))
    }

    pub fn finish(&self, field: &str) -> Result<()> {
        if self.remaining() != 0 {
            return Err(Error::parse(
                field,
                format!("{} trailing bytes", self.remaining()),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

struct KeyFlags {
    key: Pubkey,
    signer: bool,
    writable: bool,
}

impl Message {
    /// Compile `instructions` with `payer` as fee payer
    ///
    /// Keys are ordered signer-writable, signer-readonly, writable,
    /// readonly; the payer is always first and first-seen order is kept
    /// inside each group.
    pub fn compile(payer: &Pubkey, instructions: &[Instruction], blockhash: Hash) -> Result<Self> {
        let mut keys: Vec<KeyFlags> = vec![KeyFlags {
            key: *payer,
            signer: true,
            writable: true,
        }];
        let mut upsert = |key: Pubkey, signer: bool, writable: bool| {
            match keys.iter_mut().find(|entry| entry.key == key) {
                Some(entry) => {
                    entry.signer |= signer;
                    entry.writable |= writable;
                }
                None => keys.push(KeyFlags {
                    key,
                    signer,
                    writable,
                }),
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta.pubkey, meta.is_signer, meta.is_writable);
            }
            upsert(ix.program_id, false, false);
        }

        let mut ordered: Vec<&KeyFlags> = vec![&keys[0]];
        for (signer, writable) in [(true, true), (true, false), (false, true), (false, false)] {
            ordered.extend(
                keys[1..]
                    .iter()
                    .filter(|entry| entry.signer == signer && entry.writable == writable),
            );
        }

        if ordered.len() > u8::MAX as usize {
            return Err(Error::build("instructions", "too many accounts"));
        }
        let count = |signer: bool, writable: bool| {
            ordered
                .iter()
                .filter(|entry| entry.signer == signer && entry.writable == writable)
                .count() as u8
        };
        let header = MessageHeader {
            num_required_signatures: ordered.iter().filter(|entry| entry.signer).count() as u8,
            num_readonly_signed_accounts: count(true, false),
            num_readonly_unsigned_accounts: count(false, false),
        };
        let account_keys: Vec<Pubkey> = ordered.iter().map(|entry| entry.key).collect();

        let index_of = |key: &Pubkey| -> Result<u8> {
            account_keys
                .iter()
                .position(|candidate| candidate == key)
                .map(|position| position as u8)
                .ok_or_else(|| Error::build("instructions", format!("unknown account {}", key)))
        };
        let compiled = instructions
            .iter()
            .map(|ix| {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|meta| index_of(&meta.pubkey))
                        .collect::<Result<_>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash: blockhash,
            instructions: compiled,
        })
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    /// Keys whose signatures the transaction carries, in slot order
    pub fn signer_keys(&self) -> &[Pubkey] {
        let count = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..count]
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < self.header.num_required_signatures as usize
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let signed = self.header.num_required_signatures as usize;
        if index < signed {
            index < signed - self.header.num_readonly_signed_accounts as usize
        } else {
            let unsigned_writable = self
                .account_keys
                .len()
                .saturating_sub(signed + self.header.num_readonly_unsigned_accounts as usize);
            index - signed < unsigned_writable
        }
    }

    /// Expand compiled instructions back to keyed instructions
    pub fn decompile(&self) -> Result<Vec<Instruction>> {
        let key = |index: u8| -> Result<Pubkey> {
            self.account_keys
                .get(index as usize)
                .copied()
                .ok_or_else(|| Error::parse("instructions", format!("account index {}", index)))
        };
        self.instructions
            .iter()
            .map(|compiled| {
                Ok(Instruction {
                    program_id: key(compiled.program_id_index)?,
                    accounts: compiled
                        .accounts
                        .iter()
                        .map(|&index| {
                            Ok(AccountMeta {
                                pubkey: key(index)?,
                                is_signer: self.is_signer(index as usize),
                                is_writable: self.is_writable(index as usize),
                            })
                        })
                        .collect::<Result<_>>()?,
                    data: compiled.data.clone(),
                })
            })
            .collect()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = vec![
            self.header.num_required_signatures,
            self.header.num_readonly_signed_accounts,
            self.header.num_readonly_unsigned_accounts,
        ];
        encode_compact_u16(self.account_keys.len(), &mut out)?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(self.recent_blockhash.as_bytes());
        encode_compact_u16(self.instructions.len(), &mut out)?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_compact_u16(ix.accounts.len(), &mut out)?;
            out.extend_from_slice(&ix.accounts);
            encode_compact_u16(ix.data.len(), &mut out)?;
            out.extend_from_slice(&ix.data);
        }
        Ok(out)
    }

    pub fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        let header = MessageHeader {
            num_required_signatures: reader.u8("header")?,
            num_readonly_signed_accounts: reader.u8("header")?,
            num_readonly_unsigned_accounts: reader.u8("header")?,
        };
        let key_count = reader.compact_u16("accountKeys")?;
        let account_keys = (0..key_count)
            .map(|_| reader.array32("accountKeys").map(Pubkey))
            .collect::<Result<Vec<_>>>()?;
        if (header.num_required_signatures as usize) > account_keys.len()
            || (header.num_readonly_signed_accounts > header.num_required_signatures)
        {
            return Err(Error::parse("header", "inconsistent signer counts"));
        }
        let recent_blockhash = Pubkey(reader.array32("recentBlockhash")?);

        let ix_count = reader.compact_u16("instructions")?;
        let mut instructions = Vec::with_capacity(ix_count);
        for _ in 0..ix_count {
            let program_id_index = reader.u8("instructions")?;
            let account_count = reader.compact_u16("instructions")?;
            let accounts = reader.take(account_count, "instructions")?.to_vec();
            let data_len = reader.compact_u16("instructions")?;
            let data = reader.take(data_len, "instructions")?.to_vec();
            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }
}

/// Signature slots followed by the message; empty slots are all zero
pub fn encode_transaction(signatures: &[[u8; SIGNATURE_LEN]], message: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(1 + signatures.len() * SIGNATURE_LEN + message.len());
    encode_compact_u16(signatures.len(), &mut out)?;
    for signature in signatures {
        out.extend_from_slice(signature);
    }
    out.extend_from_slice(message);
    Ok(out)
}

pub fn decode_transaction(bytes: &[u8]) -> Result<(Vec<[u8; SIGNATURE_LEN]>, Message)> {
    let mut reader = Reader::new(bytes);
    let count = reader.compact_u16("signatures")?;
    let mut signatures = Vec::with_capacity(count);
    for _ in 0..count {
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(reader.take(SIGNATURE_LEN, "signatures")?);
        signatures.push(signature);
    }
    let message = Message::deserialize(&mut reader)?;
    reader.finish("transaction")?;
    if signatures.len() != message.header.num_required_signatures as usize {
        return Err(Error::parse(
            "signatures",
            format!(
                "{} slots for {} required signers",
                signatures.len(),
                message.header.num_required_signatures
            ),
        ));
    }
    Ok((signatures, message))
}
