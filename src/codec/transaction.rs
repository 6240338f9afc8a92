//! Thor transaction body model, RLP encoding and signing hashes

use super::crypto::{self, DELEGATED_SIGNATURE_LENGTH, SIGNATURE_LENGTH};
use super::blake2b256;
use crate::error::{DriverError, DriverResult};

use ethers::types::{Address, Bytes, H256, U256};
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// Reserved feature bit requesting fee delegation (VIP-191)
pub const DELEGATION_FEATURE: u32 = 1;

const TX_GAS: u64 = 5_000;
const CLAUSE_GAS: u64 = 16_000;
const CLAUSE_GAS_CONTRACT_CREATION: u64 = 48_000;
const ZERO_BYTE_GAS: u64 = 4;
const NON_ZERO_BYTE_GAS: u64 = 68;

/// One transfer/call unit of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

impl Clause {
    /// Plain value transfer
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to: Some(to),
            value,
            data: Bytes::default(),
        }
    }
}

/// Reserved transaction fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reserved {
    pub features: u32,
    pub unused: Vec<Bytes>,
}

impl Reserved {
    /// Items as they go on the wire, trailing empty items trimmed
    fn wire_items(&self) -> Vec<Vec<u8>> {
        let mut items = vec![trim_leading_zeros(&self.features.to_be_bytes())];
        items.extend(self.unused.iter().map(|u| u.to_vec()));
        while items.last().map_or(false, |item| item.is_empty()) {
            items.pop();
        }
        items
    }
}

/// Unsigned transaction body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxBody {
    pub chain_tag: u8,
    /// First 8 bytes of a recent block id, big-endian
    pub block_ref: u64,
    /// Lifetime in blocks, counted from `block_ref`
    pub expiration: u32,
    pub clauses: Vec<Clause>,
    pub gas_price_coef: u8,
    pub gas: u64,
    pub depends_on: Option<H256>,
    pub nonce: u64,
    pub reserved: Reserved,
}

impl TxBody {
    /// Same body with the reserved feature bits replaced
    pub fn with_features(&self, features: u32) -> Self {
        let mut body = self.clone();
        body.reserved.features = features;
        body
    }
}

/// A transaction body plus its (optional) signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub body: TxBody,
    pub signature: Option<Bytes>,
}

impl Transaction {
    pub fn new(body: TxBody) -> Self {
        Self {
            body,
            signature: None,
        }
    }

    /// Whether the delegation feature bit is set
    pub fn is_delegated(&self) -> bool {
        self.body.reserved.features & DELEGATION_FEATURE == DELEGATION_FEATURE
    }

    /// Hash the origin signs: blake2b256 over the unsigned encoding
    pub fn signing_hash(&self) -> H256 {
        blake2b256(&[&self.rlp(false)])
    }

    /// Hash the delegator signs, bound to the origin address
    pub fn delegator_signing_hash(&self, origin: &Address) -> H256 {
        blake2b256(&[self.signing_hash().as_bytes(), origin.as_bytes()])
    }

    fn check_signature_length(&self, signature: &[u8]) -> DriverResult<()> {
        let expected = if self.is_delegated() {
            DELEGATED_SIGNATURE_LENGTH
        } else {
            SIGNATURE_LENGTH
        };
        if signature.len() != expected {
            return Err(DriverError::Codec(format!(
                "signature length {} does not match expected {}",
                signature.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Origin recovered from the signature, `None` when unsigned
    pub fn origin(&self) -> DriverResult<Option<Address>> {
        let Some(signature) = &self.signature else {
            return Ok(None);
        };
        self.check_signature_length(signature)?;
        crypto::recover(&self.signing_hash(), &signature[..SIGNATURE_LENGTH]).map(Some)
    }

    /// Delegator recovered from the second signature half, `None` when not delegated or unsigned
    pub fn delegator(&self) -> DriverResult<Option<Address>> {
        if !self.is_delegated() {
            return Ok(None);
        }
        let (Some(signature), Some(origin)) = (&self.signature, self.origin()?) else {
            return Ok(None);
        };
        let hash = self.delegator_signing_hash(&origin);
        crypto::recover(&hash, &signature[SIGNATURE_LENGTH..]).map(Some)
    }

    /// Transaction id: blake2b256(signing_hash || origin), `None` when unsigned
    pub fn id(&self) -> DriverResult<Option<H256>> {
        Ok(self
            .origin()?
            .map(|origin| blake2b256(&[self.signing_hash().as_bytes(), origin.as_bytes()])))
    }

    /// Wire encoding, including the signature when present
    pub fn encode(&self) -> Vec<u8> {
        self.rlp(true)
    }

    fn rlp(&self, with_signature: bool) -> Vec<u8> {
        let signature = if with_signature {
            self.signature.as_ref()
        } else {
            None
        };
        let body = &self.body;

        let mut s = RlpStream::new_list(if signature.is_some() { 10 } else { 9 });
        s.append(&body.chain_tag);
        s.append(&body.block_ref);
        s.append(&body.expiration);

        s.begin_list(body.clauses.len());
        for clause in &body.clauses {
            s.begin_list(3);
            match clause.to {
                Some(to) => s.append(&to.as_bytes().to_vec()),
                None => s.append_empty_data(),
            };
            s.append(&u256_to_trimmed(clause.value));
            s.append(&clause.data.to_vec());
        }

        s.append(&body.gas_price_coef);
        s.append(&body.gas);
        match body.depends_on {
            Some(id) => s.append(&id.as_bytes().to_vec()),
            None => s.append_empty_data(),
        };
        s.append(&body.nonce);

        let reserved = body.reserved.wire_items();
        s.begin_list(reserved.len());
        for item in &reserved {
            s.append(item);
        }

        if let Some(signature) = signature {
            s.append(&signature.to_vec());
        }
        s.out().to_vec()
    }

    /// Decode a signed (10 items) or unsigned (9 items) transaction
    pub fn decode(raw: &[u8]) -> DriverResult<Self> {
        let rlp = Rlp::new(raw);
        let info = rlp.payload_info().map_err(rlp_err)?;
        if info.header_len + info.value_len != raw.len() {
            return Err(DriverError::Codec("trailing bytes after transaction".to_string()));
        }
        if !rlp.is_list() {
            return Err(DriverError::Codec("transaction must be a list".to_string()));
        }
        let count = rlp.item_count().map_err(rlp_err)?;
        if count != 9 && count != 10 {
            return Err(DriverError::Codec(format!(
                "transaction must have 9 or 10 items, got {}",
                count
            )));
        }

        let clauses_rlp = rlp.at(3).map_err(rlp_err)?;
        if !clauses_rlp.is_list() {
            return Err(DriverError::Codec("clauses must be a list".to_string()));
        }
        let mut clauses = Vec::with_capacity(clauses_rlp.item_count().map_err(rlp_err)?);
        for item in clauses_rlp.iter() {
            if !item.is_list() || item.item_count().map_err(rlp_err)? != 3 {
                return Err(DriverError::Codec("clause must be a 3-item list".to_string()));
            }
            let to = decode_optional_fixed(&item.at(0).map_err(rlp_err)?, 20, "clause.to")?
                .map(|b| Address::from_slice(&b));
            let value = decode_u256(&item.at(1).map_err(rlp_err)?)?;
            let data = item.at(2).map_err(rlp_err)?.data().map_err(rlp_err)?.to_vec();
            clauses.push(Clause {
                to,
                value,
                data: Bytes::from(data),
            });
        }

        let reserved_rlp = rlp.at(8).map_err(rlp_err)?;
        if !reserved_rlp.is_list() {
            return Err(DriverError::Codec("reserved must be a list".to_string()));
        }
        let mut items = Vec::new();
        for item in reserved_rlp.iter() {
            items.push(item.data().map_err(rlp_err)?.to_vec());
        }
        if items.last().map_or(false, |item| item.is_empty()) {
            return Err(DriverError::Codec("reserved fields not trimmed".to_string()));
        }
        let reserved = match items.split_first() {
            Some((features, unused)) => Reserved {
                features: decode_uint_bytes(features, 4, "reserved.features")? as u32,
                unused: unused.iter().cloned().map(Bytes::from).collect(),
            },
            None => Reserved::default(),
        };

        let body = TxBody {
            chain_tag: decode_uint(&rlp, 0, 1, "chainTag")? as u8,
            block_ref: decode_uint(&rlp, 1, 8, "blockRef")?,
            expiration: decode_uint(&rlp, 2, 4, "expiration")? as u32,
            clauses,
            gas_price_coef: decode_uint(&rlp, 4, 1, "gasPriceCoef")? as u8,
            gas: decode_uint(&rlp, 5, 8, "gas")?,
            depends_on: decode_optional_fixed(&rlp.at(6).map_err(rlp_err)?, 32, "dependsOn")?
                .map(|b| H256::from_slice(&b)),
            nonce: decode_uint(&rlp, 7, 8, "nonce")?,
            reserved,
        };

        let signature = if count == 10 {
            let sig = rlp.at(9).map_err(rlp_err)?.data().map_err(rlp_err)?.to_vec();
            Some(Bytes::from(sig))
        } else {
            None
        };

        Ok(Self { body, signature })
    }
}

/// Gas charged before any execution: base cost plus per-clause and per-data-byte costs
pub fn intrinsic_gas(clauses: &[Clause]) -> u64 {
    if clauses.is_empty() {
        return TX_GAS + CLAUSE_GAS;
    }

    clauses.iter().fold(TX_GAS, |total, clause| {
        let clause_gas = if clause.to.is_some() {
            CLAUSE_GAS
        } else {
            CLAUSE_GAS_CONTRACT_CREATION
        };
        let data_gas: u64 = clause
            .data
            .iter()
            .map(|b| if *b == 0 { ZERO_BYTE_GAS } else { NON_ZERO_BYTE_GAS })
            .sum();
        total + clause_gas + data_gas
    })
}

fn rlp_err(e: DecoderError) -> DriverError {
    DriverError::Codec(e.to_string())
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

fn u256_to_trimmed(value: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    trim_leading_zeros(&buf)
}

fn decode_uint(rlp: &Rlp, index: usize, max_len: usize, field: &str) -> DriverResult<u64> {
    let item = rlp.at(index).map_err(rlp_err)?;
    let bytes = item.data().map_err(rlp_err)?;
    decode_uint_bytes(bytes, max_len, field)
}

fn decode_uint_bytes(bytes: &[u8], max_len: usize, field: &str) -> DriverResult<u64> {
    if bytes.len() > max_len {
        return Err(DriverError::Codec(format!("{} exceeds {} bytes", field, max_len)));
    }
    if bytes.first() == Some(&0) {
        return Err(DriverError::Codec(format!("{} has leading zero", field)));
    }
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn decode_u256(item: &Rlp) -> DriverResult<U256> {
    let bytes = item.data().map_err(rlp_err)?;
    if bytes.len() > 32 {
        return Err(DriverError::Codec("clause.value exceeds 32 bytes".to_string()));
    }
    if bytes.first() == Some(&0) {
        return Err(DriverError::Codec("clause.value has leading zero".to_string()));
    }
    Ok(U256::from_big_endian(bytes))
}

fn decode_optional_fixed(item: &Rlp, len: usize, field: &str) -> DriverResult<Option<Vec<u8>>> {
    let bytes = item.data().map_err(rlp_err)?;
    match bytes.len() {
        0 => Ok(None),
        n if n == len => Ok(Some(bytes.to_vec())),
        n => Err(DriverError::Codec(format!(
            "{} must be {} bytes, got {}",
            field, len, n
        ))),
    }
}
