//! Off-chain identity certificates and their canonical encoding

use super::{address_hex, blake2b256, crypto, parse_hex};
use crate::error::{DriverError, DriverResult};

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Certificate payload supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// Caller-supplied part of a certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertMessage {
    pub purpose: String,
    pub payload: CertPayload,
}

/// Fields the driver injects so the verifier can rebuild what was signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annex {
    pub domain: String,
    pub timestamp: u64,
    pub signer: Address,
}

/// A complete certificate, optionally carrying its signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub purpose: String,
    pub payload: CertPayload,
    pub domain: String,
    pub timestamp: u64,
    pub signer: Address,
    /// `0x`-prefixed hex
    pub signature: Option<String>,
}

impl Certificate {
    /// Merge the caller message with the injected annex
    pub fn new(message: CertMessage, annex: Annex) -> Self {
        Self {
            purpose: message.purpose,
            payload: message.payload,
            domain: annex.domain,
            timestamp: annex.timestamp,
            signer: annex.signer,
            signature: None,
        }
    }

    /// Canonical encoding: sorted-key compact JSON, signer lower-cased, signature excluded
    pub fn encode(&self) -> Vec<u8> {
        let unsigned = json!({
            "purpose": self.purpose,
            "payload": {
                "type": self.payload.kind,
                "content": self.payload.content,
            },
            "domain": self.domain,
            "timestamp": self.timestamp,
            "signer": address_hex(&self.signer),
        });
        let mut out = String::new();
        write_canonical(&unsigned, &mut out);
        out.into_bytes()
    }

    pub fn signing_hash(&self) -> H256 {
        blake2b256(&[&self.encode()])
    }

    /// Check that the signature was produced by `signer` over the canonical encoding
    pub fn verify(&self) -> DriverResult<()> {
        let signature = self
            .signature
            .as_deref()
            .ok_or_else(|| DriverError::Codec("certificate is not signed".to_string()))?;
        let recovered = crypto::recover(&self.signing_hash(), &parse_hex(signature)?)?;
        if recovered != self.signer {
            return Err(DriverError::Codec(format!(
                "certificate signer mismatch: expected {}, recovered {}",
                address_hex(&self.signer),
                address_hex(&recovered)
            )));
        }
        Ok(())
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
