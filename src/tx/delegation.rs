//! Fee-delegated signing: picks exactly one signing path per transaction

use super::assembler::AssembledTx;
use crate::codec::{parse_hex, Transaction, SIGNATURE_LENGTH};
use crate::codec::crypto;
use crate::error::{DriverError, DriverResult};
use crate::wallet::KeyEntity;

use ethers::types::{Bytes, H256};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Sponsor answer as received out of band
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationResponse {
    /// 0x-prefixed hex of the sponsor's 65-byte signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DelegationResponse {
    pub fn signed(signature: impl Into<String>) -> Self {
        Self {
            signature: Some(signature.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            signature: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a delegation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delegation {
    NotRequested,
    /// Sponsor signature over `blake2b256(signing_hash || origin)` of the
    /// delegated body (`Transaction::delegator_signing_hash`), not over the
    /// origin's signing hash
    Signed(Bytes),
    Failed(String),
}

impl From<DelegationResponse> for Delegation {
    fn from(response: DelegationResponse) -> Self {
        if let Some(error) = response.error {
            return Delegation::Failed(error);
        }
        let Some(signature) = response.signature else {
            return Delegation::Failed("delegation response carries no signature".to_string());
        };
        match parse_hex(&signature) {
            Ok(bytes) if bytes.len() == SIGNATURE_LENGTH => Delegation::Signed(Bytes::from(bytes)),
            Ok(bytes) => Delegation::Failed(format!(
                "delegation signature is {} bytes, expected {}",
                bytes.len(),
                SIGNATURE_LENGTH
            )),
            Err(e) => Delegation::Failed(format!("malformed delegation signature: {}", e)),
        }
    }
}

impl From<Option<DelegationResponse>> for Delegation {
    fn from(response: Option<DelegationResponse>) -> Self {
        response.map(Delegation::from).unwrap_or(Delegation::NotRequested)
    }
}

/// Which body ended up signed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningPath {
    Delegated,
    Plain,
}

impl SigningPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningPath::Delegated => "delegated",
            SigningPath::Plain => "plain",
        }
    }
}

impl fmt::Display for SigningPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed and encoded transaction, ready for submission
#[derive(Debug, Clone)]
pub struct SignedTx {
    pub id: H256,
    pub raw: Bytes,
    pub path: SigningPath,
    pub transaction: Transaction,
}

/// Sign one of the assembled bodies with `key` according to `delegation`.
///
/// A failed delegation is logged and downgraded to the plain path; it never
/// surfaces as an error.
pub async fn sign_transaction(
    key: &KeyEntity,
    assembled: &AssembledTx,
    delegation: Delegation,
) -> DriverResult<SignedTx> {
    let (mut tx, path, sponsor_signature) = match delegation {
        Delegation::Signed(signature) if signature.len() == SIGNATURE_LENGTH => {
            (assembled.delegated.clone(), SigningPath::Delegated, Some(signature))
        }
        Delegation::Signed(signature) => {
            fall_back(&DriverError::Delegation(format!(
                "delegation signature is {} bytes, expected {}",
                signature.len(),
                SIGNATURE_LENGTH
            )));
            (assembled.plain.clone(), SigningPath::Plain, None)
        }
        Delegation::Failed(reason) => {
            fall_back(&DriverError::Delegation(reason));
            (assembled.plain.clone(), SigningPath::Plain, None)
        }
        Delegation::NotRequested => (assembled.plain.clone(), SigningPath::Plain, None),
    };

    let hash = tx.signing_hash();
    let origin_signature = key.sign(&hash).await?;
    if origin_signature.len() != SIGNATURE_LENGTH {
        return Err(DriverError::Signing(format!(
            "origin signature is {} bytes, expected {}",
            origin_signature.len(),
            SIGNATURE_LENGTH
        )));
    }
    let recovered = crypto::recover(&hash, &origin_signature)?;
    if recovered != key.address {
        return Err(DriverError::Signing(format!(
            "signature recovers to {:?}, expected {:?}",
            recovered, key.address
        )));
    }

    let mut signature = origin_signature;
    if let Some(sponsor) = sponsor_signature {
        signature.extend_from_slice(&sponsor);
    }
    tx.signature = Some(Bytes::from(signature));

    let id = tx
        .id()?
        .ok_or_else(|| DriverError::Signing("signed transaction has no id".to_string()))?;
    let raw = Bytes::from(tx.encode());

    debug!("Signed tx {:?} via {} path ({} bytes)", id, path, raw.len());

    Ok(SignedTx {
        id,
        raw,
        path,
        transaction: tx,
    })
}

fn fall_back(err: &DriverError) {
    warn!("{}; falling back to self-signed transaction", err);
    crate::metrics::record_delegation_fallback();
}
