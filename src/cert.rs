//! Local certificate signing keyed off the latest chain head

use crate::codec::{to_hex, Annex, CertMessage, Certificate, SIGNATURE_LENGTH};
use crate::error::{DriverError, DriverResult};
use crate::wallet::KeyEntity;

use ethers::types::Address;
use serde::Serialize;
use tracing::debug;

/// Domain stamped into every certificate annex
pub const DEFAULT_DOMAIN: &str = "localhost";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignCertOptions {
    pub signer: Option<Address>,
}

/// Annex plus the hex signature over the merged certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedCert {
    pub annex: Annex,
    pub signature: String,
}

impl SignedCert {
    /// Rebuild the full certificate a verifier would check
    pub fn certificate(&self, message: CertMessage) -> Certificate {
        let mut cert = Certificate::new(message, self.annex.clone());
        cert.signature = Some(self.signature.clone());
        cert
    }
}

#[derive(Debug, Clone)]
pub struct CertificateSigner {
    domain: String,
}

impl CertificateSigner {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Sign `message` with `key`, stamping `timestamp` from the chain head
    pub async fn sign(
        &self,
        message: CertMessage,
        key: &KeyEntity,
        timestamp: u64,
    ) -> DriverResult<SignedCert> {
        let annex = Annex {
            domain: self.domain.clone(),
            timestamp,
            signer: key.address,
        };
        let cert = Certificate::new(message, annex.clone());
        let signature = key.sign(&cert.signing_hash()).await?;
        if signature.len() != SIGNATURE_LENGTH {
            return Err(DriverError::Signing(format!(
                "certificate signature is {} bytes, expected {}",
                signature.len(),
                SIGNATURE_LENGTH
            )));
        }

        debug!(
            "Signed certificate for {:?} (purpose={}, timestamp={})",
            key.address, cert.purpose, timestamp
        );
        crate::metrics::record_cert_signed();

        Ok(SignedCert {
            annex,
            signature: to_hex(&signature),
        })
    }
}

impl Default for CertificateSigner {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN)
    }
}
