//! Error types for the Thor driver

use ethers::types::Address;
use thiserror::Error;

/// Main error type for the driver
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("empty wallet")]
    EmptyWallet,

    #[error("signer {address:?} not found in wallet")]
    SignerNotFound { address: Address },

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// Transport failure, carrying the request context. `message` is the
    /// trimmed response body (truncated) or the underlying client error.
    #[error("{}", format_http(.status, .method, .url, .message))]
    Http {
        status: Option<u16>,
        method: String,
        url: String,
        message: String,
    },

    #[error("Unexpected response from {path}: {message}")]
    UnexpectedResponse { path: String, message: String },

    #[error("gas {gas} is below the intrinsic cost {intrinsic} of the clauses")]
    GasBelowIntrinsic { gas: u64, intrinsic: u64 },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Delegation error: {0}")]
    Delegation(String),
}

fn format_http(status: &Option<u16>, method: &str, url: &str, message: &str) -> String {
    let mut out = match status {
        Some(code) => format!("{} {} {}", code, method, url),
        None => format!("{} {}", method, url),
    };
    if !message.is_empty() {
        out.push_str(": ");
        out.push_str(message);
    }
    out
}

impl DriverError {
    /// Caller or wallet problems, detected before any network call
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            DriverError::Config(_)
                | DriverError::EmptyWallet
                | DriverError::SignerNotFound { .. }
                | DriverError::InvalidKey(_)
                | DriverError::GasBelowIntrinsic { .. }
        )
    }

    /// Failures raised by the transport or the node
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            DriverError::Http { .. } | DriverError::UnexpectedResponse { .. }
        )
    }

    /// Check if a caller could reasonably retry. The driver itself never does.
    pub fn is_retryable(&self) -> bool {
        match self {
            DriverError::Http { status: None, .. } => true,
            DriverError::Http {
                status: Some(code), ..
            } => *code >= 500,
            _ => false,
        }
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;
