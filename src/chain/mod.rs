//! Chain module - node transport, typed provider and head tracking
//!
//! This module provides:
//! - The `Net` request/response seam and a reqwest-backed implementation
//! - A typed provider for blocks, execution simulation and submission
//! - Chain head state with optional background polling

pub mod head;
pub mod net;
pub mod provider;

pub use head::HeadState;
pub use net::HttpNet;
pub use provider::ThorProvider;

use crate::error::DriverResult;

use async_trait::async_trait;
use ethers::types::H256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP method understood by the node API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Optional request parts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpParams {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Request/response access to a ledger node
///
/// Implementations wrap failures with the request context (method, url and a
/// truncated response body). The driver never retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Net: Send + Sync {
    async fn http(&self, method: Method, path: &str, params: HttpParams) -> DriverResult<Value>;
}

/// Block summary as returned by `blocks/{revision}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub id: H256,
    pub number: u64,
    pub timestamp: u64,
    #[serde(rename = "parentID")]
    pub parent_id: H256,
    #[serde(default)]
    pub txs_features: u32,
}

impl BlockHeader {
    /// Chain tag: the last byte of a genesis block id
    pub fn chain_tag(&self) -> u8 {
        self.id.as_bytes()[31]
    }

    /// Block reference: the first 8 bytes of the block id
    pub fn block_ref(&self) -> u64 {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.id.as_bytes()[..8]);
        u64::from_be_bytes(prefix)
    }
}

/// Per-clause result of an execution simulation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmOutput {
    pub gas_used: u64,
    #[serde(default)]
    pub reverted: bool,
    #[serde(default)]
    pub vm_error: String,
}
