//! Typed node access on top of a `Net` transport

use super::{BlockHeader, HttpParams, Method, Net, VmOutput};
use crate::codec::{to_hex, Clause};
use crate::error::{DriverError, DriverResult};

use ethers::types::{Address, H256};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Header binding every request to a specific chain
pub const GENESIS_ID_HEADER: &str = "x-genesis-id";

/// Node provider with genesis binding
#[derive(Clone)]
pub struct ThorProvider {
    net: Arc<dyn Net>,
    genesis_id: Option<H256>,
}

#[derive(Deserialize)]
struct SendTxResponse {
    id: H256,
}

impl ThorProvider {
    /// Create a provider not yet bound to a chain
    pub fn new(net: Arc<dyn Net>) -> Self {
        Self {
            net,
            genesis_id: None,
        }
    }

    /// Bind subsequent requests to `genesis_id`
    pub fn with_genesis(mut self, genesis_id: H256) -> Self {
        self.genesis_id = Some(genesis_id);
        self
    }

    pub fn genesis_id(&self) -> Option<H256> {
        self.genesis_id
    }

    fn params(&self, query: Vec<(String, String)>, body: Option<Value>) -> HttpParams {
        let headers = self
            .genesis_id
            .map(|id| vec![(GENESIS_ID_HEADER.to_string(), to_hex(id.as_bytes()))])
            .unwrap_or_default();
        HttpParams {
            headers,
            query,
            body,
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: HttpParams,
    ) -> DriverResult<T> {
        let value = self.net.http(method, path, params).await?;
        serde_json::from_value(value).map_err(|e| DriverError::UnexpectedResponse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetch a block summary by revision (`0`, `best`, a number or an id)
    pub async fn get_block(&self, revision: &str) -> DriverResult<BlockHeader> {
        let path = format!("blocks/{}", revision);
        let block: Option<BlockHeader> = self
            .request(Method::Get, &path, self.params(Vec::new(), None))
            .await?;
        block.ok_or_else(|| DriverError::UnexpectedResponse {
            path,
            message: "block not found".to_string(),
        })
    }

    /// Simulate `clauses` from `caller` on top of block `revision`
    ///
    /// Execution stops at the first reverted clause, so the node may return
    /// fewer outputs than clauses.
    pub async fn explain(
        &self,
        clauses: &[Clause],
        caller: Address,
        revision: H256,
    ) -> DriverResult<Vec<VmOutput>> {
        let body = json!({
            "clauses": clauses,
            "caller": caller,
        });
        let query = vec![("revision".to_string(), to_hex(revision.as_bytes()))];
        let outputs: Vec<VmOutput> = self
            .request(Method::Post, "accounts/*", self.params(query, Some(body)))
            .await?;

        if outputs.len() > clauses.len() {
            return Err(DriverError::UnexpectedResponse {
                path: "accounts/*".to_string(),
                message: format!(
                    "expected at most {} outputs, got {}",
                    clauses.len(),
                    outputs.len()
                ),
            });
        }
        Ok(outputs)
    }

    /// Submit an encoded signed transaction, returning the id the node reports
    pub async fn send_raw(&self, raw: &[u8]) -> DriverResult<H256> {
        let body = json!({ "raw": to_hex(raw) });
        let response: SendTxResponse = self
            .request(Method::Post, "transactions", self.params(Vec::new(), Some(body)))
            .await?;
        debug!("Node accepted transaction {:?}", response.id);
        Ok(response.id)
    }
}

impl fmt::Debug for ThorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThorProvider")
            .field("genesis_id", &self.genesis_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNet;
    use ethers::types::U256;

    #[tokio::test]
    async fn test_genesis_header_attached() {
        let genesis = H256::repeat_byte(0x4a);
        let mut net = MockNet::new();
        net.expect_http()
            .withf(|method, path, params| {
                *method == Method::Get
                    && path.starts_with("blocks/best")
                    && params.headers
                        == vec![(GENESIS_ID_HEADER.to_string(), to_hex(&[0x4a; 32]))]
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(json!({
                    "id": to_hex(&[0xaa; 32]),
                    "number": 7,
                    "timestamp": 1000,
                    "parentID": to_hex(&[0xbb; 32]),
                }))
            });

        let provider = ThorProvider::new(Arc::new(net)).with_genesis(genesis);
        let best = provider.get_block("best").await.unwrap();
        assert_eq!(best.number, 7);
        assert_eq!(best.id, H256::repeat_byte(0xaa));
    }

    #[tokio::test]
    async fn test_missing_block() {
        let mut net = MockNet::new();
        net.expect_http().returning(|_, _, _| Ok(Value::Null));

        let provider = ThorProvider::new(Arc::new(net));
        let err = provider.get_block("123").await.unwrap_err();
        assert!(err.is_transport_error());
    }

    #[tokio::test]
    async fn test_explain_request_shape() {
        let mut net = MockNet::new();
        net.expect_http()
            .withf(|method, path, params| {
                *method == Method::Post
                    && path.starts_with("accounts/*")
                    && params.query == vec![("revision".to_string(), to_hex(&[0xaa; 32]))]
                    && params.body.as_ref().map_or(false, |b| b["clauses"].is_array())
            })
            .returning(|_, _, _| Ok(json!([{ "gasUsed": 100 }])));

        let provider = ThorProvider::new(Arc::new(net));
        let clause = Clause::transfer(Address::repeat_byte(1), U256::from(5));
        let outputs = provider
            .explain(&[clause], Address::repeat_byte(2), H256::repeat_byte(0xaa))
            .await
            .unwrap();
        assert_eq!(outputs[0].gas_used, 100);
    }

    #[tokio::test]
    async fn test_explain_output_count() {
        let mut net = MockNet::new();
        // stopped at the first (reverted) clause
        net.expect_http()
            .times(1)
            .returning(|_, _, _| Ok(json!([{ "gasUsed": 100, "reverted": true }])));
        net.expect_http()
            .times(1)
            .returning(|_, _, _| Ok(json!([{ "gasUsed": 1 }, { "gasUsed": 2 }, { "gasUsed": 3 }])));

        let provider = ThorProvider::new(Arc::new(net));
        let clauses = vec![
            Clause::transfer(Address::repeat_byte(1), U256::from(5)),
            Clause::transfer(Address::repeat_byte(3), U256::from(5)),
        ];
        let caller = Address::repeat_byte(2);
        let revision = H256::repeat_byte(0xaa);

        let outputs = provider.explain(&clauses, caller, revision).await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].reverted);

        let err = provider.explain(&clauses, caller, revision).await.unwrap_err();
        assert!(matches!(err, DriverError::UnexpectedResponse { .. }));
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let mut net = MockNet::new();
        net.expect_http().returning(|_, _, _| {
            Err(DriverError::Http {
                status: Some(400),
                method: "POST".to_string(),
                url: "http://node/transactions".to_string(),
                message: "bad tx".to_string(),
            })
        });

        let provider = ThorProvider::new(Arc::new(net));
        let err = provider.send_raw(&[0xc0]).await.unwrap_err();
        assert_eq!(err.to_string(), "400 POST http://node/transactions: bad tx");
    }
}
