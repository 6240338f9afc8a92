//! In-memory fake node shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;

use thor_driver::codec::{parse_hex, to_hex, Transaction};
use thor_driver::{DriverError, DriverResult, HttpParams, Method, Net};

pub const ORIGIN_KEY: &str = "7582be841ca040aa940fff6c05773129e135623e41acce3e0b8ba520dc1ae26a";
pub const SPONSOR_KEY: &str = "321d6443bc6177273b5abf54210fe806d451d6b7973bccc2384ef78bbcd0bf51";
pub const OTHER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// One request as seen by the node
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub params: HttpParams,
}

/// Serves `blocks/0`, `blocks/best`, `accounts/*` and `transactions`
pub struct FakeNode {
    genesis_id: [u8; 32],
    best: Mutex<Value>,
    /// Execution gas reported for every simulated clause
    exec_gas: Mutex<u64>,
    /// When set, `POST transactions` fails with this status and body
    reject: Mutex<Option<(u16, String)>>,
    requests: Mutex<Vec<Request>>,
}

pub fn block(id: [u8; 32], number: u64, timestamp: u64) -> Value {
    json!({
        "id": to_hex(&id),
        "number": number,
        "timestamp": timestamp,
        "parentID": to_hex(&[0u8; 32]),
        "txsFeatures": 1,
    })
}

impl FakeNode {
    /// Genesis id ending in `0x4a`, head id `0xaa..aa`
    pub fn new() -> Self {
        let mut genesis_id = [0u8; 32];
        genesis_id[31] = 0x4a;
        Self {
            genesis_id,
            best: Mutex::new(block([0xaa; 32], 1000, 1_700_000_000)),
            exec_gas: Mutex::new(0),
            reject: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn genesis_id(&self) -> [u8; 32] {
        self.genesis_id
    }

    pub fn set_best(&self, best: Value) {
        *self.best.lock().unwrap() = best;
    }

    pub fn set_exec_gas(&self, gas: u64) {
        *self.exec_gas.lock().unwrap() = gas;
    }

    pub fn reject_transactions(&self, status: u16, body: &str) {
        *self.reject.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Raw payloads of every `POST transactions`, in order
    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::Post && r.path == "transactions")
            .filter_map(|r| r.params.body)
            .filter_map(|body| body["raw"].as_str().map(|raw| parse_hex(raw).unwrap()))
            .collect()
    }

    fn error(&self, status: u16, method: Method, path: &str, message: &str) -> DriverError {
        DriverError::Http {
            status: Some(status),
            method: method.as_str().to_string(),
            url: format!("http://fake-node/{}", path),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Net for FakeNode {
    async fn http(&self, method: Method, path: &str, params: HttpParams) -> DriverResult<Value> {
        self.requests.lock().unwrap().push(Request {
            method,
            path: path.to_string(),
            params: params.clone(),
        });

        match (method, path) {
            (Method::Get, "blocks/0") => Ok(block(self.genesis_id, 0, 1_530_316_800)),
            (Method::Get, "blocks/best") => Ok(self.best.lock().unwrap().clone()),
            (Method::Post, "accounts/*") => {
                let clauses = params
                    .body
                    .as_ref()
                    .and_then(|b| b["clauses"].as_array().map(|c| c.len()))
                    .unwrap_or(0);
                let gas = *self.exec_gas.lock().unwrap();
                let outputs: Vec<Value> = (0..clauses)
                    .map(|_| json!({ "gasUsed": gas, "reverted": false, "vmError": "" }))
                    .collect();
                Ok(Value::Array(outputs))
            }
            (Method::Post, "transactions") => {
                if let Some((status, body)) = self.reject.lock().unwrap().clone() {
                    return Err(self.error(status, method, path, &body));
                }
                let raw = params
                    .body
                    .as_ref()
                    .and_then(|b| b["raw"].as_str())
                    .ok_or_else(|| self.error(400, method, path, "missing raw"))?;
                let tx = Transaction::decode(&parse_hex(raw)?)?;
                let id = tx
                    .id()?
                    .ok_or_else(|| self.error(400, method, path, "unsigned tx"))?;
                Ok(json!({ "id": to_hex(id.as_bytes()) }))
            }
            _ => Err(self.error(404, method, path, "not found")),
        }
    }
}
