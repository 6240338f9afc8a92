//! reqwest-backed node transport

use super::{HttpParams, Method, Net};
use crate::error::{DriverError, DriverResult};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const MAX_ERROR_BODY_CHARS: usize = 50;

/// HTTP transport rooted at a node base URL
#[derive(Debug, Clone)]
pub struct HttpNet {
    base_url: Url,
    client: Client,
}

impl HttpNet {
    /// Create a transport for `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> DriverResult<Self> {
        // Url::join drops the last segment unless the base ends with '/'
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&base_url)
            .map_err(|e| DriverError::Config(format!("Invalid node URL '{}': {}", base_url, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DriverError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, path: &str) -> DriverResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DriverError::Config(format!("Invalid request path '{}': {}", path, e)))
    }
}

#[async_trait]
impl Net for HttpNet {
    async fn http(&self, method: Method, path: &str, params: HttpParams) -> DriverResult<Value> {
        let url = self.resolve(path)?;
        let transport_error = |status: Option<u16>, message: String| DriverError::Http {
            status,
            method: method.as_str().to_string(),
            url: url.to_string(),
            message,
        };

        let mut request = match method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
        };
        for (name, value) in &params.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !params.query.is_empty() {
            request = request.query(&params.query);
        }
        if let Some(body) = &params.body {
            request = request.json(body);
        }

        debug!("{} {}", method.as_str(), url);
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(transport_error(Some(status.as_u16()), truncate_body(&text)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(Some(status.as_u16()), e.to_string()))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| DriverError::UnexpectedResponse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

/// Trim a response body and cap it for error messages
fn truncate_body(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > MAX_ERROR_BODY_CHARS {
        let head: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
