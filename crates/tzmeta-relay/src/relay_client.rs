//! HTTP client for the relay service.
//!
//! Endpoints:
//! - GET /api/{version}/dapp
//! - GET /api/{version}/smart-contract
//! - GET /api/{version}/meta-api
//! - POST /api/v2/meta-tx/native
//! - GET /api/v2/meta-tx/native/status?requestId=<id>&networkId=<chain>

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tzmeta_types::{MetaTxError, Result};

use crate::{DappResponse, MetaApisResponse, RelayApi, RelayRequest, RelayStatus, SmartContractsResponse};

const API_KEY_HEADER: &str = "x-api-key";
const NATIVE_META_TX_PATH: &str = "/api/v2/meta-tx/native";

/// Relay API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayResponse<T> {
    pub result: Option<T>,
    pub code: Option<i64>,
    pub message: Option<String>,
}

/// Map a submission response to the relay request id.
///
/// 200 and 201 both count as accepted; anything else carries the body back.
pub fn parse_submit_response(status: u16, body: &str) -> Result<String> {
    if status != 200 && status != 201 {
        return Err(MetaTxError::RelaySubmission {
            status,
            body: body.to_string(),
        });
    }
    let parsed: RelayResponse<String> = serde_json::from_str(body)
        .map_err(|e| MetaTxError::Http(format!("failed to parse relay response: {}", e)))?;
    parsed.result.ok_or_else(|| MetaTxError::RelaySubmission {
        status,
        body: body.to_string(),
    })
}

/// Map the `result` of a status query to a relay status.
///
/// `result` exists but carries no (or an empty) `operationHash` until the
/// relay injects the operation; that is reported as `None`.
pub fn parse_status_result(result: Option<serde_json::Value>) -> Result<Option<RelayStatus>> {
    match result {
        Some(result)
            if result
                .get("operationHash")
                .and_then(|h| h.as_str())
                .is_some_and(|h| !h.is_empty()) =>
        {
            let status: RelayStatus = serde_json::from_value(result)
                .map_err(|e| MetaTxError::Http(format!("failed to parse relay status: {}", e)))?;
            Ok(Some(status))
        }
        _ => Ok(None),
    }
}

/// Relay client.
pub struct RelayClient {
    base_url: String,
    api_version: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(base_url: &str, api_version: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(30_000);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// GET a dashboard resource; any status other than 200 is a registry error.
    async fn get_registry<T: DeserializeOwned>(&self, api_key: &str, resource: &str) -> Result<T> {
        let url = format!("{}/api/{}/{}", self.base_url, self.api_version, resource);

        let resp = self.client
            .get(&url)
            .header(API_KEY_HEADER, api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MetaTxError::DappRegistry(format!("{} request failed: {}", resource, e)))?;

        if resp.status() != reqwest::StatusCode::OK {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MetaTxError::DappRegistry(format!(
                "{} returned status {}: {}",
                resource, status, body
            )));
        }

        resp.json()
            .await
            .map_err(|e| MetaTxError::DappRegistry(format!("failed to parse {} response: {}", resource, e)))
    }
}

#[async_trait]
impl RelayApi for RelayClient {
    async fn get_dapp(&self, api_key: &str) -> Result<DappResponse> {
        self.get_registry(api_key, "dapp").await
    }

    async fn get_smart_contracts(&self, api_key: &str) -> Result<SmartContractsResponse> {
        self.get_registry(api_key, "smart-contract").await
    }

    async fn get_meta_apis(&self, api_key: &str) -> Result<MetaApisResponse> {
        self.get_registry(api_key, "meta-api").await
    }

    /// POST /api/v2/meta-tx/native
    async fn submit(&self, api_key: &str, request: &RelayRequest) -> Result<String> {
        let url = format!("{}{}", self.base_url, NATIVE_META_TX_PATH);
        tracing::info!(to = %request.to, api_id = %request.api_id, "sending meta-tx to relay");

        let resp = self.client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MetaTxError::Http(format!("relay request failed: {}", e)))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| MetaTxError::Http(format!("failed to read relay response: {}", e)))?;
        let request_id = parse_submit_response(status, &body)?;
        tracing::info!(%request_id, "relay accepted request");
        Ok(request_id)
    }

    /// GET /api/v2/meta-tx/native/status?requestId=<id>&networkId=<chain>
    async fn get_status(
        &self,
        api_key: &str,
        request_id: &str,
        network_id: &str,
    ) -> Result<Option<RelayStatus>> {
        let url = format!("{}{}/status", self.base_url, NATIVE_META_TX_PATH);

        let resp = self.client
            .get(&url)
            .query(&[("requestId", request_id), ("networkId", network_id)])
            .header(API_KEY_HEADER, api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MetaTxError::Http(format!("relay request failed: {}", e)))?;

        if resp.status() != reqwest::StatusCode::OK {
            return Err(MetaTxError::Http(format!(
                "error occurred while querying for request status: {}",
                resp.status()
            )));
        }

        let body: RelayResponse<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| MetaTxError::Http(format!("failed to parse relay response: {}", e)))?;

        parse_status_result(body.result)
    }
}
