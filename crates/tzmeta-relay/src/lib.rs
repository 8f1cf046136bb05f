//! Relay request builder and client.
//!
//! - Build the signed relay payload
//! - Submit to the relay service
//! - Poll for the operation hash

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tzmeta_codec::CallParameters;
use tzmeta_node::GasEstimate;
use tzmeta_types::{Hex, MetaTxError, Result};

pub mod registry;
pub mod relay_client;

pub use registry::{DappRegistry, DappResponse, MetaApisResponse, SmartContractsResponse};
pub use relay_client::RelayClient;

/// The only method type the native relay accepts from this SDK.
pub const METHOD_TYPE_WRITE: &str = "write";

/// Signed relay payload for `POST /api/v2/meta-tx/native`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// JSON of the entrypoint parameters with the signature spliced in.
    pub params: String,
    /// Signer public key.
    pub from: String,
    pub gas_limit: u64,
    pub storage_limit: u64,
    pub to: String,
    pub method_type: String,
    pub amount: u64,
    pub api_id: String,
    pub network_id: String,
    pub dapp_id: String,
}

/// Routing identifiers attached to every relay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRouting {
    pub network_id: String,
    pub dapp_id: String,
    pub api_id: String,
}

/// Relay-side result once the operation is injected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub operation_hash: Hex,
    #[serde(default, deserialize_with = "string_or_number_opt")]
    pub counter: Option<String>,
}

/// Status polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval_ms: 2_000,
        }
    }
}

/// Relay backend API. Every call carries the API key explicitly.
#[async_trait]
pub trait RelayApi: Send + Sync {
    async fn get_dapp(&self, api_key: &str) -> Result<DappResponse>;
    async fn get_smart_contracts(&self, api_key: &str) -> Result<SmartContractsResponse>;
    async fn get_meta_apis(&self, api_key: &str) -> Result<MetaApisResponse>;

    /// Submit a signed request; returns the relay-assigned request id.
    async fn submit(&self, api_key: &str, request: &RelayRequest) -> Result<String>;

    /// `Ok(None)` while the relay has not produced an operation hash yet.
    async fn get_status(
        &self,
        api_key: &str,
        request_id: &str,
        network_id: &str,
    ) -> Result<Option<RelayStatus>>;
}

/// Assemble the relay payload for one signed operation.
pub fn build_relay_request(
    parameters: &CallParameters,
    public_key: &str,
    estimate: &GasEstimate,
    destination: &str,
    amount: &str,
    routing: &RelayRouting,
) -> Result<RelayRequest> {
    let params = serde_json::to_string(parameters)
        .map_err(|e| MetaTxError::MalformedValue(format!("cannot serialize parameters: {}", e)))?;
    let amount = amount
        .trim()
        .parse()
        .map_err(|_| MetaTxError::MalformedValue(format!("invalid amount: {:?}", amount)))?;

    Ok(RelayRequest {
        params,
        from: public_key.to_string(),
        gas_limit: estimate.gas_limit,
        storage_limit: estimate.storage_limit,
        to: destination.to_string(),
        method_type: METHOD_TYPE_WRITE.to_string(),
        amount,
        api_id: routing.api_id.clone(),
        network_id: routing.network_id.clone(),
        dapp_id: routing.dapp_id.clone(),
    })
}

/// Poll the relay until the request has an operation hash.
///
/// Failed queries and "not yet processed" answers are retried alike; the
/// loop sleeps `interval` between attempts but not after the last one.
pub async fn get_transaction_hash(
    relay: &dyn RelayApi,
    api_key: &str,
    request_id: &str,
    network_id: &str,
    max_attempts: u32,
    interval: Duration,
) -> Result<RelayStatus> {
    for attempt in 0..max_attempts {
        match relay.get_status(api_key, request_id, network_id).await {
            Ok(Some(status)) => {
                tracing::info!(request_id, operation = %status.operation_hash, "relay request processed");
                return Ok(status);
            }
            Ok(None) => tracing::debug!(request_id, attempt, "request not yet processed"),
            Err(e) => tracing::debug!(request_id, attempt, error = %e, "status query failed"),
        }
        if attempt + 1 < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(MetaTxError::ConfirmationTimeout {
        request_id: request_id.to_string(),
        attempts: max_attempts,
    })
}

/// Accepts `"7"`, `7` or null.
pub(crate) fn string_or_number_opt<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
