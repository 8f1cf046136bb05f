//! HTTP client for the ledger node RPC.
//!
//! Endpoints:
//! - GET /chains/main/blocks/head/context/contracts/{address}/script
//! - GET /chains/main/blocks/head/context/big_maps/{id}/{expr_hash}
//! - GET /chains/main/blocks/head/context/contracts/{address}/counter
//! - GET /chains/main/blocks/head/header
//! - GET /chains/main/blocks/{level}/operation_hashes
//! - POST /chains/main/blocks/head/helpers/scripts/run_operation

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tzmeta_codec::base58::{encode_address, script_expr_hash};
use tzmeta_codec::{pack_value, MichelsonValue};
use tzmeta_types::{ChainContext, MetaTxError, Result};

use crate::estimate::limits_from_run_operation;
use crate::{GasEstimate, InclusionReceipt, LedgerNode, NodeConfig, SimulationSigner, TransferSimulation};

/// Placeholder signature accepted by `run_operation`, which skips signature checks.
const SIMULATION_SIGNATURE: &str =
    "sigUHx32f9wesZ1n2BWpixXz4AQaZggEtchaQNHYGRCoWNAXx45WGW2ua3apUUUAGMLPwAU41QoaFCzVSL61VaessLg4YbbP";
const HARD_GAS_LIMIT_PER_OPERATION: u64 = 1_040_000;
const HARD_STORAGE_LIMIT_PER_OPERATION: u64 = 60_000;

/// Contract code and current storage.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractScript {
    pub code: Vec<MichelsonValue>,
    pub storage: MichelsonValue,
}

impl ContractScript {
    /// Storage type declared by the `storage` section of the code.
    pub fn storage_type(&self) -> Option<&MichelsonValue> {
        self.code
            .iter()
            .find(|section| section.prim_name() == Some("storage"))
            .and_then(|section| section.args().first())
    }
}

/// A big map found inside a contract storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigMapRef {
    pub id: String,
    pub key_type: MichelsonValue,
}

#[derive(Debug, Clone, Deserialize)]
struct BlockHeader {
    hash: String,
    level: u64,
}

/// Split a comb (`pair a b c` == `pair a (pair b c)`) into head and tail.
fn comb_split(node: &MichelsonValue, prim: &str) -> Option<(MichelsonValue, MichelsonValue)> {
    let items: &[MichelsonValue] = match node {
        MichelsonValue::Prim { prim: p, args, .. } if p == prim => args,
        MichelsonValue::Seq(items) => items,
        _ => return None,
    };
    match items.len() {
        0 | 1 => None,
        2 => Some((items[0].clone(), items[1].clone())),
        _ => Some((items[0].clone(), MichelsonValue::prim(prim, items[1..].to_vec()))),
    }
}

/// Walk storage type and value in lockstep to find the big map annotated `%field`.
pub fn find_big_map(
    storage_type: &MichelsonValue,
    storage: &MichelsonValue,
    field: &str,
) -> Option<BigMapRef> {
    let annot = format!("%{}", field);
    if storage_type.prim_name() == Some("big_map") && storage_type.has_annot(&annot) {
        let key_type = storage_type.args().first()?.clone();
        return storage.as_int().map(|id| BigMapRef { id: id.to_string(), key_type });
    }
    if storage_type.prim_name() == Some("pair") {
        let (ty_left, ty_right) = comb_split(storage_type, "pair")?;
        let (val_left, val_right) = comb_split(storage, "Pair")?;
        return find_big_map(&ty_left, &val_left, field)
            .or_else(|| find_big_map(&ty_right, &val_right, field));
    }
    None
}

/// Micheline form of a big map key given its declared type.
pub fn key_for_type(key_type: &MichelsonValue, key: &str) -> Result<MichelsonValue> {
    match key_type.prim_name() {
        Some("address") => Ok(MichelsonValue::bytes(&encode_address(key)?)),
        Some("key_hash") => {
            let encoded = encode_address(key)?;
            if encoded[0] != 0x00 {
                return Err(MetaTxError::MalformedValue(format!("{} is not an implicit account", key)));
            }
            Ok(MichelsonValue::bytes(&encoded[1..]))
        }
        Some("string") => Ok(MichelsonValue::string(key)),
        other => Err(MetaTxError::MalformedValue(format!(
            "unsupported big map key type: {:?}",
            other
        ))),
    }
}

/// Ledger node RPC client.
pub struct TezosRpcClient {
    chain: ChainContext,
    client: reqwest::Client,
    config: NodeConfig,
}

impl TezosRpcClient {
    pub fn new(chain: ChainContext, config: NodeConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(config.request_timeout_ms))
                .build()
                .unwrap_or_default(),
            chain,
            config,
        }
    }

    pub fn chain(&self) -> &ChainContext {
        &self.chain
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.chain.rpc_endpoint, path)
    }

    /// GET returning `None` on 404.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MetaTxError::Http(format!("node request failed: {}", e)))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MetaTxError::Http(format!("node returned status {} for {}: {}", status, path, body)));
        }

        let body = resp
            .json()
            .await
            .map_err(|e| MetaTxError::Http(format!("failed to parse node response: {}", e)))?;
        Ok(Some(body))
    }

    async fn get_required<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_json(path)
            .await?
            .ok_or_else(|| MetaTxError::Http(format!("node returned 404 for {}", path)))
    }

    pub async fn get_script(&self, contract: &str) -> Result<ContractScript> {
        self.get_required(&format!("/chains/main/blocks/head/context/contracts/{}/script", contract))
            .await
    }

    async fn head_header(&self) -> Result<BlockHeader> {
        self.get_required("/chains/main/blocks/head/header").await
    }

    async fn operation_hashes(&self, level: u64) -> Result<Vec<Vec<String>>> {
        Ok(self
            .get_json(&format!("/chains/main/blocks/{}/operation_hashes", level))
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl LedgerNode for TezosRpcClient {
    async fn get_big_map_value(
        &self,
        contract: &str,
        field: &str,
        key: &str,
    ) -> Result<Option<MichelsonValue>> {
        let script = self.get_script(contract).await?;
        let storage_type = script
            .storage_type()
            .ok_or_else(|| MetaTxError::MalformedValue(format!("{} has no storage section", contract)))?;
        let big_map = find_big_map(storage_type, &script.storage, field).ok_or_else(|| {
            MetaTxError::MalformedValue(format!("{} storage has no big_map %{}", contract, field))
        })?;

        let packed = pack_value(&key_for_type(&big_map.key_type, key)?)?;
        let expr = script_expr_hash(&packed);
        tracing::debug!(contract, big_map = %big_map.id, %expr, "big map lookup");

        self.get_json(&format!("/chains/main/blocks/head/context/big_maps/{}/{}", big_map.id, expr))
            .await
    }

    async fn simulate_transfer(
        &self,
        signer: &SimulationSigner,
        transfer: &TransferSimulation,
    ) -> Result<GasEstimate> {
        let source = signer.public_key_hash();
        let branch: String = self.get_required("/chains/main/blocks/head/hash").await?;
        let counter: String = self
            .get_required(&format!("/chains/main/blocks/head/context/contracts/{}/counter", source))
            .await?;
        let counter: u64 = counter
            .parse()
            .map_err(|_| MetaTxError::GasEstimation(format!("invalid source counter: {}", counter)))?;

        let mut content = json!({
            "kind": "transaction",
            "source": source,
            "fee": "0",
            "counter": (counter + 1).to_string(),
            "gas_limit": HARD_GAS_LIMIT_PER_OPERATION.to_string(),
            "storage_limit": HARD_STORAGE_LIMIT_PER_OPERATION.to_string(),
            "amount": transfer.amount.to_string(),
            "destination": transfer.destination,
        });
        if let Some(parameters) = &transfer.parameters {
            content["parameters"] = serde_json::to_value(parameters)
                .map_err(|e| MetaTxError::MalformedValue(e.to_string()))?;
        }
        let body = json!({
            "operation": {
                "branch": branch,
                "contents": [content],
                "signature": SIMULATION_SIGNATURE,
            },
            "chain_id": self.chain.network_id,
        });

        let url = self.url("/chains/main/blocks/head/helpers/scripts/run_operation");
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MetaTxError::GasEstimation(format!("node request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MetaTxError::GasEstimation(format!("node returned status {}: {}", status, body)));
        }

        let result: Value = resp
            .json()
            .await
            .map_err(|e| MetaTxError::GasEstimation(format!("failed to parse simulation: {}", e)))?;
        limits_from_run_operation(&result)
    }

    async fn wait_for_inclusion(&self, operation_hash: &str) -> Result<InclusionReceipt> {
        let head_level = self.head_header().await?.level;
        let (mut next, last) = scan_window(
            head_level,
            self.config.confirmation_lookback,
            self.config.confirmation_max_blocks,
        );

        for poll in 0..=self.config.confirmation_max_polls {
            let head = self.head_header().await?;
            while next <= head.level.min(last) {
                let passes = self.operation_hashes(next).await?;
                if passes.iter().flatten().any(|h| h == operation_hash) {
                    let block_hash = if next == head.level {
                        head.hash.clone()
                    } else {
                        self.get_required(&format!("/chains/main/blocks/{}/hash", next)).await?
                    };
                    tracing::info!(operation = operation_hash, level = next, "operation included");
                    return Ok(InclusionReceipt {
                        operation_hash: operation_hash.to_string(),
                        block_hash,
                        level: next,
                    });
                }
                next += 1;
            }
            if next > last || poll == self.config.confirmation_max_polls {
                break;
            }
            tokio::time::sleep(Duration::from_millis(self.config.confirmation_poll_ms)).await;
        }

        tracing::warn!(operation = operation_hash, scanned_to = next, "operation not seen before timeout");
        Err(MetaTxError::InclusionTimeout {
            operation_hash: operation_hash.to_string(),
            blocks: self.config.confirmation_max_blocks,
        })
    }
}

/// Inclusive block range to scan for an operation, given the head level when
/// the wait started.
pub(crate) fn scan_window(head_level: u64, lookback: u32, max_blocks: u32) -> (u64, u64) {
    (head_level.saturating_sub(lookback as u64), head_level + max_blocks as u64)
}
