//! Dry-run gas and storage estimation.
//!
//! limits = sum over the operation result and its internal results of
//! - gas: ceil(consumed_milligas / 1000), plus a fixed buffer
//! - storage: paid_storage_size_diff + 257 per allocated or originated contract

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tzmeta_codec::CallParameters;
use tzmeta_types::{MetaTxError, Result};

use crate::{LedgerNode, TransferSimulation};

pub const GAS_BUFFER: u64 = 100;
pub const ORIGINATION_SIZE: u64 = 257;

/// Signer used only to run simulations.
///
/// It reports the source address and nothing else; it has no way to sign, so
/// a simulation can never leak into a real submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationSigner {
    public_key_hash: String,
}

impl SimulationSigner {
    pub fn new(public_key_hash: &str) -> Self {
        Self { public_key_hash: public_key_hash.to_string() }
    }

    pub fn public_key_hash(&self) -> &str {
        &self.public_key_hash
    }
}

/// Gas and storage bounds for a relayed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub gas_limit: u64,
    pub storage_limit: u64,
}

/// Estimate the cost of calling `destination` from `source`.
///
/// Failures propagate as-is; they usually mean the call itself is invalid.
pub async fn estimate_gas(
    node: &dyn LedgerNode,
    source: &str,
    amount: &str,
    destination: &str,
    parameters: Option<&CallParameters>,
) -> Result<GasEstimate> {
    let amount: u64 = amount
        .trim()
        .parse()
        .map_err(|_| MetaTxError::MalformedValue(format!("invalid amount: {:?}", amount)))?;
    let signer = SimulationSigner::new(source);
    let transfer = TransferSimulation {
        amount,
        destination: destination.to_string(),
        parameters: parameters.cloned(),
    };
    let estimate = node.simulate_transfer(&signer, &transfer).await?;
    tracing::debug!(
        destination,
        gas_limit = estimate.gas_limit,
        storage_limit = estimate.storage_limit,
        "estimated operation cost"
    );
    Ok(estimate)
}

fn as_u64(v: &Value) -> u64 {
    match v {
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

struct Usage {
    milligas: u64,
    storage: u64,
}

fn usage_of(result: &Value) -> Result<Usage> {
    let status = result["status"].as_str().unwrap_or("unknown");
    if status != "applied" {
        let errors = result.get("errors").cloned().unwrap_or(Value::Null);
        return Err(MetaTxError::GasEstimation(format!("simulation {}: {}", status, errors)));
    }

    let milligas = match result.get("consumed_milligas") {
        Some(v) => as_u64(v),
        None => as_u64(&result["consumed_gas"]) * 1000,
    };
    let mut storage = as_u64(&result["paid_storage_size_diff"]);
    if result["allocated_destination_contract"].as_bool().unwrap_or(false) {
        storage += ORIGINATION_SIZE;
    }
    if let Some(originated) = result["originated_contracts"].as_array() {
        storage += ORIGINATION_SIZE * originated.len() as u64;
    }
    Ok(Usage { milligas, storage })
}

/// Turn a `run_operation` response into limits for its first content.
pub fn limits_from_run_operation(response: &Value) -> Result<GasEstimate> {
    let metadata = &response["contents"][0]["metadata"];
    let main = metadata
        .get("operation_result")
        .ok_or_else(|| MetaTxError::GasEstimation(format!("unexpected simulation response: {}", response)))?;

    let mut total = usage_of(main)?;
    if let Some(internals) = metadata["internal_operation_results"].as_array() {
        for internal in internals {
            let usage = usage_of(&internal["result"])?;
            total.milligas += usage.milligas;
            total.storage += usage.storage;
        }
    }

    Ok(GasEstimate {
        gas_limit: total.milligas.div_ceil(1000) + GAS_BUFFER,
        storage_limit: total.storage,
    })
}
