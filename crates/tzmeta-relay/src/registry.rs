//! Dapp registry as served by the relay dashboard.
//!
//! - `/dapp`: dapp id and network for the API key
//! - `/smart-contract`: registered contracts and their entrypoints
//! - `/meta-api`: relay-able methods, one `apiId` per (contract, entrypoint)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tzmeta_types::{MetaTxError, Result};

use crate::string_or_number_opt;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DappInfo {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "string_or_number_opt")]
    pub network_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DappResponse {
    pub dapp: Option<DappInfo>,
    pub log: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartContract {
    pub address: String,
    #[serde(default)]
    pub entry_points: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartContractsResponse {
    #[serde(default)]
    pub smart_contracts: Vec<SmartContract>,
    pub flag: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaApi {
    pub id: String,
    pub contract_address: Option<String>,
    pub method: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaApisResponse {
    #[serde(default)]
    pub list_apis: Vec<MetaApi>,
}

/// Registry data loaded at client initialization.
#[derive(Debug, Clone, Default)]
pub struct DappRegistry {
    pub dapp_id: Option<String>,
    pub network_id: Option<String>,
    entry_points: HashMap<String, serde_json::Value>,
    apis: HashMap<String, HashMap<String, MetaApi>>,
}

/// Registry lookups are case-insensitive on the contract address.
fn contract_key(address: &str) -> String {
    address.to_lowercase()
}

impl DappRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dapp(&mut self, dapp: &DappInfo) {
        self.dapp_id = Some(dapp.id.clone());
        self.network_id = dapp.network_id.clone();
    }

    /// Returns the number of contracts registered.
    pub fn load_contracts(&mut self, contracts: &[SmartContract]) -> usize {
        for contract in contracts {
            self.entry_points
                .insert(contract_key(&contract.address), contract.entry_points.clone());
        }
        contracts.len()
    }

    /// Index relay-able methods. An entry without a contract address is
    /// reported as an error; the remaining entries are still indexed.
    pub fn load_apis(&mut self, apis: &[MetaApi]) -> Result<()> {
        let mut missing = 0usize;
        for api in apis {
            match &api.contract_address {
                Some(address) => {
                    self.apis
                        .entry(contract_key(address))
                        .or_default()
                        .insert(api.method.clone(), api.clone());
                }
                None => missing += 1,
            }
        }
        if missing > 0 {
            return Err(MetaTxError::DappRegistry(format!(
                "{} meta api entries have no contract address",
                missing
            )));
        }
        Ok(())
    }

    pub fn has_contract(&self, address: &str) -> bool {
        self.entry_points.contains_key(&contract_key(address))
    }

    pub fn contract_count(&self) -> usize {
        self.entry_points.len()
    }

    /// `apiId` registered for calling `entrypoint` on `contract`.
    pub fn api_id(&self, contract: &str, entrypoint: &str) -> Result<&str> {
        self.apis
            .get(&contract_key(contract))
            .and_then(|methods| methods.get(entrypoint))
            .map(|api| api.id.as_str())
            .ok_or_else(|| {
                MetaTxError::DappRegistry(format!(
                    "no meta api registered for {} on {}",
                    entrypoint, contract
                ))
            })
    }
}
