use serde::{Deserialize, Serialize};
use tzmeta_node::NodeConfig;
use tzmeta_relay::PollConfig;
use tzmeta_types::{ChainContext, MetaTxError, NetworkType, Result};

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    /// Version segment of the dashboard endpoints (`/api/{version}/dapp`).
    pub api_version: String,
    pub network: NetworkType,
    /// Treat a dapp without registered contracts as not ready.
    pub strict_mode: bool,
    pub request_timeout_ms: u64,
    pub poll: PollConfig,
    pub node: NodeConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.biconomy.io".to_string(),
            api_version: "v1".to_string(),
            network: NetworkType::default(),
            strict_mode: false,
            request_timeout_ms: 30_000,
            poll: PollConfig::default(),
            node: NodeConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: &str, network: NetworkType) -> Self {
        Self {
            api_key: api_key.to_string(),
            network,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MetaTxError::Other(format!("invalid client config: {}", e)))?;
        if config.api_key.is_empty() {
            return Err(MetaTxError::Other("invalid client config: api_key is required".into()));
        }
        Ok(config)
    }

    pub fn chain_context(&self) -> ChainContext {
        ChainContext::for_network(&self.network)
    }
}
