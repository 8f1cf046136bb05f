use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowercase hex string without a `0x` prefix (the form wallets sign).
pub type Hex = String;

/// Tezos SDK error types.
#[derive(Debug, Error)]
pub enum MetaTxError {
    #[error("no active account")]
    NoActiveAccount,

    #[error("not enough permissions to sign")]
    InsufficientPermission,

    #[error("malformed value: {0}")]
    MalformedValue(String),

    #[error("signing request rejected by wallet: {0}")]
    SigningRejected(String),

    #[error("counter resolution failed: {0}")]
    CounterResolution(String),

    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("relay returned status {status}: {body}")]
    RelaySubmission { status: u16, body: String },

    #[error("cannot get operation hash for request {request_id} after {attempts} attempts")]
    ConfirmationTimeout { request_id: String, attempts: u32 },

    #[error("operation {operation_hash} not included within {blocks} blocks")]
    InclusionTimeout { operation_hash: String, blocks: u32 },

    #[error("dapp registry error: {0}")]
    DappRegistry(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("http request failed: {0}")]
    Http(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0} event is not supported")]
    EventNotSupported(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, MetaTxError>;

/// Base58 chain identifiers of the public networks.
pub mod chain_ids {
    pub const MAINNET: &str = "NetXdQprcVkpaWU";
    pub const FLORENCENET: &str = "NetXxkAx4woPLyu";
    pub const DELPHINET: &str = "NetXm8tYqnMWky1";
}

/// Network selector used by client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Florencenet,
    Delphinet,
    Custom { network_id: String, rpc_endpoint: String },
}

impl Default for NetworkType {
    fn default() -> Self {
        NetworkType::Delphinet
    }
}

/// Chain context, fixed for the lifetime of a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContext {
    /// Base58 chain id (`Net...`).
    pub network_id: String,
    pub rpc_endpoint: String,
}

impl ChainContext {
    pub fn new(network_id: &str, rpc_endpoint: &str) -> Self {
        Self {
            network_id: network_id.to_string(),
            rpc_endpoint: rpc_endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a network selector against the built-in network table.
    pub fn for_network(network: &NetworkType) -> Self {
        match network {
            NetworkType::Mainnet => Self::new(chain_ids::MAINNET, "https://api.tez.ie/rpc/mainnet"),
            NetworkType::Florencenet => {
                Self::new(chain_ids::FLORENCENET, "https://florencenet.smartpy.io")
            }
            NetworkType::Delphinet => Self::new(chain_ids::DELPHINET, "https://delphinet.smartpy.io"),
            NetworkType::Custom { network_id, rpc_endpoint } => Self::new(network_id, rpc_endpoint),
        }
    }
}

/// Parse a hex string (optionally `0x`-prefixed) into bytes.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str).map_err(|e| MetaTxError::InvalidHex(e.to_string()))
}

/// Convert bytes to an unprefixed lowercase hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> Hex {
    hex::encode(bytes)
}
