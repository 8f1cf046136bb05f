//! Ledger node access for the meta-transaction flow.
//!
//! - `counter`: replay-protection counter lookup in `%user_store`
//! - `estimate`: dry-run gas/storage estimation with a simulation-only signer
//! - `rpc_client`: HTTP implementation of [`LedgerNode`]

pub mod counter;
pub mod estimate;
pub mod rpc_client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tzmeta_codec::CallParameters;
use tzmeta_types::{Hex, Result};

pub use counter::{get_user_counter, CounterResolution};
pub use estimate::{estimate_gas, GasEstimate, SimulationSigner};
pub use rpc_client::TezosRpcClient;

/// Node client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub request_timeout_ms: u64,
    pub confirmation_poll_ms: u64,
    pub confirmation_max_blocks: u32,
    /// Blocks behind the head scanned first; the operation may already be in.
    pub confirmation_lookback: u32,
    /// Head polls before the inclusion wait gives up.
    pub confirmation_max_polls: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            confirmation_poll_ms: 5_000,
            confirmation_max_blocks: 10,
            confirmation_lookback: 3,
            confirmation_max_polls: 60,
        }
    }
}

/// Transfer to simulate against the node.
#[derive(Debug, Clone)]
pub struct TransferSimulation {
    /// Amount in mutez.
    pub amount: u64,
    pub destination: String,
    pub parameters: Option<CallParameters>,
}

/// Where an operation ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionReceipt {
    pub operation_hash: Hex,
    pub block_hash: Hex,
    pub level: u64,
}

/// Read-side view of the ledger.
#[async_trait]
pub trait LedgerNode: Send + Sync {
    /// Look up `key` in the big map stored under the `%field` annotation of
    /// the contract storage. `Ok(None)` means the key is absent.
    async fn get_big_map_value(
        &self,
        contract: &str,
        field: &str,
        key: &str,
    ) -> Result<Option<tzmeta_codec::MichelsonValue>>;

    /// Dry-run a transfer; the signer only supplies the source address.
    async fn simulate_transfer(
        &self,
        signer: &SimulationSigner,
        transfer: &TransferSimulation,
    ) -> Result<GasEstimate>;

    /// Block until the operation is seen in a block.
    async fn wait_for_inclusion(&self, operation_hash: &str) -> Result<InclusionReceipt>;
}
