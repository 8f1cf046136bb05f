//! Native meta-transaction client.
//!
//! `MetaTxClient` ties the wallet, the ledger node and the relay together:
//! - `initialize`: load the dapp registry and report readiness through events
//! - `request_operation`: route through the relay or straight to the wallet
//! - `request_meta_transaction`: sign, estimate, submit each operation
//! - `get_transaction_hash` / `confirm_operation`: follow a relayed request

pub mod config;
pub mod events;
pub mod signing;
pub mod wallet;

#[cfg(test)]
mod testing;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tzmeta_node::{estimate_gas, GasEstimate, InclusionReceipt, LedgerNode, TezosRpcClient};
use tzmeta_relay::{build_relay_request, DappRegistry, RelayApi, RelayClient, RelayRouting, RelayStatus};
use tzmeta_store::StorageAdapter;
use tzmeta_types::{ChainContext, MetaTxError, Result};
use tzmeta_codec::CallParameters;

pub use config::ClientConfig;
pub use events::{response_codes, ErrorPayload, EventHandler, EventKind, EventRegistry, SdkEvent};
pub use signing::{request_meta_transaction_signature, SignedOperation, SignedOperations};
pub use wallet::{
    AccountInfo, OperationRequest, OperationResponse, Permission, SignOutcome, SignPayloadRequest,
    SigningType, TransactionOperation, Wallet,
};

/// Readiness of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    Init,
    Ready,
    /// Strict mode and the dapp has no registered contracts.
    NoData,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Init => "init",
            ClientStatus::Ready => "biconomy_ready",
            ClientStatus::NoData => "no_data",
        }
    }
}

/// Relay request ids for a submitted batch, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTxReceipt {
    pub sender_id: String,
    pub request_ids: Vec<String>,
}

/// How `request_operation` was carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Relayed(MetaTxReceipt),
    /// Meta transactions disabled; the wallet injected the operation itself.
    Direct(OperationResponse),
}

struct ClientState {
    status: ClientStatus,
    registry: DappRegistry,
}

pub struct MetaTxClient {
    config: ClientConfig,
    chain: ChainContext,
    wallet: Arc<dyn Wallet>,
    storage: Arc<dyn StorageAdapter>,
    node: Arc<dyn LedgerNode>,
    relay: Arc<dyn RelayApi>,
    events: EventRegistry,
    state: RwLock<ClientState>,
}

impl MetaTxClient {
    /// Build a client and switch the meta-transaction toggle on.
    pub async fn new(
        config: ClientConfig,
        wallet: Arc<dyn Wallet>,
        storage: Arc<dyn StorageAdapter>,
        node: Arc<dyn LedgerNode>,
        relay: Arc<dyn RelayApi>,
    ) -> Result<Self> {
        tzmeta_store::set_meta_tx_enabled(storage.as_ref(), true).await?;
        let chain = config.chain_context();
        Ok(Self {
            config,
            chain,
            wallet,
            storage,
            node,
            relay,
            events: EventRegistry::new(),
            state: RwLock::new(ClientState {
                status: ClientStatus::Init,
                registry: DappRegistry::new(),
            }),
        })
    }

    /// Client backed by the HTTP node and relay clients built from `config`.
    pub async fn connect(
        config: ClientConfig,
        wallet: Arc<dyn Wallet>,
        storage: Arc<dyn StorageAdapter>,
    ) -> Result<Self> {
        let node = TezosRpcClient::new(config.chain_context(), config.node.clone());
        let relay = RelayClient::new(
            &config.base_url,
            &config.api_version,
            Some(config.request_timeout_ms),
        );
        Self::new(config, wallet, storage, Arc::new(node), Arc::new(relay)).await
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ClientState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ClientState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn chain(&self) -> &ChainContext {
        &self.chain
    }

    pub fn status(&self) -> ClientStatus {
        self.read_state().status
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ClientStatus::Ready
    }

    /// Subscribe to `biconomy_ready`, `biconomy_error` or `login_confirmation`.
    pub fn on_event(&self, kind: EventKind, handler: EventHandler) -> Result<&Self> {
        self.events.subscribe(kind, handler)?;
        Ok(self)
    }

    /// Load dapp, contracts and meta APIs from the dashboard.
    ///
    /// Failures are reported on the event channel; the returned status is
    /// `Init` if loading stopped early.
    pub async fn initialize(&self) -> ClientStatus {
        self.events.reset_lifecycle();
        {
            let mut state = self.write_state();
            state.status = ClientStatus::Init;
            state.registry = DappRegistry::new();
        }

        if let Err(e) = self.load_registry().await {
            tracing::warn!(error = %e, "initialization failed");
            self.emit_error(ErrorPayload::new(
                response_codes::ERROR_RESPONSE,
                format!("error while initializing: {}", e),
            ));
        }
        self.status()
    }

    async fn load_registry(&self) -> Result<()> {
        let api_key = &self.config.api_key;

        let dapp_response = self.relay.get_dapp(api_key).await?;
        let Some(dapp) = dapp_response.dapp else {
            let payload = match dapp_response.log {
                Some(log) => ErrorPayload::new(response_codes::ERROR_RESPONSE, log),
                None => ErrorPayload::new(
                    response_codes::DAPP_NOT_FOUND,
                    "no dapp registered for this api key",
                ),
            };
            self.emit_error(payload);
            return Ok(());
        };
        tracing::info!(dapp_id = %dapp.id, network_id = ?dapp.network_id, "dapp loaded");
        self.write_state().registry.set_dapp(&dapp);

        let contracts = self.relay.get_smart_contracts(api_key).await?;
        let count = self.write_state().registry.load_contracts(&contracts.smart_contracts);
        if count == 0 && self.config.strict_mode {
            self.write_state().status = ClientStatus::NoData;
            self.emit_error(ErrorPayload::new(
                response_codes::SMART_CONTRACT_NOT_FOUND,
                format!("no smart contract registered for dapp {}", dapp.id),
            ));
            return Ok(());
        }
        self.events.emit(SdkEvent::SmartContractDataReady { dapp_id: dapp.id.clone() });

        let apis = self.relay.get_meta_apis(api_key).await?;
        let loaded = self.write_state().registry.load_apis(&apis.list_apis);
        if let Err(e) = loaded {
            self.emit_error(ErrorPayload::from_error(&e));
        }
        self.events.emit(SdkEvent::DappApiDataReady { api_count: apis.list_apis.len() });

        self.write_state().status = ClientStatus::Ready;
        tracing::info!(contracts = count, apis = apis.list_apis.len(), "client ready");
        self.events.emit(SdkEvent::Ready);
        Ok(())
    }

    fn emit_error(&self, payload: ErrorPayload) {
        tracing::warn!(code = %payload.code, message = %payload.message, "client error");
        self.events.emit(SdkEvent::Error(payload));
    }

    pub async fn is_meta_tx_enabled(&self) -> Result<bool> {
        tzmeta_store::is_meta_tx_enabled(self.storage.as_ref()).await
    }

    /// Flip the toggle; returns the new state.
    pub async fn toggle_meta_tx_status(&self) -> Result<bool> {
        tzmeta_store::toggle_meta_tx_status(self.storage.as_ref()).await
    }

    /// Send operations through the relay when the toggle is on, otherwise
    /// hand the unmodified request to the wallet.
    pub async fn request_operation(&self, request: &OperationRequest) -> Result<OperationOutcome> {
        if self.is_meta_tx_enabled().await? {
            let receipt = self.request_meta_transaction(request).await?;
            return Ok(OperationOutcome::Relayed(receipt));
        }
        tracing::debug!("meta transactions disabled, forwarding to wallet");
        let response = self.wallet.request_operation(request).await?;
        Ok(OperationOutcome::Direct(response))
    }

    pub async fn request_meta_transaction_signature(
        &self,
        request: &OperationRequest,
    ) -> Result<SignedOperations> {
        signing::request_meta_transaction_signature(
            self.wallet.as_ref(),
            self.node.as_ref(),
            &self.chain,
            request,
        )
        .await
    }

    /// Sign the batch, then estimate and submit each signed operation in order.
    pub async fn request_meta_transaction(&self, request: &OperationRequest) -> Result<MetaTxReceipt> {
        let signed = self.request_meta_transaction_signature(request).await?;
        let routes = self.routes_for(&signed.operations)?;

        let mut request_ids = Vec::with_capacity(signed.operations.len());
        for (operation, routing) in signed.operations.iter().zip(&routes) {
            let estimate = self
                .estimate_gas(
                    &signed.account.address,
                    &operation.amount,
                    &operation.destination,
                    Some(&operation.parameters),
                )
                .await?;
            let relay_request = build_relay_request(
                &operation.parameters,
                &signed.account.public_key,
                &estimate,
                &operation.destination,
                &operation.amount,
                routing,
            )?;
            let request_id = self.relay.submit(&self.config.api_key, &relay_request).await?;
            request_ids.push(request_id);
        }

        Ok(MetaTxReceipt { sender_id: signed.sender_id, request_ids })
    }

    fn routes_for(&self, operations: &[SignedOperation]) -> Result<Vec<RelayRouting>> {
        let state = self.read_state();
        let dapp_id = state
            .registry
            .dapp_id
            .clone()
            .ok_or_else(|| MetaTxError::DappRegistry("client is not initialized".into()))?;

        operations
            .iter()
            .map(|operation| {
                let api_id = state
                    .registry
                    .api_id(&operation.destination, &operation.parameters.entrypoint)?;
                Ok(RelayRouting {
                    network_id: self.chain.network_id.clone(),
                    dapp_id: dapp_id.clone(),
                    api_id: api_id.to_string(),
                })
            })
            .collect()
    }

    pub async fn estimate_gas(
        &self,
        source: &str,
        amount: &str,
        destination: &str,
        parameters: Option<&CallParameters>,
    ) -> Result<GasEstimate> {
        estimate_gas(self.node.as_ref(), source, amount, destination, parameters).await
    }

    /// Poll the relay with the configured attempt budget.
    pub async fn get_transaction_hash(&self, request_id: &str) -> Result<RelayStatus> {
        tzmeta_relay::get_transaction_hash(
            self.relay.as_ref(),
            &self.config.api_key,
            request_id,
            &self.chain.network_id,
            self.config.poll.max_attempts,
            Duration::from_millis(self.config.poll.interval_ms),
        )
        .await
    }

    pub async fn confirm_operation(&self, operation_hash: &str) -> Result<InclusionReceipt> {
        self.node.wait_for_inclusion(operation_hash).await
    }
}
