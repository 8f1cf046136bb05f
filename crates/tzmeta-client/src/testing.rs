//! In-memory collaborators for client tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tzmeta_codec::{CallParameters, MichelsonValue};
use tzmeta_node::{GasEstimate, InclusionReceipt, LedgerNode, SimulationSigner, TransferSimulation};
use tzmeta_relay::registry::{DappInfo, MetaApi, SmartContract};
use tzmeta_relay::{DappResponse, MetaApisResponse, RelayApi, RelayRequest, RelayStatus, SmartContractsResponse};
use tzmeta_types::{chain_ids, MetaTxError, Result};

use crate::wallet::{
    AccountInfo, OperationRequest, OperationResponse, Permission, SignOutcome, SignPayloadRequest,
    TransactionOperation, Wallet,
};

pub const CONTRACT: &str = "KT18g6ejmStajqDwZZ5ZwTfu1ZKzhYq5RboW";
pub const SIGNATURE: &str = "edsigtXomBKi5CTRf5cjATJWSyaRvhfYNHqSUGrn4SdbYRcGwQrUGjzEfQDTuqHhuA8b2d8NarZjz8TRf65WkpQmo423BtomS8Q";
pub const OPERATION_HASH: &str = "ooUv7JUz1jrDy9LF4ZpGt8Cfz5Zi3AcJ3itQQQEaZYE5dbiDpU2";

/// `transfer` call with an empty signature slot.
pub fn transfer_operation() -> TransactionOperation {
    TransactionOperation {
        amount: "0".into(),
        destination: CONTRACT.into(),
        parameters: Some(CallParameters {
            entrypoint: "transfer".into(),
            value: MichelsonValue::pair(
                MichelsonValue::pair(
                    MichelsonValue::string("tz1UtBceKpPt7MmUPYnNBn5E5pTCqDGMgzcA"),
                    MichelsonValue::int(100),
                ),
                MichelsonValue::pair(MichelsonValue::none(), MichelsonValue::none()),
            ),
        }),
    }
}

pub struct FakeWallet {
    pub account: AccountInfo,
    pub connected: bool,
    pub can_sign: bool,
    pub reject: bool,
    pub(crate) sign_requests: Mutex<Vec<SignPayloadRequest>>,
    pub(crate) operation_requests: Mutex<Vec<OperationRequest>>,
}

impl Default for FakeWallet {
    fn default() -> Self {
        Self {
            account: AccountInfo {
                address: "tz1UtBceKpPt7MmUPYnNBn5E5pTCqDGMgzcA".into(),
                public_key: "edpkuBknW28nW72KG6RoHtYW7p12T6GKc7nAbwYX5m8Wd9sDVC9yav".into(),
            },
            connected: true,
            can_sign: true,
            reject: false,
            sign_requests: Mutex::new(Vec::new()),
            operation_requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeWallet {
    pub fn payloads(&self) -> Vec<SignPayloadRequest> {
        self.sign_requests.lock().unwrap().clone()
    }

    pub fn direct_operations(&self) -> Vec<OperationRequest> {
        self.operation_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    async fn get_active_account(&self) -> Result<Option<AccountInfo>> {
        Ok(self.connected.then(|| self.account.clone()))
    }

    async fn check_permissions(&self, capability: Permission) -> Result<bool> {
        Ok(match capability {
            Permission::SignPayload => self.can_sign,
            Permission::OperationRequest => true,
        })
    }

    async fn request_sign_payload(&self, request: SignPayloadRequest) -> Result<SignOutcome> {
        let signing_type = request.signing_type;
        self.sign_requests.lock().unwrap().push(request);
        if self.reject {
            return Ok(SignOutcome::Rejected { reason: "user closed the prompt".into() });
        }
        Ok(SignOutcome::Signed {
            signature: SIGNATURE.into(),
            signing_type,
            sender_id: "sender-1".into(),
        })
    }

    async fn request_operation(&self, request: &OperationRequest) -> Result<OperationResponse> {
        self.operation_requests.lock().unwrap().push(request.clone());
        Ok(OperationResponse {
            transaction_hash: OPERATION_HASH.into(),
            sender_id: Some("sender-1".into()),
        })
    }
}

pub struct FakeNode {
    pub(crate) counter: Option<String>,
    pub estimate: GasEstimate,
    pub fail_simulation: bool,
    pub(crate) simulations: AtomicU32,
}

impl FakeNode {
    /// Node where the signer has never used the contract.
    pub fn empty() -> Self {
        Self {
            counter: None,
            estimate: GasEstimate { gas_limit: 2_500, storage_limit: 67 },
            fail_simulation: false,
            simulations: AtomicU32::new(0),
        }
    }

    pub fn with_counter(counter: &str) -> Self {
        Self { counter: Some(counter.to_string()), ..Self::empty() }
    }

    pub fn simulations(&self) -> u32 {
        self.simulations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerNode for FakeNode {
    async fn get_big_map_value(
        &self,
        _contract: &str,
        _field: &str,
        _key: &str,
    ) -> Result<Option<MichelsonValue>> {
        Ok(self.counter.as_ref().map(|counter| MichelsonValue::int(counter)))
    }

    async fn simulate_transfer(
        &self,
        _signer: &SimulationSigner,
        _transfer: &TransferSimulation,
    ) -> Result<GasEstimate> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        if self.fail_simulation {
            return Err(MetaTxError::GasEstimation("script_rejected".into()));
        }
        Ok(self.estimate)
    }

    async fn wait_for_inclusion(&self, operation_hash: &str) -> Result<InclusionReceipt> {
        Ok(InclusionReceipt {
            operation_hash: operation_hash.to_string(),
            block_hash: "BLockGenesisGenesisGenesisGenesisGenesisf79b5d1CoW2".into(),
            level: 1_024,
        })
    }
}

pub struct FakeRelay {
    pub dapp: Option<DappInfo>,
    pub contracts: Vec<SmartContract>,
    pub apis: Vec<MetaApi>,
    pub fail_registry: bool,
    /// Non-success status returned by every submission.
    pub reject_status: Option<(u16, String)>,
    /// Status queries answered "not processed" before the hash appears.
    pub pending_polls: u32,
    pub(crate) submitted: Mutex<Vec<RelayRequest>>,
    pub(crate) status_queries: AtomicU32,
}

impl Default for FakeRelay {
    fn default() -> Self {
        Self {
            dapp: Some(DappInfo {
                id: "dapp-1".into(),
                network_id: Some(chain_ids::MAINNET.into()),
            }),
            contracts: vec![SmartContract {
                address: CONTRACT.into(),
                entry_points: serde_json::json!(["transfer"]),
            }],
            apis: vec![MetaApi {
                id: "api-transfer".into(),
                contract_address: Some(CONTRACT.into()),
                method: "transfer".into(),
                name: Some("Transfer".into()),
            }],
            fail_registry: false,
            reject_status: None,
            pending_polls: 0,
            submitted: Mutex::new(Vec::new()),
            status_queries: AtomicU32::new(0),
        }
    }
}

impl FakeRelay {
    pub fn submitted(&self) -> Vec<RelayRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn status_queries(&self) -> u32 {
        self.status_queries.load(Ordering::SeqCst)
    }

    fn registry_guard(&self) -> Result<()> {
        if self.fail_registry {
            return Err(MetaTxError::DappRegistry("dashboard unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RelayApi for FakeRelay {
    async fn get_dapp(&self, _api_key: &str) -> Result<DappResponse> {
        self.registry_guard()?;
        Ok(DappResponse { dapp: self.dapp.clone(), log: None })
    }

    async fn get_smart_contracts(&self, _api_key: &str) -> Result<SmartContractsResponse> {
        self.registry_guard()?;
        Ok(SmartContractsResponse { smart_contracts: self.contracts.clone(), flag: Some(143) })
    }

    async fn get_meta_apis(&self, _api_key: &str) -> Result<MetaApisResponse> {
        self.registry_guard()?;
        Ok(MetaApisResponse { list_apis: self.apis.clone() })
    }

    async fn submit(&self, _api_key: &str, request: &RelayRequest) -> Result<String> {
        if let Some((status, body)) = &self.reject_status {
            return Err(MetaTxError::RelaySubmission { status: *status, body: body.clone() });
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request.clone());
        Ok(format!("req-{}", submitted.len()))
    }

    async fn get_status(
        &self,
        _api_key: &str,
        _request_id: &str,
        _network_id: &str,
    ) -> Result<Option<RelayStatus>> {
        let seen = self.status_queries.fetch_add(1, Ordering::SeqCst);
        if seen < self.pending_polls {
            return Ok(None);
        }
        Ok(Some(RelayStatus {
            operation_hash: OPERATION_HASH.into(),
            counter: Some("1".into()),
        }))
    }
}
