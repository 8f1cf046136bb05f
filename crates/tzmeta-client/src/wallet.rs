//! Wallet collaborator interface.
//!
//! The wallet owns pairing, permissions and the interactive signing prompt.
//! This SDK only asks it for the active account and for signatures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tzmeta_codec::CallParameters;
use tzmeta_types::{Hex, Result};

/// Paired account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub address: String,
    pub public_key: String,
}

/// Capabilities a wallet session may grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SignPayload,
    OperationRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningType {
    Raw,
    Operation,
    Micheline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPayloadRequest {
    pub signing_type: SigningType,
    /// Hex payload, `05`-prefixed for Micheline signing.
    pub payload: Hex,
}

/// Result of the interactive signing prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    Signed {
        signature: String,
        signing_type: SigningType,
        sender_id: String,
    },
    /// The user dismissed or refused the prompt.
    Rejected { reason: String },
}

/// One transaction of an operation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOperation {
    /// Amount in mutez, as a decimal string.
    pub amount: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<CallParameters>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub operation_details: Vec<TransactionOperation>,
}

/// Answer of a direct (non-relayed) operation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub transaction_hash: String,
    pub sender_id: Option<String>,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    async fn get_active_account(&self) -> Result<Option<AccountInfo>>;
    async fn check_permissions(&self, capability: Permission) -> Result<bool>;
    async fn request_sign_payload(&self, request: SignPayloadRequest) -> Result<SignOutcome>;
    /// Pass-through used when the meta-transaction flow is disabled.
    async fn request_operation(&self, request: &OperationRequest) -> Result<OperationResponse>;
}
