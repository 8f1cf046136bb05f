//! Signing coordinator.
//!
//! Per operation: active account, permission check, parameter hash, counter,
//! signing message, wallet prompt, signature splice. Batches are processed
//! one operation at a time, in order.
//!
//! Operations later in a batch that target a contract already seen in the
//! same batch sign with the previous counter plus one: the relay submits them
//! in order and the contract bumps the counter after each execution.

use num_bigint::BigUint;
use std::collections::HashMap;
use tzmeta_codec::{compose_signing_message, encode_method_parameters_as_hash, splice_signature, CallParameters};
use tzmeta_node::{get_user_counter, LedgerNode};
use tzmeta_types::{bytes_to_hex, ChainContext, MetaTxError, Result};

use crate::wallet::{
    AccountInfo, OperationRequest, Permission, SignOutcome, SignPayloadRequest, SigningType,
    TransactionOperation, Wallet,
};

/// One operation with the signature spliced into its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOperation {
    pub destination: String,
    pub amount: String,
    pub parameters: CallParameters,
    /// Counter the signature commits to.
    pub counter: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOperations {
    pub operations: Vec<SignedOperation>,
    pub sender_id: String,
    pub account: AccountInfo,
}

/// Ask the wallet to sign every operation of `request` for the native relay.
pub async fn request_meta_transaction_signature(
    wallet: &dyn Wallet,
    node: &dyn LedgerNode,
    chain: &ChainContext,
    request: &OperationRequest,
) -> Result<SignedOperations> {
    let account = wallet
        .get_active_account()
        .await?
        .ok_or(MetaTxError::NoActiveAccount)?;

    if !wallet.check_permissions(Permission::SignPayload).await? {
        return Err(MetaTxError::InsufficientPermission);
    }

    if request.operation_details.is_empty() {
        return Err(MetaTxError::MalformedValue("operation request is empty".into()));
    }

    let mut operations = Vec::with_capacity(request.operation_details.len());
    let mut sender_id = String::new();
    let mut next_counters = BatchCounters::default();
    for operation in &request.operation_details {
        let (signed, sender) =
            sign_operation(wallet, node, chain, &account, operation, &mut next_counters).await?;
        operations.push(signed);
        sender_id = sender;
    }

    Ok(SignedOperations { operations, sender_id, account })
}

/// Next counter per contract address for the rest of a batch.
#[derive(Debug, Default)]
struct BatchCounters {
    next: HashMap<String, BigUint>,
}

impl BatchCounters {
    fn get(&self, contract: &str) -> Option<String> {
        self.next.get(contract).map(BigUint::to_string)
    }

    fn commit(&mut self, contract: &str, counter: &str) -> Result<()> {
        let used: BigUint = counter
            .parse()
            .map_err(|_| MetaTxError::MalformedValue(format!("invalid counter: {:?}", counter)))?;
        self.next.insert(contract.to_string(), used + 1u32);
        Ok(())
    }
}

async fn sign_operation(
    wallet: &dyn Wallet,
    node: &dyn LedgerNode,
    chain: &ChainContext,
    account: &AccountInfo,
    operation: &TransactionOperation,
    batch: &mut BatchCounters,
) -> Result<(SignedOperation, String)> {
    let parameters = operation.parameters.as_ref().ok_or_else(|| {
        MetaTxError::MalformedValue(format!("operation to {} has no parameters", operation.destination))
    })?;

    let param_hash = encode_method_parameters_as_hash(&parameters.value)?;
    tracing::debug!(
        destination = %operation.destination,
        entrypoint = %parameters.entrypoint,
        param_hash = %bytes_to_hex(&param_hash),
        "hashed entrypoint parameters"
    );

    let counter = match batch.get(&operation.destination) {
        Some(counter) => counter,
        None => get_user_counter(node, &operation.destination, &account.address)
            .await
            .counter()
            .to_string(),
    };

    let message = compose_signing_message(&chain.network_id, &operation.destination, &counter, &param_hash)?;
    tracing::debug!(%message, %counter, "composed signing message");

    let outcome = wallet
        .request_sign_payload(SignPayloadRequest {
            signing_type: SigningType::Micheline,
            payload: message,
        })
        .await?;

    let (signature, sender_id) = match outcome {
        SignOutcome::Signed { signature, sender_id, .. } => (signature, sender_id),
        SignOutcome::Rejected { reason } => return Err(MetaTxError::SigningRejected(reason)),
    };

    let parameters = splice_signature(parameters, &account.public_key, &signature)?;
    batch.commit(&operation.destination, &counter)?;
    Ok((
        SignedOperation {
            destination: operation.destination.clone(),
            amount: operation.amount.clone(),
            parameters,
            counter,
            signature,
        },
        sender_id,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{transfer_operation, FakeNode, FakeWallet, CONTRACT, SIGNATURE};
    use tzmeta_codec::MichelsonValue;
    use tzmeta_types::chain_ids;

    fn chain() -> ChainContext {
        ChainContext::new(chain_ids::MAINNET, "http://localhost:8732")
    }

    fn request(ops: Vec<TransactionOperation>) -> OperationRequest {
        OperationRequest { operation_details: ops }
    }

    #[tokio::test]
    async fn test_signature_is_spliced_into_copy() {
        let wallet = FakeWallet::default();
        let node = FakeNode::with_counter("7");
        let op = transfer_operation();

        let signed = request_meta_transaction_signature(&wallet, &node, &chain(), &request(vec![op.clone()]))
            .await
            .unwrap();

        assert_eq!(signed.sender_id, "sender-1");
        let first = &signed.operations[0];
        assert_eq!(first.counter, "7");
        assert_eq!(first.destination, CONTRACT);
        assert_eq!(
            first.parameters.value.args()[1],
            MichelsonValue::pair(
                MichelsonValue::some(MichelsonValue::string(&wallet.account.public_key)),
                MichelsonValue::some(MichelsonValue::string(SIGNATURE)),
            )
        );
        // the caller's request is left untouched
        assert_eq!(op.parameters.unwrap().value.args()[1], MichelsonValue::pair(MichelsonValue::none(), MichelsonValue::none()));
    }

    #[tokio::test]
    async fn test_wallet_receives_golden_message() {
        let vectors: serde_json::Value =
            serde_json::from_str(include_str!("../../../tests/vectors/signing_message.json")).unwrap();
        let wallet = FakeWallet::default();
        let node = FakeNode::with_counter("0");

        request_meta_transaction_signature(&wallet, &node, &chain(), &request(vec![transfer_operation()]))
            .await
            .unwrap();

        let payloads = wallet.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].signing_type, SigningType::Micheline);
        assert_eq!(payloads[0].payload, vectors[0]["expected_message"].as_str().unwrap());
    }

    #[tokio::test]
    async fn test_batch_is_signed_in_order() {
        let wallet = FakeWallet::default();
        let node = FakeNode::with_counter("3");
        let mut second = transfer_operation();
        second.amount = "5".into();

        let signed = request_meta_transaction_signature(&wallet, &node, &chain(), &request(vec![transfer_operation(), second]))
            .await
            .unwrap();

        assert_eq!(signed.operations.len(), 2);
        assert_eq!(signed.operations[1].amount, "5");
        assert_eq!(wallet.payloads().len(), 2);
    }

    #[tokio::test]
    async fn test_same_contract_batch_advances_counter() {
        let wallet = FakeWallet::default();
        let node = FakeNode::with_counter("4");

        let signed = request_meta_transaction_signature(
            &wallet,
            &node,
            &chain(),
            &request(vec![transfer_operation(), transfer_operation(), transfer_operation()]),
        )
        .await
        .unwrap();

        let counters: Vec<&str> = signed.operations.iter().map(|op| op.counter.as_str()).collect();
        assert_eq!(counters, vec!["4", "5", "6"]);
        let payloads = wallet.payloads();
        assert_ne!(payloads[0].payload, payloads[1].payload);
    }

    #[tokio::test]
    async fn test_no_active_account() {
        let wallet = FakeWallet { connected: false, ..FakeWallet::default() };
        let result = request_meta_transaction_signature(&wallet, &FakeNode::empty(), &chain(), &request(vec![transfer_operation()])).await;
        assert!(matches!(result, Err(MetaTxError::NoActiveAccount)));
    }

    #[tokio::test]
    async fn test_missing_permission() {
        let wallet = FakeWallet { can_sign: false, ..FakeWallet::default() };
        let result = request_meta_transaction_signature(&wallet, &FakeNode::empty(), &chain(), &request(vec![transfer_operation()])).await;
        assert!(matches!(result, Err(MetaTxError::InsufficientPermission)));
        assert!(wallet.payloads().is_empty());
    }

    #[tokio::test]
    async fn test_operation_without_parameters_is_malformed() {
        let wallet = FakeWallet::default();
        let mut op = transfer_operation();
        op.parameters = None;
        let result = request_meta_transaction_signature(&wallet, &FakeNode::empty(), &chain(), &request(vec![op])).await;
        assert!(matches!(result, Err(MetaTxError::MalformedValue(_))));
    }

    #[tokio::test]
    async fn test_non_prim_value_is_malformed() {
        let wallet = FakeWallet::default();
        let mut op = transfer_operation();
        op.parameters = Some(CallParameters {
            entrypoint: "transfer".into(),
            value: MichelsonValue::int(1),
        });
        let result = request_meta_transaction_signature(&wallet, &FakeNode::empty(), &chain(), &request(vec![op])).await;
        assert!(matches!(result, Err(MetaTxError::MalformedValue(_))));
        assert!(wallet.payloads().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_prompt_is_an_error() {
        let wallet = FakeWallet { reject: true, ..FakeWallet::default() };
        let result = request_meta_transaction_signature(&wallet, &FakeNode::empty(), &chain(), &request(vec![transfer_operation()])).await;
        assert!(matches!(result, Err(MetaTxError::SigningRejected(_))));
    }
}
