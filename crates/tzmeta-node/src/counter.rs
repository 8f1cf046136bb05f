//! Replay-protection counter lookup.
//!
//! The counter lives in the contract's `%user_store` big map, keyed by the
//! wallet address. It is read fresh for every signing request.

use tzmeta_types::MetaTxError;

use crate::LedgerNode;

/// Storage field holding per-account counters.
pub const USER_STORE_FIELD: &str = "user_store";

/// Outcome of a counter read.
#[derive(Debug)]
pub enum CounterResolution {
    /// Read succeeded; an absent key resolves to `"0"`.
    Resolved(String),
    /// Read failed and the counter was assumed to be `"0"`.
    /// `cause` is always `MetaTxError::CounterResolution`.
    Defaulted { cause: MetaTxError },
}

impl CounterResolution {
    pub fn counter(&self) -> &str {
        match self {
            CounterResolution::Resolved(counter) => counter,
            CounterResolution::Defaulted { .. } => "0",
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, CounterResolution::Defaulted { .. })
    }

    /// Why the read was replaced by `"0"`, if it was.
    pub fn cause(&self) -> Option<&MetaTxError> {
        match self {
            CounterResolution::Resolved(_) => None,
            CounterResolution::Defaulted { cause } => Some(cause),
        }
    }
}

/// Fetch the user's counter for `contract_address`. Never fails: read faults
/// degrade to `Defaulted`, which still yields counter `"0"`.
pub async fn get_user_counter(
    node: &dyn LedgerNode,
    contract_address: &str,
    wallet_address: &str,
) -> CounterResolution {
    match node
        .get_big_map_value(contract_address, USER_STORE_FIELD, wallet_address)
        .await
    {
        Ok(None) => {
            tracing::debug!(contract = contract_address, wallet = wallet_address, "counter not initialized in big_map");
            CounterResolution::Resolved("0".into())
        }
        Ok(Some(value)) => match value.as_int() {
            Some(counter) if !counter.starts_with('-') => CounterResolution::Resolved(counter.to_string()),
            _ => {
                let cause = MetaTxError::CounterResolution(format!(
                    "user_store value is not a natural number: {:?}",
                    value
                ));
                tracing::warn!(contract = contract_address, %cause, "defaulting counter to 0");
                CounterResolution::Defaulted { cause }
            }
        },
        Err(e) => {
            let cause = MetaTxError::CounterResolution(e.to_string());
            tracing::warn!(contract = contract_address, %cause, "counter read failed, defaulting to 0");
            CounterResolution::Defaulted { cause }
        }
    }
}
