//! Wallet-side storage trait and the meta-transaction toggle.
//!
//! Defines the `StorageAdapter` trait that storage backends implement.
//! Provides a `MemoryStore` for testing.

use async_trait::async_trait;
use tzmeta_types::Result;

pub mod memory;

/// Key holding the meta-transaction toggle.
pub const META_TX_ENABLED_KEY: &str = "meta-tx-enabled";

/// Key/value storage shared with the wallet session.
///
/// Values are strings because the backing stores (browser local storage and
/// friends) cannot hold anything else.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Persisted routing mode for outgoing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaTxStatus {
    Enabled,
    Disabled,
}

impl MetaTxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaTxStatus::Enabled => "enabled",
            MetaTxStatus::Disabled => "disabled",
        }
    }

    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            MetaTxStatus::Enabled
        } else {
            MetaTxStatus::Disabled
        }
    }
}

/// Write the toggle.
pub async fn set_meta_tx_enabled(store: &dyn StorageAdapter, enabled: bool) -> Result<()> {
    store
        .set(META_TX_ENABLED_KEY, MetaTxStatus::from_flag(enabled).as_str())
        .await
}

/// Raw toggle value as stored (`"enabled"`, `"disabled"` or unset).
pub async fn meta_tx_status(store: &dyn StorageAdapter) -> Result<Option<String>> {
    store.get(META_TX_ENABLED_KEY).await
}

/// Whether operations should go through the meta-transaction flow.
pub async fn is_meta_tx_enabled(store: &dyn StorageAdapter) -> Result<bool> {
    Ok(meta_tx_status(store).await?.as_deref() == Some(MetaTxStatus::Enabled.as_str()))
}

/// Flip the toggle and return the new state (`true` = enabled).
///
/// Anything other than `"enabled"` counts as disabled, so an unset flag flips on.
pub async fn toggle_meta_tx_status(store: &dyn StorageAdapter) -> Result<bool> {
    let enabled = !is_meta_tx_enabled(store).await?;
    set_meta_tx_enabled(store, enabled).await?;
    tracing::debug!(status = MetaTxStatus::from_flag(enabled).as_str(), "meta-tx toggled");
    Ok(enabled)
}
