//! Client-owned event registry.
//!
//! Registering the same handler `Arc` twice for a kind is a no-op.
//! Lifecycle events (`smart_contract_data_ready`, `dapp_api_data_ready`,
//! `biconomy_ready`) fire at most once per initialization; errors and login
//! confirmations fire every time they are emitted.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tzmeta_types::{MetaTxError, Result};

/// Codes carried by error payloads.
pub mod response_codes {
    pub const ERROR_RESPONSE: &str = "B500";
    pub const SMART_CONTRACT_NOT_FOUND: &str = "B508";
    pub const DAPP_NOT_FOUND: &str = "B509";
    pub const EVENT_NOT_SUPPORTED: &str = "B513";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SmartContractDataReady,
    DappApiDataReady,
    LoginConfirmation,
    Error,
    Ready,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SmartContractDataReady => "smart_contract_data_ready",
            EventKind::DappApiDataReady => "dapp_api_data_ready",
            EventKind::LoginConfirmation => "login_confirmation",
            EventKind::Error => "biconomy_error",
            EventKind::Ready => "biconomy_ready",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            EventKind::SmartContractDataReady,
            EventKind::DappApiDataReady,
            EventKind::LoginConfirmation,
            EventKind::Error,
            EventKind::Ready,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == name)
    }

    /// Kinds applications may subscribe to; the rest are internal milestones.
    pub fn is_public(&self) -> bool {
        matches!(self, EventKind::Ready | EventKind::Error | EventKind::LoginConfirmation)
    }

    fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EventKind::SmartContractDataReady | EventKind::DappApiDataReady | EventKind::Ready
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self { code: code.to_string(), message: message.into() }
    }

    pub fn from_error(err: &MetaTxError) -> Self {
        let code = match err {
            MetaTxError::EventNotSupported(_) => response_codes::EVENT_NOT_SUPPORTED,
            _ => response_codes::ERROR_RESPONSE,
        };
        Self::new(code, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkEvent {
    SmartContractDataReady { dapp_id: String },
    DappApiDataReady { api_count: usize },
    LoginConfirmation { address: String },
    Error(ErrorPayload),
    Ready,
}

impl SdkEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SdkEvent::SmartContractDataReady { .. } => EventKind::SmartContractDataReady,
            SdkEvent::DappApiDataReady { .. } => EventKind::DappApiDataReady,
            SdkEvent::LoginConfirmation { .. } => EventKind::LoginConfirmation,
            SdkEvent::Error(_) => EventKind::Error,
            SdkEvent::Ready => EventKind::Ready,
        }
    }
}

/// Callback type for SDK events.
pub type EventHandler = Arc<dyn Fn(&SdkEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventRegistry {
    handlers: Mutex<HashMap<EventKind, Vec<EventHandler>>>,
    fired: Mutex<HashSet<EventKind>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; returns `false` if it was already registered.
    pub fn on(&self, kind: EventKind, handler: EventHandler) -> bool {
        let Ok(mut handlers) = self.handlers.lock() else {
            return false;
        };
        let list = handlers.entry(kind).or_default();
        if list.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return false;
        }
        list.push(handler);
        true
    }

    /// Public subscription: only `Ready`, `Error` and `LoginConfirmation`.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<bool> {
        if !kind.is_public() {
            return Err(MetaTxError::EventNotSupported(kind.as_str().to_string()));
        }
        Ok(self.on(kind, handler))
    }

    /// Subscribe by event name.
    pub fn subscribe_named(&self, name: &str, handler: EventHandler) -> Result<bool> {
        let kind = EventKind::from_name(name)
            .ok_or_else(|| MetaTxError::EventNotSupported(name.to_string()))?;
        self.subscribe(kind, handler)
    }

    /// Dispatch to registered handlers; returns how many were invoked.
    pub fn emit(&self, event: SdkEvent) -> usize {
        let kind = event.kind();
        if kind.is_lifecycle() {
            let Ok(mut fired) = self.fired.lock() else {
                return 0;
            };
            if !fired.insert(kind) {
                return 0;
            }
        }

        // handlers may register further handlers, so call them outside the lock
        let handlers: Vec<EventHandler> = match self.handlers.lock() {
            Ok(handlers) => handlers.get(&kind).cloned().unwrap_or_default(),
            Err(_) => return 0,
        };
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    /// Allow lifecycle events to fire again (new initialization round).
    pub fn reset_lifecycle(&self) {
        if let Ok(mut fired) = self.fired.lock() {
            fired.clear();
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .lock()
            .map(|h| h.get(&kind).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}
