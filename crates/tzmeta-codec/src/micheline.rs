//! Micheline value tree in its JSON shape.
//!
//! - `{"int": "42"}`, `{"string": "..."}`, `{"bytes": "0a0b"}`
//! - `{"prim": "Pair", "args": [...], "annots": ["%field"]}`
//! - `[...]` sequences

use serde::{Deserialize, Serialize};
use tzmeta_types::{MetaTxError, Result};

/// A node of a Micheline expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MichelsonValue {
    Int {
        int: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        annots: Vec<String>,
    },
    String {
        string: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        annots: Vec<String>,
    },
    Bytes {
        bytes: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        annots: Vec<String>,
    },
    Prim {
        prim: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<MichelsonValue>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        annots: Vec<String>,
    },
    Seq(Vec<MichelsonValue>),
}

impl MichelsonValue {
    pub fn int(value: impl ToString) -> Self {
        MichelsonValue::Int { int: value.to_string(), annots: Vec::new() }
    }

    pub fn string(value: &str) -> Self {
        MichelsonValue::String { string: value.to_string(), annots: Vec::new() }
    }

    pub fn bytes(value: &[u8]) -> Self {
        MichelsonValue::Bytes { bytes: hex::encode(value), annots: Vec::new() }
    }

    pub fn prim(name: &str, args: Vec<MichelsonValue>) -> Self {
        MichelsonValue::Prim { prim: name.to_string(), args, annots: Vec::new() }
    }

    pub fn pair(left: MichelsonValue, right: MichelsonValue) -> Self {
        Self::prim("Pair", vec![left, right])
    }

    pub fn some(inner: MichelsonValue) -> Self {
        Self::prim("Some", vec![inner])
    }

    pub fn none() -> Self {
        Self::prim("None", Vec::new())
    }

    /// Attach an annotation such as `%counter`.
    pub fn annotated(mut self, annot: &str) -> Self {
        match &mut self {
            MichelsonValue::Int { annots, .. }
            | MichelsonValue::String { annots, .. }
            | MichelsonValue::Bytes { annots, .. }
            | MichelsonValue::Prim { annots, .. } => annots.push(annot.to_string()),
            MichelsonValue::Seq(_) => {}
        }
        self
    }

    pub fn is_prim(&self) -> bool {
        matches!(self, MichelsonValue::Prim { .. })
    }

    pub fn prim_name(&self) -> Option<&str> {
        match self {
            MichelsonValue::Prim { prim, .. } => Some(prim),
            _ => None,
        }
    }

    pub fn args(&self) -> &[MichelsonValue] {
        match self {
            MichelsonValue::Prim { args, .. } => args,
            _ => &[],
        }
    }

    pub fn annots(&self) -> &[String] {
        match self {
            MichelsonValue::Int { annots, .. }
            | MichelsonValue::String { annots, .. }
            | MichelsonValue::Bytes { annots, .. }
            | MichelsonValue::Prim { annots, .. } => annots,
            MichelsonValue::Seq(_) => &[],
        }
    }

    pub fn has_annot(&self, annot: &str) -> bool {
        self.annots().iter().any(|a| a == annot)
    }

    pub fn as_int(&self) -> Option<&str> {
        match self {
            MichelsonValue::Int { int, .. } => Some(int),
            _ => None,
        }
    }
}

/// Entrypoint invocation: `{"entrypoint": "transfer", "value": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallParameters {
    pub entrypoint: String,
    pub value: MichelsonValue,
}

/// Precondition for hashing: the outermost node must be a primitive application.
pub fn ensure_prim_application(value: &MichelsonValue) -> Result<()> {
    if value.is_prim() {
        Ok(())
    } else {
        Err(MetaTxError::MalformedValue("ill formed data: expected a primitive application".into()))
    }
}
