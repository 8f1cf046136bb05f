//! Canonical encoding for native meta-transactions.
//!
//! - `micheline`: value tree in its JSON shape
//! - `pack`: binary Micheline (PACK) codec
//! - `base58`: address, chain id and script-expression codecs
//! - `message`: parameter hash, signing message, signature splicing

pub mod base58;
pub mod hash;
pub mod message;
pub mod micheline;
pub mod pack;

pub use message::{compose_signing_message, encode_method_parameters_as_hash, splice_signature};
pub use micheline::{ensure_prim_application, CallParameters, MichelsonValue};
pub use pack::{pack_value, unpack_value, PACK_INDICATOR};
