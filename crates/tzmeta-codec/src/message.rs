//! Native meta-transaction signing message.
//!
//! message = 05 || pack(Pair(Pair(chain_id %chain_id, contract), Pair(counter %counter, param_hash %param_hash)))
//! param_hash = blake2b_256(05 || pack(value.args[0]))
//!
//! `value.args[1]` is the reserved `Pair(Option<key>, Option<signature>)` slot
//! filled in after signing, so it never takes part in the hash.

use tzmeta_types::{bytes_to_hex, Hex, MetaTxError, Result};

use crate::base58::{decode_chain_id, encode_address};
use crate::hash::blake2b_256;
use crate::micheline::{ensure_prim_application, CallParameters, MichelsonValue};
use crate::pack::pack_value;

/// Hash the business arguments of an entrypoint call, skipping the signature slot.
pub fn encode_method_parameters_as_hash(value: &MichelsonValue) -> Result<[u8; 32]> {
    ensure_prim_application(value)?;
    let business = value
        .args()
        .first()
        .ok_or_else(|| MetaTxError::MalformedValue("entrypoint value has no arguments".into()))?;
    Ok(blake2b_256(&pack_value(business)?))
}

/// Build the hex payload handed to the wallet for signing.
pub fn compose_signing_message(
    chain_id: &str,
    contract_address: &str,
    counter: &str,
    param_hash: &[u8; 32],
) -> Result<Hex> {
    if counter.is_empty() || !counter.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MetaTxError::MalformedValue(format!("invalid counter: {:?}", counter)));
    }
    let address = encode_address(contract_address)?;
    let chain_id = decode_chain_id(chain_id)?;

    let message = MichelsonValue::pair(
        MichelsonValue::pair(
            MichelsonValue::bytes(&chain_id).annotated("%chain_id"),
            MichelsonValue::bytes(&address),
        ),
        MichelsonValue::pair(
            MichelsonValue::int(counter).annotated("%counter"),
            MichelsonValue::bytes(param_hash).annotated("%param_hash"),
        ),
    );
    Ok(bytes_to_hex(&pack_value(&message)?))
}

/// Return a copy of `parameters` whose signature slot carries the signer's key and signature.
pub fn splice_signature(
    parameters: &CallParameters,
    public_key: &str,
    signature: &str,
) -> Result<CallParameters> {
    let mut spliced = parameters.clone();
    match &mut spliced.value {
        MichelsonValue::Prim { args, .. } if args.len() >= 2 => {
            args[1] = MichelsonValue::pair(
                MichelsonValue::some(MichelsonValue::string(public_key)),
                MichelsonValue::some(MichelsonValue::string(signature)),
            );
            Ok(spliced)
        }
        _ => Err(MetaTxError::MalformedValue(
            "entrypoint value has no signature slot".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN_ID: &str = "NetXdQprcVkpaWU";
    const CONTRACT: &str = "KT18g6ejmStajqDwZZ5ZwTfu1ZKzhYq5RboW";

    fn transfer_value(signature_slot: MichelsonValue) -> MichelsonValue {
        MichelsonValue::pair(
            MichelsonValue::pair(
                MichelsonValue::string("tz1UtBceKpPt7MmUPYnNBn5E5pTCqDGMgzcA"),
                MichelsonValue::int(100),
            ),
            signature_slot,
        )
    }

    #[test]
    fn test_signing_message_vectors_from_json() {
        let data = include_str!("../../../tests/vectors/signing_message.json");
        let vectors: Vec<serde_json::Value> = serde_json::from_str(data).unwrap();

        for v in &vectors {
            let name = v["name"].as_str().unwrap();
            let value: MichelsonValue = serde_json::from_value(v["value"].clone()).unwrap();

            let param_hash = encode_method_parameters_as_hash(&value).unwrap();
            assert_eq!(
                hex::encode(param_hash),
                v["expected_param_hash"].as_str().unwrap(),
                "Param hash mismatch for '{}'",
                name
            );

            let message = compose_signing_message(
                v["chain_id"].as_str().unwrap(),
                v["contract"].as_str().unwrap(),
                v["counter"].as_str().unwrap(),
                &param_hash,
            )
            .unwrap();
            assert_eq!(
                message,
                v["expected_message"].as_str().unwrap(),
                "Signing message mismatch for '{}'",
                name
            );
        }
    }

    #[test]
    fn test_compose_is_deterministic() {
        let hash = [0x11u8; 32];
        let a = compose_signing_message(CHAIN_ID, CONTRACT, "42", &hash).unwrap();
        let b = compose_signing_message(CHAIN_ID, CONTRACT, "42", &hash).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("05"));
        assert!(!a.starts_with("0x"));
    }

    #[test]
    fn test_param_hash_ignores_signature_slot() {
        let unsigned = transfer_value(MichelsonValue::pair(MichelsonValue::none(), MichelsonValue::none()));
        let signed = transfer_value(MichelsonValue::pair(
            MichelsonValue::some(MichelsonValue::string("edpkexample")),
            MichelsonValue::some(MichelsonValue::string("edsigexample")),
        ));
        assert_eq!(
            encode_method_parameters_as_hash(&unsigned).unwrap(),
            encode_method_parameters_as_hash(&signed).unwrap()
        );
    }

    #[test]
    fn test_param_hash_tracks_business_args() {
        let slot = MichelsonValue::pair(MichelsonValue::none(), MichelsonValue::none());
        let a = transfer_value(slot.clone());
        let b = MichelsonValue::pair(
            MichelsonValue::pair(
                MichelsonValue::string("tz1UtBceKpPt7MmUPYnNBn5E5pTCqDGMgzcA"),
                MichelsonValue::int(101),
            ),
            slot,
        );
        assert_ne!(
            encode_method_parameters_as_hash(&a).unwrap(),
            encode_method_parameters_as_hash(&b).unwrap()
        );
    }

    #[test]
    fn test_param_hash_requires_prim_application() {
        assert!(matches!(
            encode_method_parameters_as_hash(&MichelsonValue::string("transfer")),
            Err(MetaTxError::MalformedValue(_))
        ));
        assert!(matches!(
            encode_method_parameters_as_hash(&MichelsonValue::prim("Unit", vec![])),
            Err(MetaTxError::MalformedValue(_))
        ));
    }

    #[test]
    fn test_compose_rejects_bad_counter() {
        let hash = [0u8; 32];
        assert!(compose_signing_message(CHAIN_ID, CONTRACT, "-1", &hash).is_err());
        assert!(compose_signing_message(CHAIN_ID, CONTRACT, "", &hash).is_err());
    }

    #[test]
    fn test_splice_signature_fills_reserved_slot() {
        let params = CallParameters {
            entrypoint: "transfer".into(),
            value: transfer_value(MichelsonValue::pair(MichelsonValue::none(), MichelsonValue::none())),
        };
        let spliced = splice_signature(&params, "edpkexample", "edsigexample").unwrap();

        let json = serde_json::to_value(&spliced.value.args()[1]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "prim": "Pair",
                "args": [
                    { "prim": "Some", "args": [{ "string": "edpkexample" }] },
                    { "prim": "Some", "args": [{ "string": "edsigexample" }] }
                ]
            })
        );
        assert_eq!(spliced.value.args()[0], params.value.args()[0]);
        // the caller's copy is untouched
        assert_eq!(params.value.args()[1].prim_name(), Some("Pair"));
        assert_eq!(params.value.args()[1].args()[0], MichelsonValue::none());
    }
}
