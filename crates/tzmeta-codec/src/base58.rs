//! Base58check codecs for addresses, chain ids and script expression hashes.

use tzmeta_types::{MetaTxError, Result};

use crate::hash::blake2b_256;

pub const TZ1_PREFIX: [u8; 3] = [6, 161, 159];
pub const TZ2_PREFIX: [u8; 3] = [6, 161, 161];
pub const TZ3_PREFIX: [u8; 3] = [6, 161, 164];
pub const TZ4_PREFIX: [u8; 3] = [6, 161, 166];
pub const KT1_PREFIX: [u8; 3] = [2, 90, 121];
pub const CHAIN_ID_PREFIX: [u8; 3] = [87, 82, 0];
pub const EXPR_PREFIX: [u8; 4] = [13, 44, 64, 27];

const HASH_LEN: usize = 20;
const CHAIN_ID_LEN: usize = 4;

/// Decode a base58check string, returning prefix + payload (checksum removed).
pub fn b58check_decode(s: &str) -> Result<Vec<u8>> {
    bs58::decode(s)
        .with_check(None)
        .into_vec()
        .map_err(|e| MetaTxError::InvalidEncoding(format!("base58check decode of {}: {}", s, e)))
}

/// Decode a base58check string and strip an expected prefix.
pub fn b58check_decode_prefixed(s: &str, prefix: &[u8], payload_len: usize) -> Result<Vec<u8>> {
    let raw = b58check_decode(s)?;
    match raw.strip_prefix(prefix) {
        Some(payload) if payload.len() == payload_len => Ok(payload.to_vec()),
        Some(payload) => Err(MetaTxError::InvalidEncoding(format!(
            "{}: expected {} payload bytes, got {}",
            s,
            payload_len,
            payload.len()
        ))),
        None => Err(MetaTxError::InvalidEncoding(format!("{}: unexpected prefix", s))),
    }
}

pub fn b58check_encode(prefix: &[u8], payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(prefix.len() + payload.len());
    data.extend_from_slice(prefix);
    data.extend_from_slice(payload);
    bs58::encode(data).with_check().into_string()
}

/// Canonical 22-byte address form.
///
/// - implicit (`tz1`..`tz4`): `00 || curve tag || pkh20`
/// - originated (`KT1`): `01 || hash20 || 00`
pub fn encode_address(address: &str) -> Result<Vec<u8>> {
    let (prefix, tag): (&[u8], Option<u8>) = match address.get(..3) {
        Some("tz1") => (&TZ1_PREFIX, Some(0x00)),
        Some("tz2") => (&TZ2_PREFIX, Some(0x01)),
        Some("tz3") => (&TZ3_PREFIX, Some(0x02)),
        Some("tz4") => (&TZ4_PREFIX, Some(0x03)),
        Some("KT1") => (&KT1_PREFIX, None),
        _ => {
            return Err(MetaTxError::InvalidEncoding(format!("unsupported address: {}", address)));
        }
    };
    let hash = b58check_decode_prefixed(address, prefix, HASH_LEN)?;

    let mut out = Vec::with_capacity(22);
    match tag {
        Some(curve) => {
            out.push(0x00);
            out.push(curve);
            out.extend_from_slice(&hash);
        }
        None => {
            out.push(0x01);
            out.extend_from_slice(&hash);
            out.push(0x00);
        }
    }
    Ok(out)
}

/// Bare 4-byte chain id constant from its `Net...` form.
pub fn decode_chain_id(chain_id: &str) -> Result<[u8; CHAIN_ID_LEN]> {
    let raw = b58check_decode_prefixed(chain_id, &CHAIN_ID_PREFIX, CHAIN_ID_LEN)?;
    let mut out = [0u8; CHAIN_ID_LEN];
    out.copy_from_slice(&raw);
    Ok(out)
}

/// `expr...` hash used by the node to address big map keys.
pub fn script_expr_hash(packed_key: &[u8]) -> String {
    b58check_encode(&EXPR_PREFIX, &blake2b_256(packed_key))
}
