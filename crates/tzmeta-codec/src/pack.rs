//! Binary Micheline encoding (the `PACK` format without its `05` prefix).
//!
//! Tags:
//! - `00` int (zarith), `01` string, `02` sequence, `0a` bytes
//! - `03`..`08` primitive with 0, 1 or 2 args, without/with annotations
//! - `09` primitive with any number of args and an annotation block
//!
//! Annotations on literal leaves are not part of the encoding.

use num_bigint::{BigInt, BigUint, Sign};
use tzmeta_types::{hex_to_bytes, MetaTxError, Result};

use crate::micheline::MichelsonValue;

/// Prefix marking packed Micheline data.
pub const PACK_INDICATOR: u8 = 0x05;

const TAG_INT: u8 = 0x00;
const TAG_STRING: u8 = 0x01;
const TAG_SEQ: u8 = 0x02;
const TAG_PRIM_0: u8 = 0x03;
const TAG_PRIM_0_ANNOTS: u8 = 0x04;
const TAG_PRIM_1: u8 = 0x05;
const TAG_PRIM_1_ANNOTS: u8 = 0x06;
const TAG_PRIM_2: u8 = 0x07;
const TAG_PRIM_2_ANNOTS: u8 = 0x08;
const TAG_PRIM_N: u8 = 0x09;
const TAG_BYTES: u8 = 0x0a;

/// Primitive names indexed by their one-byte opcode.
const PRIMITIVES: &[&str] = &[
    "parameter", "storage", "code", "False", "Elt", "Left", "None", "Pair",
    "Right", "Some", "True", "Unit", "PACK", "UNPACK", "BLAKE2B", "SHA256",
    "SHA512", "ABS", "ADD", "AMOUNT", "AND", "BALANCE", "CAR", "CDR",
    "CHECK_SIGNATURE", "COMPARE", "CONCAT", "CONS", "CREATE_ACCOUNT", "CREATE_CONTRACT", "IMPLICIT_ACCOUNT", "DIP",
    "DROP", "DUP", "EDIV", "EMPTY_MAP", "EMPTY_SET", "EQ", "EXEC", "FAILWITH",
    "GE", "GET", "GT", "HASH_KEY", "IF", "IF_CONS", "IF_LEFT", "IF_NONE",
    "INT", "LAMBDA", "LE", "LEFT", "LOOP", "LSL", "LSR", "LT",
    "MAP", "MEM", "MUL", "NEG", "NEQ", "NIL", "NONE", "NOT",
    "NOW", "OR", "PAIR", "PUSH", "RIGHT", "SIZE", "SOME", "SOURCE",
    "SENDER", "SELF", "STEPS_TO_QUOTA", "SUB", "SWAP", "TRANSFER_TOKENS", "SET_DELEGATE", "UNIT",
    "UPDATE", "XOR", "ITER", "LOOP_LEFT", "ADDRESS", "CONTRACT", "ISNAT", "CAST",
    "RENAME", "bool", "contract", "int", "key", "key_hash", "lambda", "list",
    "map", "big_map", "nat", "option", "or", "pair", "set", "signature",
    "string", "bytes", "mutez", "timestamp", "unit", "operation", "address", "SLICE",
    "DIG", "DUG", "EMPTY_BIG_MAP", "APPLY", "chain_id", "CHAIN_ID", "LEVEL", "SELF_ADDRESS",
    "never", "NEVER", "UNPAIR", "VOTING_POWER", "TOTAL_VOTING_POWER", "KECCAK", "SHA3", "PAIRING_CHECK",
    "bls12_381_g1", "bls12_381_g2", "bls12_381_fr", "sapling_state", "sapling_transaction_deprecated", "SAPLING_EMPTY_STATE", "SAPLING_VERIFY_UPDATE", "ticket",
    "TICKET_DEPRECATED", "READ_TICKET", "SPLIT_TICKET", "JOIN_TICKETS", "GET_AND_UPDATE", "chest", "chest_key", "OPEN_CHEST",
    "VIEW", "view", "constant", "SUB_MUTEZ", "tx_rollup_l2_address", "MIN_BLOCK_TIME", "sapling_transaction", "EMIT",
    "Lambda_rec", "LAMBDA_REC", "TICKET", "BYTES", "NAT",
];

fn prim_code(name: &str) -> Result<u8> {
    PRIMITIVES
        .iter()
        .position(|p| *p == name)
        .map(|i| i as u8)
        .ok_or_else(|| MetaTxError::MalformedValue(format!("unknown primitive: {}", name)))
}

fn prim_name(code: u8) -> Result<&'static str> {
    PRIMITIVES
        .get(code as usize)
        .copied()
        .ok_or_else(|| MetaTxError::InvalidEncoding(format!("unknown primitive code: {:#04x}", code)))
}

/// Encode a value into binary Micheline (no pack indicator).
pub fn encode_value(value: &MichelsonValue) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

/// Encode a value and prepend the pack indicator.
pub fn pack_value(value: &MichelsonValue) -> Result<Vec<u8>> {
    let mut out = vec![PACK_INDICATOR];
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_len_prefixed(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn write_value(value: &MichelsonValue, out: &mut Vec<u8>) -> Result<()> {
    match value {
        MichelsonValue::Int { int, .. } => {
            let n: BigInt = int
                .parse()
                .map_err(|_| MetaTxError::MalformedValue(format!("invalid int literal: {}", int)))?;
            out.push(TAG_INT);
            write_zarith(&n, out);
        }
        MichelsonValue::String { string, .. } => {
            out.push(TAG_STRING);
            write_len_prefixed(string.as_bytes(), out);
        }
        MichelsonValue::Bytes { bytes, .. } => {
            let raw = hex_to_bytes(bytes)?;
            out.push(TAG_BYTES);
            write_len_prefixed(&raw, out);
        }
        MichelsonValue::Seq(items) => {
            let mut inner = Vec::new();
            for item in items {
                write_value(item, &mut inner)?;
            }
            out.push(TAG_SEQ);
            write_len_prefixed(&inner, out);
        }
        MichelsonValue::Prim { prim, args, annots } => {
            let code = prim_code(prim)?;
            let annots = annots.join(" ");
            if args.len() <= 2 {
                let tag = match (args.len(), annots.is_empty()) {
                    (0, true) => TAG_PRIM_0,
                    (0, false) => TAG_PRIM_0_ANNOTS,
                    (1, true) => TAG_PRIM_1,
                    (1, false) => TAG_PRIM_1_ANNOTS,
                    (_, true) => TAG_PRIM_2,
                    (_, false) => TAG_PRIM_2_ANNOTS,
                };
                out.push(tag);
                out.push(code);
                for arg in args {
                    write_value(arg, out)?;
                }
                if !annots.is_empty() {
                    write_len_prefixed(annots.as_bytes(), out);
                }
            } else {
                let mut inner = Vec::new();
                for arg in args {
                    write_value(arg, &mut inner)?;
                }
                out.push(TAG_PRIM_N);
                out.push(code);
                write_len_prefixed(&inner, out);
                write_len_prefixed(annots.as_bytes(), out);
            }
        }
    }
    Ok(())
}

/// Zarith: first byte carries 6 magnitude bits plus sign (0x40),
/// following bytes carry 7 bits each; 0x80 marks continuation.
fn write_zarith(n: &BigInt, out: &mut Vec<u8>) {
    let mut mag: BigUint = n.magnitude().clone();
    let mut byte = (mag.iter_u64_digits().next().unwrap_or(0) & 0x3f) as u8;
    if n.sign() == Sign::Minus {
        byte |= 0x40;
    }
    mag >>= 6usize;
    if mag.bits() > 0 {
        byte |= 0x80;
    }
    out.push(byte);

    while mag.bits() > 0 {
        let mut byte = (mag.iter_u64_digits().next().unwrap_or(0) & 0x7f) as u8;
        mag >>= 7usize;
        if mag.bits() > 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
}

/// Decode packed data; the pack indicator is required.
pub fn unpack_value(data: &[u8]) -> Result<MichelsonValue> {
    match data.split_first() {
        Some((&PACK_INDICATOR, rest)) => decode_value(rest),
        _ => Err(MetaTxError::InvalidEncoding("missing pack indicator".into())),
    }
}

/// Decode binary Micheline; trailing bytes are an error.
pub fn decode_value(data: &[u8]) -> Result<MichelsonValue> {
    let mut reader = Reader { data, pos: 0 };
    let value = reader.read_value()?;
    if reader.pos != data.len() {
        return Err(MetaTxError::InvalidEncoding(format!(
            "{} trailing bytes after value",
            data.len() - reader.pos
        )));
    }
    Ok(value)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len()).ok_or_else(|| {
            MetaTxError::InvalidEncoding(format!("unexpected end of data at offset {}", self.pos))
        })?;
        let data = self.data;
        let slice = &data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.take(4)?;
        let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
        self.take(len)
    }

    fn annots(&mut self) -> Result<Vec<String>> {
        let raw = self.len_prefixed()?;
        let joined = std::str::from_utf8(raw)
            .map_err(|e| MetaTxError::InvalidEncoding(format!("annotation is not utf-8: {}", e)))?;
        Ok(joined.split(' ').filter(|a| !a.is_empty()).map(str::to_string).collect())
    }

    fn zarith(&mut self) -> Result<BigInt> {
        let first = self.byte()?;
        let negative = first & 0x40 != 0;
        let mut mag = BigUint::from(first & 0x3f);
        let mut shift = 6usize;
        let mut more = first & 0x80 != 0;
        while more {
            let byte = self.byte()?;
            mag += BigUint::from(byte & 0x7f) << shift;
            shift += 7;
            more = byte & 0x80 != 0;
        }
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        Ok(BigInt::from_biguint(sign, mag))
    }

    fn read_value(&mut self) -> Result<MichelsonValue> {
        let tag = self.byte()?;
        match tag {
            TAG_INT => Ok(MichelsonValue::int(self.zarith()?)),
            TAG_STRING => {
                let raw = self.len_prefixed()?;
                let s = std::str::from_utf8(raw)
                    .map_err(|e| MetaTxError::InvalidEncoding(format!("string is not utf-8: {}", e)))?;
                Ok(MichelsonValue::string(s))
            }
            TAG_BYTES => Ok(MichelsonValue::bytes(self.len_prefixed()?)),
            TAG_SEQ => {
                let inner = self.len_prefixed()?;
                let mut sub = Reader { data: inner, pos: 0 };
                let mut items = Vec::new();
                while sub.pos < inner.len() {
                    items.push(sub.read_value()?);
                }
                Ok(MichelsonValue::Seq(items))
            }
            TAG_PRIM_0..=TAG_PRIM_2_ANNOTS => {
                let prim = prim_name(self.byte()?)?;
                let arity = ((tag - TAG_PRIM_0) / 2) as usize;
                let mut args = Vec::with_capacity(arity);
                for _ in 0..arity {
                    args.push(self.read_value()?);
                }
                let annots = if (tag - TAG_PRIM_0) % 2 == 1 { self.annots()? } else { Vec::new() };
                Ok(MichelsonValue::Prim { prim: prim.to_string(), args, annots })
            }
            TAG_PRIM_N => {
                let prim = prim_name(self.byte()?)?;
                let inner = self.len_prefixed()?;
                let mut sub = Reader { data: inner, pos: 0 };
                let mut args = Vec::new();
                while sub.pos < inner.len() {
                    args.push(sub.read_value()?);
                }
                let annots = self.annots()?;
                Ok(MichelsonValue::Prim { prim: prim.to_string(), args, annots })
            }
            other => Err(MetaTxError::InvalidEncoding(format!("unknown tag: {:#04x}", other))),
        }
    }
}
