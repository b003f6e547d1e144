use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{forge_array, forge_int, unforge_int, Reader};
use crate::error::{Error, Result};
use crate::micheline::Micheline;

/// Michelson primitives indexed by their one-byte wire code.
pub static PRIMITIVES: &[&str] = &[
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

static PRIMITIVE_CODES: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    PRIMITIVES.iter().enumerate().map(|(i, p)| (*p, i as u8)).collect()
});

// node tags
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

/// Deepest nesting accepted when decoding untrusted bytes.
const MAX_DEPTH: usize = 1_000;

/// Watermark prepended by `PACK`.
const PACK_WATERMARK: u8 = 0x05;

pub fn primitive_code(prim: &str) -> Result<u8> {
    PRIMITIVE_CODES
        .get(prim)
        .copied()
        .ok_or_else(|| Error::UnknownPrimitive(prim.to_string()))
}

/// Binary Micheline, as embedded in transaction parameters and scripts.
pub fn forge_micheline(m: &Micheline) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_node(&mut out, m)?;
    Ok(out)
}

/// `PACK` serialization: watermark byte then the forged expression.
pub fn pack(m: &Micheline) -> Result<Vec<u8>> {
    let mut out = vec![PACK_WATERMARK];
    write_node(&mut out, m)?;
    Ok(out)
}

fn write_annots(out: &mut Vec<u8>, annots: &[String]) -> Result<()> {
    out.extend(forge_array(annots.join(" ").as_bytes(), 4)?);
    Ok(())
}

fn write_node(out: &mut Vec<u8>, m: &Micheline) -> Result<()> {
    match m {
        Micheline::Int(v) => {
            out.push(TAG_INT);
            out.extend(forge_int(v));
        }
        Micheline::String(s) => {
            out.push(TAG_STRING);
            out.extend(forge_array(s.as_bytes(), 4)?);
        }
        Micheline::Bytes(b) => {
            out.push(TAG_BYTES);
            out.extend(forge_array(b, 4)?);
        }
        Micheline::Seq(xs) => {
            let mut inner = Vec::new();
            for x in xs {
                write_node(&mut inner, x)?;
            }
            out.push(TAG_SEQ);
            out.extend(forge_array(&inner, 4)?);
        }
        Micheline::Prim { prim, args, annots } => {
            let code = primitive_code(prim)?;
            let has_annots = !annots.is_empty();
            match args.len() {
                0..=2 => {
                    let tag = match (args.len(), has_annots) {
                        (0, false) => TAG_PRIM_0,
                        (0, true) => TAG_PRIM_0_ANNOTS,
                        (1, false) => TAG_PRIM_1,
                        (1, true) => TAG_PRIM_1_ANNOTS,
                        (_, false) => TAG_PRIM_2,
                        (_, true) => TAG_PRIM_2_ANNOTS,
                    };
                    out.push(tag);
                    out.push(code);
                    for a in args {
                        write_node(out, a)?;
                    }
                    if has_annots {
                        write_annots(out, annots)?;
                    }
                }
                _ => {
                    let mut inner = Vec::new();
                    for a in args {
                        write_node(&mut inner, a)?;
                    }
                    out.push(TAG_PRIM_N);
                    out.push(code);
                    out.extend(forge_array(&inner, 4)?);
                    // the generic form always carries its annotation block
                    write_annots(out, annots)?;
                }
            }
        }
    }
    Ok(())
}

/// Inverse of [`forge_micheline`]; returns the expression and bytes consumed.
pub fn unforge_micheline(bytes: &[u8]) -> Result<(Micheline, usize)> {
    let mut reader = Reader::new(bytes);
    let m = read_node(&mut reader, 0)?;
    Ok((m, reader.position()))
}

fn read_annots(reader: &mut Reader<'_>) -> Result<Vec<String>> {
    let raw = reader.array(4, "annotations")?;
    let s = std::str::from_utf8(raw).map_err(|e| Error::invalid_value("annots", e.to_string()))?;
    Ok(s.split(' ').filter(|a| !a.is_empty()).map(str::to_string).collect())
}

fn read_prim(reader: &mut Reader<'_>) -> Result<String> {
    let code = reader.byte("primitive")?;
    PRIMITIVES
        .get(code as usize)
        .map(|p| p.to_string())
        .ok_or_else(|| Error::UnknownPrimitive(format!("{code:#04x}")))
}

fn read_node(reader: &mut Reader<'_>, depth: usize) -> Result<Micheline> {
    if depth > MAX_DEPTH {
        return Err(Error::invalid_value("micheline", format!("nesting deeper than {MAX_DEPTH}")));
    }
    let tag = reader.byte("node tag")?;
    let node = match tag {
        TAG_INT => {
            let (v, consumed) = unforge_int(reader.rest())?;
            reader.take(consumed, "int")?;
            Micheline::Int(v)
        }
        TAG_STRING => {
            let raw = reader.array(4, "string")?;
            let s = String::from_utf8(raw.to_vec()).map_err(|e| Error::invalid_value("string", e.to_string()))?;
            Micheline::String(s)
        }
        TAG_BYTES => Micheline::Bytes(reader.array(4, "bytes")?.to_vec()),
        TAG_SEQ => {
            let raw = reader.array(4, "sequence")?;
            let mut inner = Reader::new(raw);
            let mut items = Vec::new();
            while !inner.rest().is_empty() {
                items.push(read_node(&mut inner, depth + 1)?);
            }
            Micheline::Seq(items)
        }
        TAG_PRIM_0..=TAG_PRIM_2_ANNOTS => {
            let prim = read_prim(reader)?;
            let arity = usize::from((tag - TAG_PRIM_0) / 2);
            let has_annots = (tag - TAG_PRIM_0) % 2 == 1;
            let mut args = Vec::with_capacity(arity);
            for _ in 0..arity {
                args.push(read_node(reader, depth + 1)?);
            }
            let annots = if has_annots { read_annots(reader)? } else { Vec::new() };
            Micheline::Prim { prim, args, annots }
        }
        TAG_PRIM_N => {
            let prim = read_prim(reader)?;
            let raw = reader.array(4, "arguments")?;
            let mut inner = Reader::new(raw);
            let mut args = Vec::new();
            while !inner.rest().is_empty() {
                args.push(read_node(&mut inner, depth + 1)?);
            }
            let annots = read_annots(reader)?;
            Micheline::Prim { prim, args, annots }
        }
        other => return Err(Error::invalid_value("micheline", format!("unknown node tag {other:#04x}"))),
    };
    Ok(node)
}
