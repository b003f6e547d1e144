//! Settling nodes against Micheline values, and serializing them back.
use chrono::{DateTime, Utc};
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

use super::{Node, Prim, Step, Ty};
use crate::encoding;
use crate::error::{Error, Result};
use crate::forge;
use crate::micheline::Micheline;

// ------------------------------- Policy ---------------------------------- //

const ADDRESS_PREFIXES: [&str; 7] = ["tz1", "tz2", "tz3", "tz4", "KT1", "txr1", "sr1"];
const KEY_HASH_PREFIXES: [&str; 4] = ["tz1", "tz2", "tz3", "tz4"];
const KEY_PREFIXES: [&str; 4] = ["edpk", "sppk", "p2pk", "BLpk"];
const SIGNATURE_PREFIXES: [&str; 5] = ["edsig", "spsig1", "p2sig", "sig", "BLsig"];
const CHAIN_ID_PREFIX: &str = "Net";

// ------------------------------- Helpers --------------------------------- //

fn mismatch(node: &str, expected: &str, got: &Micheline) -> Error {
    Error::invalid_value(node, format!("expected {expected}, got {got}"))
}

fn check_kind(node: &str, encoded: &str, allowed: &[&str]) -> Result<()> {
    let (registration, _) = encoding::decode_with_prefix(encoded)?;
    if !allowed.contains(&registration.encoded_prefix) {
        return Err(Error::invalid_value(
            node,
            format!("`{}` identifiers are not allowed here", registration.encoded_prefix),
        ));
    }
    Ok(())
}

fn non_negative(node: &str, n: &BigInt) -> Result<BigInt> {
    if n.sign() == Sign::Minus {
        return Err(Error::invalid_value(node, format!("{n} is negative")));
    }
    Ok(n.clone())
}

/// `KT1...%entrypoint` splits into the address and its optional entrypoint.
pub(crate) fn split_entrypoint(address: &str) -> (&str, Option<&str>) {
    match address.split_once('%') {
        Some((base, ep)) => (base, Some(ep)),
        None => (address, None),
    }
}

/// Readable form of an address literal given as a string or as forged bytes.
pub(crate) fn parse_address(node: &str, v: &Micheline) -> Result<String> {
    match v {
        Micheline::String(s) => {
            check_kind(node, split_entrypoint(s).0, &ADDRESS_PREFIXES)?;
            Ok(s.clone())
        }
        Micheline::Bytes(b) => {
            let (address, consumed) = forge::unforge_address(b)?;
            match &b[consumed..] {
                [] => Ok(address),
                suffix => {
                    let ep = std::str::from_utf8(suffix).map_err(|e| Error::invalid_value(node, e.to_string()))?;
                    Ok(format!("{address}%{ep}"))
                }
            }
        }
        other => Err(mismatch(node, "an address", other)),
    }
}

fn parse_key_hash(node: &str, v: &Micheline) -> Result<String> {
    match v {
        Micheline::String(s) => check_kind(node, s, &KEY_HASH_PREFIXES).map(|_| s.clone()),
        Micheline::Bytes(b) => forge::unforge_public_key_hash(b).map(|(s, _)| s),
        other => Err(mismatch(node, "a key hash", other)),
    }
}

fn parse_key(node: &str, v: &Micheline) -> Result<String> {
    match v {
        Micheline::String(s) => check_kind(node, s, &KEY_PREFIXES).map(|_| s.clone()),
        Micheline::Bytes(b) => forge::unforge_public_key(b).map(|(s, _)| s),
        other => Err(mismatch(node, "a public key", other)),
    }
}

fn parse_signature(node: &str, v: &Micheline) -> Result<String> {
    match v {
        Micheline::String(s) => check_kind(node, s, &SIGNATURE_PREFIXES).map(|_| s.clone()),
        Micheline::Bytes(b) => encoding::encode(b, "sig"),
        other => Err(mismatch(node, "a signature", other)),
    }
}

fn parse_chain_id(node: &str, v: &Micheline) -> Result<String> {
    match v {
        Micheline::String(s) => check_kind(node, s, &[CHAIN_ID_PREFIX]).map(|_| s.clone()),
        Micheline::Bytes(b) => encoding::encode(b, CHAIN_ID_PREFIX),
        other => Err(mismatch(node, "a chain id", other)),
    }
}

fn parse_timestamp(node: &str, v: &Micheline) -> Result<DateTime<Utc>> {
    match v {
        Micheline::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::invalid_value(node, format!("`{s}`: {e}"))),
        Micheline::Int(n) => n
            .to_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(|| Error::invalid_value(node, format!("timestamp {n} out of range"))),
        other => Err(mismatch(node, "a timestamp", other)),
    }
}

/// Components of a `Pair`/sequence literal of at least two elements.
fn pair_items<'a>(node: &str, v: &'a Micheline) -> Result<&'a [Micheline]> {
    let items = match v {
        Micheline::Prim { prim, args, .. } if prim == "Pair" => args.as_slice(),
        Micheline::Seq(xs) => xs.as_slice(),
        other => return Err(mismatch(node, "a pair", other)),
    };
    if items.len() < 2 {
        return Err(mismatch(node, "a pair of at least two elements", v));
    }
    Ok(items)
}

/// Second half of a comb: the single tail element, or the rest re-wrapped.
fn comb_rest(items: &[Micheline]) -> Micheline {
    match items {
        [only] => only.clone(),
        rest => Micheline::prim("Pair", rest.to_vec()),
    }
}

fn seq<'a>(node: &str, v: &'a Micheline) -> Result<&'a [Micheline]> {
    match v {
        Micheline::Seq(xs) => Ok(xs),
        other => Err(mismatch(node, "a sequence", other)),
    }
}

fn elt<'a>(node: &str, v: &'a Micheline) -> Result<(&'a Micheline, &'a Micheline)> {
    match v {
        Micheline::Prim { prim, args, .. } if prim == "Elt" && args.len() == 2 => Ok((&args[0], &args[1])),
        other => Err(mismatch(node, "`Elt key value`", other)),
    }
}

fn parse_entries(node: &str, key: &Node, value: &Node, v: &Micheline) -> Result<Vec<(Node, Node)>> {
    seq(node, v)?
        .iter()
        .map(|item| {
            let (k, val) = elt(node, item)?;
            let mut key_node = key.clone();
            key_node.parse_value(k)?;
            let mut value_node = value.clone();
            value_node.parse_value(val)?;
            Ok((key_node, value_node))
        })
        .collect()
}

fn settled<'a, T>(node: &str, v: &'a Option<T>) -> Result<&'a T> {
    v.as_ref()
        .ok_or_else(|| Error::invalid_value(node, "value is not settled"))
}

// -------------------------------- Settle --------------------------------- //

impl Node {
    /// Attach the literal payload of `v` to this node and its children.
    pub fn parse_value(&mut self, v: &Micheline) -> Result<()> {
        let label = self.label();
        let node = label.as_str();
        match &mut self.ty {
            Ty::Int(slot) => match v {
                Micheline::Int(n) => *slot = Some(n.clone()),
                other => return Err(mismatch(node, "an int", other)),
            },
            Ty::Nat(slot) | Ty::Mutez(slot) => match v {
                Micheline::Int(n) => *slot = Some(non_negative(node, n)?),
                other => return Err(mismatch(node, "a natural number", other)),
            },
            Ty::Bool(slot) => match v.prim_name() {
                Some("True") => *slot = Some(true),
                Some("False") => *slot = Some(false),
                _ => return Err(mismatch(node, "`True` or `False`", v)),
            },
            Ty::String(slot) => match v {
                Micheline::String(s) => *slot = Some(s.clone()),
                other => return Err(mismatch(node, "a string", other)),
            },
            Ty::Bytes(slot) => match v {
                Micheline::Bytes(b) => *slot = Some(b.clone()),
                other => return Err(mismatch(node, "bytes", other)),
            },
            Ty::Address(slot) => *slot = Some(parse_address(node, v)?),
            Ty::Contract { value, .. } => *value = Some(parse_address(node, v)?),
            Ty::KeyHash(slot) => *slot = Some(parse_key_hash(node, v)?),
            Ty::Key(slot) => *slot = Some(parse_key(node, v)?),
            Ty::Signature(slot) => *slot = Some(parse_signature(node, v)?),
            Ty::ChainId(slot) => *slot = Some(parse_chain_id(node, v)?),
            Ty::Timestamp(slot) => *slot = Some(parse_timestamp(node, v)?),
            Ty::Unit(slot) => match v.prim_name() {
                Some("Unit") => *slot = Some(()),
                _ => return Err(mismatch(node, "`Unit`", v)),
            },
            Ty::Never => return Err(Error::invalid_value(node, "`never` has no values")),
            Ty::Lambda { code, .. } => *code = Some(v.clone()),
            Ty::Opaque { prim, value } => {
                let accepted = match (*prim, v) {
                    (Prim::Operation, _) => true,
                    (Prim::Bls12381Fr, Micheline::Int(_)) => true,
                    (Prim::TxRollupL2Address, Micheline::String(_)) => true,
                    (_, Micheline::Bytes(_)) => true,
                    _ => false,
                };
                if !accepted {
                    return Err(mismatch(node, &format!("a `{}` literal", prim.as_str()), v));
                }
                *value = Some(v.clone());
            }
            Ty::Ticket { content, ticketer, amount } => {
                // `Ticket ticketer type content amount` as rendered by recent nodes
                let (t, c, a) = match v {
                    Micheline::Prim { prim, args, .. } if prim == "Ticket" && args.len() == 4 => {
                        (args[0].clone(), args[2].clone(), args[3].clone())
                    }
                    _ => {
                        let items = pair_items(node, v)?;
                        let tail = comb_rest(&items[1..]);
                        let rest = pair_items(node, &tail)?;
                        (items[0].clone(), rest[0].clone(), comb_rest(&rest[1..]))
                    }
                };
                *ticketer = Some(parse_address(node, &t)?);
                content.parse_value(&c)?;
                match a {
                    Micheline::Int(n) => *amount = Some(non_negative(node, &n)?),
                    other => return Err(mismatch(node, "a ticket amount", &other)),
                }
            }
            Ty::SaplingState { id, .. } => match v {
                Micheline::Int(n) => *id = Some(n.clone()),
                Micheline::Seq(xs) if xs.is_empty() => *id = None,
                other => return Err(mismatch(node, "a sapling state id", other)),
            },
            Ty::SaplingTransaction { value, .. } => match v {
                Micheline::Bytes(b) => *value = Some(b.clone()),
                other => return Err(mismatch(node, "sapling transaction bytes", other)),
            },
            Ty::Pair(left, right) => {
                let items = pair_items(node, v)?;
                left.parse_value(&items[0])?;
                right.parse_value(&comb_rest(&items[1..]))?;
            }
            Ty::Or { left, right, side } => match v {
                Micheline::Prim { prim, args, .. } if prim == "Left" && args.len() == 1 => {
                    left.parse_value(&args[0])?;
                    *side = Some(Step::Left);
                }
                Micheline::Prim { prim, args, .. } if prim == "Right" && args.len() == 1 => {
                    right.parse_value(&args[0])?;
                    *side = Some(Step::Right);
                }
                other => return Err(mismatch(node, "`Left` or `Right`", other)),
            },
            Ty::Option { inner, some } => match v {
                Micheline::Prim { prim, args, .. } if prim == "Some" && args.len() == 1 => {
                    inner.parse_value(&args[0])?;
                    *some = Some(true);
                }
                Micheline::Prim { prim, .. } if prim == "None" => *some = Some(false),
                other => return Err(mismatch(node, "`Some` or `None`", other)),
            },
            Ty::List { item, items } | Ty::Set { item, items } => {
                *items = seq(node, v)?
                    .iter()
                    .map(|x| {
                        let mut child = item.as_ref().clone();
                        child.parse_value(x).map(|_| child)
                    })
                    .collect::<Result<_>>()?;
            }
            Ty::Map { key, value, entries } => *entries = parse_entries(node, key, value, v)?,
            Ty::BigMap { key, value, ptr, entries } => match v {
                Micheline::Int(n) => {
                    *ptr = Some(n.to_i64().ok_or_else(|| Error::invalid_value(node, format!("big map id {n} out of range")))?);
                    entries.clear();
                }
                _ => {
                    *ptr = None;
                    *entries = parse_entries(node, key, value, v)?;
                }
            },
        }
        Ok(())
    }

    // ------------------------------ Serialize ------------------------------ //

    /// The settled value in readable form (addresses and keys as strings).
    pub fn to_micheline(&self) -> Result<Micheline> {
        let label = self.label();
        let node = label.as_str();
        let m = match &self.ty {
            Ty::Int(v) | Ty::Nat(v) | Ty::Mutez(v) => Micheline::Int(settled(node, v)?.clone()),
            Ty::Bool(v) => Micheline::prim(if *settled(node, v)? { "True" } else { "False" }, Vec::new()),
            Ty::String(v)
            | Ty::Address(v)
            | Ty::KeyHash(v)
            | Ty::Key(v)
            | Ty::Signature(v)
            | Ty::ChainId(v) => Micheline::String(settled(node, v)?.clone()),
            Ty::Contract { value, .. } => Micheline::String(settled(node, value)?.clone()),
            Ty::Bytes(v) => Micheline::Bytes(settled(node, v)?.clone()),
            Ty::Timestamp(v) => Micheline::String(settled(node, v)?.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
            Ty::Unit(v) => {
                settled(node, v)?;
                Micheline::unit()
            }
            Ty::Never => return Err(Error::invalid_value(node, "`never` has no values")),
            Ty::Lambda { code, .. } | Ty::Opaque { value: code, .. } => settled(node, code)?.clone(),
            Ty::Ticket { content, ticketer, amount } => Micheline::pair(
                Micheline::String(settled(node, ticketer)?.clone()),
                Micheline::pair(content.to_micheline()?, Micheline::Int(settled(node, amount)?.clone())),
            ),
            Ty::SaplingState { id, .. } => match id {
                Some(n) => Micheline::Int(n.clone()),
                None => Micheline::Seq(Vec::new()),
            },
            Ty::SaplingTransaction { value, .. } => Micheline::Bytes(settled(node, value)?.clone()),
            Ty::Pair(left, right) => Micheline::pair(left.to_micheline()?, right.to_micheline()?),
            Ty::Or { left, right, side } => match settled(node, side)? {
                Step::Left => Micheline::left(left.to_micheline()?),
                Step::Right => Micheline::right(right.to_micheline()?),
            },
            Ty::Option { inner, some } => match settled(node, some)? {
                true => Micheline::some(inner.to_micheline()?),
                false => Micheline::none(),
            },
            Ty::List { items, .. } | Ty::Set { items, .. } => {
                Micheline::Seq(items.iter().map(Node::to_micheline).collect::<Result<_>>()?)
            }
            Ty::Map { entries, .. } => entries_to_micheline(entries)?,
            Ty::BigMap { ptr, entries, .. } => match ptr {
                Some(p) => Micheline::int(*p),
                None => entries_to_micheline(entries)?,
            },
        };
        Ok(m)
    }

    /// Whether a leaf carries its payload. Composites are settled through
    /// their children, so only the node itself is inspected.
    pub fn has_value(&self) -> bool {
        match &self.ty {
            Ty::Int(v) | Ty::Nat(v) | Ty::Mutez(v) => v.is_some(),
            Ty::Bool(v) => v.is_some(),
            Ty::String(v) | Ty::Address(v) | Ty::KeyHash(v) | Ty::Key(v) | Ty::Signature(v) | Ty::ChainId(v) => {
                v.is_some()
            }
            Ty::Contract { value, .. } => value.is_some(),
            Ty::Bytes(v) => v.is_some(),
            Ty::Timestamp(v) => v.is_some(),
            Ty::Unit(v) => v.is_some(),
            Ty::Never => false,
            Ty::Lambda { code, .. } | Ty::Opaque { value: code, .. } => code.is_some(),
            Ty::Ticket { ticketer, .. } => ticketer.is_some(),
            Ty::SaplingState { .. } | Ty::List { .. } | Ty::Set { .. } | Ty::Map { .. } | Ty::BigMap { .. } => true,
            Ty::SaplingTransaction { value, .. } => value.is_some(),
            Ty::Pair(left, right) => left.has_value() && right.has_value(),
            Ty::Or { side, .. } => side.is_some(),
            Ty::Option { some, .. } => some.is_some(),
        }
    }
}

fn entries_to_micheline(entries: &[(Node, Node)]) -> Result<Micheline> {
    entries
        .iter()
        .map(|(k, v)| Ok(Micheline::elt(k.to_micheline()?, v.to_micheline()?)))
        .collect::<Result<_>>()
        .map(Micheline::Seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TZ1: &str = "tz1Ke3u9SqxvnkdNkgaCmydXg3zh3iaKNDxw";
    const KT1: &str = "KT18anmnvhqTsgqTwasxpLKYWcLJnGRX3m2D";

    fn node(ty: serde_json::Value) -> Node {
        Node::from_type(&serde_json::from_value(ty).unwrap()).unwrap()
    }

    fn value(v: serde_json::Value) -> Micheline {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn settles_comb_pairs_either_way() {
        let ty = json!({"prim": "pair", "args": [{"prim": "nat"}, {"prim": "int"}, {"prim": "string"}]});
        let flat = value(json!({"prim": "Pair", "args": [{"int": "1"}, {"int": "-2"}, {"string": "x"}]}));
        let nested = value(json!({"prim": "Pair", "args": [{"int": "1"}, {"prim": "Pair", "args": [{"int": "-2"}, {"string": "x"}]}]}));
        let mut a = node(ty.clone());
        a.parse_value(&flat).unwrap();
        let mut b = node(ty);
        b.parse_value(&nested).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_micheline().unwrap(), nested);
    }

    #[test]
    fn address_from_bytes_reads_entrypoint_suffix() {
        let mut forged = forge::forge_address(KT1).unwrap();
        forged.extend_from_slice(b"mint");
        let mut n = node(json!({"prim": "address"}));
        n.parse_value(&Micheline::Bytes(forged)).unwrap();
        assert_eq!(n.to_micheline().unwrap(), Micheline::string(format!("{KT1}%mint")));
    }

    #[test]
    fn rejects_wrong_identifier_kind() {
        let mut n = node(json!({"prim": "key_hash"}));
        assert!(n.parse_value(&Micheline::string(KT1)).is_err());
        n.parse_value(&Micheline::string(TZ1)).unwrap();
    }

    #[test]
    fn negative_nat_is_rejected() {
        let mut n = node(json!({"prim": "nat"}));
        assert!(matches!(n.parse_value(&Micheline::int(-1)), Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn timestamps_accept_both_forms() {
        let mut a = node(json!({"prim": "timestamp"}));
        a.parse_value(&Micheline::int(1_600_000_000)).unwrap();
        let mut b = node(json!({"prim": "timestamp"}));
        b.parse_value(&Micheline::string("2020-09-13T12:26:40Z")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_micheline().unwrap(), Micheline::string("2020-09-13T12:26:40Z"));
    }

    #[test]
    fn or_records_side_and_keeps_other_branch_type_only() {
        let mut n = node(json!({"prim": "or", "args": [{"prim": "nat"}, {"prim": "string"}]}));
        n.parse_value(&value(json!({"prim": "Right", "args": [{"string": "hi"}]}))).unwrap();
        let Ty::Or { left, side, .. } = &n.ty else { panic!("or expected") };
        assert_eq!(*side, Some(Step::Right));
        assert!(!left.has_value());
        assert_eq!(n.to_micheline().unwrap(), Micheline::right(Micheline::string("hi")));
    }

    #[test]
    fn big_map_pointer_or_literal() {
        let ty = json!({"prim": "big_map", "args": [{"prim": "nat"}, {"prim": "bool"}]});
        let mut by_ptr = node(ty.clone());
        by_ptr.parse_value(&Micheline::int(17)).unwrap();
        assert_eq!(by_ptr.to_micheline().unwrap(), Micheline::int(17));

        let mut literal = node(ty);
        let v = value(json!([{"prim": "Elt", "args": [{"int": "1"}, {"prim": "True"}]}]));
        literal.parse_value(&v).unwrap();
        assert_eq!(literal.to_micheline().unwrap(), v);
    }

    #[test]
    fn ticket_forms() {
        let ty = json!({"prim": "ticket", "args": [{"prim": "string"}]});
        let combed = value(json!({"prim": "Pair", "args": [{"string": KT1}, {"prim": "Pair", "args": [{"string": "gold"}, {"int": "10"}]}]}));
        let rendered = value(json!({"prim": "Ticket", "args": [{"string": KT1}, {"prim": "string"}, {"string": "gold"}, {"int": "10"}]}));
        let mut a = node(ty.clone());
        a.parse_value(&combed).unwrap();
        let mut b = node(ty);
        b.parse_value(&rendered).unwrap();
        assert_eq!(a, b);
        // serialized as nested binary pairs
        assert_eq!(b.to_micheline().unwrap(), combed);
    }

    #[test]
    fn unsettled_node_cannot_serialize() {
        assert!(node(json!({"prim": "nat"})).to_micheline().is_err());
        assert!(node(json!({"prim": "never"})).parse_value(&Micheline::unit()).is_err());
    }
}
