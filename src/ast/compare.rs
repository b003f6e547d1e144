//! Michelson ordering of settled comparable values.
use std::cmp::Ordering;

use super::value::split_entrypoint;
use super::{Node, Step, Ty};
use crate::encoding;
use crate::error::{Error, Result};
use crate::forge;

fn settled<'a, T>(node: &Node, v: &'a Option<T>) -> Result<&'a T> {
    v.as_ref()
        .ok_or_else(|| Error::invalid_value(node.label(), "cannot compare an unsettled value"))
}

/// Addresses order by their forged form (implicit before originated), then
/// by entrypoint suffix.
fn address_key(address: &str) -> Result<(Vec<u8>, String)> {
    let (base, entrypoint) = split_entrypoint(address);
    Ok((forge::forge_address(base)?, entrypoint.unwrap_or_default().to_string()))
}

impl Node {
    pub fn compare(&self, other: &Node) -> Result<Ordering> {
        let ord = match (&self.ty, &other.ty) {
            (Ty::Int(a), Ty::Int(b)) | (Ty::Nat(a), Ty::Nat(b)) | (Ty::Mutez(a), Ty::Mutez(b)) => {
                settled(self, a)?.cmp(settled(other, b)?)
            }
            (Ty::Bool(a), Ty::Bool(b)) => settled(self, a)?.cmp(settled(other, b)?),
            (Ty::String(a), Ty::String(b)) => settled(self, a)?.cmp(settled(other, b)?),
            (Ty::Bytes(a), Ty::Bytes(b)) => settled(self, a)?.cmp(settled(other, b)?),
            (Ty::Timestamp(a), Ty::Timestamp(b)) => settled(self, a)?.cmp(settled(other, b)?),
            (Ty::Address(a), Ty::Address(b)) => {
                address_key(settled(self, a)?)?.cmp(&address_key(settled(other, b)?)?)
            }
            (Ty::KeyHash(a), Ty::KeyHash(b)) => forge::forge_public_key_hash(settled(self, a)?)?
                .cmp(&forge::forge_public_key_hash(settled(other, b)?)?),
            (Ty::Key(a), Ty::Key(b)) => {
                forge::forge_public_key(settled(self, a)?)?.cmp(&forge::forge_public_key(settled(other, b)?)?)
            }
            (Ty::Signature(a), Ty::Signature(b)) | (Ty::ChainId(a), Ty::ChainId(b)) => {
                encoding::decode(settled(self, a)?)?.cmp(&encoding::decode(settled(other, b)?)?)
            }
            (Ty::Unit(a), Ty::Unit(b)) => {
                settled(self, a)?;
                settled(other, b)?;
                Ordering::Equal
            }
            (Ty::Never, Ty::Never) => Ordering::Equal,
            (Ty::Pair(l1, r1), Ty::Pair(l2, r2)) => match l1.compare(l2)? {
                Ordering::Equal => r1.compare(r2)?,
                ord => ord,
            },
            (Ty::Or { left: l1, right: r1, side: s1 }, Ty::Or { left: l2, right: r2, side: s2 }) => {
                match (settled(self, s1)?, settled(other, s2)?) {
                    (Step::Left, Step::Left) => l1.compare(l2)?,
                    (Step::Right, Step::Right) => r1.compare(r2)?,
                    (Step::Left, Step::Right) => Ordering::Less,
                    (Step::Right, Step::Left) => Ordering::Greater,
                }
            }
            (Ty::Option { inner: i1, some: s1 }, Ty::Option { inner: i2, some: s2 }) => {
                match (settled(self, s1)?, settled(other, s2)?) {
                    (true, true) => i1.compare(i2)?,
                    (a, b) => a.cmp(b),
                }
            }
            _ => {
                return Err(Error::TypeIsNotComparable(format!(
                    "{} vs {}",
                    self.to_type(),
                    other.to_type()
                )));
            }
        };
        Ok(ord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::micheline::Micheline;
    use serde_json::json;

    fn settled_node(ty: serde_json::Value, v: Micheline) -> Node {
        let mut n = Node::from_type(&serde_json::from_value(ty).unwrap()).unwrap();
        n.parse_value(&v).unwrap();
        n
    }

    #[test]
    fn orders_numbers_and_strings() {
        let a = settled_node(json!({"prim": "int"}), Micheline::int(-5));
        let b = settled_node(json!({"prim": "int"}), Micheline::int(3));
        assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
        assert_eq!(b.compare(&b).unwrap(), Ordering::Equal);

        let x = settled_node(json!({"prim": "string"}), Micheline::string("abc"));
        let y = settled_node(json!({"prim": "string"}), Micheline::string("abd"));
        assert_eq!(y.compare(&x).unwrap(), Ordering::Greater);
    }

    #[test]
    fn implicit_addresses_sort_before_contracts() {
        let tz = settled_node(json!({"prim": "address"}), Micheline::string("tz1Ke3u9SqxvnkdNkgaCmydXg3zh3iaKNDxw"));
        let kt = settled_node(json!({"prim": "address"}), Micheline::string("KT18anmnvhqTsgqTwasxpLKYWcLJnGRX3m2D"));
        assert_eq!(tz.compare(&kt).unwrap(), Ordering::Less);
    }

    #[test]
    fn pairs_are_lexicographic() {
        let ty = json!({"prim": "pair", "args": [{"prim": "nat"}, {"prim": "string"}]});
        let a = settled_node(ty.clone(), Micheline::pair(Micheline::int(1), Micheline::string("z")));
        let b = settled_node(ty, Micheline::pair(Micheline::int(2), Micheline::string("a")));
        assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
    }

    #[test]
    fn left_before_right_and_none_before_some() {
        let or = json!({"prim": "or", "args": [{"prim": "nat"}, {"prim": "nat"}]});
        let l = settled_node(or.clone(), Micheline::left(Micheline::int(9)));
        let r = settled_node(or, Micheline::right(Micheline::int(0)));
        assert_eq!(l.compare(&r).unwrap(), Ordering::Less);

        let opt = json!({"prim": "option", "args": [{"prim": "nat"}]});
        let none = settled_node(opt.clone(), Micheline::none());
        let some = settled_node(opt, Micheline::some(Micheline::int(0)));
        assert_eq!(none.compare(&some).unwrap(), Ordering::Less);
    }

    #[test]
    fn non_comparable_kinds() {
        let a = settled_node(json!({"prim": "list", "args": [{"prim": "nat"}]}), Micheline::Seq(vec![]));
        assert!(matches!(a.compare(&a), Err(Error::TypeIsNotComparable(_))));
        let n = settled_node(json!({"prim": "nat"}), Micheline::int(1));
        let s = settled_node(json!({"prim": "string"}), Micheline::string("1"));
        assert!(matches!(n.compare(&s), Err(Error::TypeIsNotComparable(_))));
    }
}
