//! Human documentation of types: short type strings and typedef listings.
use serde::Serialize;

use super::schema::field_key;
use super::{Node, Ty};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TypeArg {
    pub key: String,
    pub value: String,
}

/// One named definition. Pairs list their fields, `or` lists its variants;
/// everything else is described inline in `type_`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TypeDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TypeArg>,
}

impl Node {
    /// Short human type string, e.g. `map(address, nat)`.
    pub fn describe(&self) -> String {
        match &self.ty {
            Ty::Contract { param, .. } => format!("contract({param})"),
            Ty::Lambda { param, ret, .. } => format!("lambda({param}, {ret})"),
            Ty::Ticket { content, .. } => format!("ticket({})", content.describe()),
            Ty::SaplingState { memo_size, .. } => format!("sapling_state({memo_size})"),
            Ty::SaplingTransaction { memo_size, .. } => format!("sapling_transaction({memo_size})"),
            Ty::Pair(..) => {
                let fields: Vec<_> = self.flat_fields().iter().map(|f| f.describe()).collect();
                format!("pair({})", fields.join(", "))
            }
            Ty::Or { left, right, .. } => format!("or({}, {})", left.describe(), right.describe()),
            Ty::Option { inner, .. } => format!("option({})", inner.describe()),
            Ty::List { item, .. } => format!("list({})", item.describe()),
            Ty::Set { item, .. } => format!("set({})", item.describe()),
            Ty::Map { key, value, .. } => format!("map({}, {})", key.describe(), value.describe()),
            Ty::BigMap { key, value, .. } => format!("big_map({}, {})", key.describe(), value.describe()),
            _ => self.prim().as_str().to_string(),
        }
    }

    /// Typedefs for this node under `name`, parents before children.
    pub fn docs(&self, name: &str) -> Vec<TypeDoc> {
        let mut out = Vec::new();
        if self.is_pair() || self.is_or() {
            define(self, name.to_string(), &mut out);
        } else {
            let type_ = reference(self, &mut out);
            out.insert(0, TypeDoc { name: name.to_string(), type_, args: Vec::new() });
        }
        out
    }
}

/// `$name` for pairs and ors (pushing their definition), inline otherwise.
fn reference(node: &Node, out: &mut Vec<TypeDoc>) -> String {
    match &node.ty {
        Ty::Pair(..) | Ty::Or { .. } => {
            let base = node.name.clone().unwrap_or_else(|| node.prim().as_str().to_string());
            let name = unique(&base, out);
            define(node, name.clone(), out);
            format!("${name}")
        }
        Ty::Ticket { content, .. } => format!("ticket({})", reference(content, out)),
        Ty::Option { inner, .. } => format!("option({})", reference(inner, out)),
        Ty::List { item, .. } => format!("list({})", reference(item, out)),
        Ty::Set { item, .. } => format!("set({})", reference(item, out)),
        Ty::Map { key, value, .. } => format!("map({}, {})", reference(key, out), reference(value, out)),
        Ty::BigMap { key, value, .. } => format!("big_map({}, {})", reference(key, out), reference(value, out)),
        _ => node.describe(),
    }
}

fn unique(base: &str, out: &[TypeDoc]) -> String {
    if !out.iter().any(|d| d.name == base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{base}_{i}"))
        .find(|candidate| !out.iter().any(|d| d.name == *candidate))
        .unwrap_or_else(|| base.to_string())
}

fn define(node: &Node, name: String, out: &mut Vec<TypeDoc>) {
    let idx = out.len();
    out.push(TypeDoc { name, type_: String::new(), args: Vec::new() });
    let (type_, args) = match &node.ty {
        Ty::Pair(..) => {
            let args = node
                .flat_fields()
                .into_iter()
                .enumerate()
                .map(|(i, f)| TypeArg { key: field_key(f, i), value: reference(f, out) })
                .collect::<Vec<_>>();
            ("object", args)
        }
        _ => {
            let mut variants = Vec::new();
            or_variants(node, &mut variants);
            let args = variants
                .into_iter()
                .enumerate()
                .map(|(i, v)| TypeArg { key: field_key(v, i), value: reference(v, out) })
                .collect::<Vec<_>>();
            ("or", args)
        }
    };
    out[idx].type_ = type_.to_string();
    out[idx].args = args;
}

/// Variants of an `or`, flattening unnamed nested ors.
fn or_variants<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    if let Ty::Or { left, right, .. } = &node.ty {
        for child in [left, right] {
            if child.is_or() && child.name.is_none() {
                or_variants(child, out);
            } else {
                out.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(ty: serde_json::Value) -> Node {
        Node::from_type(&serde_json::from_value(ty).unwrap()).unwrap()
    }

    #[test]
    fn describes_nested_types() {
        let n = node(json!({"prim": "big_map", "args": [
            {"prim": "address"},
            {"prim": "option", "args": [{"prim": "list", "args": [{"prim": "nat"}]}]}
        ]}));
        assert_eq!(n.describe(), "big_map(address, option(list(nat)))");
        let c = node(json!({"prim": "contract", "args": [{"prim": "unit"}]}));
        assert_eq!(c.describe(), "contract(unit)");
    }

    #[test]
    fn typedefs_for_pairs_and_ors() {
        let n = node(json!({"prim": "pair", "args": [
            {"prim": "address", "annots": ["%to"]},
            {"prim": "list", "args": [{"prim": "pair", "args": [
                {"prim": "nat", "annots": ["%token_id"]},
                {"prim": "nat", "annots": ["%amount"]}
            ]}], "annots": ["%txs"]}
        ]}));
        let docs = n.docs("transfer");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name, "transfer");
        assert_eq!(docs[0].type_, "object");
        assert_eq!(
            docs[0].args,
            vec![
                TypeArg { key: "to".into(), value: "address".into() },
                TypeArg { key: "txs".into(), value: "list($pair)".into() },
            ]
        );
        assert_eq!(docs[1].name, "pair");
        assert_eq!(docs[1].args[1].key, "amount");
    }

    #[test]
    fn or_variants_flatten_unnamed_ors() {
        let n = node(json!({"prim": "or", "args": [
            {"prim": "unit", "annots": ["%pause"]},
            {"prim": "or", "args": [{"prim": "nat", "annots": ["%mint"]}, {"prim": "nat", "annots": ["%burn"]}]}
        ]}));
        let docs = n.docs("parameter");
        assert_eq!(docs.len(), 1);
        let keys: Vec<_> = docs[0].args.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["pause", "mint", "burn"]);
    }

    #[test]
    fn leaf_docs_are_inline() {
        let docs = node(json!({"prim": "map", "args": [{"prim": "string"}, {"prim": "bytes"}]})).docs("metadata");
        assert_eq!(docs, vec![TypeDoc { name: "metadata".into(), type_: "map(string, bytes)".into(), args: vec![] }]);
    }
}
