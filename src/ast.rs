//! Typed Michelson values.
//!
//! A [`Node`] is one position in a type: a field name plus a [`Ty`] carrying
//! the kind, its children, and (once settled) the literal payload. A
//! [`TypedTree`] owns the root nodes and the settle-once lifecycle.
//!
//! Pipeline:
//! - build from a type expression ([`Node::from_type`]) or a JSON schema
//!   document ([`Node::from_json_schema`]);
//! - settle against a value document ([`TypedTree::settle`]) or form data
//!   ([`TypedTree::from_json`]);
//! - project, compare, diff, resolve entrypoints, enrich big maps, forge.
pub mod big_map;
pub mod compare;
pub mod docs;
pub mod entrypoint;
pub mod miguel;
pub mod schema;
pub mod tree;
pub mod value;

use chrono::{DateTime, Utc};
use num_bigint::BigInt;

pub use big_map::BigMapDiff;
pub use docs::{TypeArg, TypeDoc};
pub use entrypoint::{Entrypoint, Path, Step};
pub use miguel::{DiffKind, MiguelNode};
pub use tree::TypedTree;

use crate::error::{Error, Result};
use crate::micheline::Micheline;

// ------------------------------ Primitives ------------------------------- //

/// Kind discriminator, decoded once from a type prim or a schema tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Prim {
    Int,
    Nat,
    Mutez,
    Bool,
    String,
    Bytes,
    Address,
    Contract,
    KeyHash,
    Key,
    Signature,
    ChainId,
    Timestamp,
    Unit,
    Never,
    Lambda,
    Ticket,
    SaplingState,
    SaplingTransaction,
    Pair,
    Or,
    Option,
    List,
    Set,
    Map,
    BigMap,
    Bls12381Fr,
    Bls12381G1,
    Bls12381G2,
    Chest,
    ChestKey,
    TxRollupL2Address,
    Operation,
}

impl Prim {
    pub fn parse(s: &str) -> Result<Self> {
        let prim = match s {
            "int" => Self::Int,
            "nat" => Self::Nat,
            "mutez" => Self::Mutez,
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            "address" => Self::Address,
            "contract" => Self::Contract,
            "key_hash" => Self::KeyHash,
            "key" => Self::Key,
            "signature" => Self::Signature,
            "chain_id" => Self::ChainId,
            "timestamp" => Self::Timestamp,
            "unit" => Self::Unit,
            "never" => Self::Never,
            "lambda" => Self::Lambda,
            "ticket" => Self::Ticket,
            "sapling_state" => Self::SaplingState,
            "sapling_transaction" | "sapling_transaction_deprecated" => Self::SaplingTransaction,
            "pair" => Self::Pair,
            "or" => Self::Or,
            "option" => Self::Option,
            "list" => Self::List,
            "set" => Self::Set,
            "map" => Self::Map,
            "big_map" => Self::BigMap,
            "bls12_381_fr" => Self::Bls12381Fr,
            "bls12_381_g1" => Self::Bls12381G1,
            "bls12_381_g2" => Self::Bls12381G2,
            "chest" => Self::Chest,
            "chest_key" => Self::ChestKey,
            "tx_rollup_l2_address" => Self::TxRollupL2Address,
            "operation" => Self::Operation,
            other => return Err(Error::UnknownSchemaType(other.to_string())),
        };
        Ok(prim)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Nat => "nat",
            Self::Mutez => "mutez",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Address => "address",
            Self::Contract => "contract",
            Self::KeyHash => "key_hash",
            Self::Key => "key",
            Self::Signature => "signature",
            Self::ChainId => "chain_id",
            Self::Timestamp => "timestamp",
            Self::Unit => "unit",
            Self::Never => "never",
            Self::Lambda => "lambda",
            Self::Ticket => "ticket",
            Self::SaplingState => "sapling_state",
            Self::SaplingTransaction => "sapling_transaction",
            Self::Pair => "pair",
            Self::Or => "or",
            Self::Option => "option",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
            Self::BigMap => "big_map",
            Self::Bls12381Fr => "bls12_381_fr",
            Self::Bls12381G1 => "bls12_381_g1",
            Self::Bls12381G2 => "bls12_381_g2",
            Self::Chest => "chest",
            Self::ChestKey => "chest_key",
            Self::TxRollupL2Address => "tx_rollup_l2_address",
            Self::Operation => "operation",
        }
    }
}

// --------------------------------- Node ---------------------------------- //

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// `%field` annotation, falling back to `:type`.
    pub name: Option<String>,
    pub ty: Ty,
}

/// One variant per kind. Leaf payloads are `None` until settled; composite
/// kinds keep type-only templates next to their settled children.
#[derive(Clone, Debug, PartialEq)]
pub enum Ty {
    Int(Option<BigInt>),
    Nat(Option<BigInt>),
    Mutez(Option<BigInt>),
    Bool(Option<bool>),
    String(Option<String>),
    Bytes(Option<Vec<u8>>),
    Address(Option<String>),
    Contract { param: Box<Micheline>, value: Option<String> },
    KeyHash(Option<String>),
    Key(Option<String>),
    Signature(Option<String>),
    ChainId(Option<String>),
    Timestamp(Option<DateTime<Utc>>),
    Unit(Option<()>),
    Never,
    Lambda { param: Box<Micheline>, ret: Box<Micheline>, code: Option<Micheline> },
    Ticket { content: Box<Node>, ticketer: Option<String>, amount: Option<BigInt> },
    /// Settled as the state's big-map id, or `None` for an empty literal.
    SaplingState { memo_size: u16, id: Option<BigInt> },
    SaplingTransaction { memo_size: u16, value: Option<Vec<u8>> },
    Pair(Box<Node>, Box<Node>),
    /// `side` records which branch the settled value took.
    Or { left: Box<Node>, right: Box<Node>, side: Option<Step> },
    /// `some` is `Some(true)` when settled to `Some x`, `Some(false)` for `None`.
    Option { inner: Box<Node>, some: Option<bool> },
    List { item: Box<Node>, items: Vec<Node> },
    Set { item: Box<Node>, items: Vec<Node> },
    Map { key: Box<Node>, value: Box<Node>, entries: Vec<(Node, Node)> },
    BigMap { key: Box<Node>, value: Box<Node>, ptr: Option<i64>, entries: Vec<(Node, Node)> },
    /// Leaf kinds without structure of their own (curve points, chests,
    /// rollup addresses, operations), kept as the literal they were given.
    Opaque { prim: Prim, value: Option<Micheline> },
}

fn expect_args<'a>(ty: &'a Micheline, prim: Prim, n: usize) -> Result<&'a [Micheline]> {
    let args = ty.args();
    if args.len() != n {
        return Err(Error::InvalidSchema(format!(
            "`{}` expects {n} argument(s), got {}",
            prim.as_str(),
            args.len()
        )));
    }
    Ok(args)
}

fn memo_size(arg: &Micheline) -> Result<u16> {
    match arg {
        Micheline::Int(n) => n
            .to_string()
            .parse()
            .map_err(|_| Error::InvalidSchema(format!("memo size {n} out of range"))),
        other => Err(Error::InvalidSchema(format!("memo size must be an int, got {other}"))),
    }
}

impl Node {
    pub fn new(name: Option<String>, ty: Ty) -> Self {
        Self { name, ty }
    }

    /// Build a type-only node from a Michelson type expression.
    pub fn from_type(ty: &Micheline) -> Result<Self> {
        let Micheline::Prim { prim, .. } = ty else {
            return Err(Error::UnknownSchemaType(format!("expected a type primitive, got {ty}")));
        };
        // script sections wrap the actual type
        if prim == "parameter" || prim == "storage" {
            let arg = ty.args().first().ok_or_else(|| Error::InvalidSchema(format!("empty `{prim}` section")))?;
            return Self::from_type(arg);
        }
        let name = ty.field_annot().or_else(|| ty.type_annot()).map(str::to_string);
        let kind = Prim::parse(prim)?;
        let boxed = |m: &Micheline| Self::from_type(m).map(Box::new);
        let node_ty = match kind {
            Prim::Int => Ty::Int(None),
            Prim::Nat => Ty::Nat(None),
            Prim::Mutez => Ty::Mutez(None),
            Prim::Bool => Ty::Bool(None),
            Prim::String => Ty::String(None),
            Prim::Bytes => Ty::Bytes(None),
            Prim::Address => Ty::Address(None),
            Prim::KeyHash => Ty::KeyHash(None),
            Prim::Key => Ty::Key(None),
            Prim::Signature => Ty::Signature(None),
            Prim::ChainId => Ty::ChainId(None),
            Prim::Timestamp => Ty::Timestamp(None),
            Prim::Unit => Ty::Unit(None),
            Prim::Never => Ty::Never,
            Prim::Bls12381Fr
            | Prim::Bls12381G1
            | Prim::Bls12381G2
            | Prim::Chest
            | Prim::ChestKey
            | Prim::TxRollupL2Address
            | Prim::Operation => {
                expect_args(ty, kind, 0)?;
                Ty::Opaque { prim: kind, value: None }
            }
            Prim::Contract => {
                let args = expect_args(ty, kind, 1)?;
                Ty::Contract { param: Box::new(args[0].clone()), value: None }
            }
            Prim::Lambda => {
                let args = expect_args(ty, kind, 2)?;
                Ty::Lambda { param: Box::new(args[0].clone()), ret: Box::new(args[1].clone()), code: None }
            }
            Prim::Ticket => {
                let args = expect_args(ty, kind, 1)?;
                Ty::Ticket { content: boxed(&args[0])?, ticketer: None, amount: None }
            }
            Prim::SaplingState => {
                let args = expect_args(ty, kind, 1)?;
                Ty::SaplingState { memo_size: memo_size(&args[0])?, id: None }
            }
            Prim::SaplingTransaction => {
                let args = expect_args(ty, kind, 1)?;
                Ty::SaplingTransaction { memo_size: memo_size(&args[0])?, value: None }
            }
            Prim::Pair => {
                let args = ty.args();
                match args.len() {
                    0 | 1 => {
                        return Err(Error::InvalidSchema(format!("`pair` expects at least 2 arguments, got {}", args.len())));
                    }
                    2 => Ty::Pair(boxed(&args[0])?, boxed(&args[1])?),
                    // right comb: pair a b c == pair a (pair b c)
                    _ => {
                        let rest = Micheline::prim("pair", args[1..].to_vec());
                        Ty::Pair(boxed(&args[0])?, boxed(&rest)?)
                    }
                }
            }
            Prim::Or => {
                let args = expect_args(ty, kind, 2)?;
                Ty::Or { left: boxed(&args[0])?, right: boxed(&args[1])?, side: None }
            }
            Prim::Option => {
                let args = expect_args(ty, kind, 1)?;
                Ty::Option { inner: boxed(&args[0])?, some: None }
            }
            Prim::List => {
                let args = expect_args(ty, kind, 1)?;
                Ty::List { item: boxed(&args[0])?, items: Vec::new() }
            }
            Prim::Set => {
                let args = expect_args(ty, kind, 1)?;
                Ty::Set { item: boxed(&args[0])?, items: Vec::new() }
            }
            Prim::Map => {
                let args = expect_args(ty, kind, 2)?;
                Ty::Map { key: boxed(&args[0])?, value: boxed(&args[1])?, entries: Vec::new() }
            }
            Prim::BigMap => {
                let args = expect_args(ty, kind, 2)?;
                Ty::BigMap { key: boxed(&args[0])?, value: boxed(&args[1])?, ptr: None, entries: Vec::new() }
            }
        };
        Ok(Self { name, ty: node_ty })
    }

    pub fn prim(&self) -> Prim {
        match &self.ty {
            Ty::Int(_) => Prim::Int,
            Ty::Nat(_) => Prim::Nat,
            Ty::Mutez(_) => Prim::Mutez,
            Ty::Bool(_) => Prim::Bool,
            Ty::String(_) => Prim::String,
            Ty::Bytes(_) => Prim::Bytes,
            Ty::Address(_) => Prim::Address,
            Ty::Contract { .. } => Prim::Contract,
            Ty::KeyHash(_) => Prim::KeyHash,
            Ty::Key(_) => Prim::Key,
            Ty::Signature(_) => Prim::Signature,
            Ty::ChainId(_) => Prim::ChainId,
            Ty::Timestamp(_) => Prim::Timestamp,
            Ty::Unit(_) => Prim::Unit,
            Ty::Never => Prim::Never,
            Ty::Lambda { .. } => Prim::Lambda,
            Ty::Ticket { .. } => Prim::Ticket,
            Ty::SaplingState { .. } => Prim::SaplingState,
            Ty::SaplingTransaction { .. } => Prim::SaplingTransaction,
            Ty::Pair(..) => Prim::Pair,
            Ty::Or { .. } => Prim::Or,
            Ty::Option { .. } => Prim::Option,
            Ty::List { .. } => Prim::List,
            Ty::Set { .. } => Prim::Set,
            Ty::Map { .. } => Prim::Map,
            Ty::BigMap { .. } => Prim::BigMap,
            Ty::Opaque { prim, .. } => *prim,
        }
    }

    /// Field name if annotated, else the primitive. Used in error messages.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.prim().as_str().to_string())
    }

    pub fn is_pair(&self) -> bool {
        matches!(self.ty, Ty::Pair(..))
    }

    pub fn is_or(&self) -> bool {
        matches!(self.ty, Ty::Or { .. })
    }

    /// An unnamed pair nested on the right is flattened into its parent's
    /// fields, mirroring Michelson's `pair a b c` comb sugar.
    pub(crate) fn is_comb_tail(&self) -> bool {
        self.is_pair() && self.name.is_none()
    }

    /// Fields of a pair with the right comb flattened.
    pub fn flat_fields(&self) -> Vec<&Node> {
        match &self.ty {
            Ty::Pair(left, right) => {
                let mut out = vec![left.as_ref()];
                if right.is_comb_tail() {
                    out.extend(right.flat_fields());
                } else {
                    out.push(right.as_ref());
                }
                out
            }
            _ => vec![self],
        }
    }

    /// Render the type back to Michelson, field annotations included.
    pub fn to_type(&self) -> Micheline {
        let annots = self.name.iter().map(|n| format!("%{n}")).collect();
        let args = match &self.ty {
            Ty::Contract { param, .. } => vec![param.as_ref().clone()],
            Ty::Lambda { param, ret, .. } => vec![param.as_ref().clone(), ret.as_ref().clone()],
            Ty::Ticket { content, .. } => vec![content.to_type()],
            Ty::SaplingState { memo_size, .. } | Ty::SaplingTransaction { memo_size, .. } => {
                vec![Micheline::int(*memo_size)]
            }
            Ty::Pair(left, right) => vec![left.to_type(), right.to_type()],
            Ty::Or { left, right, .. } => vec![left.to_type(), right.to_type()],
            Ty::Option { inner, .. } => vec![inner.to_type()],
            Ty::List { item, .. } | Ty::Set { item, .. } => vec![item.to_type()],
            Ty::Map { key, value, .. } | Ty::BigMap { key, value, .. } => vec![key.to_type(), value.to_type()],
            _ => Vec::new(),
        };
        Micheline::prim_with_annots(self.prim().as_str(), args, annots)
    }

    /// Structural type equality: same shape, annotations and values ignored.
    pub fn equal_type(&self, other: &Node) -> bool {
        self.to_type().strip_annots() == other.to_type().strip_annots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ty(v: serde_json::Value) -> Micheline {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn builds_nested_types_with_names() {
        let node = Node::from_type(&ty(json!({
            "prim": "pair",
            "args": [
                {"prim": "address", "annots": ["%owner"]},
                {"prim": "big_map", "args": [{"prim": "nat"}, {"prim": "bytes"}], "annots": [":ledger"]}
            ]
        })))
        .unwrap();
        let fields = node.flat_fields();
        assert_eq!(fields[0].name.as_deref(), Some("owner"));
        assert_eq!(fields[1].name.as_deref(), Some("ledger"));
        assert_eq!(fields[1].prim(), Prim::BigMap);
    }

    #[test]
    fn n_ary_pair_is_right_combed() {
        let node = Node::from_type(&ty(json!({
            "prim": "pair", "args": [{"prim": "nat"}, {"prim": "int"}, {"prim": "string"}]
        })))
        .unwrap();
        let Ty::Pair(_, right) = &node.ty else { panic!("pair expected") };
        assert!(right.is_pair());
        let prims: Vec<_> = node.flat_fields().iter().map(|n| n.prim()).collect();
        assert_eq!(prims, vec![Prim::Nat, Prim::Int, Prim::String]);
    }

    #[test]
    fn unknown_and_malformed_types() {
        assert!(matches!(Node::from_type(&ty(json!({"prim": "foo"}))), Err(Error::UnknownSchemaType(_))));
        assert!(matches!(
            Node::from_type(&ty(json!({"prim": "or", "args": [{"prim": "nat"}]}))),
            Err(Error::InvalidSchema(_))
        ));
        assert!(Node::from_type(&Micheline::int(1)).is_err());
    }

    #[test]
    fn storage_section_is_unwrapped() {
        let node = Node::from_type(&ty(json!({"prim": "storage", "args": [{"prim": "nat"}]}))).unwrap();
        assert_eq!(node.prim(), Prim::Nat);
    }

    #[test]
    fn equal_type_ignores_annotations() {
        let a = Node::from_type(&ty(json!({"prim": "map", "args": [{"prim": "address", "annots": ["%owner"]}, {"prim": "nat"}]}))).unwrap();
        let b = Node::from_type(&ty(json!({"prim": "map", "args": [{"prim": "address"}, {"prim": "nat", "annots": ["%balance"]}]}))).unwrap();
        let c = Node::from_type(&ty(json!({"prim": "map", "args": [{"prim": "address"}, {"prim": "int"}]}))).unwrap();
        assert!(a.equal_type(&b));
        assert!(!a.equal_type(&c));
    }

    #[test]
    fn to_type_roundtrips() {
        let src = ty(json!({
            "prim": "or",
            "args": [
                {"prim": "lambda", "args": [{"prim": "unit"}, {"prim": "nat"}], "annots": ["%run"]},
                {"prim": "sapling_state", "args": [{"int": "8"}], "annots": ["%state"]}
            ]
        }));
        assert_eq!(Node::from_type(&src).unwrap().to_type(), src);
    }

    #[test]
    fn opaque_leaf_kinds() {
        for prim in ["bls12_381_fr", "bls12_381_g1", "bls12_381_g2", "chest", "chest_key", "tx_rollup_l2_address", "operation"] {
            let node = Node::from_type(&ty(json!({"prim": prim}))).unwrap();
            assert_eq!(node.prim().as_str(), prim);
            assert_eq!(Node::from_json_schema(&node.json_schema()).unwrap(), node);
        }

        let mut fr = Node::from_type(&ty(json!({"prim": "bls12_381_fr", "annots": ["%scalar"]}))).unwrap();
        fr.parse_value(&Micheline::bytes(vec![0x01, 0x02])).unwrap();
        assert_eq!(fr.to_micheline().unwrap(), Micheline::bytes(vec![0x01, 0x02]));

        let mut chest = Node::from_type(&ty(json!({"prim": "chest"}))).unwrap();
        assert!(matches!(chest.parse_value(&Micheline::string("x")), Err(Error::InvalidValue { .. })));
        assert!(Node::from_type(&ty(json!({"prim": "chest", "args": [{"prim": "nat"}]}))).is_err());
    }
}
