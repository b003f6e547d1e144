//! Human-oriented diff between two settled values of the same type.
//!
//! A [`MiguelNode`] mirrors the value tree: leaves carry their literal as
//! JSON, composites carry children. Each node is tagged with how it changed
//! relative to the previous value.
use serde::Serialize;
use serde_json::Value;

use super::{Node, Step, Ty};
use crate::error::Result;
use crate::micheline::Micheline;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Create,
    Update,
    Delete,
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MiguelNode {
    pub prim: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Previous literal of an updated leaf.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    pub kind: DiffKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MiguelNode>,
}

impl MiguelNode {
    /// Every node of the subtree, depth first.
    pub fn walk(&self) -> Vec<&MiguelNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

fn shell(node: &Node, name: Option<String>, kind: DiffKind) -> MiguelNode {
    MiguelNode {
        prim: node.prim().as_str().to_string(),
        type_: node.describe(),
        name: name.or_else(|| node.name.clone()),
        value: None,
        from: None,
        kind,
        children: Vec::new(),
    }
}

fn composite_kind(prev: Option<&Node>, children: &[MiguelNode]) -> DiffKind {
    match prev {
        None => DiffKind::Create,
        Some(_) if children.iter().all(|c| c.kind == DiffKind::Unchanged) => DiffKind::Unchanged,
        Some(_) => DiffKind::Update,
    }
}

/// Keyed entries of a settled collection: `(key text, key, value)`.
fn keyed(node: &Node) -> Result<Vec<(String, Micheline, Option<&Node>)>> {
    match &node.ty {
        Ty::Set { items, .. } => items
            .iter()
            .map(|i| i.to_micheline().map(|k| (k.to_string(), k, None)))
            .collect(),
        Ty::Map { entries, .. } | Ty::BigMap { entries, .. } => entries
            .iter()
            .map(|(k, v)| k.to_micheline().map(|m| (m.to_string(), m, Some(v))))
            .collect(),
        _ => Ok(Vec::new()),
    }
}

impl Node {
    /// Literal of a leaf as JSON; `None` for composites.
    pub fn literal(&self) -> Option<Value> {
        let v = match &self.ty {
            Ty::Int(v) | Ty::Nat(v) | Ty::Mutez(v) => Value::String(v.as_ref()?.to_string()),
            Ty::Bool(v) => Value::Bool((*v)?),
            Ty::String(v) | Ty::Address(v) | Ty::KeyHash(v) | Ty::Key(v) | Ty::Signature(v) | Ty::ChainId(v) => {
                Value::String(v.clone()?)
            }
            Ty::Contract { value, .. } => Value::String(value.clone()?),
            Ty::Bytes(v) | Ty::SaplingTransaction { value: v, .. } => Value::String(hex::encode(v.as_ref()?)),
            Ty::Timestamp(v) => Value::String(v.as_ref()?.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
            Ty::Unit(v) => {
                (*v)?;
                Value::String("Unit".into())
            }
            Ty::Lambda { code, .. } | Ty::Opaque { value: code, .. } => Value::from(code.as_ref()?),
            Ty::Ticket { .. } => Value::from(&self.to_micheline().ok()?),
            Ty::SaplingState { id, .. } => id.as_ref().map_or(Value::Null, |n| Value::String(n.to_string())),
            Ty::BigMap { ptr: Some(p), entries, .. } if entries.is_empty() => Value::from(*p),
            _ => return None,
        };
        Some(v)
    }

    /// Diff this settled node against `prev` (same type), or mark it all
    /// created when there is no previous value.
    pub fn to_miguel(&self, prev: Option<&Node>, name: Option<String>) -> Result<MiguelNode> {
        if let Some(value) = self.literal().filter(|_| !self.same_big_map_loaded(prev)) {
            let previous = prev.and_then(Node::literal);
            let kind = match &previous {
                None => DiffKind::Create,
                Some(p) if *p == value => DiffKind::Unchanged,
                Some(_) => DiffKind::Update,
            };
            let mut out = shell(self, name, kind);
            out.from = previous.filter(|_| kind == DiffKind::Update);
            out.value = Some(value);
            return Ok(out);
        }
        let children = match (&self.ty, prev.map(|p| &p.ty)) {
            (Ty::Pair(..), _) => {
                let fields = self.flat_fields();
                let before = prev.map(Node::flat_fields).unwrap_or_default();
                fields
                    .iter()
                    .enumerate()
                    .map(|(i, f)| f.to_miguel(before.get(i).copied(), None))
                    .collect::<Result<Vec<_>>>()?
            }
            (Ty::Or { left, right, side }, previous) => {
                let (cur, cur_side) = match side {
                    Some(Step::Left) => (left.as_ref(), Step::Left),
                    _ => (right.as_ref(), Step::Right),
                };
                match previous {
                    Some(Ty::Or { left: pl, right: pr, side: ps }) if *ps == Some(cur_side) => {
                        let before: &Node = if cur_side == Step::Left { pl } else { pr };
                        vec![cur.to_miguel(Some(before), None)?]
                    }
                    Some(Ty::Or { left: pl, right: pr, side: Some(ps) }) => {
                        let before: &Node = if *ps == Step::Left { pl } else { pr };
                        vec![cur.to_miguel(None, None)?, deleted(before, None)?]
                    }
                    _ => vec![cur.to_miguel(None, None)?],
                }
            }
            (Ty::Option { inner, some }, previous) => {
                let before = match previous {
                    Some(Ty::Option { inner: pi, some: Some(true) }) => Some(pi.as_ref()),
                    _ => None,
                };
                match (some, before) {
                    (Some(true), before) => vec![inner.to_miguel(before, None)?],
                    (_, Some(b)) => vec![deleted(b, None)?],
                    _ => Vec::new(),
                }
            }
            (Ty::List { items, .. }, previous) => {
                let before: &[Node] = match previous {
                    Some(Ty::List { items: p, .. }) => p,
                    _ => &[],
                };
                let mut out = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| item.to_miguel(before.get(i), Some(i.to_string())))
                    .collect::<Result<Vec<_>>>()?;
                for (i, gone) in before.iter().enumerate().skip(items.len()) {
                    out.push(deleted(gone, Some(i.to_string()))?);
                }
                out
            }
            (Ty::Set { .. } | Ty::Map { .. } | Ty::BigMap { .. }, _) => {
                let current = keyed(self)?;
                let previous = prev.map(keyed).transpose()?.unwrap_or_default();
                let mut out = Vec::new();
                for (text, key, value) in &current {
                    let before = previous.iter().find(|(_, k, _)| k == key);
                    let child = match (value, before) {
                        (Some(v), Some((_, _, pv))) => v.to_miguel(*pv, Some(text.clone()))?,
                        (Some(v), None) => v.to_miguel(None, Some(text.clone()))?,
                        // set members are their own key
                        (None, found) => {
                            let kind = if found.is_some() { DiffKind::Unchanged } else { DiffKind::Create };
                            member(self, text, kind)
                        }
                    };
                    out.push(child);
                }
                for (text, key, value) in &previous {
                    if current.iter().any(|(_, k, _)| k == key) {
                        continue;
                    }
                    out.push(match value {
                        Some(v) => deleted(v, Some(text.clone()))?,
                        None => member(prev.unwrap_or(self), text, DiffKind::Delete),
                    });
                }
                out
            }
            _ => Vec::new(),
        };
        let mut out = shell(self, name, composite_kind(prev, &children));
        out.children = children;
        Ok(out)
    }
}

impl Node {
    /// A pointer-only big map whose previous state is the same pointer with
    /// loaded entries. It is diffed entry by entry rather than as a literal.
    fn same_big_map_loaded(&self, prev: Option<&Node>) -> bool {
        match (&self.ty, prev.map(|p| &p.ty)) {
            (Ty::BigMap { ptr: Some(a), .. }, Some(Ty::BigMap { ptr: Some(b), entries, .. })) => {
                a == b && !entries.is_empty()
            }
            _ => false,
        }
    }
}

/// Set member as its own leaf: the item's prim and type, the key as value.
fn member(set: &Node, text: &str, kind: DiffKind) -> MiguelNode {
    let item = match &set.ty {
        Ty::Set { item, .. } => item.as_ref(),
        _ => set,
    };
    MiguelNode { value: Some(Value::String(text.to_string())), ..shell(item, Some(text.to_string()), kind) }
}

/// A previous subtree with no current counterpart.
fn deleted(node: &Node, name: Option<String>) -> Result<MiguelNode> {
    let mut out = node.to_miguel(None, name)?;
    mark_deleted(&mut out);
    Ok(out)
}

fn mark_deleted(node: &mut MiguelNode) {
    node.kind = DiffKind::Delete;
    node.children.iter_mut().for_each(mark_deleted);
}
