//! Big-map pointers and loading their entries from indexer diffs.
use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{Node, Step, Ty};
use crate::error::Result;
use crate::micheline::Micheline;

/// One key update of a big map; `value: None` removes the key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigMapDiff {
    pub ptr: i64,
    pub key: Micheline,
    #[serde(default)]
    pub value: Option<Micheline>,
}

impl Node {
    /// Settled children, in value order. Type-only templates are skipped.
    pub(crate) fn settled_children(&self) -> Vec<&Node> {
        match &self.ty {
            Ty::Pair(left, right) => vec![left.as_ref(), right.as_ref()],
            Ty::Or { left, side: Some(Step::Left), .. } => vec![left.as_ref()],
            Ty::Or { right, side: Some(Step::Right), .. } => vec![right.as_ref()],
            Ty::Option { inner, some: Some(true) } => vec![inner.as_ref()],
            Ty::Ticket { content, .. } => vec![content.as_ref()],
            Ty::List { items, .. } | Ty::Set { items, .. } => items.iter().collect(),
            Ty::Map { entries, .. } | Ty::BigMap { entries, .. } => {
                entries.iter().flat_map(|(k, v)| [k, v]).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Visit this node and every settled descendant, parents first.
    pub(crate) fn visit_settled_mut(&mut self, f: &mut dyn FnMut(&mut Node) -> Result<()>) -> Result<()> {
        f(self)?;
        match &mut self.ty {
            Ty::Pair(left, right) => {
                left.visit_settled_mut(f)?;
                right.visit_settled_mut(f)?;
            }
            Ty::Or { left, side: Some(Step::Left), .. } => left.visit_settled_mut(f)?,
            Ty::Or { right, side: Some(Step::Right), .. } => right.visit_settled_mut(f)?,
            Ty::Option { inner, some: Some(true) } => inner.visit_settled_mut(f)?,
            Ty::Ticket { content, .. } => content.visit_settled_mut(f)?,
            Ty::List { items, .. } | Ty::Set { items, .. } => {
                for item in items {
                    item.visit_settled_mut(f)?;
                }
            }
            Ty::Map { entries, .. } | Ty::BigMap { entries, .. } => {
                for (_, value) in entries {
                    value.visit_settled_mut(f)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Collect every big map with a pointer, keyed by that pointer.
    pub(crate) fn collect_big_maps<'a>(&'a self, out: &mut IndexMap<i64, &'a Node>) {
        if let Ty::BigMap { ptr: Some(ptr), .. } = &self.ty {
            out.insert(*ptr, self);
        }
        for child in self.settled_children() {
            child.collect_big_maps(out);
        }
    }

    /// Apply diffs addressed to this node's pointer, in order. Returns how
    /// many were applied.
    pub(crate) fn apply_big_map_diffs(&mut self, diffs: &[&BigMapDiff]) -> Result<usize> {
        let Ty::BigMap { key, value, ptr: Some(ptr), entries } = &mut self.ty else {
            return Ok(0);
        };
        let mut applied = 0;
        for diff in diffs.iter().filter(|d| d.ptr == *ptr) {
            let mut k = key.as_ref().clone();
            k.parse_value(&diff.key)?;
            let mut slot = Err(entries.len());
            for (i, (existing, _)) in entries.iter().enumerate() {
                match existing.compare(&k)? {
                    Ordering::Less => continue,
                    Ordering::Equal => slot = Ok(i),
                    Ordering::Greater => slot = Err(i),
                }
                break;
            }
            match (&diff.value, slot) {
                (None, Ok(i)) => {
                    entries.remove(i);
                }
                (None, Err(_)) => {}
                (Some(raw), slot) => {
                    let mut v = value.as_ref().clone();
                    v.parse_value(raw)?;
                    match slot {
                        Ok(i) => entries[i].1 = v,
                        Err(i) => entries.insert(i, (k, v)),
                    }
                }
            }
            tracing::trace!(ptr = *ptr, key = %diff.key, removed = diff.value.is_none(), "applied big map diff");
            applied += 1;
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ledger(ptr: i64) -> Node {
        let mut n = Node::from_type(
            &serde_json::from_value(json!({"prim": "pair", "args": [
                {"prim": "big_map", "args": [{"prim": "nat"}, {"prim": "string"}], "annots": ["%ledger"]},
                {"prim": "list", "args": [{"prim": "big_map", "args": [{"prim": "nat"}, {"prim": "nat"}]}]}
            ]}))
            .unwrap(),
        )
        .unwrap();
        n.parse_value(&Micheline::pair(Micheline::int(ptr), Micheline::Seq(vec![Micheline::int(ptr + 1)])))
            .unwrap();
        n
    }

    fn diff(ptr: i64, key: i64, value: Option<&str>) -> BigMapDiff {
        BigMapDiff { ptr, key: Micheline::int(key), value: value.map(Micheline::string) }
    }

    #[test]
    fn finds_pointers_inside_lists() {
        let n = ledger(10);
        let mut found = IndexMap::new();
        n.collect_big_maps(&mut found);
        assert_eq!(found.keys().copied().collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn inserts_in_key_order_and_removes() {
        let mut n = ledger(10);
        let diffs = [diff(10, 5, Some("five")), diff(10, 1, Some("one")), diff(10, 3, Some("three")), diff(10, 5, None)];
        let refs: Vec<_> = diffs.iter().collect();
        let mut applied = 0;
        n.visit_settled_mut(&mut |node: &mut Node| -> Result<()> {
            applied += node.apply_big_map_diffs(&refs)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(applied, 4);
        let Ty::Pair(ledger, _) = &n.ty else { panic!("pair expected") };
        let Ty::BigMap { entries, .. } = &ledger.ty else { panic!("big map expected") };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.to_micheline().unwrap()).collect();
        assert_eq!(keys, vec![Micheline::int(1), Micheline::int(3)]);
    }

    #[test]
    fn replaces_existing_key() {
        let mut n = ledger(10);
        let diffs = [diff(10, 1, Some("a")), diff(10, 1, Some("b"))];
        let refs: Vec<_> = diffs.iter().collect();
        n.visit_settled_mut(&mut |node: &mut Node| node.apply_big_map_diffs(&refs).map(|_| ())).unwrap();
        let Ty::Pair(ledger, _) = &n.ty else { panic!("pair expected") };
        let Ty::BigMap { entries, .. } = &ledger.ty else { panic!("big map expected") };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.to_micheline().unwrap(), Micheline::string("b"));
    }

    #[test]
    fn bad_value_aborts() {
        let mut n = ledger(10);
        let bad = [BigMapDiff { ptr: 10, key: Micheline::string("not a nat"), value: None }];
        let refs: Vec<_> = bad.iter().collect();
        assert!(n.visit_settled_mut(&mut |node: &mut Node| node.apply_big_map_diffs(&refs).map(|_| ())).is_err());
    }
}
