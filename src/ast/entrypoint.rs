//! Entrypoint discovery and `Left`/`Right` paths through `or` trees.
//!
//! Every leaf of the root `or` tree is an entrypoint. Annotated leaves are
//! named after their annotation; unannotated ones get `entrypoint_N`, numbered
//! in depth-first left-to-right order over all leaves.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Node, Ty};
use crate::micheline::Micheline;

// ------------------------------- Policy ---------------------------------- //

pub const DEFAULT_ENTRYPOINT: &str = "default";

static SYNTHETIC_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^entrypoint_(\d+)$").unwrap());

// --------------------------------- Path ---------------------------------- //

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Left,
    Right,
}

/// Branch choices from the root to a node; empty for the root itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(pub Vec<Step>);

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Wrap `value` in the `Left`/`Right` constructors that select this path.
    pub fn wrap(&self, value: Micheline) -> Micheline {
        self.0.iter().rev().fold(value, |acc, step| match step {
            Step::Left => Micheline::left(acc),
            Step::Right => Micheline::right(acc),
        })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            f.write_str(match step {
                Step::Left => "/L",
                Step::Right => "/R",
            })?;
        }
        Ok(())
    }
}

// ------------------------------ Entrypoints ------------------------------ //

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Entrypoint {
    pub name: String,
    /// Position among all leaves of the root `or` tree.
    pub index: usize,
    pub path: Path,
    /// False when `name` is synthetic.
    pub annotated: bool,
}

impl Node {
    /// Leaves of this node's `or` tree. A non-`or` node is its own single
    /// `default` entrypoint.
    pub fn entrypoints(&self) -> Vec<Entrypoint> {
        if !self.is_or() {
            return vec![Entrypoint {
                name: DEFAULT_ENTRYPOINT.to_string(),
                index: 0,
                path: Path::root(),
                annotated: false,
            }];
        }
        let mut out = Vec::new();
        collect_leaves(self, &mut Vec::new(), &mut out);
        out
    }

    /// Path of an entrypoint by annotation or synthetic name. Annotated inner
    /// `or` nodes resolve too, as the node would.
    pub fn find_entrypoint(&self, name: &str) -> Option<Path> {
        if name.is_empty() {
            return Some(Path::root());
        }
        let mut steps = Vec::new();
        if find_or_named(self, name, &mut steps) {
            return Some(Path(steps));
        }
        if name == DEFAULT_ENTRYPOINT {
            return Some(Path::root());
        }
        let index: usize = SYNTHETIC_NAME.captures(name)?.get(1)?.as_str().parse().ok()?;
        self.entrypoints().into_iter().find(|e| e.index == index).map(|e| e.path)
    }

    /// First node named `name` in the type structure, descending through
    /// `pair` and `or` children. With `is_entrypoint` only the `or` tree is
    /// searched, with entrypoint naming rules.
    pub fn find_by_name(&self, name: &str, is_entrypoint: bool) -> Option<Path> {
        if is_entrypoint {
            return self.find_entrypoint(name);
        }
        let mut steps = Vec::new();
        find_named(self, name, &mut steps).then_some(Path(steps))
    }

    /// Node at `path` in the type structure, regardless of settled values.
    pub fn node_at(&self, path: &Path) -> Option<&Node> {
        path.steps().iter().try_fold(self, |node, step| match (&node.ty, step) {
            (Ty::Pair(left, _) | Ty::Or { left, .. }, Step::Left) => Some(left.as_ref()),
            (Ty::Pair(_, right) | Ty::Or { right, .. }, Step::Right) => Some(right.as_ref()),
            _ => None,
        })
    }

    /// Settled node at `path`; `None` when a settled `or` took the other branch.
    pub fn unwrap(&self, path: &Path) -> Option<&Node> {
        path.steps().iter().try_fold(self, |node, step| match &node.ty {
            Ty::Or { left, right, side } => match (side, step) {
                (Some(Step::Left), Step::Left) => Some(left.as_ref()),
                (Some(Step::Right), Step::Right) => Some(right.as_ref()),
                _ => None,
            },
            Ty::Pair(left, right) => Some(match step {
                Step::Left => left.as_ref(),
                Step::Right => right.as_ref(),
            }),
            _ => None,
        })
    }
}

fn collect_leaves(node: &Node, steps: &mut Vec<Step>, out: &mut Vec<Entrypoint>) {
    match &node.ty {
        Ty::Or { left, right, .. } => {
            steps.push(Step::Left);
            collect_leaves(left, steps, out);
            steps.pop();
            steps.push(Step::Right);
            collect_leaves(right, steps, out);
            steps.pop();
        }
        _ => {
            let index = out.len();
            let (name, annotated) = match &node.name {
                Some(n) => (n.clone(), true),
                None => (format!("entrypoint_{index}"), false),
            };
            out.push(Entrypoint { name, index, path: Path(steps.clone()), annotated });
        }
    }
}

fn find_or_named(node: &Node, name: &str, steps: &mut Vec<Step>) -> bool {
    if node.name.as_deref() == Some(name) {
        return true;
    }
    let Ty::Or { left, right, .. } = &node.ty else {
        return false;
    };
    for (step, child) in [(Step::Left, left), (Step::Right, right)] {
        steps.push(step);
        if find_or_named(child, name, steps) {
            return true;
        }
        steps.pop();
    }
    false
}

fn find_named(node: &Node, name: &str, steps: &mut Vec<Step>) -> bool {
    if node.name.as_deref() == Some(name) {
        return true;
    }
    let (left, right) = match &node.ty {
        Ty::Pair(left, right) | Ty::Or { left, right, .. } => (left, right),
        _ => return false,
    };
    for (step, child) in [(Step::Left, left), (Step::Right, right)] {
        steps.push(step);
        if find_named(child, name, steps) {
            return true;
        }
        steps.pop();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(ty: serde_json::Value) -> Node {
        Node::from_type(&serde_json::from_value(ty).unwrap()).unwrap()
    }

    /// or (or (nat %mint) unit) (or (string %burn) bytes)
    fn params() -> Node {
        node(json!({
            "prim": "or",
            "args": [
                {"prim": "or", "args": [{"prim": "nat", "annots": ["%mint"]}, {"prim": "unit"}]},
                {"prim": "or", "args": [{"prim": "string", "annots": ["%burn"]}, {"prim": "bytes"}]}
            ]
        }))
    }

    #[test]
    fn numbering_is_depth_first() {
        let names: Vec<_> = params().entrypoints().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["mint", "entrypoint_1", "burn", "entrypoint_3"]);
    }

    #[test]
    fn numbering_is_stable_under_renaming() {
        let renamed = node(json!({
            "prim": "or",
            "args": [
                {"prim": "or", "args": [{"prim": "nat"}, {"prim": "unit", "annots": ["%noop"]}]},
                {"prim": "or", "args": [{"prim": "string"}, {"prim": "bytes"}]}
            ]
        }));
        let paths = |n: &Node| n.entrypoints().into_iter().map(|e| (e.index, e.path)).collect::<Vec<_>>();
        assert_eq!(paths(&params()), paths(&renamed));
    }

    #[test]
    fn non_or_root_is_default() {
        let eps = node(json!({"prim": "nat"})).entrypoints();
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].name, "default");
        assert!(eps[0].path.is_root());
    }

    #[test]
    fn finds_by_annotation_and_synthetic_name() {
        let p = params();
        assert_eq!(p.find_entrypoint("burn"), Some(Path(vec![Step::Right, Step::Left])));
        assert_eq!(p.find_entrypoint("entrypoint_3"), Some(Path(vec![Step::Right, Step::Right])));
        assert_eq!(p.find_entrypoint("entrypoint_0"), Some(Path(vec![Step::Left, Step::Left])));
        assert_eq!(p.find_entrypoint("default"), Some(Path::root()));
        assert_eq!(p.find_entrypoint("nope"), None);
        assert_eq!(p.find_entrypoint("entrypoint_9"), None);
    }

    #[test]
    fn wrap_applies_outermost_first() {
        let path = Path(vec![Step::Right, Step::Left]);
        assert_eq!(path.wrap(Micheline::int(1)), Micheline::right(Micheline::left(Micheline::int(1))));
        assert_eq!(path.to_string(), "/R/L");
    }

    #[test]
    fn find_by_name_walks_pairs() {
        let n = node(json!({
            "prim": "pair",
            "args": [{"prim": "nat", "annots": ["%a"]}, {"prim": "pair", "args": [{"prim": "int", "annots": ["%b"]}, {"prim": "unit"}]}]
        }));
        let path = n.find_by_name("b", false).unwrap();
        assert_eq!(path, Path(vec![Step::Right, Step::Left]));
        assert_eq!(n.node_at(&path).unwrap().name.as_deref(), Some("b"));
        assert_eq!(n.find_by_name("b", true), None);
    }

    #[test]
    fn unwrap_respects_settled_side() {
        let mut p = params();
        p.parse_value(&Micheline::right(Micheline::left(Micheline::string("x")))).unwrap();
        assert!(p.unwrap(&Path(vec![Step::Right, Step::Left])).is_some());
        assert!(p.unwrap(&Path(vec![Step::Left, Step::Left])).is_none());
        assert!(p.node_at(&Path(vec![Step::Left, Step::Left])).is_some());
    }
}
