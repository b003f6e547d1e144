//! The typed tree: root nodes plus the settle-once lifecycle.
//!
//! A tree starts type-only. [`TypedTree::settle`] (or
//! [`TypedTree::from_json`]) attaches values exactly once; callers that need
//! several values clone the type-only tree per value.
use std::cmp::Ordering;

use indexmap::IndexMap;
use serde_json::Value;

use super::entrypoint::DEFAULT_ENTRYPOINT;
use super::schema::{field_key, object_schema};
use super::{BigMapDiff, Entrypoint, MiguelNode, Node, Path, Ty, TypeDoc};
use crate::error::{Error, Result};
use crate::forge::{self, Parameters};
use crate::micheline::Micheline;

#[derive(Clone, Debug, PartialEq)]
pub struct TypedTree {
    nodes: Vec<Node>,
    settled: bool,
}

impl TypedTree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes, settled: false }
    }

    /// A type expression; a sequence of types gives several roots.
    pub fn from_type(ty: &Micheline) -> Result<Self> {
        let nodes = match ty {
            Micheline::Seq(types) => types.iter().map(Node::from_type).collect::<Result<_>>()?,
            single => vec![Node::from_type(single)?],
        };
        Ok(Self::new(nodes))
    }

    /// Inverse of [`TypedTree::to_json_schema`]. A schema carrying `prim`
    /// is one root; a bare object schema has one root per property.
    pub fn from_json_schema(schema: &Value) -> Result<Self> {
        let tagged = schema.get("prim").or_else(|| schema.get("$comment")).is_some();
        if tagged {
            return Ok(Self::new(vec![Node::from_json_schema(schema)?]));
        }
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::InvalidSchema("root schema needs `prim` or `properties`".into()))?;
        let nodes = properties
            .iter()
            .map(|(key, s)| {
                let mut node = Node::from_json_schema(s)?;
                node.name = (!key.starts_with('@')).then(|| key.clone());
                Ok(node)
            })
            .collect::<Result<Vec<_>>>()?;
        if nodes.is_empty() {
            return Err(Error::InvalidSchema("root schema has no properties".into()));
        }
        Ok(Self::new(nodes))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    fn ensure_settled(&self) -> Result<()> {
        if self.settled { Ok(()) } else { Err(Error::NotSettled) }
    }

    fn ensure_unsettled(&self) -> Result<()> {
        if self.settled { Err(Error::AlreadySettled) } else { Ok(()) }
    }

    /// The only root, for operations that address a single value.
    fn root(&self) -> Result<&Node> {
        match self.nodes.as_slice() {
            [root] => Ok(root),
            nodes => Err(Error::TreesAreDifferent(format!("expected a single root, tree has {}", nodes.len()))),
        }
    }

    fn single_pair_root(&self) -> bool {
        matches!(self.nodes.as_slice(), [root] if root.is_pair())
    }

    // -------------------------------- Settle -------------------------------- //

    /// Attach values from an untyped forest. The forest must have one
    /// document per root, unless the tree is a single `pair`, in which case
    /// the forest is read as one right-combed n-ary `Pair`.
    pub fn settle(&mut self, forest: &[Micheline]) -> Result<()> {
        self.ensure_unsettled()?;
        if forest.len() == self.nodes.len() {
            for (node, value) in self.nodes.iter_mut().zip(forest) {
                node.parse_value(value)?;
            }
        } else if self.single_pair_root() && forest.len() >= 2 {
            let comb = Micheline::prim("Pair", forest.to_vec());
            self.nodes[0].parse_value(&comb)?;
        } else {
            return Err(Error::TreesAreDifferent(format!(
                "{} value(s) for {} root(s)",
                forest.len(),
                self.nodes.len()
            )));
        }
        self.settled = true;
        tracing::debug!(roots = self.nodes.len(), documents = forest.len(), "settled typed tree");
        Ok(())
    }

    /// Settle from one value document.
    pub fn settle_value(&mut self, value: &Micheline) -> Result<()> {
        self.settle(std::slice::from_ref(value))
    }

    /// Settle from nested JSON form data shaped like [`TypedTree::to_json_schema`].
    pub fn from_json(&mut self, data: &Value) -> Result<()> {
        self.ensure_unsettled()?;
        if self.single_pair_root() {
            self.nodes[0].fill_json(Some(data), "")?;
        } else {
            let obj = data
                .as_object()
                .ok_or_else(|| Error::invalid_json("", format!("expected an object, got {data}")))?;
            for (i, node) in self.nodes.iter_mut().enumerate() {
                let key = field_key(node, i);
                node.fill_json(obj.get(&key), &format!("/{key}"))?;
            }
        }
        self.settled = true;
        Ok(())
    }

    pub fn to_micheline(&self) -> Result<Vec<Micheline>> {
        self.ensure_settled()?;
        self.nodes.iter().map(Node::to_micheline).collect()
    }

    /// Binary form of a settled single-root value.
    pub fn forge(&self) -> Result<Vec<u8>> {
        self.ensure_settled()?;
        forge::forge_micheline(&self.root()?.to_micheline()?)
    }

    /// Type expression of the roots; several roots render as a sequence.
    pub fn to_type(&self) -> Micheline {
        match self.nodes.as_slice() {
            [root] => root.to_type(),
            nodes => Micheline::Seq(nodes.iter().map(Node::to_type).collect()),
        }
    }

    // ------------------------------ Entrypoints ----------------------------- //

    pub fn entrypoints(&self) -> Vec<String> {
        self.entrypoint_list().into_iter().map(|e| e.name).collect()
    }

    pub fn entrypoint_list(&self) -> Vec<Entrypoint> {
        match self.root() {
            Ok(root) => root.entrypoints(),
            Err(_) => vec![Entrypoint {
                name: DEFAULT_ENTRYPOINT.to_string(),
                index: 0,
                path: Path::root(),
                annotated: false,
            }],
        }
    }

    pub fn find_entrypoint(&self, name: &str) -> Option<Path> {
        match self.root() {
            Ok(root) => root.find_entrypoint(name),
            Err(_) => (name.is_empty() || name == DEFAULT_ENTRYPOINT).then(Path::root),
        }
    }

    pub fn find_by_name(&self, name: &str, is_entrypoint: bool) -> Option<Path> {
        if is_entrypoint {
            return self.find_entrypoint(name);
        }
        self.root().ok()?.find_by_name(name, false)
    }

    pub fn node_at(&self, path: &Path) -> Option<&Node> {
        self.root().ok()?.node_at(path)
    }

    pub fn unwrap(&self, path: &Path) -> Option<&Node> {
        self.root().ok()?.unwrap(path)
    }

    fn resolve(&self, entrypoint: &str) -> Result<Path> {
        self.find_entrypoint(entrypoint)
            .ok_or_else(|| Error::UnknownEntrypoint(entrypoint.to_string()))
    }

    /// Entrypoint a value at `path` is sent to: the annotation of the node
    /// there, or `default` with the path's constructors around the value.
    fn address(path: &Path, name: Option<&String>, value: Micheline) -> Parameters {
        match name {
            Some(name) if !path.is_root() => Parameters { entrypoint: name.clone(), value },
            _ => Parameters { entrypoint: DEFAULT_ENTRYPOINT.to_string(), value: path.wrap(value) },
        }
    }

    /// Parameters for a transaction carrying this settled value.
    pub fn to_parameters(&self, entrypoint: &str) -> Result<Parameters> {
        self.ensure_settled()?;
        let path = self.resolve(entrypoint)?;
        if path.is_root() {
            let value = match self.to_micheline()?.as_slice() {
                [single] => single.clone(),
                many => Micheline::Seq(many.to_vec()),
            };
            return Ok(Parameters { entrypoint: DEFAULT_ENTRYPOINT.to_string(), value });
        }
        let node = self
            .root()?
            .unwrap(&path)
            .ok_or_else(|| Error::EntrypointMismatch(entrypoint.to_string()))?;
        Ok(Self::address(&path, node.name.as_ref(), node.to_micheline()?))
    }

    /// Clone the entrypoint's subtree and fill it from form data. Returns
    /// the path, the subtree's name and the filled value.
    fn fill_entrypoint(&self, entrypoint: &str, data: &Value) -> Result<(Path, Option<String>, Micheline)> {
        let path = self.resolve(entrypoint)?;
        if path.is_root() && self.nodes.len() != 1 {
            let mut tree = Self::new(self.nodes.clone());
            tree.from_json(data)?;
            return Ok((path, None, Micheline::Seq(tree.to_micheline()?)));
        }
        let mut node = self
            .node_at(&path)
            .ok_or_else(|| Error::UnknownEntrypoint(entrypoint.to_string()))?
            .clone();
        if node.is_pair() {
            node.fill_json(Some(data), "")?;
        } else {
            // Leaf data may come bare or keyed like the leaf's schema.
            let key = field_key(&node, 0);
            let leaf = data.as_object().and_then(|o| o.get(&key)).unwrap_or(data);
            node.fill_json(Some(leaf), &format!("/{key}"))?;
        }
        let value = node.to_micheline()?;
        Ok((path, node.name, value))
    }

    /// Build parameters from form data without touching this tree.
    pub fn build_parameters(&self, entrypoint: &str, data: &Value) -> Result<Parameters> {
        let (path, name, value) = self.fill_entrypoint(entrypoint, data)?;
        Ok(Self::address(&path, name.as_ref(), value))
    }

    /// Like [`TypedTree::build_parameters`], but always addressed to
    /// `default` with the full `Left`/`Right` wrapping.
    pub fn parameters_for_execution(&self, entrypoint: &str, data: &Value) -> Result<Parameters> {
        let (path, _, value) = self.fill_entrypoint(entrypoint, data)?;
        Ok(Parameters { entrypoint: DEFAULT_ENTRYPOINT.to_string(), value: path.wrap(value) })
    }

    // -------------------------------- Schema -------------------------------- //

    pub fn to_json_schema(&self) -> Value {
        match self.nodes.as_slice() {
            [root] if root.is_pair() => root.json_schema(),
            nodes => object_schema(&nodes.iter().collect::<Vec<_>>()),
        }
    }

    pub fn entrypoint_schema(&self, entrypoint: &str) -> Result<Value> {
        let path = self.resolve(entrypoint)?;
        if path.is_root() {
            return Ok(self.to_json_schema());
        }
        let node = self
            .node_at(&path)
            .ok_or_else(|| Error::UnknownEntrypoint(entrypoint.to_string()))?;
        Ok(if node.is_pair() { node.json_schema() } else { object_schema(&[node]) })
    }

    pub fn docs(&self, entrypoint: &str) -> Result<Vec<TypeDoc>> {
        let path = self.resolve(entrypoint)?;
        let name = if entrypoint.is_empty() { DEFAULT_ENTRYPOINT } else { entrypoint };
        match self.nodes.as_slice() {
            [root] => {
                let node = root
                    .node_at(&path)
                    .ok_or_else(|| Error::UnknownEntrypoint(entrypoint.to_string()))?;
                Ok(node.docs(name))
            }
            nodes => Ok(nodes
                .iter()
                .enumerate()
                .flat_map(|(i, n)| n.docs(&field_key(n, i)))
                .collect()),
        }
    }

    // ------------------------------- Compare -------------------------------- //

    pub fn compare(&self, other: &TypedTree) -> Result<Ordering> {
        if self.nodes.len() != other.nodes.len() {
            return Err(Error::TypeIsNotComparable(format!(
                "{} root(s) vs {} root(s)",
                self.nodes.len(),
                other.nodes.len()
            )));
        }
        self.ensure_settled()?;
        other.ensure_settled()?;
        for (a, b) in self.nodes.iter().zip(&other.nodes) {
            match a.compare(b)? {
                Ordering::Equal => continue,
                ord => return Ok(ord),
            }
        }
        Ok(Ordering::Equal)
    }

    pub fn equal_type(&self, other: &TypedTree) -> bool {
        self.nodes.len() == other.nodes.len() && self.nodes.iter().zip(&other.nodes).all(|(a, b)| a.equal_type(b))
    }

    /// Per-root diff against a previous settled value of the same type.
    pub fn diff(&self, prev: Option<&TypedTree>) -> Result<Vec<MiguelNode>> {
        self.ensure_settled()?;
        if let Some(p) = prev {
            p.ensure_settled()?;
            if !self.equal_type(p) {
                return Err(Error::TreesAreDifferent(format!("{} vs {}", self.to_type(), p.to_type())));
            }
        }
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| node.to_miguel(prev.map(|p| &p.nodes[i]), None))
            .collect()
    }

    // ------------------------------- Big maps ------------------------------- //

    pub fn find_big_map_by_ptr(&self) -> IndexMap<i64, &Node> {
        let mut out = IndexMap::new();
        for node in &self.nodes {
            node.collect_big_maps(&mut out);
        }
        out
    }

    /// Load big-map entries from diffs, in order. Diffs for pointers not in
    /// this tree are skipped. The first bad key or value aborts the batch;
    /// entries applied before it stay applied.
    pub fn enrich_big_map(&mut self, diffs: &[BigMapDiff]) -> Result<()> {
        self.ensure_settled()?;
        let mut by_ptr: IndexMap<i64, Vec<&BigMapDiff>> = IndexMap::new();
        for diff in diffs {
            by_ptr.entry(diff.ptr).or_default().push(diff);
        }
        let known = self.find_big_map_by_ptr().keys().copied().collect::<Vec<_>>();
        for (ptr, skipped) in by_ptr.iter().filter(|(ptr, _)| !known.contains(ptr)) {
            tracing::debug!(ptr, diffs = skipped.len(), "skipping diffs for unknown big map");
        }
        let mut applied = 0;
        for node in &mut self.nodes {
            node.visit_settled_mut(&mut |n: &mut Node| -> Result<()> {
                let ptr = match &n.ty {
                    Ty::BigMap { ptr: Some(p), .. } => *p,
                    _ => return Ok(()),
                };
                if let Some(batch) = by_ptr.get(&ptr) {
                    applied += n.apply_big_map_diffs(batch)?;
                }
                Ok(())
            })?;
        }
        tracing::debug!(applied, total = diffs.len(), "enriched big maps");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DiffKind;
    use num_bigint::BigInt;
    use serde_json::json;

    const TZ1: &str = "tz1Ke3u9SqxvnkdNkgaCmydXg3zh3iaKNDxw";

    fn tree(ty: Value) -> TypedTree {
        TypedTree::from_type(&serde_json::from_value(ty).unwrap()).unwrap()
    }

    fn m(v: Value) -> Micheline {
        serde_json::from_value(v).unwrap()
    }

    fn fa2() -> TypedTree {
        tree(json!({
            "prim": "or",
            "args": [
                {"prim": "or", "args": [
                    {"prim": "pair", "args": [{"prim": "address", "annots": ["%to"]}, {"prim": "nat", "annots": ["%amount"]}], "annots": ["%transfer"]},
                    {"prim": "nat"}
                ]},
                {"prim": "unit", "annots": ["%pause"]}
            ]
        }))
    }

    #[test]
    fn end_to_end_pair_address_nat() {
        let mut t = tree(json!({"prim": "pair", "args": [{"prim": "address"}, {"prim": "nat"}]}));
        t.settle(&[Micheline::string(TZ1), Micheline::int(5)]).unwrap();
        let params = t.to_parameters("").unwrap();
        assert_eq!(params.entrypoint, "default");
        assert_eq!(params.value, Micheline::pair(Micheline::string(TZ1), Micheline::int(5)));
        assert_eq!(forge::forge_nat(&BigInt::from(5)).unwrap(), vec![0x05]);
    }

    #[test]
    fn settle_cardinality() {
        let two_roots = || tree(json!([{"prim": "nat"}, {"prim": "string"}]));
        let mut ok = two_roots();
        ok.settle(&[Micheline::int(1), Micheline::string("a")]).unwrap();
        assert!(ok.is_settled());

        let mut short = two_roots();
        assert!(matches!(short.settle(&[Micheline::int(1)]), Err(Error::TreesAreDifferent(_))));

        let mut long = two_roots();
        let three = [Micheline::int(1), Micheline::string("a"), Micheline::int(2)];
        assert!(matches!(long.settle(&three), Err(Error::TreesAreDifferent(_))));

        let mut comb = tree(json!({"prim": "pair", "args": [{"prim": "nat"}, {"prim": "string"}, {"prim": "int"}]}));
        comb.settle(&three).unwrap();
        assert_eq!(comb.to_micheline().unwrap().len(), 1);

        let mut single = tree(json!({"prim": "nat"}));
        assert!(single.settle(&[Micheline::int(1), Micheline::int(2)]).is_err());
    }

    #[test]
    fn settle_happens_once() {
        let mut t = tree(json!({"prim": "nat"}));
        t.settle_value(&Micheline::int(1)).unwrap();
        assert!(matches!(t.settle_value(&Micheline::int(2)), Err(Error::AlreadySettled)));
        assert!(matches!(tree(json!({"prim": "nat"})).to_micheline(), Err(Error::NotSettled)));
    }

    #[test]
    fn named_entrypoint_parameters() {
        let mut t = fa2();
        t.settle_value(&m(json!({"prim": "Left", "args": [{"prim": "Left", "args": [
            {"prim": "Pair", "args": [{"string": TZ1}, {"int": "3"}]}
        ]}]})))
        .unwrap();
        let params = t.to_parameters("transfer").unwrap();
        assert_eq!(params.entrypoint, "transfer");
        assert_eq!(params.value, Micheline::pair(Micheline::string(TZ1), Micheline::int(3)));
        assert!(matches!(t.to_parameters("pause"), Err(Error::EntrypointMismatch(_))));
        assert!(matches!(t.to_parameters("nope"), Err(Error::UnknownEntrypoint(_))));
    }

    #[test]
    fn synthetic_entrypoint_is_sent_to_default() {
        let mut t = fa2();
        t.settle_value(&m(json!({"prim": "Left", "args": [{"prim": "Right", "args": [{"int": "9"}]}]})))
            .unwrap();
        let params = t.to_parameters("entrypoint_1").unwrap();
        assert_eq!(params.entrypoint, "default");
        assert_eq!(params.value, Micheline::left(Micheline::right(Micheline::int(9))));
    }

    #[test]
    fn build_parameters_leaves_template_alone() {
        let t = fa2();
        let before = t.clone();
        let params = t.build_parameters("transfer", &json!({"to": TZ1, "amount": 7})).unwrap();
        assert_eq!(params.entrypoint, "transfer");
        assert_eq!(params.value, Micheline::pair(Micheline::string(TZ1), Micheline::int(7)));
        assert_eq!(t, before);
        assert!(!t.is_settled());

        let exec = t.parameters_for_execution("transfer", &json!({"to": TZ1, "amount": 7})).unwrap();
        assert_eq!(exec.entrypoint, "default");
        assert_eq!(exec.value, Micheline::left(Micheline::left(params.value.clone())));

        let unit = t.build_parameters("pause", &json!({})).unwrap();
        assert_eq!((unit.entrypoint.as_str(), unit.value), ("pause", Micheline::unit()));

        let leaf = t.build_parameters("entrypoint_1", &json!(4)).unwrap();
        assert_eq!(leaf.entrypoint, "default");
        assert_eq!(leaf.value, Micheline::left(Micheline::right(Micheline::int(4))));
    }

    #[test]
    fn schema_roundtrip_for_trees() {
        for t in [fa2(), tree(json!([{"prim": "nat", "annots": ["%counter"]}, {"prim": "string"}]))] {
            let back = TypedTree::from_json_schema(&t.to_json_schema()).unwrap();
            assert!(back.equal_type(&t));
        }
        let s = fa2().entrypoint_schema("transfer").unwrap();
        assert_eq!(s["properties"]["to"]["prim"], json!("address"));
    }

    #[test]
    fn diff_completeness() {
        let mut t = tree(json!({"prim": "pair", "args": [{"prim": "nat"}, {"prim": "list", "args": [{"prim": "string"}]}]}));
        t.settle_value(&m(json!({"prim": "Pair", "args": [{"int": "1"}, [{"string": "a"}, {"string": "b"}]]})))
            .unwrap();
        let created = t.diff(None).unwrap();
        assert!(created.iter().flat_map(|n| n.walk()).all(|n| n.kind == DiffKind::Create));
        let same = t.diff(Some(&t)).unwrap();
        assert!(same.iter().flat_map(|n| n.walk()).all(|n| n.kind == DiffKind::Unchanged));

        let mut other = tree(json!({"prim": "int"}));
        other.settle_value(&Micheline::int(1)).unwrap();
        assert!(matches!(t.diff(Some(&other)), Err(Error::TreesAreDifferent(_))));
    }

    #[test]
    fn tree_compare_requires_same_root_count() {
        let mut a = tree(json!({"prim": "nat"}));
        a.settle_value(&Micheline::int(1)).unwrap();
        let mut b = tree(json!([{"prim": "nat"}, {"prim": "nat"}]));
        b.settle(&[Micheline::int(1), Micheline::int(2)]).unwrap();
        assert!(matches!(a.compare(&b), Err(Error::TypeIsNotComparable(_))));
        assert_eq!(a.compare(&a).unwrap(), Ordering::Equal);
    }

    #[test]
    fn enrich_skips_unknown_pointers() {
        let mut t = tree(json!({"prim": "big_map", "args": [{"prim": "string"}, {"prim": "nat"}]}));
        t.settle_value(&Micheline::int(4)).unwrap();
        assert_eq!(t.find_big_map_by_ptr().keys().copied().collect::<Vec<_>>(), vec![4]);
        let diffs = [
            BigMapDiff { ptr: 4, key: Micheline::string("b"), value: Some(Micheline::int(2)) },
            BigMapDiff { ptr: 99, key: Micheline::string("x"), value: Some(Micheline::int(0)) },
            BigMapDiff { ptr: 4, key: Micheline::string("a"), value: Some(Micheline::int(1)) },
        ];
        t.enrich_big_map(&diffs).unwrap();
        let Ty::BigMap { entries, .. } = &t.nodes()[0].ty else { panic!("big map expected") };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.to_micheline().unwrap()).collect();
        assert_eq!(keys, vec![Micheline::string("a"), Micheline::string("b")]);
        // Still addressed by pointer.
        assert_eq!(t.to_micheline().unwrap(), vec![Micheline::int(4)]);
    }

    #[test]
    fn docs_for_entrypoint() {
        let docs = fa2().docs("transfer").unwrap();
        assert_eq!(docs[0].name, "transfer");
        assert_eq!(docs[0].args.len(), 2);
    }

    #[test]
    fn forge_settled_value() {
        let mut t = tree(json!({"prim": "nat"}));
        t.settle_value(&Micheline::int(5)).unwrap();
        assert_eq!(t.forge().unwrap(), vec![0x00, 0x05]);
    }
}
