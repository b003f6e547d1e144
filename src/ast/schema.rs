//! JSON Schema projection, schema reconstruction, and the form direction
//! (nested JSON data settled into a node).
//!
//! Shape of the emitted schema:
//! - pairs are objects whose properties are the flattened fields; unnamed
//!   fields are keyed `@{prim}_{position}`;
//! - `option` is a `oneOf` of `null` and the inner schema;
//! - `or` is a two-arm `oneOf`, each arm tagged by a `schemaKey` constant
//!   (`"L"` or `"R"`);
//! - `map`/`big_map` are arrays of `{ "@key", "@value" }` objects.
//!
//! Every node schema carries `prim`, which drives reconstruction.
use num_bigint::BigInt;
use serde_json::{json, Map, Value};

use super::value::parse_address;
use super::{Node, Prim, Step, Ty};
use crate::error::{Error, Result};
use crate::micheline::Micheline;

// ------------------------------- Policy ---------------------------------- //

pub const SCHEMA_KEY: &str = "schemaKey";
pub const MAP_KEY: &str = "@key";
pub const MAP_VALUE: &str = "@value";
const HEX_PATTERN: &str = "^(0x)?([0-9a-fA-F]{2})*$";

/// Property key of a field: its name, or `@{prim}_{position}`.
pub fn field_key(node: &Node, position: usize) -> String {
    node.name
        .clone()
        .unwrap_or_else(|| format!("@{}_{}", node.prim().as_str(), position))
}

fn side_tag(step: Step) -> &'static str {
    match step {
        Step::Left => "L",
        Step::Right => "R",
    }
}

/// Options and units may be left out of form data.
fn is_optional(node: &Node) -> bool {
    matches!(node.ty, Ty::Option { .. } | Ty::Unit(_))
}

// ------------------------------ Projection ------------------------------- //

/// Object schema with one property per field, in order.
pub fn object_schema(fields: &[&Node]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        let key = field_key(field, i);
        properties.insert(key.clone(), field.json_schema());
        if !is_optional(field) {
            required.push(Value::String(key));
        }
    }
    json!({ "type": "object", "properties": properties, "required": required })
}

impl Node {
    pub fn json_schema(&self) -> Value {
        let mut o = match &self.ty {
            Ty::Int(_) => json!({ "type": "integer" }),
            Ty::Nat(_) | Ty::Mutez(_) => json!({ "type": "integer", "minimum": 0 }),
            Ty::Bool(_) => json!({ "type": "boolean" }),
            Ty::String(_) | Ty::KeyHash(_) | Ty::Key(_) | Ty::Signature(_) | Ty::ChainId(_) => {
                json!({ "type": "string" })
            }
            Ty::Address(_) => json!({ "type": "string", "minLength": 36 }),
            Ty::Bytes(_) => json!({ "type": "string", "pattern": HEX_PATTERN }),
            Ty::Timestamp(_) => json!({ "type": "string", "format": "date-time" }),
            Ty::Unit(_) => json!({ "type": "object" }),
            Ty::Never => json!({ "not": {} }),
            Ty::Contract { .. } => json!({ "type": "string", "minLength": 36 }),
            Ty::Lambda { .. } => json!({ "type": "array" }),
            Ty::Opaque { prim: Prim::TxRollupL2Address, .. } => json!({ "type": "string" }),
            Ty::Opaque { prim: Prim::Operation, .. } => json!({ "type": "object" }),
            Ty::Opaque { .. } => json!({ "type": "string", "pattern": HEX_PATTERN }),
            Ty::SaplingState { .. } => json!({ "type": ["integer", "null"] }),
            Ty::SaplingTransaction { .. } => json!({ "type": "string", "pattern": HEX_PATTERN }),
            Ty::Ticket { content, .. } => json!({
                "type": "object",
                "properties": {
                    "ticketer": { "type": "string", "minLength": 36 },
                    "content": content.json_schema(),
                    "amount": { "type": "integer", "minimum": 0 }
                },
                "required": ["ticketer", "content", "amount"]
            }),
            Ty::Pair(..) => object_schema(&self.flat_fields()),
            Ty::Or { left, right, .. } => {
                let arm = |step: Step, child: &Node, position: usize| {
                    let key = field_key(child, position);
                    json!({
                        "title": key,
                        "type": "object",
                        "properties": {
                            SCHEMA_KEY: { "type": "string", "const": side_tag(step) },
                            key.clone(): child.json_schema()
                        },
                        "required": [SCHEMA_KEY]
                    })
                };
                json!({ "oneOf": [arm(Step::Left, left.as_ref(), 0), arm(Step::Right, right.as_ref(), 1)] })
            }
            Ty::Option { inner, .. } => json!({
                "oneOf": [{ "type": "null", "title": "None" }, inner.json_schema()]
            }),
            Ty::List { item, .. } | Ty::Set { item, .. } => {
                let mut o = json!({ "type": "array", "items": item.json_schema() });
                if matches!(self.ty, Ty::Set { .. }) {
                    o["uniqueItems"] = Value::Bool(true);
                }
                if let Some(first) = item.flat_fields().first().filter(|_| item.is_pair()) {
                    o["x-itemTitle"] = Value::String(field_key(first, 0));
                }
                o
            }
            Ty::Map { key, value, .. } | Ty::BigMap { key, value, .. } => json!({
                "type": "array",
                "x-itemTitle": MAP_KEY,
                "items": {
                    "type": "object",
                    "properties": { MAP_KEY: key.json_schema(), MAP_VALUE: value.json_schema() },
                    "required": [MAP_KEY, MAP_VALUE]
                }
            }),
        };
        o["prim"] = Value::String(self.prim().as_str().to_string());
        if let Some(name) = &self.name {
            o["title"] = Value::String(name.clone());
        }
        // types the schema vocabulary cannot express are carried verbatim
        if matches!(
            self.ty,
            Ty::Contract { .. } | Ty::Lambda { .. } | Ty::SaplingState { .. } | Ty::SaplingTransaction { .. }
        ) {
            o["x-options"] = json!({ "michelson": Value::from(&self.to_type()) });
        }
        o
    }

    // ---------------------------- Reconstruction ---------------------------- //

    /// Build a type-only node from a schema produced by [`Node::json_schema`],
    /// falling back on the plain JSON Schema `type` when `prim` is absent.
    pub fn from_json_schema(schema: &Value) -> Result<Self> {
        let obj = schema
            .as_object()
            .ok_or_else(|| Error::InvalidSchema(format!("schema must be an object, got {schema}")))?;
        let name = obj.get("title").and_then(Value::as_str).map(str::to_string);
        let prim = match obj.get("prim").or_else(|| obj.get("$comment")).and_then(Value::as_str) {
            Some(p) => Prim::parse(p)?,
            None => infer_prim(obj)?,
        };
        if let Some(michelson) = obj.get("x-options").and_then(|o| o.get("michelson")) {
            let ty = Micheline::try_from(michelson).map_err(Error::InvalidSchema)?;
            let mut node = Node::from_type(&ty)?;
            node.name = name.or(node.name);
            return Ok(node);
        }
        let ty = match prim {
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
            | Prim::Operation => Ty::Opaque { prim, value: None },
            Prim::Contract | Prim::Lambda | Prim::SaplingState | Prim::SaplingTransaction => {
                return Err(Error::InvalidSchema(format!(
                    "`{}` schema needs its type under `x-options.michelson`",
                    prim.as_str()
                )));
            }
            Prim::Ticket => {
                let content = property(obj, "content")?;
                Ty::Ticket { content: Box::new(Node::from_json_schema(content)?), ticketer: None, amount: None }
            }
            Prim::Pair => {
                let fields = properties(obj)?
                    .iter()
                    .map(|(key, s)| named(Node::from_json_schema(s)?, key))
                    .collect::<Result<Vec<_>>>()?;
                let count = fields.len();
                let mut rev = fields.into_iter().rev();
                let (Some(last), Some(prev)) = (rev.next(), rev.next()) else {
                    return Err(Error::InvalidSchema(format!("pair needs at least 2 properties, got {count}")));
                };
                // rebuild the right comb
                rev.fold(Ty::Pair(Box::new(prev), Box::new(last)), |acc, field| {
                    Ty::Pair(Box::new(field), Box::new(Node::new(None, acc)))
                })
            }
            Prim::Or => {
                let arms = one_of(obj)?;
                let [l, r] = arms else {
                    return Err(Error::InvalidSchema(format!("`or` needs exactly 2 arms, got {}", arms.len())));
                };
                Ty::Or { left: Box::new(or_arm(l)?), right: Box::new(or_arm(r)?), side: None }
            }
            Prim::Option => {
                let inner = one_of(obj)?
                    .iter()
                    .find(|arm| arm.get("type").and_then(Value::as_str) != Some("null"))
                    .ok_or_else(|| Error::InvalidSchema("option without a non-null arm".into()))?;
                Ty::Option { inner: Box::new(Node::from_json_schema(inner)?), some: None }
            }
            Prim::List | Prim::Set => {
                let item = Box::new(Node::from_json_schema(property(obj, "items")?)?);
                if prim == Prim::Set {
                    Ty::Set { item, items: Vec::new() }
                } else {
                    Ty::List { item, items: Vec::new() }
                }
            }
            Prim::Map | Prim::BigMap => {
                let items = property(obj, "items")?;
                let props = items
                    .get("properties")
                    .and_then(Value::as_object)
                    .ok_or_else(|| Error::InvalidSchema("map items need properties".into()))?;
                let part = |k: &str| {
                    props
                        .get(k)
                        .ok_or_else(|| Error::InvalidSchema(format!("map items need `{k}`")))
                        .and_then(Node::from_json_schema)
                        .map(Box::new)
                };
                let (key, value) = (part(MAP_KEY)?, part(MAP_VALUE)?);
                if prim == Prim::BigMap {
                    Ty::BigMap { key, value, ptr: None, entries: Vec::new() }
                } else {
                    Ty::Map { key, value, entries: Vec::new() }
                }
            }
        };
        Ok(Node::new(name, ty))
    }
}

fn infer_prim(obj: &Map<String, Value>) -> Result<Prim> {
    if let Some(arms) = obj.get("oneOf").and_then(Value::as_array) {
        let has_null = arms.iter().any(|a| a.get("type").and_then(Value::as_str) == Some("null"));
        return Ok(if has_null { Prim::Option } else { Prim::Or });
    }
    let prim = match obj.get("type").and_then(Value::as_str) {
        Some("integer") => Prim::Int,
        Some("boolean") => Prim::Bool,
        Some("string") if obj.get("format").and_then(Value::as_str) == Some("date-time") => Prim::Timestamp,
        Some("string") => Prim::String,
        Some("object") if obj.contains_key("properties") => Prim::Pair,
        Some("object") => Prim::Unit,
        Some("array") if obj.contains_key("items") => Prim::List,
        other => return Err(Error::UnknownSchemaType(format!("{other:?}"))),
    };
    Ok(prim)
}

fn property<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    obj.get(key)
        .ok_or_else(|| Error::InvalidSchema(format!("missing `{key}`")))
}

fn properties(obj: &Map<String, Value>) -> Result<&Map<String, Value>> {
    property(obj, "properties")?
        .as_object()
        .ok_or_else(|| Error::InvalidSchema("`properties` must be an object".into()))
}

fn one_of(obj: &Map<String, Value>) -> Result<&[Value]> {
    property(obj, "oneOf")?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| Error::InvalidSchema("`oneOf` must be an array".into()))
}

/// Property keys are names unless they are synthetic `@...` keys.
fn named(mut node: Node, key: &str) -> Result<Node> {
    node.name = if key.starts_with('@') { None } else { Some(key.to_string()) };
    Ok(node)
}

fn or_arm(arm: &Value) -> Result<Node> {
    let obj = arm
        .as_object()
        .ok_or_else(|| Error::InvalidSchema("`or` arm must be an object".into()))?;
    let mut children = properties(obj)?.iter().filter(|(k, _)| k.as_str() != SCHEMA_KEY);
    match (children.next(), children.next()) {
        (Some((key, schema)), None) => named(Node::from_json_schema(schema)?, key),
        _ => Err(Error::InvalidSchema("`or` arm must hold exactly one child besides `schemaKey`".into())),
    }
}

// --------------------------------- Form ---------------------------------- //

fn json_int(data: &Value, path: &str) -> Result<BigInt> {
    match data {
        Value::Number(n) => n
            .as_i64()
            .map(BigInt::from)
            .or_else(|| n.as_u64().map(BigInt::from))
            .ok_or_else(|| Error::invalid_json(path, format!("{n} is not an integer"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| Error::invalid_json(path, format!("`{s}` is not an integer"))),
        other => Err(Error::invalid_json(path, format!("expected an integer, got {other}"))),
    }
}

fn json_str<'a>(data: &'a Value, path: &str) -> Result<&'a str> {
    data.as_str()
        .ok_or_else(|| Error::invalid_json(path, format!("expected a string, got {data}")))
}

fn json_hex(data: &Value, path: &str) -> Result<Vec<u8>> {
    let s = json_str(data, path)?;
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| Error::invalid_json(path, e.to_string()))
}

fn json_object<'a>(data: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    data.as_object()
        .ok_or_else(|| Error::invalid_json(path, format!("expected an object, got {data}")))
}

fn json_array<'a>(data: &'a Value, path: &str) -> Result<&'a [Value]> {
    data.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| Error::invalid_json(path, format!("expected an array, got {data}")))
}

impl Node {
    /// Leaf literal for form data, or `None` for kinds filled structurally.
    fn json_literal(&self, data: &Value, path: &str) -> Result<Option<Micheline>> {
        let lit = match &self.ty {
            Ty::Int(_) | Ty::Nat(_) | Ty::Mutez(_) => Micheline::Int(json_int(data, path)?),
            Ty::Bool(_) => match data {
                Value::Bool(b) => Micheline::prim(if *b { "True" } else { "False" }, Vec::new()),
                other => return Err(Error::invalid_json(path, format!("expected a boolean, got {other}"))),
            },
            Ty::String(_)
            | Ty::Address(_)
            | Ty::Contract { .. }
            | Ty::KeyHash(_)
            | Ty::Key(_)
            | Ty::Signature(_)
            | Ty::ChainId(_) => Micheline::string(json_str(data, path)?),
            Ty::Timestamp(_) => match data {
                Value::Number(_) => Micheline::Int(json_int(data, path)?),
                _ => Micheline::string(json_str(data, path)?),
            },
            Ty::Bytes(_) | Ty::SaplingTransaction { .. } => Micheline::Bytes(json_hex(data, path)?),
            Ty::SaplingState { .. } => match data {
                Value::Null => Micheline::Seq(Vec::new()),
                _ => Micheline::Int(json_int(data, path)?),
            },
            Ty::Lambda { .. } | Ty::Opaque { prim: Prim::Operation, .. } => {
                Micheline::try_from(data).map_err(|e| Error::invalid_json(path, e))?
            }
            Ty::Opaque { prim: Prim::TxRollupL2Address, .. } => Micheline::string(json_str(data, path)?),
            Ty::Opaque { .. } => Micheline::Bytes(json_hex(data, path)?),
            Ty::BigMap { .. } if data.is_number() => Micheline::Int(json_int(data, path)?),
            _ => return Ok(None),
        };
        Ok(Some(lit))
    }

    /// Settle this node from nested JSON form data. `path` locates `data`
    /// in the input document for error messages.
    pub fn fill_json(&mut self, data: Option<&Value>, path: &str) -> Result<()> {
        let label = self.label();
        match &mut self.ty {
            Ty::Unit(slot) => {
                *slot = Some(());
                return Ok(());
            }
            Ty::Option { inner, some } => {
                match data {
                    None | Some(Value::Null) => *some = Some(false),
                    Some(v) => {
                        inner.fill_json(Some(v), path)?;
                        *some = Some(true);
                    }
                }
                return Ok(());
            }
            _ => {}
        }
        let data = data.ok_or_else(|| Error::invalid_json(path, "missing value"))?;
        if let Some(lit) = self.json_literal(data, path)? {
            return self.parse_value(&lit).map_err(|e| Error::invalid_json(path, e.to_string()));
        }
        if self.is_pair() {
            let obj = json_object(data, path)?;
            return self.fill_fields(obj, path, &mut 0);
        }
        match &mut self.ty {
            Ty::Or { left, right, side } => {
                let obj = json_object(data, path)?;
                let step = match obj.get(SCHEMA_KEY).and_then(Value::as_str) {
                    Some("L") => Step::Left,
                    Some("R") => Step::Right,
                    other => {
                        return Err(Error::invalid_json(path, format!("`{SCHEMA_KEY}` must be \"L\" or \"R\", got {other:?}")));
                    }
                };
                let (child, position) = match step {
                    Step::Left => (left, 0),
                    Step::Right => (right, 1),
                };
                let key = field_key(child, position);
                child.fill_json(obj.get(&key), &format!("{path}/{key}"))?;
                *side = Some(step);
            }
            Ty::Ticket { content, ticketer, amount } => {
                let obj = json_object(data, path)?;
                let t = json_str(property_of(obj, "ticketer", path)?, path)?;
                *ticketer = Some(parse_address("ticketer", &Micheline::string(t))?);
                content.fill_json(obj.get("content"), &format!("{path}/content"))?;
                let a = json_int(property_of(obj, "amount", path)?, path)?;
                if a < BigInt::from(0) {
                    return Err(Error::invalid_json(format!("{path}/amount"), "ticket amount is negative"));
                }
                *amount = Some(a);
            }
            Ty::List { item, items } | Ty::Set { item, items } => {
                *items = json_array(data, path)?
                    .iter()
                    .enumerate()
                    .map(|(i, x)| {
                        let mut child = item.as_ref().clone();
                        child.fill_json(Some(x), &format!("{path}/{i}")).map(|_| child)
                    })
                    .collect::<Result<_>>()?;
            }
            Ty::Map { key, value, entries } => *entries = fill_entries(key, value, data, path)?,
            Ty::BigMap { key, value, ptr, entries } => {
                *ptr = None;
                *entries = fill_entries(key, value, data, path)?;
            }
            _ => return Err(Error::invalid_json(path, format!("cannot fill `{label}` from {data}"))),
        }
        Ok(())
    }

    /// Fill the flattened fields of a pair from one object, counting
    /// positions across the comb.
    fn fill_fields(&mut self, obj: &Map<String, Value>, path: &str, position: &mut usize) -> Result<()> {
        let Ty::Pair(left, right) = &mut self.ty else {
            return Ok(());
        };
        let key = field_key(left, *position);
        *position += 1;
        left.fill_json(obj.get(&key), &format!("{path}/{key}"))?;
        if right.is_comb_tail() {
            return right.fill_fields(obj, path, position);
        }
        let key = field_key(right, *position);
        *position += 1;
        right.fill_json(obj.get(&key), &format!("{path}/{key}"))
    }
}

fn property_of<'a>(obj: &'a Map<String, Value>, key: &str, path: &str) -> Result<&'a Value> {
    obj.get(key)
        .ok_or_else(|| Error::invalid_json(format!("{path}/{key}"), "missing value"))
}

fn fill_entries(key: &Node, value: &Node, data: &Value, path: &str) -> Result<Vec<(Node, Node)>> {
    json_array(data, path)?
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let here = format!("{path}/{i}");
            let obj = json_object(entry, &here)?;
            let mut k = key.clone();
            k.fill_json(obj.get(MAP_KEY), &format!("{here}/{MAP_KEY}"))?;
            let mut v = value.clone();
            v.fill_json(obj.get(MAP_VALUE), &format!("{here}/{MAP_VALUE}"))?;
            Ok((k, v))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(ty: Value) -> Node {
        Node::from_type(&serde_json::from_value(ty).unwrap()).unwrap()
    }

    fn storage() -> Node {
        node(json!({
            "prim": "pair",
            "args": [
                {"prim": "address", "annots": ["%owner"]},
                {"prim": "nat"},
                {"prim": "option", "args": [{"prim": "string"}], "annots": ["%memo"]},
                {"prim": "map", "args": [{"prim": "string"}, {"prim": "int"}], "annots": ["%scores"]}
            ]
        }))
    }

    #[test]
    fn pair_fields_flatten_with_synthetic_keys() {
        let schema = storage().json_schema();
        let keys: Vec<_> = schema["properties"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["owner", "@nat_1", "memo", "scores"]);
        assert_eq!(schema["required"], json!(["owner", "@nat_1", "scores"]));
        assert_eq!(schema["properties"]["memo"]["oneOf"][0], json!({"type": "null", "title": "None"}));
        assert_eq!(schema["properties"]["scores"]["x-itemTitle"], json!("@key"));
    }

    #[test]
    fn named_right_pair_is_not_flattened() {
        let n = node(json!({
            "prim": "pair",
            "args": [{"prim": "nat"}, {"prim": "pair", "args": [{"prim": "int"}, {"prim": "int"}], "annots": ["%range"]}]
        }));
        let schema = n.json_schema();
        assert_eq!(schema["properties"].as_object().unwrap().len(), 2);
        assert_eq!(schema["properties"]["range"]["prim"], json!("pair"));
    }

    #[test]
    fn or_arms_are_tagged() {
        let n = node(json!({"prim": "or", "args": [{"prim": "nat", "annots": ["%mint"]}, {"prim": "unit"}]}));
        let schema = n.json_schema();
        let arms = schema["oneOf"].as_array().unwrap();
        assert_eq!(arms.len(), 2);
        assert_eq!(arms[0]["properties"]["schemaKey"]["const"], json!("L"));
        assert_eq!(arms[1]["properties"]["schemaKey"]["const"], json!("R"));
        assert!(arms[0]["properties"]["mint"].is_object());
        assert!(arms[1]["properties"]["@unit_1"].is_object());
    }

    #[test]
    fn schema_roundtrip_preserves_type() {
        let cases = [
            storage(),
            node(json!({"prim": "or", "args": [
                {"prim": "list", "args": [{"prim": "pair", "args": [{"prim": "nat"}, {"prim": "bytes"}]}]},
                {"prim": "or", "args": [
                    {"prim": "big_map", "args": [{"prim": "key_hash"}, {"prim": "timestamp"}], "annots": ["%ledger"]},
                    {"prim": "ticket", "args": [{"prim": "string"}]}
                ]}
            ]})),
            node(json!({"prim": "pair", "args": [
                {"prim": "pair", "args": [{"prim": "nat"}, {"prim": "nat"}]},
                {"prim": "contract", "args": [{"prim": "unit"}]},
                {"prim": "lambda", "args": [{"prim": "unit"}, {"prim": "set", "args": [{"prim": "mutez"}]}], "annots": ["%hook"]}
            ]})),
        ];
        for original in cases {
            let back = Node::from_json_schema(&original.json_schema()).unwrap();
            assert!(back.equal_type(&original), "{} vs {}", back.to_type(), original.to_type());
            assert_eq!(back.to_type(), original.to_type());
        }
    }

    #[test]
    fn malformed_schemas() {
        let bad_or = json!({"prim": "or", "oneOf": [{"type": "object", "properties": {"a": {"prim": "nat"}}}]});
        assert!(matches!(Node::from_json_schema(&bad_or), Err(Error::InvalidSchema(_))));
        assert!(matches!(Node::from_json_schema(&json!({"prim": "frobnicate"})), Err(Error::UnknownSchemaType(_))));
        assert!(matches!(Node::from_json_schema(&json!({"type": "weird"})), Err(Error::UnknownSchemaType(_))));
    }

    #[test]
    fn fills_form_data() {
        let mut n = storage();
        n.fill_json(
            Some(&json!({
                "owner": "tz1Ke3u9SqxvnkdNkgaCmydXg3zh3iaKNDxw",
                "@nat_1": "12",
                "scores": [{"@key": "alice", "@value": -3}]
            })),
            "",
        )
        .unwrap();
        let expected: Micheline = serde_json::from_value(json!({
            "prim": "Pair",
            "args": [
                {"string": "tz1Ke3u9SqxvnkdNkgaCmydXg3zh3iaKNDxw"},
                {"prim": "Pair", "args": [
                    {"int": "12"},
                    {"prim": "Pair", "args": [
                        {"prim": "None"},
                        [{"prim": "Elt", "args": [{"string": "alice"}, {"int": "-3"}]}]
                    ]}
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(n.to_micheline().unwrap(), expected);
    }

    #[test]
    fn fills_or_by_schema_key() {
        let mut n = node(json!({"prim": "or", "args": [{"prim": "nat", "annots": ["%mint"]}, {"prim": "string", "annots": ["%burn"]}]}));
        n.fill_json(Some(&json!({"schemaKey": "R", "burn": "all"})), "").unwrap();
        assert_eq!(n.to_micheline().unwrap(), Micheline::right(Micheline::string("all")));
    }

    #[test]
    fn form_errors_carry_paths() {
        let mut n = storage();
        let err = n
            .fill_json(Some(&json!({"owner": "tz1Ke3u9SqxvnkdNkgaCmydXg3zh3iaKNDxw", "@nat_1": true, "scores": []})), "")
            .unwrap_err();
        match err {
            Error::InvalidJsonData { path, .. } => assert_eq!(path, "/@nat_1"),
            other => panic!("unexpected error {other}"),
        }
    }
}
