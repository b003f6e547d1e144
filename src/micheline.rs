//! Untyped Micheline documents.
//!
//! This is the raw parse of a value (or type) document as it travels over the
//! node RPC and indexer APIs: a primitive application, a sequence, or one of
//! the three literal kinds. No typing happens here; see [`crate::ast`] for the
//! typed side.

use std::fmt;

use num_bigint::BigInt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Micheline {
    Int(BigInt),
    String(String),
    Bytes(Vec<u8>),
    Prim {
        prim: String,
        args: Vec<Micheline>,
        annots: Vec<String>,
    },
    Seq(Vec<Micheline>),
}

// ------------------------------ Constructors ----------------------------- //

impl Micheline {
    pub fn int(v: impl Into<BigInt>) -> Self {
        Self::Int(v.into())
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::String(v.into())
    }

    pub fn bytes(v: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(v.into())
    }

    pub fn prim(prim: impl Into<String>, args: Vec<Micheline>) -> Self {
        Self::Prim { prim: prim.into(), args, annots: Vec::new() }
    }

    pub fn prim_with_annots(prim: impl Into<String>, args: Vec<Micheline>, annots: Vec<String>) -> Self {
        Self::Prim { prim: prim.into(), args, annots }
    }

    pub fn unit() -> Self {
        Self::prim("Unit", Vec::new())
    }

    pub fn pair(left: Micheline, right: Micheline) -> Self {
        Self::prim("Pair", vec![left, right])
    }

    pub fn left(v: Micheline) -> Self {
        Self::prim("Left", vec![v])
    }

    pub fn right(v: Micheline) -> Self {
        Self::prim("Right", vec![v])
    }

    pub fn some(v: Micheline) -> Self {
        Self::prim("Some", vec![v])
    }

    pub fn none() -> Self {
        Self::prim("None", Vec::new())
    }

    pub fn elt(key: Micheline, value: Micheline) -> Self {
        Self::prim("Elt", vec![key, value])
    }
}

// ------------------------------- Accessors ------------------------------- //

impl Micheline {
    pub fn prim_name(&self) -> Option<&str> {
        match self {
            Self::Prim { prim, .. } => Some(prim.as_str()),
            _ => None,
        }
    }

    pub fn args(&self) -> &[Micheline] {
        match self {
            Self::Prim { args, .. } => args,
            _ => &[],
        }
    }

    pub fn annots(&self) -> &[String] {
        match self {
            Self::Prim { annots, .. } => annots,
            _ => &[],
        }
    }

    /// First `%field` annotation without its sigil.
    pub fn field_annot(&self) -> Option<&str> {
        self.annots().iter().find_map(|a| a.strip_prefix('%')).filter(|a| !a.is_empty())
    }

    /// First `:type` annotation without its sigil.
    pub fn type_annot(&self) -> Option<&str> {
        self.annots().iter().find_map(|a| a.strip_prefix(':')).filter(|a| !a.is_empty())
    }

    pub fn is_prim(&self, name: &str) -> bool {
        self.prim_name() == Some(name)
    }

    /// Copy of the expression with every annotation dropped.
    pub fn strip_annots(&self) -> Self {
        match self {
            Self::Prim { prim, args, .. } => Self::Prim {
                prim: prim.clone(),
                args: args.iter().map(Self::strip_annots).collect(),
                annots: Vec::new(),
            },
            Self::Seq(xs) => Self::Seq(xs.iter().map(Self::strip_annots).collect()),
            other => other.clone(),
        }
    }
}

// ---------------------------- JSON conversion ---------------------------- //

impl From<&Micheline> for Value {
    fn from(m: &Micheline) -> Self {
        match m {
            Micheline::Int(v) => serde_json::json!({ "int": v.to_string() }),
            Micheline::String(s) => serde_json::json!({ "string": s }),
            Micheline::Bytes(b) => serde_json::json!({ "bytes": hex::encode(b) }),
            Micheline::Seq(xs) => Value::Array(xs.iter().map(Value::from).collect()),
            Micheline::Prim { prim, args, annots } => {
                let mut o = Map::new();
                o.insert("prim".into(), Value::from(prim.as_str()));
                if !args.is_empty() {
                    o.insert("args".into(), Value::Array(args.iter().map(Value::from).collect()));
                }
                if !annots.is_empty() {
                    o.insert("annots".into(), Value::Array(annots.iter().cloned().map(Value::from).collect()));
                }
                Value::Object(o)
            }
        }
    }
}

impl TryFrom<&Value> for Micheline {
    type Error = String;

    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        match v {
            Value::Array(xs) => xs
                .iter()
                .map(Micheline::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Micheline::Seq),
            Value::Object(o) => {
                if let Some(i) = o.get("int") {
                    let s = i.as_str().ok_or("`int` must be a decimal string")?;
                    let n = s.parse::<BigInt>().map_err(|e| format!("bad int `{s}`: {e}"))?;
                    return Ok(Micheline::Int(n));
                }
                if let Some(s) = o.get("string") {
                    let s = s.as_str().ok_or("`string` must be a string")?;
                    return Ok(Micheline::String(s.to_string()));
                }
                if let Some(b) = o.get("bytes") {
                    let s = b.as_str().ok_or("`bytes` must be a hex string")?;
                    let bytes = hex::decode(s).map_err(|e| format!("bad bytes `{s}`: {e}"))?;
                    return Ok(Micheline::Bytes(bytes));
                }
                let prim = o
                    .get("prim")
                    .and_then(Value::as_str)
                    .ok_or("expected one of `int`, `string`, `bytes`, `prim`")?;
                let args = match o.get("args") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(xs)) => xs.iter().map(Micheline::try_from).collect::<Result<_, _>>()?,
                    Some(_) => return Err("`args` must be an array".into()),
                };
                let annots = match o.get("annots") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(xs)) => xs
                        .iter()
                        .map(|a| a.as_str().map(str::to_string).ok_or("`annots` must hold strings"))
                        .collect::<Result<_, _>>()?,
                    Some(_) => return Err("`annots` must be an array".into()),
                };
                Ok(Micheline::Prim { prim: prim.to_string(), args, annots })
            }
            other => Err(format!("unexpected JSON value: {other}")),
        }
    }
}

impl Serialize for Micheline {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Micheline {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        Micheline::try_from(&v).map_err(serde::de::Error::custom)
    }
}

// ------------------------------- Display --------------------------------- //

/// Michelson text notation, used for map keys and lambdas in diff output.
impl fmt::Display for Micheline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Self::Seq(xs) => {
                f.write_str("{ ")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 { f.write_str(" ; ")?; }
                    write!(f, "{x}")?;
                }
                f.write_str(" }")
            }
            Self::Prim { prim, args, annots } => {
                f.write_str(prim)?;
                for a in annots { write!(f, " {a}")?; }
                for a in args {
                    match a {
                        Self::Prim { args: inner, annots: inner_annots, .. }
                            if !inner.is_empty() || !inner_annots.is_empty() => write!(f, " ({a})")?,
                        _ => write!(f, " {a}")?,
                    }
                }
                Ok(())
            }
        }
    }
}
