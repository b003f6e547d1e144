//! Per-document pre-selection: an optional JSON pointer, then an optional
//! jq filter (run with jaq). Each input document may yield several outputs.
use anyhow::{anyhow, Context, Result};
use jaq_core::{compile::Undefined, load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

#[derive(Clone, Debug, Default)]
pub struct Selector {
    pub json_pointer: Option<String>,
    pub jq_expr: Option<String>,
}

impl Selector {
    pub fn new(json_pointer: Option<String>, jq_expr: Option<String>) -> Self {
        Self { json_pointer, jq_expr }
    }

    pub fn apply(&self, document: Value) -> Result<Vec<Value>> {
        let document = match &self.json_pointer {
            None => document,
            Some(pointer) => document
                .pointer(pointer)
                .cloned()
                .with_context(|| format!("json pointer `{pointer}` selects nothing"))?,
        };
        match &self.jq_expr {
            None => Ok(vec![document]),
            Some(expr) => run_jaq(expr, &document),
        }
    }
}

pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(format_parse_errors)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(format_undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    for item in outputs {
        let v = item.map_err(|e| anyhow!("jq `{filter_src}`: {e:?}"))?;
        // Val renders as JSON text
        let json = serde_json::from_str(&v.to_string())
            .with_context(|| format!("jq `{filter_src}` produced non-JSON output"))?;
        out.push(json);
    }
    Ok(out)
}

fn format_parse_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> anyhow::Error {
    let lines: Vec<_> = errs
        .into_iter()
        .map(|(file, err)| format!("parse error: {err:?} in `{}`", file.code))
        .collect();
    anyhow!(lines.join("\n"))
}

fn format_undefined_errors(errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>) -> anyhow::Error {
    let lines: Vec<_> = errs
        .into_iter()
        .flat_map(|(file, list)| {
            list.into_iter()
                .map(move |(name, undef)| format!("undefined `{name}`: {undef:?} in `{}`", file.code))
        })
        .collect();
    anyhow!(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pointer_then_filter() {
        let doc = json!({"script": {"storage": [{"int": "1"}, {"int": "2"}]}});
        let sel = Selector::new(Some("/script/storage".into()), Some(".[]".into()));
        assert_eq!(sel.apply(doc).unwrap(), vec![json!({"int": "1"}), json!({"int": "2"})]);
    }

    #[test]
    fn missing_pointer_is_an_error() {
        let sel = Selector::new(Some("/nope".into()), None);
        assert!(sel.apply(json!({})).is_err());
    }

    #[test]
    fn passthrough() {
        assert_eq!(Selector::default().apply(json!(1)).unwrap(), vec![json!(1)]);
    }
}
