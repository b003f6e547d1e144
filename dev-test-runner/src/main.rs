//! Runs `fixtures/*.json` through the library and reports each case.
//!
//! A case names a type and a value, plus what to expect from them:
//! entrypoint names, forged hex, and optionally transaction parameters.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use micheline_kit::{Micheline, Parameters, TypedTree};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static FIXTURE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_]+\.json$").unwrap());

#[derive(Debug, Deserialize)]
struct Case {
    name: String,
    #[serde(rename = "type")]
    ty: Micheline,
    value: Micheline,
    #[serde(default)]
    entrypoints: Option<Vec<String>>,
    #[serde(default)]
    forged: Option<String>,
    #[serde(default)]
    parameters: Option<ExpectedParameters>,
}

#[derive(Debug, Deserialize)]
struct ExpectedParameters {
    entrypoint: String,
    expected: Parameters,
}

fn run_case(case: &Case) -> Result<(), String> {
    let mut tree = TypedTree::from_type(&case.ty).map_err(|e| e.to_string())?;
    if let Some(expected) = &case.entrypoints {
        let got = tree.entrypoints();
        if &got != expected {
            return Err(format!("entrypoints: expected {expected:?}, got {got:?}"));
        }
    }
    tree.settle_value(&case.value).map_err(|e| e.to_string())?;
    if let Some(expected) = &case.forged {
        let got = hex::encode(tree.forge().map_err(|e| e.to_string())?);
        if &got != expected {
            return Err(format!("forged: expected {expected}, got {got}"));
        }
    }
    if let Some(params) = &case.parameters {
        let got = tree.to_parameters(&params.entrypoint).map_err(|e| e.to_string())?;
        if got != params.expected {
            return Err(format!("parameters: expected {:?}, got {got:?}", params.expected));
        }
    }
    Ok(())
}

fn load_cases(path: &Path) -> Result<Vec<Case>, String> {
    let src = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let de = &mut serde_json::Deserializer::from_str(&src);
    serde_path_to_error::deserialize(de).map_err(|err| format!("at JSON path {} → {}", err.path(), err.inner()))
}

fn fixture_paths() -> Vec<PathBuf> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    let mut paths: Vec<_> = std::fs::read_dir(&dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| FIXTURE_NAME.is_match(n)))
                .collect()
        })
        .unwrap_or_default();
    paths.sort();
    paths
}

fn main() -> ExitCode {
    let mut failed = 0;
    let mut passed = 0;
    for path in fixture_paths() {
        let cases = match load_cases(&path) {
            Ok(cases) => cases,
            Err(error) => {
                eprintln!("❌ {}: {error}", path.display());
                failed += 1;
                continue;
            }
        };
        for case in &cases {
            match run_case(case) {
                Ok(()) => {
                    eprintln!("✅ {}", case.name);
                    passed += 1;
                }
                Err(error) => {
                    eprintln!("❌ {}: {error}", case.name);
                    failed += 1;
                }
            }
        }
    }
    eprintln!("—— {passed} passed, {failed} failed ——");
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
