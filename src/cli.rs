//! CLI: type → (schema | entrypoints), values → (settle | diff | forge)
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use crate::ast::{BigMapDiff, DiffKind, MiguelNode, TypedTree};
use crate::forge::{self, OperationGroup};
use crate::jq_exec::Selector;
use crate::micheline::Micheline;
use crate::path_de;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// work with typed Michelson values: JSON schemas, entrypoints, settling, diffs and forging
#[derive(Parser, Debug)]
#[command(name = "micheline-kit")]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the JSON schema of a type (or of one entrypoint)
    Schema(SchemaOut),
    /// list the entrypoints of a parameter type
    Entrypoints(EntrypointsOut),
    /// settle value documents against a type and print them back
    Settle(SettleOut),
    /// diff two value documents of the same type
    Diff(DiffOut),
    /// forge values or operation groups to hex
    Forge(ForgeOut),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Section {
    Parameter,
    Storage,
}

impl Section {
    fn prim(self) -> &'static str {
        match self {
            Self::Parameter => "parameter",
            Self::Storage => "storage",
        }
    }
}

#[derive(Args, Debug, Clone)]
struct TypeSettings {
    /// Micheline type JSON, or a whole script (`[parameter, storage, code]`)
    #[arg(long = "type", short = 't')]
    type_path: PathBuf,

    /// section to take from a script
    #[arg(long, value_enum)]
    section: Option<Section>,

    /// the type file is a JSON schema produced by `schema`
    #[arg(long, default_value_t = false)]
    from_schema: bool,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer to select a subnode in each document (e.g. /script/storage)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    /// schema of this entrypoint only
    #[arg(long, short)]
    entrypoint: Option<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct EntrypointsOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    /// also print the typedefs of each entrypoint
    #[arg(long, default_value_t = false)]
    docs: bool,
}

#[derive(clap::Parser, Debug)]
struct SettleOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// inputs are form data shaped like the JSON schema, not Micheline
    #[arg(long, default_value_t = false)]
    form: bool,

    /// print transaction parameters for this entrypoint instead of the value
    #[arg(long)]
    parameters: Option<String>,

    /// big map diffs (JSON array) to load before printing
    #[arg(long)]
    big_map_diffs: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct DiffOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    /// previous value (omit to show everything as created)
    #[arg(long)]
    prev: Option<PathBuf>,

    /// current value
    #[arg(long)]
    next: PathBuf,

    /// print the diff tree as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(clap::Parser, Debug)]
struct ForgeOut {
    // required unless `--operation`
    #[command(flatten)]
    type_settings: Option<TypeSettings>,

    #[command(flatten)]
    input_settings: InputSettings,

    /// inputs are operation groups (`{branch, contents}`)
    #[arg(long, default_value_t = false)]
    operation: bool,

    /// prefix values with the pack watermark
    #[arg(long, default_value_t = false)]
    pack: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeSettings {
    fn load(&self) -> Result<TypedTree> {
        let source = read_source(&self.type_path)?;
        let tree = if self.from_schema {
            let schema: Value = path_de::from_str_with_path(&source)?;
            TypedTree::from_json_schema(&schema)?
        } else {
            let ty: Micheline = path_de::from_str_with_path(&source)?;
            TypedTree::from_type(&self.select_section(ty)?)?
        };
        Ok(tree)
    }

    fn select_section(&self, ty: Micheline) -> Result<Micheline> {
        let Some(section) = self.section else {
            return Ok(ty);
        };
        let Micheline::Seq(sections) = ty else {
            bail!("--section needs a script (a sequence of sections)");
        };
        sections
            .into_iter()
            .find(|s| s.is_prim(section.prim()))
            .with_context(|| format!("script has no `{}` section", section.prim()))
    }
}

impl InputSettings {
    /// Every selected document, tagged with the file it came from.
    fn load(&self) -> Result<Vec<(String, Value)>> {
        let selector = Selector::new(self.json_pointer.clone(), self.jq_expr.clone());
        let mut out = Vec::new();
        for source_path in resolve_file_path_patterns(&self.input)? {
            let label = source_path.to_string_lossy().to_string();
            let document: Value = path_de::from_str_with_path(&read_source(&source_path)?)
                .with_context(|| format!("failed to parse JSON source file ({label})"))?;
            let selected = selector
                .apply(document)
                .with_context(|| format!("failed to select from source file ({label})"))?;
            out.extend(selected.into_iter().map(|v| (label.clone(), v)));
        }
        tracing::debug!(documents = out.len(), "loaded input documents");
        Ok(out)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Schema(target) => {
                let tree = target.type_settings.load()?;
                let schema = match &target.entrypoint {
                    None => tree.to_json_schema(),
                    Some(name) => tree.entrypoint_schema(name)?,
                };
                emit(target.out.as_deref(), &serde_json::to_string_pretty(&schema)?)
            }
            Command::Entrypoints(target) => {
                let tree = target.type_settings.load()?;
                for entrypoint in tree.entrypoint_list() {
                    let name = if entrypoint.annotated {
                        entrypoint.name.bold()
                    } else {
                        entrypoint.name.normal()
                    };
                    println!("{:>3}  {name}  {}", entrypoint.index, entrypoint.path.to_string().dimmed());
                    if target.docs {
                        for doc in tree.docs(&entrypoint.name)? {
                            println!("       {}", serde_json::to_string(&doc)?);
                        }
                    }
                }
                Ok(())
            }
            Command::Settle(target) => {
                let template = target.type_settings.load()?;
                let diffs: Vec<BigMapDiff> = match &target.big_map_diffs {
                    None => Vec::new(),
                    Some(path) => path_de::from_str_with_path(&read_source(path)?)?,
                };
                let documents = target.input_settings.load()?;
                let rendered = documents
                    .into_par_iter()
                    .map(|(label, document)| {
                        target
                            .settle_one(&template, &diffs, document)
                            .with_context(|| format!("failed to settle a document from {label}"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                for line in rendered {
                    println!("{line}");
                }
                Ok(())
            }
            Command::Diff(target) => {
                let template = target.type_settings.load()?;
                let settle = |path: &Path| -> Result<TypedTree> {
                    let value: Micheline = path_de::from_str_with_path(&read_source(path)?)?;
                    let mut tree = template.clone();
                    tree.settle_value(&value)
                        .with_context(|| format!("failed to settle {}", path.display()))?;
                    Ok(tree)
                };
                let next = settle(&target.next)?;
                let prev = target.prev.as_deref().map(settle).transpose()?;
                let nodes = next.diff(prev.as_ref())?;
                if target.json {
                    println!("{}", serde_json::to_string_pretty(&nodes)?);
                } else {
                    for node in &nodes {
                        print_miguel(node, 0);
                    }
                }
                Ok(())
            }
            Command::Forge(target) => {
                let documents = target.input_settings.load()?;
                let template = match (&target.type_settings, target.operation) {
                    (_, true) => None,
                    (Some(settings), false) => Some(settings.load()?),
                    (None, false) => bail!("--type is required unless --operation is set"),
                };
                let forged = documents
                    .into_par_iter()
                    .map(|(label, document)| {
                        target
                            .forge_one(template.as_ref(), document)
                            .with_context(|| format!("failed to forge a document from {label}"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                for bytes in forged {
                    println!("{}", hex::encode(bytes));
                }
                Ok(())
            }
        }
    }
}

impl SettleOut {
    fn settle_one(&self, template: &TypedTree, diffs: &[BigMapDiff], document: Value) -> Result<String> {
        let mut tree = template.clone();
        if self.form {
            tree.from_json(&document)?;
        } else {
            let value: Micheline = path_de::from_value_with_path(document)?;
            tree.settle_value(&value)?;
        }
        if !diffs.is_empty() {
            tree.enrich_big_map(diffs)?;
        }
        let out = match &self.parameters {
            Some(entrypoint) => serde_json::to_string(&tree.to_parameters(entrypoint)?)?,
            None => match tree.to_micheline()?.as_slice() {
                [single] => serde_json::to_string(single)?,
                many => serde_json::to_string(many)?,
            },
        };
        Ok(out)
    }
}

impl ForgeOut {
    fn forge_one(&self, template: Option<&TypedTree>, document: Value) -> Result<Vec<u8>> {
        let Some(template) = template else {
            let group: OperationGroup = path_de::from_value_with_path(document)?;
            return Ok(forge::forge_operation_group(&group)?);
        };
        let value: Micheline = path_de::from_value_with_path(document)?;
        let mut tree = template.clone();
        tree.settle_value(&value)?;
        let bytes = if self.pack {
            let normalized = tree.to_micheline()?;
            match normalized.as_slice() {
                [single] => forge::pack(single)?,
                _ => bail!("--pack needs a single-root type"),
            }
        } else {
            tree.forge()?
        };
        Ok(bytes)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read source file {}", path.display()))
}

fn emit(out: Option<&Path>, contents: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

fn print_miguel(node: &MiguelNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let label = node.name.as_deref().unwrap_or(&node.prim);
    let value = match (&node.from, &node.value) {
        (Some(from), Some(to)) => format!(" {from} -> {to}"),
        (None, Some(v)) => format!(" {v}"),
        _ => String::new(),
    };
    let line = format!("{indent}{label}: {}{value}", node.type_);
    let line = match node.kind {
        DiffKind::Create => format!("+ {line}").green(),
        DiffKind::Delete => format!("- {line}").red(),
        DiffKind::Update => format!("~ {line}").yellow(),
        DiffKind::Unchanged => format!("  {line}").normal(),
    };
    println!("{line}");
    for child in &node.children {
        print_miguel(child, depth + 1);
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let before = out.len();
        for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern: {pattern}"))? {
            out.push(entry?);
        }
        if out.len() == before {
            bail!("glob pattern matched no files: {pattern}");
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = CommandLineInterface::try_parse_from([
            "micheline-kit",
            "settle",
            "--type",
            "ty.json",
            "--section",
            "storage",
            "-i",
            "a.json",
            "b.json",
            "--parameters",
            "transfer",
        ])
        .unwrap();
        let Command::Settle(settle) = cli.cmd else { panic!("settle expected") };
        assert_eq!(settle.input_settings.input, vec!["a.json", "b.json"]);
        assert_eq!(settle.parameters.as_deref(), Some("transfer"));
        assert!(matches!(settle.type_settings.section, Some(Section::Storage)));
    }

    #[test]
    fn forge_shares_type_settings() {
        let cli = CommandLineInterface::try_parse_from([
            "micheline-kit",
            "forge",
            "--type",
            "script.json",
            "--section",
            "parameter",
            "--from-schema",
            "-i",
            "value.json",
        ])
        .unwrap();
        let Command::Forge(forge) = cli.cmd else { panic!("forge expected") };
        let settings = forge.type_settings.unwrap();
        assert!(matches!(settings.section, Some(Section::Parameter)));
        assert!(settings.from_schema);

        let cli = CommandLineInterface::try_parse_from(["micheline-kit", "forge", "--operation", "-i", "op.json"]).unwrap();
        let Command::Forge(forge) = cli.cmd else { panic!("forge expected") };
        assert!(forge.type_settings.is_none());
        assert!(forge.operation);
    }

    #[test]
    fn picks_script_section() {
        let settings = TypeSettings { type_path: PathBuf::new(), section: Some(Section::Storage), from_schema: false };
        let script = Micheline::Seq(vec![
            Micheline::prim("parameter", vec![Micheline::prim("unit", vec![])]),
            Micheline::prim("storage", vec![Micheline::prim("nat", vec![])]),
        ]);
        let storage = settings.select_section(script).unwrap();
        let tree = TypedTree::from_type(&storage).unwrap();
        assert_eq!(tree.to_type(), Micheline::prim("nat", vec![]));
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["some/file.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("some/file.json")]);
    }
}
