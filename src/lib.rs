//! Typed Michelson values and the binary forging codec.
//!
//! - [`ast`]: type trees, settling, JSON schema, entrypoints, diff, big maps.
//! - [`forge`]: Micheline and operation binary encoding.
//! - [`encoding`]: base58check identifiers by prefix.
pub mod ast;
pub mod cli;
pub mod encoding;
pub mod error;
pub mod forge;
pub mod jq_exec;
pub mod micheline;
pub mod path_de;

pub use ast::{BigMapDiff, DiffKind, Entrypoint, MiguelNode, Node, Path, Step, Ty, TypedTree};
pub use error::{Error, Result};
pub use forge::Parameters;
pub use micheline::Micheline;
