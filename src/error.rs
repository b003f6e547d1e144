//! Error types shared by the schema engine and the forging codec.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Unknown primitive or discriminator while building a typed tree
    #[error("unknown schema type: {0}")]
    UnknownSchemaType(String),

    /// Malformed schema shape (wrong `oneOf` arity, missing args, ...)
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Value forest does not line up with the typed tree
    #[error("trees are different: {0}")]
    TreesAreDifferent(String),

    #[error("type is not comparable: {0}")]
    TypeIsNotComparable(String),

    /// Literal does not fit the node it is attached to
    #[error("invalid value for `{node}`: {reason}")]
    InvalidValue { node: String, reason: String },

    #[error("natural number must be non-negative, got {0}")]
    NegativeNatural(String),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// No prefix registration matches the decoded identifier
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("base58 decode error: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("unknown michelson primitive: {0}")]
    UnknownPrimitive(String),

    /// Operation kind without a forging implementation
    #[error("not implemented: {0}")]
    Unimplemented(String),

    #[error("tree is already settled")]
    AlreadySettled,

    #[error("tree is not settled")]
    NotSettled,

    #[error("unknown entrypoint: {0}")]
    UnknownEntrypoint(String),

    #[error("settled value does not take entrypoint `{0}`")]
    EntrypointMismatch(String),

    /// Nested JSON input for the form direction is malformed
    #[error("invalid json data at `{path}`: {reason}")]
    InvalidJsonData { path: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_value(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue { node: node.into(), reason: reason.into() }
    }

    pub(crate) fn invalid_json(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidJsonData { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
