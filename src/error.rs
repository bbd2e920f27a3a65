// Error types
// Every fallible operation in the library returns crate::Result

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for moviedb
#[derive(Error, Debug)]
pub enum Error {
    /// The query text could not be parsed
    #[error("Query syntax error: {0}")]
    Syntax(String),

    /// The query parsed but uses something we don't evaluate
    #[error("Unsupported query construct: {0}")]
    Unsupported(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Entity '{entity}' has no attribute or relation '{name}'")]
    UnknownAttribute { entity: String, name: String },

    #[error("Unknown alias: {0}")]
    UnknownAlias(String),

    #[error("Alias '{0}' is declared more than once")]
    DuplicateAlias(String),

    /// A placeholder in the query has no value bound to it
    #[error("Parameter '{0}' is not bound")]
    UnboundParameter(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Query returned no result")]
    NoResult,

    #[error("Query returned {0} results where one was expected")]
    NonUniqueResult(usize),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Primary key, arity or NOT NULL violation while loading rows
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The configured data store could not be reached
    #[error("Data store unavailable at {}: {source}", path.display())]
    StoreUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid dataset: {0}")]
    Dataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown persistence profile: {0}")]
    UnknownProfile(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
