//! Error types for catalog operations.
//!
//! One error type covers every way loading can fail: I/O, JSON or YAML
//! parsing, schema compilation, bundle integrity and configuration.

use schema_cast_core::SchemaError;
use thiserror::Error;

/// Errors that can occur while loading or saving schema catalogs.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A definition could not be compiled into a schema index.
    #[error("invalid schema for collection `{collection}`: {source}")]
    Schema {
        /// Collection the definition belongs to.
        collection: String,
        /// Compilation failure.
        #[source]
        source: SchemaError,
    },

    /// Bundle hash mismatch between the stored and computed values.
    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    /// No schema is registered for the requested collection.
    #[error("unknown collection `{0}`")]
    UnknownCollection(String),

    /// A configuration entry is malformed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// All configured loader sources failed.
    #[error("no schema sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`CatalogError`].
pub type Result<T> = std::result::Result<T, CatalogError>;
