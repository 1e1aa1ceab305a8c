//! Schema definition loading and casting configuration.
//!
//! This crate turns schema definitions stored on disk into compiled
//! [`SchemaIndex`](schema_cast_core::SchemaIndex) values keyed by
//! collection name, from several kinds of sources (definition directories,
//! single files, hash-verified bundles), and reads the YAML configuration
//! that drives casting.
//!
//! # Quick start
//!
//! ```no_run
//! use schema_cast_catalog::{CastingConfig, SchemaCatalog};
//! use schema_cast_core::DocumentCaster;
//! use serde_json::json;
//!
//! // Load definitions from a directory
//! let catalog = SchemaCatalog::from_dir("schemas/").unwrap();
//! let bands = catalog.index("bands").unwrap();
//! let outcome = DocumentCaster::new(bands).cast(json!({ "name": "Guns N' Roses" }));
//! assert!(outcome.is_ok());
//!
//! // Or let a config file describe the sources and options
//! let config = CastingConfig::load("schema-cast.yml").unwrap();
//! let catalog = config.catalog().unwrap();
//! let caster = DocumentCaster::with_options(
//!     catalog.index("bands").unwrap(),
//!     config.document_options(),
//! );
//! ```

mod bundle;
mod config;
mod error;
mod loader;

pub use bundle::SchemaBundle;
pub use config::{CastingConfig, DocumentConfig, SourceConfig};
pub use error::{CatalogError, Result};
pub use loader::{CatalogBuilder, CatalogSource, SchemaCatalog, read_definition};
