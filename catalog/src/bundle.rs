//! Schema bundles: many collection definitions in one JSON file.
//!
//! A bundle carries an optional SHA-256 `bundle_hash` over its collection
//! definitions. When present it is checked on load, so a hand-edited or
//! truncated bundle is rejected instead of silently casting against the
//! wrong schema.
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "name": "band-schemas",
//!   "generated_at": "2024-01-15T10:30:00Z",
//!   "bundle_hash": "9f2c…",
//!   "collections": {
//!     "bands": { "name": "String", "members": ["ObjectId"] },
//!     "people": { "name": { "first": "String", "last": "String" } }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CatalogError, Result};

/// Serializable bundle of schema definitions keyed by collection name.
///
/// # Examples
///
/// ```
/// use schema_cast_catalog::SchemaBundle;
/// use serde_json::json;
///
/// let mut bundle = SchemaBundle::new("1.0.0", "2024-01-15T10:30:00Z");
/// bundle.insert("bands", json!({ "name": "String" }));
/// bundle.seal().unwrap();
///
/// assert_eq!(bundle.collection_count(), 1);
/// assert!(bundle.verify().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Bundle format version.
    pub version: String,
    /// Optional bundle name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// ISO-8601 timestamp of bundle creation.
    pub generated_at: String,
    /// Hex SHA-256 of the serialized `collections`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_hash: Option<String>,
    /// Definitions keyed by collection name.
    #[serde(default)]
    pub collections: BTreeMap<String, Value>,
}

impl SchemaBundle {
    /// Creates an empty, unsealed bundle.
    pub fn new(version: impl Into<String>, generated_at: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            name: None,
            generated_at: generated_at.into(),
            bundle_hash: None,
            collections: BTreeMap::new(),
        }
    }

    /// Adds or replaces a collection definition. Clears any existing hash.
    pub fn insert(&mut self, collection: impl Into<String>, definition: Value) {
        self.collections.insert(collection.into(), definition);
        self.bundle_hash = None;
    }

    /// Number of collections in the bundle.
    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    /// Computes the hex SHA-256 digest of the serialized collections.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Json`] if serialization fails.
    pub fn compute_hash(&self) -> Result<String> {
        let bytes = serde_json::to_vec(&self.collections)?;
        let hash = Sha256::digest(&bytes);
        Ok(format!("{:x}", hash))
    }

    /// Stores the current content hash in `bundle_hash`.
    pub fn seal(&mut self) -> Result<()> {
        self.bundle_hash = Some(self.compute_hash()?);
        Ok(())
    }

    /// Checks `bundle_hash` against the content. Unsealed bundles pass.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidChecksum`] on a mismatch.
    pub fn verify(&self) -> Result<()> {
        let Some(expected) = &self.bundle_hash else {
            return Ok(());
        };
        let actual = self.compute_hash()?;
        if *expected != actual {
            return Err(CatalogError::InvalidChecksum(format!(
                "bundle hash {expected} does not match content hash {actual}"
            )));
        }
        Ok(())
    }

    /// Reads a bundle from a JSON file without verifying it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Writes the bundle as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
