//! Schema catalog loading with builder pattern and fallback chains.
//!
//! Provides [`SchemaCatalog`] for looking up compiled schema indexes by
//! collection name and [`CatalogBuilder`] for loading from several sources
//! with automatic fallback.
//!
//! # Loading patterns
//!
//! ```no_run
//! use schema_cast_catalog::SchemaCatalog;
//!
//! // One definition file per collection (`bands.json`, `people.yaml`, ...)
//! let catalog = SchemaCatalog::from_dir("schemas/").unwrap();
//! assert!(catalog.get("bands").is_some());
//!
//! // A single bundle holding every collection
//! let catalog = SchemaCatalog::from_bundle("schemas.json").unwrap();
//!
//! // A fallback chain
//! let catalog = SchemaCatalog::builder()
//!     .from_dir("schemas/")
//!     .from_bundle("schemas.json")
//!     .build()
//!     .unwrap();
//! ```

use std::collections::HashMap;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use schema_cast_core::{CoercionRegistry, CompileOptions, SchemaIndex, compile_definition};
use serde_json::Value;
use tracing::{debug, info};

use crate::bundle::SchemaBundle;
use crate::error::{CatalogError, Result};

/// File extensions recognized as schema definitions.
const DEFINITION_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Describes where a [`SchemaCatalog`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    /// A directory with one definition file per collection.
    Directory(PathBuf),
    /// A [`SchemaBundle`] JSON file.
    Bundle(PathBuf),
    /// A single definition file.
    File(PathBuf),
    /// Built in memory with [`SchemaCatalog::insert`].
    Memory,
    /// A fallback chain of multiple sources.
    Multiple(Vec<CatalogSource>),
}

/// Compiled schema indexes keyed by collection name.
///
/// # Examples
///
/// ```
/// use schema_cast_catalog::SchemaCatalog;
/// use schema_cast_core::{CoercionRegistry, CompileOptions, compile_definition};
/// use serde_json::json;
///
/// let index = compile_definition(
///     &json!({ "name": "String" }),
///     &CoercionRegistry::default(),
///     &CompileOptions::default(),
/// )
/// .unwrap();
///
/// let mut catalog = SchemaCatalog::new();
/// catalog.insert("bands", index);
/// assert!(catalog.contains("bands"));
/// assert!(catalog.index("venues").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    indexes: HashMap<String, SchemaIndex>,
    source: CatalogSource,
}

impl SchemaCatalog {
    /// Creates an empty in-memory catalog.
    pub fn new() -> Self {
        Self {
            indexes: HashMap::new(),
            source: CatalogSource::Memory,
        }
    }

    /// Returns a new [`CatalogBuilder`] for configuring a fallback chain.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Loads every `*.json`, `*.yaml` and `*.yml` file in a directory with
    /// the built-in types. The file stem names the collection.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the directory cannot be read, a parse
    /// error for malformed files, or [`CatalogError::Schema`] for a
    /// definition that does not compile.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_dir_with(path, &CoercionRegistry::default(), &CompileOptions::default())
    }

    /// Like [`from_dir`](Self::from_dir) with an explicit registry and
    /// compile options.
    pub fn from_dir_with(
        path: impl AsRef<Path>,
        registry: &CoercionRegistry,
        options: &CompileOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut indexes = HashMap::new();

        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            let Some(collection) = definition_name(&file_path) else {
                continue;
            };
            let definition = read_definition(&file_path)?;
            let index = compile(&collection, &definition, registry, options)?;
            debug!(collection = %collection, paths = index.len(), "compiled definition");
            indexes.insert(collection, index);
        }

        info!(path = %path.display(), collections = indexes.len(), "loaded schema directory");
        Ok(Self {
            indexes,
            source: CatalogSource::Directory(path.to_path_buf()),
        })
    }

    /// Loads a verified [`SchemaBundle`] with the built-in types.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidChecksum`] if the bundle hash does not
    /// match, plus the errors of [`from_dir`](Self::from_dir).
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bundle_with(path, &CoercionRegistry::default(), &CompileOptions::default())
    }

    /// Like [`from_bundle`](Self::from_bundle) with an explicit registry and
    /// compile options.
    pub fn from_bundle_with(
        path: impl AsRef<Path>,
        registry: &CoercionRegistry,
        options: &CompileOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bundle = SchemaBundle::load(path)?;
        bundle.verify()?;

        let mut indexes = HashMap::new();
        for (collection, definition) in &bundle.collections {
            let index = compile(collection, definition, registry, options)?;
            indexes.insert(collection.clone(), index);
        }

        info!(
            path = %path.display(),
            version = %bundle.version,
            collections = indexes.len(),
            "loaded schema bundle"
        );
        Ok(Self {
            indexes,
            source: CatalogSource::Bundle(path.to_path_buf()),
        })
    }

    /// Loads a single definition file; the file stem names the collection.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with(path, &CoercionRegistry::default(), &CompileOptions::default())
    }

    /// Like [`from_file`](Self::from_file) with an explicit registry and
    /// compile options.
    pub fn from_file_with(
        path: impl AsRef<Path>,
        registry: &CoercionRegistry,
        options: &CompileOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let collection = collection_name(path);
        let definition = read_definition(path)?;
        let index = compile(&collection, &definition, registry, options)?;

        let mut indexes = HashMap::new();
        indexes.insert(collection, index);
        Ok(Self {
            indexes,
            source: CatalogSource::File(path.to_path_buf()),
        })
    }

    /// Looks up the index for a collection.
    pub fn get(&self, collection: &str) -> Option<&SchemaIndex> {
        self.indexes.get(collection)
    }

    /// Looks up the index for a collection, failing if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownCollection`].
    pub fn index(&self, collection: &str) -> Result<&SchemaIndex> {
        self.get(collection)
            .ok_or_else(|| CatalogError::UnknownCollection(collection.to_string()))
    }

    /// Adds or replaces a collection.
    pub fn insert(&mut self, collection: impl Into<String>, index: SchemaIndex) {
        self.indexes.insert(collection.into(), index);
    }

    /// Returns `true` if the catalog has an index for `collection`.
    pub fn contains(&self, collection: &str) -> bool {
        self.indexes.contains_key(collection)
    }

    /// Number of collections.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Returns `true` if the catalog holds no collections.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Collection names, sorted.
    pub fn collections(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.indexes.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Where this catalog was loaded from.
    pub fn source(&self) -> &CatalogSource {
        &self.source
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing a [`SchemaCatalog`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first successful load
/// wins; if all fail, [`CatalogError::NoSourcesAvailable`] is returned.
///
/// # Example
///
/// ```no_run
/// use schema_cast_catalog::SchemaCatalog;
/// use schema_cast_core::CompileOptions;
///
/// let catalog = SchemaCatalog::builder()
///     .compile_options(CompileOptions { implicit_id: false })
///     .from_dir("/opt/schemas/")
///     .from_bundle("/opt/schemas.json")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct CatalogBuilder {
    sources: Vec<CatalogSource>,
    registry: CoercionRegistry,
    options: CompileOptions,
}

impl CatalogBuilder {
    /// Creates a builder with no sources and the built-in types.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            registry: CoercionRegistry::default(),
            options: CompileOptions::default(),
        }
    }

    /// Adds a directory of definition files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(CatalogSource::Directory(path.into()));
        self
    }

    /// Adds a [`SchemaBundle`] file as a source.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(CatalogSource::Bundle(path.into()));
        self
    }

    /// Adds a single definition file as a source.
    pub fn from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(CatalogSource::File(path.into()));
        self
    }

    /// Adds an already-described source.
    pub fn source(mut self, source: CatalogSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Uses `registry` to resolve type names.
    pub fn registry(mut self, registry: CoercionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Uses `options` when compiling definitions.
    pub fn compile_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Attempts to load from the configured sources in order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NoSourcesAvailable`] if every source fails.
    pub fn build(self) -> Result<SchemaCatalog> {
        if self.sources.is_empty() {
            return Err(CatalogError::NoSourcesAvailable);
        }

        for source in &self.sources {
            let result = match source {
                CatalogSource::Directory(path) => {
                    SchemaCatalog::from_dir_with(path, &self.registry, &self.options)
                }
                CatalogSource::Bundle(path) => {
                    SchemaCatalog::from_bundle_with(path, &self.registry, &self.options)
                }
                CatalogSource::File(path) => {
                    SchemaCatalog::from_file_with(path, &self.registry, &self.options)
                }
                CatalogSource::Memory | CatalogSource::Multiple(_) => continue,
            };

            match result {
                Ok(mut catalog) => {
                    catalog.source = CatalogSource::Multiple(self.sources.clone());
                    return Ok(catalog);
                }
                Err(err) => debug!(source = ?source, error = %err, "schema source failed"),
            }
        }

        Err(CatalogError::NoSourcesAvailable)
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a JSON or YAML definition, choosing the parser by extension.
pub fn read_definition(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let definition: Value = match extension(path) {
        Some("yaml" | "yml") => serde_yaml::from_reader(reader)?,
        _ => serde_json::from_reader(reader)?,
    };
    Ok(definition)
}

fn compile(
    collection: &str,
    definition: &Value,
    registry: &CoercionRegistry,
    options: &CompileOptions,
) -> Result<SchemaIndex> {
    compile_definition(definition, registry, options).map_err(|source| CatalogError::Schema {
        collection: collection.to_string(),
        source,
    })
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn collection_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Collection name for a definition file, or `None` for other files.
fn definition_name(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    let ext = extension(path)?;
    DEFINITION_EXTENSIONS
        .contains(&ext)
        .then(|| collection_name(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_cast_core::Lookup;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        path
    }

    #[test]
    fn test_from_dir_mixed_formats() {
        let dir = std::env::temp_dir().join("sc_catalog_test_from_dir");
        std::fs::create_dir_all(&dir).unwrap();

        write_file(&dir, "bands.json", r#"{ "name": "String", "members": ["ObjectId"] }"#);
        write_file(&dir, "people.yaml", "name:\n  first: String\n  last: String\nborn:\n  $type: Number\n");
        write_file(&dir, "venues.yml", "city: String\n");
        write_file(&dir, "notes.txt", "not a schema");

        let catalog = SchemaCatalog::from_dir(&dir).unwrap();
        assert_eq!(catalog.collections(), vec!["bands", "people", "venues"]);
        assert_eq!(catalog.index("people").unwrap().lookup("name"), Lookup::Object);
        assert!(matches!(
            catalog.index("people").unwrap().lookup("born"),
            Lookup::Scalar(_)
        ));
        assert_eq!(catalog.source(), &CatalogSource::Directory(dir.clone()));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_from_dir_reports_bad_definition() {
        let dir = std::env::temp_dir().join("sc_catalog_test_bad_def");
        std::fs::create_dir_all(&dir).unwrap();
        write_file(&dir, "bands.json", r#"{ "price": "Decimal128" }"#);

        let err = SchemaCatalog::from_dir(&dir).unwrap_err();
        assert!(matches!(err, CatalogError::Schema { ref collection, .. } if collection == "bands"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join("sc_catalog_test_from_file");
        std::fs::create_dir_all(&dir).unwrap();
        let path = write_file(&dir, "people.json", r#"{ "born": "Number" }"#);

        let catalog = SchemaCatalog::from_file(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains("people"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_builder_fallback() {
        let dir = std::env::temp_dir().join("sc_catalog_test_builder");
        std::fs::create_dir_all(&dir).unwrap();
        let path = write_file(&dir, "people.json", r#"{ "born": "Number" }"#);

        let catalog = SchemaCatalog::builder()
            .from_dir("/nonexistent/sc_catalog_dir/")
            .from_file(&path)
            .build()
            .unwrap();
        assert!(catalog.contains("people"));
        assert!(matches!(catalog.source(), CatalogSource::Multiple(sources) if sources.len() == 2));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_builder_all_fail() {
        let result = SchemaCatalog::builder()
            .from_dir("/nonexistent/sc_dir1/")
            .from_bundle("/nonexistent/sc_bundle1.json")
            .build();
        assert!(matches!(result, Err(CatalogError::NoSourcesAvailable)));
        assert!(matches!(
            CatalogBuilder::new().build(),
            Err(CatalogError::NoSourcesAvailable)
        ));
    }

    #[test]
    fn test_builder_compile_options() {
        let dir = std::env::temp_dir().join("sc_catalog_test_builder_options");
        std::fs::create_dir_all(&dir).unwrap();
        write_file(&dir, "people.json", r#"{ "born": "Number" }"#);

        let catalog = SchemaCatalog::builder()
            .compile_options(CompileOptions { implicit_id: false })
            .from_dir(&dir)
            .build()
            .unwrap();
        assert_eq!(catalog.index("people").unwrap().lookup("_id"), Lookup::Undeclared);

        std::fs::remove_dir_all(&dir).ok();
    }
}
