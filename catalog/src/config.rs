//! Casting configuration.
//!
//! Defines the YAML-serializable configuration that says where schema
//! definitions come from and how documents and updates are cast.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! sources:
//!   - dir: schemas/
//!   - bundle: schemas.json
//! document:
//!   policy: accumulate
//!   coerce: true
//! update:
//!   overwrite: false
//! definition:
//!   implicit_id: true
//! ```
//!
//! Relative source paths are resolved against the directory of the config
//! file when it is loaded with [`CastingConfig::load`].

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use schema_cast_core::{CompileOptions, DocumentOptions, ErrorPolicy, UpdateOptions};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::loader::{CatalogSource, SchemaCatalog};

/// One entry of the source fallback chain. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory with one definition file per collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Bundle JSON file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<PathBuf>,
    /// Single definition file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl SourceConfig {
    /// Converts the entry into a [`CatalogSource`], resolving relative paths
    /// against `base`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidConfig`] unless exactly one of `dir`,
    /// `bundle` and `file` is set.
    pub fn to_source(&self, base: Option<&Path>) -> Result<CatalogSource> {
        let resolve = |path: &PathBuf| match base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.clone(),
        };

        match (&self.dir, &self.bundle, &self.file) {
            (Some(dir), None, None) => Ok(CatalogSource::Directory(resolve(dir))),
            (None, Some(bundle), None) => Ok(CatalogSource::Bundle(resolve(bundle))),
            (None, None, Some(file)) => Ok(CatalogSource::File(resolve(file))),
            _ => Err(CatalogError::InvalidConfig(
                "each source needs exactly one of `dir`, `bundle` or `file`".into(),
            )),
        }
    }
}

/// Document casting settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Error propagation policy.
    pub policy: ErrorPolicy,
    /// Convert leaves, not only normalize structure.
    pub coerce: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        let options = DocumentOptions::default();
        Self {
            policy: options.policy,
            coerce: options.coerce,
        }
    }
}

/// Top-level casting configuration.
///
/// # Examples
///
/// ```
/// use schema_cast_catalog::CastingConfig;
/// use schema_cast_core::ErrorPolicy;
///
/// let config: CastingConfig = serde_yaml::from_str(r#"
/// version: "1.0"
/// document:
///   policy: fail_fast
/// "#).unwrap();
///
/// assert_eq!(config.document_options().policy, ErrorPolicy::FailFast);
/// assert!(config.document_options().coerce);
/// assert!(!config.update_options().overwrite);
/// assert!(config.definition.implicit_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastingConfig {
    /// Configuration format version (e.g. `"1.0"`).
    pub version: String,
    /// Schema sources, tried in order.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Document casting settings.
    #[serde(default)]
    pub document: DocumentConfig,
    /// Update casting settings.
    #[serde(default)]
    pub update: UpdateOptions,
    /// Definition compile settings.
    #[serde(default)]
    pub definition: CompileOptions,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl CastingConfig {
    /// Creates a configuration with no sources and default settings.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            sources: Vec::new(),
            document: DocumentConfig::default(),
            update: UpdateOptions::default(),
            definition: CompileOptions::default(),
            base_dir: None,
        }
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::CatalogError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::CatalogError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut config: Self = serde_yaml::from_reader(reader)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::CatalogError::Io) if the file cannot be
    /// written, or [`Yaml`](crate::CatalogError::Yaml) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Loads the catalog from the configured sources.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`](crate::CatalogError::InvalidConfig) for a
    /// malformed source entry and
    /// [`NoSourcesAvailable`](crate::CatalogError::NoSourcesAvailable) when
    /// nothing loads.
    pub fn catalog(&self) -> Result<SchemaCatalog> {
        let mut builder = SchemaCatalog::builder().compile_options(self.definition.clone());
        for source in &self.sources {
            builder = builder.source(source.to_source(self.base_dir.as_deref())?);
        }
        builder.build()
    }

    /// Document caster options for a root document.
    pub fn document_options(&self) -> DocumentOptions {
        DocumentOptions {
            policy: self.document.policy,
            coerce: self.document.coerce,
            ..DocumentOptions::default()
        }
    }

    /// Update caster options.
    pub fn update_options(&self) -> UpdateOptions {
        self.update.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
sources:
  - dir: schemas/
  - bundle: /opt/schemas.json
document:
  policy: fail_fast
  coerce: false
update:
  overwrite: true
definition:
  implicit_id: false
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: CastingConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].dir.as_deref(), Some(Path::new("schemas/")));
        assert_eq!(config.document.policy, ErrorPolicy::FailFast);
        assert!(!config.document.coerce);
        assert!(config.update.overwrite);
        assert!(!config.definition.implicit_id);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: CastingConfig = serde_yaml::from_str("version: \"1.0\"\n").unwrap();
        assert!(config.sources.is_empty());
        assert_eq!(config.document_options(), DocumentOptions::default());
        assert_eq!(config.update_options(), UpdateOptions::default());
        assert_eq!(config.definition, CompileOptions::default());
    }

    #[test]
    fn test_source_resolution() {
        let base = Path::new("/etc/schema-cast");
        let relative = SourceConfig {
            dir: Some("schemas".into()),
            ..SourceConfig::default()
        };
        assert_eq!(
            relative.to_source(Some(base)).unwrap(),
            CatalogSource::Directory(base.join("schemas"))
        );

        let absolute = SourceConfig {
            bundle: Some("/opt/schemas.json".into()),
            ..SourceConfig::default()
        };
        assert_eq!(
            absolute.to_source(Some(base)).unwrap(),
            CatalogSource::Bundle("/opt/schemas.json".into())
        );

        assert!(matches!(
            SourceConfig::default().to_source(None),
            Err(CatalogError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_roundtrip() {
        let dir = std::env::temp_dir().join("sc_catalog_test_config_roundtrip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yml");

        let config: CastingConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        config.save(&path).unwrap();
        let loaded = CastingConfig::load(&path).unwrap();
        assert_eq!(loaded.sources, config.sources);
        assert_eq!(loaded.document, config.document);
        assert_eq!(loaded.update, config.update);

        std::fs::remove_dir_all(&dir).ok();
    }
}
