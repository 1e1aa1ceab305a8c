//! Cast failures and the accumulating error aggregate.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::inspect::inspect;

/// A single casting failure.
///
/// The `Display` output of the mismatch variants is the message callers see
/// when a filter or update is rejected, e.g.
/// `Could not cast 'not a number' to Number`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CastError {
    /// A leaf value could not be converted to its declared type.
    #[error("Could not cast {value} to {target}")]
    TypeMismatch {
        /// The offending literal, rendered with [`inspect`](crate::inspect).
        value: String,
        /// Name of the declared type.
        target: String,
    },
    /// A container was expected but a scalar (or the wrong container) was given.
    #[error("Could not cast {value} to {expected}")]
    ShapeMismatch {
        /// The offending literal, rendered with [`inspect`](crate::inspect).
        value: String,
        /// Name of the expected shape (`Object`).
        expected: String,
    },
    /// An update expression mixes `$`-operators with plain field names.
    #[error("update cannot mix operators and field names (operator `{operator}`, field `{field}`)")]
    InvalidUpdateShape {
        /// First operator key encountered.
        operator: String,
        /// First plain field key encountered.
        field: String,
    },
}

impl CastError {
    /// Builds a [`CastError::TypeMismatch`] for `value` against `target`.
    pub fn type_mismatch(value: &Value, target: impl Into<String>) -> Self {
        Self::TypeMismatch {
            value: inspect(value),
            target: target.into(),
        }
    }

    /// Builds a [`CastError::ShapeMismatch`] for `value` against `expected`.
    pub fn shape_mismatch(value: &Value, expected: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            value: inspect(value),
            expected: expected.into(),
        }
    }
}

/// Accumulated cast failures keyed by instance path.
///
/// A document cast records one entry per failing leaf (or per mis-shaped
/// subtree) and keeps going, so a single pass reports every independent
/// problem. Later entries replace earlier ones on the same path.
///
/// # Examples
///
/// ```
/// use schema_cast_core::{CastError, CastErrors};
/// use serde_json::json;
///
/// let mut errors = CastErrors::new();
/// assert!(!errors.has_error());
///
/// errors.mark_error("born", CastError::type_mismatch(&json!("soon"), "Number"));
/// assert!(errors.has_error());
/// assert_eq!(errors.to_string(), "born: Could not cast 'soon' to Number");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CastErrors {
    errors: BTreeMap<String, CastError>,
}

impl CastErrors {
    /// Creates an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error` at `path`, replacing any previous entry for it.
    pub fn mark_error(&mut self, path: impl Into<String>, error: CastError) -> &mut Self {
        self.errors.insert(path.into(), error);
        self
    }

    /// Unions `other` into `self`; entries from `other` win on collision.
    pub fn merge(&mut self, other: CastErrors) -> &mut Self {
        self.errors.extend(other.errors);
        self
    }

    /// Returns `true` if at least one error was recorded.
    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the error recorded at `path`.
    pub fn get(&self, path: &str) -> Option<&CastError> {
        self.errors.get(path)
    }

    /// Returns the failing instance paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Iterates over `(path, error)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CastError)> {
        self.errors.iter().map(|(path, error)| (path.as_str(), error))
    }

    /// Number of failing paths.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts an empty aggregate into `None`.
    pub fn into_option(self) -> Option<Self> {
        self.has_error().then_some(self)
    }
}

impl fmt::Display for CastErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (path, error)) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{path}: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CastErrors {}

impl IntoIterator for CastErrors {
    type Item = (String, CastError);
    type IntoIter = std::collections::btree_map::IntoIter<String, CastError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Serializes as a `{ path: message }` map.
impl Serialize for CastErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.errors.len()))?;
        for (path, error) in &self.errors {
            map.serialize_entry(path, &error.to_string())?;
        }
        map.end()
    }
}

/// Errors raised while building a [`SchemaIndex`](crate::SchemaIndex).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A definition names a type that is not in the coercion registry.
    #[error("unknown type `{type_name}` declared at `{path}`")]
    UnknownType { path: String, type_name: String },
    /// A definition node has a shape the compiler does not understand.
    #[error("invalid definition at `{path}`: {reason}")]
    InvalidDefinition { path: String, reason: String },
    /// A path is declared under a parent that is missing or not a container.
    #[error("path `{path}` requires `{parent}` to be declared as {expected}")]
    OrphanPath {
        path: String,
        parent: String,
        expected: &'static str,
    },
}
