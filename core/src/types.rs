//! Schema path index types.
//!
//! A [`SchemaIndex`] maps canonical dotted paths (array levels collapsed to
//! [`WILDCARD`](crate::WILDCARD)) to the type declared at that path. It is
//! built once, is immutable afterwards, and can be shared freely between
//! threads; every cast call only reads it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::coerce::{ARRAY, OBJECT, ScalarType};
use crate::error::SchemaError;
use crate::path::{FieldPath, Segment, WILDCARD, is_positional};

/// Type declared at a schema path.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredType {
    /// An array; its elements are declared under `<path>.$`.
    Array,
    /// A nested object; its fields are declared under `<path>.<field>`.
    Object,
    /// A leaf converted by a coercion rule.
    Scalar(ScalarType),
}

impl DeclaredType {
    /// Type name as written in schema definitions.
    pub fn name(&self) -> &str {
        match self {
            DeclaredType::Array => ARRAY,
            DeclaredType::Object => OBJECT,
            DeclaredType::Scalar(ty) => ty.name(),
        }
    }

    /// Returns `true` for `Array` and `Object`.
    pub fn is_container(&self) -> bool {
        matches!(self, DeclaredType::Array | DeclaredType::Object)
    }
}

impl From<ScalarType> for DeclaredType {
    fn from(ty: ScalarType) -> Self {
        DeclaredType::Scalar(ty)
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One declared schema path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEntry {
    /// Declared type, or `None` for a path that is known but unconstrained.
    pub declared_type: Option<DeclaredType>,
}

/// Result of looking a canonical path up in a [`SchemaIndex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// The path is not in the schema.
    Undeclared,
    /// The path is declared without a type.
    Untyped,
    /// The path is an array container.
    Array,
    /// The path is an object container.
    Object,
    /// The path is a leaf of the given type.
    Scalar(&'a ScalarType),
}

/// Immutable lookup from canonical schema path to [`PathEntry`].
///
/// Cloning is cheap; clones share the same underlying map.
///
/// # Examples
///
/// ```
/// use schema_cast_core::{DeclaredType, Lookup, ScalarType, SchemaIndex};
///
/// let index = SchemaIndex::builder()
///     .declare("names", DeclaredType::Array)
///     .declare("names.$", DeclaredType::Object)
///     .declare("names.$.first", ScalarType::string())
///     .build()
///     .unwrap();
///
/// assert!(matches!(index.lookup("names"), Lookup::Array));
/// assert!(matches!(index.lookup("names.$.first"), Lookup::Scalar(_)));
/// assert!(matches!(index.lookup("names.$.middle"), Lookup::Undeclared));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    paths: Arc<HashMap<String, PathEntry>>,
}

impl SchemaIndex {
    /// Returns a new [`SchemaIndexBuilder`].
    pub fn builder() -> SchemaIndexBuilder {
        SchemaIndexBuilder::new()
    }

    /// Returns the entry for a canonical path.
    pub fn get(&self, path: &str) -> Option<&PathEntry> {
        self.paths.get(path)
    }

    /// Returns `true` if the canonical path is declared (typed or not).
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// Classifies a canonical path.
    pub fn lookup(&self, path: &str) -> Lookup<'_> {
        match self.paths.get(path) {
            None => Lookup::Undeclared,
            Some(PathEntry { declared_type: None }) => Lookup::Untyped,
            Some(PathEntry {
                declared_type: Some(ty),
            }) => match ty {
                DeclaredType::Array => Lookup::Array,
                DeclaredType::Object => Lookup::Object,
                DeclaredType::Scalar(scalar) => Lookup::Scalar(scalar),
            },
        }
    }

    /// Resolves a possibly dotted key below `prefix`.
    ///
    /// Positional segments (`0`, `$`, `$[]`, `$[id]`) become the wildcard. A
    /// named segment that follows an array path descends into the array's
    /// elements implicitly, the way a query on `names.first` reaches every
    /// element of `names`.
    ///
    /// # Examples
    ///
    /// ```
    /// use schema_cast_core::{DeclaredType, FieldPath, ScalarType, SchemaIndex};
    ///
    /// let index = SchemaIndex::builder()
    ///     .declare("names", DeclaredType::Array)
    ///     .declare("names.$", DeclaredType::Object)
    ///     .declare("names.$.first", ScalarType::string())
    ///     .build()
    ///     .unwrap();
    ///
    /// let path = index.resolve(&FieldPath::root(), "names.first");
    /// assert_eq!(path.schema_key(), "names.$.first");
    /// assert_eq!(path.instance_key(), "names.first");
    ///
    /// let path = index.resolve(&FieldPath::root(), "names.2.first");
    /// assert_eq!(path.schema_key(), "names.$.first");
    /// assert_eq!(path.instance_key(), "names.2.first");
    /// ```
    pub fn resolve(&self, prefix: &FieldPath, key: &str) -> FieldPath {
        let mut path = prefix.clone();
        for segment in key.split('.') {
            if is_positional(segment) {
                path = path.push_positional(segment);
                continue;
            }
            while matches!(self.lookup(path.schema_key()), Lookup::Array)
                && self.contains(path.element().schema_key())
            {
                path = path.implicit_element();
            }
            path = path.child(Segment::Key(segment));
        }
        path
    }

    /// Number of declared paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` if no paths are declared.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterates over `(path, entry)` pairs sorted by path.
    pub fn entries(&self) -> Vec<(&str, &PathEntry)> {
        let mut entries: Vec<(&str, &PathEntry)> = self
            .paths
            .iter()
            .map(|(path, entry)| (path.as_str(), entry))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Builder for [`SchemaIndex`].
///
/// [`build`](Self::build) checks that every declared path hangs off a
/// declared container of the right kind.
#[derive(Debug, Default)]
pub struct SchemaIndexBuilder {
    paths: HashMap<String, PathEntry>,
}

impl SchemaIndexBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a typed path, replacing any previous declaration.
    pub fn declare(mut self, path: impl Into<String>, ty: impl Into<DeclaredType>) -> Self {
        self.insert(path, Some(ty.into()));
        self
    }

    /// Declares a path without a type constraint.
    pub fn untyped(mut self, path: impl Into<String>) -> Self {
        self.insert(path, None);
        self
    }

    /// Declares a path in place.
    pub fn insert(&mut self, path: impl Into<String>, declared_type: Option<DeclaredType>) {
        self.paths.insert(path.into(), PathEntry { declared_type });
    }

    /// Returns `true` if the path has been declared.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// Returns the type declared so far at `path`.
    pub fn declared_type(&self, path: &str) -> Option<&DeclaredType> {
        self.paths.get(path).and_then(|entry| entry.declared_type.as_ref())
    }

    /// Validates parent links and freezes the index.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::OrphanPath`] when a path's parent is missing
    /// or is not the container its last segment requires (`Array` for a
    /// wildcard segment, `Object` otherwise).
    pub fn build(self) -> Result<SchemaIndex, SchemaError> {
        for path in self.paths.keys() {
            let Some((parent, last)) = path.rsplit_once('.') else {
                continue;
            };
            let (required, expected) = if last == WILDCARD {
                (DeclaredType::Array, ARRAY)
            } else {
                (DeclaredType::Object, OBJECT)
            };
            let parent_ok = self
                .paths
                .get(parent)
                .and_then(|entry| entry.declared_type.as_ref())
                .is_some_and(|ty| *ty == required);
            if !parent_ok {
                return Err(SchemaError::OrphanPath {
                    path: path.clone(),
                    parent: parent.to_string(),
                    expected,
                });
            }
        }

        Ok(SchemaIndex {
            paths: Arc::new(self.paths),
        })
    }
}
