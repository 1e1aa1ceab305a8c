//! Document casting: prune undeclared fields and coerce every leaf.
//!
//! A document cast walks a stored document (or sub-document) against a
//! [`SchemaIndex`]. Fields the schema never declared are removed, arrays are
//! normalized, and every typed leaf is converted in place. Under the default
//! [`ErrorPolicy::Accumulate`] every independent failure is collected into a
//! [`CastErrors`] aggregate and the walk continues.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::coerce::{OBJECT, ScalarType, coerce_in_place};
use crate::error::{CastError, CastErrors};
use crate::path::{FieldPath, Segment};
use crate::types::{Lookup, SchemaIndex};

/// What a document cast does when a leaf fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Record the failure and keep casting the rest of the document.
    #[default]
    Accumulate,
    /// Stop at the first failure.
    FailFast,
}

/// Options for [`DocumentCaster`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    /// Error propagation policy.
    pub policy: ErrorPolicy,
    /// Convert leaves; when `false` only the structure is normalized.
    pub coerce: bool,
    /// Instance path the document is located at (`""` for a root document).
    pub prefix: String,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            policy: ErrorPolicy::Accumulate,
            coerce: true,
            prefix: String::new(),
        }
    }
}

/// Result of [`DocumentCaster::cast`].
#[derive(Debug, Clone, PartialEq)]
pub struct CastOutcome {
    /// The cast document. Leaves that failed are left as they were.
    pub value: Value,
    /// Failures, or `None` if every leaf was cast.
    pub errors: Option<CastErrors>,
}

impl CastOutcome {
    /// Returns `true` if no failure was recorded.
    pub fn is_ok(&self) -> bool {
        self.errors.is_none()
    }

    /// Converts the outcome into a `Result`, discarding the partially cast
    /// value on failure.
    pub fn into_result(self) -> Result<Value, CastErrors> {
        match self.errors {
            None => Ok(self.value),
            Some(errors) => Err(errors),
        }
    }
}

/// Casts documents against one schema index.
///
/// # Examples
///
/// ```
/// use schema_cast_core::{CoercionRegistry, CompileOptions, DocumentCaster, compile_definition};
/// use serde_json::json;
///
/// let index = compile_definition(
///     &json!({ "name": "String", "born": "Number" }),
///     &CoercionRegistry::default(),
///     &CompileOptions::default(),
/// )
/// .unwrap();
///
/// let outcome = DocumentCaster::new(&index).cast(json!({
///     "name": "Axl Rose",
///     "born": "1962",
///     "role": "singer",
/// }));
///
/// assert!(outcome.is_ok());
/// assert_eq!(outcome.value, json!({ "name": "Axl Rose", "born": 1962 }));
/// ```
#[derive(Debug, Clone)]
pub struct DocumentCaster<'a> {
    index: &'a SchemaIndex,
    options: DocumentOptions,
}

impl<'a> DocumentCaster<'a> {
    /// Creates a caster with default options.
    pub fn new(index: &'a SchemaIndex) -> Self {
        Self::with_options(index, DocumentOptions::default())
    }

    /// Creates a caster with explicit options.
    pub fn with_options(index: &'a SchemaIndex, options: DocumentOptions) -> Self {
        Self { index, options }
    }

    /// Casts an owned document.
    pub fn cast(&self, mut value: Value) -> CastOutcome {
        let errors = self.cast_in_place(&mut value);
        CastOutcome { value, errors }
    }

    /// Casts a document in place and returns the failures, if any.
    pub fn cast_in_place(&self, value: &mut Value) -> Option<CastErrors> {
        let visitor = Visitor::new(self.index, self.options.coerce);
        let prefix = FieldPath::parse(&self.options.prefix);
        let mut errors = CastErrors::new();

        let result = match self.options.policy {
            ErrorPolicy::Accumulate => {
                visitor.visit_object(value, &prefix, &mut Sink::Collect(&mut errors))
            }
            ErrorPolicy::FailFast => visitor.visit_object(value, &prefix, &mut Sink::Halt),
        };
        if let Err(Halt { path, error }) = result {
            errors.mark_error(path, error);
        }

        errors.into_option()
    }
}

/// Casts a root document in place with default options.
///
/// Returns `None` when every leaf was cast.
pub fn cast_document(value: &mut Value, index: &SchemaIndex) -> Option<CastErrors> {
    DocumentCaster::new(index).cast_in_place(value)
}

/// Wraps a non-array value in a one-element array.
pub(crate) fn promote(value: &mut Value) {
    if !value.is_array() {
        let single = value.take();
        *value = Value::Array(vec![single]);
    }
}

/// First failure of a fail-fast walk.
#[derive(Debug)]
pub(crate) struct Halt {
    pub(crate) path: String,
    pub(crate) error: CastError,
}

/// Where a walk sends its failures.
pub(crate) enum Sink<'e> {
    Collect(&'e mut CastErrors),
    Halt,
}

impl Sink<'_> {
    fn report(&mut self, path: &FieldPath, error: CastError) -> Result<(), Halt> {
        match self {
            Sink::Collect(errors) => {
                errors.mark_error(path.instance_key(), error);
                Ok(())
            }
            Sink::Halt => Err(Halt {
                path: path.instance_key().to_string(),
                error,
            }),
        }
    }
}

/// Schema-directed walk over a concrete value.
pub(crate) struct Visitor<'a> {
    index: &'a SchemaIndex,
    coerce: bool,
}

impl<'a> Visitor<'a> {
    pub(crate) fn new(index: &'a SchemaIndex, coerce: bool) -> Self {
        Self { index, coerce }
    }

    pub(crate) fn visit_object(
        &self,
        value: &mut Value,
        path: &FieldPath,
        sink: &mut Sink<'_>,
    ) -> Result<(), Halt> {
        let map = match value {
            Value::Object(map) => map,
            other => return sink.report(path, CastError::shape_mismatch(other, OBJECT)),
        };

        self.prune(map, path);
        for (key, child) in map.iter_mut() {
            self.visit_field(child, &path.child(Segment::Key(key)), sink)?;
        }
        Ok(())
    }

    /// Casts one value already known to live at `path`.
    pub(crate) fn visit_field(
        &self,
        value: &mut Value,
        path: &FieldPath,
        sink: &mut Sink<'_>,
    ) -> Result<(), Halt> {
        match self.index.lookup(path.schema_key()) {
            Lookup::Undeclared | Lookup::Untyped => Ok(()),
            Lookup::Array => self.visit_array(value, path, sink),
            Lookup::Object if value.is_null() => Ok(()),
            Lookup::Object => self.visit_object(value, path, sink),
            Lookup::Scalar(ty) => self.visit_leaf(value, ty, path, sink),
        }
    }

    pub(crate) fn visit_array(
        &self,
        value: &mut Value,
        path: &FieldPath,
        sink: &mut Sink<'_>,
    ) -> Result<(), Halt> {
        let element = path.element();
        let element_type = self.index.lookup(element.schema_key());
        if matches!(element_type, Lookup::Undeclared | Lookup::Untyped) {
            debug!(path = path.instance_key(), "array elements untyped, passing through");
            return Ok(());
        }
        if value.is_null() {
            return Ok(());
        }

        promote(value);
        let Value::Array(items) = value else {
            return Ok(());
        };
        for (i, item) in items.iter_mut().enumerate() {
            let item_path = path.child(Segment::Index(i));
            match element_type {
                Lookup::Array => self.visit_array(item, &item_path, sink)?,
                Lookup::Object if item.is_null() => {}
                Lookup::Object => self.visit_object(item, &item_path, sink)?,
                Lookup::Scalar(ty) => self.visit_leaf(item, ty, &item_path, sink)?,
                Lookup::Undeclared | Lookup::Untyped => {}
            }
        }
        Ok(())
    }

    fn visit_leaf(
        &self,
        value: &mut Value,
        ty: &ScalarType,
        path: &FieldPath,
        sink: &mut Sink<'_>,
    ) -> Result<(), Halt> {
        if !self.coerce {
            return Ok(());
        }
        match coerce_in_place(value, ty) {
            Ok(()) => Ok(()),
            Err(error) => sink.report(path, error),
        }
    }

    /// Removes undeclared fields and null `Object` fields.
    fn prune(&self, map: &mut Map<String, Value>, path: &FieldPath) {
        map.retain(|key, child| {
            let child_path = path.child(Segment::Key(key));
            match self.index.lookup(child_path.schema_key()) {
                Lookup::Undeclared => {
                    debug!(
                        path = child_path.instance_key(),
                        schema_path = child_path.schema_key(),
                        "pruned undeclared path"
                    );
                    false
                }
                Lookup::Object if child.is_null() => {
                    debug!(path = child_path.instance_key(), "removed null object");
                    false
                }
                _ => true,
            }
        });
    }
}
