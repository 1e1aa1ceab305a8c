//! Update expression casting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::coerce::{OBJECT, ScalarType, coerce_in_place};
use crate::document::{Halt, Sink, Visitor, promote};
use crate::error::CastError;
use crate::filter::FilterCaster;
use crate::operator::{UpdateOperator, is_operator, update_operator};
use crate::path::FieldPath;
use crate::types::{Lookup, SchemaIndex};

/// Modifier key whose array items are appended one by one.
const EACH: &str = "$each";

/// Options for [`UpdateCaster`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOptions {
    /// Treat a field-form update as a whole-document replacement instead of
    /// wrapping it in `$set`.
    pub overwrite: bool,
}

/// Casts update expressions against one schema index.
///
/// # Examples
///
/// ```
/// use schema_cast_core::{CoercionRegistry, CompileOptions, UpdateCaster, compile_definition};
/// use serde_json::json;
///
/// let index = compile_definition(
///     &json!({ "test": "Number", "tags": "String" }),
///     &CoercionRegistry::default(),
///     &CompileOptions::default(),
/// )
/// .unwrap();
/// let caster = UpdateCaster::new(&index);
///
/// let update = caster.cast(json!({ "$set": { "tags": 123 }, "$inc": { "test": "1" } })).unwrap();
/// assert_eq!(update, json!({ "$set": { "tags": "123" }, "$inc": { "test": 1 } }));
///
/// let update = caster.cast(json!({ "test": "1" })).unwrap();
/// assert_eq!(update, json!({ "$set": { "test": 1 } }));
/// ```
#[derive(Debug, Clone)]
pub struct UpdateCaster<'a> {
    index: &'a SchemaIndex,
    options: UpdateOptions,
}

impl<'a> UpdateCaster<'a> {
    /// Creates a caster with default options.
    pub fn new(index: &'a SchemaIndex) -> Self {
        Self::with_options(index, UpdateOptions::default())
    }

    /// Creates a caster with explicit options.
    pub fn with_options(index: &'a SchemaIndex, options: UpdateOptions) -> Self {
        Self { index, options }
    }

    /// Casts an update expression.
    ///
    /// Operator-form updates keep their shape. Field-form updates are cast
    /// as a document and wrapped in `$set` unless `overwrite` is set.
    /// Pipeline (array) updates are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CastError::InvalidUpdateShape`] when operator and field keys
    /// are mixed, [`CastError::ShapeMismatch`] for a scalar update or a
    /// non-object operand, and the first leaf failure otherwise.
    pub fn cast(&self, update: Value) -> Result<Value, CastError> {
        let mut map = match update {
            Value::Object(map) => map,
            pipeline @ Value::Array(_) => {
                debug!("pipeline update passed through");
                return Ok(pipeline);
            }
            other => return Err(CastError::shape_mismatch(&other, OBJECT)),
        };

        let first_operator = map.keys().find(|key| is_operator(key)).cloned();
        let first_field = map.keys().find(|key| !is_operator(key)).cloned();

        match (first_operator, first_field) {
            (Some(operator), Some(field)) => Err(CastError::InvalidUpdateShape { operator, field }),
            (Some(_), None) => {
                for (name, operand) in map.iter_mut() {
                    self.cast_operator(name, operand)?;
                }
                Ok(Value::Object(map))
            }
            (None, Some(_)) => {
                self.cast_fields(&mut map)?;
                if self.options.overwrite {
                    Ok(Value::Object(map))
                } else {
                    Ok(json!({ "$set": map }))
                }
            }
            (None, None) => Ok(Value::Object(map)),
        }
    }

    fn cast_operator(&self, name: &str, operand: &mut Value) -> Result<(), CastError> {
        let category = update_operator(name);
        if category == UpdateOperator::Unknown {
            warn!(operator = name, "unknown update operator passed through");
            return Ok(());
        }

        let fields = match operand {
            Value::Object(fields) => fields,
            other => return Err(CastError::shape_mismatch(other, OBJECT)),
        };

        match category {
            UpdateOperator::Fields | UpdateOperator::PullAll => self.cast_fields(fields),
            UpdateOperator::Append => self.cast_append(fields),
            UpdateOperator::Pull => self.cast_pull(fields),
            UpdateOperator::Pop => self.cast_pop(fields),
            UpdateOperator::PathsOnly => {
                self.prune(fields, false);
                Ok(())
            }
            UpdateOperator::Unknown => Ok(()),
        }
    }

    /// Casts `{path: value}` pairs the way a document cast would, stopping
    /// at the first failure.
    fn cast_fields(&self, fields: &mut Map<String, Value>) -> Result<(), CastError> {
        self.prune(fields, true);
        let visitor = Visitor::new(self.index, true);
        for (key, value) in fields.iter_mut() {
            let path = self.resolve(key);
            visitor
                .visit_field(value, &path, &mut Sink::Halt)
                .map_err(|Halt { error, .. }| error)?;
        }
        Ok(())
    }

    fn cast_append(&self, fields: &mut Map<String, Value>) -> Result<(), CastError> {
        self.prune(fields, false);
        let visitor = Visitor::new(self.index, true);
        for (key, value) in fields.iter_mut() {
            let path = self.resolve(key);
            if !matches!(self.index.lookup(path.schema_key()), Lookup::Array) {
                continue;
            }
            let element = path.element();

            match value {
                Value::Object(modifiers) if modifiers.contains_key(EACH) => {
                    if let Some(items) = modifiers.get_mut(EACH) {
                        promote(items);
                        if let Value::Array(items) = items {
                            for item in items {
                                visitor
                                    .visit_field(item, &element, &mut Sink::Halt)
                                    .map_err(|Halt { error, .. }| error)?;
                            }
                        }
                    }
                }
                item => visitor
                    .visit_field(item, &element, &mut Sink::Halt)
                    .map_err(|Halt { error, .. }| error)?,
            }
        }
        Ok(())
    }

    fn cast_pull(&self, fields: &mut Map<String, Value>) -> Result<(), CastError> {
        self.prune(fields, false);
        let filter = FilterCaster::new(self.index);
        for (key, condition) in fields.iter_mut() {
            let path = self.resolve(key);
            filter.cast_comparand(condition, &path)?;
        }
        Ok(())
    }

    fn cast_pop(&self, fields: &mut Map<String, Value>) -> Result<(), CastError> {
        self.prune(fields, false);
        let number = ScalarType::number();
        for value in fields.values_mut() {
            coerce_in_place(value, &number)?;
        }
        Ok(())
    }

    fn resolve(&self, key: &str) -> FieldPath {
        self.index.resolve(&FieldPath::root(), key)
    }

    /// Drops operand keys the schema does not declare, and null `Object`
    /// fields when `null_objects` is set.
    fn prune(&self, fields: &mut Map<String, Value>, null_objects: bool) {
        fields.retain(|key, value| {
            let path = self.resolve(key);
            match self.index.lookup(path.schema_key()) {
                Lookup::Undeclared => {
                    debug!(path = key.as_str(), schema_path = path.schema_key(), "pruned undeclared path");
                    false
                }
                Lookup::Object if null_objects && value.is_null() => {
                    debug!(path = key.as_str(), "removed null object");
                    false
                }
                _ => true,
            }
        });
    }
}

/// Casts an update expression.
///
/// # Errors
///
/// See [`UpdateCaster::cast`].
pub fn cast_update(
    update: Value,
    index: &SchemaIndex,
    options: &UpdateOptions,
) -> Result<Value, CastError> {
    UpdateCaster::with_options(index, options.clone()).cast(update)
}
