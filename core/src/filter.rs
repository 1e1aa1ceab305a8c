//! Query filter casting.
//!
//! Every literal a filter compares against a declared path is converted to
//! that path's type before the filter is sent anywhere. Unlike document
//! casting, unknown fields are kept, and the first failure aborts the whole
//! cast so a half-cast predicate never runs.

use serde_json::{Map, Value};
use tracing::debug;

use crate::coerce::{OBJECT, ScalarType, coerce_in_place};
use crate::document::promote;
use crate::error::CastError;
use crate::operator::{ElementSelector, FilterOperator, filter_operator, is_operator};
use crate::path::{FieldPath, Segment};
use crate::types::{Lookup, SchemaIndex};

/// Casts query filters against one schema index.
///
/// # Examples
///
/// ```
/// use schema_cast_core::{CoercionRegistry, CompileOptions, FilterCaster, compile_definition};
/// use serde_json::json;
///
/// let index = compile_definition(
///     &json!({ "test": "Number", "tags": "String" }),
///     &CoercionRegistry::default(),
///     &CompileOptions::default(),
/// )
/// .unwrap();
///
/// let mut filter = json!({
///     "_id": "000000000000000000000001",
///     "test": { "$not": { "$eq": "123" } },
///     "tags": { "$in": [123] },
/// });
/// FilterCaster::new(&index).cast(&mut filter).unwrap();
///
/// assert_eq!(filter, json!({
///     "_id": { "$oid": "000000000000000000000001" },
///     "test": { "$not": { "$eq": 123 } },
///     "tags": { "$in": ["123"] },
/// }));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FilterCaster<'a> {
    index: &'a SchemaIndex,
}

impl<'a> FilterCaster<'a> {
    /// Creates a caster for `index`.
    pub fn new(index: &'a SchemaIndex) -> Self {
        Self { index }
    }

    /// Casts a root filter in place.
    ///
    /// # Errors
    ///
    /// Returns the first [`CastError`] encountered. The filter may be
    /// partially cast when this happens and must not be used.
    pub fn cast(&self, filter: &mut Value) -> Result<(), CastError> {
        match filter {
            Value::Object(map) => self.visit_filter(map, &FieldPath::root()),
            other => Err(CastError::shape_mismatch(other, OBJECT)),
        }
    }

    /// Casts a filter whose keys are relative to `path`.
    pub(crate) fn visit_filter(
        &self,
        map: &mut Map<String, Value>,
        path: &FieldPath,
    ) -> Result<(), CastError> {
        for (key, value) in map.iter_mut() {
            if is_operator(key) {
                self.cast_operator(key, value, path)?;
            } else {
                let field = self.index.resolve(path, key);
                self.cast_at(value, &field)?;
            }
        }
        Ok(())
    }

    fn cast_operator(
        &self,
        name: &str,
        operand: &mut Value,
        path: &FieldPath,
    ) -> Result<(), CastError> {
        match filter_operator(name) {
            FilterOperator::Logical => self.cast_logical(operand, path),
            FilterOperator::Comparison => self.cast_comparand(operand, path),
            FilterOperator::Array => {
                if operand.is_null() {
                    return Ok(());
                }
                promote(operand);
                if let Value::Array(items) = operand {
                    for item in items {
                        self.cast_comparand(item, path)?;
                    }
                }
                Ok(())
            }
            FilterOperator::Element(selector) => cast_element(operand, selector),
            FilterOperator::Container => self.cast_elem_match(operand, path),
            FilterOperator::Ignored => Ok(()),
            FilterOperator::Unknown => {
                debug!(operator = name, path = path.instance_key(), "unknown filter operator left as is");
                Ok(())
            }
        }
    }

    /// Casts a value compared against the field at `path`.
    fn cast_at(&self, value: &mut Value, path: &FieldPath) -> Result<(), CastError> {
        if value.is_null() {
            return Ok(());
        }
        match self.index.lookup(path.schema_key()) {
            Lookup::Undeclared | Lookup::Untyped => Ok(()),
            Lookup::Array => self.cast_array_operand(value, path),
            Lookup::Object => match value {
                Value::Object(map) => self.visit_filter(map, path),
                other => Err(CastError::shape_mismatch(other, OBJECT)),
            },
            Lookup::Scalar(ty) => self.cast_value(value, ty),
        }
    }

    fn cast_array_operand(&self, value: &mut Value, path: &FieldPath) -> Result<(), CastError> {
        if is_unrecognized_operator_object(value) {
            debug!(path = path.instance_key(), "unrecognized operator object left as is");
            return Ok(());
        }
        if is_operator_object(value) {
            if let Value::Object(map) = value {
                return self.visit_filter(map, path);
            }
        }

        promote(value);
        if let Value::Array(items) = value {
            for (i, item) in items.iter_mut().enumerate() {
                self.cast_at(item, &path.child(Segment::Index(i)))?;
            }
        }
        Ok(())
    }

    fn cast_logical(&self, operand: &mut Value, path: &FieldPath) -> Result<(), CastError> {
        promote(operand);
        let Value::Array(items) = operand else {
            return Ok(());
        };

        let array_field = matches!(self.index.lookup(path.schema_key()), Lookup::Array);
        for (i, item) in items.iter_mut().enumerate() {
            if path.is_root() {
                match item {
                    Value::Object(map) => self.visit_filter(map, path)?,
                    other => return Err(CastError::shape_mismatch(other, OBJECT)),
                }
            } else if array_field {
                match item {
                    Value::Object(map) if map.keys().any(|k| is_known_operator(k)) => {
                        self.visit_filter(map, path)?
                    }
                    Value::Array(_) => self.cast_comparand(item, path)?,
                    other => self.cast_at(other, &path.child(Segment::Index(i)))?,
                }
            } else {
                self.cast_at(item, path)?;
            }
        }
        Ok(())
    }

    fn cast_elem_match(&self, operand: &mut Value, path: &FieldPath) -> Result<(), CastError> {
        let element = path.element();
        match self.index.lookup(element.schema_key()) {
            Lookup::Array | Lookup::Object => match operand {
                Value::Object(map) => self.visit_filter(map, &element),
                other => Err(CastError::shape_mismatch(other, OBJECT)),
            },
            Lookup::Scalar(ty) => self.cast_value(operand, ty),
            Lookup::Undeclared | Lookup::Untyped => Ok(()),
        }
    }

    /// Casts the operand of a comparison against the field at `path`; on an
    /// array field a single operand is compared against the elements.
    pub(crate) fn cast_comparand(
        &self,
        operand: &mut Value,
        path: &FieldPath,
    ) -> Result<(), CastError> {
        if !matches!(self.index.lookup(path.schema_key()), Lookup::Array) {
            return self.cast_at(operand, path);
        }
        if operand.is_null() || is_unrecognized_operator_object(operand) {
            return Ok(());
        }
        if is_operator_object(operand) {
            if let Value::Object(map) = operand {
                return self.visit_filter(map, path);
            }
        }
        if operand.is_array() {
            return self.cast_at(operand, path);
        }
        self.cast_at(operand, &path.element())
    }

    /// Casts a value, or an operator object, against a scalar type.
    fn cast_value(&self, value: &mut Value, ty: &ScalarType) -> Result<(), CastError> {
        if ty.satisfies(value) {
            return Ok(());
        }

        if let Value::Object(map) = value {
            let mut has_operators = false;
            for (key, operand) in map.iter_mut() {
                if !is_operator(key) {
                    continue;
                }
                has_operators = true;
                match filter_operator(key) {
                    FilterOperator::Comparison => self.cast_value(operand, ty)?,
                    FilterOperator::Array | FilterOperator::Logical => {
                        if operand.is_null() {
                            continue;
                        }
                        promote(operand);
                        if let Value::Array(items) = operand {
                            for item in items {
                                self.cast_value(item, ty)?;
                            }
                        }
                    }
                    FilterOperator::Element(selector) => cast_element(operand, selector)?,
                    FilterOperator::Container | FilterOperator::Ignored | FilterOperator::Unknown => {}
                }
            }
            if has_operators {
                return Ok(());
            }
        }

        coerce_in_place(value, ty)
    }
}

/// Casts a filter in place.
///
/// # Errors
///
/// Returns the first [`CastError`] encountered.
pub fn cast_filter(filter: &mut Value, index: &SchemaIndex) -> Result<(), CastError> {
    FilterCaster::new(index).cast(filter)
}

fn cast_element(operand: &mut Value, selector: ElementSelector) -> Result<(), CastError> {
    coerce_in_place(operand, &selector.operand_type())
}

fn is_known_operator(key: &str) -> bool {
    filter_operator(key) != FilterOperator::Unknown
}

/// Extended JSON wrappers that stand for a single value.
const VALUE_WRAPPERS: &[&str] = &["$oid", "$date", "$regularExpression"];

/// An object with `$`-keys of which none is a recognized operator or a value
/// wrapper. Such objects are passed through untouched.
fn is_unrecognized_operator_object(value: &Value) -> bool {
    value.as_object().is_some_and(|map| {
        map.keys().any(|k| is_operator(k))
            && !map
                .keys()
                .any(|k| is_known_operator(k) || VALUE_WRAPPERS.contains(&k.as_str()))
    })
}

/// An object holding at least one recognized query operator. Extended JSON
/// wrappers such as `{"$oid": ...}` are values, not operator objects.
fn is_operator_object(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.keys().any(|k| is_known_operator(k)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::CoercionRegistry;
    use crate::definition::{CompileOptions, compile_definition};
    use serde_json::json;

    fn index(definition: Value) -> SchemaIndex {
        compile_definition(&definition, &CoercionRegistry::default(), &CompileOptions::default())
            .unwrap()
    }

    fn cast(definition: Value, mut filter: Value) -> Result<Value, CastError> {
        cast_filter(&mut filter, &index(definition))?;
        Ok(filter)
    }

    #[test]
    fn test_element_selectors_use_fixed_types() {
        let cast = cast(
            json!({ "test": "Number", "tags": "String" }),
            json!({ "_id": { "$type": "7" }, "test": { "$exists": 1 } }),
        )
        .unwrap();
        assert_eq!(cast, json!({ "_id": { "$type": 7 }, "test": { "$exists": true } }));
    }

    #[test]
    fn test_logical_operand_promoted() {
        let cast = cast(json!({ "test": "Number" }), json!({ "$or": { "test": "1" } })).unwrap();
        assert_eq!(cast, json!({ "$or": [{ "test": 1 }] }));
    }

    #[test]
    fn test_root_logical_elements_must_be_objects() {
        let err = cast(json!({ "test": "Number" }), json!({ "$and": ["x"] })).unwrap_err();
        assert_eq!(err.to_string(), "Could not cast 'x' to Object");
    }

    #[test]
    fn test_ignored_operators_untouched() {
        let filter = json!({
            "$where": "this._id = 3",
            "loc": { "$geoWithin": { "$center": [[0, 0], "10"] } },
            "$text": { "$search": 5 },
            "test": { "$mod": ["4", 0] },
        });
        let cast = cast(json!({ "test": "Number", "loc": "Number" }), filter.clone()).unwrap();
        assert_eq!(cast, filter);
    }

    #[test]
    fn test_unknown_fields_kept() {
        let cast = cast(json!({ "test": "Number" }), json!({ "other": "1", "test": "2" })).unwrap();
        assert_eq!(cast, json!({ "other": "1", "test": 2 }));
    }

    #[test]
    fn test_object_field_requires_object() {
        let err = cast(
            json!({ "name": { "first": "String" } }),
            json!({ "name": "Axl Rose" }),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Could not cast 'Axl Rose' to Object");

        let cast = cast(
            json!({ "name": { "first": "String" } }),
            json!({ "name": { "first": 1 } }),
        )
        .unwrap();
        assert_eq!(cast, json!({ "name": { "first": "1" } }));
    }

    #[test]
    fn test_dotted_keys_resolve_through_arrays() {
        let cast = cast(
            json!({ "names": [{ "first": "String" }] }),
            json!({ "names.first": 5, "names.0.first": { "$in": [6] } }),
        )
        .unwrap();
        assert_eq!(cast, json!({ "names.first": "5", "names.0.first": { "$in": ["6"] } }));
    }

    #[test]
    fn test_array_field_operand_promoted() {
        let cast = cast(json!({ "tags": ["String"] }), json!({ "tags": 1 })).unwrap();
        assert_eq!(cast, json!({ "tags": ["1"] }));
    }

    #[test]
    fn test_array_field_operators() {
        let cast = cast(
            json!({ "tags": ["String"] }),
            json!({ "tags": { "$size": "2", "$all": [1, 2], "$ne": 3, "$in": [4, [5]] } }),
        )
        .unwrap();
        assert_eq!(
            cast,
            json!({ "tags": { "$size": 2, "$all": ["1", "2"], "$ne": "3", "$in": ["4", ["5"]] } })
        );
    }

    #[test]
    fn test_elem_match() {
        let cast = cast(
            json!({ "names": [{ "first": "String" }], "scores": ["Number"] }),
            json!({
                "names": { "$elemMatch": { "first": 1, "nick": 2 } },
                "scores": { "$elemMatch": { "$gt": "10", "$lt": "20" } },
            }),
        )
        .unwrap();
        assert_eq!(
            cast,
            json!({
                "names": { "$elemMatch": { "first": "1", "nick": 2 } },
                "scores": { "$elemMatch": { "$gt": 10, "$lt": 20 } },
            })
        );
    }

    #[test]
    fn test_null_operands_untouched() {
        let filter = json!({ "test": null, "name": null, "tags": { "$in": null } });
        let cast = cast(
            json!({ "test": "Number", "name": { "first": "String" }, "tags": ["String"] }),
            filter.clone(),
        )
        .unwrap();
        assert_eq!(cast, filter);
    }

    #[test]
    fn test_unrecognized_operator_object_left_alone() {
        let filter = json!({ "test": { "$bitsAllSet": "x" } });
        assert_eq!(cast(json!({ "test": "Number" }), filter.clone()).unwrap(), filter);
    }

    #[test]
    fn test_unrecognized_operators_under_containers_untouched() {
        let definition = json!({
            "tags": ["String"],
            "names": [{ "first": "String" }],
            "name": { "first": "String" },
        });
        let filter = json!({
            "tags": { "$bitsAllSet": 1 },
            "names": { "$foo": 2 },
            "name": { "$foo": { "first": 1 } },
        });
        assert_eq!(cast(definition.clone(), filter.clone()).unwrap(), filter);

        let filter = json!({ "tags": { "$in": [{ "$foo": 1 }, 2] } });
        assert_eq!(
            cast(definition, filter).unwrap(),
            json!({ "tags": { "$in": [{ "$foo": 1 }, "2"] } })
        );
    }

    #[test]
    fn test_value_wrappers_on_array_fields_still_cast() {
        let cast = cast(
            json!({ "members": ["ObjectId"] }),
            json!({ "members": { "$oid": "000000000000000000000001" } }),
        )
        .unwrap();
        assert_eq!(cast, json!({ "members": [{ "$oid": "000000000000000000000001" }] }));
    }

    #[test]
    fn test_all_with_nested_arrays_matches_whole_array() {
        let cast = cast(
            json!({ "tags": ["String"] }),
            json!({ "tags": { "$all": [["ssl", 1], 2] } }),
        )
        .unwrap();
        assert_eq!(cast, json!({ "tags": { "$all": [["ssl", "1"], "2"] } }));
    }

    #[test]
    fn test_geo_selectors_on_array_fields_untouched() {
        let filter = json!({
            "tags": { "$nearSphere": { "$geometry": { "type": "Point", "coordinates": ["1", 2] } } },
            "names": { "$geoWithin": { "$centerSphere": [["0", 0], "1"] } },
        });
        let cast = cast(
            json!({ "tags": ["String"], "names": [{ "first": "String" }] }),
            filter.clone(),
        )
        .unwrap();
        assert_eq!(cast, filter);
    }

    #[test]
    fn test_non_object_filter_rejected() {
        let err = cast(json!({}), json!([1])).unwrap_err();
        assert!(matches!(err, CastError::ShapeMismatch { .. }));
    }
}
