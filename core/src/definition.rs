//! Compiles nested schema definitions into a flat [`SchemaIndex`].
//!
//! Definitions are plain JSON (or YAML) values:
//!
//! ```json
//! {
//!   "name": { "first": "String", "last": { "$type": "String" } },
//!   "born": "Number",
//!   "members": ["ObjectId"],
//!   "points": [["Number"]],
//!   "tags": { "$type": "Array" },
//!   "band": { "$lookUp": { "ref": "Band" } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coerce::{CoercionRegistry, ScalarType};
use crate::error::SchemaError;
use crate::path::WILDCARD;
use crate::types::{DeclaredType, SchemaIndex, SchemaIndexBuilder};

/// Key holding a path's type inside an object definition node.
pub const TYPE_KEY: &str = "$type";

/// Path of the implicit document identifier.
pub const ID_PATH: &str = "_id";

/// Options for [`compile_definition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Declare `_id: ObjectId` when the definition does not declare `_id`.
    pub implicit_id: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { implicit_id: true }
    }
}

/// Compiles a definition into a schema index.
///
/// # Errors
///
/// Returns [`SchemaError::UnknownType`] for a type name missing from
/// `registry` and [`SchemaError::InvalidDefinition`] for a node the compiler
/// cannot interpret.
///
/// # Examples
///
/// ```
/// use schema_cast_core::{CoercionRegistry, CompileOptions, Lookup, compile_definition};
/// use serde_json::json;
///
/// let definition = json!({
///     "name": { "first": "String", "last": "String" },
///     "points": [["Number"]],
/// });
/// let index = compile_definition(&definition, &CoercionRegistry::default(), &CompileOptions::default())
///     .unwrap();
///
/// assert!(matches!(index.lookup("name"), Lookup::Object));
/// assert!(matches!(index.lookup("points.$.$"), Lookup::Scalar(_)));
/// assert!(matches!(index.lookup("_id"), Lookup::Scalar(_)));
/// ```
pub fn compile_definition(
    definition: &Value,
    registry: &CoercionRegistry,
    options: &CompileOptions,
) -> Result<SchemaIndex, SchemaError> {
    let Value::Object(fields) = definition else {
        return Err(invalid("", "a definition must be an object of fields"));
    };

    let mut compiler = Compiler {
        registry,
        builder: SchemaIndexBuilder::new(),
    };
    compiler.fields("", fields)?;

    let mut builder = compiler.builder;
    if options.implicit_id && !builder.contains(ID_PATH) {
        builder.insert(ID_PATH, Some(DeclaredType::Scalar(ScalarType::object_id())));
    }
    builder.build()
}

struct Compiler<'r> {
    registry: &'r CoercionRegistry,
    builder: SchemaIndexBuilder,
}

impl Compiler<'_> {
    fn fields(&mut self, prefix: &str, fields: &Map<String, Value>) -> Result<(), SchemaError> {
        for (key, node) in fields {
            if key.starts_with('$') {
                continue;
            }
            if key.is_empty() || key.contains('.') {
                return Err(invalid(prefix, format!("invalid field name `{key}`")));
            }
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            self.node(&path, node)?;
        }
        Ok(())
    }

    fn node(&mut self, path: &str, node: &Value) -> Result<(), SchemaError> {
        match node {
            Value::String(name) => {
                let ty = self.type_named(path, name)?;
                self.builder.insert(path, Some(ty));
                Ok(())
            }
            Value::Array(items) => self.array(path, items),
            Value::Object(map) => self.object(path, map),
            other => Err(invalid(path, format!("unsupported definition node `{other}`"))),
        }
    }

    fn array(&mut self, path: &str, items: &[Value]) -> Result<(), SchemaError> {
        self.builder.insert(path, Some(DeclaredType::Array));
        match items {
            [] => Ok(()),
            [element] => self.node(&format!("{path}.{WILDCARD}"), element),
            _ => Err(invalid(path, "an array definition holds exactly one element type")),
        }
    }

    fn object(&mut self, path: &str, map: &Map<String, Value>) -> Result<(), SchemaError> {
        let has_fields = map.keys().any(|key| !key.starts_with('$'));

        match map.get(TYPE_KEY) {
            Some(ty) => {
                self.node(path, ty)?;
                if has_fields {
                    let declared = self.builder_type(path);
                    if declared != Some(DeclaredType::Object) {
                        return Err(invalid(path, "fields are only allowed under an Object type"));
                    }
                    self.fields(path, map)?;
                }
                Ok(())
            }
            None if has_fields => {
                self.builder.insert(path, Some(DeclaredType::Object));
                self.fields(path, map)
            }
            None => {
                self.builder.insert(path, None);
                Ok(())
            }
        }
    }

    fn type_named(&self, path: &str, name: &str) -> Result<DeclaredType, SchemaError> {
        self.registry
            .resolve(name)
            .ok_or_else(|| SchemaError::UnknownType {
                path: path.to_string(),
                type_name: name.to_string(),
            })
    }

    fn builder_type(&self, path: &str) -> Option<DeclaredType> {
        self.builder.declared_type(path).cloned()
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidDefinition {
        path: path.to_string(),
        reason: reason.into(),
    }
}
