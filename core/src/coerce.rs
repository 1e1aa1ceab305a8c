//! Leaf value coercion and the per-type coercion registry.
//!
//! Each scalar type a schema can declare is backed by a [`Coercion`] rule:
//! a pure function from a raw value to a value of that type. Rules are
//! looked up by name in a [`CoercionRegistry`] once, when a schema index is
//! built, and carried on the index as [`ScalarType`] handles.
//!
//! Types that JSON has no native representation for use MongoDB Extended
//! JSON wrappers:
//!
//! | Type       | Representation                                              |
//! |------------|-------------------------------------------------------------|
//! | `ObjectId` | `{"$oid": "<24 hex digits>"}`                               |
//! | `Date`     | `{"$date": "<RFC 3339, UTC, millisecond precision>"}`       |
//! | `RegExp`   | `{"$regularExpression": {"pattern": "...", "options": ""}}` |

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::error::CastError;
use crate::inspect::number_text;
use crate::types::DeclaredType;

/// Name of the built-in string type.
pub const STRING: &str = "String";
/// Name of the built-in number type.
pub const NUMBER: &str = "Number";
/// Name of the built-in boolean type.
pub const BOOLEAN: &str = "Boolean";
/// Name of the built-in object identifier type.
pub const OBJECT_ID: &str = "ObjectId";
/// Name of the built-in date type.
pub const DATE: &str = "Date";
/// Name of the built-in regular expression type.
pub const REGEXP: &str = "RegExp";
/// Name that declares an array container.
pub const ARRAY: &str = "Array";
/// Name that declares an object container.
pub const OBJECT: &str = "Object";

/// A conversion rule for one declared scalar type.
///
/// Implementations must be pure: `convert` returns a new value and never
/// depends on anything but its argument.
pub trait Coercion: Send + Sync {
    /// Type name used in schema definitions and error messages.
    fn name(&self) -> &str;

    /// Returns `true` if `value` already is of this type.
    fn satisfies(&self, value: &Value) -> bool;

    /// Converts a value that does not satisfy this type.
    ///
    /// # Errors
    ///
    /// Returns [`CastError::TypeMismatch`] when no conversion exists.
    fn convert(&self, value: &Value) -> Result<Value, CastError>;
}

/// Shared handle to a registered [`Coercion`] rule.
#[derive(Clone)]
pub struct ScalarType(Arc<dyn Coercion>);

impl ScalarType {
    /// Wraps a coercion rule.
    pub fn new(rule: impl Coercion + 'static) -> Self {
        Self(Arc::new(rule))
    }

    /// The built-in `String` type.
    pub fn string() -> Self {
        Self::new(StringType)
    }

    /// The built-in `Number` type.
    pub fn number() -> Self {
        Self::new(NumberType)
    }

    /// The built-in `Boolean` type.
    pub fn boolean() -> Self {
        Self::new(BooleanType)
    }

    /// The built-in `ObjectId` type.
    pub fn object_id() -> Self {
        Self::new(ObjectIdType)
    }

    /// The built-in `Date` type.
    pub fn date() -> Self {
        Self::new(DateType)
    }

    /// The built-in `RegExp` type.
    pub fn regexp() -> Self {
        Self::new(RegExpType)
    }

    /// Type name.
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Returns `true` if `value` already is of this type.
    pub fn satisfies(&self, value: &Value) -> bool {
        self.0.satisfies(value)
    }

    /// Coerces `value` to this type. See [`coerce`].
    pub fn coerce<'v>(&self, value: &'v Value) -> Result<Cow<'v, Value>, CastError> {
        coerce(value, self)
    }
}

impl fmt::Debug for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScalarType").field(&self.name()).finish()
    }
}

impl PartialEq for ScalarType {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

/// Coerces one raw value to a declared scalar type.
///
/// Values that already satisfy the type, and `null`, are returned borrowed
/// and unchanged; everything else goes through the type's conversion rule.
///
/// # Examples
///
/// ```
/// use std::borrow::Cow;
/// use schema_cast_core::{ScalarType, coerce};
/// use serde_json::json;
///
/// let number = ScalarType::number();
/// assert_eq!(coerce(&json!("1962"), &number).unwrap().into_owned(), json!(1962));
/// assert!(matches!(coerce(&json!(7), &number).unwrap(), Cow::Borrowed(_)));
///
/// let err = coerce(&json!("not a number"), &number).unwrap_err();
/// assert_eq!(err.to_string(), "Could not cast 'not a number' to Number");
/// ```
pub fn coerce<'v>(value: &'v Value, ty: &ScalarType) -> Result<Cow<'v, Value>, CastError> {
    if value.is_null() || ty.satisfies(value) {
        return Ok(Cow::Borrowed(value));
    }
    ty.0.convert(value).map(Cow::Owned)
}

/// Coerces a value owned by the caller's container and writes the result
/// back only when it changed.
pub(crate) fn coerce_in_place(value: &mut Value, ty: &ScalarType) -> Result<(), CastError> {
    let converted = match coerce(value, ty)? {
        Cow::Owned(converted) => converted,
        Cow::Borrowed(_) => return Ok(()),
    };
    *value = converted;
    Ok(())
}

/// Registry of coercion rules keyed by type name.
///
/// [`CoercionRegistry::default`] holds the built-in types; callers can add
/// their own or replace a built-in by registering under the same name.
///
/// # Examples
///
/// ```
/// use schema_cast_core::{CastError, CoercionRegistry, DeclaredType};
/// use serde_json::{Value, json};
///
/// let mut registry = CoercionRegistry::default();
/// registry.register_fn(
///     "Upper",
///     |v| v.as_str().is_some_and(|s| s == s.to_uppercase()),
///     |v| match v.as_str() {
///         Some(s) => Ok(Value::String(s.to_uppercase())),
///         None => Err(CastError::type_mismatch(v, "Upper")),
///     },
/// );
///
/// let upper = registry.get("Upper").unwrap();
/// assert_eq!(upper.coerce(&json!("abc")).unwrap().into_owned(), json!("ABC"));
/// assert!(matches!(registry.resolve("Array"), Some(DeclaredType::Array)));
/// ```
#[derive(Clone)]
pub struct CoercionRegistry {
    rules: HashMap<String, ScalarType>,
}

impl CoercionRegistry {
    /// Creates a registry with no scalar types.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Registers a rule under its own name, replacing any existing rule.
    pub fn register(&mut self, rule: impl Coercion + 'static) -> &mut Self {
        let ty = ScalarType::new(rule);
        self.rules.insert(ty.name().to_string(), ty);
        self
    }

    /// Registers a rule built from two closures.
    pub fn register_fn<S, C>(&mut self, name: impl Into<String>, satisfies: S, convert: C) -> &mut Self
    where
        S: Fn(&Value) -> bool + Send + Sync + 'static,
        C: Fn(&Value) -> Result<Value, CastError> + Send + Sync + 'static,
    {
        self.register(FnCoercion {
            name: name.into(),
            satisfies,
            convert,
        })
    }

    /// Looks up a scalar type by name.
    pub fn get(&self, name: &str) -> Option<ScalarType> {
        self.rules.get(name).cloned()
    }

    /// Resolves a type name from a schema definition, including the
    /// container names `Array` and `Object`.
    pub fn resolve(&self, name: &str) -> Option<DeclaredType> {
        match name {
            ARRAY => Some(DeclaredType::Array),
            OBJECT => Some(DeclaredType::Object),
            _ => self.get(name).map(DeclaredType::Scalar),
        }
    }

    /// Registered scalar type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CoercionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(StringType)
            .register(NumberType)
            .register(BooleanType)
            .register(ObjectIdType)
            .register(DateType)
            .register(RegExpType);
        registry
    }
}

impl fmt::Debug for CoercionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoercionRegistry")
            .field("types", &self.names())
            .finish()
    }
}

struct FnCoercion<S, C> {
    name: String,
    satisfies: S,
    convert: C,
}

impl<S, C> Coercion for FnCoercion<S, C>
where
    S: Fn(&Value) -> bool + Send + Sync,
    C: Fn(&Value) -> Result<Value, CastError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn satisfies(&self, value: &Value) -> bool {
        (self.satisfies)(value)
    }

    fn convert(&self, value: &Value) -> Result<Value, CastError> {
        (self.convert)(value)
    }
}

// ---------------------------------------------------------------------------
// Built-in rules
// ---------------------------------------------------------------------------

struct StringType;

impl Coercion for StringType {
    fn name(&self) -> &str {
        STRING
    }

    fn satisfies(&self, value: &Value) -> bool {
        value.is_string()
    }

    fn convert(&self, value: &Value) -> Result<Value, CastError> {
        match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(number_text(n))),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => object_id_hex(value)
                .map(|hex| Value::String(hex.to_string()))
                .ok_or_else(|| CastError::type_mismatch(value, STRING)),
        }
    }
}

struct NumberType;

impl Coercion for NumberType {
    fn name(&self) -> &str {
        NUMBER
    }

    fn satisfies(&self, value: &Value) -> bool {
        value.is_number()
    }

    fn convert(&self, value: &Value) -> Result<Value, CastError> {
        let parsed = match value {
            Value::String(s) => parse_number(s),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n.as_f64(),
            _ => None,
        };
        parsed
            .and_then(number_value)
            .ok_or_else(|| CastError::type_mismatch(value, NUMBER))
    }
}

/// Parses numeric text with JavaScript `Number(string)` semantics, minus the
/// non-finite results JSON cannot carry.
fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    let lower = trimmed.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
                return None;
            }
            let radix_f = f64::from(radix);
            return Some(digits.chars().fold(0.0, |acc, c| {
                acc * radix_f + f64::from(c.to_digit(radix).unwrap_or(0))
            }));
        }
    }

    let decimal = trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !decimal {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Largest integer an IEEE double represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn number_value(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Some(Value::from(n as i64));
    }
    serde_json::Number::from_f64(n).map(Value::Number)
}

struct BooleanType;

impl Coercion for BooleanType {
    fn name(&self) -> &str {
        BOOLEAN
    }

    fn satisfies(&self, value: &Value) -> bool {
        value.is_boolean()
    }

    fn convert(&self, value: &Value) -> Result<Value, CastError> {
        let truthy = match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        };
        Ok(Value::Bool(truthy))
    }
}

struct ObjectIdType;

impl Coercion for ObjectIdType {
    fn name(&self) -> &str {
        OBJECT_ID
    }

    fn satisfies(&self, value: &Value) -> bool {
        object_id_hex(value).is_some()
    }

    fn convert(&self, value: &Value) -> Result<Value, CastError> {
        match value.as_str() {
            Some(s) if is_object_id_hex(s) => Ok(json!({ "$oid": s.to_ascii_lowercase() })),
            _ => Err(CastError::type_mismatch(value, OBJECT_ID)),
        }
    }
}

fn is_object_id_hex(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Returns the hex digits of an `{"$oid": ...}` wrapper.
fn object_id_hex(value: &Value) -> Option<&str> {
    let hex = single_entry(value, "$oid")?.as_str()?;
    is_object_id_hex(hex).then_some(hex)
}

/// Returns the value of `key` if `value` is an object holding only that key.
fn single_entry<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(key),
        _ => None,
    }
}

struct DateType;

impl Coercion for DateType {
    fn name(&self) -> &str {
        DATE
    }

    fn satisfies(&self, value: &Value) -> bool {
        single_entry(value, "$date").is_some()
    }

    fn convert(&self, value: &Value) -> Result<Value, CastError> {
        let parsed = match value {
            Value::String(s) => parse_date(s),
            Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            _ => None,
        };
        parsed
            .map(|date| json!({ "$date": date.to_rfc3339_opts(SecondsFormat::Millis, true) }))
            .ok_or_else(|| CastError::type_mismatch(value, DATE))
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

struct RegExpType;

impl Coercion for RegExpType {
    fn name(&self) -> &str {
        REGEXP
    }

    fn satisfies(&self, value: &Value) -> bool {
        single_entry(value, "$regularExpression").is_some_and(Value::is_object)
    }

    fn convert(&self, value: &Value) -> Result<Value, CastError> {
        let pattern = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => number_text(n),
            Value::Bool(b) => b.to_string(),
            _ => return Err(CastError::type_mismatch(value, REGEXP)),
        };
        if fancy_regex::Regex::new(&pattern).is_err() {
            return Err(CastError::type_mismatch(value, REGEXP));
        }

        Ok(json!({ "$regularExpression": { "pattern": pattern, "options": "" } }))
    }
}
