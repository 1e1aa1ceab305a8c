//! Literal rendering for cast failure messages.
//!
//! Error messages embed the offending value the way a JavaScript console
//! prints it (`'Axl Rose'`, `[ 'Axl Rose' ]`, `{ first: 'Axl' }`), which is
//! the format the surrounding tooling and existing log scrapers expect.

use serde_json::{Number, Value};

/// Nesting depth past which composite values collapse to `[Object]`/`[Array]`.
const MAX_DEPTH: usize = 2;

/// Renders a value as an inspect-style literal.
///
/// # Examples
///
/// ```
/// use schema_cast_core::inspect;
/// use serde_json::json;
///
/// assert_eq!(inspect(&json!("Axl Rose")), "'Axl Rose'");
/// assert_eq!(inspect(&json!(["Axl Rose"])), "[ 'Axl Rose' ]");
/// assert_eq!(inspect(&json!({"first": "Axl", "last-name": 1})), "{ first: 'Axl', 'last-name': 1 }");
/// assert_eq!(inspect(&json!([])), "[]");
/// ```
pub fn inspect(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&number_text(n)),
        Value::String(s) => out.push_str(&quote(s)),
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Array(_) if depth > MAX_DEPTH => out.push_str("[Array]"),
        Value::Array(items) => {
            out.push_str("[ ");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item, depth + 1);
            }
            out.push_str(" ]");
        }
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Object(_) if depth > MAX_DEPTH => out.push_str("[Object]"),
        Value::Object(map) => {
            out.push_str("{ ");
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if is_identifier(key) {
                    out.push_str(key);
                } else {
                    out.push_str(&quote(key));
                }
                out.push_str(": ");
                write_value(out, item, depth + 1);
            }
            out.push_str(" }");
        }
    }
}

/// Formats a JSON number the way JavaScript's `String(n)` does.
///
/// Integral floats drop their fractional part (`100.0` → `100`).
pub(crate) fn number_text(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 1e21 {
                return format!("{f:.0}");
            }
        }
    }
    n.to_string()
}

fn quote(s: &str) -> String {
    let delimiter = if !s.contains('\'') {
        '\''
    } else if !s.contains('"') {
        '"'
    } else if !s.contains('`') {
        '`'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inspect_scalars() {
        assert_eq!(inspect(&json!(null)), "null");
        assert_eq!(inspect(&json!(true)), "true");
        assert_eq!(inspect(&json!(1962)), "1962");
        assert_eq!(inspect(&json!(1.5)), "1.5");
        assert_eq!(inspect(&json!(100.0)), "100");
        assert_eq!(inspect(&json!("not a number")), "'not a number'");
    }

    #[test]
    fn test_inspect_switches_quotes() {
        assert_eq!(inspect(&json!("Guns N' Roses")), "\"Guns N' Roses\"");
        assert_eq!(inspect(&json!("a'b\"c")), "`a'b\"c`");
        assert_eq!(inspect(&json!("line\nbreak")), "'line\\nbreak'");
    }

    #[test]
    fn test_inspect_nested_collapses_past_depth() {
        let value = json!({"a": {"b": {"c": {"d": 1}}}});
        assert_eq!(inspect(&value), "{ a: { b: { c: [Object] } } }");
    }

    #[test]
    fn test_inspect_quotes_non_identifier_keys() {
        assert_eq!(inspect(&json!({"$oid": "x"})), "{ $oid: 'x' }");
        assert_eq!(inspect(&json!({"0": 1})), "{ '0': 1 }");
    }
}
