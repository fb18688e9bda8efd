//! Data lookup for tag names
//!
//! Sections push their current item onto a scope stack. A name resolves
//! against the innermost scope that defines its first path segment, and
//! the remaining segments are followed inside that value. A key that
//! itself contains dots wins over the path it spells.

use serde_json::Value;

/// Resolve a tag name (`name`, `a.b.c`, `items.0.title` or `.`)
pub fn lookup<'d>(scopes: &[&'d Value], name: &str) -> Option<&'d Value> {
    let name = name.trim();
    if name == "." {
        return scopes.last().copied();
    }

    if name.contains('.') {
        let literal = scopes
            .iter()
            .rev()
            .find_map(|scope| scope.as_object().and_then(|map| map.get(name)));
        if literal.is_some() {
            return literal;
        }
    }

    let mut segments = name.split('.').map(str::trim);
    let first = segments.next()?;

    let mut current = scopes
        .iter()
        .rev()
        .find_map(|scope| scope.as_object().and_then(|map| map.get(first)))?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Truthiness used by inverted sections
pub fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Bool(true)) | Some(Value::Object(_)) => false,
    }
}

/// Short type description for error messages
pub fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
