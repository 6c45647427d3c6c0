//! Attribute value coercion.

use std::fmt::Debug;

use opentelemetry::{Array, StringValue, Value};
use serde::Serialize;

/// Convert a JSON value into an attribute value.
///
/// Scalars keep their native type, `null` is dropped, and anything
/// structured is flattened to its JSON text.
pub(crate) fn json_to_value(value: serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Bool(b)),
        serde_json::Value::Number(n) => Some(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::I64(i),
            (None, Some(f)) => Value::F64(f),
            _ => Value::String(n.to_string().into()),
        }),
        serde_json::Value::String(s) => Some(Value::String(s.into())),
        other => Some(Value::String(other.to_string().into())),
    }
}

/// Render a JSON value as display text: strings verbatim, the rest as JSON.
pub(crate) fn json_to_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Serialize for capture, falling back to the `Debug` form.
pub(crate) fn capture<T: Serialize + Debug + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

pub(crate) fn string_array<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let values: Vec<StringValue> = items.into_iter().map(|s| s.into().into()).collect();
    Value::Array(Array::String(values))
}

/// Last path segment of a type name, without generics.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Cut `text` to at most `max_chars` characters.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
