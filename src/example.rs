//! Example payload generation from resolved schema nodes.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::node::{Kind, SchemaNode};

/// Maximum nesting depth for generated examples.
pub const MAX_EXAMPLE_DEPTH: usize = 5;

/// Synthesize a representative value for a resolved schema node.
///
/// Precedence: explicit `example`, then `default`, then the first enum
/// literal, then a format-specific synthetic value, then a type-generic
/// placeholder.
///
/// Objects at depth 0 include **all** properties so the user gets a complete
/// editable template; nested objects include only required properties to
/// keep the template compact. Call with `depth = 0` at the root.
pub fn example(node: &SchemaNode, depth: usize) -> Value {
    if depth > MAX_EXAMPLE_DEPTH {
        return match node.kind {
            Kind::Array => json!([]),
            _ => json!({}),
        };
    }
    if let Some(value) = &node.example {
        return value.clone();
    }
    if let Some(value) = &node.default_value {
        return value.clone();
    }
    if let Some(first) = node.enum_values.first() {
        return first.clone();
    }

    match node.kind {
        Kind::Object | Kind::Unresolved => {
            let mut map = Map::new();
            for (name, child) in &node.properties {
                if depth > 0 && !node.is_required(name) {
                    continue;
                }
                map.insert(name.clone(), example(child, depth + 1));
            }
            Value::Object(map)
        }
        Kind::Array => match &node.items {
            Some(items) => Value::Array(vec![example(items, depth + 1)]),
            None => json!([]),
        },
        Kind::String => string_example(node.format.as_deref()),
        Kind::Integer | Kind::Number => json!(0),
        Kind::Boolean => json!(false),
        Kind::Null => Value::Null,
    }
}

fn string_example(format: Option<&str>) -> Value {
    match format {
        Some("date-time") => json!(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        Some("date") => json!(Utc::now().format("%Y-%m-%d").to_string()),
        Some("email") => json!("user@example.com"),
        Some("uuid") => json!("00000000-0000-0000-0000-000000000000"),
        Some("uri" | "url") => json!("https://example.com"),
        _ => json!("string"),
    }
}
