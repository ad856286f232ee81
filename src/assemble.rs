//! Reassembling flat input entries into a nested request payload.
//!
//! The inverse of descriptor building: user input arrives as flat
//! `(dotted path, raw value)` pairs and leaves as a nested JSON value tree
//! shaped like the originating schema.

use serde_json::{Map, Number, Value};

use crate::node::Kind;
use crate::rules::RuleSet;

/// One collected input: a dotted path and the raw value from its widget.
///
/// The raw value is an untyped leaf (text, flag) or an ordered list of
/// leaves for array/multi-select fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueEntry {
    pub path: String,
    pub value: Value,
}

impl ValueEntry {
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        ValueEntry {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Rebuilds nested payloads from flat entries.
///
/// Borrows the operation's [`RuleSet`] so raw widget values can be coerced
/// by their field's schema kind. Empty and unparseable values are omitted
/// from the output; required-ness is the validation engine's concern, not
/// the assembler's.
pub struct Assembler<'a> {
    rules: &'a RuleSet,
}

impl<'a> Assembler<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Assembler { rules }
    }

    /// Assemble a nested value tree from flat entries.
    ///
    /// Intermediate path segments materialize as nested objects only when a
    /// non-empty leaf actually lands under them, so dropped leaves leave no
    /// empty parents behind. Repeated entries for the same array path extend
    /// the list in entry order.
    pub fn assemble(&self, entries: &[ValueEntry]) -> Value {
        let mut root = Map::new();
        for entry in entries {
            if entry.path.is_empty() {
                continue;
            }
            let Some(coerced) = self.coerce(&entry.path, &entry.value) else {
                continue;
            };
            if let Some(Value::Array(existing)) = value_at_mut(&mut root, &entry.path) {
                if let Value::Array(more) = coerced {
                    existing.extend(more);
                    continue;
                }
            }
            insert_at(&mut root, &entry.path, coerced);
        }
        Value::Object(root)
    }

    /// Assemble a flat name→value map (path/query/header parameters).
    ///
    /// Paths are used as-is; no dotted-path nesting is applied.
    pub fn assemble_flat(&self, entries: &[ValueEntry]) -> Map<String, Value> {
        let mut map = Map::new();
        for entry in entries {
            if let Some(coerced) = self.coerce(&entry.path, &entry.value) {
                map.insert(entry.path.clone(), coerced);
            }
        }
        map
    }

    /// Coerce a raw widget value by its registered rule.
    ///
    /// Returns `None` when the value is empty or malformed for its field
    /// kind. Such entries are excluded from the payload, and the validation
    /// engine reports them separately.
    pub fn coerce(&self, path: &str, raw: &Value) -> Option<Value> {
        if is_empty(raw) {
            return None;
        }
        let Some(rule) = self.rules.get(path) else {
            return Some(raw.clone());
        };
        match rule.kind {
            Kind::Integer => coerce_integer(raw),
            Kind::Number => coerce_number(raw),
            Kind::Boolean => coerce_boolean(raw),
            Kind::Array => coerce_list(raw),
            _ => Some(raw.clone()),
        }
    }
}

/// Empty means: null, empty string, or empty list. These are dropped.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn coerce_integer(raw: &Value) -> Option<Value> {
    match raw {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(raw.clone()),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| Value::Number(Number::from(f as i64))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .map(|n| Value::Number(Number::from(n))),
        _ => None,
    }
}

fn coerce_number(raw: &Value) -> Option<Value> {
    match raw {
        Value::Number(n) if n.as_f64().is_some_and(f64::is_finite) => Some(raw.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

fn coerce_boolean(raw: &Value) -> Option<Value> {
    match raw {
        Value::Bool(_) => Some(raw.clone()),
        Value::String(s) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Multi-select values keep the order the widget produced. A bare leaf
/// becomes a single-element list; empty elements are dropped.
fn coerce_list(raw: &Value) -> Option<Value> {
    let items: Vec<Value> = match raw {
        Value::Array(items) => items.iter().filter(|v| !is_empty(v)).cloned().collect(),
        other => vec![other.clone()],
    };
    if items.is_empty() {
        None
    } else {
        Some(Value::Array(items))
    }
}

fn insert_at(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                // A leaf already landed here; the nested entry wins.
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_at(inner, rest, value);
            }
        }
    }
}

fn value_at_mut<'v>(map: &'v mut Map<String, Value>, path: &str) -> Option<&'v mut Value> {
    match path.split_once('.') {
        None => map.get_mut(path),
        Some((head, rest)) => map
            .get_mut(head)
            .and_then(Value::as_object_mut)
            .and_then(|inner| value_at_mut(inner, rest)),
    }
}
