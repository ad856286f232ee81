//! Resolved schema nodes.
//!
//! A [`SchemaNode`] is the output of the resolver: a concrete, immutable
//! tree with every `$ref` dereferenced and every `oneOf`/`anyOf`/`allOf`
//! collapsed. Downstream components switch on [`Kind`] instead of
//! re-inspecting raw JSON shape.

use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Concrete type of a resolved schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
    /// No `type` and no structural keywords to infer one from.
    #[default]
    Unresolved,
}

impl Kind {
    /// Parse a JSON Schema `type` value.
    ///
    /// Returns `None` for unknown type names (caller degrades to
    /// [`Kind::Unresolved`]).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "object" => Some(Kind::Object),
            "array" => Some(Kind::Array),
            "string" => Some(Kind::String),
            "number" => Some(Kind::Number),
            "integer" => Some(Kind::Integer),
            "boolean" => Some(Kind::Boolean),
            "null" => Some(Kind::Null),
            _ => None,
        }
    }

    /// The JSON Schema `type` keyword spelling, if any.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Kind::Object => Some("object"),
            Kind::Array => Some("array"),
            Kind::String => Some("string"),
            Kind::Number => Some("number"),
            Kind::Integer => Some("integer"),
            Kind::Boolean => Some("boolean"),
            Kind::Null => Some("null"),
            Kind::Unresolved => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Kind::Number | Kind::Integer)
    }
}

/// Input-relevant constraints lifted from a schema node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Constraints {
    /// Lift the constraint keywords out of a raw schema object.
    pub fn from_schema(map: &Map<String, Value>) -> Self {
        Constraints {
            minimum: map.get("minimum").and_then(Value::as_f64),
            maximum: map.get("maximum").and_then(Value::as_f64),
            min_length: map.get("minLength").and_then(Value::as_u64),
            max_length: map.get("maxLength").and_then(Value::as_u64),
            pattern: map
                .get("pattern")
                .and_then(Value::as_str)
                .map(String::from),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.minimum.is_none()
            && self.maximum.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
    }
}

/// A fully resolved schema node.
///
/// Invariant: never contains `$ref`, `oneOf`, `anyOf`, or `allOf`;
/// composition is collapsed by the resolver before a node is handed out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    pub kind: Kind,
    /// Ordered property map (objects only). Order drives form layout.
    pub properties: Vec<(String, SchemaNode)>,
    /// Element schema (arrays only).
    pub items: Option<Box<SchemaNode>>,
    /// Names of required properties (objects only).
    pub required: Vec<String>,
    /// Enum literals, in schema order.
    pub enum_values: Vec<Value>,
    /// Format tag (date, date-time, email, uri, uuid, password, binary, ...).
    pub format: Option<String>,
    pub constraints: Constraints,
    pub default_value: Option<Value>,
    pub example: Option<Value>,
    pub description: Option<String>,
}

impl SchemaNode {
    /// The degradation value: an object with no known structure.
    ///
    /// Returned for unresolvable references and depth-bounded recursion.
    /// Callers treat it as "no further structure known", not as an error.
    pub fn empty_object() -> Self {
        SchemaNode {
            kind: Kind::Object,
            ..SchemaNode::default()
        }
    }

    pub fn of_kind(kind: Kind) -> Self {
        SchemaNode {
            kind,
            ..SchemaNode::default()
        }
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Serialize back to a plain JSON Schema object.
    ///
    /// Used to feed the resolved node to the `jsonschema` validator for
    /// whole-payload checks.
    pub fn to_schema_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(kind) = self.kind.as_str() {
            map.insert("type".into(), Value::String(kind.into()));
        }
        if !self.properties.is_empty() {
            let mut props = Map::new();
            for (name, node) in &self.properties {
                props.insert(name.clone(), node.to_schema_json());
            }
            map.insert("properties".into(), Value::Object(props));
        }
        if let Some(items) = &self.items {
            map.insert("items".into(), items.to_schema_json());
        }
        if !self.required.is_empty() {
            map.insert(
                "required".into(),
                Value::Array(
                    self.required
                        .iter()
                        .map(|r| Value::String(r.clone()))
                        .collect(),
                ),
            );
        }
        if !self.enum_values.is_empty() {
            map.insert("enum".into(), Value::Array(self.enum_values.clone()));
        }
        if let Some(format) = &self.format {
            map.insert("format".into(), Value::String(format.clone()));
        }
        if let Some(min) = self.constraints.minimum {
            map.insert("minimum".into(), number_value(min));
        }
        if let Some(max) = self.constraints.maximum {
            map.insert("maximum".into(), number_value(max));
        }
        if let Some(min) = self.constraints.min_length {
            map.insert("minLength".into(), Value::Number(min.into()));
        }
        if let Some(max) = self.constraints.max_length {
            map.insert("maxLength".into(), Value::Number(max.into()));
        }
        if let Some(pattern) = &self.constraints.pattern {
            map.insert("pattern".into(), Value::String(pattern.clone()));
        }
        if let Some(default) = &self.default_value {
            map.insert("default".into(), default.clone());
        }
        if let Some(description) = &self.description {
            map.insert("description".into(), Value::String(description.clone()));
        }
        Value::Object(map)
    }
}

/// Emit a float as a JSON integer when it has no fractional part.
fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        Value::Number(Number::from(f as i64))
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}
