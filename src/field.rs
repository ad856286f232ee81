//! Field descriptors: render-agnostic input specifications.
//!
//! Building descriptors and registering validation rules is a single pass
//! over the resolved schema. The resulting [`Form`] is the per-operation
//! context: descriptor trees plus the rule set, replaced wholesale when a
//! different operation is selected.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::assemble::{Assembler, ValueEntry};
use crate::document::{Operation, ParamIn};
use crate::node::{Constraints, Kind, SchemaNode};
use crate::resolver::Resolver;
use crate::rules::{FieldCheck, RuleSet, ValidationRule};

/// Enums with at most this many alternatives render as radio groups.
const SMALL_ENUM_MAX: usize = 4;

/// Strings allowed to grow past this length render as multi-line text.
const LONG_TEXT_THRESHOLD: u64 = 100;

/// What kind of input widget a field needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    LongText,
    Password,
    Email,
    Uri,
    Uuid,
    Date,
    DateTime,
    Time,
    Binary,
    Integer,
    Number,
    Checkbox,
    EnumSmall,
    EnumLarge,
    MultiSelect,
    /// Object composite; inputs live in `children`.
    Group,
    /// Array of non-enum items; `children` holds the item template.
    List,
}

/// Abstract description of one input point.
///
/// Immutable after construction; a new operation selection produces a new
/// tree.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDescriptor {
    /// Dotted key reaching this field in the assembled payload.
    pub path: String,
    pub label: String,
    pub required: bool,
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
    /// Enum literals for enum and multi-select fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldDescriptor>,
}

/// Parameter metadata for building one descriptor.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub path: String,
    pub label: String,
    pub required: bool,
    pub description: Option<String>,
}

/// One operation parameter rendered as a field.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterField {
    pub location: ParamIn,
    #[serde(flatten)]
    pub field: FieldDescriptor,
}

/// Assembled request data handed to the transport collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestParts {
    pub body: Option<Value>,
    pub path_params: Map<String, Value>,
    pub query_params: Map<String, Value>,
    pub headers: Map<String, Value>,
}

/// Everything the renderer and assembler need for one selected operation.
#[derive(Debug, Serialize)]
pub struct Form {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<FieldDescriptor>,
    pub parameters: Vec<ParameterField>,
    #[serde(skip)]
    rules: RuleSet,
}

impl Form {
    /// Build the form for an operation: descriptors and validation rules in
    /// one pass.
    pub fn build(operation: &Operation, resolver: &mut Resolver) -> Form {
        let mut rules = RuleSet::default();
        let mut builder = FieldBuilder { rules: &mut rules };

        let parameters = operation
            .parameters
            .iter()
            .map(|param| {
                let node = resolver.resolve(&param.schema);
                let field = builder.build(
                    &node,
                    FieldMeta {
                        path: param.name.clone(),
                        label: humanize(&param.name),
                        required: param.required,
                        description: param.description.clone(),
                    },
                );
                ParameterField {
                    location: param.location,
                    field,
                }
            })
            .collect();

        let body = operation.request_body.as_ref().map(|schema| {
            let node = resolver.resolve(schema);
            let description = node.description.clone();
            builder.build(
                &node,
                FieldMeta {
                    path: String::new(),
                    label: "Body".to_string(),
                    required: true,
                    description,
                },
            )
        });

        debug!(
            operation = %operation.key(),
            fields = rules.len(),
            "form built"
        );
        Form {
            body,
            parameters,
            rules,
        }
    }

    /// Validation rules registered for this form's fields.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Validate one field's candidate value.
    pub fn validate(&self, path: &str, value: Option<&Value>) -> FieldCheck {
        self.rules.validate(path, value)
    }

    /// Validate the whole form; empty map means valid.
    pub fn validate_all(
        &self,
        entries: &[ValueEntry],
    ) -> std::collections::BTreeMap<String, Vec<String>> {
        self.rules.validate_all(entries)
    }

    /// Assemble the request body from body-scoped entries.
    pub fn assemble_body(&self, entries: &[ValueEntry]) -> Value {
        Assembler::new(&self.rules).assemble(entries)
    }

    /// Assemble body and parameter maps for the transport collaborator.
    ///
    /// Parameter entries are matched to parameters by name and routed to the
    /// map for their location; empty values are omitted everywhere.
    pub fn submit(&self, body_entries: &[ValueEntry], param_entries: &[ValueEntry]) -> RequestParts {
        let assembler = Assembler::new(&self.rules);
        let body = self.body.as_ref().map(|_| assembler.assemble(body_entries));

        let mut path_params = Map::new();
        let mut query_params = Map::new();
        let mut headers = Map::new();
        for parameter in &self.parameters {
            let Some(entry) = param_entries
                .iter()
                .find(|entry| entry.path == parameter.field.path)
            else {
                continue;
            };
            let Some(value) = assembler.coerce(&entry.path, &entry.value) else {
                continue;
            };
            let target = match parameter.location {
                ParamIn::Path => &mut path_params,
                ParamIn::Query => &mut query_params,
                ParamIn::Header => &mut headers,
            };
            target.insert(parameter.field.path.clone(), value);
        }

        RequestParts {
            body,
            path_params,
            query_params,
            headers,
        }
    }
}

struct FieldBuilder<'a> {
    rules: &'a mut RuleSet,
}

impl FieldBuilder<'_> {
    /// Build a descriptor for a resolved node, registering the derived
    /// validation rule for every leaf as it is produced.
    fn build(&mut self, node: &SchemaNode, meta: FieldMeta) -> FieldDescriptor {
        if !node.enum_values.is_empty() {
            let kind = if node.enum_values.len() <= SMALL_ENUM_MAX {
                FieldKind::EnumSmall
            } else {
                FieldKind::EnumLarge
            };
            return self.leaf(node, meta, kind, node.enum_values.clone());
        }

        match node.kind {
            Kind::Object => {
                let children = node
                    .properties
                    .iter()
                    .filter(|(name, _)| !is_request_body_key(name))
                    .map(|(name, child)| {
                        let path = if meta.path.is_empty() {
                            name.clone()
                        } else {
                            format!("{}.{}", meta.path, name)
                        };
                        self.build(
                            child,
                            FieldMeta {
                                path,
                                label: humanize(name),
                                required: node.is_required(name),
                                description: child.description.clone(),
                            },
                        )
                    })
                    .collect();
                FieldDescriptor {
                    path: meta.path,
                    label: meta.label,
                    required: meta.required,
                    kind: FieldKind::Group,
                    constraints: Constraints::default(),
                    options: Vec::new(),
                    description: meta.description,
                    children,
                }
            }
            Kind::Array => self.build_array(node, meta),
            _ => {
                let kind = leaf_kind(node);
                self.leaf(node, meta, kind, Vec::new())
            }
        }
    }

    fn build_array(&mut self, node: &SchemaNode, meta: FieldMeta) -> FieldDescriptor {
        let items = node.items.as_deref();

        // Array of enum items: a multi-select over the item literals.
        if let Some(items) = items {
            if !items.enum_values.is_empty() {
                return self.leaf(node, meta, FieldKind::MultiSelect, items.enum_values.clone());
            }
        }

        self.rules
            .insert(meta.path.clone(), ValidationRule::from_node(node, meta.required));
        let children = items
            .map(|items| {
                // Item template for the renderer; not an input of its own,
                // so no rule is registered for it.
                vec![describe_only(
                    items,
                    FieldMeta {
                        path: meta.path.clone(),
                        label: meta.label.clone(),
                        required: false,
                        description: items.description.clone(),
                    },
                )]
            })
            .unwrap_or_default();
        FieldDescriptor {
            path: meta.path,
            label: meta.label,
            required: meta.required,
            kind: FieldKind::List,
            constraints: node.constraints.clone(),
            options: Vec::new(),
            description: meta.description,
            children,
        }
    }

    fn leaf(
        &mut self,
        node: &SchemaNode,
        meta: FieldMeta,
        kind: FieldKind,
        options: Vec<Value>,
    ) -> FieldDescriptor {
        self.rules
            .insert(meta.path.clone(), ValidationRule::from_node(node, meta.required));
        FieldDescriptor {
            path: meta.path,
            label: meta.label,
            required: meta.required,
            kind,
            constraints: node.constraints.clone(),
            options,
            description: meta.description,
            children: Vec::new(),
        }
    }
}

/// Descriptor without rule registration, for array item templates.
fn describe_only(node: &SchemaNode, meta: FieldMeta) -> FieldDescriptor {
    let mut scratch = RuleSet::default();
    let mut builder = FieldBuilder {
        rules: &mut scratch,
    };
    builder.build(node, meta)
}

/// Widget kind for a primitive node, from its format and constraints.
fn leaf_kind(node: &SchemaNode) -> FieldKind {
    match node.kind {
        Kind::Integer => FieldKind::Integer,
        Kind::Number => FieldKind::Number,
        Kind::Boolean => FieldKind::Checkbox,
        _ => match node.format.as_deref() {
            Some("date") => FieldKind::Date,
            Some("date-time") => FieldKind::DateTime,
            Some("time") => FieldKind::Time,
            Some("email") => FieldKind::Email,
            Some("uri" | "url") => FieldKind::Uri,
            Some("uuid") => FieldKind::Uuid,
            Some("password") => FieldKind::Password,
            Some("binary") => FieldKind::Binary,
            _ if node
                .constraints
                .max_length
                .is_some_and(|max| max > LONG_TEXT_THRESHOLD) =>
            {
                FieldKind::LongText
            }
            _ => FieldKind::Text,
        },
    }
}

/// True when a property key collapses to "request body", a redundant
/// synthetic wrapper some generators emit, skipped to avoid a pointless
/// nesting level in the form.
fn is_request_body_key(key: &str) -> bool {
    let collapsed: String = key
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase();
    collapsed == "requestbody"
}

/// Human-readable label from a property or parameter name.
fn humanize(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
