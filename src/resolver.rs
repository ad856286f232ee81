//! Schema resolution: `$ref` dereferencing and composition collapse.
//!
//! The resolver turns raw schema fragments into [`SchemaNode`] trees.
//! Resolution is eager (the whole subtree is resolved at once), memoized,
//! and depth-bounded so self-referential `$ref` graphs terminate.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::node::{Constraints, Kind, SchemaNode};

/// Maximum recursion depth before resolution degrades to an empty node.
pub const MAX_RESOLVE_DEPTH: usize = 8;

/// Resolves raw schema fragments against a document's named-schema registry.
///
/// Owns the memoization cache for one loaded document. Loading a new
/// document must go through [`Resolver::clear`] (or a fresh resolver);
/// there is no partial invalidation.
///
/// `oneOf`/`anyOf` are collapsed to the **first** listed alternative. This
/// mirrors the form engine's behavior and is a documented approximation;
/// no discriminator-aware selection is attempted.
#[derive(Debug, Default)]
pub struct Resolver {
    registry: Map<String, Value>,
    cache: HashMap<String, SchemaNode>,
}

impl Resolver {
    /// Create a resolver over a named-schema registry
    /// (`components.schemas` of an OpenAPI document).
    pub fn new(registry: Map<String, Value>) -> Self {
        Resolver {
            registry,
            cache: HashMap::new(),
        }
    }

    /// Resolve a raw schema fragment into a concrete node.
    ///
    /// Never fails: unresolvable references and malformed fragments degrade
    /// to an empty object node ("no further structure known").
    pub fn resolve(&mut self, raw: &Value) -> SchemaNode {
        let (node, _) = self.resolve_at(raw, 0);
        node
    }

    /// Drop all memoized results. Call when a new document is loaded.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Resolve at the given depth. The second element is false when the
    /// subtree was truncated by the depth bound; truncated results are
    /// never cached so a partial node cannot shadow the full one.
    fn resolve_at(&mut self, raw: &Value, depth: usize) -> (SchemaNode, bool) {
        if depth >= MAX_RESOLVE_DEPTH {
            trace!(depth, "depth bound reached, degrading to empty node");
            return (SchemaNode::empty_object(), false);
        }
        let Some(map) = raw.as_object() else {
            return (SchemaNode::empty_object(), true);
        };

        let fingerprint = raw.to_string();
        if let Some(hit) = self.cache.get(&fingerprint) {
            trace!("resolver cache hit");
            return (hit.clone(), true);
        }

        let (node, complete) = if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            self.resolve_ref(reference, depth)
        } else if let Some(members) = map.get("allOf").and_then(Value::as_array) {
            self.resolve_all_of(map, members, depth)
        } else if let Some(first) = first_alternative(map) {
            self.resolve_at(first, depth + 1)
        } else {
            self.resolve_plain(map, depth)
        };

        if complete {
            self.cache.insert(fingerprint, node.clone());
        }
        (node, complete)
    }

    fn resolve_ref(&mut self, reference: &str, depth: usize) -> (SchemaNode, bool) {
        let Some(name) = schema_name(reference) else {
            debug!(reference, "unsupported reference form, degrading to empty node");
            return (SchemaNode::empty_object(), true);
        };
        let Some(target) = self.registry.get(name).cloned() else {
            debug!(name, "unresolvable reference, degrading to empty node");
            return (SchemaNode::empty_object(), true);
        };
        self.resolve_at(&target, depth + 1)
    }

    /// Structural `allOf` merge: properties unioned with later members
    /// winning on key conflict, required unioned, scalar keys overwritten
    /// left-to-right. Inline keys on the host node overlay last.
    fn resolve_all_of(
        &mut self,
        host: &Map<String, Value>,
        members: &[Value],
        depth: usize,
    ) -> (SchemaNode, bool) {
        let mut merged = SchemaNode::default();
        let mut complete = true;

        for member in members {
            let (node, ok) = self.resolve_at(member, depth + 1);
            complete &= ok;
            merge_into(&mut merged, node);
        }

        let mut rest = host.clone();
        rest.remove("allOf");
        if !rest.is_empty() {
            let (node, ok) = self.resolve_plain(&rest, depth);
            complete &= ok;
            merge_into(&mut merged, node);
        }

        if merged.kind == Kind::Unresolved && !merged.properties.is_empty() {
            merged.kind = Kind::Object;
        }
        (merged, complete)
    }

    fn resolve_plain(&mut self, map: &Map<String, Value>, depth: usize) -> (SchemaNode, bool) {
        let mut complete = true;

        let mut properties = Vec::new();
        if let Some(props) = map.get("properties").and_then(Value::as_object) {
            for (name, raw_child) in props {
                let (child, ok) = self.resolve_at(raw_child, depth + 1);
                complete &= ok;
                properties.push((name.clone(), child));
            }
        }

        let items = match map.get("items") {
            Some(raw_items) => {
                let (item, ok) = self.resolve_at(raw_items, depth + 1);
                complete &= ok;
                Some(Box::new(item))
            }
            None => None,
        };

        let node = SchemaNode {
            kind: declared_kind(map, &properties, &items),
            properties,
            items,
            required: map
                .get("required")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
            enum_values: map
                .get("enum")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            format: map
                .get("format")
                .and_then(Value::as_str)
                .map(String::from),
            constraints: Constraints::from_schema(map),
            default_value: map.get("default").cloned(),
            example: map.get("example").cloned(),
            description: map
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
        };
        (node, complete)
    }
}

/// Determine the node kind from `type`, falling back to structural hints.
fn declared_kind(
    map: &Map<String, Value>,
    properties: &[(String, SchemaNode)],
    items: &Option<Box<SchemaNode>>,
) -> Kind {
    let declared = match map.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        // Type unions: take the first listed type.
        Some(Value::Array(types)) => types.first().and_then(Value::as_str),
        _ => None,
    };
    match declared {
        Some(t) => Kind::parse(t).unwrap_or(Kind::Unresolved),
        None if !properties.is_empty() || map.contains_key("properties") => Kind::Object,
        None if items.is_some() => Kind::Array,
        None => Kind::Unresolved,
    }
}

/// First alternative of a `oneOf`/`anyOf` composition, if present.
fn first_alternative(map: &Map<String, Value>) -> Option<&Value> {
    ["oneOf", "anyOf"].iter().find_map(|key| {
        map.get(*key)
            .and_then(Value::as_array)
            .and_then(|alts| alts.first())
    })
}

/// Extract the registry name from an internal reference.
fn schema_name(reference: &str) -> Option<&str> {
    reference
        .strip_prefix("#/components/schemas/")
        .or_else(|| reference.strip_prefix("#/definitions/"))
        .or_else(|| reference.strip_prefix("#/$defs/"))
}

/// Merge `src` into `dst`: later values win where both are set.
fn merge_into(dst: &mut SchemaNode, src: SchemaNode) {
    if src.kind != Kind::Unresolved {
        dst.kind = src.kind;
    }
    for (name, node) in src.properties {
        match dst.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = node,
            None => dst.properties.push((name, node)),
        }
    }
    for name in src.required {
        if !dst.required.contains(&name) {
            dst.required.push(name);
        }
    }
    if src.items.is_some() {
        dst.items = src.items;
    }
    if !src.enum_values.is_empty() {
        dst.enum_values = src.enum_values;
    }
    if src.format.is_some() {
        dst.format = src.format;
    }
    if src.constraints.minimum.is_some() {
        dst.constraints.minimum = src.constraints.minimum;
    }
    if src.constraints.maximum.is_some() {
        dst.constraints.maximum = src.constraints.maximum;
    }
    if src.constraints.min_length.is_some() {
        dst.constraints.min_length = src.constraints.min_length;
    }
    if src.constraints.max_length.is_some() {
        dst.constraints.max_length = src.constraints.max_length;
    }
    if src.constraints.pattern.is_some() {
        dst.constraints.pattern = src.constraints.pattern;
    }
    if src.default_value.is_some() {
        dst.default_value = src.default_value;
    }
    if src.example.is_some() {
        dst.example = src.example;
    }
    if src.description.is_some() {
        dst.description = src.description;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(schemas: Value) -> Map<String, Value> {
        schemas.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn resolve_plain_object() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string", "maxLength": 20 },
                "age": { "type": "integer" }
            }
        }));
        assert_eq!(node.kind, Kind::Object);
        assert_eq!(node.properties.len(), 2);
        assert_eq!(node.properties[0].0, "name");
        assert_eq!(node.property("age").unwrap().kind, Kind::Integer);
        assert!(node.is_required("name"));
        assert_eq!(node.property("name").unwrap().constraints.max_length, Some(20));
    }

    #[test]
    fn resolve_ref_by_name() {
        let mut resolver = Resolver::new(registry(json!({
            "Pet": { "type": "object", "properties": { "id": { "type": "string" } } }
        })));
        let node = resolver.resolve(&json!({ "$ref": "#/components/schemas/Pet" }));
        assert_eq!(node.kind, Kind::Object);
        assert!(node.property("id").is_some());
    }

    #[test]
    fn resolve_ref_definitions_location() {
        let mut resolver = Resolver::new(registry(json!({
            "Pet": { "type": "string" }
        })));
        let node = resolver.resolve(&json!({ "$ref": "#/definitions/Pet" }));
        assert_eq!(node.kind, Kind::String);
    }

    #[test]
    fn unresolvable_ref_degrades_to_empty_object() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!({ "$ref": "#/components/schemas/Missing" }));
        assert_eq!(node.kind, Kind::Object);
        assert!(node.properties.is_empty());
    }

    #[test]
    fn one_of_takes_first_alternative() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!({
            "oneOf": [
                { "type": "string", "format": "email" },
                { "type": "integer" }
            ]
        }));
        assert_eq!(node.kind, Kind::String);
        assert_eq!(node.format.as_deref(), Some("email"));
    }

    #[test]
    fn any_of_takes_first_alternative() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!({
            "anyOf": [{ "type": "boolean" }, { "type": "string" }]
        }));
        assert_eq!(node.kind, Kind::Boolean);
    }

    #[test]
    fn all_of_unions_properties_later_wins() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!({
            "allOf": [
                {
                    "type": "object",
                    "required": ["a"],
                    "properties": {
                        "a": { "type": "string" },
                        "b": { "type": "string" }
                    }
                },
                {
                    "required": ["b"],
                    "properties": {
                        "b": { "type": "integer" },
                        "c": { "type": "boolean" }
                    }
                }
            ]
        }));
        assert_eq!(node.kind, Kind::Object);
        assert_eq!(node.properties.len(), 3);
        // Later member overrides "b" but keeps its original position.
        assert_eq!(node.properties[1].0, "b");
        assert_eq!(node.property("b").unwrap().kind, Kind::Integer);
        assert!(node.is_required("a"));
        assert!(node.is_required("b"));
    }

    #[test]
    fn all_of_scalar_keys_overwritten_left_to_right() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!({
            "allOf": [
                { "type": "string", "format": "uri", "maxLength": 10 },
                { "format": "uuid" }
            ]
        }));
        assert_eq!(node.kind, Kind::String);
        assert_eq!(node.format.as_deref(), Some("uuid"));
        assert_eq!(node.constraints.max_length, Some(10));
    }

    #[test]
    fn all_of_host_keys_overlay_members() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!({
            "allOf": [{ "type": "object", "properties": { "a": { "type": "string" } } }],
            "description": "combined"
        }));
        assert_eq!(node.description.as_deref(), Some("combined"));
        assert!(node.property("a").is_some());
    }

    #[test]
    fn all_of_through_refs() {
        let mut resolver = Resolver::new(registry(json!({
            "Base": { "type": "object", "required": ["id"], "properties": { "id": { "type": "string" } } },
            "Extra": { "type": "object", "properties": { "note": { "type": "string" } } }
        })));
        let node = resolver.resolve(&json!({
            "allOf": [
                { "$ref": "#/components/schemas/Base" },
                { "$ref": "#/components/schemas/Extra" }
            ]
        }));
        assert!(node.property("id").is_some());
        assert!(node.property("note").is_some());
        assert!(node.is_required("id"));
    }

    #[test]
    fn cyclic_ref_terminates_within_bound() {
        let mut resolver = Resolver::new(registry(json!({
            "Node": {
                "type": "object",
                "properties": {
                    "value": { "type": "string" },
                    "next": { "$ref": "#/components/schemas/Node" }
                }
            }
        })));
        let node = resolver.resolve(&json!({ "$ref": "#/components/schemas/Node" }));
        assert_eq!(node.kind, Kind::Object);
        assert!(node.property("value").is_some());

        // Walk the chain: it must bottom out in an empty node.
        let mut depth = 0;
        let mut current = &node;
        while let Some(next) = current.property("next") {
            if next.properties.is_empty() {
                break;
            }
            current = next;
            depth += 1;
            assert!(depth <= MAX_RESOLVE_DEPTH, "resolution did not terminate");
        }
    }

    #[test]
    fn truncated_results_are_not_cached() {
        let mut resolver = Resolver::new(registry(json!({
            "Node": {
                "type": "object",
                "properties": { "next": { "$ref": "#/components/schemas/Node" } }
            }
        })));
        resolver.resolve(&json!({ "$ref": "#/components/schemas/Node" }));
        // The self-referential fragment hits the bound, so it never enters
        // the cache; only complete subtrees do.
        assert!(!resolver
            .cache
            .contains_key(&json!({ "$ref": "#/components/schemas/Node" }).to_string()));
    }

    #[test]
    fn identical_fragments_are_memoized() {
        let mut resolver = Resolver::new(registry(json!({
            "Tag": { "type": "string" }
        })));
        let fragment = json!({ "$ref": "#/components/schemas/Tag" });
        resolver.resolve(&fragment);
        let cached = resolver.cache.len();
        assert!(cached > 0);
        resolver.resolve(&fragment);
        assert_eq!(resolver.cache.len(), cached);
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut resolver = Resolver::default();
        resolver.resolve(&json!({ "type": "string" }));
        assert!(!resolver.cache.is_empty());
        resolver.clear();
        assert!(resolver.cache.is_empty());
    }

    #[test]
    fn type_union_takes_first() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!({ "type": ["string", "null"] }));
        assert_eq!(node.kind, Kind::String);
    }

    #[test]
    fn missing_type_with_properties_is_object() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!({
            "properties": { "x": { "type": "string" } }
        }));
        assert_eq!(node.kind, Kind::Object);
    }

    #[test]
    fn non_object_fragment_degrades() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!(true));
        assert_eq!(node, SchemaNode::empty_object());
    }

    #[test]
    fn enum_and_metadata_carried_through() {
        let mut resolver = Resolver::default();
        let node = resolver.resolve(&json!({
            "type": "string",
            "enum": ["red", "green"],
            "default": "red",
            "example": "green",
            "description": "a color"
        }));
        assert_eq!(node.enum_values, vec![json!("red"), json!("green")]);
        assert_eq!(node.default_value, Some(json!("red")));
        assert_eq!(node.example, Some(json!("green")));
        assert_eq!(node.description.as_deref(), Some("a color"));
    }
}
