//! Schema-driven form and request engine.
//!
//! Turns an OpenAPI-shaped schema document into render-agnostic input
//! forms, validates user input against the schema's constraints, prefills
//! request bodies with generated examples, and reassembles flat input back
//! into nested request payloads.
//!
//! # Example
//!
//! ```
//! use apiform::{Document, Form, ValueEntry};
//! use serde_json::json;
//!
//! let doc = Document::from_value(&json!({
//!     "paths": {
//!         "/pets": {
//!             "post": {
//!                 "requestBody": { "content": { "application/json": { "schema": {
//!                     "type": "object",
//!                     "required": ["name"],
//!                     "properties": {
//!                         "name": { "type": "string" },
//!                         "age": { "type": "integer", "minimum": 0 }
//!                     }
//!                 }}}}
//!             }
//!         }
//!     }
//! })).unwrap();
//!
//! let mut resolver = doc.resolver();
//! let operation = doc.operation("POST /pets").unwrap();
//! let form = Form::build(operation, &mut resolver);
//!
//! // One descriptor per property, required flag from the schema.
//! let body = form.body.as_ref().unwrap();
//! assert_eq!(body.children.len(), 2);
//! assert!(body.children[0].required);
//! assert!(!body.children[1].required);
//!
//! // Live validation recovers failures as data, never errors.
//! let check = form.validate("age", Some(&json!("abc")));
//! assert_eq!(check.errors, vec!["must be an integer".to_string()]);
//!
//! // Flat input reassembles into the nested payload shape.
//! let payload = form.assemble_body(&[
//!     ValueEntry::new("name", json!("Rex")),
//!     ValueEntry::new("age", json!("3")),
//! ]);
//! assert_eq!(payload, json!({ "name": "Rex", "age": 3 }));
//! ```
//!
//! # Degradation rules
//!
//! The engine never lets a malformed schema document fault it: unresolvable
//! `$ref`s become empty object nodes, unsupported compositions degrade to a
//! best-effort shape, recursion is depth-bounded, and malformed input
//! literals are reported by the validation engine instead of raised.
//!
//! `oneOf`/`anyOf` compositions collapse to the **first** listed
//! alternative. This is a deliberate, documented approximation; no
//! discriminator-aware selection is attempted.

mod assemble;
mod document;
mod error;
mod example;
mod field;
mod node;
mod resolver;
mod rules;
mod validator;

pub use assemble::{Assembler, ValueEntry};
pub use document::{is_url, load_json, Document, Operation, ParamIn, Parameter};
pub use error::{DocumentError, SchemaError, ValidateError};
pub use example::{example, MAX_EXAMPLE_DEPTH};
pub use field::{FieldDescriptor, FieldKind, FieldMeta, Form, ParameterField, RequestParts};
pub use node::{Constraints, Kind, SchemaNode};
pub use resolver::{Resolver, MAX_RESOLVE_DEPTH};
pub use rules::{FieldCheck, RuleSet, ValidationRule};
pub use validator::check_payload;
