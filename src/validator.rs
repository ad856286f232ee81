//! Whole-payload validation of assembled request bodies.

use serde_json::Value;

use crate::error::{DocumentError, SchemaError, ValidateError};
use crate::node::SchemaNode;

/// Validate an assembled payload against a resolved schema node.
///
/// The node is re-serialized to plain JSON Schema and checked with a full
/// validator; every failure is reported with its instance path.
///
/// # Errors
///
/// Returns `ValidateError::Invalid` listing each violation, or a document
/// error if the node does not compile to a usable schema.
pub fn check_payload(node: &SchemaNode, payload: &Value) -> Result<(), ValidateError> {
    let schema = node.to_schema_json();
    let validator = jsonschema::validator_for(&schema).map_err(|e| {
        ValidateError::Document(DocumentError::InvalidDocument {
            message: e.to_string(),
        })
    })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(payload)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}
