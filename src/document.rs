//! Loading and indexing OpenAPI-shaped schema documents.
//!
//! A loaded [`Document`] exposes the two things the engine consumes:
//! the named-schema registry (`components.schemas`, with the older
//! `definitions` location supported) and the flattened operation list
//! derived from `paths`.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::DocumentError;
use crate::resolver::Resolver;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP methods recognized as operations inside a path item.
const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "patch", "head", "options"];

/// Where a parameter is carried on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamIn {
    Path,
    Query,
    Header,
}

impl ParamIn {
    /// Parse an OpenAPI `in` value. Unsupported locations (e.g. `cookie`)
    /// return `None` and the parameter is skipped.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(ParamIn::Path),
            "query" => Some(ParamIn::Query),
            "header" => Some(ParamIn::Header),
            _ => None,
        }
    }
}

/// One operation parameter with its raw schema fragment.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParamIn,
    pub required: bool,
    pub description: Option<String>,
    pub schema: Value,
}

/// One operation: an HTTP method on a path.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Uppercase HTTP method.
    pub method: String,
    pub path: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    /// Path-item parameters merged with operation-level parameters.
    pub parameters: Vec<Parameter>,
    /// Raw `requestBody.content["application/json"].schema` fragment.
    pub request_body: Option<Value>,
}

impl Operation {
    /// Lookup key, e.g. `"POST /pets"`.
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// A parsed schema document.
#[derive(Debug, Clone)]
pub struct Document {
    schemas: Map<String, Value>,
    operations: Vec<Operation>,
}

impl Document {
    /// Index an already-parsed document value.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::InvalidDocument` if the document has no
    /// `paths` mapping.
    pub fn from_value(raw: &Value) -> Result<Document, DocumentError> {
        let paths = raw
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| DocumentError::InvalidDocument {
                message: "missing paths".into(),
            })?;

        let schemas = raw
            .pointer("/components/schemas")
            .or_else(|| raw.get("definitions"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut operations = Vec::new();
        for (path, item) in paths {
            let Some(item) = item.as_object() else {
                continue;
            };
            let shared = parse_parameters(item.get("parameters"));
            for method in HTTP_METHODS {
                let Some(op) = item.get(*method).and_then(Value::as_object) else {
                    continue;
                };
                let mut parameters = shared.clone();
                parameters.extend(parse_parameters(op.get("parameters")));
                operations.push(Operation {
                    method: method.to_uppercase(),
                    path: path.clone(),
                    operation_id: string_field(op, "operationId"),
                    summary: string_field(op, "summary"),
                    parameters,
                    request_body: op
                        .get("requestBody")
                        .and_then(|b| b.pointer("/content/application~1json/schema"))
                        .cloned(),
                });
            }
        }
        debug!(
            operations = operations.len(),
            schemas = schemas.len(),
            "document indexed"
        );

        Ok(Document {
            schemas,
            operations,
        })
    }

    /// Parse a document from a JSON string.
    pub fn from_json(content: &str) -> Result<Document, DocumentError> {
        let raw: Value = serde_json::from_str(content)
            .map_err(|source| DocumentError::InvalidJson { source })?;
        Document::from_value(&raw)
    }

    /// Load a document from a file path.
    pub fn from_path(path: &Path) -> Result<Document, DocumentError> {
        Document::from_value(&load_json(path)?)
    }

    /// Fetch a document from an HTTP/HTTPS URL.
    ///
    /// Requires the `remote` feature (enabled by default). This is the one
    /// external boundary: a fetch failure is a hard error and the engine
    /// does no work until a document loads.
    #[cfg(feature = "remote")]
    pub fn from_url(url: &str) -> Result<Document, DocumentError> {
        let network = |source| DocumentError::NetworkError {
            url: url.to_string(),
            source,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(network)?;
        let response = client.get(url).send().map_err(network)?;
        let response = response.error_for_status().map_err(network)?;
        let raw: Value = response.json().map_err(network)?;
        Document::from_value(&raw)
    }

    /// Load from a file path or URL, sniffing which one the source is.
    pub fn load_auto(source: &str) -> Result<Document, DocumentError> {
        if is_url(source) {
            #[cfg(feature = "remote")]
            {
                Document::from_url(source)
            }
            #[cfg(not(feature = "remote"))]
            {
                Err(DocumentError::FileNotFound {
                    path: std::path::PathBuf::from(source),
                })
            }
        } else {
            Document::from_path(Path::new(source))
        }
    }

    /// The named-schema registry used for `$ref` resolution.
    pub fn schemas(&self) -> &Map<String, Value> {
        &self.schemas
    }

    /// All operations in document order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Look up an operation by `"METHOD /path"` key (method case-insensitive).
    pub fn operation(&self, key: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.key().eq_ignore_ascii_case(key))
    }

    /// A fresh resolver over this document's schema registry.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.schemas.clone())
    }
}

/// Read and parse a JSON file (documents and payloads alike).
pub fn load_json(path: &Path) -> Result<Value, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| DocumentError::InvalidJson { source })
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn parse_parameters(raw: Option<&Value>) -> Vec<Parameter> {
    let Some(list) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|param| {
            let map = param.as_object()?;
            let name = string_field(map, "name")?;
            let location = ParamIn::parse(map.get("in").and_then(Value::as_str)?)?;
            Some(Parameter {
                // Path parameters are always required, whatever the flag says.
                required: location == ParamIn::Path
                    || map.get("required").and_then(Value::as_bool).unwrap_or(false),
                name,
                location,
                description: string_field(map, "description"),
                schema: map.get("schema").cloned().unwrap_or_else(|| Value::Object(Map::new())),
            })
        })
        .collect()
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(String::from)
}
