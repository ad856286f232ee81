//! apiform CLI
//!
//! Inspect OpenAPI documents: list operations, print form descriptors,
//! generate example request bodies, and validate payloads.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

use apiform::{check_payload, example, load_json, Document, Form, ValidateError};

#[derive(Parser)]
#[command(name = "apiform")]
#[command(about = "Schema-driven forms and request validation for OpenAPI documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the operations in a document
    Operations {
        /// Document source: file path or URL (http:// or https://)
        document: String,

        /// Output as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Print the field descriptor tree for an operation
    Form {
        /// Document source: file path or URL
        document: String,

        /// Operation key, e.g. "POST /pets"
        #[arg(long)]
        op: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Generate an example request body for an operation
    Example {
        /// Document source: file path or URL
        document: String,

        /// Operation key, e.g. "POST /pets"
        #[arg(long)]
        op: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a payload against an operation's request body schema
    Validate {
        /// Document source: file path or URL
        document: String,

        /// Payload file to validate
        payload: PathBuf,

        /// Operation key, e.g. "POST /pets"
        #[arg(long)]
        op: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Operations { document, json } => run_operations(&document, json),
        Commands::Form {
            document,
            op,
            output,
            pretty,
        } => run_form(&document, &op, output, pretty),
        Commands::Example {
            document,
            op,
            output,
            pretty,
        } => run_example(&document, &op, output, pretty),
        Commands::Validate {
            document,
            payload,
            op,
            json,
        } => run_validate(&document, &payload, &op, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_document(source: &str) -> Result<Document, u8> {
    Document::load_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn lookup_operation<'d>(doc: &'d Document, key: &str) -> Result<&'d apiform::Operation, u8> {
    doc.operation(key).ok_or_else(|| {
        eprintln!("Error: unknown operation: {}", key);
        2u8
    })
}

fn run_operations(source: &str, json: bool) -> Result<(), u8> {
    let doc = load_document(source)?;

    if json {
        let listed: Vec<Value> = doc
            .operations()
            .iter()
            .map(|op| {
                serde_json::json!({
                    "method": op.method,
                    "path": op.path,
                    "operationId": op.operation_id,
                    "summary": op.summary,
                })
            })
            .collect();
        println!("{}", Value::Array(listed));
    } else {
        for op in doc.operations() {
            match &op.summary {
                Some(summary) => println!("{} - {}", op.key(), summary),
                None => println!("{}", op.key()),
            }
        }
    }
    Ok(())
}

fn run_form(source: &str, op: &str, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let doc = load_document(source)?;
    let operation = lookup_operation(&doc, op)?;
    let mut resolver = doc.resolver();
    let form = Form::build(operation, &mut resolver);

    let rendered = if pretty {
        serde_json::to_string_pretty(&form)
    } else {
        serde_json::to_string(&form)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    write_output(output, &rendered)
}

fn run_example(source: &str, op: &str, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let doc = load_document(source)?;
    let operation = lookup_operation(&doc, op)?;
    let Some(body_schema) = &operation.request_body else {
        eprintln!("Error: operation has no request body: {}", op);
        return Err(2);
    };
    let mut resolver = doc.resolver();
    let node = resolver.resolve(body_schema);
    let generated = example(&node, 0);

    let rendered = if pretty {
        serde_json::to_string_pretty(&generated)
    } else {
        serde_json::to_string(&generated)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    write_output(output, &rendered)
}

fn run_validate(source: &str, payload_path: &Path, op: &str, json: bool) -> Result<(), u8> {
    let payload = load_json(payload_path).map_err(|e| {
        report_error(json, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    let doc = load_document(source)?;
    let operation = lookup_operation(&doc, op)?;
    let Some(body_schema) = &operation.request_body else {
        report_error(json, &format!("operation has no request body: {}", op));
        return Err(2);
    };
    let mut resolver = doc.resolver();
    let node = resolver.resolve(body_schema);

    match check_payload(&node, &payload) {
        Ok(()) => {
            if json {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(ValidateError::Document(e)) => {
            report_error(json, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

fn write_output(output: Option<PathBuf>, rendered: &str) -> Result<(), u8> {
    match output {
        Some(path) => std::fs::write(&path, rendered).map_err(|e| {
            eprintln!("Error writing to {}: {}", path.display(), e);
            3u8
        }),
        None => {
            println!("{}", rendered);
            Ok(())
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!(r#"{{"valid":false,"error":"{}"}}"#, msg);
    } else {
        eprintln!("Error: {}", msg);
    }
}
