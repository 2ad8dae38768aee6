//! Discovery Model CLI
//!
//! Command-line interface for inspecting discovery documents, validating
//! request bodies and unwrapping responses.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use discovery_model::{
    get_string, load_document, load_document_auto, to_json_schema, validate_request,
    DiscoveryError, Resource, ResourceMap, Service, ServiceParams, ValidateError,
};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "discovery-model")]
#[command(about = "Inspect discovery documents and decode API payloads")]
#[command(version)]
struct Cli {
    /// Log model construction to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DocumentArgs {
    /// Discovery document: file path or URL (http:// or https://)
    document: String,

    /// Server URL (default: the document's rootUrl)
    #[arg(long)]
    server_url: Option<String>,

    /// Base path overriding the document's basePath/restBasePath
    #[arg(long)]
    base_path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print service metadata and the resource tree
    Inspect {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one method descriptor as JSON
    Method {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Dot-separated resource path (e.g. projects.instances)
        resource: String,

        /// Method name (e.g. get)
        method: String,
    },

    /// Resolve the document's schemas
    Schemas {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Print one schema compiled to JSON Schema instead of listing names
        #[arg(long)]
        name: Option<String>,
    },

    /// Validate a request body against a method's request schema
    Validate {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Dot-separated resource path
        resource: String,

        /// Method name
        method: String,

        /// Request body file
        payload: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Decode a response body using the service's envelope format
    Unwrap {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Response body file
        response: PathBuf,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Inspect { doc, json } => run_inspect(&doc, json),
        Commands::Method {
            doc,
            resource,
            method,
        } => run_method(&doc, &resource, &method),
        Commands::Schemas { doc, name } => run_schemas(&doc, name.as_deref()),
        Commands::Validate {
            doc,
            resource,
            method,
            payload,
            json,
        } => run_validate(&doc, &resource, &method, &payload, json),
        Commands::Unwrap {
            doc,
            response,
            pretty,
        } => run_unwrap(&doc, &response, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print an error and turn it into an exit code.
fn fail(e: DiscoveryError) -> u8 {
    eprintln!("Error: {}", e);
    e.exit_code() as u8
}

fn load_service(args: &DocumentArgs) -> Result<Service, u8> {
    let document = load_document_auto(&args.document).map_err(fail)?;

    let server_url = match &args.server_url {
        Some(url) => url.clone(),
        None => get_string(&document, "rootUrl")
            .map_err(fail)?
            .ok_or_else(|| {
                fail(DiscoveryError::validation(
                    "document has no rootUrl; pass --server-url",
                ))
            })?,
    };

    let mut params = ServiceParams::new(server_url);
    if let Some(base_path) = &args.base_path {
        params = params.base_path(base_path.clone());
    }

    let service = Service::from_document(document, params).map_err(fail)?;
    info!(service = service.name(), version = service.version(), "loaded service");
    Ok(service)
}

fn run_inspect(args: &DocumentArgs, json_output: bool) -> Result<(), u8> {
    let service = load_service(args)?;
    let resources = service.resources().map_err(fail)?;

    if json_output {
        let output = json!({
            "name": service.name(),
            "version": service.version(),
            "discoveryVersion": service.discovery_version(),
            "title": service.title(),
            "baseUri": service.base_uri().as_str(),
            "features": service.features(),
            "resources": resources,
        });
        println!("{}", output);
        return Ok(());
    }

    println!(
        "{} {} (discovery {})",
        service.name(),
        service.version(),
        service.discovery_version()
    );
    if let Some(title) = service.title() {
        println!("  title: {}", title);
    }
    println!("  base URI: {}", service.base_uri());
    if !service.features().is_empty() {
        println!("  features: {}", service.features().join(", "));
    }
    println!("resources:");
    print_resources(resources, 1);

    Ok(())
}

fn print_resources(resources: &ResourceMap, depth: usize) {
    for resource in resources.values() {
        print_resource(resource, depth);
    }
}

fn print_resource(resource: &Resource, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}{}", indent, resource.name());
    for method in resource.methods().values() {
        println!(
            "{}  {} {} {}",
            indent, method.name, method.http_method, method.path
        );
    }
    print_resources(resource.resources(), depth + 1);
}

fn run_method(args: &DocumentArgs, resource: &str, method: &str) -> Result<(), u8> {
    let service = load_service(args)?;
    let found = service.resolve_method(resource, method).map_err(fail)?;

    let output = serde_json::to_string_pretty(found).map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}

fn run_schemas(args: &DocumentArgs, name: Option<&str>) -> Result<(), u8> {
    let service = load_service(args)?;
    let schemas = service.schemas().map_err(fail)?;

    match name {
        Some(name) => {
            let compiled = to_json_schema(schemas, name).map_err(fail)?;
            let output = serde_json::to_string_pretty(&compiled).map_err(|e| {
                eprintln!("Error serializing output: {}", e);
                2u8
            })?;
            println!("{}", output);
        }
        None => {
            for schema_name in schemas.names() {
                println!("{}", schema_name);
            }
        }
    }
    Ok(())
}

fn run_validate(
    args: &DocumentArgs,
    resource: &str,
    method: &str,
    payload_path: &Path,
    json_output: bool,
) -> Result<(), u8> {
    let service = load_service(args)?;
    let payload = load_document(payload_path).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    match validate_request(&service, resource, method, &payload) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = json!({
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
        Err(ValidateError::Discovery(e)) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_unwrap(args: &DocumentArgs, response_path: &Path, pretty: bool) -> Result<(), u8> {
    let service = load_service(args)?;
    let file = File::open(response_path).map_err(|source| {
        fail(DiscoveryError::ReadError {
            path: response_path.to_path_buf(),
            source,
        })
    })?;

    let payload: Value = service.deserialize_response(file).map_err(fail)?;

    let output = if pretty {
        serde_json::to_string_pretty(&payload)
    } else {
        serde_json::to_string(&payload)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}
