//! `pagesnap validate` command.
//!
//! Runs a raw request through the same validation and selector resolution a
//! scheduler submission goes through, without rendering anything, and prints
//! the resulting job specification and locate plan as JSON.

use std::fs;
use std::io;
use std::path::Path;

use serde_json::{json, Value};
use tracing::info;

use pagesnap::config::ConfigFile;
use pagesnap::job::{validate, RawRequest};
use pagesnap::logging::init_from_settings;
use pagesnap::selector::resolve;

use crate::error::CliError;

/// Run the validate command.
pub fn run(request: &Path, compact: bool, verbose: bool) -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let _logging = init_from_settings(&config.logging, verbose)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let body = read_request(request)?;
    let plan = plan_request(&body)?;
    info!(request = %request.display(), "Request is valid");

    let rendered = if compact {
        serde_json::to_string(&plan)
    } else {
        serde_json::to_string_pretty(&plan)
    }
    .map_err(CliError::Parse)?;
    println!("{}", rendered);

    Ok(())
}

fn read_request(path: &Path) -> Result<String, CliError> {
    let read = if path.as_os_str() == "-" {
        io::read_to_string(io::stdin())
    } else {
        fs::read_to_string(path)
    };
    read.map_err(|error| CliError::FileRead {
        path: path.to_path_buf(),
        error,
    })
}

/// Parses and validates a request body, returning `{ "spec", "plan" }`.
fn plan_request(body: &str) -> Result<Value, CliError> {
    let raw: RawRequest = serde_json::from_str(body).map_err(CliError::Parse)?;
    let spec = validate(&raw)?;
    let plan = resolve(spec.selector.as_ref()).map_err(|e| CliError::Validation(e.into()))?;

    Ok(json!({
        "spec": spec,
        "plan": plan,
    }))
}
