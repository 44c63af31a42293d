//! Loading flow definitions from disk.
//!
//! The file holds a JSON array of flows, in the same shape the
//! `/api/v3/flows/instances/` endpoints use.

use std::path::Path;

use ak_core::{Error, Result};
use ak_model::{validate_flow, Flow};

/// Reads and validates the flow definitions in `path`.
///
/// ## Errors
///
/// Returns `Error::Config` if the file cannot be read and
/// `Error::Validation` if it does not parse or a definition is rejected.
pub fn load_flows(path: &Path) -> Result<Vec<Flow>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    parse_flows(&raw)
}

/// Parses and validates a JSON array of flows.
///
/// ## Errors
///
/// Returns `Error::Validation` naming the offending flow.
pub fn parse_flows(raw: &str) -> Result<Vec<Flow>> {
    let flows: Vec<Flow> = serde_json::from_str(raw)
        .map_err(|e| Error::Validation(format!("malformed flow definitions: {e}")))?;

    for flow in &flows {
        validate_flow(flow).map_err(|e| Error::Validation(format!("flow '{}': {e}", flow.slug)))?;
    }

    tracing::debug!(count = flows.len(), "Parsed flow definitions");
    Ok(flows)
}
