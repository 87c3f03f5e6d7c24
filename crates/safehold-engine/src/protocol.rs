//! Command protocol types
//!
//! Requests are `{cmd: string, args: object}`; responses are JSON objects
//! with `ok: true` plus command-specific fields, or `{ok: false, error}`.
//! Handler outcomes use a sentinel: the presence of an `error` key marks
//! failure. The router and the verification engine treat that sentinel as
//! the handler's only outcome signal.

use serde::Deserialize;
use serde_json::{json, Value};

use safehold_core::errors::{Result, SafeholdError};
use safehold_core_types::schema::{FIELD_ERROR, FIELD_OK};

/// One inbound command request
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// Command identifier (normalized to lowercase)
    pub cmd: String,
    /// Command-specific arguments; defaults to an empty object
    #[serde(default = "empty_args")]
    pub args: Value,
}

fn empty_args() -> Value {
    json!({})
}

impl CommandRequest {
    /// Create a request with explicit arguments
    pub fn new(cmd: impl Into<String>, args: Value) -> Self {
        Self {
            cmd: cmd.into().to_lowercase(),
            args,
        }
    }

    /// Create a request with no arguments
    pub fn bare(cmd: impl Into<String>) -> Self {
        Self::new(cmd, empty_args())
    }

    /// Parse a request from a JSON string
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the JSON is malformed, `cmd` is missing
    /// or empty, or `args` is present but not an object.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut request: CommandRequest =
            serde_json::from_str(raw).map_err(|e| SafeholdError::InvalidRequest {
                reason: format!("Invalid JSON: {}", e),
            })?;
        if request.cmd.is_empty() {
            return Err(SafeholdError::InvalidRequest {
                reason: "Missing 'cmd' field".to_string(),
            });
        }
        if !request.args.is_object() {
            return Err(SafeholdError::InvalidRequest {
                reason: "'args' must be an object".to_string(),
            });
        }
        request.cmd = request.cmd.to_lowercase();
        Ok(request)
    }
}

/// Build a success response, merging `ok: true` into the given fields
pub fn ok_response(mut fields: Value) -> Value {
    if let Some(map) = fields.as_object_mut() {
        map.insert(FIELD_OK.to_string(), Value::Bool(true));
        return fields;
    }
    json!({ FIELD_OK: true })
}

/// Build a failure response
pub fn error_response(message: impl Into<String>) -> Value {
    json!({ FIELD_OK: false, FIELD_ERROR: message.into() })
}

/// Sentinel check: a handler outcome is a failure iff it carries an
/// `error` key
pub fn is_error(outcome: &Value) -> bool {
    outcome.get(FIELD_ERROR).is_some()
}
