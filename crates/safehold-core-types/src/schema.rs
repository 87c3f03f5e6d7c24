//! Canonical schema constants for the command protocol and structured logging
//!
//! These constants ensure consistency across the router, the verification
//! engine and error reporting.

// Command protocol field keys
pub const FIELD_CMD: &str = "cmd";
pub const FIELD_ARGS: &str = "args";
pub const FIELD_OK: &str = "ok";
pub const FIELD_ERROR: &str = "error";

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Entity identifiers
pub const FIELD_ENTITY_LABEL: &str = "entity_label";
pub const FIELD_ENTITY_COUNT: &str = "entity_count";

// Verification phase fields
pub const FIELD_PHASE: &str = "phase";
pub const FIELD_PASSED: &str = "passed";
pub const FIELD_EXPECTED_DELTA: &str = "expected_delta";
pub const FIELD_ACTUAL_DELTA: &str = "actual_delta";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
