//! Canonical error taxonomy for Safehold operations
//!
//! Phase outcomes inside the verification pipeline are data
//! (`PhaseResult`), never errors. `SafeholdError` covers the cases the
//! router translates into an aborted command, plus infrastructure
//! failures (I/O, serialization). Each variant carries a stable `ERR_*`
//! code for programmatic handling and external API responses.

use thiserror::Error;

/// Result type alias using SafeholdError
pub type Result<T> = std::result::Result<T, SafeholdError>;

/// Comprehensive error taxonomy for Safehold operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SafeholdError {
    // ===== Safety pipeline =====
    /// PreFlight denied the action before any mutation occurred
    #[error("Policy violation: {}", violations.join("; "))]
    PolicyViolation { violations: Vec<String> },

    /// The disposable-transaction undo did not restore the exact pre-state
    #[error("Rollback proof failed: expected {expected} entities after undo, got {actual}")]
    RollbackProofFailure { expected: usize, actual: usize },

    /// The handler reported failure on the real (durable) run
    #[error("Handler failed: {message}")]
    HandlerFailure { message: String },

    // ===== Transactions =====
    /// A transaction is already open (nesting corrupts the undo history)
    #[error("Transaction already open: {label}")]
    TransactionAlreadyOpen { label: String },

    /// Commit/cancel was requested with no transaction open
    #[error("No transaction is open")]
    TransactionNotOpen,

    // ===== Snapshots =====
    /// Snapshot file not found or unreadable
    #[error("Snapshot not found: {path}")]
    SnapshotNotFound { path: String },

    // ===== Protocol =====
    /// Request was structurally invalid (missing cmd, malformed JSON, ...)
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Command name is not in the registry and is not a meta command
    #[error("Unknown command: {cmd}")]
    UnknownCommand { cmd: String },

    // ===== Infrastructure =====
    /// I/O error (policy document, snapshot file, world file)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error (programmer errors surfaced in release builds)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SafeholdError {
    /// Get the stable error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            SafeholdError::PolicyViolation { .. } => "ERR_POLICY_VIOLATION",
            SafeholdError::RollbackProofFailure { .. } => "ERR_ROLLBACK_PROOF",
            SafeholdError::HandlerFailure { .. } => "ERR_HANDLER_FAILURE",
            SafeholdError::TransactionAlreadyOpen { .. } => "ERR_TRANSACTION_ALREADY_OPEN",
            SafeholdError::TransactionNotOpen => "ERR_TRANSACTION_NOT_OPEN",
            SafeholdError::SnapshotNotFound { .. } => "ERR_SNAPSHOT_NOT_FOUND",
            SafeholdError::InvalidRequest { .. } => "ERR_INVALID_REQUEST",
            SafeholdError::UnknownCommand { .. } => "ERR_UNKNOWN_COMMAND",
            SafeholdError::Io { .. } => "ERR_IO",
            SafeholdError::Serialization { .. } => "ERR_SERIALIZATION",
            SafeholdError::Internal { .. } => "ERR_INTERNAL",
        }
    }
}

/// Conversion from std::io::Error to SafeholdError
impl From<std::io::Error> for SafeholdError {
    fn from(err: std::io::Error) -> Self {
        SafeholdError::Io {
            message: err.to_string(),
        }
    }
}

/// Conversion from serde_json::Error to SafeholdError
impl From<serde_json::Error> for SafeholdError {
    fn from(err: serde_json::Error) -> Self {
        SafeholdError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let cases = [
            (
                SafeholdError::PolicyViolation { violations: vec![] },
                "ERR_POLICY_VIOLATION",
            ),
            (
                SafeholdError::RollbackProofFailure {
                    expected: 3,
                    actual: 4,
                },
                "ERR_ROLLBACK_PROOF",
            ),
            (
                SafeholdError::HandlerFailure {
                    message: "boom".to_string(),
                },
                "ERR_HANDLER_FAILURE",
            ),
            (SafeholdError::TransactionNotOpen, "ERR_TRANSACTION_NOT_OPEN"),
            (
                SafeholdError::UnknownCommand {
                    cmd: "frobnicate".to_string(),
                },
                "ERR_UNKNOWN_COMMAND",
            ),
        ];
        for (err, expected_code) in cases {
            assert_eq!(err.code(), expected_code, "Wrong code for {:?}", err);
        }
    }

    #[test]
    fn test_policy_violation_display_joins_violations() {
        let err = SafeholdError::PolicyViolation {
            violations: vec!["[RULE_000] no reactors".to_string(), "[RULE_001] x".to_string()],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("[RULE_000] no reactors; [RULE_001] x"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SafeholdError = io_err.into();
        assert_eq!(err.code(), "ERR_IO");
    }
}
