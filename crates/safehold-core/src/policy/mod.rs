//! Declarative policy engine
//!
//! Loads governance rules from a plain-text policy document and validates
//! free-text action descriptions against them before any mutation runs.
//! Rules are immutable once parsed and replaced wholesale on reload.
//!
//! Failure mode is fail-open: an unreadable document leaves the engine with
//! zero rules and every action allowed. The load failure is surfaced as an
//! error to the caller and logged, so the degradation is visible.

pub mod parser;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{Result, SafeholdError};

/// One declarative policy rule
///
/// Immutable once parsed. All rules are blocking in v1 - there are no
/// severity tiers, which is a documented limitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Stable identifier within one load (`RULE_000`, `RULE_001`, ...)
    pub id: String,
    /// The full bullet text the rule was parsed from
    pub description: String,
    /// Lower-cased substrings whose presence in an action description
    /// causes this rule to match
    pub trigger_terms: BTreeSet<String>,
    /// Whether a match blocks the action (always true in v1)
    pub blocking: bool,
}

/// Outcome of validating one action description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    /// True if no blocking rule matched
    pub allowed: bool,
    /// One `[RULE_nnn] description` line per matching rule, in rule order
    pub violations: Vec<String>,
}

impl PolicyDecision {
    /// The implicit-allow decision (no rules loaded, or nothing matched)
    pub fn allow() -> Self {
        Self {
            allowed: true,
            violations: Vec::new(),
        }
    }
}

/// Policy engine holding the currently loaded rule set
#[derive(Debug, Default)]
pub struct PolicyEngine {
    rules: Vec<Rule>,
    loaded_path: Option<PathBuf>,
}

impl PolicyEngine {
    /// Create an engine with no rules (implicit allow)
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            loaded_path: None,
        }
    }

    /// Number of currently loaded rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// True if at least one rule is loaded
    pub fn is_loaded(&self) -> bool {
        !self.rules.is_empty()
    }

    /// Path of the document the current rules came from, if any
    pub fn loaded_path(&self) -> Option<&Path> {
        self.loaded_path.as_deref()
    }

    /// Currently loaded rules
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Replace the rule set from a document string, returning the rule count
    pub fn load_str(&mut self, document: &str) -> usize {
        self.rules = parser::parse_document(document);
        self.loaded_path = None;
        debug!(rule_count = self.rules.len(), "Policy document parsed");
        self.rules.len()
    }

    /// Replace the rule set from a document file, returning the rule count
    ///
    /// On read failure the engine keeps zero rules and continues fail-open;
    /// the error is returned so callers can decide whether to escalate.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let document = std::fs::read_to_string(path).map_err(|e| {
            self.rules.clear();
            self.loaded_path = None;
            warn!(path = %path.display(), error = %e, "Failed to read policy document, continuing with zero rules (fail-open)");
            SafeholdError::Io {
                message: format!("Failed to read policy document {}: {}", path.display(), e),
            }
        })?;
        let count = self.load_str(&document);
        self.loaded_path = Some(path.to_path_buf());
        Ok(count)
    }

    /// Load the first candidate path that yields at least one rule
    ///
    /// Returns the winning path, or `None` if no candidate produced rules.
    pub fn autoload(&mut self, candidates: &[PathBuf]) -> Option<PathBuf> {
        for path in candidates {
            match self.load_file(path) {
                Ok(count) if count > 0 => {
                    debug!(path = %path.display(), rule_count = count, "Policy autoloaded");
                    return Some(path.clone());
                }
                _ => continue,
            }
        }
        None
    }

    /// Validate an action description against the loaded rules
    ///
    /// Denial occurs if the lower-cased action contains any trigger term of
    /// any rule; every matching rule is reported, one violation per rule.
    /// No rules loaded means implicit allow.
    pub fn validate(&self, action_description: &str) -> PolicyDecision {
        let action_lower = action_description.to_lowercase();
        let mut violations = Vec::new();

        for rule in &self.rules {
            let matched = rule
                .trigger_terms
                .iter()
                .any(|term| action_lower.contains(term.as_str()));
            if matched {
                violations.push(format!("[{}] {}", rule.id, rule.description));
            }
        }

        // All rules are blocking in v1, so any violation denies.
        let allowed = violations.is_empty();
        if !allowed {
            warn!(
                action = %action_description,
                violation_count = violations.len(),
                "Action denied by policy"
            );
        }
        PolicyDecision {
            allowed,
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# Project Policy

Some prose that is not a rule.

## Non-negotiable Rules

- Never delete the `reactor` core
- Avoid touching lighting presets without approval

## Background

- This bullet is outside a rule section and must be ignored
";

    #[test]
    fn test_load_str_counts_rules() {
        let mut engine = PolicyEngine::new();
        let count = engine.load_str(DOC);
        assert_eq!(count, 2);
        assert!(engine.is_loaded());
    }

    #[test]
    fn test_reactor_rule_denies_with_one_violation() {
        let mut engine = PolicyEngine::new();
        engine.load_str(DOC);

        let decision = engine.validate("remove the reactor core");
        assert!(!decision.allowed);
        assert_eq!(decision.violations.len(), 1);
        assert!(decision.violations[0].starts_with("[RULE_000]"));
    }

    #[test]
    fn test_unrelated_action_allowed() {
        let mut engine = PolicyEngine::new();
        engine.load_str(DOC);

        let decision = engine.validate("paint the wall");
        assert!(decision.allowed);
        assert!(decision.violations.is_empty());
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let mut engine = PolicyEngine::new();
        engine.load_str(DOC);

        let decision = engine.validate("Shut down the REACTOR now");
        assert!(!decision.allowed);
    }

    #[test]
    fn test_no_rules_implicit_allow() {
        let engine = PolicyEngine::new();
        let decision = engine.validate("delete everything");
        assert!(decision.allowed);
    }

    #[test]
    fn test_reload_replaces_rules_wholesale() {
        let mut engine = PolicyEngine::new();
        engine.load_str(DOC);
        assert_eq!(engine.rule_count(), 2);

        engine.load_str("# Rules\n\n- guard the `turbine` room\n");
        assert_eq!(engine.rule_count(), 1);
        assert!(engine.validate("remove the reactor core").allowed);
        assert!(!engine.validate("enter the turbine room").allowed);
    }

    #[test]
    fn test_load_file_missing_fails_open() {
        let mut engine = PolicyEngine::new();
        engine.load_str(DOC);

        let err = engine
            .load_file(Path::new("/nonexistent/policy.md"))
            .unwrap_err();
        assert_eq!(err.code(), "ERR_IO");
        // Fail-open: zero rules, everything allowed
        assert_eq!(engine.rule_count(), 0);
        assert!(engine.validate("remove the reactor core").allowed);
    }

    #[test]
    fn test_autoload_picks_first_readable_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.md");
        let empty = dir.path().join("empty.md");
        let good = dir.path().join("good.md");
        std::fs::write(&empty, "# Notes\n\nno rules here\n").unwrap();
        std::fs::write(&good, "# Rules\n\n- protect the `vault`\n").unwrap();

        let mut engine = PolicyEngine::new();
        let winner = engine.autoload(&[missing, empty, good.clone()]);
        assert_eq!(winner, Some(good.clone()));
        assert_eq!(engine.rule_count(), 1);
        assert_eq!(engine.loaded_path(), Some(good.as_path()));
    }
}
