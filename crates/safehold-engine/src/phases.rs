//! Verification phase state machine
//!
//! Four phases guard every mutating command:
//!
//! 1. **PreFlight**: policy validation plus pre-state capture. The only
//!    phase that can veto before anything runs.
//! 2. **SnapshotRollback**: the handler runs once inside a disposable
//!    transaction that is always cancelled. Passing proves the mutation
//!    is reversible before it is allowed to persist.
//! 3. **PostVerify**: after the durable commit, the observed entity-count
//!    delta is audited against the declared one. Advisory only.
//! 4. **BuildCheck**: world consistency sweep. Advisory only.
//!
//! Phase ordering is owned by the router; the engine holds the session
//! state (pre-execution facts) that later phases compare against.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::{debug, warn};

use safehold_core::errors::SafeholdError;
use safehold_core::policy::PolicyEngine;
use safehold_core::transaction::TransactionProvider;
use safehold_core::World;
use safehold_core_types::schema::{FIELD_DURATION_MS, FIELD_PASSED, FIELD_PHASE};
use safehold_store::SnapshotStore;

use crate::protocol;

/// Phase name constants, reported verbatim in results and logs
pub const PHASE_PRE_FLIGHT: &str = "PreFlight";
pub const PHASE_SNAPSHOT_ROLLBACK: &str = "SnapshotRollback";
pub const PHASE_POST_VERIFY: &str = "PostVerify";
pub const PHASE_BUILD_CHECK: &str = "BuildCheck";

/// Outcome of one verification phase
#[derive(Debug, Clone)]
pub struct PhaseResult {
    /// Which phase produced this result
    pub phase_name: &'static str,
    /// Whether the phase passed
    pub passed: bool,
    /// Human-readable detail (violation list, delta audit, ...)
    pub detail: String,
    /// Wall-clock time spent in the phase
    pub duration: Duration,
}

impl PhaseResult {
    fn passed(phase_name: &'static str, detail: impl Into<String>, started: Instant) -> Self {
        Self {
            phase_name,
            passed: true,
            detail: detail.into(),
            duration: started.elapsed(),
        }
    }

    fn failed(phase_name: &'static str, detail: impl Into<String>, started: Instant) -> Self {
        Self {
            phase_name,
            passed: false,
            detail: detail.into(),
            duration: started.elapsed(),
        }
    }

    /// Encode for inclusion in command responses
    pub fn to_json(&self) -> Value {
        json!({
            FIELD_PHASE: self.phase_name,
            FIELD_PASSED: self.passed,
            "detail": self.detail,
            FIELD_DURATION_MS: self.duration.as_millis() as u64,
        })
    }
}

/// Pre-execution facts captured in PreFlight, consumed in PostVerify
///
/// A single slot, overwritten per invocation, never a stack.
#[derive(Debug, Clone)]
struct SessionState {
    pre_entity_count: usize,
    pre_entity_labels: BTreeSet<String>,
}

/// World consistency check run as the final advisory phase
///
/// Implementations return one message per detected problem; an empty
/// vector means the check passed.
pub trait BuildCheck {
    fn check(&self, world: &World) -> Vec<String>;
}

/// Build check that inspects structural invariants of the world itself
///
/// Flags entities with empty kinds or paths. Cheap enough to run after
/// every mutation.
#[derive(Debug, Default)]
pub struct StructuralBuildCheck;

impl BuildCheck for StructuralBuildCheck {
    fn check(&self, world: &World) -> Vec<String> {
        let mut problems = Vec::new();
        for entity in world.entities() {
            if entity.kind.is_empty() {
                problems.push(format!("Entity '{}' has an empty kind", entity.label));
            }
            if entity.path.is_empty() {
                problems.push(format!("Entity '{}' has an empty path", entity.label));
            }
        }
        problems
    }
}

/// Build check that always passes; used where no checker is wired in
#[derive(Debug, Default)]
pub struct NoopBuildCheck;

impl BuildCheck for NoopBuildCheck {
    fn check(&self, _world: &World) -> Vec<String> {
        Vec::new()
    }
}

/// The verification engine: runs phases and carries session state between
/// PreFlight and PostVerify
///
/// At most one session is in flight at a time; the router guarantees the
/// PreFlight -> PostVerify pairing per command.
#[derive(Debug, Default)]
pub struct VerificationEngine {
    session: Option<SessionState>,
}

impl VerificationEngine {
    pub fn new() -> Self {
        Self { session: None }
    }

    /// Phase 1: validate the action against policy and capture pre-state
    ///
    /// On denial no session is opened and the violations are carried in
    /// the result detail, one line per rule.
    pub fn run_pre_flight(
        &mut self,
        policy: &PolicyEngine,
        world: &World,
        action_description: &str,
    ) -> PhaseResult {
        let started = Instant::now();
        let decision = policy.validate(action_description);

        if !decision.allowed {
            self.session = None;
            let violation_count = decision.violations.len();
            let detail = SafeholdError::PolicyViolation {
                violations: decision.violations,
            }
            .to_string();
            warn!(
                action = %action_description,
                violation_count,
                "PreFlight denied"
            );
            return PhaseResult::failed(PHASE_PRE_FLIGHT, detail, started);
        }

        self.session = Some(SessionState {
            pre_entity_count: world.entity_count(),
            pre_entity_labels: world.labels().into_iter().collect(),
        });
        debug!(
            action = %action_description,
            entity_count = world.entity_count(),
            "PreFlight passed"
        );
        PhaseResult::passed(PHASE_PRE_FLIGHT, "Policy check passed", started)
    }

    /// Phase 2: run the handler once inside a disposable transaction and
    /// prove the world restores exactly
    ///
    /// The transaction is cancelled unconditionally. The phase fails if
    /// the handler reports an error, if the transaction machinery refuses,
    /// or if the post-cancel entity count differs from the pre-open count
    /// (a failed rollback proof). The speculative handler outcome is
    /// returned alongside the result so the router can surface handler
    /// errors verbatim.
    pub fn run_snapshot_rollback(
        &mut self,
        world: &mut World,
        provider: &mut dyn TransactionProvider,
        snapshots: &SnapshotStore,
        label: &str,
        exec: &dyn Fn(&mut World) -> Value,
    ) -> (PhaseResult, Value) {
        let started = Instant::now();
        debug_assert!(
            self.session.is_some(),
            "SnapshotRollback requires a PreFlight session"
        );

        // Audit trail for post-incident diffing; never blocks the command.
        snapshots.capture_best_effort(world, &format!("{}_pre", label));

        let pre_count = world.entity_count();
        if let Err(e) = provider.open(world, &format!("Verify: {}", label)) {
            return (
                PhaseResult::failed(PHASE_SNAPSHOT_ROLLBACK, e.to_string(), started),
                Value::Null,
            );
        }

        let outcome = exec(world);
        let speculative_failed = protocol::is_error(&outcome);

        if let Err(e) = provider.cancel(world) {
            return (
                PhaseResult::failed(
                    PHASE_SNAPSHOT_ROLLBACK,
                    format!("Disposable transaction cancel failed: {}", e),
                    started,
                ),
                outcome,
            );
        }

        if speculative_failed {
            let message = outcome
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("handler reported an error")
                .to_string();
            debug!(label = %label, "Speculative execution failed");
            return (
                PhaseResult::failed(
                    PHASE_SNAPSHOT_ROLLBACK,
                    SafeholdError::HandlerFailure { message }.to_string(),
                    started,
                ),
                outcome,
            );
        }

        let post_count = world.entity_count();
        if post_count != pre_count {
            warn!(
                expected = pre_count,
                actual = post_count,
                "Rollback proof failed, world not restored"
            );
            return (
                PhaseResult::failed(
                    PHASE_SNAPSHOT_ROLLBACK,
                    SafeholdError::RollbackProofFailure {
                        expected: pre_count,
                        actual: post_count,
                    }
                    .to_string(),
                    started,
                ),
                outcome,
            );
        }

        debug!(label = %label, "Rollback proof passed");
        (
            PhaseResult::passed(
                PHASE_SNAPSHOT_ROLLBACK,
                "Mutation proved reversible",
                started,
            ),
            outcome,
        )
    }

    /// Phase 3: audit the committed entity-count delta against the declared
    /// one. Advisory: a mismatch is reported and logged, never rolled back.
    pub fn run_post_verify(&mut self, world: &World, expected_delta: i64) -> PhaseResult {
        let started = Instant::now();
        let Some(session) = self.session.take() else {
            debug_assert!(false, "PostVerify without a PreFlight session");
            return PhaseResult::failed(
                PHASE_POST_VERIFY,
                "No pre-execution state recorded",
                started,
            );
        };

        let actual_delta = world.entity_count() as i64 - session.pre_entity_count as i64;
        if actual_delta != expected_delta {
            let post_labels: BTreeSet<String> = world.labels().into_iter().collect();
            let appeared: Vec<&str> = post_labels
                .difference(&session.pre_entity_labels)
                .map(String::as_str)
                .collect();
            let vanished: Vec<&str> = session
                .pre_entity_labels
                .difference(&post_labels)
                .map(String::as_str)
                .collect();
            warn!(
                expected_delta,
                actual_delta,
                appeared = ?appeared,
                vanished = ?vanished,
                "[MISMATCH] Entity delta differs from declaration"
            );
            return PhaseResult::failed(
                PHASE_POST_VERIFY,
                format!(
                    "[MISMATCH] expected delta {}, observed {} (appeared: [{}], vanished: [{}])",
                    expected_delta,
                    actual_delta,
                    appeared.join(", "),
                    vanished.join(", ")
                ),
                started,
            );
        }

        PhaseResult::passed(
            PHASE_POST_VERIFY,
            format!("Entity delta {} as declared", actual_delta),
            started,
        )
    }

    /// Phase 4: world consistency sweep. Advisory only.
    pub fn run_build_check(&self, check: &dyn BuildCheck, world: &World) -> PhaseResult {
        let started = Instant::now();
        let problems = check.check(world);
        if problems.is_empty() {
            PhaseResult::passed(PHASE_BUILD_CHECK, "World consistent", started)
        } else {
            warn!(
                problem_count = problems.len(),
                "Build check found problems"
            );
            PhaseResult::failed(PHASE_BUILD_CHECK, problems.join("; "), started)
        }
    }

    /// Discard any in-flight session
    ///
    /// Called by the router when a command aborts between PreFlight and
    /// PostVerify so stale pre-state never leaks into the next command.
    pub fn reset(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safehold_core::{Entity, UndoTransactionProvider};
    use tempfile::TempDir;

    fn world_with(labels: &[&str]) -> World {
        let mut world = World::new();
        for label in labels {
            world
                .spawn(Entity::new(*label, "StaticProp", "/props/x"))
                .unwrap();
        }
        world
    }

    fn denying_policy() -> PolicyEngine {
        let mut policy = PolicyEngine::new();
        policy.load_str("# Rules\n\n- never touch the `reactor`\n");
        policy
    }

    #[test]
    fn test_pre_flight_allow_opens_session() {
        let mut engine = VerificationEngine::new();
        let world = world_with(&["A"]);
        let result = engine.run_pre_flight(&denying_policy(), &world, "paint the wall");
        assert!(result.passed);

        // PostVerify consumes the session recorded at PreFlight
        let post = engine.run_post_verify(&world, 0);
        assert!(post.passed);
    }

    #[test]
    fn test_pre_flight_deny_carries_violations() {
        let mut engine = VerificationEngine::new();
        let world = world_with(&["A"]);
        let result = engine.run_pre_flight(&denying_policy(), &world, "dismantle the reactor");
        assert!(!result.passed);
        assert!(result.detail.contains("RULE_000"));
    }

    #[test]
    fn test_snapshot_rollback_restores_world() {
        let mut engine = VerificationEngine::new();
        let mut world = world_with(&["A"]);
        let before = world.clone();
        let mut tx = UndoTransactionProvider::new();
        let tmp = TempDir::new().unwrap();
        let snapshots = SnapshotStore::new(tmp.path());

        engine.run_pre_flight(&PolicyEngine::new(), &world, "spawn B");
        let (result, outcome) = engine.run_snapshot_rollback(
            &mut world,
            &mut tx,
            &snapshots,
            "spawn_entity",
            &|w: &mut World| {
                w.spawn(Entity::new("B", "StaticProp", "/props/x")).unwrap();
                serde_json::json!({"spawned": "B"})
            },
        );

        assert!(result.passed);
        assert_eq!(outcome["spawned"], "B");
        // The speculative mutation left no trace
        assert_eq!(world, before);
        assert!(!tx.is_open());
    }

    #[test]
    fn test_snapshot_rollback_fails_on_handler_error() {
        let mut engine = VerificationEngine::new();
        let mut world = world_with(&["A"]);
        let mut tx = UndoTransactionProvider::new();
        let tmp = TempDir::new().unwrap();
        let snapshots = SnapshotStore::new(tmp.path());

        engine.run_pre_flight(&PolicyEngine::new(), &world, "delete Z");
        let (result, outcome) = engine.run_snapshot_rollback(
            &mut world,
            &mut tx,
            &snapshots,
            "delete_entity",
            &|_w: &mut World| serde_json::json!({"error": "Entity 'Z' not found"}),
        );

        assert!(!result.passed);
        assert!(result.detail.contains("not found"));
        assert!(protocol::is_error(&outcome));
        assert!(!tx.is_open());
    }

    #[test]
    fn test_post_verify_flags_mismatch() {
        let mut engine = VerificationEngine::new();
        let mut world = world_with(&["A"]);

        engine.run_pre_flight(&PolicyEngine::new(), &world, "spawn B");
        // Two entities appear where one was declared
        world
            .spawn(Entity::new("B", "StaticProp", "/props/x"))
            .unwrap();
        world
            .spawn(Entity::new("C", "StaticProp", "/props/x"))
            .unwrap();

        let result = engine.run_post_verify(&world, 1);
        assert!(!result.passed);
        assert!(result.detail.contains("[MISMATCH]"));
        assert!(result.detail.contains("expected delta 1"));
        assert!(result.detail.contains("observed 2"));
        assert!(result.detail.contains("appeared: [B, C]"));
    }

    #[test]
    fn test_structural_build_check() {
        let mut world = World::new();
        world
            .spawn(Entity::new("Good", "StaticProp", "/props/x"))
            .unwrap();
        world.spawn(Entity::new("Bad", "", "/props/y")).unwrap();

        let engine = VerificationEngine::new();
        let result = engine.run_build_check(&StructuralBuildCheck, &world);
        assert!(!result.passed);
        assert!(result.detail.contains("'Bad'"));

        let clean = world_with(&["A"]);
        assert!(engine.run_build_check(&StructuralBuildCheck, &clean).passed);
        assert!(engine.run_build_check(&NoopBuildCheck, &world).passed);
    }

    #[test]
    fn test_phase_result_json_shape() {
        let mut engine = VerificationEngine::new();
        let world = world_with(&[]);
        let result = engine.run_pre_flight(&PolicyEngine::new(), &world, "anything");
        let json = result.to_json();
        assert_eq!(json["phase"], "PreFlight");
        assert_eq!(json["passed"], true);
        assert!(json["duration_ms"].is_u64());
    }
}
