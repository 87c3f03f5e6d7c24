//! Command router
//!
//! Single entry point for all commands. The router owns the world, the
//! policy engine, the verification engine, the transaction providers and
//! the snapshot store, and decides per command how much of the pipeline
//! applies:
//!
//! - meta commands (status, snapshots, policy checks, manual transactions)
//!   are handled intrinsically and never touch the pipeline;
//! - `Direct` registry commands execute immediately;
//! - `Guarded` registry commands run the full PreFlight ->
//!   SnapshotRollback -> durable commit -> PostVerify -> BuildCheck
//!   sequence;
//! - `Bypass` registry commands execute outside the pipeline, each use
//!   logged.
//!
//! Commands are strictly sequential: `route` takes `&mut self`, so at most
//! one command is in flight and phase state can never interleave.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::{debug, info, info_span, warn};

use safehold_core::errors::SafeholdError;
use safehold_core::policy::PolicyEngine;
use safehold_core::transaction::{TransactionProvider, UndoTransactionProvider};
use safehold_core::World;
use safehold_core_types::correlation::RequestContext;
use safehold_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use safehold_store::{diff_snapshots, SnapshotStore};

use crate::handlers::builtin_registry;
use crate::phases::{BuildCheck, StructuralBuildCheck, VerificationEngine};
use crate::protocol::{self, CommandRequest};
use crate::registry::{CommandRegistry, CommandSpec, Dispatch};

/// The command router and owner of all engine state
pub struct CommandRouter {
    world: World,
    registry: CommandRegistry,
    policy: PolicyEngine,
    engine: VerificationEngine,
    /// Provider for the pipeline's disposable and durable transactions
    provider: Box<dyn TransactionProvider + Send>,
    /// Separate provider for user-driven begin/end/undo commands, so a
    /// long-lived manual transaction never collides with the pipeline's
    manual_tx: UndoTransactionProvider,
    snapshots: SnapshotStore,
    build_check: Box<dyn BuildCheck + Send>,
}

impl CommandRouter {
    /// Create a router with the built-in registry and default components
    pub fn new(snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            world: World::new(),
            registry: builtin_registry(),
            policy: PolicyEngine::new(),
            engine: VerificationEngine::new(),
            provider: Box::new(UndoTransactionProvider::new()),
            manual_tx: UndoTransactionProvider::new(),
            snapshots: SnapshotStore::new(snapshot_dir),
            build_check: Box::new(StructuralBuildCheck),
        }
    }

    /// Replace the policy engine (builder-style)
    pub fn with_policy(mut self, policy: PolicyEngine) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the pipeline transaction provider (builder-style)
    pub fn with_provider(mut self, provider: Box<dyn TransactionProvider + Send>) -> Self {
        self.provider = provider;
        self
    }

    /// Replace the build check (builder-style)
    pub fn with_build_check(mut self, build_check: Box<dyn BuildCheck + Send>) -> Self {
        self.build_check = build_check;
        self
    }

    /// Register an additional command alongside the built-ins
    pub fn register_command(&mut self, name: impl Into<String>, spec: CommandSpec) {
        self.registry.register(name, spec);
    }

    /// Load a policy document, replacing the current rule set
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read; the engine continues with
    /// zero rules (fail-open).
    pub fn load_policy(&mut self, path: &Path) -> safehold_core::errors::Result<usize> {
        self.policy.load_file(path)
    }

    /// Read access to the world, for status and tests
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct mutable access to the world, for seeding state
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Total pipeline transaction opens, for instrumentation
    pub fn pipeline_open_count(&self) -> u64 {
        self.provider.open_count()
    }

    /// Route a raw JSON request string
    pub fn route_json(&mut self, raw: &str) -> Value {
        match CommandRequest::from_json(raw) {
            Ok(request) => self.route(&request),
            Err(e) => protocol::error_response(e.to_string()),
        }
    }

    /// Route one command to completion and return its JSON response
    pub fn route(&mut self, request: &CommandRequest) -> Value {
        let ctx = RequestContext::new();
        let span = info_span!(
            "route",
            cmd = %request.cmd,
            request_id = %ctx.request_id,
        );
        let _guard = span.enter();
        debug!(event = EVENT_START, "Command received");

        let response = self.dispatch(request);

        if protocol::is_error(&response) {
            info!(event = EVENT_END_ERROR, "Command failed");
        } else {
            debug!(event = EVENT_END, "Command completed");
        }
        response
    }

    fn dispatch(&mut self, request: &CommandRequest) -> Value {
        match request.cmd.as_str() {
            "get_status" => self.handle_get_status(),
            "create_snapshot" => self.handle_create_snapshot(&request.args),
            "diff_snapshots" => self.handle_diff_snapshots(&request.args),
            "check_policy" => self.handle_check_policy(&request.args),
            "run_verification" => self.handle_run_verification(&request.args),
            "begin_transaction" => self.handle_begin_transaction(&request.args),
            "end_transaction" => self.handle_end_transaction(),
            "undo_transaction" => self.handle_undo_transaction(),
            _ => self.dispatch_registered(request),
        }
    }

    fn dispatch_registered(&mut self, request: &CommandRequest) -> Value {
        let Some(spec) = self.registry.get(&request.cmd) else {
            return protocol::error_response(
                SafeholdError::UnknownCommand {
                    cmd: request.cmd.clone(),
                }
                .to_string(),
            );
        };
        match spec.dispatch {
            Dispatch::Direct => {
                let outcome = spec.invoke(&mut self.world, &request.args);
                if protocol::is_error(&outcome) {
                    return outcome_error(&outcome);
                }
                protocol::ok_response(json!({"result": outcome}))
            }
            Dispatch::Bypass => {
                warn!(cmd = %request.cmd, "Pipeline bypass command executing");
                let outcome = spec.invoke(&mut self.world, &request.args);
                if protocol::is_error(&outcome) {
                    return outcome_error(&outcome);
                }
                protocol::ok_response(json!({"result": outcome, "bypassed": true}))
            }
            Dispatch::Guarded { expected_delta } => {
                self.route_guarded(request, expected_delta)
            }
        }
    }

    /// The full safety pipeline around one mutating command
    fn route_guarded(&mut self, request: &CommandRequest, expected_delta: i64) -> Value {
        if self.manual_tx.is_open() {
            warn!(
                cmd = %request.cmd,
                manual_label = ?self.manual_tx.open_label(),
                "Guarded command while a manual transaction is open"
            );
        }

        // Phase 1: policy veto point.
        let action = action_description(request);
        let pre_flight = self.engine.run_pre_flight(&self.policy, &self.world, &action);
        if !pre_flight.passed {
            return guarded_error(&pre_flight.detail, vec![pre_flight.to_json()]);
        }

        // Phase 2: speculative run inside a disposable transaction.
        // `spec` borrows only the registry; the engine mutates the other
        // fields, so the closure can invoke while the pipeline runs.
        let Some(spec) = self.registry.get(&request.cmd) else {
            return protocol::error_response(
                SafeholdError::UnknownCommand {
                    cmd: request.cmd.clone(),
                }
                .to_string(),
            );
        };
        let args = &request.args;
        let (rollback, _speculative) = self.engine.run_snapshot_rollback(
            &mut self.world,
            self.provider.as_mut(),
            &self.snapshots,
            &request.cmd,
            &|world: &mut World| spec.invoke(world, args),
        );
        if !rollback.passed {
            self.engine.reset();
            return guarded_error(&rollback.detail, vec![pre_flight.to_json(), rollback.to_json()]);
        }

        // Phase 3: the real run inside a durable transaction.
        if let Err(e) = self
            .provider
            .open(&self.world, &format!("Safehold: {}", request.cmd))
        {
            self.engine.reset();
            return guarded_error(
                &e.to_string(),
                vec![pre_flight.to_json(), rollback.to_json()],
            );
        }
        let outcome = spec.invoke(&mut self.world, args);
        if protocol::is_error(&outcome) {
            // Passed speculatively but failed for real. Cancel restores the
            // pre-command world; the handler error surfaces verbatim.
            warn!(cmd = %request.cmd, "Durable run failed after passing verification");
            if let Err(e) = self.provider.cancel(&mut self.world) {
                warn!(error = %e, "Durable transaction cancel failed");
            }
            self.engine.reset();
            return outcome_error(&outcome);
        }
        if let Err(e) = self.provider.commit(&mut self.world) {
            warn!(error = %e, "Durable transaction commit failed");
        }

        // Phases 4 and 5: advisory audits, never rolled back.
        let post_verify = self.engine.run_post_verify(&self.world, expected_delta);
        let build = self
            .engine
            .run_build_check(self.build_check.as_ref(), &self.world);

        protocol::ok_response(json!({
            "result": outcome,
            "phases": [
                pre_flight.to_json(),
                rollback.to_json(),
                post_verify.to_json(),
                build.to_json(),
            ],
        }))
    }

    fn handle_get_status(&self) -> Value {
        let (direct, guarded, bypass) = self.registry.counts();
        protocol::ok_response(json!({
            "entity_count": self.world.entity_count(),
            "policy": {
                "rule_count": self.policy.rule_count(),
                "loaded_path": self.policy.loaded_path().map(|p| p.display().to_string()),
            },
            "commands": {"direct": direct, "guarded": guarded, "bypass": bypass},
            "manual_transaction_open": self.manual_tx.is_open(),
            "snapshot_dir": self.snapshots.dir().display().to_string(),
        }))
    }

    fn handle_create_snapshot(&self, args: &Value) -> Value {
        let name = args.get("name").and_then(Value::as_str).unwrap_or("manual");
        match self.snapshots.capture(&self.world, name) {
            Ok(path) => protocol::ok_response(json!({
                "path": path.display().to_string(),
                "entity_count": self.world.entity_count(),
            })),
            Err(e) => protocol::error_response(e.to_string()),
        }
    }

    fn handle_diff_snapshots(&self, args: &Value) -> Value {
        let (Some(path_a), Some(path_b)) = (
            args.get("path_a").and_then(Value::as_str),
            args.get("path_b").and_then(Value::as_str),
        ) else {
            return protocol::error_response("Missing 'path_a' or 'path_b' argument");
        };
        match diff_snapshots(Path::new(path_a), Path::new(path_b)) {
            Ok(diff) => protocol::ok_response(json!({
                "identical": diff.is_identical(),
                "added": diff.added,
                "removed": diff.removed,
                "summary": diff.render_summary(),
            })),
            Err(e) => protocol::error_response(e.to_string()),
        }
    }

    fn handle_check_policy(&self, args: &Value) -> Value {
        let Some(action) = args.get("action").and_then(Value::as_str) else {
            return protocol::error_response("Missing 'action' argument");
        };
        let decision = self.policy.validate(action);
        protocol::ok_response(json!({
            "allowed": decision.allowed,
            "violations": decision.violations,
        }))
    }

    /// Dry-run verification: PreFlight plus BuildCheck for a described
    /// action, no mutation
    fn handle_run_verification(&mut self, args: &Value) -> Value {
        let Some(action) = args.get("action").and_then(Value::as_str) else {
            return protocol::error_response("Missing 'action' argument");
        };
        let pre_flight = self.engine.run_pre_flight(&self.policy, &self.world, action);
        let build = self
            .engine
            .run_build_check(self.build_check.as_ref(), &self.world);
        // No mutation follows; drop the session opened by PreFlight.
        self.engine.reset();

        protocol::ok_response(json!({
            "passed": pre_flight.passed && build.passed,
            "phases": [pre_flight.to_json(), build.to_json()],
        }))
    }

    fn handle_begin_transaction(&mut self, args: &Value) -> Value {
        let label = args.get("label").and_then(Value::as_str).unwrap_or("manual");
        match self.manual_tx.open(&self.world, label) {
            Ok(()) => protocol::ok_response(json!({"transaction": label})),
            Err(e) => protocol::error_response(e.to_string()),
        }
    }

    fn handle_end_transaction(&mut self) -> Value {
        match self.manual_tx.commit(&mut self.world) {
            Ok(()) => protocol::ok_response(json!({"committed": true})),
            Err(e) => protocol::error_response(e.to_string()),
        }
    }

    fn handle_undo_transaction(&mut self) -> Value {
        match self.manual_tx.cancel(&mut self.world) {
            Ok(()) => protocol::ok_response(json!({
                "restored": true,
                "entity_count": self.world.entity_count(),
            })),
            Err(e) => protocol::error_response(e.to_string()),
        }
    }
}

/// Free-text action description fed to the policy engine: the command name
/// plus its compact argument JSON, so trigger terms match either
fn action_description(request: &CommandRequest) -> String {
    format!(
        "{} {}",
        request.cmd,
        serde_json::to_string(&request.args).unwrap_or_default()
    )
}

fn guarded_error(detail: &str, phases: Vec<Value>) -> Value {
    let mut response = protocol::error_response(detail);
    if let Some(map) = response.as_object_mut() {
        map.insert("phases".to_string(), Value::Array(phases));
    }
    response
}

/// Surface a handler outcome's error as a protocol error response
fn outcome_error(outcome: &Value) -> Value {
    let message = outcome
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("handler reported an error");
    let mut response = protocol::error_response(message);
    // Extra handler fields (e.g. partial-progress counters) ride along.
    if let (Some(map), Some(fields)) = (response.as_object_mut(), outcome.as_object()) {
        for (key, value) in fields {
            if key != "error" {
                map.insert(key.clone(), value.clone());
            }
        }
    }
    response
}
