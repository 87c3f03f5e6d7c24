//! Command registry
//!
//! Maps command names to handlers plus a dispatch classification that
//! decides how much of the verification pipeline wraps the call:
//!
//! - `Direct`: read-only, no pipeline.
//! - `Guarded`: mutating, full pipeline, with a declared entity-count
//!   delta audited in PostVerify.
//! - `Bypass`: mutating but deliberately outside the pipeline. Every
//!   bypass is an explicit, registered exception, visible in one place.

use std::collections::BTreeMap;

use serde_json::Value;

use safehold_core::World;

/// Command handler: mutates (or reads) the world, returns a JSON outcome
///
/// Failure is signalled by an `error` key in the outcome, never by panic.
pub type HandlerFn = Box<dyn Fn(&mut World, &Value) -> Value + Send>;

/// How a command is dispatched relative to the verification pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Read-only; executes immediately
    Direct,
    /// Mutating; wrapped in the full phase pipeline
    Guarded {
        /// Entity-count delta the command declares (audited in PostVerify)
        expected_delta: i64,
    },
    /// Mutating but exempt from the pipeline by explicit decision
    Bypass,
}

/// One registered command
pub struct CommandSpec {
    pub dispatch: Dispatch,
    handler: HandlerFn,
}

impl CommandSpec {
    pub fn new(dispatch: Dispatch, handler: HandlerFn) -> Self {
        Self { dispatch, handler }
    }

    /// Run the handler
    pub fn invoke(&self, world: &mut World, args: &Value) -> Value {
        (self.handler)(world, args)
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

/// Registry of all dispatchable commands, keyed by lowercase name
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandSpec>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }

    /// Register a command; a repeated name replaces the earlier entry
    pub fn register(&mut self, name: impl Into<String>, spec: CommandSpec) {
        self.commands.insert(name.into().to_lowercase(), spec);
    }

    /// Look up a command by (already lowercased) name
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    /// True if the command exists and mutates the world
    pub fn is_mutating(&self, name: &str) -> bool {
        matches!(
            self.commands.get(name).map(|s| s.dispatch),
            Some(Dispatch::Guarded { .. }) | Some(Dispatch::Bypass)
        )
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// (direct, guarded, bypass) counts, for status reporting
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut direct = 0;
        let mut guarded = 0;
        let mut bypass = 0;
        for spec in self.commands.values() {
            match spec.dispatch {
                Dispatch::Direct => direct += 1,
                Dispatch::Guarded { .. } => guarded += 1,
                Dispatch::Bypass => bypass += 1,
            }
        }
        (direct, guarded, bypass)
    }
}
