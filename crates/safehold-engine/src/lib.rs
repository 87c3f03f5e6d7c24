//! Safehold engine - verification pipeline and command routing
//!
//! Wraps every mutating command in the phase state machine:
//! PreFlight (policy + pre-state capture) -> Snapshot+Rollback (reversibility
//! proof inside a disposable transaction) -> durable commit -> PostVerify
//! (advisory delta audit) -> BuildCheck (advisory). Read-only commands
//! dispatch directly with none of that overhead; two documented bypass
//! commands skip the pipeline entirely.

pub mod handlers;
pub mod phases;
pub mod protocol;
pub mod registry;
pub mod router;

pub use phases::{BuildCheck, NoopBuildCheck, PhaseResult, StructuralBuildCheck, VerificationEngine};
pub use protocol::CommandRequest;
pub use registry::{CommandRegistry, CommandSpec, Dispatch, HandlerFn};
pub use router::CommandRouter;
