//! Logging facility
//!
//! Single initialization point for the tracing subscriber. All crates in
//! the workspace log through `tracing`; this module only decides how those
//! events are rendered.

mod init;

pub use init::{init, Profile};
