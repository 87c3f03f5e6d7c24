//! Safehold core - domain layer
//!
//! The live world model, the declarative policy engine, the transaction
//! provider abstraction and the shared error/logging facilities. Everything
//! here is single-threaded and synchronous: the safety pipeline assumes one
//! control thread owning the world state, with exactly one mutation attempt
//! in flight at a time.

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod policy;
pub mod transaction;
pub mod world;

pub use errors::{Result, SafeholdError};
pub use model::Entity;
pub use transaction::{TransactionProvider, UndoTransactionProvider};
pub use world::World;
