//! Transaction provider abstraction
//!
//! A transaction guarantees exact undo of the mutations enclosed between
//! `open` and `cancel`. The verification engine relies on two transaction
//! roles with identical mechanics:
//!
//! - **Disposable**: opened, used, and always cancelled - proves
//!   reversibility only, never persists.
//! - **Durable**: on success, permanently commits changes.
//!
//! Nesting is forbidden: the disposable transaction must be fully closed
//! before the durable one opens, otherwise the undo history is corrupt.
//! The provider enforces this by refusing `open` while a transaction is
//! already open.

use tracing::debug;

use crate::errors::{Result, SafeholdError};
use crate::world::World;

/// Provider of open/commit/cancel transaction semantics over a world
///
/// `open_count()` exists as instrumentation: tests assert that the durable
/// transaction is never opened when the rollback proof fails.
pub trait TransactionProvider {
    /// Open a transaction, capturing whatever is needed to undo
    ///
    /// # Errors
    ///
    /// Returns `TransactionAlreadyOpen` if a transaction is in flight.
    fn open(&mut self, world: &World, label: &str) -> Result<()>;

    /// Commit the open transaction: keep all enclosed mutations
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotOpen` if no transaction is in flight.
    fn commit(&mut self, world: &mut World) -> Result<()>;

    /// Cancel the open transaction: restore the world to its state at `open`
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotOpen` if no transaction is in flight.
    fn cancel(&mut self, world: &mut World) -> Result<()>;

    /// True if a transaction is currently open
    fn is_open(&self) -> bool;

    /// Total number of successful `open` calls over the provider's lifetime
    fn open_count(&self) -> u64;
}

/// Open transaction frame: the label and the world backup taken at `open`
#[derive(Debug, Clone)]
struct TxFrame {
    label: String,
    backup: World,
}

/// Transaction provider backed by full-world backups
///
/// `open` clones the world; `cancel` restores the clone; `commit` drops it.
/// O(world) per transaction, which is acceptable for the world sizes this
/// pipeline targets and gives exact undo by construction.
#[derive(Debug, Default)]
pub struct UndoTransactionProvider {
    frame: Option<TxFrame>,
    opens: u64,
}

impl UndoTransactionProvider {
    /// Create a provider with no open transaction
    pub fn new() -> Self {
        Self {
            frame: None,
            opens: 0,
        }
    }

    /// Label of the open transaction, if any
    pub fn open_label(&self) -> Option<&str> {
        self.frame.as_ref().map(|f| f.label.as_str())
    }
}

impl TransactionProvider for UndoTransactionProvider {
    fn open(&mut self, world: &World, label: &str) -> Result<()> {
        if let Some(frame) = &self.frame {
            return Err(SafeholdError::TransactionAlreadyOpen {
                label: frame.label.clone(),
            });
        }
        self.frame = Some(TxFrame {
            label: label.to_string(),
            backup: world.clone(),
        });
        self.opens += 1;
        debug!(label = %label, "Transaction opened");
        Ok(())
    }

    fn commit(&mut self, _world: &mut World) -> Result<()> {
        let frame = self.frame.take().ok_or(SafeholdError::TransactionNotOpen)?;
        debug!(label = %frame.label, "Transaction committed");
        Ok(())
    }

    fn cancel(&mut self, world: &mut World) -> Result<()> {
        let frame = self.frame.take().ok_or(SafeholdError::TransactionNotOpen)?;
        *world = frame.backup;
        debug!(label = %frame.label, "Transaction cancelled, world restored");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.frame.is_some()
    }

    fn open_count(&self) -> u64 {
        self.opens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;

    fn world_with(labels: &[&str]) -> World {
        let mut world = World::new();
        for label in labels {
            world
                .spawn(Entity::new(*label, "StaticProp", "/props/x"))
                .unwrap();
        }
        world
    }

    #[test]
    fn test_cancel_restores_exact_state() {
        let mut world = world_with(&["A", "B"]);
        let before = world.clone();
        let mut tx = UndoTransactionProvider::new();

        tx.open(&world, "test").unwrap();
        world
            .spawn(Entity::new("C", "StaticProp", "/props/x"))
            .unwrap();
        world.remove("A").unwrap();
        tx.cancel(&mut world).unwrap();

        assert_eq!(world, before);
        assert!(!tx.is_open());
    }

    #[test]
    fn test_commit_keeps_mutations() {
        let mut world = world_with(&["A"]);
        let mut tx = UndoTransactionProvider::new();

        tx.open(&world, "test").unwrap();
        world
            .spawn(Entity::new("B", "StaticProp", "/props/x"))
            .unwrap();
        tx.commit(&mut world).unwrap();

        assert_eq!(world.entity_count(), 2);
        assert!(!tx.is_open());
    }

    #[test]
    fn test_nested_open_rejected() {
        let world = world_with(&["A"]);
        let mut tx = UndoTransactionProvider::new();

        tx.open(&world, "outer").unwrap();
        let err = tx.open(&world, "inner").unwrap_err();
        assert_eq!(err.code(), "ERR_TRANSACTION_ALREADY_OPEN");
        // The outer frame survives the rejected open
        assert_eq!(tx.open_label(), Some("outer"));
    }

    #[test]
    fn test_commit_without_open_rejected() {
        let mut world = world_with(&[]);
        let mut tx = UndoTransactionProvider::new();
        assert_eq!(
            tx.commit(&mut world).unwrap_err().code(),
            "ERR_TRANSACTION_NOT_OPEN"
        );
        assert_eq!(
            tx.cancel(&mut world).unwrap_err().code(),
            "ERR_TRANSACTION_NOT_OPEN"
        );
    }

    #[test]
    fn test_open_count_instrumentation() {
        let mut world = world_with(&["A"]);
        let mut tx = UndoTransactionProvider::new();
        assert_eq!(tx.open_count(), 0);

        tx.open(&world, "one").unwrap();
        tx.cancel(&mut world).unwrap();
        tx.open(&world, "two").unwrap();
        tx.commit(&mut world).unwrap();

        assert_eq!(tx.open_count(), 2);
    }
}
