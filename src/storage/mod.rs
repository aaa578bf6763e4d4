//! Ledger store contract and its SQLite adapter.
//!
//! The store holds two collections: `users` (mutable balance) and `orders`
//! (append-only). Balance debits and order inserts go through a
//! [`LedgerSession`] so they commit or roll back together; listing and user
//! creation are unscoped.

mod error;
mod sqlite;

pub use error::*;
pub use sqlite::*;

use async_trait::async_trait;

use crate::domain::{Amount, NewOrder, NewUser, Order, User, UserId};

/// SQL migration for the initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Read isolation requested when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// Reads see one point-in-time view; concurrent writers stay invisible
    /// until they commit. Write-write conflicts surface as errors.
    Snapshot,
    /// Take the write lock up front so transactions run one after another.
    Serializable,
}

/// How durable a commit must be before it is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Acknowledge once the local store has the write.
    Local,
    /// Acknowledge only once the write is durable on a majority of replicas.
    Majority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation: Isolation,
    pub durability: Durability,
}

impl TransactionOptions {
    /// Snapshot reads with majority-acknowledged commits, as used for order
    /// placement.
    pub fn snapshot_majority() -> Self {
        Self {
            isolation: Isolation::Snapshot,
            durability: Durability::Majority,
        }
    }
}

/// Counts used by the integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityStats {
    pub user_count: i64,
    pub order_count: i64,
    /// Orders whose `user_id` matches no stored user.
    pub orphaned_orders: i64,
}

/// Process-wide handle to the ledger store.
///
/// Built once at startup and shared by every request; each order placement
/// opens its own session from it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a session for one unit of work. The session is released when the
    /// returned box is dropped.
    async fn start_session(&self) -> Result<Box<dyn LedgerSession>, StoreError>;

    /// Store a new user and return it with its assigned id.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// All users, in insertion order.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// All orders, in insertion order.
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;

    async fn integrity_stats(&self) -> Result<IntegrityStats, StoreError>;
}

/// A single session against the store, holding at most one active
/// transaction.
///
/// Writes issued through the session are invisible to other sessions until
/// [`commit_transaction`](LedgerSession::commit_transaction) succeeds, and are
/// discarded by [`abort_transaction`](LedgerSession::abort_transaction).
/// Dropping a session with an active transaction aborts it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerSession: Send {
    async fn start_transaction(&mut self, options: TransactionOptions) -> Result<(), StoreError>;

    /// Atomically add `delta` to the user's balance and return the number of
    /// users matched. Zero matches is not an error.
    async fn increment_balance(&mut self, user_id: UserId, delta: Amount)
    -> Result<u64, StoreError>;

    /// Insert an order and return it with its assigned id.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError>;

    async fn commit_transaction(&mut self) -> Result<(), StoreError>;

    async fn abort_transaction(&mut self) -> Result<(), StoreError>;
}
