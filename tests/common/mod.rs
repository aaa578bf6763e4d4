// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use orderdesk::application::LedgerService;
use orderdesk::domain::{Amount, NewOrder, NewUser, Order, User, UserId};
use orderdesk::storage::{
    IntegrityStats, LedgerSession, LedgerStore, SqliteLedgerStore, StoreError, TransactionOptions,
};
use tempfile::TempDir;

/// Helper to create a store over a temporary database
pub async fn test_store(max_connections: u32) -> Result<(SqliteLedgerStore, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let url = format!("sqlite:{}?mode=rwc", db_path.display());
    let store = SqliteLedgerStore::init(&url, max_connections).await?;
    Ok((store, temp_dir))
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let (store, temp_dir) = test_store(4).await?;
    Ok((LedgerService::new(Arc::new(store)), temp_dir))
}

/// Current balance of a user, read through the listing path.
pub async fn balance_of(service: &LedgerService, user_id: UserId) -> Result<Amount> {
    service
        .list_users()
        .await?
        .into_iter()
        .find(|u| u.id == user_id)
        .map(|u| u.balance)
        .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))
}

/// Where [`FaultyStore`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    StartSession,
    StartTransaction,
    /// Fails the balance increment without applying it.
    Debit,
    /// Fails the order insert after the debit has been applied.
    Insert,
    /// Fails the commit without committing.
    Commit,
}

fn injected(point: FaultPoint) -> StoreError {
    StoreError::Other(anyhow::anyhow!("injected fault at {point:?}"))
}

/// A SQLite store that fails at one chosen point of the placement protocol
/// and delegates everything else.
pub struct FaultyStore {
    inner: SqliteLedgerStore,
    fault: FaultPoint,
}

impl FaultyStore {
    pub fn new(inner: SqliteLedgerStore, fault: FaultPoint) -> Self {
        Self { inner, fault }
    }
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn start_session(&self) -> Result<Box<dyn LedgerSession>, StoreError> {
        if self.fault == FaultPoint::StartSession {
            return Err(injected(self.fault));
        }
        let inner = self.inner.start_session().await?;
        Ok(Box::new(FaultySession {
            inner,
            fault: self.fault,
        }))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.inner.insert_user(user).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.inner.list_users().await
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.inner.list_orders().await
    }

    async fn integrity_stats(&self) -> Result<IntegrityStats, StoreError> {
        self.inner.integrity_stats().await
    }
}

struct FaultySession {
    inner: Box<dyn LedgerSession>,
    fault: FaultPoint,
}

#[async_trait]
impl LedgerSession for FaultySession {
    async fn start_transaction(&mut self, options: TransactionOptions) -> Result<(), StoreError> {
        if self.fault == FaultPoint::StartTransaction {
            return Err(injected(self.fault));
        }
        self.inner.start_transaction(options).await
    }

    async fn increment_balance(
        &mut self,
        user_id: UserId,
        delta: Amount,
    ) -> Result<u64, StoreError> {
        if self.fault == FaultPoint::Debit {
            return Err(injected(self.fault));
        }
        self.inner.increment_balance(user_id, delta).await
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        if self.fault == FaultPoint::Insert {
            return Err(injected(self.fault));
        }
        self.inner.insert_order(order).await
    }

    async fn commit_transaction(&mut self) -> Result<(), StoreError> {
        if self.fault == FaultPoint::Commit {
            return Err(injected(self.fault));
        }
        self.inner.commit_transaction().await
    }

    async fn abort_transaction(&mut self) -> Result<(), StoreError> {
        self.inner.abort_transaction().await
    }
}
