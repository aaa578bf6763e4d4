use std::sync::Arc;

use tracing::info;

use crate::domain::{Amount, NewUser, Order, User, UserId};
use crate::storage::{IntegrityStats, LedgerStore, SqliteLedgerStore, TransactionOptions};

use super::AppError;
use super::placement::OrderPlacement;

/// Application service providing the order desk operations.
/// This is the primary interface for any client (CLI, HTTP).
///
/// Holds the process-wide store handle. Cloning the service shares the same
/// handle.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

impl LedgerService {
    /// Create a new service over the given store.
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Connect to the database at `database_url` and run migrations.
    pub async fn init(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let store = SqliteLedgerStore::init(database_url, max_connections)
            .await
            .map_err(AppError::Connect)?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Connect to an existing database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let store = SqliteLedgerStore::connect(database_url, max_connections)
            .await
            .map_err(AppError::Connect)?;
        Ok(Self::new(Arc::new(store)))
    }

    // ========================
    // User operations
    // ========================

    /// Create a user with an initial balance.
    pub async fn create_user(&self, name: String, balance: Amount) -> Result<User, AppError> {
        let user = self
            .store
            .insert_user(NewUser::new(name, balance))
            .await
            .map_err(AppError::CreateUser)?;

        info!(user_id = %user.id, balance = user.balance, "user created");
        Ok(user)
    }

    /// List all users.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.store
            .list_users()
            .await
            .map_err(AppError::listing("users", "user"))
    }

    // ========================
    // Order operations
    // ========================

    /// List all orders.
    pub async fn list_orders(&self) -> Result<Vec<Order>, AppError> {
        self.store
            .list_orders()
            .await
            .map_err(AppError::listing("orders", "order"))
    }

    /// Debit `amount` from the user's balance and record the order, as one
    /// snapshot-isolated, majority-durable transaction.
    ///
    /// Neither the balance nor the user's existence is checked: the balance
    /// may go negative, and an unknown `user_id` still gets an order. Calling
    /// twice places two orders. Conflicting concurrent placements may fail;
    /// nothing is retried.
    pub async fn place_order(&self, user_id: UserId, amount: Amount) -> Result<Order, AppError> {
        let mut placement =
            OrderPlacement::begin(self.store.as_ref(), TransactionOptions::snapshot_majority())
                .await?;
        let result = placement.run(user_id, amount).await;
        debug_assert!(placement.stage().is_terminal());
        result
    }

    // ========================
    // Integrity
    // ========================

    /// Count users, orders, and orders that reference no existing user.
    pub async fn check_integrity(&self) -> Result<IntegrityStats, AppError> {
        self.store
            .integrity_stats()
            .await
            .map_err(AppError::Integrity)
    }
}
