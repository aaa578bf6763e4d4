use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Amount, NewOrder, NewUser, Order, User, UserId};

use super::{
    Durability, IntegrityStats, Isolation, LedgerSession, LedgerStore, MIGRATION_001_INITIAL,
    StoreError, TransactionOptions,
};

/// How long a writer waits for another transaction's write lock before the
/// statement fails.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Ledger store backed by a SQLite database in WAL mode.
///
/// WAL gives every reader a snapshot of the last committed state while a
/// writer is active, so uncommitted debits and orders stay invisible to other
/// sessions and to listing.
#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database named by `database_url`.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StoreError::Connect)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(StoreError::Connect)?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .map_err(StoreError::query("Failed to run migration 001"))?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let store = Self::connect(database_url, max_connections).await?;
        store.migrate().await?;
        Ok(store)
    }

    fn row_to_user(row: &SqliteRow) -> Result<User, StoreError> {
        let id_str: String = column(row, "user", "id")?;

        Ok(User {
            id: parse_id("user", &id_str)?,
            name: column(row, "user", "name")?,
            balance: column(row, "user", "balance")?,
        })
    }

    fn row_to_order(row: &SqliteRow) -> Result<Order, StoreError> {
        let id_str: String = column(row, "order", "id")?;
        let user_id_str: String = column(row, "order", "user_id")?;
        let datetime_str: String = column(row, "order", "datetime")?;

        Ok(Order {
            id: parse_id("order", &id_str)?,
            user_id: parse_id("order", &user_id_str)?,
            amount: column(row, "order", "amount")?,
            datetime: DateTime::parse_from_rfc3339(&datetime_str)
                .map_err(|e| StoreError::decode("order", format!("invalid datetime: {e}")))?
                .with_timezone(&Utc),
        })
    }
}

fn column<'r, T>(row: &'r SqliteRow, entity: &'static str, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|e| StoreError::decode(entity, e))
}

fn parse_id(entity: &'static str, raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::decode(entity, format!("invalid id '{raw}': {e}")))
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn start_session(&self) -> Result<Box<dyn LedgerSession>, StoreError> {
        let conn = self.pool.acquire().await.map_err(StoreError::Connect)?;
        Ok(Box::new(SqliteSession::new(conn)))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.with_id(Uuid::new_v4());

        sqlx::query("INSERT INTO users (id, name, balance) VALUES (?, ?, ?)")
            .bind(user.id.to_string())
            .bind(&user.name)
            .bind(user.balance)
            .execute(&self.pool)
            .await
            .map_err(StoreError::query("Failed to insert user"))?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT id, name, balance FROM users ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("Failed to fetch users"))?;

        rows.iter().map(Self::row_to_user).collect()
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query("SELECT id, user_id, amount, datetime FROM orders ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("Failed to fetch orders"))?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn integrity_stats(&self) -> Result<IntegrityStats, StoreError> {
        let user_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::query("Failed to count users"))?
            .get("count");

        let order_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::query("Failed to count orders"))?
            .get("count");

        let orphaned_orders: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM orders o
            WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = o.user_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::query("Failed to count orphaned orders"))?
        .get("count");

        Ok(IntegrityStats {
            user_count,
            order_count,
            orphaned_orders,
        })
    }
}

/// One pooled connection held for the duration of a unit of work.
///
/// If the session is dropped while a transaction is still open, the
/// connection is closed instead of going back to the pool, which makes SQLite
/// roll the transaction back.
pub struct SqliteSession {
    conn: PoolConnection<Sqlite>,
    in_transaction: bool,
}

impl SqliteSession {
    fn new(conn: PoolConnection<Sqlite>) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    fn require_transaction(&self) -> Result<(), StoreError> {
        if self.in_transaction {
            Ok(())
        } else {
            Err(StoreError::TransactionState("no active transaction"))
        }
    }
}

#[async_trait]
impl LedgerSession for SqliteSession {
    async fn start_transaction(&mut self, options: TransactionOptions) -> Result<(), StoreError> {
        if self.in_transaction {
            return Err(StoreError::TransactionState("transaction already active"));
        }

        // synchronous can't change inside a transaction, so set it first.
        let synchronous = match options.durability {
            Durability::Local => "PRAGMA synchronous = NORMAL",
            Durability::Majority => "PRAGMA synchronous = FULL",
        };
        sqlx::query(synchronous)
            .execute(&mut *self.conn)
            .await
            .map_err(StoreError::query("Failed to set durability"))?;

        let begin = match options.isolation {
            Isolation::Snapshot => "BEGIN DEFERRED",
            Isolation::Serializable => "BEGIN IMMEDIATE",
        };
        // Marked before BEGIN is sent: if this future is dropped or BEGIN
        // fails, the connection is closed rather than pooled mid-transaction.
        self.in_transaction = true;
        sqlx::query(begin)
            .execute(&mut *self.conn)
            .await
            .map_err(StoreError::query("Failed to begin transaction"))?;
        Ok(())
    }

    async fn increment_balance(
        &mut self,
        user_id: UserId,
        delta: Amount,
    ) -> Result<u64, StoreError> {
        self.require_transaction()?;

        let result = sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
            .bind(delta)
            .bind(user_id.to_string())
            .execute(&mut *self.conn)
            .await
            .map_err(StoreError::query("Failed to update user balance"))?;
        Ok(result.rows_affected())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        self.require_transaction()?;
        let order = order.with_id(Uuid::new_v4());

        sqlx::query("INSERT INTO orders (id, user_id, amount, datetime) VALUES (?, ?, ?, ?)")
            .bind(order.id.to_string())
            .bind(order.user_id.to_string())
            .bind(order.amount)
            .bind(order.datetime.to_rfc3339())
            .execute(&mut *self.conn)
            .await
            .map_err(StoreError::query("Failed to insert order"))?;
        Ok(order)
    }

    async fn commit_transaction(&mut self) -> Result<(), StoreError> {
        self.require_transaction()?;

        // A failed COMMIT leaves the transaction open for the caller to abort.
        sqlx::query("COMMIT")
            .execute(&mut *self.conn)
            .await
            .map_err(StoreError::query("Failed to commit transaction"))?;
        self.in_transaction = false;
        Ok(())
    }

    async fn abort_transaction(&mut self) -> Result<(), StoreError> {
        self.require_transaction()?;

        sqlx::query("ROLLBACK")
            .execute(&mut *self.conn)
            .await
            .map_err(StoreError::query("Failed to abort transaction"))?;
        self.in_transaction = false;
        debug!("transaction rolled back");
        Ok(())
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if self.in_transaction {
            warn!("session released with an open transaction, closing its connection");
            self.conn.close_on_drop();
        }
    }
}
