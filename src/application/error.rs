use thiserror::Error;

use crate::domain::Amount;
use crate::storage::StoreError;

/// Coarse failure classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The store could not be reached, or a session or transaction could
    /// not be opened.
    StoreUnavailable,
    /// A step inside an open transaction failed; the transaction was aborted.
    TransactionFailure,
    /// A stored document could not be turned back into an entity.
    DecodeFailure,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to connect to store: {0}")]
    Connect(#[source] StoreError),

    #[error("Failed to start session: {0}")]
    SessionUnavailable(#[source] StoreError),

    #[error("Failed to start transaction: {0}")]
    TransactionStart(#[source] StoreError),

    #[error("Failed to update user balance: {0}")]
    Debit(#[source] StoreError),

    #[error("Failed to update user balance: debit of {0} overflows")]
    AmountOverflow(Amount),

    #[error("Failed to create order: {0}")]
    InsertOrder(#[source] StoreError),

    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] StoreError),

    #[error("Failed to create user: {0}")]
    CreateUser(#[source] StoreError),

    #[error("Failed to fetch {collection}: {source}")]
    Fetch {
        collection: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Failed to decode {entity}: {source}")]
    Decode {
        entity: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Failed to check integrity: {0}")]
    Integrity(#[source] StoreError),
}

impl AppError {
    /// Wrap a listing failure, separating undecodable documents from store
    /// errors.
    pub(crate) fn listing(
        collection: &'static str,
        entity: &'static str,
    ) -> impl FnOnce(StoreError) -> Self {
        move |source| {
            if source.is_decode() {
                AppError::Decode { entity, source }
            } else {
                AppError::Fetch { collection, source }
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Connect(_)
            | AppError::SessionUnavailable(_)
            | AppError::TransactionStart(_)
            | AppError::CreateUser(_)
            | AppError::Fetch { .. }
            | AppError::Integrity(_) => ErrorKind::StoreUnavailable,
            AppError::Debit(_)
            | AppError::AmountOverflow(_)
            | AppError::InsertOrder(_)
            | AppError::Commit(_) => ErrorKind::TransactionFailure,
            AppError::Decode { .. } => ErrorKind::DecodeFailure,
        }
    }

    /// Message safe to hand to clients; store details are left out.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Connect(_) => "Failed to connect to store".to_string(),
            AppError::SessionUnavailable(_) => "Failed to start session".to_string(),
            AppError::TransactionStart(_) => "Failed to start transaction".to_string(),
            AppError::Debit(_) | AppError::AmountOverflow(_) => {
                "Failed to update user balance".to_string()
            }
            AppError::InsertOrder(_) => "Failed to create order".to_string(),
            AppError::Commit(_) => "Failed to commit transaction".to_string(),
            AppError::CreateUser(_) => "Failed to create user".to_string(),
            AppError::Fetch { collection, .. } => format!("Failed to fetch {collection}"),
            AppError::Decode { entity, .. } => format!("Failed to decode {entity}"),
            AppError::Integrity(_) => "Failed to check integrity".to_string(),
        }
    }
}
