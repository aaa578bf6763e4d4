use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to connect to store: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("{context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to decode {entity}: {reason}")]
    Decode { entity: &'static str, reason: String },

    #[error("Invalid transaction state: {0}")]
    TransactionState(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub(crate) fn query(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| StoreError::Query { context, source }
    }

    pub(crate) fn decode(entity: &'static str, reason: impl ToString) -> Self {
        StoreError::Decode {
            entity,
            reason: reason.to_string(),
        }
    }

    /// True when the failure came from turning a stored row back into an
    /// entity, as opposed to reaching or querying the store.
    pub fn is_decode(&self) -> bool {
        matches!(self, StoreError::Decode { .. })
    }
}
