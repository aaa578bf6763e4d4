//! Order placement: debit a user's balance and insert the order inside one
//! transaction.
//!
//! ```text
//! Idle -> SessionOpen -> TransactionActive -> DebitApplied -> OrderInserted -> Committed
//!              |                 |                 |                |
//!              +-----------------+-----------------+----------------+--------> Aborted
//! ```
//!
//! The debit is an unconditional increment: it neither checks that the
//! balance covers the amount nor that the user exists. Failures are never
//! retried; the transaction is aborted and the error returned.

use tracing::{debug, info, warn};

use crate::domain::{Amount, NewOrder, Order, UserId, debit_delta};
use crate::storage::{LedgerSession, LedgerStore, TransactionOptions};

use super::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStage {
    Idle,
    SessionOpen,
    TransactionActive,
    DebitApplied,
    OrderInserted,
    Committed,
    Aborted,
}

impl PlacementStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlacementStage::Committed | PlacementStage::Aborted)
    }
}

/// One in-flight placement. Owns its session, so the session is released
/// when the placement is dropped, whatever stage it reached.
pub(crate) struct OrderPlacement {
    session: Box<dyn LedgerSession>,
    stage: PlacementStage,
}

impl OrderPlacement {
    /// Open a session and begin a transaction with `options`.
    pub(crate) async fn begin(
        store: &dyn LedgerStore,
        options: TransactionOptions,
    ) -> Result<Self, AppError> {
        let session = store
            .start_session()
            .await
            .map_err(AppError::SessionUnavailable)?;

        let mut placement = Self {
            session,
            stage: PlacementStage::Idle,
        };
        placement.advance(PlacementStage::SessionOpen);

        if let Err(e) = placement.session.start_transaction(options).await {
            placement.advance(PlacementStage::Aborted);
            return Err(AppError::TransactionStart(e));
        }
        placement.advance(PlacementStage::TransactionActive);
        Ok(placement)
    }

    pub(crate) fn stage(&self) -> PlacementStage {
        self.stage
    }

    /// Apply the debit and insert, then commit. Any failure aborts the
    /// transaction before the error is returned.
    pub(crate) async fn run(
        &mut self,
        user_id: UserId,
        amount: Amount,
    ) -> Result<Order, AppError> {
        let order = match self.apply(user_id, amount).await {
            Ok(order) => order,
            Err(err) => {
                self.abort(&err).await;
                return Err(err);
            }
        };

        if let Err(e) = self.session.commit_transaction().await {
            let err = AppError::Commit(e);
            self.abort(&err).await;
            return Err(err);
        }
        self.advance(PlacementStage::Committed);

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            amount = order.amount,
            "order placed"
        );
        Ok(order)
    }

    async fn apply(&mut self, user_id: UserId, amount: Amount) -> Result<Order, AppError> {
        let delta = debit_delta(amount).ok_or(AppError::AmountOverflow(amount))?;

        let matched = self
            .session
            .increment_balance(user_id, delta)
            .await
            .map_err(AppError::Debit)?;
        if matched == 0 {
            warn!(%user_id, amount, "debit matched no user, inserting order anyway");
        }
        self.advance(PlacementStage::DebitApplied);

        let order = self
            .session
            .insert_order(NewOrder::new(user_id, amount))
            .await
            .map_err(AppError::InsertOrder)?;
        self.advance(PlacementStage::OrderInserted);
        Ok(order)
    }

    async fn abort(&mut self, cause: &AppError) {
        warn!(stage = ?self.stage, error = %cause, "aborting order placement");
        // If this fails the session drop still rolls the transaction back.
        if let Err(e) = self.session.abort_transaction().await {
            warn!(error = %e, "abort failed");
        }
        self.advance(PlacementStage::Aborted);
    }

    fn advance(&mut self, next: PlacementStage) {
        debug!(from = ?self.stage, to = ?next, "placement stage");
        self.stage = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MockLedgerSession, MockLedgerStore, StoreError};
    use mockall::Sequence;
    use mockall::predicate::eq;
    use rstest::rstest;
    use uuid::Uuid;

    fn injected() -> StoreError {
        StoreError::Other(anyhow::anyhow!("injected"))
    }

    fn store_with(session: MockLedgerSession) -> MockLedgerStore {
        let mut store = MockLedgerStore::new();
        store
            .expect_start_session()
            .return_once(move || Ok(Box::new(session) as Box<dyn LedgerSession>));
        store
    }

    #[derive(Debug, Clone, Copy)]
    enum FailAt {
        Debit,
        Insert,
        Commit,
    }

    /// A session whose steps succeed up to `fail_at`, which then fails and
    /// must be followed by exactly one abort.
    fn failing_session(fail_at: FailAt) -> MockLedgerSession {
        let mut session = MockLedgerSession::new();
        session.expect_start_transaction().returning(|_| Ok(()));

        session
            .expect_increment_balance()
            .returning(move |_, _| match fail_at {
                FailAt::Debit => Err(injected()),
                _ => Ok(1),
            });
        session
            .expect_insert_order()
            .times(if matches!(fail_at, FailAt::Debit) { 0 } else { 1 })
            .returning(move |order| match fail_at {
                FailAt::Insert => Err(injected()),
                _ => Ok(order.with_id(Uuid::new_v4())),
            });
        session
            .expect_commit_transaction()
            .times(if matches!(fail_at, FailAt::Commit) { 1 } else { 0 })
            .returning(|| Err(injected()));
        session
            .expect_abort_transaction()
            .times(1)
            .returning(|| Ok(()));

        session
    }

    #[tokio::test]
    async fn test_successful_placement_runs_steps_in_order() {
        let user_id = Uuid::new_v4();
        let mut seq = Sequence::new();
        let mut session = MockLedgerSession::new();

        session
            .expect_start_transaction()
            .with(eq(TransactionOptions::snapshot_majority()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        session
            .expect_increment_balance()
            .with(eq(user_id), eq(-50))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(1));
        session
            .expect_insert_order()
            .withf(move |order| order.user_id == user_id && order.amount == 50)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|order| Ok(order.with_id(Uuid::new_v4())));
        session
            .expect_commit_transaction()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        session.expect_abort_transaction().times(0);

        let store = store_with(session);
        let mut placement = OrderPlacement::begin(&store, TransactionOptions::snapshot_majority())
            .await
            .unwrap();
        assert_eq!(placement.stage(), PlacementStage::TransactionActive);

        let order = placement.run(user_id, 50).await.unwrap();
        assert_eq!(order.user_id, user_id);
        assert_eq!(order.amount, 50);
        assert_eq!(placement.stage(), PlacementStage::Committed);
    }

    #[rstest]
    #[case(FailAt::Debit)]
    #[case(FailAt::Insert)]
    #[case(FailAt::Commit)]
    #[tokio::test]
    async fn test_failed_step_aborts(#[case] fail_at: FailAt) {
        let user_id = Uuid::new_v4();
        let store = store_with(failing_session(fail_at));

        let mut placement = OrderPlacement::begin(&store, TransactionOptions::snapshot_majority())
            .await
            .unwrap();
        let err = placement.run(user_id, 50).await.unwrap_err();

        match fail_at {
            FailAt::Debit => assert!(matches!(err, AppError::Debit(_))),
            FailAt::Insert => assert!(matches!(err, AppError::InsertOrder(_))),
            FailAt::Commit => assert!(matches!(err, AppError::Commit(_))),
        }
        assert_eq!(placement.stage(), PlacementStage::Aborted);
        assert!(placement.stage().is_terminal());
    }

    #[tokio::test]
    async fn test_failed_abort_still_reports_original_error() {
        let user_id = Uuid::new_v4();
        let mut session = MockLedgerSession::new();
        session.expect_start_transaction().returning(|_| Ok(()));
        session
            .expect_increment_balance()
            .returning(|_, _| Err(injected()));
        session
            .expect_abort_transaction()
            .times(1)
            .returning(|| Err(injected()));

        let store = store_with(session);
        let mut placement = OrderPlacement::begin(&store, TransactionOptions::snapshot_majority())
            .await
            .unwrap();
        let err = placement.run(user_id, 50).await.unwrap_err();

        assert!(matches!(err, AppError::Debit(_)));
        assert_eq!(placement.stage(), PlacementStage::Aborted);
    }

    #[tokio::test]
    async fn test_overflowing_amount_aborts_before_debit() {
        let mut session = MockLedgerSession::new();
        session.expect_start_transaction().returning(|_| Ok(()));
        session.expect_increment_balance().times(0);
        session
            .expect_abort_transaction()
            .times(1)
            .returning(|| Ok(()));

        let store = store_with(session);
        let mut placement = OrderPlacement::begin(&store, TransactionOptions::snapshot_majority())
            .await
            .unwrap();
        let err = placement
            .run(Uuid::new_v4(), Amount::MIN)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AmountOverflow(Amount::MIN)));
        assert_eq!(placement.stage(), PlacementStage::Aborted);
    }

    #[tokio::test]
    async fn test_session_failure_is_store_unavailable() {
        let mut store = MockLedgerStore::new();
        store
            .expect_start_session()
            .returning(|| Err(injected()));

        let result = OrderPlacement::begin(&store, TransactionOptions::snapshot_majority()).await;
        assert!(matches!(result, Err(AppError::SessionUnavailable(_))));
    }

    #[tokio::test]
    async fn test_transaction_start_failure_skips_abort() {
        let mut session = MockLedgerSession::new();
        session
            .expect_start_transaction()
            .returning(|_| Err(injected()));
        session.expect_abort_transaction().times(0);

        let store = store_with(session);
        let result = OrderPlacement::begin(&store, TransactionOptions::snapshot_majority()).await;
        assert!(matches!(result, Err(AppError::TransactionStart(_))));
    }
}
