use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, UserId};

pub type OrderId = Uuid;

/// An order record. Orders are append-only: created once, inside the same
/// transaction as the matching balance debit, and never updated.
///
/// `user_id` is a plain reference. It is not checked against the users
/// collection, so an order may point at a user that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub amount: Amount,
    pub datetime: DateTime<Utc>,
}

/// An order about to be inserted. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub amount: Amount,
    pub datetime: DateTime<Utc>,
}

impl NewOrder {
    /// Stamp a new order with the current time.
    pub fn new(user_id: UserId, amount: Amount) -> Self {
        Self {
            user_id,
            amount,
            datetime: Utc::now(),
        }
    }

    pub fn with_id(self, id: OrderId) -> Order {
        Order {
            id,
            user_id: self.user_id,
            amount: self.amount,
            datetime: self.datetime,
        }
    }
}
