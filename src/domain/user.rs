use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Amount;

pub type UserId = Uuid;

/// A user with a mutable balance. Only order placement changes the balance
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub balance: Amount,
}

/// A user that has not been stored yet. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub balance: Amount,
}

impl NewUser {
    pub fn new(name: impl Into<String>, balance: Amount) -> Self {
        Self {
            name: name.into(),
            balance,
        }
    }

    pub fn with_id(self, id: UserId) -> User {
        User {
            id,
            name: self.name,
            balance: self.balance,
        }
    }
}
