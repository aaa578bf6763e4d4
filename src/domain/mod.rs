mod amount;
mod order;
mod user;

pub use amount::*;
pub use order::*;
pub use user::*;
