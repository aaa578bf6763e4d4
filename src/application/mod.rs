// Application layer - use cases and orchestration.
// Every client (CLI, HTTP) goes through `LedgerService`; order placement runs
// as an `OrderPlacement` state machine over one store session.

pub mod error;
mod placement;
pub mod service;

pub use error::*;
pub use placement::PlacementStage;
pub use service::*;
