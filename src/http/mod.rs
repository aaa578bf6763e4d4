//! HTTP adapter over [`LedgerService`].
//!
//! ```text
//! POST /users        {"name":"Ada","balance":100}
//! GET  /users
//! GET  /orders
//! POST /place_order  {"user_id":"<uuid>","amount":50}
//! ```

mod error;
mod orders;
mod server;
mod users;

pub use error::*;
pub use orders::*;
pub use server::serve;
pub use users::*;

use actix_web::web;
use serde::{Deserialize, Serialize};

use crate::application::LedgerService;

/// Confirmation body for successful writes.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Register the shared service, JSON body handling, and all routes.
pub fn configure(service: web::Data<LedgerService>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(service)
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(create_user)
            .service(list_users)
            .service(list_orders)
            .service(place_order);
    }
}
