//! Maps application errors and malformed bodies to JSON error responses.

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::application::AppError;

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, AppError>;

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        // Store details go to the log only.
        error!(error = %self, kind = ?self.kind(), "request failed");
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.public_message(),
        })
    }
}

/// Turn a body that fails to parse into a 400 carrying the parse message.
pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    warn!(path = %req.path(), error = %err, "rejected request body");
    let response = HttpResponse::BadRequest().json(ErrorBody {
        error: err.to_string(),
    });
    InternalError::from_response(err, response).into()
}
