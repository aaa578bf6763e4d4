use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};

use crate::application::LedgerService;
use crate::domain::{Amount, User};

use super::{ApiResult, MessageBody};

/// Request body for `POST /users`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub balance: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersBody {
    pub users: Vec<User>,
}

#[post("/users")]
pub async fn create_user(
    service: web::Data<LedgerService>,
    payload: web::Json<CreateUserRequest>,
) -> ApiResult<HttpResponse> {
    let CreateUserRequest { name, balance } = payload.into_inner();
    service.create_user(name, balance).await?;
    Ok(HttpResponse::Ok().json(MessageBody::new("User created successfully")))
}

#[get("/users")]
pub async fn list_users(service: web::Data<LedgerService>) -> ApiResult<web::Json<UsersBody>> {
    let users = service.list_users().await?;
    Ok(web::Json(UsersBody { users }))
}
