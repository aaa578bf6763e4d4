use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};

use crate::application::LedgerService;
use crate::domain::{Amount, Order, UserId};

use super::{ApiResult, MessageBody};

/// Request body for `POST /place_order`. A `user_id` that is not a UUID is
/// rejected while parsing; whether the user exists is not checked.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: UserId,
    pub amount: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrdersBody {
    pub orders: Vec<Order>,
}

/// Debit the user and record the order in one transaction. Any failure in
/// the transaction is a 500; the body only confirms success.
#[post("/place_order")]
pub async fn place_order(
    service: web::Data<LedgerService>,
    payload: web::Json<PlaceOrderRequest>,
) -> ApiResult<HttpResponse> {
    let PlaceOrderRequest { user_id, amount } = payload.into_inner();
    service.place_order(user_id, amount).await?;
    Ok(HttpResponse::Ok().json(MessageBody::new("Order placed successfully")))
}

#[get("/orders")]
pub async fn list_orders(service: web::Data<LedgerService>) -> ApiResult<web::Json<OrdersBody>> {
    let orders = service.list_orders().await?;
    Ok(web::Json(OrdersBody { orders }))
}
