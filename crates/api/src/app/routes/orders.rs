use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use bazaar_core::OrderId;
use bazaar_orders::CheckoutRequest;

use crate::app::errors::ApiResult;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(checkout))
        .route("/:id", get(get_order))
}

/// The caller's placed orders, newest first.
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    let orders = services.orders.list_orders(principal.user_id()).await?;
    Ok(Json(json!({ "status": true, "orders": orders })))
}

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<CheckoutRequest>,
) -> ApiResult<impl IntoResponse> {
    let (order, contact) = body.validate()?;
    let outcome = services
        .orders
        .checkout(principal.user_id(), order, contact)
        .await?;
    Ok(Json(json!({
        "status": true,
        "order": outcome.order,
        "notification_job": outcome.notification,
    })))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: OrderId = id.parse()?;
    let order = services.orders.get_order(principal.user_id(), id).await?;
    Ok(Json(json!({ "status": true, "order": order })))
}
