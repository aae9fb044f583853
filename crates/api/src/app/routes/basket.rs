//! The buyer's basket: one open order per account, created on first access.

use std::sync::Arc;

use axum::{Json, Router, extract::Extension, response::IntoResponse, routing::get};
use serde_json::json;

use bazaar_orders::{AddItemsRequest, RemoveItemsRequest, UpdateItemsRequest};

use crate::app::errors::ApiResult;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route(
        "/",
        get(get_basket)
            .post(add_items)
            .put(update_items)
            .delete(remove_items),
    )
}

pub async fn get_basket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    let basket = services.orders.get_basket(principal.user_id()).await?;
    Ok(Json(json!({ "status": true, "basket": basket })))
}

pub async fn add_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<AddItemsRequest>,
) -> ApiResult<impl IntoResponse> {
    let items = body.into_items()?;
    let created = services.orders.add_items(principal.user_id(), &items).await?;
    Ok(Json(json!({
        "status": true,
        "created": created.len(),
        "items": created,
    })))
}

/// Malformed entries are skipped; `updated` counts the rows changed.
pub async fn update_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<UpdateItemsRequest>,
) -> ApiResult<impl IntoResponse> {
    let items = body.into_items()?;
    let updated = services
        .orders
        .update_quantities(principal.user_id(), &items)
        .await?;
    Ok(Json(json!({ "status": true, "updated": updated })))
}

pub async fn remove_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<RemoveItemsRequest>,
) -> ApiResult<impl IntoResponse> {
    let ids = body.ids()?;
    let deleted = services.orders.remove_items(principal.user_id(), &ids).await?;
    Ok(Json(json!({ "status": true, "deleted": deleted })))
}
