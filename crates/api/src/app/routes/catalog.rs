use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use bazaar_core::ListingId;

use crate::app::dto::{ListingQuery, PageQuery};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/products", get(search_listings))
        .route("/products/:id", get(get_listing))
        .route("/categories", get(list_categories))
        .route("/shops", get(list_shops))
}

pub async fn search_listings(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListingQuery>,
) -> ApiResult<impl IntoResponse> {
    let (filter, page) = query.into_filter()?;
    let page = services.catalog.search(filter, page).await?;
    Ok(Json(json!({ "status": true, "results": page })))
}

pub async fn get_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: ListingId = id.parse()?;
    let listing = services.catalog.listing(id).await?;
    Ok(Json(json!({ "status": true, "listing": listing })))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Query(page): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = services.catalog.categories(page.into_request()?).await?;
    Ok(Json(json!({ "status": true, "results": page })))
}

pub async fn list_shops(
    Extension(services): Extension<Arc<AppServices>>,
    Query(page): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = services.catalog.shops(page.into_request()?).await?;
    Ok(Json(json!({ "status": true, "results": page })))
}
