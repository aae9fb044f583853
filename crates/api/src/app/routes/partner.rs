//! Shop-side endpoints: price-list import, shop state, incoming orders.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use bazaar_auth::require_shop;
use bazaar_core::DomainError;
use bazaar_infra::jobs::{Job, JobId, JobKind, JobPayload};

use crate::app::dto::{ImportRequest, JobView};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/update", post(submit_import))
        .route("/update/:job_id", get(import_status))
        .route("/state", get(get_state).post(toggle_state))
        .route("/orders", get(shop_orders))
}

/// Accepts the import and returns a job handle; the import runs in the background.
pub async fn submit_import(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<ImportRequest>,
) -> ApiResult<impl IntoResponse> {
    require_shop(principal.principal())?;
    let source = body.into_source()?;
    let job = Job::new(
        principal.user_id(),
        JobPayload::ImportPriceList {
            source,
            user_id: principal.user_id(),
        },
    );
    let job_id = services.jobs.submit(job)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": true, "job_id": job_id })),
    ))
}

pub async fn import_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_job_id(&job_id)?;
    let job = services.jobs.status(principal.user_id(), id)?;
    if job.kind() != JobKind::ImportPriceList {
        return Err(ApiError(DomainError::not_found(format!("import job {id}"))));
    }
    Ok(Json(json!({ "status": true, "job": JobView::from(&job) })))
}

pub async fn get_state(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    let shop = services.shops.get_state(principal.principal()).await?;
    Ok(Json(json!({ "status": true, "shop": shop })))
}

pub async fn toggle_state(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    let shop = services.shops.toggle(principal.principal()).await?;
    Ok(Json(json!({ "status": true, "shop": shop })))
}

pub async fn shop_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    let orders = services.orders.list_shop_orders(principal.principal()).await?;
    Ok(Json(json!({ "status": true, "orders": orders })))
}

pub(crate) fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    raw.parse()
        .map_err(|_| ApiError(DomainError::invalid_arguments("job_id: must be a UUID")))
}
