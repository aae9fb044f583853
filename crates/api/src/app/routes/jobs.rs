use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use crate::app::dto::JobView;
use crate::app::errors::ApiResult;
use crate::app::routes::partner::parse_job_id;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_job))
        .route("/:id/retry", post(retry_job))
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job = services.jobs.status(principal.user_id(), parse_job_id(&id)?)?;
    Ok(Json(json!({ "status": true, "job": JobView::from(&job) })))
}

/// Re-queue one of the caller's failed jobs.
pub async fn retry_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job = services.jobs.retry(principal.user_id(), parse_job_id(&id)?)?;
    Ok(Json(json!({ "status": true, "job": JobView::from(&job) })))
}
