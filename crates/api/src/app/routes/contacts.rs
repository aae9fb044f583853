use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::get,
};
use serde_json::json;

use bazaar_orders::ContactDraft;

use crate::app::dto::{DeleteContactsRequest, UpdateContactRequest};
use crate::app::errors::ApiResult;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route(
        "/",
        get(list_contacts)
            .post(create_contact)
            .put(update_contact)
            .delete(delete_contacts),
    )
}

pub async fn list_contacts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    let contacts = services.contacts.list(principal.user_id()).await?;
    Ok(Json(json!({ "status": true, "contacts": contacts })))
}

pub async fn create_contact(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<ContactDraft>,
) -> ApiResult<impl IntoResponse> {
    let contact = services.contacts.create(principal.user_id(), body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": true, "contact": contact })),
    ))
}

pub async fn update_contact(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<UpdateContactRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = body.contact_id()?;
    let contact = services
        .contacts
        .update(principal.user_id(), id, body.patch)
        .await?;
    Ok(Json(json!({ "status": true, "contact": contact })))
}

pub async fn delete_contacts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<DeleteContactsRequest>,
) -> ApiResult<impl IntoResponse> {
    let ids = body.ids()?;
    let deleted = services.contacts.delete(principal.user_id(), &ids).await?;
    Ok(Json(json!({ "status": true, "deleted": deleted })))
}
