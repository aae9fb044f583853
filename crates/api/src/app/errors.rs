use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use bazaar_auth::AuthzError;
use bazaar_core::DomainError;
use bazaar_infra::jobs::JobStoreError;

/// Domain failure rendered as `{status: false, error, message}`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            DomainError::InvalidArguments(_) | DomainError::Parse(_) => StatusCode::BAD_REQUEST,
            DomainError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::OwnershipConflict(_)
            | DomainError::ConstraintViolation(_)
            | DomainError::InvalidTransition(_) => StatusCode::CONFLICT,
            DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl From<JobStoreError> for ApiError {
    fn from(err: JobStoreError) -> Self {
        Self(err.into())
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let message = match &self.0 {
            DomainError::NotFound(m)
            | DomainError::Parse(m)
            | DomainError::PermissionDenied(m)
            | DomainError::OwnershipConflict(m)
            | DomainError::InvalidArguments(m)
            | DomainError::ConstraintViolation(m)
            | DomainError::InvalidTransition(m)
            | DomainError::Storage(m) => m.clone(),
        };
        json_error(status, self.0.code(), message)
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "status": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        let cases = [
            (DomainError::invalid_arguments("x"), StatusCode::BAD_REQUEST),
            (DomainError::parse("x"), StatusCode::BAD_REQUEST),
            (DomainError::permission_denied("x"), StatusCode::FORBIDDEN),
            (DomainError::not_found("x"), StatusCode::NOT_FOUND),
            (DomainError::ownership_conflict("x"), StatusCode::CONFLICT),
            (DomainError::constraint("x"), StatusCode::CONFLICT),
            (DomainError::invalid_transition("x"), StatusCode::CONFLICT),
            (DomainError::storage("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status_code(), status);
        }
    }
}
