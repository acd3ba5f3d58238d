use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cosecha_services::ServiceError;
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    Validation(String),
    /// Seat or field quota exhausted.
    QuotaExceeded(String),
    /// Invitation state errors, each with its own error code.
    Invitation(&'static str, String),
    Unavailable(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation", msg),
            ApiError::QuotaExceeded(msg) => (StatusCode::CONFLICT, "quota_exceeded", msg),
            ApiError::Invitation(code, msg) => (StatusCode::BAD_REQUEST, code, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Validation(_) => ApiError::Validation(message),
            ServiceError::Unauthorized(_) => ApiError::Unauthorized(message),
            ServiceError::Forbidden(_) => ApiError::Forbidden(message),
            ServiceError::NotFound(_) => ApiError::NotFound(message),
            ServiceError::SlugTaken(_)
            | ServiceError::DuplicateInvitation(_)
            | ServiceError::Conflict(_)
            | ServiceError::AlreadyTerminal => ApiError::Conflict(message),
            ServiceError::QuotaExceeded(_) => ApiError::QuotaExceeded(message),
            ServiceError::InvitationRevoked => ApiError::Invitation("invitation_revoked", message),
            ServiceError::InvitationAlreadyAccepted => {
                ApiError::Invitation("invitation_already_accepted", message)
            }
            ServiceError::InvitationExpired => ApiError::Invitation("invitation_expired", message),
            ServiceError::EmailMismatch => ApiError::Invitation("email_mismatch", message),
            ServiceError::Unavailable(_) => {
                error!(%message, "Downstream unavailable");
                ApiError::Unavailable(message)
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}
