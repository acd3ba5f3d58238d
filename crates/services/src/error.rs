use cosecha_db::models::Counter;
use thiserror::Error;
use tracing::error;

use crate::dao::DaoError;
use crate::identity::IdentityError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Slug '{0}' is already taken")]
    SlugTaken(String),
    #[error("An invitation for {0} is already pending")]
    DuplicateInvitation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Quota exceeded: the tenant has no {0} left on its plan")]
    QuotaExceeded(Counter),
    #[error("Invitation has been revoked")]
    InvitationRevoked,
    #[error("Invitation has already been accepted")]
    InvitationAlreadyAccepted,
    #[error("Invitation has expired")]
    InvitationExpired,
    #[error("The signed-in account does not match the invited email")]
    EmailMismatch,
    #[error("Invitation is already accepted or revoked")]
    AlreadyTerminal,
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<DaoError> for ServiceError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::NotFound => ServiceError::NotFound("Record"),
            DaoError::DuplicateKey(key) => ServiceError::Conflict(format!("Duplicate entry: {key}")),
            DaoError::QuotaExceeded(counter) => ServiceError::QuotaExceeded(counter),
            DaoError::Validation(msg) => ServiceError::Validation(msg),
            DaoError::Timeout(after) => {
                ServiceError::Unavailable(format!("store timed out after {after:?}"))
            }
            other => {
                error!(?other, "Store error");
                ServiceError::Unavailable("store error".to_string())
            }
        }
    }
}

impl From<IdentityError> for ServiceError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials => {
                ServiceError::Unauthorized("Invalid email or password".to_string())
            }
            IdentityError::TokenExpired => ServiceError::Unauthorized("Token expired".to_string()),
            IdentityError::InvalidToken(msg) => ServiceError::Unauthorized(msg),
            IdentityError::InvalidOtp => {
                ServiceError::Validation("Invalid or expired code".to_string())
            }
            IdentityError::UserExists => {
                ServiceError::Conflict("A user with this email already exists".to_string())
            }
            IdentityError::UserNotFound => ServiceError::NotFound("User"),
            IdentityError::Rejected { message, .. } => ServiceError::Validation(message),
            IdentityError::Unavailable(msg) => ServiceError::Unavailable(msg),
            IdentityError::HashError(msg) => {
                error!(%msg, "Password hashing failed");
                ServiceError::Unavailable("identity error".to_string())
            }
        }
    }
}
