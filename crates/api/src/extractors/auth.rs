use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use cosecha_services::identity::TokenClaims;

use crate::{error::ApiError, state::AppState};

/// The caller, resolved from a bearer token (Authorization header or the
/// `access_token` cookie) and verified by the identity provider.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub token: String,
    pub claims: TokenClaims,
}

pub(crate) fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .or_else(|| {
            parts
                .headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .and_then(|cookies| {
                    cookies.split(';').find_map(|cookie| {
                        cookie
                            .trim()
                            .strip_prefix("access_token=")
                            .map(|s| s.to_string())
                    })
                })
        })
        .filter(|token| !token.is_empty())
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;

        let verified = app_state.auth.authenticate(&token).await?;

        Ok(AuthUser {
            user_id: verified.user_id,
            email: verified.email,
            token,
            claims: verified.claims,
        })
    }
}
