use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
};
use cosecha_db::models::Profile;
use cosecha_services::{
    AuthUser as SessionUser,
    identity::Session,
    tenancy::{OwnerDetails, TenantLimits},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    MessageResponse,
    tenant::{CreateTenantRequest, ProvisionedResponse, UserTenantResponse},
};
use crate::{
    error::ApiError,
    extractors::{auth::AuthUser, tenant::TenantId},
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 4, max = 10))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterTenantRequest {
    /// Session obtained from `verify-otp`.
    #[validate(length(min = 1))]
    pub access_token: String,
    #[validate(nested)]
    pub tenant: CreateTenantRequest,
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetPasswordRequest {
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_in: session.expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub default_tenant_id: Option<String>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            full_name: p.full_name,
            phone: p.phone,
            default_tenant_id: p.default_tenant_id.map(|id| id.to_hex()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub profile: Option<ProfileResponse>,
    pub tenant_id: Option<String>,
    pub role: Option<String>,
    pub tenant: Option<UserTenantResponse>,
    pub tenants: Vec<UserTenantResponse>,
}

impl From<SessionUser> for UserResponse {
    fn from(user: SessionUser) -> Self {
        Self {
            tenant_id: user.tenant_id().map(|id| id.to_hex()),
            role: user.role().map(|r| r.as_str().to_string()),
            id: user.id,
            email: user.email,
            profile: user.profile.map(Into::into),
            tenant: user.tenant.map(Into::into),
            tenants: user.tenants.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct TokenValidity {
    pub valid: bool,
    pub user: Option<UserResponse>,
}

fn session_cookie(token: &str, max_age: u64) -> Result<HeaderValue, ApiError> {
    format!("access_token={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}")
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid token".to_string()))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<LoginResponse>), ApiError> {
    body.validate()?;

    let (session, user) = state.auth.login(&body.email, &body.password).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&session.access_token, session.expires_in)?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            session: SessionResponse::from(&session),
            user: user.into(),
        }),
    ))
}

pub async fn send_otp(
    State(state): State<AppState>,
    Json(body): Json<SendOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    body.validate()?;
    state.auth.send_owner_code(&body.email).await?;
    Ok(Json(MessageResponse::new("Verification code sent")))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    body.validate()?;
    let session = state.auth.verify_owner_code(&body.email, &body.code).await?;
    Ok(Json(SessionResponse::from(&session)))
}

pub async fn register_tenant(
    State(state): State<AppState>,
    Json(body): Json<RegisterTenantRequest>,
) -> Result<(StatusCode, Json<ProvisionedResponse>), ApiError> {
    body.validate()?;

    let owner = OwnerDetails {
        full_name: body.full_name,
        phone: body.phone,
        password: body.password,
    };
    let provisioned = state
        .tenants
        .register_tenant(body.tenant.into(), &body.access_token, owner)
        .await?;

    Ok((StatusCode::CREATED, Json(provisioned.into())))
}

/// Never fails on a bad token; reports it as invalid instead.
pub async fn validate_token(
    State(state): State<AppState>,
    Json(body): Json<ValidateTokenRequest>,
) -> Result<Json<TokenValidity>, ApiError> {
    match state.auth.validate_token(&body.token).await {
        Ok(user) => Ok(Json(TokenValidity {
            valid: true,
            user: Some(user.into()),
        })),
        Err(cosecha_services::ServiceError::Unauthorized(_)) => Ok(Json(TokenValidity {
            valid: false,
            user: None,
        })),
        Err(e) => Err(e.into()),
    }
}

pub async fn public_limits(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
) -> Result<Json<TenantLimits>, ApiError> {
    Ok(Json(state.tenants.get_tenant_limits(tenant_id).await?))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = match auth.email {
        Some(email) => state.auth.build_auth_user(&auth.user_id, &email).await?,
        None => state.auth.me(&auth.user_id).await?,
    };
    Ok(Json(user.into()))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<(HeaderMap, Json<MessageResponse>), ApiError> {
    state.auth.logout(&auth.token).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie("", 0)?);

    Ok((headers, Json(MessageResponse::new("Logged out"))))
}

pub async fn set_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    body.validate()?;
    state
        .auth
        .set_password(&auth.user_id, &body.password)
        .await?;
    Ok(Json(MessageResponse::new("Password updated")))
}
