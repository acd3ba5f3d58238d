use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use cosecha_db::models::{Invitation, InvitationState, RoleCode};
use cosecha_services::tenancy::{AcceptRequest, InviteRequest};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::tenant::MembershipResponse;
use crate::{
    error::ApiError,
    extractors::{
        auth::AuthUser,
        tenant::{TenantId, parse_object_id},
    },
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub id: String,
    pub tenant_id: String,
    pub email: String,
    pub role: String,
    pub state: InvitationState,
    pub invited_by: String,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub superseded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InvitationResponse {
    fn new(inv: Invitation, state: InvitationState) -> Self {
        Self {
            id: inv.id.to_hex(),
            tenant_id: inv.tenant_id.to_hex(),
            email: inv.email,
            role: inv.role.as_str().to_string(),
            state,
            invited_by: inv.invited_by,
            expires_at: inv.expires_at.to_chrono(),
            accepted_at: inv.accepted_at.map(|d| d.to_chrono()),
            revoked_at: inv.revoked_at.map(|d| d.to_chrono()),
            superseded_at: inv.superseded_at.map(|d| d.to_chrono()),
            created_at: inv.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct InviteBody {
    pub tenant_id: String,
    #[validate(email)]
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub invitation: InvitationResponse,
    pub invite_url: String,
}

/// Public view behind the emailed link.
#[derive(Debug, Serialize)]
pub struct InvitationInfoResponse {
    pub email: String,
    pub role: String,
    pub tenant_id: String,
    pub tenant_name: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AcceptBody {
    #[validate(length(min = 1))]
    pub token: String,
    /// Session of the invitee, issued by the identity provider after they
    /// followed the emailed link.
    #[validate(length(min = 1))]
    pub access_token: String,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub tenant_id: String,
    pub membership: MembershipResponse,
}

pub async fn invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<InviteBody>,
) -> Result<(StatusCode, Json<InviteResponse>), ApiError> {
    body.validate()?;

    let tenant_id = parse_object_id(&body.tenant_id, "tenant_id")?;
    let role: RoleCode = body
        .role
        .parse()
        .map_err(|e: cosecha_db::models::UnknownCode| ApiError::Validation(e.to_string()))?;

    let issued = state
        .tenants
        .invite_user(
            InviteRequest {
                tenant_id,
                email: body.email,
                role,
            },
            &auth.user_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InviteResponse {
            invitation: InvitationResponse::new(issued.invitation, InvitationState::Pending),
            invite_url: issued.invite_url,
        }),
    ))
}

pub async fn get_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InvitationInfoResponse>, ApiError> {
    let details = state.tenants.get_invitation(&token).await?;
    let inv = details.invitation;

    Ok(Json(InvitationInfoResponse {
        email: inv.email,
        role: inv.role.as_str().to_string(),
        tenant_id: inv.tenant_id.to_hex(),
        tenant_name: details.tenant_name,
        expires_at: inv.expires_at.to_chrono(),
    }))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    Json(body): Json<AcceptBody>,
) -> Result<Json<AcceptResponse>, ApiError> {
    body.validate()?;

    let accepted = state
        .tenants
        .accept_invitation(AcceptRequest {
            token: body.token,
            access_token: body.access_token,
            password: body.password,
            full_name: body.full_name,
            phone: body.phone,
        })
        .await?;

    Ok(Json(AcceptResponse {
        tenant_id: accepted.tenant_id.to_hex(),
        membership: accepted.membership.into(),
    }))
}

/// Shares its path with the public lookup; here the segment is the
/// invitation id.
pub async fn revoke(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<InvitationResponse>, ApiError> {
    let id = parse_object_id(&id, "invitation id")?;
    let invitation = state.tenants.revoke_invitation(id, &auth.user_id).await?;
    let current = state.tenants.invitation_state(&invitation);
    Ok(Json(InvitationResponse::new(invitation, current)))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    TenantId(tenant_id): TenantId,
) -> Result<Json<Vec<InvitationResponse>>, ApiError> {
    let invitations = state
        .tenants
        .list_invitations(tenant_id, &auth.user_id)
        .await?;

    Ok(Json(
        invitations
            .into_iter()
            .map(|inv| {
                let current = state.tenants.invitation_state(&inv);
                InvitationResponse::new(inv, current)
            })
            .collect(),
    ))
}
