use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use cosecha_db::models::{Membership, Tenant, TenantModule};
use cosecha_services::{
    store::TenantPatch,
    tenancy::{AdminAccount, NewTenant, Provisioned, TenantLimits, UserTenant},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::MessageResponse;
use crate::{
    error::ApiError,
    extractors::{
        auth::AuthUser,
        tenant::{TenantId, parse_object_id},
    },
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub contact_name: String,
    pub contact_email: String,
    pub max_users: u32,
    pub max_fields: u32,
    pub current_users: u32,
    pub current_fields: u32,
    pub created_at: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id.to_hex(),
            name: t.name,
            slug: t.slug,
            plan: t.plan,
            contact_name: t.contact_name,
            contact_email: t.contact_email,
            max_users: t.max_users,
            max_fields: t.max_fields,
            current_users: t.current_users,
            current_fields: t.current_fields,
            created_at: t.created_at.to_chrono(),
        }
    }
}

/// What anonymous callers may learn about a tenant.
#[derive(Debug, Serialize)]
pub struct PublicTenantResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub role: String,
    pub status: String,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Membership> for MembershipResponse {
    fn from(m: Membership) -> Self {
        Self {
            id: m.id.to_hex(),
            tenant_id: m.tenant_id.to_hex(),
            user_id: m.user_id,
            role: m.role.as_str().to_string(),
            status: m.status.as_str().to_string(),
            accepted_at: m.accepted_at.map(|d| d.to_chrono()),
            created_at: m.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserTenantResponse {
    pub tenant: TenantResponse,
    pub membership: MembershipResponse,
}

impl From<UserTenant> for UserTenantResponse {
    fn from(ut: UserTenant) -> Self {
        Self {
            tenant: ut.tenant.into(),
            membership: ut.membership.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProvisionedResponse {
    pub tenant: TenantResponse,
    pub membership: MembershipResponse,
}

impl From<Provisioned> for ProvisionedResponse {
    fn from(p: Provisioned) -> Self {
        Self {
            tenant: p.tenant.into(),
            membership: p.membership.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModuleResponse {
    pub module_code: String,
    pub enabled: bool,
}

fn modules_response(modules: Vec<TenantModule>) -> Vec<ModuleResponse> {
    modules
        .into_iter()
        .map(|m| ModuleResponse {
            module_code: m.module_code.as_str().to_string(),
            enabled: m.enabled,
        })
        .collect()
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(min = 2, max = 60))]
    pub slug: String,
    pub plan: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub contact_name: String,
    #[validate(email)]
    pub contact_email: String,
}

impl From<CreateTenantRequest> for NewTenant {
    fn from(body: CreateTenantRequest) -> Self {
        NewTenant {
            name: body.name,
            slug: body.slug,
            plan: body.plan,
            contact_name: body.contact_name,
            contact_email: body.contact_email,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWithAdminRequest {
    #[validate(nested)]
    pub tenant: CreateTenantRequest,
    #[validate(email)]
    pub admin_email: String,
    #[validate(length(min = 8, max = 128))]
    pub admin_password: String,
    pub admin_full_name: Option<String>,
    pub admin_phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateWithAdminResponse {
    pub tenant: TenantResponse,
    pub membership: MembershipResponse,
    pub user_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTenantRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    pub plan: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub contact_name: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(range(min = 1))]
    pub max_users: Option<u32>,
    pub max_fields: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SlugQuery {
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct SlugAvailability {
    pub slug: String,
    pub available: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetModuleRequest {
    pub module_code: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkModulesRequest {
    #[validate(length(min = 1))]
    pub module_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetDefaultRequest {
    pub tenant_id: String,
}

#[derive(Debug, Serialize)]
pub struct QuotaCheckResponse {
    pub allowed: bool,
}

// --- public ---

pub async fn check_slug(
    State(state): State<AppState>,
    Query(query): Query<SlugQuery>,
) -> Result<Json<SlugAvailability>, ApiError> {
    let (slug, available) = state.tenants.check_slug(&query.slug).await?;
    Ok(Json(SlugAvailability { slug, available }))
}

pub async fn by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublicTenantResponse>, ApiError> {
    let tenant = state.tenants.get_tenant_by_slug(&slug).await?;
    Ok(Json(PublicTenantResponse {
        id: tenant.id.to_hex(),
        name: tenant.name,
        slug: tenant.slug,
    }))
}

pub async fn create_with_admin(
    State(state): State<AppState>,
    Json(body): Json<CreateWithAdminRequest>,
) -> Result<(StatusCode, Json<CreateWithAdminResponse>), ApiError> {
    body.validate()?;

    let admin = AdminAccount {
        email: body.admin_email,
        password: body.admin_password,
        full_name: body.admin_full_name,
        phone: body.admin_phone,
    };
    let (provisioned, user) = state
        .tenants
        .create_tenant_with_admin(body.tenant.into(), admin)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateWithAdminResponse {
            tenant: provisioned.tenant.into(),
            membership: provisioned.membership.into(),
            user_id: user.id,
        }),
    ))
}

// --- authenticated ---

pub async fn user_tenants(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<UserTenantResponse>>, ApiError> {
    let tenants = state.tenants.user_tenants(&auth.user_id).await?;
    Ok(Json(tenants.into_iter().map(Into::into).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<ProvisionedResponse>), ApiError> {
    body.validate()?;

    let provisioned = state
        .tenants
        .provision_tenant(body.into(), &auth.user_id, Default::default())
        .await?;

    Ok((StatusCode::CREATED, Json(provisioned.into())))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    TenantId(tenant_id): TenantId,
) -> Result<Json<TenantResponse>, ApiError> {
    let tenant = state.tenants.get_tenant(tenant_id, &auth.user_id).await?;
    Ok(Json(tenant.into()))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    TenantId(tenant_id): TenantId,
    Json(body): Json<UpdateTenantRequest>,
) -> Result<Json<TenantResponse>, ApiError> {
    body.validate()?;

    let patch = TenantPatch {
        name: body.name,
        plan: body.plan,
        contact_name: body.contact_name,
        contact_email: body.contact_email,
        max_users: body.max_users,
        max_fields: body.max_fields,
    };
    let tenant = state
        .tenants
        .update_tenant(tenant_id, patch, &auth.user_id)
        .await?;
    Ok(Json(tenant.into()))
}

pub async fn membership(
    State(state): State<AppState>,
    auth: AuthUser,
    TenantId(tenant_id): TenantId,
) -> Result<Json<Option<MembershipResponse>>, ApiError> {
    let membership = state
        .tenants
        .user_membership(tenant_id, &auth.user_id)
        .await?;
    Ok(Json(membership.map(Into::into)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, user_id)): Path<(String, String)>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let tenant_id = parse_object_id(&tenant_id, "tenant_id")?;
    let membership = state
        .tenants
        .remove_member(tenant_id, &user_id, &auth.user_id)
        .await?;
    Ok(Json(membership.into()))
}

pub async fn modules(
    State(state): State<AppState>,
    auth: AuthUser,
    TenantId(tenant_id): TenantId,
) -> Result<Json<Vec<ModuleResponse>>, ApiError> {
    let modules = state.tenants.list_modules(tenant_id, &auth.user_id).await?;
    Ok(Json(modules_response(modules)))
}

pub async fn set_module(
    State(state): State<AppState>,
    auth: AuthUser,
    TenantId(tenant_id): TenantId,
    Json(body): Json<SetModuleRequest>,
) -> Result<Json<Vec<ModuleResponse>>, ApiError> {
    let modules = state
        .tenants
        .set_module(tenant_id, &body.module_code, body.enabled, &auth.user_id)
        .await?;
    Ok(Json(modules_response(modules)))
}

pub async fn enable_modules(
    State(state): State<AppState>,
    auth: AuthUser,
    TenantId(tenant_id): TenantId,
    Json(body): Json<BulkModulesRequest>,
) -> Result<Json<Vec<ModuleResponse>>, ApiError> {
    body.validate()?;

    let modules = state
        .tenants
        .enable_modules(tenant_id, &body.module_codes, &auth.user_id)
        .await?;
    Ok(Json(modules_response(modules)))
}

pub async fn limits(
    State(state): State<AppState>,
    auth: AuthUser,
    TenantId(tenant_id): TenantId,
) -> Result<Json<TenantLimits>, ApiError> {
    require_membership(&state, tenant_id, &auth).await?;
    Ok(Json(state.tenants.get_tenant_limits(tenant_id).await?))
}

pub async fn can_add_user(
    State(state): State<AppState>,
    auth: AuthUser,
    TenantId(tenant_id): TenantId,
) -> Result<Json<QuotaCheckResponse>, ApiError> {
    require_membership(&state, tenant_id, &auth).await?;
    let allowed = state.tenants.can_add_user(tenant_id).await?;
    Ok(Json(QuotaCheckResponse { allowed }))
}

pub async fn can_add_field(
    State(state): State<AppState>,
    auth: AuthUser,
    TenantId(tenant_id): TenantId,
) -> Result<Json<QuotaCheckResponse>, ApiError> {
    require_membership(&state, tenant_id, &auth).await?;
    let allowed = state.tenants.can_add_field(tenant_id).await?;
    Ok(Json(QuotaCheckResponse { allowed }))
}

pub async fn set_default(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SetDefaultRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let tenant_id = parse_object_id(&body.tenant_id, "tenant_id")?;
    state
        .tenants
        .set_default_tenant(&auth.user_id, tenant_id)
        .await?;
    Ok(Json(MessageResponse::new("Default tenant updated")))
}

pub async fn clear_default(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    state.tenants.clear_default_tenant(&auth.user_id).await?;
    Ok(Json(MessageResponse::new("Default tenant cleared")))
}

async fn require_membership(
    state: &AppState,
    tenant_id: bson::oid::ObjectId,
    auth: &AuthUser,
) -> Result<(), ApiError> {
    match state
        .tenants
        .user_membership(tenant_id, &auth.user_id)
        .await?
    {
        Some(_) => Ok(()),
        None => Err(ApiError::Forbidden("Not a member of this tenant".to_string())),
    }
}
