//! Tenant lifecycle, invitations and quota enforcement.

mod invitation;
mod quota;
mod saga;
mod service;

use std::sync::Arc;

use bson::oid::ObjectId;
use cosecha_db::models::{AuditLog, Membership, Tenant};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{ServiceError, ServiceResult};
use crate::store::{AuditStore, MembershipStore, Stores};

pub use invitation::{InvitationEngine, IssuedInvitation};
pub use quota::{PlanLimits, QuotaPolicy};
pub use saga::Saga;
pub use service::{
    AcceptRequest, Accepted, AdminAccount, CounterUsage, InvitationDetails, InvitationIssued,
    InviteRequest, NewTenant, OwnerDetails, Provisioned, TenancyOptions, TenantLimits,
    TenantService,
};

/// Lowercases, turns whitespace runs into `-` and drops everything outside
/// `[a-z0-9-]`.
pub fn normalize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut in_space = false;
    for c in raw.trim().to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            slug.push(c);
        }
    }
    slug
}

/// 256-bit random invitation token, hex encoded.
pub(crate) fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub(crate) fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Active membership of `user_id` with an owner or admin role.
pub(crate) async fn require_manager(
    memberships: &dyn MembershipStore,
    tenant_id: ObjectId,
    user_id: &str,
) -> ServiceResult<Membership> {
    match memberships.get_active(tenant_id, user_id).await? {
        Some(membership) if membership.role.is_manager() => Ok(membership),
        _ => Err(ServiceError::Forbidden(
            "Only the tenant owner or an admin can do this".to_string(),
        )),
    }
}

pub(crate) async fn require_member(
    memberships: &dyn MembershipStore,
    tenant_id: ObjectId,
    user_id: &str,
) -> ServiceResult<Membership> {
    memberships
        .get_active(tenant_id, user_id)
        .await?
        .ok_or_else(|| ServiceError::Forbidden("Not a member of this tenant".to_string()))
}

/// A tenant together with the caller's membership in it.
#[derive(Debug, Clone)]
pub struct UserTenant {
    pub tenant: Tenant,
    pub membership: Membership,
}

/// Active memberships of `user_id` joined with their tenants, oldest first.
pub async fn load_user_tenants(stores: &Stores, user_id: &str) -> ServiceResult<Vec<UserTenant>> {
    let memberships = stores.memberships.list_active_by_user(user_id).await?;
    let ids: Vec<ObjectId> = memberships.iter().map(|m| m.tenant_id).collect();
    let tenants = stores.tenants.list_by_ids(&ids).await?;

    Ok(memberships
        .into_iter()
        .filter_map(|membership| {
            tenants
                .iter()
                .find(|t| t.id == membership.tenant_id)
                .cloned()
                .map(|tenant| UserTenant { tenant, membership })
        })
        .collect())
}

/// Best-effort audit trail: a failed write is logged, never surfaced.
#[derive(Clone)]
pub(crate) struct Auditor {
    store: Arc<dyn AuditStore>,
}

impl Auditor {
    pub(crate) fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub(crate) async fn record(&self, entry: AuditLog) {
        if let Err(err) = self.store.append(&entry).await {
            warn!(
                tenant_id = %entry.tenant_id,
                action = %entry.action,
                error = %err,
                "Failed to write audit entry"
            );
        }
    }
}
