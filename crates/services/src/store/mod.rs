//! Persistence seams for the tenancy core.
//!
//! Each trait is implemented twice: by the MongoDB DAOs in [`crate::dao`] and
//! by [`MemoryStore`] for tests and standalone runs. Both honour the same
//! uniqueness rules and make counter changes atomic per tenant.

mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use cosecha_db::models::{
    AuditLog, Counter, Invitation, Membership, MembershipStatus, ModuleCode, Profile, Tenant,
    TenantModule,
};
use mongodb::Database;

use crate::dao::{
    AuditDao, DaoResult, InvitationDao, MembershipDao, ModuleDao, ProfileDao, TenantDao,
};

pub use memory::MemoryStore;

/// Partial update of a tenant. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct TenantPatch {
    pub name: Option<String>,
    pub plan: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub max_users: Option<u32>,
    pub max_fields: Option<u32>,
}

impl TenantPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.plan.is_none()
            && self.contact_name.is_none()
            && self.contact_email.is_none()
            && self.max_users.is_none()
            && self.max_fields.is_none()
    }
}

/// Fields to write on a profile upsert. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub default_tenant_id: Option<ObjectId>,
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Fails with `DuplicateKey` when the slug is taken.
    async fn create(&self, tenant: &Tenant) -> DaoResult<()>;
    async fn get_by_id(&self, id: ObjectId) -> DaoResult<Option<Tenant>>;
    async fn get_by_slug(&self, slug: &str) -> DaoResult<Option<Tenant>>;
    async fn list_by_ids(&self, ids: &[ObjectId]) -> DaoResult<Vec<Tenant>>;
    /// Rejects a maximum below the current usage with `Validation`.
    async fn update(&self, id: ObjectId, patch: &TenantPatch) -> DaoResult<Tenant>;
    async fn delete(&self, id: ObjectId) -> DaoResult<()>;
    /// Atomically bumps `counter` unless it already sits at its maximum,
    /// in which case `QuotaExceeded` is returned and nothing changes.
    async fn increment(&self, id: ObjectId, counter: Counter) -> DaoResult<Tenant>;
    /// Atomically lowers `counter`, never below zero.
    async fn decrement(&self, id: ObjectId, counter: Counter) -> DaoResult<Tenant>;

    async fn increment_users(&self, id: ObjectId) -> DaoResult<Tenant> {
        self.increment(id, Counter::Users).await
    }

    async fn decrement_users(&self, id: ObjectId) -> DaoResult<Tenant> {
        self.decrement(id, Counter::Users).await
    }

    async fn increment_fields(&self, id: ObjectId) -> DaoResult<Tenant> {
        self.increment(id, Counter::Fields).await
    }

    async fn decrement_fields(&self, id: ObjectId) -> DaoResult<Tenant> {
        self.decrement(id, Counter::Fields).await
    }
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Fails with `DuplicateKey` when the user already has an active
    /// membership in the tenant.
    async fn create(&self, membership: &Membership) -> DaoResult<()>;
    async fn get_active(&self, tenant_id: ObjectId, user_id: &str)
    -> DaoResult<Option<Membership>>;
    async fn list_active_by_user(&self, user_id: &str) -> DaoResult<Vec<Membership>>;
    async fn list_by_tenant(&self, tenant_id: ObjectId) -> DaoResult<Vec<Membership>>;
    /// Flips an active membership to inactive. `None` when it was not active,
    /// so only one of several concurrent callers gets the row back.
    async fn deactivate(&self, id: ObjectId) -> DaoResult<Option<Membership>>;
    async fn delete(&self, id: ObjectId) -> DaoResult<()>;
}

#[async_trait]
pub trait InvitationStore: Send + Sync {
    /// Fails with `DuplicateKey` on a token collision or when an outstanding
    /// invitation already exists for the same tenant and email.
    async fn create(&self, invitation: &Invitation) -> DaoResult<()>;
    async fn get_by_id(&self, id: ObjectId) -> DaoResult<Option<Invitation>>;
    async fn get_by_token_hash(&self, token_hash: &str) -> DaoResult<Option<Invitation>>;
    /// The invitation for `(tenant_id, email)` with no closing marker set.
    async fn find_outstanding(
        &self,
        tenant_id: ObjectId,
        email: &str,
    ) -> DaoResult<Option<Invitation>>;
    /// Newest first.
    async fn list_by_tenant(&self, tenant_id: ObjectId) -> DaoResult<Vec<Invitation>>;
    /// Sets `accepted_at` only while no closing marker is set. Returns
    /// whether the marker was written.
    async fn mark_accepted(&self, id: ObjectId, at: DateTime) -> DaoResult<bool>;
    /// Sets `revoked_at` only while no closing marker is set.
    async fn mark_revoked(&self, id: ObjectId, at: DateTime) -> DaoResult<bool>;
    /// Sets `superseded_at` only while no closing marker is set.
    async fn mark_superseded(&self, id: ObjectId, at: DateTime) -> DaoResult<bool>;
    async fn delete(&self, id: ObjectId) -> DaoResult<()>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: &str) -> DaoResult<Option<Profile>>;
    async fn upsert(&self, user_id: &str, update: &ProfileUpdate) -> DaoResult<Profile>;
    async fn clear_default_tenant(&self, user_id: &str) -> DaoResult<()>;
}

#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn list_enabled(&self, tenant_id: ObjectId) -> DaoResult<Vec<TenantModule>>;
    /// Upserts one row per code with the given flag.
    async fn set(&self, tenant_id: ObjectId, codes: &[ModuleCode], enabled: bool)
    -> DaoResult<()>;
    async fn delete_for_tenant(&self, tenant_id: ObjectId) -> DaoResult<()>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditLog) -> DaoResult<()>;
    /// Newest first.
    async fn list_by_tenant(&self, tenant_id: ObjectId, limit: i64) -> DaoResult<Vec<AuditLog>>;
}

/// The set of stores the services run against.
#[derive(Clone)]
pub struct Stores {
    pub tenants: Arc<dyn TenantStore>,
    pub memberships: Arc<dyn MembershipStore>,
    pub invitations: Arc<dyn InvitationStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub modules: Arc<dyn ModuleStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    pub fn mongo(db: &Database, timeout: Duration) -> Self {
        Self {
            tenants: Arc::new(TenantDao::new(db, timeout)),
            memberships: Arc::new(MembershipDao::new(db, timeout)),
            invitations: Arc::new(InvitationDao::new(db, timeout)),
            profiles: Arc::new(ProfileDao::new(db, timeout)),
            modules: Arc::new(ModuleDao::new(db, timeout)),
            audit: Arc::new(AuditDao::new(db, timeout)),
        }
    }

    pub fn memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            tenants: store.clone(),
            memberships: store.clone(),
            invitations: store.clone(),
            profiles: store.clone(),
            modules: store.clone(),
            audit: store,
        }
    }
}
