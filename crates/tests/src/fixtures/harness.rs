use std::sync::Arc;

use async_trait::async_trait;
use bson::{DateTime, oid::ObjectId};
use cosecha_config::Settings;
use cosecha_db::models::{Membership, Profile, RoleCode};
use cosecha_services::{
    AuthService, DaoError, DaoResult, LocalIdentityProvider, ManualClock, MemoryStore,
    QuotaPolicy, SessionTokens, Stores, TenancyOptions, TenantService,
    identity::{IdentityProvider, MailKind, OtpOptions, Session},
    store::{MembershipStore, ProfileStore, ProfileUpdate},
    tenancy::NewTenant,
};

/// Services wired directly, without HTTP, so individual stores can be
/// swapped for failing ones.
pub struct Harness {
    pub settings: Settings,
    pub tenants: TenantService,
    pub auth: AuthService,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<LocalIdentityProvider>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_stores(|_, _| {})
    }

    /// `customize` may replace any store; the memory store backs the rest.
    pub fn with_stores(customize: impl FnOnce(&mut Stores, &Arc<MemoryStore>)) -> Self {
        let settings = Settings::standalone();
        let store = Arc::new(MemoryStore::new());
        let mut stores = Stores::from_memory(store.clone());
        customize(&mut stores, &store);

        let identity = Arc::new(LocalIdentityProvider::new(SessionTokens::new(
            &settings.identity.jwt_secret,
            &settings.identity.audience,
            settings.identity.token_ttl_secs,
        )));
        let clock = Arc::new(ManualClock::new(DateTime::now()));
        let policy = Arc::new(QuotaPolicy::from_settings(&settings).expect("plans"));
        let options = TenancyOptions::from_settings(&settings).expect("tenancy options");

        let tenants = TenantService::new(
            stores.clone(),
            identity.clone(),
            policy,
            clock.clone(),
            options,
        );
        let auth = AuthService::new(identity.clone(), stores, settings.identity.audience.clone());

        Self {
            settings,
            tenants,
            auth,
            store,
            identity,
            clock,
        }
    }

    /// A verified session for `email`, creating the user if needed.
    pub async fn session(&self, email: &str) -> Session {
        let options = OtpOptions {
            create_user: true,
            data: serde_json::Value::Null,
        };
        self.identity.send_otp(email, &options).await.unwrap();
        let code = self
            .identity
            .last_mail(email, MailKind::Otp)
            .and_then(|m| m.code)
            .unwrap();
        self.identity.verify_otp(email, &code).await.unwrap()
    }

    pub fn new_tenant(slug: &str) -> NewTenant {
        NewTenant {
            name: format!("Finca {slug}"),
            slug: slug.to_string(),
            plan: None,
            contact_name: "Contacto".to_string(),
            contact_email: "contacto@finca.test".to_string(),
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Delegates to the memory store but fails every membership insert whose
/// role is not in `allowed`.
pub struct FailingMemberships {
    pub inner: Arc<MemoryStore>,
    pub allowed: Vec<RoleCode>,
}

impl FailingMemberships {
    pub fn rejecting_all(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            allowed: vec![],
        }
    }

    pub fn owners_only(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            allowed: vec![RoleCode::Owner],
        }
    }
}

#[async_trait]
impl MembershipStore for FailingMemberships {
    async fn create(&self, membership: &Membership) -> DaoResult<()> {
        if !self.allowed.contains(&membership.role) {
            return Err(DaoError::Timeout(std::time::Duration::from_millis(1)));
        }
        MembershipStore::create(self.inner.as_ref(), membership).await
    }

    async fn get_active(
        &self,
        tenant_id: ObjectId,
        user_id: &str,
    ) -> DaoResult<Option<Membership>> {
        self.inner.get_active(tenant_id, user_id).await
    }

    async fn list_active_by_user(&self, user_id: &str) -> DaoResult<Vec<Membership>> {
        self.inner.list_active_by_user(user_id).await
    }

    async fn list_by_tenant(&self, tenant_id: ObjectId) -> DaoResult<Vec<Membership>> {
        MembershipStore::list_by_tenant(self.inner.as_ref(), tenant_id).await
    }

    async fn deactivate(&self, id: ObjectId) -> DaoResult<Option<Membership>> {
        self.inner.deactivate(id).await
    }

    async fn delete(&self, id: ObjectId) -> DaoResult<()> {
        MembershipStore::delete(self.inner.as_ref(), id).await
    }
}

/// Hands membership reads back after an extra scheduler turn, the way a
/// network round-trip would, so concurrent callers interleave.
pub struct YieldingMemberships {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl MembershipStore for YieldingMemberships {
    async fn create(&self, membership: &Membership) -> DaoResult<()> {
        MembershipStore::create(self.inner.as_ref(), membership).await
    }

    async fn get_active(
        &self,
        tenant_id: ObjectId,
        user_id: &str,
    ) -> DaoResult<Option<Membership>> {
        let found = self.inner.get_active(tenant_id, user_id).await;
        tokio::task::yield_now().await;
        found
    }

    async fn list_active_by_user(&self, user_id: &str) -> DaoResult<Vec<Membership>> {
        self.inner.list_active_by_user(user_id).await
    }

    async fn list_by_tenant(&self, tenant_id: ObjectId) -> DaoResult<Vec<Membership>> {
        MembershipStore::list_by_tenant(self.inner.as_ref(), tenant_id).await
    }

    async fn deactivate(&self, id: ObjectId) -> DaoResult<Option<Membership>> {
        self.inner.deactivate(id).await
    }

    async fn delete(&self, id: ObjectId) -> DaoResult<()> {
        MembershipStore::delete(self.inner.as_ref(), id).await
    }
}

/// Profiles that can be read but never written.
pub struct FailingProfiles {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl ProfileStore for FailingProfiles {
    async fn get(&self, user_id: &str) -> DaoResult<Option<Profile>> {
        self.inner.get(user_id).await
    }

    async fn upsert(&self, _user_id: &str, _update: &ProfileUpdate) -> DaoResult<Profile> {
        Err(DaoError::Timeout(std::time::Duration::from_millis(1)))
    }

    async fn clear_default_tenant(&self, user_id: &str) -> DaoResult<()> {
        self.inner.clear_default_tenant(user_id).await
    }
}
