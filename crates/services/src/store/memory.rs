use std::collections::HashMap;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use cosecha_db::models::{
    AuditLog, Counter, Invitation, Membership, MembershipStatus, ModuleCode, Profile, Tenant,
    TenantModule,
};
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::{Mutex, RwLock};

use super::{
    AuditStore, InvitationStore, MembershipStore, ModuleStore, ProfileStore, ProfileUpdate,
    TenantPatch, TenantStore,
};
use crate::dao::{DaoError, DaoResult};

/// Process-local implementation of every store trait.
///
/// Uniqueness checks and their inserts happen under one lock (or one map
/// entry) so concurrent callers observe the same guarantees the MongoDB
/// indexes give.
#[derive(Default)]
pub struct MemoryStore {
    tenants: DashMap<ObjectId, Tenant>,
    slugs: DashMap<String, ObjectId>,
    memberships: RwLock<HashMap<ObjectId, Membership>>,
    invitations: RwLock<HashMap<ObjectId, Invitation>>,
    profiles: DashMap<String, Profile>,
    modules: DashMap<(ObjectId, ModuleCode), TenantModule>,
    audit: Mutex<Vec<AuditLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Module rows across all tenants.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn create(&self, tenant: &Tenant) -> DaoResult<()> {
        match self.slugs.entry(tenant.slug.clone()) {
            Entry::Occupied(_) => Err(DaoError::DuplicateKey(format!("slug {}", tenant.slug))),
            Entry::Vacant(slot) => {
                self.tenants.insert(tenant.id, tenant.clone());
                slot.insert(tenant.id);
                Ok(())
            }
        }
    }

    async fn get_by_id(&self, id: ObjectId) -> DaoResult<Option<Tenant>> {
        Ok(self.tenants.get(&id).map(|t| t.clone()))
    }

    async fn get_by_slug(&self, slug: &str) -> DaoResult<Option<Tenant>> {
        let Some(id) = self.slugs.get(slug).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.tenants.get(&id).map(|t| t.clone()))
    }

    async fn list_by_ids(&self, ids: &[ObjectId]) -> DaoResult<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> = ids
            .iter()
            .filter_map(|id| self.tenants.get(id).map(|t| t.clone()))
            .collect();
        tenants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenants)
    }

    async fn update(&self, id: ObjectId, patch: &TenantPatch) -> DaoResult<Tenant> {
        let mut tenant = self.tenants.get_mut(&id).ok_or(DaoError::NotFound)?;

        for (counter, max) in [
            (Counter::Users, patch.max_users),
            (Counter::Fields, patch.max_fields),
        ] {
            if let Some(max) = max {
                if max < tenant.current(counter) {
                    return Err(DaoError::Validation(format!(
                        "limits cannot go below current usage ({} users, {} fields)",
                        tenant.current_users, tenant.current_fields
                    )));
                }
            }
        }

        if let Some(name) = &patch.name {
            tenant.name = name.clone();
        }
        if let Some(plan) = &patch.plan {
            tenant.plan = plan.clone();
        }
        if let Some(contact_name) = &patch.contact_name {
            tenant.contact_name = contact_name.clone();
        }
        if let Some(contact_email) = &patch.contact_email {
            tenant.contact_email = contact_email.clone();
        }
        if let Some(max) = patch.max_users {
            tenant.max_users = max;
        }
        if let Some(max) = patch.max_fields {
            tenant.max_fields = max;
        }
        tenant.updated_at = DateTime::now();
        Ok(tenant.clone())
    }

    async fn delete(&self, id: ObjectId) -> DaoResult<()> {
        let (_, tenant) = self.tenants.remove(&id).ok_or(DaoError::NotFound)?;
        self.slugs.remove(&tenant.slug);
        Ok(())
    }

    async fn increment(&self, id: ObjectId, counter: Counter) -> DaoResult<Tenant> {
        let mut tenant = self.tenants.get_mut(&id).ok_or(DaoError::NotFound)?;
        if tenant.current(counter) >= tenant.max(counter) {
            return Err(DaoError::QuotaExceeded(counter));
        }
        match counter {
            Counter::Users => tenant.current_users += 1,
            Counter::Fields => tenant.current_fields += 1,
        }
        tenant.updated_at = DateTime::now();
        Ok(tenant.clone())
    }

    async fn decrement(&self, id: ObjectId, counter: Counter) -> DaoResult<Tenant> {
        let mut tenant = self.tenants.get_mut(&id).ok_or(DaoError::NotFound)?;
        match counter {
            Counter::Users => tenant.current_users = tenant.current_users.saturating_sub(1),
            Counter::Fields => tenant.current_fields = tenant.current_fields.saturating_sub(1),
        }
        tenant.updated_at = DateTime::now();
        Ok(tenant.clone())
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn create(&self, membership: &Membership) -> DaoResult<()> {
        let mut memberships = self.memberships.write();
        let clash = membership.status == MembershipStatus::Active
            && memberships.values().any(|m| {
                m.tenant_id == membership.tenant_id
                    && m.user_id == membership.user_id
                    && m.status == MembershipStatus::Active
            });
        if clash || memberships.contains_key(&membership.id) {
            return Err(DaoError::DuplicateKey(format!(
                "membership {} in {}",
                membership.user_id, membership.tenant_id
            )));
        }
        memberships.insert(membership.id, membership.clone());
        Ok(())
    }

    async fn get_active(
        &self,
        tenant_id: ObjectId,
        user_id: &str,
    ) -> DaoResult<Option<Membership>> {
        Ok(self
            .memberships
            .read()
            .values()
            .find(|m| {
                m.tenant_id == tenant_id
                    && m.user_id == user_id
                    && m.status == MembershipStatus::Active
            })
            .cloned())
    }

    async fn list_active_by_user(&self, user_id: &str) -> DaoResult<Vec<Membership>> {
        let mut found: Vec<Membership> = self
            .memberships
            .read()
            .values()
            .filter(|m| m.user_id == user_id && m.status == MembershipStatus::Active)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }

    async fn list_by_tenant(&self, tenant_id: ObjectId) -> DaoResult<Vec<Membership>> {
        let mut found: Vec<Membership> = self
            .memberships
            .read()
            .values()
            .filter(|m| m.tenant_id == tenant_id)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }

    async fn deactivate(&self, id: ObjectId) -> DaoResult<Option<Membership>> {
        let mut memberships = self.memberships.write();
        match memberships.get_mut(&id) {
            Some(m) if m.status == MembershipStatus::Active => {
                m.status = MembershipStatus::Inactive;
                m.updated_at = DateTime::now();
                Ok(Some(m.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: ObjectId) -> DaoResult<()> {
        self.memberships
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(DaoError::NotFound)
    }
}

#[async_trait]
impl InvitationStore for MemoryStore {
    async fn create(&self, invitation: &Invitation) -> DaoResult<()> {
        let mut invitations = self.invitations.write();
        let clash = invitations.values().any(|i| {
            i.token_hash == invitation.token_hash
                || (!invitation.is_closed()
                    && !i.is_closed()
                    && i.tenant_id == invitation.tenant_id
                    && i.email == invitation.email)
        });
        if clash || invitations.contains_key(&invitation.id) {
            return Err(DaoError::DuplicateKey(format!(
                "invitation for {} in {}",
                invitation.email, invitation.tenant_id
            )));
        }
        invitations.insert(invitation.id, invitation.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: ObjectId) -> DaoResult<Option<Invitation>> {
        Ok(self.invitations.read().get(&id).cloned())
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> DaoResult<Option<Invitation>> {
        Ok(self
            .invitations
            .read()
            .values()
            .find(|i| i.token_hash == token_hash)
            .cloned())
    }

    async fn find_outstanding(
        &self,
        tenant_id: ObjectId,
        email: &str,
    ) -> DaoResult<Option<Invitation>> {
        Ok(self
            .invitations
            .read()
            .values()
            .find(|i| i.tenant_id == tenant_id && i.email == email && !i.is_closed())
            .cloned())
    }

    async fn list_by_tenant(&self, tenant_id: ObjectId) -> DaoResult<Vec<Invitation>> {
        let mut found: Vec<Invitation> = self
            .invitations
            .read()
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn mark_accepted(&self, id: ObjectId, at: DateTime) -> DaoResult<bool> {
        let mut invitations = self.invitations.write();
        match invitations.get_mut(&id) {
            Some(invitation) if !invitation.is_closed() => {
                invitation.accepted_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_revoked(&self, id: ObjectId, at: DateTime) -> DaoResult<bool> {
        let mut invitations = self.invitations.write();
        match invitations.get_mut(&id) {
            Some(invitation) if !invitation.is_closed() => {
                invitation.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_superseded(&self, id: ObjectId, at: DateTime) -> DaoResult<bool> {
        let mut invitations = self.invitations.write();
        match invitations.get_mut(&id) {
            Some(invitation) if !invitation.is_closed() => {
                invitation.superseded_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: ObjectId) -> DaoResult<()> {
        self.invitations
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(DaoError::NotFound)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get(&self, user_id: &str) -> DaoResult<Option<Profile>> {
        Ok(self.profiles.get(user_id).map(|p| p.clone()))
    }

    async fn upsert(&self, user_id: &str, update: &ProfileUpdate) -> DaoResult<Profile> {
        let now = DateTime::now();
        let mut profile = self
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| Profile {
                user_id: user_id.to_string(),
                full_name: None,
                phone: None,
                default_tenant_id: None,
                created_at: now,
                updated_at: now,
            });
        if let Some(full_name) = &update.full_name {
            profile.full_name = Some(full_name.clone());
        }
        if let Some(phone) = &update.phone {
            profile.phone = Some(phone.clone());
        }
        if let Some(tenant_id) = update.default_tenant_id {
            profile.default_tenant_id = Some(tenant_id);
        }
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn clear_default_tenant(&self, user_id: &str) -> DaoResult<()> {
        if let Some(mut profile) = self.profiles.get_mut(user_id) {
            profile.default_tenant_id = None;
            profile.updated_at = DateTime::now();
        }
        Ok(())
    }
}

#[async_trait]
impl ModuleStore for MemoryStore {
    async fn list_enabled(&self, tenant_id: ObjectId) -> DaoResult<Vec<TenantModule>> {
        let mut found: Vec<TenantModule> = self
            .modules
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.enabled)
            .map(|m| m.clone())
            .collect();
        found.sort_by(|a, b| a.module_code.as_str().cmp(b.module_code.as_str()));
        Ok(found)
    }

    async fn set(
        &self,
        tenant_id: ObjectId,
        codes: &[ModuleCode],
        enabled: bool,
    ) -> DaoResult<()> {
        let now = DateTime::now();
        for code in codes {
            let mut module = self
                .modules
                .entry((tenant_id, *code))
                .or_insert_with(|| TenantModule {
                    id: ObjectId::new(),
                    tenant_id,
                    module_code: *code,
                    enabled,
                    created_at: now,
                    updated_at: now,
                });
            module.enabled = enabled;
            module.updated_at = now;
        }
        Ok(())
    }

    async fn delete_for_tenant(&self, tenant_id: ObjectId) -> DaoResult<()> {
        self.modules.retain(|(tenant, _), _| *tenant != tenant_id);
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, entry: &AuditLog) -> DaoResult<()> {
        self.audit.lock().push(entry.clone());
        Ok(())
    }

    async fn list_by_tenant(&self, tenant_id: ObjectId, limit: i64) -> DaoResult<Vec<AuditLog>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .audit
            .lock()
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
