use std::sync::Arc;

use bson::oid::ObjectId;
use cosecha_config::Settings;
use cosecha_db::models::{
    audit_log::actions, AuditLog, Counter, Invitation, InvitationState, Membership,
    MembershipStatus, ModuleCode, RoleCode, Tenant, TenantModule,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use super::invitation::normalize_email;
use super::{
    load_user_tenants, normalize_slug, require_manager, require_member, Auditor,
    InvitationEngine, QuotaPolicy, Saga, UserTenant,
};
use crate::clock::Clock;
use crate::dao::DaoError;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::{
    verify_session, IdentityProvider, IdentityUser, InviteEmail, NewUser, UserMetadata,
    UserUpdate,
};
use crate::store::{ProfileUpdate, Stores, TenantPatch};

/// Tenancy settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct TenancyOptions {
    pub frontend_url: String,
    pub audience: String,
    pub default_plan: String,
    pub default_modules: Vec<ModuleCode>,
    pub invitation_ttl: chrono::Duration,
}

impl TenancyOptions {
    pub fn from_settings(settings: &Settings) -> ServiceResult<Self> {
        if settings.tenancy.invitation_ttl_hours <= 0 {
            return Err(ServiceError::Validation(
                "tenancy.invitation_ttl_hours must be positive".to_string(),
            ));
        }
        Ok(Self {
            frontend_url: settings.app.frontend_url.trim_end_matches('/').to_string(),
            audience: settings.identity.audience.clone(),
            default_plan: settings.tenancy.default_plan.clone(),
            default_modules: parse_modules(&settings.tenancy.default_modules)?,
            invitation_ttl: chrono::Duration::hours(settings.tenancy.invitation_ttl_hours),
        })
    }
}

pub(crate) fn parse_modules(codes: &[String]) -> ServiceResult<Vec<ModuleCode>> {
    codes
        .iter()
        .map(|code| {
            code.trim()
                .parse::<ModuleCode>()
                .map_err(|e| ServiceError::Validation(e.to_string()))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub slug: String,
    pub plan: Option<String>,
    pub contact_name: String,
    pub contact_email: String,
}

#[derive(Debug, Clone)]
pub struct Provisioned {
    pub tenant: Tenant,
    pub membership: Membership,
}

#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OwnerDetails {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InviteRequest {
    pub tenant_id: ObjectId,
    pub email: String,
    pub role: RoleCode,
}

#[derive(Debug, Clone)]
pub struct InvitationIssued {
    pub invitation: Invitation,
    pub token: String,
    pub invite_url: String,
}

#[derive(Debug, Clone)]
pub struct InvitationDetails {
    pub invitation: Invitation,
    pub tenant_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct AcceptRequest {
    pub token: String,
    pub access_token: String,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Accepted {
    pub membership: Membership,
    pub tenant_id: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterUsage {
    pub max: u32,
    pub current: u32,
    pub available: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantLimits {
    pub plan: String,
    pub users: CounterUsage,
    pub fields: CounterUsage,
}

impl From<&Tenant> for TenantLimits {
    fn from(tenant: &Tenant) -> Self {
        let usage = |counter| CounterUsage {
            max: tenant.max(counter),
            current: tenant.current(counter),
            available: tenant.available(counter),
        };
        Self {
            plan: tenant.plan.clone(),
            users: usage(Counter::Users),
            fields: usage(Counter::Fields),
        }
    }
}

/// Orchestrates tenant provisioning, invitations, quota and memberships
/// over the injected stores and identity provider.
pub struct TenantService {
    stores: Stores,
    identity: Arc<dyn IdentityProvider>,
    policy: Arc<QuotaPolicy>,
    invitations: InvitationEngine,
    auditor: Auditor,
    options: TenancyOptions,
}

impl TenantService {
    pub fn new(
        stores: Stores,
        identity: Arc<dyn IdentityProvider>,
        policy: Arc<QuotaPolicy>,
        clock: Arc<dyn Clock>,
        options: TenancyOptions,
    ) -> Self {
        let invitations =
            InvitationEngine::new(&stores, policy.clone(), clock, options.invitation_ttl);
        let auditor = Auditor::new(stores.audit.clone());
        Self {
            stores,
            identity,
            policy,
            invitations,
            auditor,
            options,
        }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    // --- provisioning ---

    /// Creates a tenant owned by `owner_id`. The owner membership never
    /// consumes a seat. A failure after the tenant row exists removes it.
    #[instrument(skip(self, profile), fields(slug = %attrs.slug))]
    pub async fn provision_tenant(
        &self,
        attrs: NewTenant,
        owner_id: &str,
        profile: ProfileUpdate,
    ) -> ServiceResult<Provisioned> {
        let mut saga = Saga::new("provision_tenant");
        let provisioned = self.provision_in(&mut saga, attrs, owner_id).await?;
        self.finish_provisioning(saga, provisioned, owner_id, profile)
            .await
    }

    /// Tenant row, owner membership and default modules, each with its undo
    /// registered on `saga`.
    async fn provision_in(
        &self,
        saga: &mut Saga,
        attrs: NewTenant,
        owner_id: &str,
    ) -> ServiceResult<Provisioned> {
        let name = attrs.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::Validation("Tenant name is required".to_string()));
        }
        let slug = normalize_slug(&attrs.slug);
        if slug.is_empty() {
            return Err(ServiceError::Validation(
                "Slug must contain letters or digits".to_string(),
            ));
        }
        if self.stores.tenants.get_by_slug(&slug).await?.is_some() {
            return Err(ServiceError::SlugTaken(slug));
        }

        let requested = attrs.plan.as_deref().unwrap_or(&self.options.default_plan);
        if !self.policy.is_known(requested) {
            warn!(plan = requested, "Unknown plan, using the lowest tier");
        }
        let (plan, limits) = self.policy.resolve(requested);

        let now = bson::DateTime::now();
        let tenant = Tenant {
            id: ObjectId::new(),
            name,
            slug: slug.clone(),
            plan: plan.to_string(),
            contact_name: attrs.contact_name.trim().to_string(),
            contact_email: attrs.contact_email.trim().to_lowercase(),
            created_by: owner_id.to_string(),
            max_users: limits.max_users,
            max_fields: limits.max_fields,
            current_users: 0,
            current_fields: 0,
            created_at: now,
            updated_at: now,
        };

        let tenants = self.stores.tenants.clone();
        saga.step(
            "create_tenant",
            async {
                match self.stores.tenants.create(&tenant).await {
                    Ok(()) => Ok(()),
                    Err(DaoError::DuplicateKey(_)) => Err(ServiceError::SlugTaken(slug.clone())),
                    Err(err) => Err(err.into()),
                }
            },
            {
                let id = tenant.id;
                move |_| async move { tenants.delete(id).await.map_err(ServiceError::from) }
            },
        )
        .await?;

        let membership = Membership {
            id: ObjectId::new(),
            tenant_id: tenant.id,
            user_id: owner_id.to_string(),
            role: RoleCode::Owner,
            status: MembershipStatus::Active,
            invited_by: None,
            accepted_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        let memberships = self.stores.memberships.clone();
        saga.step(
            "create_owner_membership",
            self.stores.memberships.create(&membership),
            {
                let id = membership.id;
                move |_| async move { memberships.delete(id).await.map_err(ServiceError::from) }
            },
        )
        .await?;

        let modules = self.stores.modules.clone();
        saga.step(
            "enable_default_modules",
            self.stores
                .modules
                .set(tenant.id, &self.options.default_modules, true),
            {
                let id = tenant.id;
                move |_| async move {
                    modules.delete_for_tenant(id).await.map_err(ServiceError::from)
                }
            },
        )
        .await?;

        Ok(Provisioned { tenant, membership })
    }

    /// Points the owner profile at the new tenant; the last step, so the
    /// saga commits right after it.
    async fn finish_provisioning(
        &self,
        mut saga: Saga,
        provisioned: Provisioned,
        owner_id: &str,
        profile: ProfileUpdate,
    ) -> ServiceResult<Provisioned> {
        let tenant = &provisioned.tenant;
        let profile = ProfileUpdate {
            default_tenant_id: Some(tenant.id),
            ..profile
        };
        saga.run(
            "point_owner_profile",
            self.stores.profiles.upsert(owner_id, &profile),
        )
        .await?;
        saga.commit();

        self.auditor
            .record(AuditLog::new(
                tenant.id,
                Some(owner_id),
                actions::TENANT_CREATED,
                "tenant",
                Some(tenant.id),
                json!({ "tenant_name": tenant.name, "slug": tenant.slug, "plan": tenant.plan }),
            ))
            .await;

        info!(tenant_id = %tenant.id, plan = %tenant.plan, "Tenant provisioned");
        Ok(provisioned)
    }

    /// Owner onboarding: the caller already verified their email by OTP and
    /// presents that session. The provider account is only touched once the
    /// tenant rows exist, and a provider failure removes them again.
    #[instrument(skip_all, fields(slug = %attrs.slug))]
    pub async fn register_tenant(
        &self,
        attrs: NewTenant,
        access_token: &str,
        owner: OwnerDetails,
    ) -> ServiceResult<Provisioned> {
        let verified = verify_session(self.identity.as_ref(), access_token, &self.options.audience)
            .await?;

        let mut saga = Saga::new("register_tenant");
        let provisioned = self
            .provision_in(&mut saga, attrs, &verified.user_id)
            .await?;

        let update = UserUpdate {
            password: owner.password,
            metadata: Some(UserMetadata {
                full_name: owner.full_name.clone(),
                phone: owner.phone.clone(),
            }),
        };
        saga.run(
            "update_owner_identity",
            self.identity.update_user(&verified.user_id, &update),
        )
        .await?;

        self.finish_provisioning(
            saga,
            provisioned,
            &verified.user_id,
            ProfileUpdate {
                full_name: owner.full_name,
                phone: owner.phone,
                default_tenant_id: None,
            },
        )
        .await
    }

    /// Creates the admin account in the identity provider and a tenant owned
    /// by it. The account is deleted again if provisioning fails.
    #[instrument(skip_all, fields(slug = %attrs.slug, email = %admin.email))]
    pub async fn create_tenant_with_admin(
        &self,
        attrs: NewTenant,
        admin: AdminAccount,
    ) -> ServiceResult<(Provisioned, IdentityUser)> {
        let email = normalize_email(&admin.email)?;
        let slug = normalize_slug(&attrs.slug);
        if !slug.is_empty() && self.stores.tenants.get_by_slug(&slug).await?.is_some() {
            return Err(ServiceError::SlugTaken(slug));
        }

        let metadata = UserMetadata {
            full_name: admin.full_name.clone(),
            phone: admin.phone.clone(),
        };
        let new_user = NewUser {
            email,
            password: admin.password,
            metadata,
            email_confirmed: true,
        };

        let mut saga = Saga::new("create_tenant_with_admin");
        let identity = self.identity.clone();
        let user = saga
            .step(
                "create_admin_user",
                self.identity.create_user(&new_user),
                move |user: &IdentityUser| {
                    let id = user.id.clone();
                    async move { identity.delete_user(&id).await.map_err(ServiceError::from) }
                },
            )
            .await?;

        let provisioned = saga
            .run(
                "provision_tenant",
                self.provision_tenant(
                    attrs,
                    &user.id,
                    ProfileUpdate {
                        full_name: admin.full_name,
                        phone: admin.phone,
                        default_tenant_id: None,
                    },
                ),
            )
            .await?;
        saga.commit();

        Ok((provisioned, user))
    }

    // --- invitations ---

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id, role = %req.role))]
    pub async fn invite_user(
        &self,
        req: InviteRequest,
        inviter: &str,
    ) -> ServiceResult<InvitationIssued> {
        require_manager(self.stores.memberships.as_ref(), req.tenant_id, inviter).await?;
        let tenant = self.require_tenant(req.tenant_id).await?;

        let issued = self
            .invitations
            .create(tenant.id, &req.email, req.role, inviter)
            .await?;
        let invitation = issued.invitation;
        let invite_url = format!(
            "{}/invitacion/usuario?token={}",
            self.options.frontend_url, issued.token
        );

        let email = InviteEmail {
            redirect_url: invite_url.clone(),
            data: json!({
                "tenant_id": tenant.id.to_hex(),
                "tenant_name": tenant.name,
                "role_code": invitation.role.as_str(),
                "invitation_token": issued.token,
                "invited_by_id": inviter,
            }),
        };
        if let Err(err) = self.identity.invite_by_email(&invitation.email, &email).await {
            warn!(error = %err, "Invitation email failed, discarding invitation");
            if let Err(cleanup) = self.invitations.discard(invitation.id).await {
                error!(
                    invitation_id = %invitation.id,
                    error = %cleanup,
                    "Could not discard undelivered invitation"
                );
            }
            return Err(err.into());
        }

        self.auditor
            .record(AuditLog::new(
                tenant.id,
                Some(inviter),
                actions::INVITATION_CREATED,
                "invitation",
                Some(invitation.id),
                json!({ "email": invitation.email, "role": invitation.role.as_str() }),
            ))
            .await;

        Ok(InvitationIssued {
            invitation,
            token: issued.token,
            invite_url,
        })
    }

    pub async fn get_invitation(&self, token: &str) -> ServiceResult<InvitationDetails> {
        let invitation = self.invitations.lookup(token).await?;
        let tenant = self.require_tenant(invitation.tenant_id).await?;
        Ok(InvitationDetails {
            invitation,
            tenant_name: tenant.name,
        })
    }

    #[instrument(skip_all)]
    pub async fn accept_invitation(&self, req: AcceptRequest) -> ServiceResult<Accepted> {
        let verified =
            verify_session(self.identity.as_ref(), &req.access_token, &self.options.audience)
                .await?;
        let email = verified
            .email
            .clone()
            .ok_or_else(|| ServiceError::Unauthorized("Session carries no email".to_string()))?;

        let membership = self
            .invitations
            .accept(&req.token, &verified.user_id, &email)
            .await?;

        let existing = self.stores.profiles.get(&verified.user_id).await?;
        let full_name = req.full_name.or_else(|| {
            existing
                .as_ref()
                .and_then(|p| p.full_name.clone())
                .or_else(|| email.split('@').next().map(str::to_string))
        });

        if req.password.is_some() || full_name.is_some() || req.phone.is_some() {
            let update = UserUpdate {
                password: req.password,
                metadata: Some(UserMetadata {
                    full_name: full_name.clone(),
                    phone: req.phone.clone(),
                }),
            };
            self.identity.update_user(&verified.user_id, &update).await?;
        }

        self.stores
            .profiles
            .upsert(
                &verified.user_id,
                &ProfileUpdate {
                    full_name,
                    phone: req.phone,
                    default_tenant_id: Some(membership.tenant_id),
                },
            )
            .await?;

        Ok(Accepted {
            tenant_id: membership.tenant_id,
            membership,
        })
    }

    pub async fn revoke_invitation(&self, id: ObjectId, actor: &str) -> ServiceResult<Invitation> {
        let invitation = self.invitations.revoke(id, actor).await?;
        self.auditor
            .record(AuditLog::new(
                invitation.tenant_id,
                Some(actor),
                actions::INVITATION_REVOKED,
                "invitation",
                Some(invitation.id),
                json!({ "invited_email": invitation.email, "role": invitation.role.as_str() }),
            ))
            .await;
        Ok(invitation)
    }

    pub fn invitation_state(&self, invitation: &Invitation) -> InvitationState {
        self.invitations.state_of(invitation)
    }

    pub async fn list_invitations(
        &self,
        tenant_id: ObjectId,
        actor: &str,
    ) -> ServiceResult<Vec<Invitation>> {
        require_manager(self.stores.memberships.as_ref(), tenant_id, actor).await?;
        self.invitations.list(tenant_id).await
    }

    // --- quota ---

    pub async fn get_tenant_limits(&self, tenant_id: ObjectId) -> ServiceResult<TenantLimits> {
        Ok(TenantLimits::from(&self.require_tenant(tenant_id).await?))
    }

    pub async fn can_add_user(&self, tenant_id: ObjectId) -> ServiceResult<bool> {
        Ok(self.require_tenant(tenant_id).await?.available(Counter::Users) > 0)
    }

    pub async fn can_add_field(&self, tenant_id: ObjectId) -> ServiceResult<bool> {
        Ok(self.require_tenant(tenant_id).await?.available(Counter::Fields) > 0)
    }

    /// Claims one field slot; `QuotaExceeded` when the plan is exhausted.
    pub async fn increment_fields(&self, tenant_id: ObjectId) -> ServiceResult<TenantLimits> {
        let tenant = self
            .stores
            .tenants
            .increment_fields(tenant_id)
            .await
            .map_err(not_found_as("Tenant"))?;
        Ok(TenantLimits::from(&tenant))
    }

    pub async fn decrement_fields(&self, tenant_id: ObjectId) -> ServiceResult<TenantLimits> {
        let tenant = self
            .stores
            .tenants
            .decrement_fields(tenant_id)
            .await
            .map_err(not_found_as("Tenant"))?;
        Ok(TenantLimits::from(&tenant))
    }

    // --- tenant reads and updates ---

    pub async fn get_tenant(&self, tenant_id: ObjectId, user_id: &str) -> ServiceResult<Tenant> {
        require_member(self.stores.memberships.as_ref(), tenant_id, user_id).await?;
        self.require_tenant(tenant_id).await
    }

    pub async fn get_tenant_by_slug(&self, slug: &str) -> ServiceResult<Tenant> {
        self.stores
            .tenants
            .get_by_slug(&normalize_slug(slug))
            .await?
            .ok_or(ServiceError::NotFound("Tenant"))
    }

    /// Returns the normalized slug and whether it is free.
    pub async fn check_slug(&self, raw: &str) -> ServiceResult<(String, bool)> {
        let slug = normalize_slug(raw);
        if slug.is_empty() {
            return Ok((slug, false));
        }
        let available = self.stores.tenants.get_by_slug(&slug).await?.is_none();
        Ok((slug, available))
    }

    pub async fn user_tenants(&self, user_id: &str) -> ServiceResult<Vec<UserTenant>> {
        load_user_tenants(&self.stores, user_id).await
    }

    pub async fn user_membership(
        &self,
        tenant_id: ObjectId,
        user_id: &str,
    ) -> ServiceResult<Option<Membership>> {
        Ok(self.stores.memberships.get_active(tenant_id, user_id).await?)
    }

    /// Changing the plan without explicit maxima adopts the plan's limits.
    #[instrument(skip(self, patch))]
    pub async fn update_tenant(
        &self,
        tenant_id: ObjectId,
        mut patch: TenantPatch,
        actor: &str,
    ) -> ServiceResult<Tenant> {
        require_manager(self.stores.memberships.as_ref(), tenant_id, actor).await?;

        if let Some(plan) = &patch.plan {
            if !self.policy.is_known(plan) {
                return Err(ServiceError::Validation(format!("Unknown plan: {plan}")));
            }
            let limits = self.policy.plan_limits(plan);
            patch.max_users.get_or_insert(limits.max_users);
            patch.max_fields.get_or_insert(limits.max_fields);
        }
        if patch.max_users == Some(0) {
            return Err(ServiceError::Validation(
                "A tenant must allow at least one user".to_string(),
            ));
        }
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(ServiceError::Validation("Tenant name is required".to_string()));
            }
        }
        if patch.is_empty() {
            return self.require_tenant(tenant_id).await;
        }

        let tenant = self
            .stores
            .tenants
            .update(tenant_id, &patch)
            .await
            .map_err(not_found_as("Tenant"))?;

        self.auditor
            .record(AuditLog::new(
                tenant_id,
                Some(actor),
                actions::TENANT_UPDATED,
                "tenant",
                Some(tenant_id),
                json!({
                    "name": patch.name,
                    "plan": patch.plan,
                    "max_users": patch.max_users,
                    "max_fields": patch.max_fields,
                }),
            ))
            .await;
        Ok(tenant)
    }

    /// Deactivates a member and gives their seat back.
    #[instrument(skip(self))]
    pub async fn remove_member(
        &self,
        tenant_id: ObjectId,
        user_id: &str,
        actor: &str,
    ) -> ServiceResult<Membership> {
        require_manager(self.stores.memberships.as_ref(), tenant_id, actor).await?;
        let membership = self
            .stores
            .memberships
            .get_active(tenant_id, user_id)
            .await?
            .ok_or(ServiceError::NotFound("Membership"))?;
        if membership.role == RoleCode::Owner {
            return Err(ServiceError::Forbidden(
                "The tenant owner cannot be removed".to_string(),
            ));
        }

        // Only the caller that flips the row gives the seat back.
        let membership = self
            .stores
            .memberships
            .deactivate(membership.id)
            .await?
            .ok_or(ServiceError::NotFound("Membership"))?;
        if self.policy.is_countable(membership.role) {
            self.stores.tenants.decrement_users(tenant_id).await?;
        }

        if let Some(profile) = self.stores.profiles.get(user_id).await? {
            if profile.default_tenant_id == Some(tenant_id) {
                self.stores.profiles.clear_default_tenant(user_id).await?;
            }
        }

        self.auditor
            .record(AuditLog::new(
                tenant_id,
                Some(actor),
                actions::MEMBER_REMOVED,
                "membership",
                Some(membership.id),
                json!({ "user_id": user_id, "role": membership.role.as_str() }),
            ))
            .await;
        Ok(membership)
    }

    // --- modules ---

    pub async fn list_modules(
        &self,
        tenant_id: ObjectId,
        user_id: &str,
    ) -> ServiceResult<Vec<TenantModule>> {
        require_member(self.stores.memberships.as_ref(), tenant_id, user_id).await?;
        Ok(self.stores.modules.list_enabled(tenant_id).await?)
    }

    pub async fn set_module(
        &self,
        tenant_id: ObjectId,
        code: &str,
        enabled: bool,
        actor: &str,
    ) -> ServiceResult<Vec<TenantModule>> {
        let codes = parse_modules(&[code.to_string()])?;
        self.change_modules(tenant_id, codes, enabled, actor).await
    }

    pub async fn enable_modules(
        &self,
        tenant_id: ObjectId,
        codes: &[String],
        actor: &str,
    ) -> ServiceResult<Vec<TenantModule>> {
        let codes = parse_modules(codes)?;
        self.change_modules(tenant_id, codes, true, actor).await
    }

    async fn change_modules(
        &self,
        tenant_id: ObjectId,
        codes: Vec<ModuleCode>,
        enabled: bool,
        actor: &str,
    ) -> ServiceResult<Vec<TenantModule>> {
        require_manager(self.stores.memberships.as_ref(), tenant_id, actor).await?;
        self.stores.modules.set(tenant_id, &codes, enabled).await?;

        let names: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        self.auditor
            .record(AuditLog::new(
                tenant_id,
                Some(actor),
                actions::MODULES_CHANGED,
                "tenant_module",
                None,
                json!({ "modules": names, "enabled": enabled }),
            ))
            .await;
        Ok(self.stores.modules.list_enabled(tenant_id).await?)
    }

    // --- default tenant ---

    pub async fn set_default_tenant(&self, user_id: &str, tenant_id: ObjectId) -> ServiceResult<()> {
        require_member(self.stores.memberships.as_ref(), tenant_id, user_id).await?;
        self.stores
            .profiles
            .upsert(
                user_id,
                &ProfileUpdate {
                    default_tenant_id: Some(tenant_id),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    pub async fn clear_default_tenant(&self, user_id: &str) -> ServiceResult<()> {
        Ok(self.stores.profiles.clear_default_tenant(user_id).await?)
    }

    async fn require_tenant(&self, tenant_id: ObjectId) -> ServiceResult<Tenant> {
        self.stores
            .tenants
            .get_by_id(tenant_id)
            .await?
            .ok_or(ServiceError::NotFound("Tenant"))
    }
}

fn not_found_as(entity: &'static str) -> impl Fn(DaoError) -> ServiceError {
    move |err| match err {
        DaoError::NotFound => ServiceError::NotFound(entity),
        other => other.into(),
    }
}
