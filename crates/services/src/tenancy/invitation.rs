use std::sync::Arc;

use bson::{oid::ObjectId, DateTime};
use cosecha_db::models::{
    audit_log::actions, AuditLog, Invitation, InvitationState, Membership, MembershipStatus,
    RoleCode,
};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use super::{generate_token, hash_token, require_manager, Auditor, QuotaPolicy, Saga};
use crate::clock::Clock;
use crate::dao::DaoError;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{InvitationStore, MembershipStore, Stores, TenantStore};

/// A freshly created invitation and the only copy of its plain token.
#[derive(Debug, Clone)]
pub struct IssuedInvitation {
    pub invitation: Invitation,
    pub token: String,
}

/// State machine over invitations: pending, then accepted, revoked or
/// expired. Acceptance reserves a seat before the membership exists.
pub struct InvitationEngine {
    tenants: Arc<dyn TenantStore>,
    memberships: Arc<dyn MembershipStore>,
    invitations: Arc<dyn InvitationStore>,
    auditor: Auditor,
    policy: Arc<QuotaPolicy>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

pub(crate) fn normalize_email(email: &str) -> ServiceResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ServiceError::Validation(format!("Invalid email: {email}"))),
    }
}

impl InvitationEngine {
    pub fn new(
        stores: &Stores,
        policy: Arc<QuotaPolicy>,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            tenants: stores.tenants.clone(),
            memberships: stores.memberships.clone(),
            invitations: stores.invitations.clone(),
            auditor: Auditor::new(stores.audit.clone()),
            policy,
            clock,
            ttl,
        }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        tenant_id: ObjectId,
        email: &str,
        role: RoleCode,
        inviter: &str,
    ) -> ServiceResult<IssuedInvitation> {
        if role == RoleCode::Owner {
            return Err(ServiceError::Validation(
                "The owner role cannot be granted by invitation".to_string(),
            ));
        }
        let email = normalize_email(email)?;
        let now = self.clock.now();

        if let Some(existing) = self.invitations.find_outstanding(tenant_id, &email).await? {
            if existing.state_at(now) == InvitationState::Pending {
                return Err(ServiceError::DuplicateInvitation(email));
            }
            // Expired but never closed: set it aside so a new one can be outstanding.
            if self.invitations.mark_superseded(existing.id, now).await? {
                self.auditor
                    .record(AuditLog::new(
                        tenant_id,
                        None,
                        actions::INVITATION_SUPERSEDED,
                        "invitation",
                        Some(existing.id),
                        json!({ "email": email, "reinvited_by": inviter }),
                    ))
                    .await;
                debug!(invitation_id = %existing.id, "Superseded expired invitation");
            }
        }

        let token = generate_token();
        let invitation = Invitation {
            id: ObjectId::new(),
            tenant_id,
            email: email.clone(),
            role,
            token_hash: hash_token(&token),
            invited_by: inviter.to_string(),
            expires_at: DateTime::from_millis(
                now.timestamp_millis() + self.ttl.num_milliseconds(),
            ),
            accepted_at: None,
            revoked_at: None,
            superseded_at: None,
            created_at: now,
        };

        match self.invitations.create(&invitation).await {
            Ok(()) => {}
            Err(DaoError::DuplicateKey(_)) => return Err(ServiceError::DuplicateInvitation(email)),
            Err(err) => return Err(err.into()),
        }

        info!(invitation_id = %invitation.id, role = %role, "Invitation created");
        Ok(IssuedInvitation { invitation, token })
    }

    /// Resolves a token to a pending invitation. Checks run in a fixed
    /// order: not found, revoked, accepted, expired.
    pub async fn lookup(&self, token: &str) -> ServiceResult<Invitation> {
        let invitation = self.find_by_token(token).await?;
        match invitation.state_at(self.clock.now()) {
            InvitationState::Revoked => Err(ServiceError::InvitationRevoked),
            InvitationState::Accepted => Err(ServiceError::InvitationAlreadyAccepted),
            InvitationState::Expired => Err(ServiceError::InvitationExpired),
            InvitationState::Pending => Ok(invitation),
        }
    }

    #[instrument(skip(self))]
    pub async fn revoke(&self, id: ObjectId, actor: &str) -> ServiceResult<Invitation> {
        let invitation = self
            .invitations
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Invitation"))?;
        require_manager(self.memberships.as_ref(), invitation.tenant_id, actor).await?;

        if invitation.is_closed() {
            return Err(ServiceError::AlreadyTerminal);
        }
        let now = self.clock.now();
        if !self.invitations.mark_revoked(id, now).await? {
            return Err(ServiceError::AlreadyTerminal);
        }

        info!("Invitation revoked");
        Ok(Invitation {
            revoked_at: Some(now),
            ..invitation
        })
    }

    /// Turns a pending invitation into an active membership for the
    /// verified user. Safe to retry: a user who already holds an active
    /// membership gets it back without a second seat being charged.
    #[instrument(skip(self, token))]
    pub async fn accept(
        &self,
        token: &str,
        user_id: &str,
        verified_email: &str,
    ) -> ServiceResult<Membership> {
        let invitation = self.find_by_token(token).await?;
        if invitation.revoked_at.is_some() {
            return Err(ServiceError::InvitationRevoked);
        }
        if invitation.email != verified_email.trim().to_lowercase() {
            return Err(ServiceError::EmailMismatch);
        }

        let now = self.clock.now();
        if invitation.accepted_at.is_none() && invitation.state_at(now) == InvitationState::Expired
        {
            return Err(ServiceError::InvitationExpired);
        }

        if let Some(existing) = self
            .memberships
            .get_active(invitation.tenant_id, user_id)
            .await?
        {
            if invitation.accepted_at.is_none() {
                self.close_accepted(&invitation, now).await?;
            }
            debug!(membership_id = %existing.id, "Invitation already fulfilled");
            return Ok(existing);
        }
        if invitation.accepted_at.is_some() {
            return Err(ServiceError::InvitationAlreadyAccepted);
        }

        let tenant_id = invitation.tenant_id;
        let mut saga = Saga::new("accept_invitation");
        if self.policy.is_countable(invitation.role) {
            let tenants = self.tenants.clone();
            saga.step(
                "reserve_seat",
                self.tenants.increment_users(tenant_id),
                move |_| async move {
                    tenants
                        .decrement_users(tenant_id)
                        .await
                        .map(|_| ())
                        .map_err(ServiceError::from)
                },
            )
            .await?;
        }

        let membership = Membership {
            id: ObjectId::new(),
            tenant_id,
            user_id: user_id.to_string(),
            role: invitation.role,
            status: MembershipStatus::Active,
            invited_by: Some(invitation.invited_by.clone()),
            accepted_at: Some(now),
            created_at: now,
            updated_at: now,
        };

        match self.memberships.create(&membership).await {
            Ok(()) => saga.commit(),
            Err(DaoError::DuplicateKey(_)) => {
                // Lost a race with a concurrent accept; give the seat back.
                saga.unwind().await;
                let winner = self
                    .memberships
                    .get_active(tenant_id, user_id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::Conflict("Membership changed concurrently".to_string())
                    })?;
                self.close_accepted(&invitation, now).await?;
                return Ok(winner);
            }
            Err(err) => {
                saga.unwind().await;
                return Err(err.into());
            }
        }

        self.close_accepted(&invitation, now).await?;
        self.auditor
            .record(AuditLog::new(
                tenant_id,
                Some(user_id),
                actions::INVITATION_ACCEPTED,
                "invitation",
                Some(invitation.id),
                json!({ "email": invitation.email, "role": invitation.role.as_str() }),
            ))
            .await;

        info!(membership_id = %membership.id, role = %membership.role, "Invitation accepted");
        Ok(membership)
    }

    /// Lifecycle position as of now.
    pub fn state_of(&self, invitation: &Invitation) -> InvitationState {
        invitation.state_at(self.clock.now())
    }

    /// Newest first.
    pub async fn list(&self, tenant_id: ObjectId) -> ServiceResult<Vec<Invitation>> {
        Ok(self.invitations.list_by_tenant(tenant_id).await?)
    }

    /// Removes an invitation whose email could not be delivered.
    pub async fn discard(&self, id: ObjectId) -> ServiceResult<()> {
        Ok(self.invitations.delete(id).await?)
    }

    async fn find_by_token(&self, token: &str) -> ServiceResult<Invitation> {
        self.invitations
            .get_by_token_hash(&hash_token(token.trim()))
            .await?
            .ok_or(ServiceError::NotFound("Invitation"))
    }

    async fn close_accepted(&self, invitation: &Invitation, now: DateTime) -> ServiceResult<()> {
        match self.invitations.mark_accepted(invitation.id, now).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(
                    invitation_id = %invitation.id,
                    "Invitation closed concurrently; membership kept"
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    invitation_id = %invitation.id,
                    tenant_id = %invitation.tenant_id,
                    error = %err,
                    "Membership granted but invitation not marked accepted; needs reconciliation"
                );
                Err(ServiceError::Unavailable(
                    "invitation could not be closed, retry the request".to_string(),
                ))
            }
        }
    }
}
