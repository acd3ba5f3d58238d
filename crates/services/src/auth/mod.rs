use std::sync::Arc;

use bson::oid::ObjectId;
use cosecha_db::models::{Profile, RoleCode, Tenant};
use serde_json::json;
use tracing::{info, instrument};

use crate::error::{ServiceError, ServiceResult};
use crate::identity::{
    verify_session, IdentityProvider, OtpOptions, Session, UserUpdate, VerifiedToken,
};
use crate::store::Stores;
use crate::tenancy::{load_user_tenants, UserTenant};

/// The signed-in user as the web client sees it.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub profile: Option<Profile>,
    /// The active tenant: the profile default if it is still a membership,
    /// otherwise the oldest membership.
    pub tenant: Option<UserTenant>,
    pub tenants: Vec<UserTenant>,
}

impl AuthUser {
    pub fn tenant_id(&self) -> Option<ObjectId> {
        self.tenant.as_ref().map(|t| t.tenant.id)
    }

    pub fn role(&self) -> Option<RoleCode> {
        self.tenant.as_ref().map(|t| t.membership.role)
    }

    pub fn active_tenant(&self) -> Option<&Tenant> {
        self.tenant.as_ref().map(|t| &t.tenant)
    }
}

/// Session-level operations, passed through to the identity provider.
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    stores: Stores,
    audience: String,
}

impl AuthService {
    pub fn new(identity: Arc<dyn IdentityProvider>, stores: Stores, audience: String) -> Self {
        Self {
            identity,
            stores,
            audience,
        }
    }

    /// Resolves a bearer token to its verified claims.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<VerifiedToken> {
        Ok(verify_session(self.identity.as_ref(), token, &self.audience).await?)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<(Session, AuthUser)> {
        let session = self
            .identity
            .sign_in(email.trim(), password)
            .await?;
        let user = self.build_auth_user(&session.user_id, &session.email).await?;
        info!(user_id = %user.id, "User signed in");
        Ok((session, user))
    }

    /// Starts owner onboarding by mailing a one-time code.
    #[instrument(skip(self))]
    pub async fn send_owner_code(&self, email: &str) -> ServiceResult<()> {
        let options = OtpOptions {
            create_user: true,
            data: json!({ "is_tenant_owner": true, "signup_type": "tenant_registration" }),
        };
        Ok(self.identity.send_otp(email.trim(), &options).await?)
    }

    #[instrument(skip(self, code))]
    pub async fn verify_owner_code(&self, email: &str, code: &str) -> ServiceResult<Session> {
        Ok(self.identity.verify_otp(email.trim(), code.trim()).await?)
    }

    pub async fn validate_token(&self, token: &str) -> ServiceResult<AuthUser> {
        let verified = self.authenticate(token).await?;
        let email = match verified.email {
            Some(email) => email,
            None => self.identity.get_user(&verified.user_id).await?.email,
        };
        self.build_auth_user(&verified.user_id, &email).await
    }

    pub async fn me(&self, user_id: &str) -> ServiceResult<AuthUser> {
        let user = self.identity.get_user(user_id).await?;
        self.build_auth_user(&user.id, &user.email).await
    }

    pub async fn set_password(&self, user_id: &str, password: &str) -> ServiceResult<()> {
        if password.len() < 8 {
            return Err(ServiceError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        let update = UserUpdate {
            password: Some(password.to_string()),
            metadata: None,
        };
        Ok(self.identity.update_user(user_id, &update).await?)
    }

    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        Ok(self.identity.sign_out(token).await?)
    }

    pub async fn build_auth_user(&self, user_id: &str, email: &str) -> ServiceResult<AuthUser> {
        let profile = self.stores.profiles.get(user_id).await?;
        let tenants = load_user_tenants(&self.stores, user_id).await?;

        let preferred = profile.as_ref().and_then(|p| p.default_tenant_id);
        let tenant = preferred
            .and_then(|id| tenants.iter().find(|t| t.tenant.id == id))
            .or_else(|| tenants.first())
            .cloned();

        Ok(AuthUser {
            id: user_id.to_string(),
            email: email.to_string(),
            profile,
            tenant,
            tenants,
        })
    }
}
