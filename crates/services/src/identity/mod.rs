//! Adapters for the external identity provider.
//!
//! The tenancy core only needs a narrow surface from the provider: session
//! tokens it can verify, admin user management and the two email flows
//! (one-time codes and invitations).

mod gotrue;
mod local;
mod token;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gotrue::GoTrueProvider;
pub use local::{LocalIdentityProvider, MailKind, SentMail};
pub use token::{SessionTokens, TokenClaims};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Invalid or expired code")]
    InvalidOtp,
    #[error("User already registered")]
    UserExists,
    #[error("User not found")]
    UserNotFound,
    #[error("Identity provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("Password hash error: {0}")]
    HashError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

/// A token whose signature checked out.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub user_id: String,
    pub email: Option<String>,
    pub claims: TokenClaims,
}

impl VerifiedToken {
    /// Subject present, not expired at `now_secs`, issued for `audience`.
    pub fn ensure_valid(&self, now_secs: i64, audience: &str) -> Result<(), IdentityError> {
        if self.user_id.is_empty() {
            return Err(IdentityError::InvalidToken("missing subject".to_string()));
        }
        if self.claims.exp <= now_secs {
            return Err(IdentityError::TokenExpired);
        }
        if self.claims.aud != audience {
            return Err(IdentityError::InvalidToken("unexpected audience".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub metadata: UserMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password: Option<String>,
    pub metadata: Option<UserMetadata>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub metadata: UserMetadata,
    /// Mark the email as confirmed so the user can sign in right away.
    pub email_confirmed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OtpOptions {
    pub create_user: bool,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct InviteEmail {
    pub redirect_url: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;
    async fn send_otp(&self, email: &str, options: &OtpOptions) -> Result<(), IdentityError>;
    async fn verify_otp(&self, email: &str, code: &str) -> Result<Session, IdentityError>;
    async fn verify_token(&self, token: &str) -> Result<VerifiedToken, IdentityError>;
    async fn create_user(&self, user: &NewUser) -> Result<IdentityUser, IdentityError>;
    async fn delete_user(&self, user_id: &str) -> Result<(), IdentityError>;
    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<(), IdentityError>;
    async fn get_user(&self, user_id: &str) -> Result<IdentityUser, IdentityError>;
    /// Sends the invitation email. The link in it must lead to `redirect_url`.
    async fn invite_by_email(&self, email: &str, invite: &InviteEmail) -> Result<(), IdentityError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}

/// Verifies a bearer token through `provider` and checks subject, expiry
/// and audience.
pub async fn verify_session(
    provider: &dyn IdentityProvider,
    token: &str,
    audience: &str,
) -> Result<VerifiedToken, IdentityError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(IdentityError::InvalidToken("missing token".to_string()));
    }
    let verified = provider.verify_token(token).await?;
    verified.ensure_valid(chrono::Utc::now().timestamp(), audience)?;
    Ok(verified)
}
