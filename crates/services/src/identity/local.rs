use std::sync::atomic::{AtomicBool, Ordering};

use argon2::password_hash::rand_core::OsRng;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use tracing::info;

use super::{
    IdentityError, IdentityProvider, IdentityUser, InviteEmail, NewUser, OtpOptions, Session,
    SessionTokens, UserMetadata, UserUpdate, VerifiedToken,
};

#[derive(Debug, Clone)]
struct LocalUser {
    id: String,
    email: String,
    password_hash: Option<String>,
    metadata: UserMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Otp,
    Invite,
}

/// An email the provider would have sent.
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub kind: MailKind,
    pub code: Option<String>,
    pub redirect_url: Option<String>,
    pub data: serde_json::Value,
}

/// Self-contained identity provider for development and tests. Users live in
/// memory, passwords are argon2-hashed and mail goes to an inspectable outbox.
pub struct LocalIdentityProvider {
    tokens: SessionTokens,
    users: DashMap<String, LocalUser>,
    emails: DashMap<String, String>,
    codes: DashMap<String, String>,
    /// Revoked sessions, keyed by session id, with the token expiry.
    signed_out: DashMap<String, i64>,
    outbox: Mutex<Vec<SentMail>>,
    fail_mail: AtomicBool,
}

impl LocalIdentityProvider {
    pub fn new(tokens: SessionTokens) -> Self {
        Self {
            tokens,
            users: DashMap::new(),
            emails: DashMap::new(),
            codes: DashMap::new(),
            signed_out: DashMap::new(),
            outbox: Mutex::new(Vec::new()),
            fail_mail: AtomicBool::new(false),
        }
    }

    pub fn outbox(&self) -> Vec<SentMail> {
        self.outbox.lock().clone()
    }

    /// The most recent mail of `kind` addressed to `email`.
    pub fn last_mail(&self, email: &str, kind: MailKind) -> Option<SentMail> {
        let email = email.to_lowercase();
        self.outbox
            .lock()
            .iter()
            .rev()
            .find(|m| m.to == email && m.kind == kind)
            .cloned()
    }

    /// Makes every following mail delivery fail until switched off.
    pub fn set_mail_failure(&self, fail: bool) {
        self.fail_mail.store(fail, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn hash_password(password: &str) -> Result<String, IdentityError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| IdentityError::HashError(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify_password(password: &str, hash: &str) -> Result<bool, IdentityError> {
        let parsed = PasswordHash::new(hash).map_err(|e| IdentityError::HashError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    fn find_by_email(&self, email: &str) -> Option<LocalUser> {
        let id = self.emails.get(email)?.clone();
        self.users.get(&id).map(|u| u.clone())
    }

    fn insert_user(&self, email: &str, password_hash: Option<String>, metadata: UserMetadata)
    -> Result<LocalUser, IdentityError> {
        let user = LocalUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash,
            metadata,
        };
        match self.emails.entry(email.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(IdentityError::UserExists),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                self.users.insert(user.id.clone(), user.clone());
                slot.insert(user.id.clone());
                Ok(user)
            }
        }
    }

    fn session_for(&self, user: &LocalUser) -> Result<Session, IdentityError> {
        Ok(Session {
            user_id: user.id.clone(),
            email: user.email.clone(),
            access_token: self.tokens.issue(&user.id, &user.email)?,
            refresh_token: None,
            expires_in: self.tokens.ttl_secs(),
        })
    }

    fn deliver(&self, mail: SentMail) -> Result<(), IdentityError> {
        if self.fail_mail.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("mail delivery failed".to_string()));
        }
        info!(to = %mail.to, kind = ?mail.kind, "Local provider mail queued");
        self.outbox.lock().push(mail);
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let user = self
            .find_by_email(&email.to_lowercase())
            .ok_or(IdentityError::InvalidCredentials)?;
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(IdentityError::InvalidCredentials)?;
        if !Self::verify_password(password, hash)? {
            return Err(IdentityError::InvalidCredentials);
        }
        self.session_for(&user)
    }

    async fn send_otp(&self, email: &str, options: &OtpOptions) -> Result<(), IdentityError> {
        let email = email.to_lowercase();
        if self.find_by_email(&email).is_none() {
            if !options.create_user {
                return Err(IdentityError::UserNotFound);
            }
            self.insert_user(&email, None, UserMetadata::default())?;
        }
        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
        self.deliver(SentMail {
            to: email.clone(),
            kind: MailKind::Otp,
            code: Some(code.clone()),
            redirect_url: None,
            data: options.data.clone(),
        })?;
        self.codes.insert(email, code);
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<Session, IdentityError> {
        let email = email.to_lowercase();
        self.codes
            .remove_if(&email, |_, expected| expected == code)
            .ok_or(IdentityError::InvalidOtp)?;
        let user = self.find_by_email(&email).ok_or(IdentityError::UserNotFound)?;
        self.session_for(&user)
    }

    async fn verify_token(&self, token: &str) -> Result<VerifiedToken, IdentityError> {
        let verified = self.tokens.verify(token)?;
        if self.signed_out.contains_key(&revocation_key(&verified, token)) {
            return Err(IdentityError::InvalidToken("session signed out".to_string()));
        }
        Ok(verified)
    }

    async fn create_user(&self, user: &NewUser) -> Result<IdentityUser, IdentityError> {
        let hash = Self::hash_password(&user.password)?;
        let created = self.insert_user(&user.email.to_lowercase(), Some(hash), user.metadata.clone())?;
        Ok(IdentityUser {
            id: created.id,
            email: created.email,
            metadata: created.metadata,
        })
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), IdentityError> {
        let (_, user) = self.users.remove(user_id).ok_or(IdentityError::UserNotFound)?;
        self.emails.remove(&user.email);
        Ok(())
    }

    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<(), IdentityError> {
        let hash = match &update.password {
            Some(password) => Some(Self::hash_password(password)?),
            None => None,
        };
        let mut user = self.users.get_mut(user_id).ok_or(IdentityError::UserNotFound)?;
        if hash.is_some() {
            user.password_hash = hash;
        }
        if let Some(metadata) = &update.metadata {
            if metadata.full_name.is_some() {
                user.metadata.full_name = metadata.full_name.clone();
            }
            if metadata.phone.is_some() {
                user.metadata.phone = metadata.phone.clone();
            }
        }
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<IdentityUser, IdentityError> {
        let user = self.users.get(user_id).ok_or(IdentityError::UserNotFound)?;
        Ok(IdentityUser {
            id: user.id.clone(),
            email: user.email.clone(),
            metadata: user.metadata.clone(),
        })
    }

    async fn invite_by_email(&self, email: &str, invite: &InviteEmail) -> Result<(), IdentityError> {
        let email = email.to_lowercase();
        self.deliver(SentMail {
            to: email.clone(),
            kind: MailKind::Invite,
            code: None,
            redirect_url: Some(invite.redirect_url.clone()),
            data: invite.data.clone(),
        })?;
        if self.find_by_email(&email).is_none() {
            self.insert_user(&email, None, UserMetadata::default())?;
        }
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let verified = self.tokens.verify(access_token)?;
        // Expired tokens fail verification anyway.
        let now = chrono::Utc::now().timestamp();
        self.signed_out.retain(|_, exp| *exp > now);
        self.signed_out
            .insert(revocation_key(&verified, access_token), verified.claims.exp);
        Ok(())
    }
}

fn revocation_key(verified: &VerifiedToken, token: &str) -> String {
    verified
        .claims
        .session_id
        .clone()
        .unwrap_or_else(|| token.to_string())
}
