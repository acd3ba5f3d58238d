use std::time::Duration;

use async_trait::async_trait;
use cosecha_config::IdentitySettings;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::{
    IdentityError, IdentityProvider, IdentityUser, InviteEmail, NewUser, OtpOptions, Session,
    SessionTokens, UserMetadata, UserUpdate, VerifiedToken,
};

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

impl From<GoTrueUser> for IdentityUser {
    fn from(user: GoTrueUser) -> Self {
        Self {
            id: user.id,
            email: user.email.unwrap_or_default(),
            metadata: user.user_metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
    user: GoTrueUser,
}

impl From<GoTrueSession> for Session {
    fn from(session: GoTrueSession) -> Self {
        Self {
            user_id: session.user.id,
            email: session.user.email.unwrap_or_default(),
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_in: session.expires_in,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GoTrueErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl GoTrueErrorBody {
    fn into_message(self) -> String {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Client for a GoTrue-compatible auth server (the Supabase auth API).
pub struct GoTrueProvider {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
    tokens: SessionTokens,
}

impl GoTrueProvider {
    pub fn new(settings: &IdentitySettings) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            anon_key: settings.anon_key.clone(),
            service_role_key: settings.service_role_key.clone(),
            tokens: SessionTokens::new(
                &settings.jwt_secret,
                &settings.audience,
                settings.token_ttl_secs,
            ),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn public(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.anon_key)
    }

    fn admin(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, IdentityError> {
        builder
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))
    }

    /// Passes successful responses through and turns the rest into a
    /// `Rejected` or `Unavailable` error.
    async fn check(response: Response) -> Result<Response, IdentityError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<GoTrueErrorBody>()
            .await
            .unwrap_or_default()
            .into_message();
        if status.is_server_error() {
            warn!(%status, %message, "Identity provider error");
            return Err(IdentityError::Unavailable(message));
        }
        Err(IdentityError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, IdentityError> {
        response
            .json::<T>()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))
    }
}

fn is_client_error(err: &IdentityError, statuses: &[StatusCode]) -> bool {
    matches!(err, IdentityError::Rejected { status, .. }
        if statuses.iter().any(|s| s.as_u16() == *status))
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let request = self.public(
            self.client
                .post(self.url("/token"))
                .query(&[("grant_type", "password")])
                .json(&json!({ "email": email, "password": password })),
        );
        let response = Self::check(self.send(request).await?).await.map_err(|e| {
            if is_client_error(&e, &[StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED]) {
                IdentityError::InvalidCredentials
            } else {
                e
            }
        })?;
        Ok(Self::json::<GoTrueSession>(response).await?.into())
    }

    async fn send_otp(&self, email: &str, options: &OtpOptions) -> Result<(), IdentityError> {
        let request = self.public(self.client.post(self.url("/otp")).json(&json!({
            "email": email,
            "create_user": options.create_user,
            "data": options.data,
        })));
        Self::check(self.send(request).await?).await?;
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<Session, IdentityError> {
        let request = self.public(self.client.post(self.url("/verify")).json(&json!({
            "type": "email",
            "email": email,
            "token": code,
        })));
        let response = Self::check(self.send(request).await?).await.map_err(|e| {
            if matches!(e, IdentityError::Rejected { .. }) {
                IdentityError::InvalidOtp
            } else {
                e
            }
        })?;
        Ok(Self::json::<GoTrueSession>(response).await?.into())
    }

    async fn verify_token(&self, token: &str) -> Result<VerifiedToken, IdentityError> {
        self.tokens.verify(token)
    }

    async fn create_user(&self, user: &NewUser) -> Result<IdentityUser, IdentityError> {
        let request = self.admin(self.client.post(self.url("/admin/users")).json(&json!({
            "email": user.email,
            "password": user.password,
            "email_confirm": user.email_confirmed,
            "user_metadata": user.metadata,
        })));
        let response = Self::check(self.send(request).await?).await.map_err(|e| match e {
            IdentityError::Rejected { status: 422, ref message }
                if message.contains("already") =>
            {
                IdentityError::UserExists
            }
            other => other,
        })?;
        Ok(Self::json::<GoTrueUser>(response).await?.into())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), IdentityError> {
        let request = self.admin(
            self.client
                .delete(self.url(&format!("/admin/users/{user_id}"))),
        );
        Self::check(self.send(request).await?).await.map_err(not_found)?;
        Ok(())
    }

    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<(), IdentityError> {
        let mut body = serde_json::Map::new();
        if let Some(password) = &update.password {
            body.insert("password".to_string(), json!(password));
        }
        if let Some(metadata) = &update.metadata {
            body.insert("user_metadata".to_string(), json!(metadata));
        }
        let request = self.admin(
            self.client
                .put(self.url(&format!("/admin/users/{user_id}")))
                .json(&body),
        );
        Self::check(self.send(request).await?).await.map_err(not_found)?;
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<IdentityUser, IdentityError> {
        let request = self.admin(self.client.get(self.url(&format!("/admin/users/{user_id}"))));
        let response = Self::check(self.send(request).await?)
            .await
            .map_err(not_found)?;
        Ok(Self::json::<GoTrueUser>(response).await?.into())
    }

    async fn invite_by_email(&self, email: &str, invite: &InviteEmail) -> Result<(), IdentityError> {
        let request = self.admin(
            self.client
                .post(self.url("/invite"))
                .query(&[("redirect_to", invite.redirect_url.as_str())])
                .json(&json!({ "email": email, "data": invite.data })),
        );
        Self::check(self.send(request).await?).await?;
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let request = self
            .public(self.client.post(self.url("/logout")))
            .bearer_auth(access_token);
        Self::check(self.send(request).await?).await?;
        Ok(())
    }
}

fn not_found(err: IdentityError) -> IdentityError {
    if is_client_error(&err, &[StatusCode::NOT_FOUND]) {
        IdentityError::UserNotFound
    } else {
        err
    }
}
