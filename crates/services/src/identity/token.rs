use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{IdentityError, VerifiedToken};

/// Claims carried by provider-issued session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub aud: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// HS256 signing and verification of session tokens.
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    audience: String,
    ttl_secs: u64,
}

impl SessionTokens {
    pub fn new(secret: &str, audience: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            audience: audience.to_string(),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, IdentityError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            email: Some(email.to_string()),
            aud: self.audience.clone(),
            exp: (now + Duration::seconds(self.ttl_secs as i64)).timestamp(),
            iat: now.timestamp(),
            role: Some(self.audience.clone()),
            session_id: Some(uuid::Uuid::new_v4().to_string()),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))
    }

    /// Checks signature, expiry and audience.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, IdentityError> {
        let mut validation = Validation::default();
        validation.set_audience(&[&self.audience]);
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdentityError::TokenExpired,
                _ => IdentityError::InvalidToken(e.to_string()),
            }
        })?;

        let claims = data.claims;
        Ok(VerifiedToken {
            user_id: claims.sub.clone(),
            email: claims.email.clone(),
            claims,
        })
    }
}
