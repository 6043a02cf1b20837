//! Stateless session tokens.
//!
//! Tokens are compact HS256 JWTs over `{userId, username, role, iat, exp}` signed with the
//! process-wide secret from [`AuthConfig`]. Verification checks the signature first, then
//! the expiry against the supplied clock with no leeway: a token is dead from the second
//! `exp` is reached. Nothing is stored server-side, so nothing can be revoked.

use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::authenticator::AuthFailure;
use super::principal::{Role, User};
use crate::config::AuthConfig;

/// Who a token speaks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSubject {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl From<&User> for TokenSubject {
    fn from(u: &User) -> Self {
        Self { user_id: u.id.clone(), username: u.username.clone(), role: u.role }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    pub role: Role,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

impl Claims {
    pub fn subject(&self) -> TokenSubject {
        TokenSubject { user_id: self.user_id.clone(), username: self.username.clone(), role: self.role }
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(cfg: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand in verify_at so the clock can be supplied.
        validation.validate_exp = false;
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            validation,
            ttl: cfg.token_ttl,
        }
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn sign(&self, subject: &TokenSubject) -> anyhow::Result<String> {
        self.sign_at(subject, Utc::now().timestamp())
    }

    pub fn sign_at(&self, subject: &TokenSubject, issued_at: i64) -> anyhow::Result<String> {
        let claims = Claims {
            user_id: subject.user_id.clone(),
            username: subject.username.clone(),
            role: subject.role,
            iat: issued_at,
            exp: issued_at + self.ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).context("failed to sign session token")
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthFailure> {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthFailure> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(target: "folio::auth", error = %e, "token rejected");
            AuthFailure::InvalidToken
        })?;
        if now >= data.claims.exp {
            debug!(target: "folio::auth", exp = data.claims.exp, now, "token expired");
            return Err(AuthFailure::InvalidToken);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod token_tests;
