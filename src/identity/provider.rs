use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::tprintln;
use super::password;
use super::principal::{Role, User, UserSummary};
use super::store::CredentialStore;
use super::token::{TokenCodec, TokenSubject};
use crate::storage::{self, StoreError};

/// Role handed to every newly registered account (single-owner site).
pub const DEFAULT_ROLE: Role = Role::Admin;

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("{0}")]
    Validation(String),
    #[error("username already exists")]
    DuplicateUsername,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for IssueError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(_) => IssueError::DuplicateUsername,
            other => IssueError::Internal(anyhow!(other)),
        }
    }
}

/// Body of the register and login endpoints. Missing fields read as empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// A freshly issued session: the bearer token and who it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: UserSummary,
}

pub struct SessionIssuer {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
}

impl SessionIssuer {
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec) -> Self { Self { store, codec } }

    pub fn codec(&self) -> &TokenCodec { &self.codec }

    pub async fn register(&self, req: &LoginRequest) -> Result<AuthSession, IssueError> {
        if req.username.trim().is_empty() || req.password.is_empty() {
            return Err(IssueError::Validation("Username & password required".into()));
        }
        // create() re-checks under the collection write lock.
        if self.store.find_by_username(&req.username)?.is_some() {
            return Err(IssueError::DuplicateUsername);
        }
        let pw = req.password.clone();
        let hash = run_blocking(move || password::hash_password(&pw)).await??;
        let (store, username) = (self.store.clone(), req.username.clone());
        let user = storage::blocking(move || store.create(&username, &hash, DEFAULT_ROLE)).await??;
        info!(target: "folio::auth", user_id = %user.id, username = %user.username, role = %user.role, "user registered");
        self.issue(&user)
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<AuthSession, IssueError> {
        let found = self.store.find_by_username(&req.username)?;
        let pw = req.password.clone();
        let Some(user) = found else {
            run_blocking(move || password::verify_against_dummy(&pw)).await?;
            debug!(target: "folio::auth", "login rejected: unknown username");
            return Err(IssueError::InvalidCredentials);
        };
        let hash = user.password_hash.clone();
        let matched = run_blocking(move || password::verify_password(&hash, &pw)).await?;
        if !matched {
            debug!(target: "folio::auth", user_id = %user.id, "login rejected: password mismatch");
            return Err(IssueError::InvalidCredentials);
        }
        info!(target: "folio::auth", user_id = %user.id, "login succeeded");
        self.issue(&user)
    }

    fn issue(&self, user: &User) -> Result<AuthSession, IssueError> {
        let token = self.codec.sign(&TokenSubject::from(user))?;
        tprintln!("session.issue user={} role={} ttl_secs={}", user.username, user.role, self.codec.ttl().as_secs());
        Ok(AuthSession { token, user: user.summary() })
    }
}

async fn run_blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.context("password hashing task failed")
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod provider_tests;
