//! Request authentication gate.
//!
//! Per request: UNAUTHENTICATED -> AUTHENTICATED, or UNAUTHENTICATED -> REJECTED. The caller
//! only ever sees a uniform 401; the [`AuthFailure`] kind is kept for logs.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use super::principal::{Identity, Role};
use super::request_context::RequestContext;
use super::store::CredentialStore;
use super::token::TokenCodec;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("no bearer token")]
    NoToken,
    #[error("token invalid or expired")]
    InvalidToken,
    #[error("token subject no longer exists")]
    UnknownUser,
    #[error("credential store unavailable")]
    StoreUnavailable,
    #[error("no identity attached to request")]
    NoIdentity,
    #[error("requires role {required}")]
    Forbidden { required: Role },
}

/// Pull the credential out of an `Authorization` header value. Only the `Bearer` scheme
/// (any case) with a non-empty token counts.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") { return None; }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec) -> Self { Self { store, codec } }

    /// Resolve an `Authorization` header value to the live user it names.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Identity, AuthFailure> {
        let token = bearer_token(authorization).ok_or(AuthFailure::NoToken)?;
        let claims = self.codec.verify(token)?;
        let user = self
            .store
            .find_by_id(&claims.user_id)
            .map_err(|e| {
                error!(target: "folio::auth", error = %e, "credential lookup failed");
                AuthFailure::StoreUnavailable
            })?
            .ok_or(AuthFailure::UnknownUser)?;
        Ok(Identity::new(user))
    }
}

/// Middleware: attach a [`RequestContext`] carrying the caller's identity, or answer 401.
pub async fn authenticate_request(State(auth): State<Arc<Authenticator>>, mut req: Request, next: Next) -> Response {
    let header = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    match auth.authenticate(header) {
        Ok(identity) => {
            let request_id = uuid::Uuid::new_v4().to_string();
            debug!(target: "folio::auth", %request_id, user_id = %identity.user.id, path = %req.uri().path(), "request authenticated");
            req.extensions_mut().insert(RequestContext::authenticated(identity, request_id));
            next.run(req).await
        }
        Err(failure) => {
            warn!(target: "folio::auth", reason = %failure, path = %req.uri().path(), "request rejected");
            AppError::from(failure).into_response()
        }
    }
}
