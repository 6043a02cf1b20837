use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::authenticator::AuthFailure;
use super::principal::Identity;
use crate::error::AppError;

/// Per-request context. `identity` is only ever populated by the authentication gate.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub identity: Option<Identity>,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn authenticated(identity: Identity, request_id: String) -> Self {
        Self { identity: Some(identity), request_id: Some(request_id) }
    }

    pub fn identity(&self) -> Option<&Identity> { self.identity.as_ref() }
}

/// Handlers behind the gates take `Identity` directly.
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.identity.clone())
            .ok_or_else(|| AuthFailure::NoIdentity.into())
    }
}
