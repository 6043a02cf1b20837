use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use super::authenticator::AuthFailure;
use super::principal::{Identity, Role};
use super::request_context::RequestContext;
use crate::error::AppError;

/// Role gate. Pure: looks at the context, never changes it.
pub fn authorize(ctx: &RequestContext, required: Role) -> Result<&Identity, AuthFailure> {
    let identity = ctx.identity().ok_or(AuthFailure::NoIdentity)?;
    if identity.has_role(required) { Ok(identity) } else { Err(AuthFailure::Forbidden { required }) }
}

/// Middleware for a role-gated route. Must be layered inside `authenticate_request`.
pub async fn require_role(required: Role, req: Request, next: Next) -> Response {
    let outcome = match req.extensions().get::<RequestContext>() {
        Some(ctx) => authorize(ctx, required).map(|_| ()),
        None => Err(AuthFailure::NoIdentity),
    };
    match outcome {
        Ok(()) => next.run(req).await,
        Err(AuthFailure::NoIdentity) => {
            error!(target: "folio::auth", path = %req.uri().path(), "role gate reached without an identity; check middleware order");
            AppError::from(AuthFailure::NoIdentity).into_response()
        }
        Err(failure) => {
            warn!(target: "folio::auth", reason = %failure, path = %req.uri().path(), "request forbidden");
            AppError::from(failure).into_response()
        }
    }
}

pub async fn require_admin(req: Request, next: Next) -> Response { require_role(Role::Admin, req, next).await }
