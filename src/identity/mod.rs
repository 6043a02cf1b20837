//! Identity and session management for the site's admin surface.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod password;
mod store;
mod token;
mod provider;
mod authenticator;
mod request_context;
mod authorizer;

pub use principal::{Identity, Role, User, UserSummary};
pub use password::{hash_password, verify_password};
pub use store::{CredentialStore, DocumentCredentialStore, USERS_COLLECTION};
pub use token::{Claims, TokenCodec, TokenSubject};
pub use provider::{AuthSession, IssueError, LoginRequest, SessionIssuer, DEFAULT_ROLE};
pub use authenticator::{authenticate_request, bearer_token, AuthFailure, Authenticator};
pub use request_context::RequestContext;
pub use authorizer::{authorize, require_admin, require_role};
