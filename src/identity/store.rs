use chrono::Utc;
use tracing::debug;

use super::principal::{Role, User};
use crate::storage::{Collection, DocumentStore, StoreResult};

/// Persistence for user accounts, as seen by the session issuer and the authenticator.
pub trait CredentialStore: Send + Sync {
    /// Exact, case-sensitive match.
    fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;
    /// Fails with `StoreError::Duplicate` when the username is taken.
    fn create(&self, username: &str, password_hash: &str, role: Role) -> StoreResult<User>;
}

pub const USERS_COLLECTION: &str = "users";

/// Credential store over the `users` document collection.
#[derive(Clone)]
pub struct DocumentCredentialStore {
    users: Collection<User>,
}

impl DocumentCredentialStore {
    pub fn open(store: &DocumentStore) -> StoreResult<Self> {
        Ok(Self { users: store.collection(USERS_COLLECTION)? })
    }

    pub fn len(&self) -> usize { self.users.len() }
    pub fn is_empty(&self) -> bool { self.users.is_empty() }
}

impl CredentialStore for DocumentCredentialStore {
    fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.users.find_one(|u| u.username == username))
    }

    fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.find_by_id(id))
    }

    fn create(&self, username: &str, password_hash: &str, role: Role) -> StoreResult<User> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        };
        let user = self.users.insert_unique_by(user, |u| u.username.clone())?;
        debug!(target: "folio::storage", user_id = %user.id, "user created");
        Ok(user)
    }
}
