//! Client-side copy of the last issued session.
//!
//! The cache keeps two entries in a [`SessionStorage`]: `token`, the raw bearer token, and
//! `user`, the JSON-encoded [`UserSummary`]. Clearing is idempotent, so any number of
//! in-flight requests may report a 401 at the same time.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::identity::UserSummary;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Where the client is sent once its session is gone.
pub const LOGIN_PATH: &str = "/admin/login";

/// String key/value storage with the semantics of browser local storage.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> { self.entries.lock().get(key).cloned() }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Storage backed by one JSON object on disk. The file is deleted once it holds no keys.
/// Writes go to a sibling `.tmp` file that is renamed over the live one.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into(), lock: Mutex::new(()) } }

    pub fn path(&self) -> &Path { &self.path }

    fn load(&self) -> HashMap<String, String> {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(target: "folio::client", path = %self.path.display(), "session file unreadable, starting empty: {e}");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
                }
                _ => Ok(()),
            };
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, text).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| format!("Failed to replace {}", self.path.display()))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let _g = self.lock.lock();
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _g = self.lock.lock();
        let mut entries = self.load();
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _g = self.lock.lock();
        let mut entries = self.load();
        if entries.remove(key).is_none() { return Ok(()); }
        self.save(&entries)
    }
}

/// A restored session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSession {
    pub token: String,
    pub user: UserSummary,
}

/// Instruction to navigate to the login entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginRedirect(pub &'static str);

impl LoginRedirect {
    pub fn path(&self) -> &'static str { self.0 }
}

#[derive(Clone)]
pub struct SessionCache {
    storage: Arc<dyn SessionStorage>,
}

impl SessionCache {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self { Self { storage } }

    pub fn in_memory() -> Self { Self::new(Arc::new(MemoryStorage::new())) }

    /// Store both entries. If either write fails the cache is cleared, never left half set.
    pub fn persist(&self, token: &str, user: &UserSummary) -> Result<()> {
        let profile = serde_json::to_string(user).context("Failed to encode user profile")?;
        let written = self.storage.set(TOKEN_KEY, token).and_then(|_| self.storage.set(USER_KEY, &profile));
        if let Err(e) = written {
            self.clear();
            return Err(e.context("Failed to persist session"));
        }
        debug!(target: "folio::client", username = %user.username, "session persisted");
        Ok(())
    }

    /// The stored session, if both entries are present. A profile that no longer parses
    /// clears the whole record.
    pub fn restore(&self) -> Option<ClientSession> {
        let token = self.storage.get(TOKEN_KEY)?;
        let raw = self.storage.get(USER_KEY)?;
        match serde_json::from_str::<UserSummary>(&raw) {
            Ok(user) => Some(ClientSession { token, user }),
            Err(e) => {
                warn!(target: "folio::client", "stored user profile is corrupt, clearing session: {e}");
                self.clear();
                None
            }
        }
    }

    pub fn token(&self) -> Option<String> { self.storage.get(TOKEN_KEY) }

    /// Forget the session. Safe to call on an already empty cache.
    pub fn clear(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(target: "folio::client", key, "failed to clear session entry: {e:#}");
            }
        }
    }

    /// Set the bearer credential on an outgoing request when a token is held.
    pub fn attach(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Reaction to any 401 from the server.
    pub fn on_unauthorized(&self) -> LoginRedirect {
        self.clear();
        info!(target: "folio::client", "session rejected by server; redirecting to {}", LOGIN_PATH);
        LoginRedirect(LOGIN_PATH)
    }
}

#[cfg(test)]
#[path = "session_cache_tests.rs"]
mod session_cache_tests;
