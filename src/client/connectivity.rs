use anyhow::Context;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::session_cache::{ClientSession, SessionCache};
use crate::identity::{AuthSession, UserSummary};
use crate::server::messages::ContactMessage;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected locally, no request was sent.
    #[error("{0}")]
    Validation(String),
    /// The server answered 401; the local session has been cleared.
    #[error("{message}; log in again at {redirect}")]
    Unauthorized { redirect: &'static str, message: String },
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// HTTP client for the `/api` surface. Every request carries the cached bearer token, and
/// every 401 clears the cache.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    client: reqwest::Client,
    cache: SessionCache,
}

impl ApiClient {
    pub fn new(base: &str, cache: SessionCache) -> anyhow::Result<Self> {
        let mut base = Url::parse(base).context("invalid base URL")?;
        // API paths resolve relative to the base, so keep any mount prefix as a directory.
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base, client, cache })
    }

    pub fn cache(&self) -> &SessionCache { &self.cache }

    pub fn session(&self) -> Option<ClientSession> { self.cache.restore() }

    fn url(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base.join(&format!("api{path}")).with_context(|| format!("invalid API path {path}"))?)
    }

    async fn send(&self, req: RequestBuilder) -> ClientResult<Value> {
        let resp = self.cache.attach(req).send().await?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!({}));
        let message = body.get("message").and_then(|m| m.as_str()).unwrap_or("request failed").to_string();
        if status == StatusCode::UNAUTHORIZED {
            let redirect = self.cache.on_unauthorized();
            return Err(ClientError::Unauthorized { redirect: redirect.path(), message });
        }
        if !status.is_success() {
            debug!(target: "folio::client", status = status.as_u16(), %message, "api error");
            return Err(ClientError::Api { status: status.as_u16(), message });
        }
        Ok(body)
    }

    async fn issue(&self, path: &str, username: &str, password: &str) -> ClientResult<AuthSession> {
        let req = self.client.post(self.url(path)?).json(&json!({"username": username, "password": password}));
        let session: AuthSession = decode(self.send(req).await?)?;
        self.cache.persist(&session.token, &session.user)?;
        Ok(session)
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<AuthSession> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation("Please enter both username and password".into()));
        }
        self.issue("/auth/login", username, password).await
    }

    pub async fn register(&self, username: &str, password: &str) -> ClientResult<AuthSession> {
        self.issue("/auth/register", username, password).await
    }

    /// Client-side only: the token stays valid on the server until it expires.
    pub fn logout(&self) { self.cache.clear() }

    pub async fn profile(&self) -> ClientResult<UserSummary> {
        let body = self.send(self.client.get(self.url("/auth/profile")?)).await?;
        field(body, "user")
    }

    pub async fn send_contact(&self, name: &str, email: &str, message: &str) -> ClientResult<ContactMessage> {
        let req = self.client.post(self.url("/contact")?).json(&json!({"name": name, "email": email, "message": message}));
        field(self.send(req).await?, "data")
    }

    pub async fn messages(&self) -> ClientResult<Vec<ContactMessage>> {
        field(self.send(self.client.get(self.url("/admin/messages")?)).await?, "data")
    }

    pub async fn message(&self, id: &str) -> ClientResult<ContactMessage> {
        field(self.send(self.client.get(self.url(&format!("/admin/messages/{id}"))?)).await?, "data")
    }

    pub async fn unread_count(&self) -> ClientResult<usize> {
        field(self.send(self.client.get(self.url("/admin/messages/unread/count")?)).await?, "count")
    }

    pub async fn mark_read(&self, id: &str) -> ClientResult<ContactMessage> {
        field(self.send(self.client.put(self.url(&format!("/admin/messages/{id}/read"))?)).await?, "data")
    }

    pub async fn delete_message(&self, id: &str) -> ClientResult<()> {
        self.send(self.client.delete(self.url(&format!("/admin/messages/{id}"))?)).await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> ClientResult<T> { Ok(serde_json::from_value(body)?) }

fn field<T: DeserializeOwned>(mut body: Value, name: &str) -> ClientResult<T> {
    decode(body.get_mut(name).map(Value::take).unwrap_or(Value::Null))
}
