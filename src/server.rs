//!
//! folio HTTP server
//! -----------------
//! Axum-based REST API for the portfolio site, mounted under `/api`.
//!
//! Responsibilities:
//! - Account registration and login, answering with a bearer token and the user summary.
//! - The authentication gate and the admin role gate, composed in front of the admin routes.
//! - Contact messages: a public submission endpoint and the admin inbox behind the gates.
//! - Startup logging of the resolved configuration and storage folder.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::AppResult;
use crate::identity::{
    authenticate_request, require_admin, Authenticator, CredentialStore, DocumentCredentialStore, Identity,
    LoginRequest, SessionIssuer, TokenCodec,
};
use crate::storage::{Collection, DocumentStore};

pub mod messages;

use messages::{ContactMessage, MESSAGES_COLLECTION};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<SessionIssuer>,
    pub authenticator: Arc<Authenticator>,
    pub messages: Collection<ContactMessage>,
}

impl AppState {
    /// Open the document store and wire the identity components from one configuration.
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let store = match &config.db_root {
            Some(root) => DocumentStore::open(root)
                .with_context(|| format!("Failed to open document store at {}", root.display()))?,
            None => DocumentStore::in_memory(),
        };
        let users: Arc<dyn CredentialStore> =
            Arc::new(DocumentCredentialStore::open(&store).context("While loading the users collection")?);
        let messages = store.collection(MESSAGES_COLLECTION).context("While loading the messages collection")?;
        let codec = TokenCodec::new(&config.auth);
        Ok(Self {
            issuer: Arc::new(SessionIssuer::new(users.clone(), codec.clone())),
            authenticator: Arc::new(Authenticator::new(users, codec)),
            messages,
        })
    }

    pub fn codec(&self) -> &TokenCodec { self.issuer.codec() }
}

/// Build the full application router: liveness at `/`, everything else under `/api`.
pub fn build_router(state: AppState) -> Router {
    let gate = from_fn_with_state(state.authenticator.clone(), authenticate_request);

    let auth = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile).route_layer(gate.clone()));

    // route_layer wraps outside-in: authentication (added last) runs before the role gate.
    let admin = Router::new()
        .route("/messages", get(messages::list))
        .route("/messages/unread/count", get(messages::unread_count))
        .route("/messages/{id}", get(messages::get_one).delete(messages::delete))
        .route("/messages/{id}/read", put(messages::mark_read))
        .route_layer(from_fn(require_admin))
        .route_layer(gate);

    let api = Router::new()
        .nest("/auth", auth)
        .route("/contact", post(messages::create))
        .nest("/admin", admin);

    Router::new()
        .route("/", get(|| async { "folio ok" }))
        .nest("/api", api)
        .with_state(state)
}

fn log_startup(config: &ServerConfig) {
    let cwd = std::env::current_dir().ok();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "folio starting: RUST_LOG='{}', bind={}, db_root={:?}, cwd={:?}, token_ttl_secs={}",
        rust_log, config.bind_addr(), config.db_root, cwd, config.auth.token_ttl.as_secs()
    );
    if config.auth.is_dev_secret() {
        info!(target: "startup", "signing tokens with the development secret");
    }
    match &config.db_root {
        Some(root) => info!(target: "startup", "Document store folder: {} (exists={})", root.display(), root.exists()),
        None => info!(target: "startup", "Document store is in memory; nothing will be persisted"),
    }
}

/// Start the HTTP server with the given configuration and serve until the process stops.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    log_startup(&config);
    let state = AppState::new(&config)?;
    let addr: SocketAddr = config.bind_addr().parse().with_context(|| format!("Invalid bind address {}", config.bind_addr()))?;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;
    serve_on(listener, state).await
}

/// Serve the application on an already bound listener.
pub async fn serve_on(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    info!("Starting server on {}", local);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

fn credentials(payload: Result<Json<LoginRequest>, JsonRejection>) -> LoginRequest {
    match payload {
        Ok(Json(req)) => req,
        Err(rej) => {
            debug!(target: "folio::server", "unreadable credentials body: {}", rej.body_text());
            LoginRequest::default()
        }
    }
}

async fn register(State(state): State<AppState>, payload: Result<Json<LoginRequest>, JsonRejection>) -> AppResult<impl IntoResponse> {
    let session = state.issuer.register(&credentials(payload)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "User registered", "token": session.token, "user": session.user})),
    ))
}

async fn login(State(state): State<AppState>, payload: Result<Json<LoginRequest>, JsonRejection>) -> AppResult<impl IntoResponse> {
    let session = state.issuer.login(&credentials(payload)).await?;
    Ok(Json(json!({"success": true, "message": "Login successful", "token": session.token, "user": session.user})))
}

async fn profile(identity: Identity) -> impl IntoResponse {
    Json(json!({"success": true, "user": identity.user.summary()}))
}

