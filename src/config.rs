//! Startup configuration for the server and the admin CLI.
//!
//! Everything is resolved once, in `main`, with the precedence CLI flag > environment
//! variable > default, and then handed by reference to the components that need it.
//! Request-handling code never reads the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Fixed validity window of an issued session token.
pub const TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Secret used when `JWT_SECRET` is not provided. Only suitable for local development.
pub const DEV_JWT_SECRET: &str = "devsecret";

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub const DEFAULT_DB_FOLDER: &str = "data";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";
pub const DEFAULT_SESSION_FILE: &str = ".folio_session.json";

/// Token signing settings shared by the codec.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self { jwt_secret: jwt_secret.into(), token_ttl: TOKEN_TTL }
    }

    /// True when running on the built-in development secret.
    pub fn is_dev_secret(&self) -> bool { self.jwt_secret == DEV_JWT_SECRET }
}

// Never print the secret.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_host: String,
    pub http_port: u16,
    /// Folder holding the document collections. `None` keeps everything in memory.
    pub db_root: Option<PathBuf>,
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// In-memory configuration, mostly for tests.
    pub fn ephemeral(jwt_secret: impl Into<String>) -> Self {
        Self {
            http_host: "127.0.0.1".to_string(),
            http_port: 0,
            db_root: None,
            auth: AuthConfig::new(jwt_secret),
        }
    }

    pub fn from_env_and_args(args: &[String]) -> Self {
        let http_port = parse_port_arg(args, "--http-port")
            .or_else(|| parse_port_env("FOLIO_HTTP_PORT"))
            .or_else(|| parse_port_env("PORT"))
            .unwrap_or(DEFAULT_HTTP_PORT);
        let http_host = parse_string_arg(args, "--host")
            .or_else(|| env::var("FOLIO_HTTP_HOST").ok())
            .unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string());
        let db_root = parse_string_arg(args, "--db-folder")
            .or_else(|| env::var("FOLIO_DB_FOLDER").ok())
            .unwrap_or_else(|| DEFAULT_DB_FOLDER.to_string());
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(s) if !s.trim().is_empty() => s,
            _ => {
                warn!(target: "startup", "JWT_SECRET not set; falling back to the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };
        Self {
            http_host,
            http_port,
            db_root: Some(PathBuf::from(db_root)),
            auth: AuthConfig::new(jwt_secret),
        }
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.http_host, self.http_port) }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub session_file: PathBuf,
}

impl ClientConfig {
    pub fn from_env_and_args(args: &[String]) -> Self {
        let server_url = parse_string_arg(args, "--server")
            .or_else(|| env::var("FOLIO_SERVER").ok())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let session_file = parse_string_arg(args, "--session-file")
            .or_else(|| env::var("FOLIO_SESSION_FILE").ok())
            .unwrap_or_else(|| DEFAULT_SESSION_FILE.to_string());
        Self { server_url, session_file: PathBuf::from(session_file) }
    }
}

fn parse_port_env(name: &str) -> Option<u16> {
    match env::var(name) {
        Ok(val) => val.parse::<u16>().ok(),
        Err(_) => None,
    }
}

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    parse_string_arg(args, flag).and_then(|v| v.parse::<u16>().ok())
}

fn parse_string_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

/// Strip `--flag value` pairs from the argument list, leaving positional arguments.
pub fn positional_args(args: &[String], flags_with_values: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if flags_with_values.contains(&args[i].as_str()) {
            i += 2;
            continue;
        }
        out.push(args[i].clone());
        i += 1;
    }
    out
}
