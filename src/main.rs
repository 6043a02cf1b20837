//!
//! folio server binary
//! -------------------
//! Starts the portfolio API. Configuration comes from CLI flags and environment variables.

use std::env;

use tracing_subscriber::{fmt, EnvFilter};

use folio::config::ServerConfig;

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("folio Server\n\nUSAGE:\n  folio [--http-port N] [--host ADDR] [--db-folder PATH]\n\nOPTIONS:\n  --http-port N       HTTP API port (env: FOLIO_HTTP_PORT or PORT, default 5000)\n  --host ADDR         Bind address (env: FOLIO_HTTP_HOST, default 0.0.0.0)\n  --db-folder PATH    Document store folder (env: FOLIO_DB_FOLDER, default data)\n\nENVIRONMENT:\n  JWT_SECRET          Token signing secret (development fallback if unset)\n  RUST_LOG            Log filter (default info)\n");
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env_and_args(&args);
    folio::server::run(config).await
}
