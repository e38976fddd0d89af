//! Rivollo API server
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────────┐
//! │  Config  │───▶│ Postgres │───▶│ AppState │───▶│ axum Gateway │
//! │  (YAML)  │    │(migrate) │    │(services)│    │   /api/v1    │
//! └──────────┘    └──────────┘    └──────────┘    └──────────────┘
//! ```
//!
//! Usage: `rivollo_api [--env|-e dev|prod] [--port 8000]`

use std::sync::Arc;

use anyhow::Context;

use rivollo_api::config::AppConfig;
use rivollo_api::db::Database;
use rivollo_api::gateway::{self, state::AppState};

/// Config profile from command line (`--env` / `-e`), `dev` by default
fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = rivollo_api::logging::init_logging(&app_config);

    tracing::info!("Starting Rivollo API in {} mode", env);

    let database_url = app_config
        .postgres_url
        .clone()
        .context("postgres_url is not configured (set DATABASE_URL)")?;
    let db = Database::connect(&database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    tracing::info!("PostgreSQL connected");

    if app_config.run_migrations {
        db.migrate().await.context("Failed to apply migrations")?;
    }

    let host = app_config.gateway.host.clone();
    let port = get_port_override().unwrap_or(app_config.gateway.port);

    let state = Arc::new(AppState::from_config(app_config, Arc::new(db))?);
    gateway::run_server(state, &host, port).await
}
