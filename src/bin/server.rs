//! Privileges REST API Server
//!
//! Run with: cargo run --features server --bin privileges-server
//!
//! Endpoints:
//!   GET    /ping                 - Liveness
//!   POST   /privileges           - Create privilege
//!   GET    /privileges           - List privileges
//!   GET    /privileges/root      - Root privilege
//!   GET    /privileges/default   - Default privilege
//!   GET    /privileges/:id       - Get privilege
//!   PUT    /privileges/:id       - Update privilege
//!   DELETE /privileges/:id       - Delete privilege (users move to default)

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use privileges::config::DEFAULT_ENV_FILE;
use privileges::server::{build_router, init_tracing, AppState, HttpAuthority};
use privileges::{AuthorizationGate, Config, PrivilegeStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file =
        std::env::var("PRIVILEGES_ENV_FILE").unwrap_or_else(|_| DEFAULT_ENV_FILE.to_string());
    let loaded = dotenv::from_filename(&env_file);

    init_tracing();
    if let Err(e) = loaded {
        info!(file = %env_file, error = %e, "env file not loaded");
    }

    let config = Config::from_env().context("load configuration")?;

    let store = PrivilegeStore::open(&config.db_path, &config.store_options())
        .with_context(|| format!("open store at {}", config.db_path.display()))?;
    store.bootstrap().context("bootstrap singleton privileges")?;

    let authority = HttpAuthority::new(config.authority_url(), config.authority_timeout)
        .context("build authority client")?;
    let gate = AuthorizationGate::new(Arc::new(authority), config.read_policy);
    if let Err(e) = gate.ping_authority().await {
        warn!(addr = %config.authority_url(), error = %e, "identity authority not reachable yet");
    }

    let app = build_router(AppState { store, gate });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    info!(%addr, read_policy = ?config.read_policy, "privileges-server v{} listening", env!("CARGO_PKG_VERSION"));

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serve")?;
    Ok(())
}
