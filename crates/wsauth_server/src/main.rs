//! wsauth_server — REST server for certificate provisioning and
//! authorization tickets.
//!
//! Configuration comes from `WSAUTH_*` environment variables (a `.env` file
//! is honoured); see `config.rs` for the full list.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use wsauth_core::{
    AuthorizationOrchestrator, CertificateProvisioner, HttpAuthorityClient, IssuanceService,
    SystemClock,
};
use wsauth_postgres::PgIssuanceStore;
use wsauth_server::config::ServerConfig;
use wsauth_server::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wsauth_server=debug,wsauth_core=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(?config, "configuration loaded");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    tracing::info!("Connected to database");

    let store = PgIssuanceStore::new(pool);
    store.migrate().await?;

    let mut authority = HttpAuthorityClient::new(&config.authority_url, &config.authority_env);
    if let Some(token) = &config.authority_token {
        authority = authority.with_access_token(token);
    }
    let authority = Arc::new(authority);
    let clock = Arc::new(SystemClock);

    let orchestrator =
        AuthorizationOrchestrator::new(authority.clone(), clock.clone(), config.retry.clone());
    let provisioner = CertificateProvisioner::new(authority, clock)
        .with_alias(config.cert_alias.clone())
        .with_validity_days(config.cert_validity_days)
        .with_call_timeout(config.retry.attempt_timeout);

    let service = Arc::new(IssuanceService::new(
        Arc::new(store),
        orchestrator,
        provisioner,
    ));
    let app = build_router(service);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("wsauth_server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
