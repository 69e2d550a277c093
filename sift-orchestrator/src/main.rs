//! Sift Orchestrator
//!
//! Runs one pipeline engine container per organization.
//!
//! Architecture:
//! - Configuration: flags or environment, validated at boot
//! - Repositories: Postgres access to instances and their versions
//! - Services: instance registry and the orchestrator façade
//! - Containers: engine lifecycle over the docker/podman CLI
//! - API: HTTP endpoints over the orchestrator
//!
//! Each started engine is published on the edge proxy as
//! `<org>.<tenant_domain>:<port>` for every port it listens on.

pub mod api;
pub mod config;
pub mod container;
pub mod db;
pub mod repository;
pub mod service;
pub mod template;

use anyhow::{Context, Result};
use clap::Parser;
use sift_core::preview::PreviewAugmenter;
use sift_proxy::{ProxyClient, RouteSynchronizer};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::container::{CliRuntime, ContainerManager};
use crate::repository::PgInstanceStore;
use crate::service::{InstanceCache, InstanceRegistry, Orchestrator};
use crate::template::TemplateLoader;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sift_orchestrator=debug,sift_proxy=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sift Orchestrator...");

    let config = Config::parse();
    config.validate().context("Invalid configuration")?;

    info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database ready");

    let runtime = CliRuntime::new(&config.container_cli);
    if let Err(e) = runtime.check_available().await {
        warn!("Container runtime check failed: {:#}", e);
    }

    let proxy = RouteSynchronizer::new(
        Arc::new(ProxyClient::new(&config.proxy_admin_url)),
        &config.tenant_domain,
    );
    let containers = ContainerManager::new(
        Arc::new(runtime),
        proxy,
        Arc::new(PreviewAugmenter::new(&config.preview_sink_uri)),
        config.container_settings(),
        config.readiness(),
    );

    let registry = InstanceRegistry::new(
        Arc::new(PgInstanceStore::new(pool)),
        InstanceCache::new(config.cache_ttl()),
        TemplateLoader::new(config.default_template.clone()),
    );

    let orchestrator = Arc::new(Orchestrator::new(registry, containers));

    // Build router with all API endpoints
    let app = api::create_router(orchestrator);

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
