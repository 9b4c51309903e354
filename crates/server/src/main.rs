//! Magpie server - performance and traffic modelling for Apache Heron
//!
//! Loads the configured models once at startup and serves predictions over
//! HTTP until interrupted.

use anyhow::{Context, Result};
use magpie_lib::{
    builtin_catalog,
    clients::{GremlinHttpClient, TrackerMetricsClient},
    health::{components, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    ModelGroup, ModelRegistry, PredictionOrchestrator, SharedClients,
};
use magpie_server::{api, ServerConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting magpie-server");

    let config = ServerConfig::load()?;
    info!(
        api_port = config.api_port,
        graph_url = %config.graph.url,
        metrics_url = %config.metrics.url,
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::REGISTRY).await;

    // no partial registry is ever served
    let catalog = builtin_catalog()?;
    let registry = match ModelRegistry::load(&config.models, &catalog) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(error = %e, "Invalid model configuration");
            return Err(e).context("Failed to load model registry");
        }
    };

    let metrics = ServiceMetrics::new();
    for group in ModelGroup::ALL {
        metrics.set_registered_models(group, registry.models(group).len());
    }

    let clients = SharedClients::new(
        Arc::new(GremlinHttpClient::new(&config.graph)?),
        Arc::new(TrackerMetricsClient::new(&config.metrics)?),
    );
    health_registry.register(components::GRAPH_CLIENT).await;
    health_registry.register(components::METRICS_CLIENT).await;

    let orchestrator =
        PredictionOrchestrator::new(registry.clone(), clients, config.orchestrator.clone())
            .with_health(health_registry.clone());

    let logger = StructuredLogger::new("magpie-server");
    logger.log_startup(SERVER_VERSION, config.api_port, registry.len());

    let app_state = Arc::new(api::AppState::new(orchestrator, health_registry.clone()));
    health_registry.set_ready(true).await;

    api::serve(config.api_port, app_state, shutdown_signal()).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
