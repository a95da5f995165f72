//! NeuroScan
//!
//! Brain MRI classification API. Uploaded scans are classified by a Vision
//! Transformer that is downloaded and loaded on the first request.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use neuroscan_classifiers::{ViTFactory, RUNTIME_NAME};
use neuroscan_core::CompatibilityGate;
use neuroscan_server::{run_server, AppState, Cli, ServiceConfig};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.log_json);

    info!("Starting NeuroScan");

    // Load configuration
    let config = ServiceConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Model: {}", config.model.model_id());
    info!("Device: {:?}", config.model.device);

    // Evaluated once, before any request can observe it
    let gate = CompatibilityGate::check(RUNTIME_NAME, config.runtime.effective_version());
    info!(
        "Tensor runtime: {} {} ({})",
        gate.runtime(),
        gate.detected_version(),
        if gate.is_incompatible() { "incompatible" } else { "ok" }
    );

    let metrics_handle = init_metrics()?;

    let factory = Arc::new(ViTFactory::new(config.model.clone()));
    let addr = config.server.socket_addr()?;
    let preload = config.model.preload;

    let state = AppState::new(config, gate, factory).with_metrics(metrics_handle);

    if preload && !state.gate.is_incompatible() {
        info!("Preloading model...");
        state.classifier.preload().await;
    }

    run_server(state, addr, async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    })
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("neuroscan=debug,neuroscan_server=debug,neuroscan_classifiers=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("neuroscan=info,neuroscan_server=info,neuroscan_classifiers=info,neuroscan_core=info,tower_http=warn")
        })
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "neuroscan_requests_total",
        "Total number of requests by endpoint"
    );
    metrics::describe_counter!("neuroscan_errors_total", "Total number of errors by kind");
    metrics::describe_counter!(
        "neuroscan_model_loads_total",
        "Classifier construction attempts by outcome"
    );
    metrics::describe_histogram!(
        "neuroscan_inference_latency_us",
        metrics::Unit::Microseconds,
        "Inference latency in microseconds"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
