//! Prometheus exporter for Alibaba Cloud CloudMonitor.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use cms_exporter_common::{ResourceType, catalog_for, init_tracing};
use cms_exporter_prometheus::{CmsClient, ExporterConfig, Exposition, HttpServer};

/// Prometheus exporter for Alibaba Cloud CloudMonitor.
#[derive(Parser, Debug)]
#[command(name = "cms-exporter-prometheus")]
#[command(about = "Export Alibaba Cloud CloudMonitor metrics as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Resource type to export: ecs, redis or slb (overrides config).
    #[arg(short, long)]
    resource: Option<ResourceType>,

    /// Address to listen on for the web interface and telemetry (overrides config).
    #[arg(long = "telemetry.address")]
    telemetry_address: Option<String>,

    /// Path under which to expose metrics (overrides config).
    #[arg(long = "telemetry.endpoint")]
    telemetry_endpoint: Option<String>,

    /// CloudMonitor region ID (overrides config).
    #[arg(long)]
    region: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // CLI overrides
    if let Some(resource) = args.resource {
        config.resource = resource;
    }
    if let Some(listen) = args.telemetry_address {
        config.prometheus.listen = Some(listen);
    }
    if let Some(path) = args.telemetry_endpoint {
        config.prometheus.path = path;
    }
    if let Some(region) = args.region {
        config.cms.region = region;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_tracing(&config.logging)?;

    info!(
        resource = %config.resource,
        region = %config.cms.region,
        "Starting CloudMonitor Prometheus Exporter"
    );

    let credentials = config.cms.credentials()?;
    let listen_addr = config.listen_addr()?;

    let catalog = Arc::new(catalog_for(config.resource));
    let exposition = Exposition::new(
        config.prometheus.prefix.clone(),
        &catalog,
        &config.prometheus.default_labels,
    )
    .with_scrape_stats(config.prometheus.scrape_stats);
    let client = CmsClient::new(&config.cms, credentials)?;

    info!(
        namespace = %catalog.namespace(),
        metrics = catalog.len(),
        endpoint = %client.endpoint(),
        "Catalog loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        Arc::new(client),
        catalog,
        Arc::new(exposition),
        listen_addr,
        config.prometheus.path.clone(),
    );

    let mut http_task = tokio::spawn(async move { http_server.run(shutdown_rx).await });

    // Wait for shutdown signal, or for the server to stop on its own
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        result = &mut http_task => {
            return match result {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {}", e)),
            };
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    match tokio::time::timeout(Duration::from_secs(5), http_task).await {
        Ok(Ok(Err(e))) => error!("HTTP server error: {}", e),
        Ok(Err(e)) => error!("HTTP server task failed: {}", e),
        Err(_) => error!("HTTP server did not stop within 5s"),
        Ok(Ok(Ok(()))) => {}
    }

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
