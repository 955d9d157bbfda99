//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use cms_exporter_common::{Catalog, MetricFetcher, collect_samples};

use crate::exposition::{CONTENT_TYPE, Exposition, ScrapeStats};

/// Application state shared across handlers.
struct AppState<F> {
    fetcher: Arc<F>,
    catalog: Arc<Catalog>,
    exposition: Arc<Exposition>,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            catalog: Arc::clone(&self.catalog),
            exposition: Arc::clone(&self.exposition),
        }
    }
}

/// Create the HTTP router.
fn create_router<F: MetricFetcher + 'static>(
    fetcher: Arc<F>,
    catalog: Arc<Catalog>,
    exposition: Arc<Exposition>,
    metrics_path: &str,
) -> Router {
    let state = AppState {
        fetcher,
        catalog,
        exposition,
    };

    Router::new()
        .route(metrics_path, get(metrics_handler::<F>))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint. Every request runs a full scrape.
async fn metrics_handler<F: MetricFetcher + 'static>(State(state): State<AppState<F>>) -> Response {
    let started = Instant::now();
    let (samples, report) = collect_samples(&state.catalog, state.fetcher.as_ref()).await;
    let stats = ScrapeStats {
        report,
        duration: started.elapsed(),
    };

    match state.exposition.render(&samples, &stats) {
        Ok(body) => (StatusCode::OK, [("content-type", CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n").into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer<F> {
    fetcher: Arc<F>,
    catalog: Arc<Catalog>,
    exposition: Arc<Exposition>,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl<F: MetricFetcher + 'static> HttpServer<F> {
    /// Create a new HTTP server.
    pub fn new(
        fetcher: Arc<F>,
        catalog: Arc<Catalog>,
        exposition: Arc<Exposition>,
        listen_addr: SocketAddr,
        metrics_path: String,
    ) -> Self {
        Self {
            fetcher,
            catalog,
            exposition,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(
            self.fetcher,
            self.catalog,
            self.exposition,
            &self.metrics_path,
        );

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
