//! CMS Exporter Common Library
//!
//! This crate provides the resource-independent core of the CloudMonitor exporters:
//!
//! - [`catalog`] - Metric catalogs per resource type (`Catalog`, `MetricDefinition`, `LabelClass`)
//! - [`datapoint`] - The remote datapoint record and its lenient decoder
//! - [`projector`] - Datapoint to labeled `Sample` projection
//! - [`scrape`] - Scrape orchestration over a `MetricFetcher`
//! - [`config`] - Logging configuration
//! - [`error`] - Error types

pub mod catalog;
pub mod config;
pub mod datapoint;
pub mod error;
pub mod projector;
pub mod scrape;

// Re-export commonly used types at the crate root
pub use catalog::{
    Catalog, Label, LabelClass, MetricDefinition, ResourceType, ValueField, catalog_for,
};
pub use config::{LogFormat, LoggingConfig};
pub use datapoint::{Datapoint, parse_datapoints};
pub use error::{Error, FetchError, Result};
pub use projector::{Sample, project, project_definition};
pub use scrape::{MetricFetcher, ScrapeReport, collect, collect_samples};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
///
/// # Example
///
/// ```ignore
/// use cms_exporter_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
