//! Prometheus exporter for Alibaba Cloud CloudMonitor.
//!
//! Every scrape of the metrics endpoint fetches the latest datapoints of each
//! catalog metric for one resource type (ECS, Redis or SLB) through the
//! CloudMonitor `DescribeMetricLast` API and renders them as gauges.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  CloudMonitor   │<────│  Scrape + Label │<────│   HTTP Server   │
//! │  (CmsClient)    │────>│   projection    │────>│   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! cms-exporter-prometheus --resource redis --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod client;
pub mod config;
pub mod exposition;
pub mod http;
pub mod signature;

pub use client::CmsClient;
pub use config::{ConfigError, Credentials, ExporterConfig};
pub use exposition::{Exposition, ScrapeStats};
pub use http::HttpServer;
