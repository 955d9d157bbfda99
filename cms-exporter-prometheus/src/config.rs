//! Configuration for the CloudMonitor exporter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use cms_exporter_common::{Label, LoggingConfig, ResourceType};

/// Environment variable holding the AccessKey ID.
pub const ACCESS_KEY_ID_ENV: &str = "ALIBABA_CLOUD_ACCESS_KEY_ID";
/// Environment variable holding the AccessKey secret.
pub const ACCESS_KEY_SECRET_ENV: &str = "ALIBABA_CLOUD_ACCESS_KEY_SECRET";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Missing credentials: set cms.{field} or {env}")]
    MissingCredentials {
        field: &'static str,
        env: &'static str,
    },
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Resource type whose catalog is exported.
    #[serde(default = "default_resource")]
    pub resource: ResourceType,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// CloudMonitor API settings.
    #[serde(default)]
    pub cms: CmsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_resource() -> ResourceType {
    ResourceType::Ecs
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:<resource port>").
    #[serde(default)]
    pub listen: Option<String>,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Metric name prefix (default: "aliyun").
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Constant labels added to all metrics.
    #[serde(default)]
    pub default_labels: BTreeMap<String, String>,

    /// Expose per-scrape exporter gauges (failed metrics, samples, duration).
    #[serde(default = "default_true")]
    pub scrape_stats: bool,
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_prefix() -> String {
    "aliyun".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: None,
            path: default_path(),
            prefix: default_prefix(),
            default_labels: BTreeMap::new(),
            scrape_stats: true,
        }
    }
}

/// CloudMonitor API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct CmsConfig {
    /// Region ID (default: "cn-hangzhou").
    #[serde(default = "default_region")]
    pub region: String,

    /// API endpoint URL (default: "https://metrics.<region>.aliyuncs.com").
    #[serde(default)]
    pub endpoint: Option<String>,

    /// AccessKey ID; falls back to `ALIBABA_CLOUD_ACCESS_KEY_ID`.
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// AccessKey secret; falls back to `ALIBABA_CLOUD_ACCESS_KEY_SECRET`.
    #[serde(default)]
    pub access_key_secret: Option<String>,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum `NextToken` pages followed per metric.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_region() -> String {
    "cn-hangzhou".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_max_pages() -> usize {
    10
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            access_key_secret: None,
            timeout_secs: default_timeout(),
            max_pages: default_max_pages(),
        }
    }
}

// The secret never reaches the logs.
impl std::fmt::Debug for CmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsConfig")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "access_key_secret",
                &self.access_key_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

impl CmsConfig {
    /// Effective API endpoint.
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://metrics.{}.aliyuncs.com", self.region),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve credentials from the config, falling back to the environment.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        self.credentials_with(|name| std::env::var(name).ok())
    }

    /// Resolve credentials using `lookup` for the environment fallback.
    pub fn credentials_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Credentials, ConfigError> {
        let resolve = |value: &Option<String>, field: &'static str, env: &'static str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(env).filter(|v| !v.is_empty()))
                .ok_or(ConfigError::MissingCredentials { field, env })
        };

        Ok(Credentials {
            access_key_id: resolve(&self.access_key_id, "access_key_id", ACCESS_KEY_ID_ENV)?,
            access_key_secret: resolve(
                &self.access_key_secret,
                "access_key_secret",
                ACCESS_KEY_SECRET_ENV,
            )?,
        })
    }
}

/// AccessKey pair used to sign API requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Listen address, defaulting to the resource type's port.
    pub fn listen(&self) -> String {
        self.prometheus
            .listen
            .clone()
            .unwrap_or_else(|| format!("0.0.0.0:{}", self.resource.default_port()))
    }

    /// Parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let listen = self.listen();
        listen
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Invalid listen address: {}", listen)))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        // Validate path starts with /
        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if !is_valid_name(&self.prometheus.prefix) {
            return Err(ConfigError::Validation(format!(
                "prefix '{}' must match [a-zA-Z_][a-zA-Z0-9_]*",
                self.prometheus.prefix
            )));
        }

        for key in self.prometheus.default_labels.keys() {
            if !is_valid_name(key) || key.starts_with("__") {
                return Err(ConfigError::Validation(format!(
                    "default label '{}' is not a valid label name",
                    key
                )));
            }
            if Label::ALL.iter().any(|label| label.name() == key) {
                return Err(ConfigError::Validation(format!(
                    "default label '{}' collides with a metric label",
                    key
                )));
            }
        }

        if self.cms.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if self.cms.max_pages == 0 {
            return Err(ConfigError::Validation(
                "max_pages must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Prometheus metric/label name rule: `[a-zA-Z_][a-zA-Z0-9_]*`.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            resource: default_resource(),
            prometheus: PrometheusConfig::default(),
            cms: CmsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
