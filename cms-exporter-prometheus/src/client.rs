//! CloudMonitor `DescribeMetricLast` client.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, trace};

use cms_exporter_common::{FetchError, MetricFetcher};

use crate::config::{CmsConfig, Credentials};
use crate::signature::signed_query;

const API_VERSION: &str = "2019-01-01";
const ACTION: &str = "DescribeMetricLast";

/// Response envelope of `DescribeMetricLast`.
///
/// `Datapoints` is itself a JSON-encoded array inside a string.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DescribeMetricLastResponse {
    #[serde(rename = "Code")]
    code: Option<serde_json::Value>,
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "Success")]
    success: Option<bool>,
    #[serde(rename = "Datapoints")]
    datapoints: Option<String>,
    #[serde(rename = "NextToken")]
    next_token: Option<String>,
    #[serde(rename = "RequestId")]
    request_id: Option<String>,
}

impl DescribeMetricLastResponse {
    fn code(&self) -> String {
        match &self.code {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "Unknown".to_string(),
        }
    }
}

/// Signed HTTP client for the CloudMonitor API.
pub struct CmsClient {
    http: reqwest::Client,
    endpoint: String,
    region: String,
    credentials: Credentials,
    max_pages: usize,
}

impl CmsClient {
    /// Create a client from configuration and resolved credentials.
    pub fn new(config: &CmsConfig, credentials: Credentials) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("cms-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
            region: config.region.clone(),
            credentials,
            max_pages: config.max_pages,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request parameters for one page, before signing.
    fn params(
        &self,
        namespace: &str,
        metric: &str,
        next_token: Option<&str>,
    ) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        let mut set = |k: &str, v: &str| {
            params.insert(k.to_string(), v.to_string());
        };

        set("Action", ACTION);
        set("Version", API_VERSION);
        set("Format", "JSON");
        set("RegionId", &self.region);
        set("Namespace", namespace);
        set("MetricName", metric);
        set("AccessKeyId", &self.credentials.access_key_id);
        set("SignatureMethod", "HMAC-SHA1");
        set("SignatureVersion", "1.0");
        set("SignatureNonce", &uuid::Uuid::new_v4().to_string());
        set(
            "Timestamp",
            &chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        if let Some(token) = next_token {
            set("NextToken", token);
        }

        params
    }

    /// Fetch one page of datapoints.
    async fn fetch_page(
        &self,
        namespace: &str,
        metric: &str,
        next_token: Option<&str>,
    ) -> Result<DescribeMetricLastResponse, FetchError> {
        let params = self.params(namespace, metric, next_token);
        let query = signed_query(&self.credentials.access_key_secret, &params)
            .map_err(|e| FetchError::Transport(format!("Failed to sign request: {}", e)))?;
        let url = format!("{}/?{}", self.endpoint, query);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let mut envelope: DescribeMetricLastResponse = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(FetchError::api(
                    status.as_u16().to_string(),
                    String::from_utf8_lossy(&body).into_owned(),
                ));
            }
            Err(e) => return Err(FetchError::Payload(e.to_string())),
        };

        if !status.is_success() || envelope.success == Some(false) {
            return Err(FetchError::api(
                envelope.code(),
                envelope.message.clone().unwrap_or_default(),
            ));
        }

        // An empty token ends paging like a missing one
        envelope.next_token = envelope.next_token.filter(|token| !token.is_empty());

        trace!(
            metric,
            request_id = envelope.request_id.as_deref().unwrap_or(""),
            "DescribeMetricLast page received"
        );

        Ok(envelope)
    }
}

impl MetricFetcher for CmsClient {
    async fn fetch_last(&self, namespace: &str, metric: &str) -> Result<Vec<u8>, FetchError> {
        let first = self.fetch_page(namespace, metric, None).await?;

        if first.next_token.is_none() {
            return Ok(first.datapoints.unwrap_or_default().into_bytes());
        }

        // Several pages: merge the arrays so callers see a single payload
        let mut merged: Vec<serde_json::Value> = Vec::new();
        let mut page = first;
        let mut pages = 1;

        loop {
            if let Some(datapoints) = page.datapoints.as_deref()
                && !datapoints.trim().is_empty()
            {
                let values: Vec<serde_json::Value> = serde_json::from_str(datapoints)
                    .map_err(|e| FetchError::Payload(e.to_string()))?;
                merged.extend(values);
            }

            let Some(token) = page.next_token.take() else {
                break;
            };
            if pages >= self.max_pages {
                debug!(
                    metric,
                    pages, "Page limit reached, remaining datapoints dropped"
                );
                break;
            }

            page = self.fetch_page(namespace, metric, Some(&token)).await?;
            pages += 1;
        }

        serde_json::to_vec(&merged).map_err(|e| FetchError::Payload(e.to_string()))
    }
}
