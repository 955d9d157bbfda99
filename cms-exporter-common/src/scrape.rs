//! Scrape orchestration: fetch, parse and project every catalog entry.

use std::future::Future;

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::datapoint::parse_datapoints;
use crate::error::FetchError;
use crate::projector::{Sample, project_definition};

/// Source of the latest datapoints for a metric.
///
/// Implementations return the raw JSON datapoint array. Authentication,
/// region and timeouts are the implementation's concern.
pub trait MetricFetcher: Send + Sync {
    fn fetch_last(
        &self,
        namespace: &str,
        metric: &str,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Outcome of one scrape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeReport {
    /// Catalog entries attempted.
    pub metrics_total: usize,
    /// Entries skipped because the fetch or the payload failed.
    pub metrics_failed: usize,
    /// Names of the skipped entries, in scrape order.
    pub failed: Vec<String>,
    /// Samples emitted.
    pub samples: usize,
}

impl ScrapeReport {
    fn record_failure(&mut self, metric: &str) {
        self.metrics_failed += 1;
        self.failed.push(metric.to_string());
    }
}

/// Run one scrape over `catalog`, passing every sample to `emit`.
///
/// Entries are processed one at a time. A failed fetch or malformed payload
/// skips that entry only; nothing is emitted for it and the scrape carries on.
pub async fn collect<F, E>(catalog: &Catalog, fetcher: &F, mut emit: E) -> ScrapeReport
where
    F: MetricFetcher,
    E: FnMut(Sample),
{
    let mut report = ScrapeReport::default();

    for definition in catalog.definitions() {
        report.metrics_total += 1;

        let payload = match fetcher
            .fetch_last(catalog.namespace(), &definition.remote_name)
            .await
        {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    namespace = %catalog.namespace(),
                    metric = %definition.remote_name,
                    error = %e,
                    "Metric fetch failed"
                );
                report.record_failure(&definition.name);
                continue;
            }
        };

        let points = match parse_datapoints(&payload) {
            Ok(points) => points,
            Err(e) => {
                warn!(
                    namespace = %catalog.namespace(),
                    metric = %definition.remote_name,
                    error = %e,
                    "Malformed datapoints payload"
                );
                report.record_failure(&definition.name);
                continue;
            }
        };

        for point in &points {
            for sample in project_definition(definition, point) {
                report.samples += 1;
                emit(sample);
            }
        }
    }

    debug!(
        resource = %catalog.resource(),
        metrics = report.metrics_total,
        failed = report.metrics_failed,
        samples = report.samples,
        "Scrape complete"
    );

    report
}

/// Run one scrape and gather the samples.
pub async fn collect_samples<F: MetricFetcher>(
    catalog: &Catalog,
    fetcher: &F,
) -> (Vec<Sample>, ScrapeReport) {
    let mut samples = Vec::new();
    let report = collect(catalog, fetcher, |sample| samples.push(sample)).await;
    (samples, report)
}
