//! Prometheus exposition of scrape samples.
//!
//! Descriptors are derived from the catalog once at startup. Each scrape
//! renders into its own [`Registry`], so concurrent scrapes share nothing
//! mutable.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tracing::debug;

use cms_exporter_common::{Catalog, Sample, ScrapeReport};

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

type SampleFamily = Family<Vec<(String, String)>, Gauge<f64, AtomicU64>>;

/// One exposed metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Catalog name (the registry adds prefix and subsystem).
    pub name: String,
    /// Fully-qualified exposed name: `{prefix}_{subsystem}_{name}`.
    pub fq_name: String,
    pub help: String,
    pub labels: Vec<&'static str>,
}

/// Per-scrape figures rendered next to the samples.
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    pub report: ScrapeReport,
    pub duration: Duration,
}

/// Translates catalog samples into the Prometheus text format.
#[derive(Debug)]
pub struct Exposition {
    prefix: String,
    subsystem: String,
    const_labels: Vec<(String, String)>,
    descriptors: Vec<Descriptor>,
    index: HashMap<String, usize>,
    scrape_stats: bool,
}

impl Exposition {
    /// Register one descriptor per exposed catalog definition.
    pub fn new(
        prefix: impl Into<String>,
        catalog: &Catalog,
        const_labels: &BTreeMap<String, String>,
    ) -> Self {
        let prefix = prefix.into();
        let subsystem = catalog.resource().as_str().to_string();

        let descriptors: Vec<Descriptor> = catalog
            .exposed()
            .map(|def| Descriptor {
                name: def.name.clone(),
                fq_name: format!("{}_{}_{}", prefix, subsystem, def.name),
                help: def.description.clone(),
                labels: def.label_schema(),
            })
            .collect();

        let index = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();

        Self {
            prefix,
            subsystem,
            const_labels: const_labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            descriptors,
            index,
            scrape_stats: true,
        }
    }

    /// Enable or disable the exporter's own per-scrape gauges.
    pub fn with_scrape_stats(mut self, enabled: bool) -> Self {
        self.scrape_stats = enabled;
        self
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, name: &str) -> Option<&Descriptor> {
        self.index.get(name).map(|&i| &self.descriptors[i])
    }

    /// Render one scrape.
    ///
    /// Only descriptors that received samples are written. A repeated label
    /// tuple within a metric keeps the last value.
    pub fn render(&self, samples: &[Sample], stats: &ScrapeStats) -> Result<String, std::fmt::Error> {
        let mut families: BTreeMap<usize, SampleFamily> = BTreeMap::new();

        for sample in samples {
            let Some(&slot) = self.index.get(&sample.metric) else {
                debug!(metric = %sample.metric, "Sample without descriptor dropped");
                continue;
            };
            let descriptor = &self.descriptors[slot];

            let labels: Vec<(String, String)> = descriptor
                .labels
                .iter()
                .zip(&sample.labels)
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();

            families
                .entry(slot)
                .or_default()
                .get_or_create(&labels)
                .set(sample.value);
        }

        let mut registry = Registry::with_prefix(self.prefix.as_str());
        let mut subsystem = registry.sub_registry_with_prefix(self.subsystem.as_str());
        for (key, value) in &self.const_labels {
            subsystem =
                subsystem.sub_registry_with_label((Cow::Owned(key.clone()), Cow::Owned(value.clone())));
        }

        for (slot, family) in families {
            let descriptor = &self.descriptors[slot];
            subsystem.register(descriptor.name.as_str(), descriptor.help.as_str(), family);
        }

        if self.scrape_stats {
            register_stats(subsystem, stats);
        }

        let mut output = String::new();
        encode(&mut output, &registry)?;
        Ok(output)
    }
}

fn register_stats(registry: &mut Registry, stats: &ScrapeStats) {
    let failed: Gauge = Gauge::default();
    failed.set(stats.report.metrics_failed as i64);
    registry.register(
        "exporter_failed_metrics",
        "Catalog metrics skipped in this scrape because the fetch or payload failed",
        failed,
    );

    let samples: Gauge = Gauge::default();
    samples.set(stats.report.samples as i64);
    registry.register(
        "exporter_samples",
        "Samples produced in this scrape",
        samples,
    );

    let duration = Gauge::<f64, AtomicU64>::default();
    duration.set(stats.duration.as_secs_f64());
    registry.register(
        "exporter_scrape_duration_seconds",
        "Time spent fetching all catalog metrics in this scrape",
        duration,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms_exporter_common::{ResourceType, catalog_for};

    fn exposition(resource: ResourceType) -> Exposition {
        Exposition::new("aliyun", &catalog_for(resource), &BTreeMap::new())
    }

    #[test]
    fn test_descriptors_cover_totals() {
        let exposition = exposition(ResourceType::Ecs);

        assert_eq!(exposition.descriptors().len(), 34);
        let total = exposition.descriptor("networkout_packages_total").unwrap();
        assert_eq!(total.fq_name, "aliyun_ecs_networkout_packages_total");
        assert_eq!(total.labels, ["id", "device", "interface"]);
    }

    #[test]
    fn test_render_instance_sample() {
        let exposition = exposition(ResourceType::Ecs);
        let samples = [Sample::new("cpu_total", 42.5, ["i-001"])];

        let output = exposition.render(&samples, &ScrapeStats::default()).unwrap();

        assert!(output.contains("# TYPE aliyun_ecs_cpu_total gauge"));
        assert!(output.contains("aliyun_ecs_cpu_total{id=\"i-001\"} 42.5"));
        assert!(output.ends_with("# EOF\n"));
    }

    #[test]
    fn test_render_labels_in_schema_order() {
        let exposition = exposition(ResourceType::Slb);
        let samples = [Sample::new("Qps", 12.0, ["lb-1", "https", "443", "1.2.3.4"])];

        let output = exposition.render(&samples, &ScrapeStats::default()).unwrap();

        assert!(output.contains(
            "aliyun_slb_Qps{id=\"lb-1\",protocol=\"https\",port=\"443\",vip=\"1.2.3.4\"} 12.0"
        ));
    }

    #[test]
    fn test_metrics_without_samples_are_omitted() {
        let exposition = exposition(ResourceType::Redis).with_scrape_stats(false);

        let output = exposition.render(&[], &ScrapeStats::default()).unwrap();

        assert!(!output.contains("aliyun_redis_CpuUsage"));
        assert_eq!(output, "# EOF\n");
    }

    #[test]
    fn test_unknown_sample_dropped() {
        let exposition = exposition(ResourceType::Redis).with_scrape_stats(false);
        let samples = [Sample::new("cpu_total", 1.0, ["i-1"])];

        let output = exposition.render(&samples, &ScrapeStats::default()).unwrap();

        assert!(!output.contains("cpu_total"));
    }

    #[test]
    fn test_scrape_stats_rendered() {
        let exposition = exposition(ResourceType::Redis);
        let stats = ScrapeStats {
            report: ScrapeReport {
                metrics_total: 11,
                metrics_failed: 2,
                failed: vec!["CpuUsage".into(), "UsedQPS".into()],
                samples: 9,
            },
            duration: Duration::from_millis(250),
        };

        let output = exposition.render(&[], &stats).unwrap();

        assert!(output.contains("aliyun_redis_exporter_failed_metrics 2"));
        assert!(output.contains("aliyun_redis_exporter_samples 9"));
        assert!(output.contains("aliyun_redis_exporter_scrape_duration_seconds 0.25"));
    }

    #[test]
    fn test_const_labels() {
        let mut labels = BTreeMap::new();
        labels.insert("region".to_string(), "cn-hangzhou".to_string());
        let exposition = Exposition::new("aliyun", &catalog_for(ResourceType::Redis), &labels)
            .with_scrape_stats(false);
        let samples = [Sample::new("UsedMemory", 1024.0, ["r-1"])];

        let output = exposition.render(&samples, &ScrapeStats::default()).unwrap();

        assert!(output.contains("region=\"cn-hangzhou\""));
        assert!(output.contains("id=\"r-1\""));
    }

    #[test]
    fn test_render_is_repeatable() {
        let exposition = exposition(ResourceType::Ecs);
        let samples = [
            Sample::new("cpu_total", 1.0, ["i-1"]),
            Sample::new("cpu_total", 2.0, ["i-2"]),
        ];

        let first = exposition.render(&samples, &ScrapeStats::default()).unwrap();
        let second = exposition.render(&samples, &ScrapeStats::default()).unwrap();

        assert_eq!(first, second);
    }
}
