//! Projection of datapoints into labeled samples.

use serde::Serialize;
use tracing::trace;

use crate::catalog::{Catalog, MetricDefinition};
use crate::datapoint::Datapoint;

/// One labeled value ready for exposition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Exported metric name (catalog name, without prefix).
    pub metric: String,
    pub value: f64,
    /// Label values, aligned with the metric's label schema.
    pub labels: Vec<String>,
}

impl Sample {
    pub fn new<L, S>(metric: impl Into<String>, value: f64, labels: L) -> Self
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metric: metric.into(),
            value,
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    fn from_definition(definition: &MetricDefinition, point: &Datapoint) -> Self {
        Self {
            metric: definition.name.clone(),
            value: definition.value.select(point),
            labels: definition.class.values(point),
        }
    }
}

/// Project one datapoint of `metric` into samples.
///
/// Emits the metric's own sample, followed by its derived total if it has
/// one. Names that are not in the catalog produce nothing.
pub fn project(catalog: &Catalog, metric: &str, point: &Datapoint) -> Vec<Sample> {
    let Some(definition) = catalog.get(metric) else {
        trace!(metric, "No catalog entry, datapoint ignored");
        return Vec::new();
    };

    project_definition(definition, point)
}

/// Project one datapoint using an already resolved definition.
pub fn project_definition(definition: &MetricDefinition, point: &Datapoint) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(1 + usize::from(definition.derived_total.is_some()));
    samples.push(Sample::from_definition(definition, point));

    if let Some(total) = definition.derived_total.as_deref() {
        samples.push(Sample::from_definition(total, point));
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ResourceType, catalog_for};
    use crate::datapoint::parse_datapoints;

    fn first_point(payload: &str) -> Datapoint {
        parse_datapoints(payload.as_bytes())
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn test_instance_only_metric() {
        let catalog = catalog_for(ResourceType::Ecs);
        let point = first_point(r#"[{"instanceId":"i-001","Average":42.5}]"#);

        let samples = project(&catalog, "cpu_total", &point);

        assert_eq!(samples, vec![Sample::new("cpu_total", 42.5, ["i-001"])]);
    }

    #[test]
    fn test_rate_metric_emits_total() {
        let catalog = catalog_for(ResourceType::Ecs);
        let point = first_point(
            r#"[{"instanceId":"i-001","device":"eth0","IP":"10.0.0.1","Average":100,"Sum":6000}]"#,
        );

        let samples = project(&catalog, "networkin_packages", &point);

        assert_eq!(
            samples,
            vec![
                Sample::new("networkin_packages", 100.0, ["i-001", "eth0", "10.0.0.1"]),
                Sample::new(
                    "networkin_packages_total",
                    6000.0,
                    ["i-001", "eth0", "10.0.0.1"]
                ),
            ]
        );
    }

    #[test]
    fn test_rate_metric_without_total() {
        let catalog = catalog_for(ResourceType::Ecs);
        let point = first_point(
            r#"[{"instanceId":"i-001","device":"eth0","IP":"10.0.0.1","Average":3.5,"Sum":210}]"#,
        );

        let samples = project(&catalog, "networkout_rate", &point);

        assert_eq!(
            samples,
            vec![Sample::new(
                "networkout_rate",
                3.5,
                ["i-001", "eth0", "10.0.0.1"]
            )]
        );
    }

    #[test]
    fn test_state_metric() {
        let catalog = catalog_for(ResourceType::Ecs);
        let point = first_point(r#"[{"instanceId":"i-9","state":"ESTABLISHED","Average":12}]"#);

        let samples = project(&catalog, "net_tcpconnection", &point);

        assert_eq!(
            samples,
            vec![Sample::new("net_tcpconnection", 12.0, ["i-9", "ESTABLISHED"])]
        );
    }

    #[test]
    fn test_disk_metric() {
        let catalog = catalog_for(ResourceType::Ecs);
        let point = first_point(
            r#"[{"instanceId":"i-9","device":"/dev/vda1","diskname":"vda1","hostname":"web","Average":71.2}]"#,
        );

        let samples = project(&catalog, "diskusage_utilization", &point);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].labels, ["i-9", "/dev/vda1", "vda1", "web"]);
        assert_eq!(samples[0].value, 71.2);
    }

    #[test]
    fn test_listener_metric() {
        let catalog = catalog_for(ResourceType::Slb);
        let point = first_point(
            r#"[{"instanceId":"lb-1","protocol":"tcp","port":"443","vip":"47.1.1.1","Average":8}]"#,
        );

        let samples = project(&catalog, "ActiveConnection", &point);

        assert_eq!(
            samples,
            vec![Sample::new(
                "ActiveConnection",
                8.0,
                ["lb-1", "tcp", "443", "47.1.1.1"]
            )]
        );
    }

    #[test]
    fn test_missing_dimensions_are_empty_labels() {
        let catalog = catalog_for(ResourceType::Ecs);
        let point = first_point(r#"[{"instanceId":"i-1","Average":1}]"#);

        let samples = project(&catalog, "disk_readbytes", &point);

        assert_eq!(samples[0].labels, ["i-1", ""]);
    }

    #[test]
    fn test_unknown_metric_emits_nothing() {
        let catalog = catalog_for(ResourceType::Redis);
        let point = Datapoint::for_instance("r-1");

        assert!(project(&catalog, "cpu_total", &point).is_empty());
        // Totals are only reachable through their primary
        let ecs = catalog_for(ResourceType::Ecs);
        assert!(project(&ecs, "networkin_packages_total", &point).is_empty());
    }

    #[test]
    fn test_label_count_matches_schema_for_every_definition() {
        let point = Datapoint::for_instance("x");

        for resource in ResourceType::ALL {
            let catalog = catalog_for(resource);
            for def in catalog.definitions() {
                for sample in project(&catalog, &def.name, &point) {
                    let schema = catalog
                        .exposed()
                        .find(|d| d.name == sample.metric)
                        .map(|d| d.label_schema())
                        .unwrap();
                    assert_eq!(
                        sample.labels.len(),
                        schema.len(),
                        "{} in {}",
                        sample.metric,
                        resource
                    );
                }
            }
        }
    }
}
