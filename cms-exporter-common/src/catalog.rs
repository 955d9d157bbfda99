//! Metric catalogs for the monitored resource types.
//!
//! Every exported metric is described by a [`MetricDefinition`]. Definitions
//! with the same label layout share a [`LabelClass`], which is the only place
//! that decides which datapoint fields become which labels.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::datapoint::Datapoint;
use crate::error::Error;

/// Monitored resource type. Each one has its own catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ResourceType {
    /// Elastic Compute Service instances.
    Ecs,
    /// ApsaraDB for Redis (KVStore) instances.
    Redis,
    /// Server Load Balancer instances.
    Slb,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [ResourceType::Ecs, ResourceType::Redis, ResourceType::Slb];

    /// Short name, used as the metric subsystem (`aliyun_<subsystem>_<metric>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Ecs => "ecs",
            ResourceType::Redis => "redis",
            ResourceType::Slb => "slb",
        }
    }

    /// CloudMonitor namespace the metrics are requested from.
    pub fn namespace(&self) -> &'static str {
        match self {
            ResourceType::Ecs => "acs_ecs_dashboard",
            ResourceType::Redis => "acs_kvstore",
            ResourceType::Slb => "acs_slb_dashboard",
        }
    }

    /// Default HTTP port of the exporter for this resource type.
    pub fn default_port(&self) -> u16 {
        match self {
            ResourceType::Ecs => 8023,
            ResourceType::Redis => 8025,
            ResourceType::Slb => 8026,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecs" | "compute" => Ok(ResourceType::Ecs),
            "redis" | "kvstore" | "cache" => Ok(ResourceType::Redis),
            "slb" | "lb" | "loadbalancer" => Ok(ResourceType::Slb),
            _ => Err(Error::UnknownResource(s.to_string())),
        }
    }
}

impl TryFrom<String> for ResourceType {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A datapoint field that can be exposed as a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    InstanceId,
    State,
    Device,
    Diskname,
    Hostname,
    Ip,
    Protocol,
    Port,
    Vip,
}

impl Label {
    pub const ALL: [Label; 9] = [
        Label::InstanceId,
        Label::State,
        Label::Device,
        Label::Diskname,
        Label::Hostname,
        Label::Ip,
        Label::Protocol,
        Label::Port,
        Label::Vip,
    ];

    /// Exposed label name.
    pub fn name(&self) -> &'static str {
        match self {
            Label::InstanceId => "id",
            Label::State => "state",
            Label::Device => "device",
            Label::Diskname => "diskname",
            Label::Hostname => "hostname",
            Label::Ip => "interface",
            Label::Protocol => "protocol",
            Label::Port => "port",
            Label::Vip => "vip",
        }
    }

    /// Read this label's value from a datapoint.
    pub fn value<'a>(&self, point: &'a Datapoint) -> &'a str {
        match self {
            Label::InstanceId => &point.instance_id,
            Label::State => &point.state,
            Label::Device => &point.device,
            Label::Diskname => &point.diskname,
            Label::Hostname => &point.hostname,
            Label::Ip => &point.ip,
            Label::Protocol => &point.protocol,
            Label::Port => &point.port,
            Label::Vip => &point.vip,
        }
    }
}

/// Group of metrics that share one ordered label layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelClass {
    /// `[id]`
    Instance,
    /// `[id, state]`
    InstanceState,
    /// `[id, device]`
    InstanceDevice,
    /// `[id, device, diskname, hostname]`
    InstanceDisk,
    /// `[id, device, interface]`, the rate metrics.
    InstanceInterface,
    /// `[id, protocol, port, vip]`, load balancer listeners.
    Listener,
}

impl LabelClass {
    /// The datapoint fields of this class, in exposition order.
    pub fn labels(&self) -> &'static [Label] {
        match self {
            LabelClass::Instance => &[Label::InstanceId],
            LabelClass::InstanceState => &[Label::InstanceId, Label::State],
            LabelClass::InstanceDevice => &[Label::InstanceId, Label::Device],
            LabelClass::InstanceDisk => &[
                Label::InstanceId,
                Label::Device,
                Label::Diskname,
                Label::Hostname,
            ],
            LabelClass::InstanceInterface => &[Label::InstanceId, Label::Device, Label::Ip],
            LabelClass::Listener => &[
                Label::InstanceId,
                Label::Protocol,
                Label::Port,
                Label::Vip,
            ],
        }
    }

    /// Exposed label names, in order.
    pub fn schema(&self) -> Vec<&'static str> {
        self.labels().iter().map(Label::name).collect()
    }

    /// Label values for a datapoint, aligned with [`schema`](Self::schema).
    pub fn values(&self, point: &Datapoint) -> Vec<String> {
        self.labels()
            .iter()
            .map(|label| label.value(point).to_string())
            .collect()
    }
}

/// Statistic of a datapoint reported as the sample value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueField {
    Average,
    Sum,
    Maximum,
    Minimum,
}

impl ValueField {
    pub fn select(&self, point: &Datapoint) -> f64 {
        match self {
            ValueField::Average => point.average,
            ValueField::Sum => point.sum,
            ValueField::Maximum => point.maximum,
            ValueField::Minimum => point.minimum,
        }
    }
}

/// Definition of one exported metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    /// Exported name, unique within a catalog.
    pub name: String,
    /// Help text.
    pub description: String,
    /// Label layout.
    pub class: LabelClass,
    /// Statistic used as the value.
    pub value: ValueField,
    /// Name requested from the remote API.
    pub remote_name: String,
    /// Companion metric projected from the same datapoint.
    pub derived_total: Option<Box<MetricDefinition>>,
}

impl MetricDefinition {
    /// Create a definition reporting the average, with the help text and
    /// remote name both equal to `name`.
    pub fn new(name: impl Into<String>, class: LabelClass) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            remote_name: name.clone(),
            name,
            class,
            value: ValueField::Average,
            derived_total: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_remote_name(mut self, remote_name: impl Into<String>) -> Self {
        self.remote_name = remote_name.into();
        self
    }

    /// Also emit `<name>_total` carrying the datapoint's `Sum`.
    pub fn with_total(mut self) -> Self {
        let total_name = format!("{}_total", self.name);
        let total = MetricDefinition {
            description: total_name.clone(),
            remote_name: self.remote_name.clone(),
            name: total_name,
            class: self.class,
            value: ValueField::Sum,
            derived_total: None,
        };
        self.derived_total = Some(Box::new(total));
        self
    }

    /// Exposed label names.
    pub fn label_schema(&self) -> Vec<&'static str> {
        self.class.schema()
    }
}

/// The fixed set of metric definitions for one resource type.
#[derive(Debug, Clone)]
pub struct Catalog {
    resource: ResourceType,
    namespace: String,
    metrics: BTreeMap<String, MetricDefinition>,
}

impl Catalog {
    /// Build a catalog from definitions. A later definition with the same
    /// name replaces an earlier one.
    pub fn new(
        resource: ResourceType,
        namespace: impl Into<String>,
        definitions: impl IntoIterator<Item = MetricDefinition>,
    ) -> Self {
        let metrics = definitions
            .into_iter()
            .map(|def| (def.name.clone(), def))
            .collect();

        Self {
            resource,
            namespace: namespace.into(),
            metrics,
        }
    }

    pub fn resource(&self) -> ResourceType {
        self.resource
    }

    /// Remote namespace shared by every entry.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Look up a fetched (primary) definition by name.
    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.get(name)
    }

    /// Fetched definitions, in name order.
    pub fn definitions(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics.values()
    }

    /// Every exposed definition: each primary followed by its derived total.
    pub fn exposed(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics
            .values()
            .flat_map(|def| std::iter::once(def).chain(def.derived_total.as_deref()))
    }

    /// Number of fetched definitions.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Build the catalog for a resource type.
pub fn catalog_for(resource: ResourceType) -> Catalog {
    let definitions = match resource {
        ResourceType::Ecs => ecs_metrics(),
        ResourceType::Redis => redis_metrics(),
        ResourceType::Slb => slb_metrics(),
    };
    Catalog::new(resource, resource.namespace(), definitions)
}

fn with_class(names: &[&str], class: LabelClass) -> impl Iterator<Item = MetricDefinition> {
    names
        .iter()
        .map(move |name| MetricDefinition::new(*name, class))
}

fn ecs_metrics() -> Vec<MetricDefinition> {
    let mut metrics: Vec<_> = with_class(
        &[
            "cpu_total",
            "cpu_idle",
            "cpu_other",
            "cpu_system",
            "cpu_user",
            "cpu_wait",
            "load_15m",
            "load_1m",
            "load_5m",
            "memory_freespace",
            "memory_freeutilization",
            "memory_totalspace",
            "memory_usedspace",
            "memory_usedutilization",
            "process_number",
        ],
        LabelClass::Instance,
    )
    .collect();

    metrics.extend(with_class(&["net_tcpconnection"], LabelClass::InstanceState));
    metrics.extend(with_class(
        &[
            "disk_readbytes",
            "disk_readiops",
            "disk_writebytes",
            "disk_writeiops",
            "networkin_errorpackages",
            "networkout_errorpackages",
        ],
        LabelClass::InstanceDevice,
    ));
    metrics.extend(with_class(
        &[
            "diskusage_free",
            "diskusage_avail",
            "diskusage_total",
            "diskusage_used",
            "diskusage_utilization",
            "fs_inodeutilization",
        ],
        LabelClass::InstanceDisk,
    ));
    metrics.extend(with_class(
        &["networkin_rate", "networkout_rate"],
        LabelClass::InstanceInterface,
    ));
    metrics.extend(
        with_class(
            &["networkin_packages", "networkout_packages"],
            LabelClass::InstanceInterface,
        )
        .map(MetricDefinition::with_total),
    );

    metrics
}

fn redis_metrics() -> Vec<MetricDefinition> {
    with_class(
        &[
            "ConnectionUsage",
            "CpuUsage",
            "FailedCount",
            "IntranetIn",
            "IntranetInRatio",
            "IntranetOut",
            "IntranetOutRatio",
            "MemoryUsage",
            "UsedConnection",
            "UsedMemory",
            "UsedQPS",
        ],
        LabelClass::Instance,
    )
    .collect()
}

fn slb_metrics() -> Vec<MetricDefinition> {
    // Names are the CloudMonitor ones, typos included.
    with_class(
        &[
            "ActiveConnection",
            "DropConnection",
            "DropPackerRX",
            "DropPackerTX",
            "DropTrafficRX",
            "DropTrafficTX",
            "GroupTotalTrafficRX",
            "GroupTotalTrafficTX",
            "HeathyServerCount",
            "InactiveConnection",
            "InstanceActiveConnection",
            "InstanceDropConnection",
            "InstanceDropPacketRX",
            "InstanceDropPacketTX",
            "InstanceDropTrafficRX",
            "InstanceDropTrafficTX",
            "InstanceInactiveConnection",
            "InstanceMaxConnection",
            "InstanceMaxConnectionUtilization",
            "InstanceNewConnection",
            "InstanceNewConnectionUtilization",
            "InstancePacketRX",
            "InstancePacketTX",
            "InstanceQps",
            "InstanceQpsUtilization",
            "InstanceRt",
            "InstanceStatusCode2xx",
            "InstanceStatusCode3xx",
            "InstanceStatusCode4xx",
            "InstanceStatusCode5xx",
            "InstanceStatusCodeOther",
            "InstanceTrafficRX",
            "InstanceTrafficTX",
            "InstanceUpstreamCode4xx",
            "InstanceUpstreamCode5xx",
            "InstanceUpstreamRt",
            "MaxConnection",
            "NewConnection",
            "PacketRX",
            "PacketTX",
            "Qps",
            "Rt",
            "StatusCode2xx",
            "StatusCode3xx",
            "StatusCode4xx",
            "StatusCode5xx",
            "StatusCodeOther",
            "TrafficRXNew",
            "TrafficTXNew",
            "UnhealthyServerCount",
            "UpstreamCode4xx",
            "UpstreamCode5xx",
            "UpstreamRt",
        ],
        LabelClass::Listener,
    )
    .collect()
}
