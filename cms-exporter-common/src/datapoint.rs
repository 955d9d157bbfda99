//! Datapoint records returned by the CloudMonitor `DescribeMetricLast` API.
//!
//! The JSON envelope is the same for every metric, but each metric only
//! populates the dimensions that apply to it. Missing fields (and `null`s)
//! decode to the zero value of their type.

use serde::{Deserialize, Deserializer, Serialize};

/// One measurement record for a metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Datapoint {
    /// Unix epoch milliseconds of the measurement.
    #[serde(deserialize_with = "lenient_i64")]
    pub timestamp: i64,

    #[serde(rename = "userId", deserialize_with = "lenient_string")]
    pub user_id: String,

    #[serde(rename = "instanceId", deserialize_with = "lenient_string")]
    pub instance_id: String,

    #[serde(deserialize_with = "lenient_string")]
    pub device: String,

    #[serde(deserialize_with = "lenient_string")]
    pub hostname: String,

    #[serde(rename = "IP", deserialize_with = "lenient_string")]
    pub ip: String,

    #[serde(deserialize_with = "lenient_string")]
    pub diskname: String,

    #[serde(deserialize_with = "lenient_string")]
    pub state: String,

    #[serde(deserialize_with = "lenient_string")]
    pub port: String,

    #[serde(deserialize_with = "lenient_string")]
    pub protocol: String,

    #[serde(deserialize_with = "lenient_string")]
    pub vip: String,

    #[serde(rename = "Sum", deserialize_with = "lenient_f64")]
    pub sum: f64,

    #[serde(rename = "Maximum", deserialize_with = "lenient_f64")]
    pub maximum: f64,

    #[serde(rename = "Minimum", deserialize_with = "lenient_f64")]
    pub minimum: f64,

    #[serde(rename = "Average", deserialize_with = "lenient_f64")]
    pub average: f64,
}

impl Datapoint {
    /// Create a datapoint for the given instance with every other field zeroed.
    pub fn for_instance(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Default::default()
        }
    }
}

/// Parse a `Datapoints` payload into records, preserving response order.
///
/// An empty or whitespace-only payload means the resource reported nothing
/// for this period and yields no records.
pub fn parse_datapoints(payload: &[u8]) -> serde_json::Result<Vec<Datapoint>> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(payload)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(s)) => s,
        Some(Scalar::Int(i)) => i.to_string(),
        Some(Scalar::Float(f)) => f.to_string(),
        Some(Scalar::Bool(b)) => b.to_string(),
        None => String::new(),
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(i)) => Ok(i as f64),
        Some(Scalar::Float(f)) => Ok(f),
        Some(Scalar::Text(s)) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid number: {s:?}"))),
        Some(Scalar::Bool(_)) => Err(serde::de::Error::custom("expected a number, found bool")),
        None => Ok(0.0),
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(i)) => Ok(i),
        Some(Scalar::Float(f)) => Ok(f as i64),
        Some(Scalar::Text(s)) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid integer: {s:?}"))),
        Some(Scalar::Bool(_)) => Err(serde::de::Error::custom("expected an integer, found bool")),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ecs_network_datapoint() {
        let payload = br#"[{"timestamp":1546840800000,"userId":"1234","instanceId":"i-001",
            "device":"eth0","IP":"10.0.0.1","Average":100,"Sum":6000,"Maximum":150,"Minimum":50}]"#;

        let points = parse_datapoints(payload).unwrap();

        assert_eq!(points.len(), 1);
        let point = &points[0];
        assert_eq!(point.timestamp, 1546840800000);
        assert_eq!(point.instance_id, "i-001");
        assert_eq!(point.device, "eth0");
        assert_eq!(point.ip, "10.0.0.1");
        assert_eq!(point.average, 100.0);
        assert_eq!(point.sum, 6000.0);
        assert_eq!(point.maximum, 150.0);
        assert_eq!(point.minimum, 50.0);
        assert!(point.hostname.is_empty());
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let points = parse_datapoints(br#"[{"instanceId":"r-01"}]"#).unwrap();

        assert_eq!(points[0], Datapoint::for_instance("r-01"));
    }

    #[test]
    fn test_null_fields_default_to_zero() {
        let points =
            parse_datapoints(br#"[{"instanceId":"r-01","Average":null,"state":null}]"#).unwrap();

        assert_eq!(points[0].average, 0.0);
        assert!(points[0].state.is_empty());
    }

    #[test]
    fn test_numeric_port_becomes_text() {
        let payload = br#"[{"instanceId":"lb-1","port":80,"protocol":"tcp","vip":"1.2.3.4","Average":"2.5"}]"#;

        let points = parse_datapoints(payload).unwrap();

        assert_eq!(points[0].port, "80");
        assert_eq!(points[0].average, 2.5);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let points =
            parse_datapoints(br#"[{"instanceId":"i-1","mountpoint":"/","Average":1}]"#).unwrap();

        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_order_preserved() {
        let points = parse_datapoints(
            br#"[{"instanceId":"i-3"},{"instanceId":"i-1"},{"instanceId":"i-2"}]"#,
        )
        .unwrap();

        let ids: Vec<_> = points.iter().map(|p| p.instance_id.as_str()).collect();
        assert_eq!(ids, ["i-3", "i-1", "i-2"]);
    }

    #[test]
    fn test_empty_payloads() {
        assert!(parse_datapoints(b"[]").unwrap().is_empty());
        assert!(parse_datapoints(b"").unwrap().is_empty());
        assert!(parse_datapoints(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(parse_datapoints(b"[{\"instanceId\":").is_err());
        assert!(parse_datapoints(b"{\"instanceId\":\"i-1\"}").is_err());
        assert!(parse_datapoints(br#"[{"Average":"fast"}]"#).is_err());
    }
}
