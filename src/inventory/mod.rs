//! Cloud resource inventory.
//!
//! Descriptors are typed per resource kind. Every attribute other than the
//! identifier is optional so that rules can stay silent on partial data.

use std::fmt;

use anyhow::{Context, Result};
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

mod aws_cli;
mod dump;

pub use aws_cli::AwsCliInventory;
pub use dump::DumpInventory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Instances,
    Volumes,
    Snapshots,
    Addresses,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Instances,
        ResourceKind::Volumes,
        ResourceKind::Snapshots,
        ResourceKind::Addresses,
    ];

    /// Category label used for findings of this kind.
    pub const fn category(self) -> &'static str {
        match self {
            ResourceKind::Instances => "EC2",
            ResourceKind::Volumes => "EBS",
            ResourceKind::Snapshots => "Snapshot",
            ResourceKind::Addresses => "EIP",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ResourceKind::Instances => "EC2 instances",
            ResourceKind::Volumes => "EBS volumes",
            ResourceKind::Snapshots => "EBS snapshots",
            ResourceKind::Addresses => "Elastic IPs",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Instance {
    pub instance_id: String,
    pub instance_type: Option<String>,
    pub state: Option<String>,
    pub root_device_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Volume {
    pub volume_id: String,
    pub volume_type: Option<String>,
    pub size_gib: Option<u64>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub start_time: Option<OffsetDateTime>,
    pub volume_size_gib: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    pub public_ip: Option<String>,
    pub allocation_id: Option<String>,
    pub association_id: Option<String>,
}

/// Time range for a CPU utilization query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub period_secs: u32,
}

impl CpuWindow {
    /// Daily buckets covering `days` before `end`. `None` when the start
    /// falls outside the representable date range.
    pub fn trailing_days(end: OffsetDateTime, days: u32) -> Option<Self> {
        let start = end.checked_sub(time::Duration::days(i64::from(days)))?;
        Some(Self {
            start,
            end,
            period_secs: 86_400,
        })
    }
}

/// A read-only source of cloud resources for one scope (region).
pub trait Inventory {
    fn scope(&self) -> &str;
    fn instances(&self) -> Result<Vec<Instance>>;
    fn volumes(&self) -> Result<Vec<Volume>>;
    fn snapshots(&self) -> Result<Vec<Snapshot>>;
    fn addresses(&self) -> Result<Vec<Address>>;
    /// Mean of the per-period averages, `None` when there are no datapoints.
    fn average_cpu(&self, instance_id: &str, window: CpuWindow) -> Result<Option<f64>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInstances {
    #[serde(default)]
    reservations: Vec<RawReservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawReservation {
    #[serde(default)]
    instances: Vec<RawInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInstance {
    instance_id: String,
    instance_type: Option<String>,
    state: Option<RawInstanceState>,
    root_device_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInstanceState {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawVolumes {
    #[serde(default)]
    volumes: Vec<RawVolume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawVolume {
    volume_id: String,
    volume_type: Option<String>,
    size: Option<u64>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSnapshots {
    #[serde(default)]
    snapshots: Vec<RawSnapshot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSnapshot {
    snapshot_id: String,
    start_time: Option<String>,
    volume_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAddresses {
    #[serde(default)]
    addresses: Vec<RawAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAddress {
    public_ip: Option<String>,
    allocation_id: Option<String>,
    association_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawMetricStatistics {
    #[serde(default)]
    datapoints: Vec<RawDatapoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDatapoint {
    average: Option<f64>,
}

impl RawMetricStatistics {
    pub(crate) fn mean_average(&self) -> Option<f64> {
        let values: Vec<f64> = self.datapoints.iter().filter_map(|d| d.average).collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Parses `ec2 describe-instances` output, flattening reservations.
pub fn parse_instances(json: &str) -> Result<Vec<Instance>> {
    let raw: RawInstances =
        serde_json::from_str(json).context("malformed describe-instances response")?;
    Ok(raw
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .map(|i| Instance {
            instance_id: i.instance_id,
            instance_type: i.instance_type,
            state: i.state.and_then(|s| s.name),
            root_device_type: i.root_device_type,
        })
        .collect())
}

pub fn parse_volumes(json: &str) -> Result<Vec<Volume>> {
    let raw: RawVolumes =
        serde_json::from_str(json).context("malformed describe-volumes response")?;
    Ok(raw
        .volumes
        .into_iter()
        .map(|v| Volume {
            volume_id: v.volume_id,
            volume_type: v.volume_type,
            size_gib: v.size,
            state: v.state,
        })
        .collect())
}

pub fn parse_snapshots(json: &str) -> Result<Vec<Snapshot>> {
    let raw: RawSnapshots =
        serde_json::from_str(json).context("malformed describe-snapshots response")?;
    Ok(raw
        .snapshots
        .into_iter()
        .map(|s| {
            let start_time = s.start_time.as_deref().and_then(|t| {
                OffsetDateTime::parse(t, &Rfc3339)
                    .map_err(|err| {
                        log::debug!("snapshot {}: unparsable StartTime {t:?}: {err}", s.snapshot_id)
                    })
                    .ok()
            });
            Snapshot {
                snapshot_id: s.snapshot_id,
                start_time,
                volume_size_gib: s.volume_size,
            }
        })
        .collect())
}

pub fn parse_addresses(json: &str) -> Result<Vec<Address>> {
    let raw: RawAddresses =
        serde_json::from_str(json).context("malformed describe-addresses response")?;
    Ok(raw
        .addresses
        .into_iter()
        .map(|a| Address {
            public_ip: a.public_ip,
            allocation_id: a.allocation_id,
            association_id: a.association_id,
        })
        .collect())
}

pub fn parse_average_cpu(json: &str) -> Result<Option<f64>> {
    let raw: RawMetricStatistics =
        serde_json::from_str(json).context("malformed get-metric-statistics response")?;
    Ok(raw.mean_average())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn instances_are_flattened_across_reservations() {
        let json = r#"{
          "Reservations": [
            {"Instances": [
              {"InstanceId": "i-1", "InstanceType": "t2.micro", "State": {"Code": 80, "Name": "stopped"}, "RootDeviceType": "ebs"}
            ]},
            {"Instances": [
              {"InstanceId": "i-2", "InstanceType": "m5.large", "State": {"Name": "running"}},
              {"InstanceId": "i-3"}
            ]}
          ]
        }"#;
        let instances = parse_instances(json).expect("parse");
        let ids: Vec<&str> = instances.iter().map(|i| i.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["i-1", "i-2", "i-3"]);
        assert_eq!(instances[0].state.as_deref(), Some("stopped"));
        assert_eq!(instances[0].root_device_type.as_deref(), Some("ebs"));
        assert_eq!(instances[2].instance_type, None);
        assert_eq!(instances[2].state, None);
    }

    #[test]
    fn trailing_window_is_daily_and_bounded() {
        let end = datetime!(2026-06-08 00:00 UTC);
        let window = CpuWindow::trailing_days(end, 7).expect("window");
        assert_eq!(window.start, datetime!(2026-06-01 00:00 UTC));
        assert_eq!(window.period_secs, 86_400);

        assert_eq!(CpuWindow::trailing_days(end, 10_000_000), None);
    }

    #[test]
    fn snapshot_start_time_accepts_fractional_seconds() {
        let json = r#"{"Snapshots": [
            {"SnapshotId": "snap-1", "StartTime": "2024-01-02T03:04:05.000Z", "VolumeSize": 8},
            {"SnapshotId": "snap-2", "StartTime": "yesterday", "VolumeSize": 8}
        ]}"#;
        let snapshots = parse_snapshots(json).expect("parse");
        assert_eq!(snapshots[0].start_time, Some(datetime!(2024-01-02 03:04:05 UTC)));
        assert_eq!(snapshots[1].start_time, None);
    }

    #[test]
    fn addresses_keep_missing_association() {
        let json = r#"{"Addresses": [
            {"PublicIp": "203.0.113.10", "AllocationId": "eipalloc-1"},
            {"PublicIp": "203.0.113.11", "AssociationId": "eipassoc-1"}
        ]}"#;
        let addresses = parse_addresses(json).expect("parse");
        assert_eq!(addresses[0].association_id, None);
        assert_eq!(addresses[1].association_id.as_deref(), Some("eipassoc-1"));
    }

    #[test]
    fn average_cpu_is_mean_of_datapoints() {
        let json = r#"{"Label": "CPUUtilization", "Datapoints": [{"Average": 2.0}, {"Average": 4.0}]}"#;
        assert_eq!(parse_average_cpu(json).expect("parse"), Some(3.0));
        let empty = r#"{"Label": "CPUUtilization", "Datapoints": []}"#;
        assert_eq!(parse_average_cpu(empty).expect("parse"), None);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(parse_volumes("not json").is_err());
        assert!(parse_volumes(r#"{"Volumes": [{"Size": 3}]}"#).is_err());
    }
}
