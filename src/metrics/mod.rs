// Normalized metric records and the collection pass that produces them
pub mod collector;
pub mod normalize;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::inventory::EntityKind;

pub use collector::Collector;
pub use normalize::normalize;

/// Native unit of a measurement. Values are never converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Bytes,
    Megabytes,
    Megahertz,
    Seconds,
    Count,
}

/// One named measurement; `None` means the source did not report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub name: &'static str,
    pub value: Option<i64>,
    pub unit: Unit,
}

/// One named tag; `None` means the source did not report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    pub name: &'static str,
    pub value: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageVolumeTags {
    pub name: String,
    #[serde(rename = "type")]
    pub volume_type: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageVolumeMeasurements {
    pub capacity: Option<i64>,
    pub freespace: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageVolumeRecord {
    pub tags: StorageVolumeTags,
    pub measurements: StorageVolumeMeasurements,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualMachineTags {
    pub name: String,
    pub guest_full_name: Option<String>,
    pub connection_state: Option<String>,
    pub overall_status: Option<String>,
    pub vm_path_name: Option<String>,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
    pub guest_id: Option<String>,
    pub is_guest_tools_running: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualMachineMeasurements {
    pub mem_mb: Option<i64>,
    pub num_cpu: Option<i64>,
    pub num_cores_per_socket: Option<i64>,
    pub host_mem_usage: Option<i64>,
    pub guest_mem_usage: Option<i64>,
    pub overall_cpu_usage: Option<i64>,
    pub overall_cpu_demand: Option<i64>,
    pub swap_mem: Option<i64>,
    pub uptime_sec: Option<i64>,
    pub storage_committed: Option<i64>,
    pub storage_uncommitted: Option<i64>,
    pub max_cpu_usage: Option<i64>,
    pub max_mem_usage: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualMachineRecord {
    pub tags: VirtualMachineTags,
    pub measurements: VirtualMachineMeasurements,
}

/// Normalized output of one inventory object for one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricRecord {
    StorageVolume(StorageVolumeRecord),
    VirtualMachine(VirtualMachineRecord),
}

impl MetricRecord {
    pub fn name(&self) -> &str {
        match self {
            MetricRecord::StorageVolume(r) => &r.tags.name,
            MetricRecord::VirtualMachine(r) => &r.tags.name,
        }
    }

    /// Tags in table order.
    pub fn tags(&self) -> Vec<Tag<'_>> {
        fn tag<'a>(name: &'static str, value: &'a Option<String>) -> Tag<'a> {
            Tag {
                name,
                value: value.as_deref(),
            }
        }

        match self {
            MetricRecord::StorageVolume(r) => vec![
                Tag { name: "name", value: Some(&r.tags.name) },
                tag("type", &r.tags.volume_type),
                tag("url", &r.tags.url),
            ],
            MetricRecord::VirtualMachine(r) => {
                let t = &r.tags;
                vec![
                    Tag { name: "name", value: Some(&t.name) },
                    tag("guest_full_name", &t.guest_full_name),
                    tag("connection_state", &t.connection_state),
                    tag("overall_status", &t.overall_status),
                    tag("vm_path_name", &t.vm_path_name),
                    tag("ip_address", &t.ip_address),
                    tag("hostname", &t.hostname),
                    tag("guest_id", &t.guest_id),
                    tag("is_guest_tools_running", &t.is_guest_tools_running),
                ]
            }
        }
    }

    /// Measurements in table order, with their native units.
    pub fn measurements(&self) -> Vec<Measurement> {
        fn m(name: &'static str, value: Option<i64>, unit: Unit) -> Measurement {
            Measurement { name, value, unit }
        }

        match self {
            MetricRecord::StorageVolume(r) => vec![
                m("capacity", r.measurements.capacity, Unit::Bytes),
                m("freespace", r.measurements.freespace, Unit::Bytes),
            ],
            MetricRecord::VirtualMachine(r) => {
                let v = &r.measurements;
                vec![
                    m("mem_mb", v.mem_mb, Unit::Megabytes),
                    m("num_cpu", v.num_cpu, Unit::Count),
                    m("num_cores_per_socket", v.num_cores_per_socket, Unit::Count),
                    m("host_mem_usage", v.host_mem_usage, Unit::Megabytes),
                    m("guest_mem_usage", v.guest_mem_usage, Unit::Megabytes),
                    m("overall_cpu_usage", v.overall_cpu_usage, Unit::Megahertz),
                    m("overall_cpu_demand", v.overall_cpu_demand, Unit::Megahertz),
                    m("swap_mem", v.swap_mem, Unit::Megabytes),
                    m("uptime_sec", v.uptime_sec, Unit::Seconds),
                    m("storage_committed", v.storage_committed, Unit::Bytes),
                    m("storage_uncommitted", v.storage_uncommitted, Unit::Bytes),
                    m("max_cpu_usage", v.max_cpu_usage, Unit::Megahertz),
                    m("max_mem_usage", v.max_mem_usage, Unit::Megabytes),
                ]
            }
        }
    }
}

/// Records of one kind that completed collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindRecords {
    pub kind: EntityKind,
    pub records: Vec<MetricRecord>,
}

/// What a sink receives once per pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordBatch {
    pub datacenter: String,
    pub collected_at: DateTime<Utc>,
    pub kinds: Vec<KindRecords>,
}

impl RecordBatch {
    pub fn record_count(&self) -> usize {
        self.kinds.iter().map(|k| k.records.len()).sum()
    }
}
