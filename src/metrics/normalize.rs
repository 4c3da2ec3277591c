//! Field extraction from raw inventory properties into metric records.
//!
//! The source shapes below mirror the vSphere data objects with every field
//! optional. A field that is missing, `null`, or of the wrong shape ends up
//! as `None` in the record without affecting the fields next to it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::inventory::{EntityKind, StructuredRecord};
use crate::metrics::{
    MetricRecord, StorageVolumeMeasurements, StorageVolumeRecord, StorageVolumeTags,
    VirtualMachineMeasurements, VirtualMachineRecord, VirtualMachineTags,
};

/// Decode a single field on its own: a value of the wrong shape becomes
/// `None` and leaves its siblings untouched.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DatastoreSummary {
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient")]
    datastore_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    capacity: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    free_space: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VmConfigInfo {
    #[serde(deserialize_with = "lenient")]
    guest_full_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    guest_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    hardware: Option<VmHardware>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VmHardware {
    #[serde(rename = "memoryMB", deserialize_with = "lenient")]
    memory_mb: Option<i64>,
    #[serde(rename = "numCPU", deserialize_with = "lenient")]
    num_cpu: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    num_cores_per_socket: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VmSummary {
    #[serde(deserialize_with = "lenient")]
    runtime: Option<VmRuntime>,
    #[serde(deserialize_with = "lenient")]
    overall_status: Option<String>,
    #[serde(deserialize_with = "lenient")]
    config: Option<VmSummaryConfig>,
    #[serde(deserialize_with = "lenient")]
    guest: Option<VmGuestSummary>,
    #[serde(deserialize_with = "lenient")]
    quick_stats: Option<VmQuickStats>,
    #[serde(deserialize_with = "lenient")]
    storage: Option<VmStorageSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VmRuntime {
    #[serde(deserialize_with = "lenient")]
    connection_state: Option<String>,
    #[serde(deserialize_with = "lenient")]
    max_cpu_usage: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    max_memory_usage: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VmSummaryConfig {
    #[serde(deserialize_with = "lenient")]
    vm_path_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VmGuestSummary {
    #[serde(deserialize_with = "lenient")]
    ip_address: Option<String>,
    #[serde(deserialize_with = "lenient")]
    host_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    tools_running_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VmQuickStats {
    #[serde(deserialize_with = "lenient")]
    host_memory_usage: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    guest_memory_usage: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    overall_cpu_usage: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    overall_cpu_demand: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    swapped_memory: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    uptime_seconds: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VmStorageSummary {
    #[serde(deserialize_with = "lenient")]
    committed: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    uncommitted: Option<i64>,
}

/// Decode one top-level property; anything unusable is absent.
fn property<T: DeserializeOwned + Default>(record: &StructuredRecord, path: &str) -> T {
    record
        .lookup(path)
        .and_then(|value| T::deserialize(value).ok())
        .unwrap_or_default()
}

/// Map a raw record into the fixed tag/measurement layout for `kind`.
///
/// Pure and total: missing fields never fail, they become `None`.
pub fn normalize(record: &StructuredRecord, kind: EntityKind) -> MetricRecord {
    match kind {
        EntityKind::StorageVolume => MetricRecord::StorageVolume(normalize_datastore(record)),
        EntityKind::VirtualMachine => MetricRecord::VirtualMachine(normalize_vm(record)),
    }
}

fn normalize_datastore(record: &StructuredRecord) -> StorageVolumeRecord {
    let summary: DatastoreSummary = property(record, "summary");

    StorageVolumeRecord {
        tags: StorageVolumeTags {
            name: summary
                .name
                .unwrap_or_else(|| record.reference.value.clone()),
            volume_type: summary.datastore_type,
            url: summary.url,
        },
        measurements: StorageVolumeMeasurements {
            capacity: summary.capacity,
            freespace: summary.free_space,
        },
    }
}

fn normalize_vm(record: &StructuredRecord) -> VirtualMachineRecord {
    let name: Option<String> = property(record, "name");
    // Orphaned or inaccessible VMs come back without `config`.
    let config: VmConfigInfo = property(record, "config");
    let summary: VmSummary = property(record, "summary");

    let hardware = config.hardware.unwrap_or_default();
    let runtime = summary.runtime.unwrap_or_default();
    let guest = summary.guest.unwrap_or_default();
    let stats = summary.quick_stats.unwrap_or_default();
    let storage = summary.storage.unwrap_or_default();

    VirtualMachineRecord {
        tags: VirtualMachineTags {
            name: name.unwrap_or_else(|| record.reference.value.clone()),
            guest_full_name: config.guest_full_name,
            connection_state: runtime.connection_state,
            overall_status: summary.overall_status,
            vm_path_name: summary.config.and_then(|c| c.vm_path_name),
            ip_address: guest.ip_address,
            hostname: guest.host_name,
            guest_id: config.guest_id,
            is_guest_tools_running: guest.tools_running_status,
        },
        measurements: VirtualMachineMeasurements {
            mem_mb: hardware.memory_mb,
            num_cpu: hardware.num_cpu,
            num_cores_per_socket: hardware.num_cores_per_socket,
            host_mem_usage: stats.host_memory_usage,
            guest_mem_usage: stats.guest_memory_usage,
            overall_cpu_usage: stats.overall_cpu_usage,
            overall_cpu_demand: stats.overall_cpu_demand,
            swap_mem: stats.swapped_memory,
            uptime_sec: stats.uptime_seconds,
            storage_committed: storage.committed,
            storage_uncommitted: storage.uncommitted,
            max_cpu_usage: runtime.max_cpu_usage,
            max_mem_usage: runtime.max_memory_usage,
        },
    }
}
