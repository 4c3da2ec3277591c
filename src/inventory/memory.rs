// In-memory inventory used by the pipeline tests
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::error::{CollectError, Result, VimError};
use crate::inventory::{
    EntityKind, InventoryClient, InventoryScope, NamePattern, ObjectReference, PropertySpec,
    StructuredRecord,
};
use crate::inventory::vim::select_datacenter;

struct StoredObject {
    name: String,
    record: StructuredRecord,
}

#[derive(Default)]
pub struct MemoryInventory {
    datacenters: Vec<InventoryScope>,
    objects: Vec<StoredObject>,
    extra: Vec<StructuredRecord>,
    duplicate: bool,
    failing_retrieval: Vec<EntityKind>,
    failing_listing: Vec<EntityKind>,
    list_calls: Cell<usize>,
    retrieve_calls: RefCell<HashMap<EntityKind, usize>>,
}

fn fault(message: &str) -> VimError {
    VimError::Fault {
        type_name: "HostCommunication".to_string(),
        message: message.to_string(),
    }
}

impl MemoryInventory {
    pub fn empty() -> Self {
        MemoryInventory::default()
    }

    pub fn with_datacenter(name: &str) -> Self {
        MemoryInventory::empty().datacenter(name)
    }

    pub fn datacenter(mut self, name: &str) -> Self {
        let n = self.datacenters.len() + 1;
        self.datacenters.push(InventoryScope {
            name: name.to_string(),
            datacenter: format!("datacenter-{}", n),
            datastore_folder: format!("group-s{}", n),
            vm_folder: format!("group-v{}", n),
        });
        self
    }

    pub fn datastore(self, name: &str, capacity: i64, free_space: i64) -> Self {
        self.datastore_summary(
            name,
            json!({
                "_typeName": "DatastoreSummary",
                "name": name,
                "type": "VMFS",
                "url": format!("ds:///vmfs/volumes/{}/", name),
                "capacity": capacity,
                "freeSpace": free_space,
            }),
        )
    }

    pub fn datastore_summary(mut self, name: &str, summary: Value) -> Self {
        let reference = ObjectReference::new(
            EntityKind::StorageVolume,
            format!("datastore-{}", self.objects.len() + 1),
        );
        self.objects.push(StoredObject {
            name: name.to_string(),
            record: StructuredRecord::new(reference).with_property("summary", summary),
        });
        self
    }

    pub fn virtual_machine(self, name: &str) -> Self {
        let config = json!({
            "guestFullName": "Ubuntu Linux (64-bit)",
            "guestId": "ubuntu64Guest",
            "hardware": {"memoryMB": 4096, "numCPU": 2, "numCoresPerSocket": 1}
        });
        self.virtual_machine_with(name, Some(config), sample_vm_summary(name))
    }

    pub fn virtual_machine_with(mut self, name: &str, config: Option<Value>, summary: Value) -> Self {
        let reference = ObjectReference::new(
            EntityKind::VirtualMachine,
            format!("vm-{}", self.objects.len() + 1),
        );
        let mut record = StructuredRecord::new(reference)
            .with_property("name", json!(name))
            .with_property("summary", summary);
        if let Some(config) = config {
            record = record.with_property("config", config);
        }
        self.objects.push(StoredObject {
            name: name.to_string(),
            record,
        });
        self
    }

    pub fn extra_record(mut self, record: StructuredRecord) -> Self {
        self.extra.push(record);
        self
    }

    pub fn duplicate_records(mut self) -> Self {
        self.duplicate = true;
        self
    }

    pub fn fail_retrieval(mut self, kind: EntityKind) -> Self {
        self.failing_retrieval.push(kind);
        self
    }

    pub fn fail_listing(mut self, kind: EntityKind) -> Self {
        self.failing_listing.push(kind);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.get()
    }

    pub fn retrieve_calls(&self, kind: EntityKind) -> usize {
        self.retrieve_calls.borrow().get(&kind).copied().unwrap_or(0)
    }
}

pub fn sample_vm_summary(name: &str) -> Value {
    json!({
        "runtime": {"connectionState": "connected", "maxCpuUsage": 4600, "maxMemoryUsage": 4096},
        "overallStatus": "green",
        "config": {"vmPathName": format!("[ds1] {0}/{0}.vmx", name)},
        "guest": {"ipAddress": "10.0.0.5", "hostName": name, "toolsRunningStatus": "guestToolsRunning"},
        "quickStats": {
            "hostMemoryUsage": 2100,
            "guestMemoryUsage": 819,
            "overallCpuUsage": 230,
            "overallCpuDemand": 250,
            "swappedMemory": 0,
            "uptimeSeconds": 86400
        },
        "storage": {"committed": 21474836480i64, "uncommitted": 1073741824}
    })
}

impl InventoryClient for MemoryInventory {
    fn resolve_default_scope(&self, designated: Option<&str>) -> Result<InventoryScope> {
        Ok(select_datacenter(self.datacenters.clone(), designated)?)
    }

    fn list_objects(
        &self,
        _scope: &InventoryScope,
        kind: EntityKind,
        pattern: &NamePattern,
    ) -> Result<Vec<ObjectReference>> {
        self.list_calls.set(self.list_calls.get() + 1);
        if self.failing_listing.contains(&kind) {
            return Err(CollectError::Enumeration {
                kind,
                source: fault("listing failed"),
            });
        }
        Ok(self
            .objects
            .iter()
            .filter(|o| o.record.reference.kind == kind && pattern.matches(&o.name))
            .map(|o| o.record.reference.clone())
            .collect())
    }

    fn retrieve_properties(
        &self,
        refs: &[ObjectReference],
        spec: &PropertySpec,
    ) -> Result<Vec<StructuredRecord>> {
        *self.retrieve_calls.borrow_mut().entry(spec.kind).or_insert(0) += 1;
        if self.failing_retrieval.contains(&spec.kind) {
            return Err(CollectError::Retrieval {
                kind: spec.kind,
                source: fault("connection reset by peer"),
            });
        }

        // Reverse order so callers cannot rely on positions.
        let mut records: Vec<StructuredRecord> = self
            .objects
            .iter()
            .rev()
            .filter(|o| refs.contains(&o.record.reference))
            .map(|o| o.record.clone())
            .collect();
        if self.duplicate {
            records.extend(records.clone());
        }
        records.extend(self.extra.iter().cloned());
        Ok(records)
    }
}
