// Inventory access: object references, scope, and the client seam
pub mod enumerate;
pub mod fetch;
pub mod vim;

#[cfg(test)]
pub mod memory;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{CollectError, Result};

pub use enumerate::{enumerate, NamePattern};
pub use fetch::fetch_properties;

/// The two kinds of inventory object a pass collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    StorageVolume,
    VirtualMachine,
}

impl EntityKind {
    /// Collection order of a pass.
    pub const ALL: [EntityKind; 2] = [EntityKind::StorageVolume, EntityKind::VirtualMachine];

    /// Managed object type name on the server side.
    pub fn type_name(self) -> &'static str {
        match self {
            EntityKind::StorageVolume => "Datastore",
            EntityKind::VirtualMachine => "VirtualMachine",
        }
    }

    pub fn from_type_name(type_name: &str) -> Option<EntityKind> {
        match type_name {
            "Datastore" => Some(EntityKind::StorageVolume),
            "VirtualMachine" => Some(EntityKind::VirtualMachine),
            _ => None,
        }
    }

    pub fn property_spec(self) -> PropertySpec {
        match self {
            EntityKind::StorageVolume => PropertySpec {
                kind: self,
                paths: &["summary"],
            },
            EntityKind::VirtualMachine => PropertySpec {
                kind: self,
                paths: &["name", "config", "summary"],
            },
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::StorageVolume => write!(f, "datastore"),
            EntityKind::VirtualMachine => write!(f, "virtual machine"),
        }
    }
}

/// Handle to one inventory object, issued by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectReference {
    pub kind: EntityKind,
    pub value: String,
}

impl ObjectReference {
    pub fn new(kind: EntityKind, value: impl Into<String>) -> Self {
        ObjectReference {
            kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.type_name(), self.value)
    }
}

/// The resolved datacenter every call of a pass is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryScope {
    pub name: String,
    pub datacenter: String,
    pub datastore_folder: String,
    pub vm_folder: String,
}

impl InventoryScope {
    /// Folder under which objects of `kind` live.
    pub fn root_for(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::StorageVolume => &self.datastore_folder,
            EntityKind::VirtualMachine => &self.vm_folder,
        }
    }
}

/// Fixed property paths requested for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySpec {
    pub kind: EntityKind,
    pub paths: &'static [&'static str],
}

/// Raw properties of one object as returned by a batched fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRecord {
    pub reference: ObjectReference,
    pub properties: BTreeMap<String, Value>,
}

impl StructuredRecord {
    pub fn new(reference: ObjectReference) -> Self {
        StructuredRecord {
            reference,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, path: &str, value: Value) -> Self {
        self.properties.insert(path.to_string(), value);
        self
    }

    /// Walks a dotted path (`summary.quickStats.uptimeSeconds`) through the
    /// top-level properties. `null` counts as missing.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.properties.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }
}

/// One budget for the whole run, shared by the driver and every request the
/// client sends.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn start(timeout: Duration) -> Self {
        Deadline {
            started: Instant::now(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time left, or `None` once the budget is spent.
    pub fn remaining(&self) -> Option<Duration> {
        self.timeout
            .checked_sub(self.started.elapsed())
            .filter(|left| !left.is_zero())
    }

    pub fn check(&self) -> Result<()> {
        match self.remaining() {
            Some(_) => Ok(()),
            None => Err(CollectError::DeadlineExceeded {
                timeout: self.timeout,
            }),
        }
    }
}

/// What the pipeline needs from a management endpoint session.
///
/// Session setup is the implementor's constructor; the pipeline only sees an
/// already authenticated client.
pub trait InventoryClient {
    /// Resolve the single datacenter for this pass. With `designated` set the
    /// datacenter of that name is chosen; otherwise exactly one must exist.
    fn resolve_default_scope(&self, designated: Option<&str>) -> Result<InventoryScope>;

    /// All objects of `kind` below the scope whose names match `pattern`.
    fn list_objects(
        &self,
        scope: &InventoryScope,
        kind: EntityKind,
        pattern: &NamePattern,
    ) -> Result<Vec<ObjectReference>>;

    /// One batched retrieval of `spec.paths` for every reference.
    fn retrieve_properties(
        &self,
        refs: &[ObjectReference],
        spec: &PropertySpec,
    ) -> Result<Vec<StructuredRecord>>;
}
