use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::{CollectError, Result};
use crate::inventory::{
    enumerate, fetch_properties, Deadline, EntityKind, InventoryClient, InventoryScope,
    NamePattern,
};
use crate::metrics::{normalize, KindRecords, MetricRecord, RecordBatch};

/// Where a pass currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Unstarted,
    ScopeResolved,
    VolumesCollected,
    VmsCollected,
    Done,
    Failed,
}

/// Result of collecting one entity kind.
#[derive(Debug)]
pub struct KindOutcome {
    pub kind: EntityKind,
    pub result: Result<Vec<MetricRecord>>,
}

/// Everything a finished pass produced.
#[derive(Debug)]
pub struct Collection {
    pub scope: InventoryScope,
    pub outcomes: Vec<KindOutcome>,
}

impl Collection {
    /// Split into the batch of successful kinds and the kind-level failures.
    /// A failed kind contributes no records at all.
    pub fn into_batch(self, collected_at: DateTime<Utc>) -> (RecordBatch, Vec<CollectError>) {
        let mut kinds = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(records) => kinds.push(KindRecords {
                    kind: outcome.kind,
                    records,
                }),
                Err(e) => failures.push(e),
            }
        }
        let batch = RecordBatch {
            datacenter: self.scope.name,
            collected_at,
            kinds,
        };
        (batch, failures)
    }
}

/// Drives one collection pass against an inventory client.
pub struct Collector<'a, C: InventoryClient + ?Sized> {
    client: &'a C,
    datacenter: Option<&'a str>,
    pattern: &'a NamePattern,
    deadline: Deadline,
    state: CollectionState,
}

impl<'a, C: InventoryClient + ?Sized> Collector<'a, C> {
    pub fn new(
        client: &'a C,
        datacenter: Option<&'a str>,
        pattern: &'a NamePattern,
        deadline: Deadline,
    ) -> Self {
        Collector {
            client,
            datacenter,
            pattern,
            deadline,
            state: CollectionState::Unstarted,
        }
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    /// Run the pass: scope, then every kind in order.
    ///
    /// Only scope resolution aborts the pass. A kind that fails marks the pass
    /// failed but the remaining kinds are still collected.
    pub fn run(&mut self) -> Result<Collection> {
        let scope = match self.resolve_scope() {
            Ok(scope) => scope,
            Err(e) => {
                self.state = CollectionState::Failed;
                return Err(e);
            }
        };
        self.state = CollectionState::ScopeResolved;

        let mut outcomes = Vec::with_capacity(EntityKind::ALL.len());
        let mut failed = false;
        for kind in EntityKind::ALL {
            let result = self.collect_kind(&scope, kind);
            match &result {
                Ok(records) => {
                    info!(%kind, count = records.len(), "collected");
                    if !failed {
                        self.state = match kind {
                            EntityKind::StorageVolume => CollectionState::VolumesCollected,
                            EntityKind::VirtualMachine => CollectionState::VmsCollected,
                        };
                    }
                }
                Err(e) => {
                    error!(%kind, error = %e, "collection failed");
                    failed = true;
                    self.state = CollectionState::Failed;
                }
            }
            outcomes.push(KindOutcome { kind, result });
        }

        if !failed {
            self.state = CollectionState::Done;
        }
        Ok(Collection { scope, outcomes })
    }

    fn resolve_scope(&self) -> Result<InventoryScope> {
        self.deadline.check()?;
        self.client.resolve_default_scope(self.datacenter)
    }

    fn collect_kind(&self, scope: &InventoryScope, kind: EntityKind) -> Result<Vec<MetricRecord>> {
        self.deadline.check()?;
        let refs = enumerate(self.client, scope, kind, self.pattern)?;
        if refs.is_empty() {
            warn!(datacenter = %scope.name, %kind, "no objects found");
            return Ok(Vec::new());
        }

        self.deadline.check()?;
        let spec = kind.property_spec();
        let raw = fetch_properties(self.client, &refs, &spec)?;

        let mut records: Vec<MetricRecord> = raw.iter().map(|r| normalize(r, kind)).collect();
        records.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(records)
    }
}
