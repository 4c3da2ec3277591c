use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::Result;
use crate::inventory::{InventoryClient, ObjectReference, PropertySpec, StructuredRecord};

/// Fetch `spec.paths` for all `refs` in a single batched call.
///
/// Results are correlated by the identity carried in each record, not by
/// position. Anything the server returns that was not asked for is dropped.
pub fn fetch_properties<C: InventoryClient + ?Sized>(
    client: &C,
    refs: &[ObjectReference],
    spec: &PropertySpec,
) -> Result<Vec<StructuredRecord>> {
    if refs.is_empty() {
        return Ok(Vec::new());
    }

    let requested: HashSet<&ObjectReference> = refs.iter().collect();
    let records = client.retrieve_properties(refs, spec)?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut correlated = Vec::with_capacity(records.len());
    for record in records {
        if !requested.contains(&record.reference) {
            warn!(object = %record.reference, "dropping record for an object that was not requested");
            continue;
        }
        if !seen.insert(record.reference.clone()) {
            warn!(object = %record.reference, "dropping duplicate record");
            continue;
        }
        correlated.push(record);
    }

    if correlated.len() < refs.len() {
        // Objects deleted between listing and retrieval simply vanish.
        for missing in refs.iter().filter(|r| !seen.contains(*r)) {
            debug!(object = %missing, "no properties returned");
        }
    }

    debug!(kind = %spec.kind, requested = refs.len(), returned = correlated.len(), "fetched properties");
    Ok(correlated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::memory::MemoryInventory;
    use crate::inventory::{EntityKind, NamePattern};
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_empty_refs_issue_no_call() {
        let inventory = MemoryInventory::with_datacenter("dc1");
        let spec = EntityKind::VirtualMachine.property_spec();

        let records = fetch_properties(&inventory, &[], &spec).unwrap();

        assert!(records.is_empty());
        assert_eq!(inventory.retrieve_calls(EntityKind::VirtualMachine), 0);
    }

    #[test]
    fn test_foreign_and_duplicate_records_are_dropped() {
        let inventory = MemoryInventory::with_datacenter("dc1")
            .datastore("ds1", 1000, 400)
            .datastore("ds2", 2000, 100)
            .extra_record(
                StructuredRecord::new(ObjectReference::new(EntityKind::StorageVolume, "datastore-999"))
                    .with_property("summary", json!({"name": "ghost"})),
            )
            .duplicate_records();
        let scope = inventory.resolve_default_scope(None).unwrap();
        let refs = inventory
            .list_objects(&scope, EntityKind::StorageVolume, &NamePattern::match_all())
            .unwrap();

        let records = fetch_properties(&inventory, &refs, &EntityKind::StorageVolume.property_spec()).unwrap();

        assert_eq!(records.len(), 2);
        let ids: HashSet<_> = records.iter().map(|r| r.reference.value.as_str()).collect();
        assert!(!ids.contains("datastore-999"));
    }

    #[test]
    fn test_retrieval_failure_surfaces_as_error() {
        let inventory = MemoryInventory::with_datacenter("dc1")
            .virtual_machine("vm1")
            .fail_retrieval(EntityKind::VirtualMachine);
        let scope = inventory.resolve_default_scope(None).unwrap();
        let refs = inventory
            .list_objects(&scope, EntityKind::VirtualMachine, &NamePattern::match_all())
            .unwrap();

        let err = fetch_properties(&inventory, &refs, &EntityKind::VirtualMachine.property_spec()).unwrap_err();
        assert_eq!(err.kind(), Some(EntityKind::VirtualMachine));
    }

    proptest! {
        #[test]
        fn prop_one_batched_call_per_kind(count in 1usize..64) {
            let mut inventory = MemoryInventory::with_datacenter("dc1");
            for i in 0..count {
                inventory = inventory.virtual_machine(&format!("vm{}", i));
            }
            let scope = inventory.resolve_default_scope(None).unwrap();
            let refs = inventory
                .list_objects(&scope, EntityKind::VirtualMachine, &NamePattern::match_all())
                .unwrap();

            let records = fetch_properties(&inventory, &refs, &EntityKind::VirtualMachine.property_spec()).unwrap();

            prop_assert_eq!(records.len(), count);
            prop_assert_eq!(inventory.retrieve_calls(EntityKind::VirtualMachine), 1);
        }
    }
}
