//! Serialized access to the record table.
//!
//! Every public operation takes one coarse lock for its whole duration,
//! including parallel aggregation, so the worker pool always reads a table
//! that no insert or remove can touch.

use crate::analysis::{aggregate_by_group, Aggregation, AggregationMode};
use crate::models::{Record, RecordId};
use crate::table::{OpenAddressingMap, TableError};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Slots allocated for a fresh registry unless configured otherwise.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error(transparent)]
    Table(#[from] TableError),

    /// The id counter has passed the largest representable id.
    #[error("no unused record ids left")]
    IdsExhausted,
}

struct RegistryState {
    table: OpenAddressingMap<RecordId, Record>,
    /// Next key handed out by [`Registry::insert`]. Only ever moves forward;
    /// `None` once `RecordId::MAX` has been used.
    next_id: Option<RecordId>,
}

/// Occupancy figures for the underlying table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub live: usize,
    pub capacity: usize,
    pub tombstones: usize,
}

/// Live entries and table occupancy, read under one lock.
#[derive(Debug, Clone)]
pub struct Traversal {
    /// In no particular order.
    pub entries: Vec<(RecordId, Record)>,
    pub stats: TableStats,
}

/// The records registry for one session.
pub struct Registry {
    state: Mutex<RegistryState>,
    workers: usize,
}

impl Registry {
    /// Create an empty registry.
    ///
    /// `workers` is passed to parallel aggregation; zero means one per
    /// hardware thread.
    pub fn new(initial_capacity: usize, workers: usize) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                table: OpenAddressingMap::with_capacity(initial_capacity),
                next_id: Some(1),
            }),
            workers,
        }
    }

    /// Store `record` under a freshly assigned, previously unused key.
    pub fn insert(&self, record: Record) -> Result<RecordId, RegistryError> {
        let mut state = self.state.lock();

        let mut candidate = state.next_id;
        while let Some(id) = candidate.filter(|id| state.table.contains_key(id)) {
            candidate = id.checked_add(1);
        }
        let Some(id) = candidate else {
            state.next_id = None;
            return Err(RegistryError::IdsExhausted);
        };

        state.table.insert(id, record)?;
        state.next_id = id.checked_add(1);

        debug!(
            "Inserted record {} ({} live, {} slots)",
            id,
            state.table.len(),
            state.table.capacity()
        );
        Ok(id)
    }

    /// Store `record` under an explicit key.
    ///
    /// Returns `Ok(false)` if the key is already taken; the existing record is
    /// never overwritten.
    pub fn insert_with_id(&self, id: RecordId, record: Record) -> Result<bool, TableError> {
        let mut state = self.state.lock();

        let inserted = state.table.insert(id, record)?;
        if inserted {
            state.next_id = match (state.next_id, id.checked_add(1)) {
                (Some(next), Some(after)) => Some(next.max(after)),
                _ => None,
            };
            debug!("Inserted record {} ({} live)", id, state.table.len());
        } else {
            debug!("Rejected duplicate record id {}", id);
        }
        Ok(inserted)
    }

    /// Copy of the record stored under `id`.
    pub fn find(&self, id: RecordId) -> Option<Record> {
        self.state.lock().table.find(&id).cloned()
    }

    /// Run `f` against the record stored under `id` while the lock is held.
    pub fn inspect<R>(&self, id: RecordId, f: impl FnOnce(&Record) -> R) -> Option<R> {
        self.state.lock().table.find(&id).map(f)
    }

    pub fn remove(&self, id: RecordId) -> bool {
        let mut state = self.state.lock();
        let removed = state.table.remove(&id);
        debug!("Remove record {}: {}", id, if removed { "ok" } else { "not found" });
        removed
    }

    /// Move the record stored under `id` to another group.
    pub fn update_group(&self, id: RecordId, group: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        match state.table.find_mut(&id) {
            Some(record) => {
                record.set_group(group);
                true
            }
            None => false,
        }
    }

    /// Copy of all live entries along with the occupancy they were read at.
    pub fn traverse(&self) -> Traversal {
        let state = self.state.lock();
        Traversal {
            entries: state
                .table
                .iter()
                .map(|(id, record)| (*id, record.clone()))
                .collect(),
            stats: TableStats {
                live: state.table.len(),
                capacity: state.table.capacity(),
                tombstones: state.table.tombstones(),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().table.is_empty()
    }

    /// Per-group average scores.
    ///
    /// The lock stays held until every worker has finished.
    pub fn aggregate_by_group(&self, mode: AggregationMode) -> Aggregation {
        let state = self.state.lock();
        aggregate_by_group(&state.table, mode, self.workers)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_CAPACITY, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AGREEMENT_EPSILON;
    use crate::models::Profile;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn junior(name: &str, group: &str, grades: Vec<i32>) -> Record {
        Record::junior(Profile::new(name, group, 7).unwrap(), grades).unwrap()
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let registry = Registry::default();
        let a = registry.insert(junior("A", "G1", vec![5])).unwrap();
        let b = registry.insert(junior("B", "G1", vec![4])).unwrap();
        assert!(b > a);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_removed_ids_are_not_reused() {
        let registry = Registry::default();
        let a = registry.insert(junior("A", "G1", vec![5])).unwrap();
        assert!(registry.remove(a));
        let b = registry.insert(junior("B", "G1", vec![4])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_explicit_ids_advance_counter() {
        let registry = Registry::default();
        assert!(registry.insert_with_id(10, junior("A", "G1", vec![])).unwrap());
        let next = registry.insert(junior("B", "G1", vec![])).unwrap();
        assert_eq!(next, 11);
    }

    #[test]
    fn test_automatic_ids_exhausted_at_max() {
        let registry = Registry::default();
        assert!(registry.insert_with_id(RecordId::MAX - 1, junior("A", "G1", vec![])).unwrap());

        assert_eq!(
            registry.insert(junior("B", "G1", vec![])),
            Ok(RecordId::MAX)
        );
        assert_eq!(
            registry.insert(junior("C", "G1", vec![])),
            Err(RegistryError::IdsExhausted)
        );
        assert_eq!(registry.len(), 2);

        // Explicit ids below the counter still work.
        assert!(registry.insert_with_id(7, junior("D", "G1", vec![])).unwrap());
        assert_eq!(
            registry.insert(junior("E", "G1", vec![])),
            Err(RegistryError::IdsExhausted)
        );
    }

    #[test]
    fn test_explicit_max_id_does_not_overflow_counter() {
        let registry = Registry::default();
        assert!(registry.insert_with_id(RecordId::MAX, junior("A", "G1", vec![])).unwrap());
        assert_eq!(
            registry.insert(junior("B", "G1", vec![])),
            Err(RegistryError::IdsExhausted)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_explicit_id_rejected() {
        let registry = Registry::default();
        assert!(registry.insert_with_id(3, junior("First", "G1", vec![5])).unwrap());
        assert!(!registry.insert_with_id(3, junior("Second", "G2", vec![2])).unwrap());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.inspect(3, |r| r.profile().name.clone()).as_deref(), Some("First"));
    }

    #[test]
    fn test_find_remove_and_update_group() {
        let registry = Registry::default();
        let id = registry.insert(junior("A", "G1", vec![5])).unwrap();

        assert_eq!(registry.find(id).map(|r| r.group().to_string()).as_deref(), Some("G1"));
        assert!(registry.update_group(id, "G2"));
        assert_eq!(registry.inspect(id, |r| r.group().to_string()).as_deref(), Some("G2"));

        assert!(registry.remove(id));
        assert!(registry.find(id).is_none());
        assert!(!registry.remove(id));
        assert!(!registry.update_group(id, "G3"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_traverse_returns_live_entries() {
        let registry = Registry::new(4, 1);
        for i in 0..20 {
            registry.insert(junior(&format!("S{i}"), "G1", vec![])).unwrap();
        }
        registry.remove(5);

        let traversal = registry.traverse();
        let mut ids: Vec<RecordId> = traversal.entries.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        assert_eq!(ids.len(), 19);
        assert!(!ids.contains(&5));

        let stats = traversal.stats;
        assert_eq!(stats.live, traversal.entries.len());
        assert_eq!(stats.live, 19);
        assert_eq!(stats.tombstones, 1);
        assert!(stats.capacity >= 32);
        assert!(stats.live as f64 <= stats.capacity as f64 * 0.7);
    }

    #[test]
    fn test_aggregate_through_registry() {
        let registry = Registry::new(16, 2);
        registry.insert(junior("A", "G1", vec![5, 4, 5])).unwrap();
        registry.insert(junior("B", "G1", vec![3, 3])).unwrap();
        registry.insert(junior("C", "G1", vec![5, 5, 5])).unwrap();

        let sequential = registry.aggregate_by_group(AggregationMode::Sequential);
        let parallel = registry.aggregate_by_group(AggregationMode::Parallel);
        assert!((sequential.averages["G1"] - 4.375).abs() < AGREEMENT_EPSILON);
        assert!(sequential.agrees_with(&parallel, AGREEMENT_EPSILON));
    }

    #[test]
    fn test_concurrent_inserts_get_unique_ids() {
        let registry = Arc::new(Registry::new(4, 2));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut ids = Vec::new();
                    for i in 0..250 {
                        let group = format!("G{}", i % 5);
                        ids.push(registry.insert(junior("S", &group, vec![t + 2])).unwrap());
                        if i % 50 == 0 {
                            let par = registry.aggregate_by_group(AggregationMode::Parallel);
                            assert!(par.averages.values().all(|avg| (2.0..=5.0).contains(avg)));
                        }
                    }
                    ids
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(registry.len(), 1_000);
    }
}
