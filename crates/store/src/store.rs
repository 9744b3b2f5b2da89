//! The central identity index: primary mapping table, secondary name and
//! label indices, reference sets and the garbage-collection sweep.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use mirra_core::{
    LabelMapping, MappingsStore, NameMapping, NamespacedName, Object, StoreError, StoreResult,
};

use crate::backend::{Backend, MappingRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    VirtualToHost,
    HostToVirtual,
}

impl Direction {
    fn idx(self) -> usize {
        match self {
            Direction::VirtualToHost => 0,
            Direction::HostToVirtual => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Namespaced,
    Cluster,
}

impl Scope {
    fn idx(self) -> usize {
        match self {
            Scope::Namespaced => 0,
            Scope::Cluster => 1,
        }
    }
}

struct IndexEntry<V> {
    target: V,
    owners: FxHashSet<NameMapping>,
}

/// One secondary index. Every entry tracks the records that own it, so an
/// entry disappears only with its last owner and records sharing a value
/// never tear each other's rows.
struct IndexTable<K, V> {
    entries: FxHashMap<K, IndexEntry<V>>,
}

impl<K, V> Default for IndexTable<K, V> {
    fn default() -> Self {
        Self { entries: FxHashMap::default() }
    }
}

impl<K: Eq + Hash, V: Clone + PartialEq> IndexTable<K, V> {
    fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.get(key).map(|entry| &entry.target)
    }

    fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Returns false when `key` already points at a different target; the
    /// existing entry is kept and `owner` is not registered.
    fn insert(&mut self, key: K, target: V, owner: NameMapping) -> bool {
        match self.entries.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                if entry.get().target != target {
                    return false;
                }
                entry.get_mut().owners.insert(owner);
                true
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                let mut owners = FxHashSet::default();
                owners.insert(owner);
                entry.insert(IndexEntry { target, owners });
                true
            }
        }
    }

    fn remove_owner<Q>(&mut self, key: &Q, owner: &NameMapping)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.owners.remove(owner);
            if entry.owners.is_empty() {
                self.entries.remove(key);
            }
        }
    }
}

/// Everything behind the store's lock.
#[derive(Default)]
struct State {
    mappings: FxHashMap<NameMapping, MappingRecord>,
    names: [IndexTable<Object, NamespacedName>; 2],
    labels: [IndexTable<String, String>; 4],
}

impl State {
    fn name_index(&self, direction: Direction) -> &IndexTable<Object, NamespacedName> {
        &self.names[direction.idx()]
    }

    fn name_index_mut(&mut self, direction: Direction) -> &mut IndexTable<Object, NamespacedName> {
        &mut self.names[direction.idx()]
    }

    fn label_index(&self, direction: Direction, scope: Scope) -> &IndexTable<String, String> {
        &self.labels[direction.idx() * 2 + scope.idx()]
    }

    fn label_index_mut(&mut self, direction: Direction, scope: Scope) -> &mut IndexTable<String, String> {
        &mut self.labels[direction.idx() * 2 + scope.idx()]
    }

    /// Existing mapping the candidate would conflict with, if any: either
    /// side already mapped to a different counterpart.
    fn conflicting(&self, mapping: &NameMapping) -> Option<NameMapping> {
        if let Some(host) = self.name_index(Direction::VirtualToHost).get(&mapping.virtual_object()) {
            if host != &mapping.host_name {
                return Some(NameMapping {
                    gvk: mapping.gvk.clone(),
                    virtual_name: mapping.virtual_name.clone(),
                    host_name: host.clone(),
                });
            }
        }
        if let Some(virtual_name) = self.name_index(Direction::HostToVirtual).get(&mapping.host_object()) {
            if virtual_name != &mapping.virtual_name {
                return Some(NameMapping {
                    gvk: mapping.gvk.clone(),
                    virtual_name: virtual_name.clone(),
                    host_name: mapping.host_name.clone(),
                });
            }
        }
        None
    }

    /// Insert or replace a record and walk every index it belongs in.
    fn insert_record(&mut self, record: MappingRecord) {
        let owner = record.mapping.clone();
        if owner.is_complete() {
            self.name_index_mut(Direction::VirtualToHost).insert(
                owner.virtual_object(),
                owner.host_name.clone(),
                owner.clone(),
            );
            self.name_index_mut(Direction::HostToVirtual).insert(
                owner.host_object(),
                owner.virtual_name.clone(),
                owner.clone(),
            );
        }
        for (scope, labels) in [(Scope::Namespaced, &record.labels), (Scope::Cluster, &record.labels_cluster)] {
            for label in labels {
                let indexed = self.label_index_mut(Direction::VirtualToHost, scope).insert(
                    label.virtual_value.clone(),
                    label.host_value.clone(),
                    owner.clone(),
                ) && self.label_index_mut(Direction::HostToVirtual, scope).insert(
                    label.host_value.clone(),
                    label.virtual_value.clone(),
                    owner.clone(),
                );
                if !indexed {
                    warn!(label = %label, mapping = %owner, "store: label value already mapped to a different target, keeping existing");
                }
            }
        }
        self.mappings.insert(owner, record);
    }

    /// Remove a record and its ownership of every index row.
    fn remove_record(&mut self, mapping: &NameMapping) -> Option<MappingRecord> {
        let record = self.mappings.remove(mapping)?;
        if mapping.is_complete() {
            self.name_index_mut(Direction::VirtualToHost).remove_owner(&mapping.virtual_object(), mapping);
            self.name_index_mut(Direction::HostToVirtual).remove_owner(&mapping.host_object(), mapping);
        }
        for (scope, labels) in [(Scope::Namespaced, &record.labels), (Scope::Cluster, &record.labels_cluster)] {
            for label in labels {
                self.label_index_mut(Direction::VirtualToHost, scope)
                    .remove_owner(label.virtual_value.as_str(), mapping);
                self.label_index_mut(Direction::HostToVirtual, scope)
                    .remove_owner(label.host_value.as_str(), mapping);
            }
        }
        Some(record)
    }

    /// Resolve the record key a possibly half-populated owner refers to.
    fn resolve_owner(&self, owner: &NameMapping) -> Option<NameMapping> {
        if owner.is_complete() {
            return self.mappings.contains_key(owner).then(|| owner.clone());
        }
        if !owner.virtual_name.is_empty() {
            let host = self.name_index(Direction::VirtualToHost).get(&owner.virtual_object())?;
            let key = NameMapping {
                gvk: owner.gvk.clone(),
                virtual_name: owner.virtual_name.clone(),
                host_name: host.clone(),
            };
            return self.mappings.contains_key(&key).then_some(key);
        }
        if !owner.host_name.is_empty() {
            let virtual_name = self.name_index(Direction::HostToVirtual).get(&owner.host_object())?;
            let key = NameMapping {
                gvk: owner.gvk.clone(),
                virtual_name: virtual_name.clone(),
                host_name: owner.host_name.clone(),
            };
            return self.mappings.contains_key(&key).then_some(key);
        }
        None
    }
}

/// Concurrency-safe mapping store over a pluggable backend. One
/// reader/writer lock guards the whole state: lookups share it, mutations
/// and the sweep take it exclusively, and backend writes are the leaf of
/// the critical section with the in-memory commit happening only after the
/// backend accepted the write.
pub struct Store {
    backend: Arc<dyn Backend>,
    state: RwLock<State>,
}

impl Store {
    /// Load the persisted record set and rebuild every index before serving.
    pub async fn new(backend: Arc<dyn Backend>) -> StoreResult<Arc<Self>> {
        let t0 = Instant::now();
        let records = backend.list().await.map_err(StoreError::Backend)?;
        let count = records.len();
        let mut state = State::default();
        for record in records {
            state.insert_record(record);
        }
        info!(mappings = count, took_ms = %t0.elapsed().as_millis(), "store: loaded mappings from backend");
        Ok(Arc::new(Self { backend, state: RwLock::new(state) }))
    }

    /// Spawn the interval sweep loop. Aborting the handle stops collection
    /// between sweeps; a sweep already running completes first.
    pub fn start_garbage_collection(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let store = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick fires immediately; skip it so the first sweep
            // happens one period after startup
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.garbage_collect_mappings().await;
            }
        })
    }

    pub fn gc_period_from_env() -> Duration {
        let secs = std::env::var("MIRRA_GC_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(600);
        Duration::from_secs(secs)
    }

    async fn record_label_scoped(
        &self,
        label: LabelMapping,
        owner: NameMapping,
        scope: Scope,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let Some(key) = state.resolve_owner(&owner) else {
            debug!(owner = %owner, label = %label, "store: no mapping for label owner, skipping");
            return Ok(());
        };
        let mut record = match state.mappings.get(&key) {
            Some(record) => record.clone(),
            None => return Ok(()),
        };
        let inserted = match scope {
            Scope::Namespaced => record.labels.insert(label),
            Scope::Cluster => record.labels_cluster.insert(label),
        };
        if !inserted {
            return Ok(());
        }
        self.backend.save(&record).await.map_err(StoreError::Backend)?;
        state.insert_record(record);
        Ok(())
    }
}

#[async_trait]
impl MappingsStore for Store {
    async fn record_reference(&self, mapping: NameMapping, by: NameMapping) -> StoreResult<()> {
        // half-populated identities cannot be indexed
        if !mapping.is_complete() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        let (mut record, created) = match state.mappings.get(&mapping) {
            Some(record) => (record.clone(), false),
            None => {
                if let Some(existing) = state.conflicting(&mapping) {
                    return Err(StoreError::AmbiguousMapping { mapping, existing });
                }
                (MappingRecord::new(mapping.clone()), true)
            }
        };
        let mut changed = created;
        // a mapping does not pin itself, and an incomplete referent is the
        // mapped object mid-creation rather than a dependency
        if by.is_complete() && by != mapping {
            changed |= record.references.insert(by);
        }
        if !changed {
            return Ok(());
        }
        self.backend.save(&record).await.map_err(StoreError::Backend)?;
        if created {
            counter!("mappings_records_created_total", 1u64);
            debug!(mapping = %record.mapping, "store: recorded mapping");
        }
        state.insert_record(record);
        Ok(())
    }

    async fn delete_reference(&self, mapping: NameMapping, by: NameMapping) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let mut record = match state.mappings.get(&mapping) {
            Some(record) => record.clone(),
            None => return Ok(()),
        };
        if !record.references.remove(&by) {
            return Ok(());
        }
        self.backend.save(&record).await.map_err(StoreError::Backend)?;
        let collectible = record.is_collectible();
        state.insert_record(record);
        if collectible {
            // this may have dropped the last pin; collect right away
            match self.backend.delete(&mapping).await {
                Ok(()) => {
                    state.remove_record(&mapping);
                    counter!("mappings_records_removed_total", 1u64);
                    debug!(mapping = %mapping, "store: collected mapping after last reference removal");
                }
                Err(err) => {
                    warn!(mapping = %mapping, error = %err, "store: failed to delete mapping from backend, keeping until next sweep");
                }
            }
        }
        Ok(())
    }

    async fn record_label(&self, label: LabelMapping, owner: NameMapping) -> StoreResult<()> {
        self.record_label_scoped(label, owner, Scope::Namespaced).await
    }

    async fn record_label_cluster(&self, label: LabelMapping, owner: NameMapping) -> StoreResult<()> {
        self.record_label_scoped(label, owner, Scope::Cluster).await
    }

    async fn record_mapping(&self, mapping: NameMapping) -> StoreResult<()> {
        if !mapping.is_complete() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        if state.mappings.contains_key(&mapping) {
            return Ok(());
        }
        if let Some(existing) = state.conflicting(&mapping) {
            return Err(StoreError::AmbiguousMapping { mapping, existing });
        }
        let record = MappingRecord::new(mapping);
        self.backend.save(&record).await.map_err(StoreError::Backend)?;
        counter!("mappings_records_created_total", 1u64);
        debug!(mapping = %record.mapping, "store: recorded mapping");
        state.insert_record(record);
        Ok(())
    }

    async fn delete_mapping(&self, mapping: NameMapping) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.mappings.contains_key(&mapping) {
            return Ok(());
        }
        self.backend.delete(&mapping).await.map_err(StoreError::Backend)?;
        state.remove_record(&mapping);
        counter!("mappings_records_removed_total", 1u64);
        debug!(mapping = %mapping, "store: deleted mapping");
        Ok(())
    }

    async fn virtual_to_host_name(&self, obj: &Object) -> Option<NamespacedName> {
        let state = self.state.read().await;
        state.name_index(Direction::VirtualToHost).get(obj).cloned()
    }

    async fn host_to_virtual_name(&self, obj: &Object) -> Option<NamespacedName> {
        let state = self.state.read().await;
        state.name_index(Direction::HostToVirtual).get(obj).cloned()
    }

    async fn virtual_to_host_label(&self, value: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .label_index(Direction::VirtualToHost, Scope::Namespaced)
            .get(value)
            .or_else(|| state.label_index(Direction::VirtualToHost, Scope::Cluster).get(value))
            .cloned()
    }

    async fn host_to_virtual_label(&self, value: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .label_index(Direction::HostToVirtual, Scope::Namespaced)
            .get(value)
            .or_else(|| state.label_index(Direction::HostToVirtual, Scope::Cluster).get(value))
            .cloned()
    }

    async fn has_virtual_object(&self, obj: &Object) -> bool {
        let state = self.state.read().await;
        state.name_index(Direction::VirtualToHost).contains(obj)
    }

    async fn has_host_object(&self, obj: &Object) -> bool {
        let state = self.state.read().await;
        state.name_index(Direction::HostToVirtual).contains(obj)
    }

    async fn garbage_collect_mappings(&self) {
        let t0 = Instant::now();
        let mut state = self.state.write().await;
        let stale: Vec<NameMapping> = state
            .mappings
            .values()
            .filter(|record| record.is_collectible())
            .map(|record| record.mapping.clone())
            .collect();
        let mut removed = 0usize;
        for mapping in stale {
            // memory is only touched after the backend delete succeeded, so
            // a failed record stays fully indexed for the next sweep
            if let Err(err) = self.backend.delete(&mapping).await {
                warn!(mapping = %mapping, error = %err, "store: failed to delete mapping from backend, keeping until next sweep");
                continue;
            }
            state.remove_record(&mapping);
            removed += 1;
        }
        counter!("mappings_gc_removed_total", removed as u64);
        histogram!("mappings_gc_sweep_ms", t0.elapsed().as_secs_f64() * 1000.0);
        if removed > 0 {
            info!(removed, took_ms = %t0.elapsed().as_millis(), "store: garbage collected mappings");
        } else {
            debug!(took_ms = %t0.elapsed().as_millis(), "store: garbage collection sweep found nothing");
        }
    }
}
