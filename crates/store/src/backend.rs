//! Persistence capability behind the store.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use mirra_core::{LabelMapping, NameMapping};

/// Live value behind a `NameMapping` key, and the unit the backend
/// persists. Owned exclusively by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRecord {
    pub mapping: NameMapping,
    /// Inbound pins: entities that recorded a dependency on this mapping.
    pub references: FxHashSet<NameMapping>,
    pub labels: FxHashSet<LabelMapping>,
    pub labels_cluster: FxHashSet<LabelMapping>,
}

impl MappingRecord {
    pub fn new(mapping: NameMapping) -> Self {
        Self {
            mapping,
            references: FxHashSet::default(),
            labels: FxHashSet::default(),
            labels_cluster: FxHashSet::default(),
        }
    }

    /// Nothing pins this record anymore.
    pub fn is_collectible(&self) -> bool {
        self.references.is_empty() && self.labels.is_empty() && self.labels_cluster.is_empty()
    }
}

/// Narrow persistence interface so the in-memory reference implementation
/// and a durable one (e.g. a config object in the host cluster) are
/// interchangeable without touching store logic. Implementations manage
/// their own consistency for concurrent writers.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Load every persisted record. Called once when the store starts.
    async fn list(&self) -> Result<Vec<MappingRecord>>;

    /// Insert or replace one record.
    async fn save(&self, record: &MappingRecord) -> Result<()>;

    /// Remove one record. Removing an absent record is not an error.
    async fn delete(&self, mapping: &NameMapping) -> Result<()>;
}

/// Reference backend. No durability across process restart.
#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<FxHashMap<NameMapping, MappingRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list(&self) -> Result<Vec<MappingRecord>> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn save(&self, record: &MappingRecord) -> Result<()> {
        self.records.lock().unwrap().insert(record.mapping.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, mapping: &NameMapping) -> Result<()> {
        self.records.lock().unwrap().remove(mapping);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirra_core::{GroupVersionKind, NamespacedName};

    fn mapping(name: &str) -> NameMapping {
        NameMapping {
            gvk: GroupVersionKind::new("", "v1", "Secret"),
            virtual_name: NamespacedName::new("vns", name),
            host_name: NamespacedName::new("hns", name),
        }
    }

    #[tokio::test]
    async fn save_list_delete() {
        let backend = MemoryBackend::new();
        backend.save(&MappingRecord::new(mapping("a"))).await.unwrap();
        backend.save(&MappingRecord::new(mapping("b"))).await.unwrap();
        assert_eq!(backend.list().await.unwrap().len(), 2);

        // replacing a record must not duplicate it
        let mut record = MappingRecord::new(mapping("a"));
        record.references.insert(mapping("b"));
        backend.save(&record).await.unwrap();
        let listed = backend.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed
            .iter()
            .any(|r| r.mapping == mapping("a") && r.references.len() == 1));

        backend.delete(&mapping("a")).await.unwrap();
        assert_eq!(backend.list().await.unwrap().len(), 1);
        // deleting again is fine
        backend.delete(&mapping("a")).await.unwrap();
    }
}
