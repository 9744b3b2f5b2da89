#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;

use mirra_core::{
    GroupVersionKind, LabelMapping, MappingsStore, NameMapping, NamespacedName, Object, StoreError,
};
use mirra_store::{Backend, MappingRecord, MemoryBackend, Store};

fn gvk() -> GroupVersionKind {
    GroupVersionKind::new("", "v1", "Secret")
}

fn name_mapping(virtual_name: &str, host_name: &str) -> NameMapping {
    NameMapping {
        gvk: gvk(),
        virtual_name: NamespacedName::new("virtual-namespace", virtual_name),
        host_name: NamespacedName::new("host-namespace", host_name),
    }
}

fn virtual_object(mapping: &NameMapping) -> Object {
    mapping.virtual_object()
}

fn host_object(mapping: &NameMapping) -> Object {
    mapping.host_object()
}

#[tokio::test]
async fn round_trip_after_record_mapping() {
    let store = Store::new(Arc::new(MemoryBackend::new())).await.unwrap();
    let mapping = name_mapping("virtual-name", "host-name");
    store.record_mapping(mapping.clone()).await.unwrap();

    assert_eq!(
        store.virtual_to_host_name(&virtual_object(&mapping)).await,
        Some(mapping.host_name.clone())
    );
    assert_eq!(
        store.host_to_virtual_name(&host_object(&mapping)).await,
        Some(mapping.virtual_name.clone())
    );
    assert!(store.has_virtual_object(&virtual_object(&mapping)).await);
    assert!(store.has_host_object(&host_object(&mapping)).await);
}

#[tokio::test]
async fn miss_returns_none() {
    let store = Store::new(Arc::new(MemoryBackend::new())).await.unwrap();
    let unknown = Object::new(gvk(), NamespacedName::new("ns", "never-recorded"));
    assert_eq!(store.virtual_to_host_name(&unknown).await, None);
    assert_eq!(store.host_to_virtual_name(&unknown).await, None);
    assert_eq!(store.virtual_to_host_label("never-recorded").await, None);
    assert_eq!(store.host_to_virtual_label("never-recorded").await, None);
    assert!(!store.has_virtual_object(&unknown).await);
    assert!(!store.has_host_object(&unknown).await);
}

#[tokio::test]
async fn ambiguous_mapping_is_rejected() {
    let store = Store::new(Arc::new(MemoryBackend::new())).await.unwrap();
    let mapping = name_mapping("virtual-name", "host-name");
    store.record_mapping(mapping.clone()).await.unwrap();

    // a second host identity for the same virtual name must not overwrite
    let conflicting = name_mapping("virtual-name", "other-host-name");
    let err = store.record_mapping(conflicting).await.unwrap_err();
    assert!(matches!(err, StoreError::AmbiguousMapping { .. }));

    assert_eq!(
        store.virtual_to_host_name(&virtual_object(&mapping)).await,
        Some(mapping.host_name.clone())
    );

    // same for a second virtual identity of the same host name
    let conflicting = name_mapping("other-virtual-name", "host-name");
    let err = store.record_mapping(conflicting).await.unwrap_err();
    assert!(matches!(err, StoreError::AmbiguousMapping { .. }));
}

#[tokio::test]
async fn delete_mapping_clears_indices() {
    let store = Store::new(Arc::new(MemoryBackend::new())).await.unwrap();
    let mapping = name_mapping("virtual-name", "host-name");
    store.record_mapping(mapping.clone()).await.unwrap();
    store
        .record_label(LabelMapping::new("virtual-label", "host-label"), mapping.clone())
        .await
        .unwrap();

    store.delete_mapping(mapping.clone()).await.unwrap();

    assert_eq!(store.virtual_to_host_name(&virtual_object(&mapping)).await, None);
    assert_eq!(store.host_to_virtual_name(&host_object(&mapping)).await, None);
    assert_eq!(store.virtual_to_host_label("virtual-label").await, None);
    assert_eq!(store.host_to_virtual_label("host-label").await, None);
}

#[tokio::test]
async fn reload_sees_previous_records() {
    let backend: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
    let mapping = name_mapping("virtual-name", "host-name");
    {
        let store = Store::new(backend.clone()).await.unwrap();
        store.record_mapping(mapping.clone()).await.unwrap();
        store
            .record_label(LabelMapping::new("virtual-label", "host-label"), mapping.clone())
            .await
            .unwrap();
    }

    // a fresh store over the same backend rebuilds every index
    let store = Store::new(backend).await.unwrap();
    assert_eq!(
        store.virtual_to_host_name(&virtual_object(&mapping)).await,
        Some(mapping.host_name.clone())
    );
    assert_eq!(
        store.host_to_virtual_name(&host_object(&mapping)).await,
        Some(mapping.virtual_name.clone())
    );
    assert_eq!(store.virtual_to_host_label("virtual-label").await.as_deref(), Some("host-label"));
}

struct FailingBackend;

#[async_trait]
impl Backend for FailingBackend {
    async fn list(&self) -> anyhow::Result<Vec<MappingRecord>> {
        Ok(Vec::new())
    }

    async fn save(&self, _record: &MappingRecord) -> anyhow::Result<()> {
        Err(anyhow!("save refused"))
    }

    async fn delete(&self, _mapping: &NameMapping) -> anyhow::Result<()> {
        Err(anyhow!("delete refused"))
    }
}

#[tokio::test]
async fn backend_failure_leaves_state_unchanged() {
    let store = Store::new(Arc::new(FailingBackend)).await.unwrap();
    let mapping = name_mapping("virtual-name", "host-name");

    let err = store.record_reference(mapping.clone(), NameMapping::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));

    // nothing was applied in memory
    assert_eq!(store.virtual_to_host_name(&virtual_object(&mapping)).await, None);
    assert_eq!(store.host_to_virtual_name(&host_object(&mapping)).await, None);
}
