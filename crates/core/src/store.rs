//! Contract between mappers and the mapping store.

use async_trait::async_trait;

use crate::types::{LabelMapping, NameMapping, NamespacedName, Object};

/// Errors surfaced by store mutations. Lookup misses are `None`, never an
/// error: absence is a normal outcome and callers fall back to their
/// convention-based conversion.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The persistence substrate failed; the store's in-memory state is
    /// left unchanged.
    #[error("mappings backend: {0}")]
    Backend(#[source] anyhow::Error),

    /// The write would assign a second identity to an already-mapped name.
    #[error("ambiguous mapping: {mapping} conflicts with recorded {existing}")]
    AmbiguousMapping { mapping: NameMapping, existing: NameMapping },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The central identity index, called concurrently from independent
/// reconcile loops. All mutations are idempotent; records are destroyed
/// only by garbage collection, never directly by mappers.
#[async_trait]
pub trait MappingsStore: Send + Sync {
    /// Ensure a record exists for `mapping` and register `by` as a
    /// referencing entity pinning it. Incomplete mappings are skipped; an
    /// incomplete `by`, or `by == mapping`, pins nothing.
    async fn record_reference(&self, mapping: NameMapping, by: NameMapping) -> StoreResult<()>;

    /// Drop `by` from the references of `mapping` and collect the record
    /// right away if that removed the last pin.
    async fn delete_reference(&self, mapping: NameMapping, by: NameMapping) -> StoreResult<()>;

    /// Attach a namespaced label-value pair to the record owning `owner`.
    async fn record_label(&self, label: LabelMapping, owner: NameMapping) -> StoreResult<()>;

    /// Attach a cluster-scoped label-value pair to the record owning `owner`.
    async fn record_label_cluster(&self, label: LabelMapping, owner: NameMapping) -> StoreResult<()>;

    /// Insert the canonical mapping entry and its index rows. A no-op when
    /// the identical mapping exists; rejected with `AmbiguousMapping` when
    /// it would assign a second identity to either side.
    async fn record_mapping(&self, mapping: NameMapping) -> StoreResult<()>;

    /// Drop a record and all its index rows regardless of references, e.g.
    /// when the virtual object itself is gone.
    async fn delete_mapping(&self, mapping: NameMapping) -> StoreResult<()>;

    async fn virtual_to_host_name(&self, obj: &Object) -> Option<NamespacedName>;

    async fn host_to_virtual_name(&self, obj: &Object) -> Option<NamespacedName>;

    /// Translate a virtual label value. The namespaced index is consulted
    /// before the cluster index; the more specific scope wins.
    async fn virtual_to_host_label(&self, value: &str) -> Option<String>;

    /// Reverse label translation, same precedence as `virtual_to_host_label`.
    async fn host_to_virtual_label(&self, value: &str) -> Option<String>;

    async fn has_virtual_object(&self, obj: &Object) -> bool;

    async fn has_host_object(&self, obj: &Object) -> bool;

    /// Sweep once: delete every record with no references and no labels.
    async fn garbage_collect_mappings(&self);
}
