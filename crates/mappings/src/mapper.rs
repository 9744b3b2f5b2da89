//! Per-resource-kind translation strategy.

use async_trait::async_trait;
use kube::core::DynamicObject;
use tracing::warn;

use mirra_core::{GroupVersionKind, NameMapping, NamespacedName, Object, SyncContext};

/// Translation strategy for one resource kind. Implementations are
/// stateless apart from the kind they were built for; all shared state
/// lives in the store carried by the context.
#[async_trait]
pub trait Mapper: Send + Sync {
    /// The kind this mapper serves; key for registry lookup.
    fn group_version_kind(&self) -> &GroupVersionKind;

    /// Translate a virtual identity to its host identity. Consults the
    /// store first; on a miss the mapper computes the identity by
    /// convention.
    async fn virtual_to_host(
        &self,
        ctx: &SyncContext,
        req: &NamespacedName,
        v_obj: Option<&DynamicObject>,
    ) -> NamespacedName;

    /// Translate a host identity back to its virtual identity. Consults
    /// the store first; returns the empty name when no safe answer exists.
    async fn host_to_virtual(
        &self,
        ctx: &SyncContext,
        req: &NamespacedName,
        p_obj: Option<&DynamicObject>,
    ) -> NamespacedName;

    /// Whether a host-side object is owned by this virtual cluster; used
    /// to filter watch events.
    async fn is_managed(&self, ctx: &SyncContext, p_obj: &DynamicObject) -> anyhow::Result<bool>;
}

/// Final step of every translation, run on every exit path: notify the
/// recording hook, then make a newly resolved pair durable so the next
/// lookup is an index hit. Translation itself is infallible, so
/// persistence trouble is logged rather than propagated.
pub async fn record_translation(
    ctx: &SyncContext,
    gvk: &GroupVersionKind,
    virtual_name: &NamespacedName,
    host_name: &NamespacedName,
) {
    if let Some(recorder) = &ctx.recorder {
        recorder.record_translation(gvk, virtual_name, host_name);
    }
    if virtual_name.is_empty() || host_name.is_empty() {
        return;
    }
    let virtual_object = Object::new(gvk.clone(), virtual_name.clone());
    if ctx.store.virtual_to_host_name(&virtual_object).await.is_some() {
        return;
    }
    let mapping = NameMapping {
        gvk: gvk.clone(),
        virtual_name: virtual_name.clone(),
        host_name: host_name.clone(),
    };
    if let Err(err) = ctx.store.record_mapping(mapping.clone()).await {
        warn!(mapping = %mapping, error = %err, "mappings: failed to record translated mapping");
    }
}
