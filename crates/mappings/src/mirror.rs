//! Default convention-based mapper.

use async_trait::async_trait;
use kube::core::DynamicObject;

use mirra_core::translate::{NAMESPACE_ANNOTATION, NAME_ANNOTATION};
use mirra_core::{GroupVersionKind, NamespacedName, Object, SyncContext};

use crate::mapper::{record_translation, Mapper};

/// Mirrors virtual identities into the host cluster by renaming the
/// namespace and keeping the object name. The convention is one-way:
/// reverse mapping relies on the store and on the identity annotations the
/// syncer sets at creation time, never on inverting the namespace rule.
pub struct MirrorMapper {
    gvk: GroupVersionKind,
}

impl MirrorMapper {
    pub fn new(gvk: GroupVersionKind) -> Self {
        Self { gvk }
    }

    async fn resolve_virtual(
        &self,
        ctx: &SyncContext,
        req: &NamespacedName,
        p_obj: Option<&DynamicObject>,
    ) -> NamespacedName {
        if let Some(virtual_name) = ctx
            .store
            .host_to_virtual_name(&Object::new(self.gvk.clone(), req.clone()))
            .await
        {
            return virtual_name;
        }

        // the authoritative path for non-deterministically named objects
        if let Some(annotations) = p_obj.and_then(|obj| obj.metadata.annotations.as_ref()) {
            if let Some(name) = annotations.get(NAME_ANNOTATION).filter(|name| !name.is_empty()) {
                return NamespacedName::new(
                    annotations.get(NAMESPACE_ANNOTATION).cloned().unwrap_or_default(),
                    name.clone(),
                );
            }
        }

        // an object in an unmapped host namespace has no safe virtual
        // identity; return the empty name rather than guessing
        if !req.namespace.is_empty() {
            return NamespacedName::default();
        }

        NamespacedName::cluster_scoped(req.name.clone())
    }
}

#[async_trait]
impl Mapper for MirrorMapper {
    fn group_version_kind(&self) -> &GroupVersionKind {
        &self.gvk
    }

    async fn virtual_to_host(
        &self,
        ctx: &SyncContext,
        req: &NamespacedName,
        _v_obj: Option<&DynamicObject>,
    ) -> NamespacedName {
        let host_name = match ctx
            .store
            .virtual_to_host_name(&Object::new(self.gvk.clone(), req.clone()))
            .await
        {
            Some(host_name) => host_name,
            None => {
                let namespace = if req.namespace.is_empty() {
                    String::new()
                } else {
                    ctx.translator.host_namespace(&req.namespace)
                };
                NamespacedName::new(namespace, req.name.clone())
            }
        };
        record_translation(ctx, &self.gvk, req, &host_name).await;
        host_name
    }

    async fn host_to_virtual(
        &self,
        ctx: &SyncContext,
        req: &NamespacedName,
        p_obj: Option<&DynamicObject>,
    ) -> NamespacedName {
        let virtual_name = self.resolve_virtual(ctx, req, p_obj).await;
        record_translation(ctx, &self.gvk, &virtual_name, req).await;
        virtual_name
    }

    async fn is_managed(&self, _ctx: &SyncContext, _p_obj: &DynamicObject) -> anyhow::Result<bool> {
        // mirrored kinds never share host namespaces with unrelated tenants
        Ok(true)
    }
}
