//! Mirra mappers: per-resource-kind identity translation strategies, the
//! default mirror convention, and the registry the syncer resolves them
//! through.

#![forbid(unsafe_code)]

mod mapper;
mod mirror;
mod registry;

pub use mapper::{record_translation, Mapper};
pub use mirror::MirrorMapper;
pub use registry::{MapperRegistry, RegistryError};

/// Bridge from the kube type to the store's partition key.
pub fn gvk_from_kube(gvk: &kube::core::GroupVersionKind) -> mirra_core::GroupVersionKind {
    mirra_core::GroupVersionKind::new(gvk.group.clone(), gvk.version.clone(), gvk.kind.clone())
}
