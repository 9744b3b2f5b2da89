//! GVK-keyed mapper registry, resolved once at startup per managed kind.

use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

use mirra_core::GroupVersionKind;

use crate::mapper::Mapper;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("mapper already registered for {0}")]
    AlreadyRegistered(GroupVersionKind),
    #[error("no mapper registered for {0}")]
    NotRegistered(GroupVersionKind),
}

#[derive(Default)]
pub struct MapperRegistry {
    mappers: RwLock<FxHashMap<GroupVersionKind, Arc<dyn Mapper>>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, mapper: Arc<dyn Mapper>) -> Result<(), RegistryError> {
        let gvk = mapper.group_version_kind().clone();
        let mut mappers = self.mappers.write().unwrap();
        if mappers.contains_key(&gvk) {
            return Err(RegistryError::AlreadyRegistered(gvk));
        }
        mappers.insert(gvk, mapper);
        Ok(())
    }

    pub fn by_gvk(&self, gvk: &GroupVersionKind) -> Result<Arc<dyn Mapper>, RegistryError> {
        self.mappers
            .read()
            .unwrap()
            .get(gvk)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(gvk.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MirrorMapper;

    fn gvk() -> GroupVersionKind {
        GroupVersionKind::new("", "v1", "Secret")
    }

    #[test]
    fn register_and_resolve() {
        let registry = MapperRegistry::new();
        registry.register(Arc::new(MirrorMapper::new(gvk()))).unwrap();

        let mapper = registry.by_gvk(&gvk()).unwrap();
        assert_eq!(mapper.group_version_kind(), &gvk());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = MapperRegistry::new();
        registry.register(Arc::new(MirrorMapper::new(gvk()))).unwrap();

        let err = registry.register(Arc::new(MirrorMapper::new(gvk()))).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
    }

    #[test]
    fn unknown_gvk_is_an_error() {
        let registry = MapperRegistry::new();
        let err = registry.by_gvk(&gvk()).unwrap_err();
        assert!(matches!(err, RegistryError::NotRegistered(_)));
    }
}
