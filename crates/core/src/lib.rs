//! Mirra core: identity types, the mapping-store contract and the context
//! threaded through every translation.

#![forbid(unsafe_code)]

use std::sync::Arc;

pub mod store;
pub mod translate;
mod types;

pub use store::{MappingsStore, StoreError, StoreResult};
pub use translate::NamespaceTranslator;
pub use types::{parse_gvk_key, GroupVersionKind, LabelMapping, NameMapping, NamespacedName, Object};

/// Observability hook invoked after every translation with the pair that
/// was resolved. A side channel, not part of the translation result.
pub trait MappingRecorder: Send + Sync {
    fn record_translation(
        &self,
        gvk: &GroupVersionKind,
        virtual_name: &NamespacedName,
        host_name: &NamespacedName,
    );
}

/// Per-translation context handed to mappers: the shared store, the
/// namespace convention, and the optional recording hook.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn MappingsStore>,
    pub translator: NamespaceTranslator,
    pub recorder: Option<Arc<dyn MappingRecorder>>,
}

impl SyncContext {
    pub fn new(store: Arc<dyn MappingsStore>, translator: NamespaceTranslator) -> Self {
        Self { store, translator, recorder: None }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn MappingRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }
}
