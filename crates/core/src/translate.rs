//! Boundary with the naming convention and the object-creation logic.

/// Annotation carrying the virtual object name verbatim. Set by the syncer
/// on every host object whose name cannot be derived deterministically;
/// reverse mapping reads exactly this key.
pub const NAME_ANNOTATION: &str = "mirra.dev/object-name";

/// Annotation carrying the virtual object namespace verbatim.
pub const NAMESPACE_ANNOTATION: &str = "mirra.dev/object-namespace";

/// Namespace-prefix convention for the forward mapping direction. The
/// convention is one-way: reverse mapping never inverts it and relies on
/// the identity annotations instead.
#[derive(Debug, Clone)]
pub struct NamespaceTranslator {
    prefix: String,
}

impl NamespaceTranslator {
    /// `prefix` identifies the virtual-cluster instance, e.g. its name.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn host_namespace(&self, virtual_namespace: &str) -> String {
        format!("{}-{}", self.prefix, virtual_namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_namespace_prefixes() {
        let translator = NamespaceTranslator::new("vc-a");
        assert_eq!(translator.host_namespace("default"), "vc-a-default");
    }
}
