use std::fmt;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Resource-kind tag used as the partition key of every mapping table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: group.into(), version: version.into(), kind: kind.into() }
    }

    /// Compact key form: `v1/Kind` for the core group, `group/v1/Kind` otherwise.
    pub fn gvk_key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.gvk_key())
    }
}

pub fn parse_gvk_key(key: &str) -> anyhow::Result<GroupVersionKind> {
    let parts: Vec<_> = key.split('/').collect();
    match parts.as_slice() {
        [version, kind] => Ok(GroupVersionKind::new("", *version, *kind)),
        [group, version, kind] => Ok(GroupVersionKind::new(*group, *version, *kind)),
        _ => Err(anyhow!("invalid gvk key: {} (expect v1/Kind or group/v1/Kind)", key)),
    }
}

/// `(namespace, name)` pair identifying one resource instance within one
/// control plane. The empty value doubles as the "no identity" sentinel
/// returned by reverse mapping when no safe answer exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }

    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self { namespace: String::new(), name: name.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.namespace.is_empty() && self.name.is_empty()
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// One side of a mapping: a resource instance on either the virtual or the
/// host control plane. Used as the key of the name indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Object {
    pub gvk: GroupVersionKind,
    pub name: NamespacedName,
}

impl Object {
    pub fn new(gvk: GroupVersionKind, name: NamespacedName) -> Self {
        Self { gvk, name }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.gvk, self.name)
    }
}

/// Canonical identity-translation record for one resource instance and the
/// primary key of the mapping store. The full triplet is the key, so a kind
/// may hold mappings whose directions were populated at different times.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameMapping {
    pub gvk: GroupVersionKind,
    pub virtual_name: NamespacedName,
    pub host_name: NamespacedName,
}

impl NameMapping {
    pub fn virtual_object(&self) -> Object {
        Object::new(self.gvk.clone(), self.virtual_name.clone())
    }

    pub fn host_object(&self) -> Object {
        Object::new(self.gvk.clone(), self.host_name.clone())
    }

    /// Both sides populated. Only complete mappings can be indexed.
    pub fn is_complete(&self) -> bool {
        !self.virtual_name.is_empty() && !self.host_name.is_empty()
    }
}

impl fmt::Display for NameMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} -> {})", self.gvk, self.virtual_name, self.host_name)
    }
}

/// A single label-value translation pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelMapping {
    pub virtual_value: String,
    pub host_value: String,
}

impl LabelMapping {
    pub fn new(virtual_value: impl Into<String>, host_value: impl Into<String>) -> Self {
        Self { virtual_value: virtual_value.into(), host_value: host_value.into() }
    }
}

impl fmt::Display for LabelMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.virtual_value, self.host_value)
    }
}
