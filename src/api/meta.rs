//! Record metadata: identity, versioning, labels and owner references.

use crate::error::ReconcileError;
use crate::types::{Kind, ObjectKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label carried by every function derived from an agent; value is the agent name
pub const AGENT_LABEL: &str = "agent";

/// Metadata common to every stored record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Assigned by the store on create
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Optimistic concurrency token; every write must carry the current value
    #[serde(default)]
    pub resource_version: u64,
    /// Bumped by the store only when the spec changes
    #[serde(default)]
    pub generation: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// The controller reference, if any
    pub fn controller(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        !uid.is_empty() && self.owner_references.iter().any(|r| r.uid == uid)
    }
}

/// Back-reference from a derived record to the record that owns it.
///
/// The store deletes every record whose owner references name a deleted uid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: Kind,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
}

/// Mark `owner` as the controlling owner of `owned`.
///
/// Fails when `owned` is already controlled by a different record.
pub fn set_controller_reference(
    owner_kind: Kind,
    owner: &ObjectMeta,
    owned: &mut ObjectMeta,
) -> Result<(), ReconcileError> {
    if owner.namespace != owned.namespace {
        return Err(ReconcileError::Ownership(format!(
            "cross-namespace owner {} for {}",
            owner.key(),
            owned.key()
        )));
    }

    if let Some(existing) = owned.controller() {
        if existing.uid == owner.uid && existing.kind == owner_kind && existing.name == owner.name {
            return Ok(());
        }
        if existing.uid != owner.uid || existing.kind != owner_kind {
            return Err(ReconcileError::Ownership(format!(
                "{} is already controlled by {} {}",
                owned.key(),
                existing.kind,
                existing.name
            )));
        }
    }

    owned
        .owner_references
        .retain(|r| !(r.kind == owner_kind && r.uid == owner.uid));
    owned.owner_references.push(OwnerReference {
        kind: owner_kind,
        name: owner.name.clone(),
        uid: owner.uid.clone(),
        controller: true,
    });
    Ok(())
}

/// Owned-record notification filter: only labelled functions map back to an agent
pub fn has_agent_label(meta: &ObjectMeta) -> bool {
    meta.labels.contains_key(AGENT_LABEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> ObjectMeta {
        ObjectMeta {
            uid: "uid-1".to_string(),
            ..ObjectMeta::new("default", "test-agent")
        }
    }

    #[test]
    fn test_set_controller_reference_is_idempotent() {
        let owner = owner();
        let mut owned = ObjectMeta::new("default", "test-agent");

        set_controller_reference(Kind::Agent, &owner, &mut owned).unwrap();
        set_controller_reference(Kind::Agent, &owner, &mut owned).unwrap();

        assert_eq!(owned.owner_references.len(), 1);
        let reference = owned.controller().unwrap();
        assert_eq!(reference.uid, "uid-1");
        assert_eq!(reference.name, "test-agent");
        assert!(owned.is_owned_by("uid-1"));
    }

    #[test]
    fn test_set_controller_reference_rejects_second_controller() {
        let mut owned = ObjectMeta::new("default", "test-agent");
        set_controller_reference(Kind::Agent, &owner(), &mut owned).unwrap();

        let other = ObjectMeta {
            uid: "uid-2".to_string(),
            ..ObjectMeta::new("default", "other")
        };
        let err = set_controller_reference(Kind::Agent, &other, &mut owned).unwrap_err();
        assert!(err.to_string().contains("already controlled"));
    }

    #[test]
    fn test_set_controller_reference_rejects_cross_namespace() {
        let mut owned = ObjectMeta::new("other-ns", "test-agent");
        assert!(set_controller_reference(Kind::Agent, &owner(), &mut owned).is_err());
    }

    #[test]
    fn test_has_agent_label() {
        let mut meta = ObjectMeta::new("default", "f");
        assert!(!has_agent_label(&meta));

        meta.labels.insert("other".to_string(), "label".to_string());
        assert!(!has_agent_label(&meta));

        meta.labels.insert(AGENT_LABEL.to_string(), "test-agent".to_string());
        assert!(has_agent_label(&meta));
    }
}
