//! Core identity types shared by the store, the reconciler and the controller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Record kinds known to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    /// Desired-state record authored by users
    Agent,
    /// Executable record derived from an agent, or deployed directly as a tool
    Function,
    /// Versioned set of module descriptors
    Package,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Agent, Kind::Function, Kind::Package];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Agent => "Agent",
            Kind::Function => "Function",
            Kind::Package => "Package",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ObjectKey: (namespace, name) identity of a record within its kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
