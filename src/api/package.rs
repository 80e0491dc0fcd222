//! Package: versioned set of module descriptors that functions are instantiated from.

use super::ResourceSpec;
use crate::types::Kind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Module {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_schema: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sink_schema: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageSpec {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub modules: BTreeMap<String, Module>,
}

impl ResourceSpec for PackageSpec {
    const KIND: Kind = Kind::Package;
}
