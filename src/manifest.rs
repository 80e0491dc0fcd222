//! Manifest loading
//!
//! Records are declared in YAML or JSON files, several documents per file,
//! each shaped `{ kind, metadata, spec, status? }`. Loading validates every
//! document against its typed schema; applying writes them through
//! [`Client::apply`] so unchanged manifests cause no writes.

use crate::api::{Agent, Function, ObjectMeta, Package};
use crate::error::ApiError;
use crate::store::{Client, RawObject};
use crate::types::{Kind, ObjectKey};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub const DEFAULT_NAMESPACE: &str = "default";

const MANIFEST_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

#[derive(Debug, Deserialize)]
struct Document {
    kind: String,
    metadata: ObjectMeta,
    #[serde(default)]
    spec: Value,
    #[serde(default)]
    status: Value,
}

/// One validated record read from disk
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub source: PathBuf,
    pub kind: Kind,
    pub object: RawObject,
}

impl Manifest {
    pub fn key(&self) -> ObjectKey {
        self.object.key()
    }
}

pub(crate) fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MANIFEST_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

fn manifest_error(path: &Path, message: impl Into<String>) -> ApiError {
    ApiError::Manifest {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn parse_kind(path: &Path, kind: &str) -> Result<Kind, ApiError> {
    Kind::ALL
        .into_iter()
        .find(|k| k.as_str() == kind)
        .ok_or_else(|| manifest_error(path, format!("unknown kind '{}'", kind)))
}

fn check_schema<R: DeserializeOwned>(path: &Path, object: &RawObject) -> Result<(), ApiError> {
    let value = serde_json::to_value(object)
        .map_err(|e| manifest_error(path, e.to_string()))?;
    serde_json::from_value::<R>(value)
        .map(|_| ())
        .map_err(|e| manifest_error(path, format!("{} is invalid: {}", object.metadata.name, e)))
}

/// Parse every document of one manifest file
pub fn parse_manifest(path: &Path, contents: &str) -> Result<Vec<Manifest>, ApiError> {
    let mut manifests = Vec::new();

    for document in serde_yaml::Deserializer::from_str(contents) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| manifest_error(path, e.to_string()))?;
        if value.is_null() {
            continue;
        }
        let value =
            serde_json::to_value(&value).map_err(|e| manifest_error(path, e.to_string()))?;
        let document: Document =
            serde_json::from_value(value).map_err(|e| manifest_error(path, e.to_string()))?;

        let kind = parse_kind(path, &document.kind)?;
        let mut metadata = document.metadata;
        if metadata.name.is_empty() {
            return Err(manifest_error(path, format!("{} without metadata.name", kind)));
        }
        if metadata.namespace.is_empty() {
            metadata.namespace = DEFAULT_NAMESPACE.to_string();
        }

        let object = RawObject {
            metadata,
            spec: document.spec,
            status: document.status,
        };
        match kind {
            Kind::Agent => check_schema::<Agent>(path, &object)?,
            Kind::Function => check_schema::<Function>(path, &object)?,
            Kind::Package => check_schema::<Package>(path, &object)?,
        }

        manifests.push(Manifest {
            source: path.to_path_buf(),
            kind,
            object,
        });
    }

    Ok(manifests)
}

/// Load every manifest under `root` (a directory or a single file), in path order
pub fn load_dir(root: &Path) -> Result<Vec<Manifest>, ApiError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| manifest_error(root, e.to_string()))?;
        if entry.file_type().is_file() && is_manifest(entry.path()) {
            files.push(entry.into_path());
        }
    }

    let mut manifests = Vec::new();
    for file in files {
        let contents = std::fs::read_to_string(&file)?;
        let parsed = parse_manifest(&file, &contents)?;
        debug!(path = %file.display(), documents = parsed.len(), "Loaded manifest");
        manifests.extend(parsed);
    }
    Ok(manifests)
}

/// Packages first, then functions, then agents, so references resolve on the first pass
fn apply_rank(kind: Kind) -> u8 {
    match kind {
        Kind::Package => 0,
        Kind::Function => 1,
        Kind::Agent => 2,
    }
}

/// Apply `manifests` to the store; returns how many records were written
pub async fn apply_all(client: &Client, manifests: &[Manifest]) -> Result<usize, ApiError> {
    let mut ordered: Vec<&Manifest> = manifests.iter().collect();
    ordered.sort_by_key(|m| apply_rank(m.kind));

    let mut written = 0;
    for manifest in ordered {
        let before = client
            .store()
            .get(manifest.kind, &manifest.key())
            .await
            .ok()
            .map(|current| current.metadata.resource_version);
        let applied = client.apply(manifest.kind, manifest.object.clone()).await?;
        if before != Some(applied.metadata.resource_version) {
            written += 1;
            debug!(kind = %manifest.kind, key = %manifest.key(), "Applied manifest");
        }
    }

    info!(manifests = manifests.len(), written, "Applied manifests");
    Ok(written)
}
