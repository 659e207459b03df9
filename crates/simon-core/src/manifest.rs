//! Input manifest documents.
//!
//! Each YAML document resolves once, at parse time, into a closed set of
//! variants. Kinds the simulator does not expand are kept as
//! `Unsupported` so callers can report them; they are never fatal.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{CoreError, CoreResult};
use crate::objects::{Deployment, Node, Pod, StatefulSet};

/// One parsed manifest document.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestDocument {
    Node(Node),
    Pod(Pod),
    Deployment(Deployment),
    StatefulSet(StatefulSet),
    Unsupported { kind: String },
}

impl ManifestDocument {
    fn from_value(value: serde_yaml::Value) -> CoreResult<Self> {
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .unwrap_or_default()
            .to_string();
        let doc = match kind.as_str() {
            "Node" => Self::Node(decode(value)?),
            "Pod" => Self::Pod(decode(value)?),
            "Deployment" => Self::Deployment(decode(value)?),
            "StatefulSet" => Self::StatefulSet(decode(value)?),
            _ => Self::Unsupported { kind },
        };
        Ok(doc)
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_yaml::Value) -> CoreResult<T> {
    serde_yaml::from_value(value).map_err(|e| CoreError::Manifest(e.to_string()))
}

/// Parse every `---`-separated document in a YAML string.
pub fn parse_documents(content: &str) -> CoreResult<Vec<ManifestDocument>> {
    let mut docs = Vec::new();
    for de in serde_yaml::Deserializer::from_str(content) {
        let value =
            serde_yaml::Value::deserialize(de).map_err(|e| CoreError::Manifest(e.to_string()))?;
        if value.is_null() {
            continue;
        }
        docs.push(ManifestDocument::from_value(value)?);
    }
    Ok(docs)
}

/// The node template plus the workloads to expand, in input order.
#[derive(Debug, Clone, Default)]
pub struct ManifestSet {
    pub node: Option<Node>,
    pub workloads: Vec<ManifestDocument>,
}

impl ManifestSet {
    pub fn from_documents(docs: impl IntoIterator<Item = ManifestDocument>) -> Self {
        let mut set = ManifestSet::default();
        for doc in docs {
            match doc {
                ManifestDocument::Node(node) => {
                    if let Some(prev) = &set.node {
                        warn!(
                            previous = %prev.name(),
                            replacement = %node.name(),
                            "multiple node templates given, keeping the last"
                        );
                    }
                    set.node = Some(node);
                }
                ManifestDocument::Unsupported { kind } => {
                    warn!(%kind, "unsupported manifest kind, skipping");
                }
                workload => set.workloads.push(workload),
            }
        }
        set
    }

    /// Load manifests from files or directories. Only `.yaml`/`.yml` files
    /// are read; directories are walked recursively in name order.
    pub fn load(paths: &[PathBuf]) -> CoreResult<Self> {
        let mut docs = Vec::new();
        for root in paths {
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.map_err(|e| CoreError::Manifest(e.to_string()))?;
                let path = entry.path();
                if !entry.file_type().is_file() || !is_yaml(path) {
                    continue;
                }
                let content = std::fs::read_to_string(path)?;
                let parsed = parse_documents(&content).map_err(|e| {
                    CoreError::Manifest(format!("{}: {e}", path.display()))
                })?;
                debug!(path = %path.display(), documents = parsed.len(), "manifest loaded");
                docs.extend(parsed);
            }
        }
        Ok(Self::from_documents(docs))
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
