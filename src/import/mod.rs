//! Bulk import of JSON documents into a store.
//!
//! # Data Flow
//! ```text
//! JSON file
//!     → load_document (must be an object)
//!     → flatten(config name, doc) → { "App:DB:Host": "localhost", ... }
//!     → push(storage, namespace, kv) → ImportReport
//! ```
//!
//! Keys are written only when their stored value differs, so watchers see
//! exactly the keys that changed.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value as Json;
use thiserror::Error;

use crate::backend::{physical_key, Storage};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} must contain a JSON object at the top level")]
    NotAnObject { path: PathBuf },
}

/// Read a JSON document whose top level is an object.
pub fn load_document(path: &Path) -> Result<Json, ImportError> {
    let content = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: Json = serde_json::from_str(&content).map_err(|source| ImportError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if !doc.is_object() {
        return Err(ImportError::NotAnObject {
            path: path.to_path_buf(),
        });
    }
    Ok(doc)
}

/// Flatten `doc` into `:`-joined keys under `prefix`.
///
/// Objects nest, arrays become comma separated text (nested objects and
/// arrays inside them stay JSON), `null` becomes the empty string.
pub fn flatten(prefix: &str, doc: &Json) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(prefix.to_string(), doc, &mut out);
    out
}

fn flatten_into(prefix: String, value: &Json, out: &mut BTreeMap<String, String>) {
    match value {
        Json::Object(members) => {
            for (name, member) in members {
                let key = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}:{}", prefix, name)
                };
                flatten_into(key, member, out);
            }
        }
        Json::Array(items) => {
            let joined = items.iter().map(element_text).collect::<Vec<_>>().join(",");
            out.insert(prefix, joined);
        }
        other => {
            out.insert(prefix, element_text(other));
        }
    }
}

fn element_text(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One key whose stored value was replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub before: String,
    pub after: String,
}

impl fmt::Display for KeyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ==> {}", self.before, self.after)
    }
}

/// Outcome of a [`push`], keyed by physical key.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub changed: BTreeMap<String, KeyChange>,
    pub failures: BTreeMap<String, String>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Write every entry of `kv` whose stored value differs. Per-key failures are
/// collected, not returned early. Empty keys are skipped.
pub async fn push(
    storage: &dyn Storage,
    namespace: &str,
    kv: &BTreeMap<String, String>,
) -> ImportReport {
    let mut report = ImportReport::default();
    for (key, value) in kv {
        if key.is_empty() {
            continue;
        }
        let physical = physical_key(namespace, key);
        let before = match storage.get(namespace, key).await {
            Ok(raw) => raw.map(|r| r.text().into_owned()).unwrap_or_default(),
            Err(e) => {
                report.failures.insert(physical, e.to_string());
                continue;
            }
        };
        if before == *value {
            continue;
        }
        if let Err(e) = storage.set(namespace, key, value).await {
            report.failures.insert(physical, e.to_string());
            continue;
        }
        tracing::debug!(key = %physical, "Imported key");
        report.changed.insert(
            physical,
            KeyChange {
                before,
                after: value.clone(),
            },
        );
    }
    report
}
