//! Named forecast model files.
//!
//! A registry document lists model files by name:
//!
//! ```json
//! {
//!   "default": "ns-central",
//!   "models": {
//!     "ns-central": "ns-central.json",
//!     "ns-coastal": "models/ns-coastal.json"
//!   }
//! }
//! ```
//!
//! Relative paths are resolved against the directory of the document. When
//! `default` is absent, the model registered as `"default"` (if any) is the
//! default model.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{xgboost, ModelError, TreeModel};

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    models: BTreeMap<String, PathBuf>,
}

/// Immutable mapping from model names to model files.
///
/// Constructed once and passed by reference to whatever resolves models.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRegistry {
    default: Option<String>,
    files: BTreeMap<String, PathBuf>,
}

impl ModelRegistry {
    /// Registry with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry over explicit `(name, file)` pairs.
    pub fn from_entries<I, N, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            default: None,
            files: entries
                .into_iter()
                .map(|(n, p)| (n.into(), p.into()))
                .collect(),
        }
    }

    /// Load a registry document.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: RegistryDocument =
            serde_json::from_str(&text).map_err(|source| ModelError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(Self::from_document(doc, base))
    }

    fn from_document(doc: RegistryDocument, base: &Path) -> Self {
        let files = doc
            .models
            .into_iter()
            .map(|(name, file)| {
                let file = if file.is_absolute() { file } else { base.join(file) };
                (name, file)
            })
            .collect();
        Self {
            default: doc.default,
            files,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Name of the default model, if one is configured.
    pub fn default_name(&self) -> Option<&str> {
        match &self.default {
            Some(name) => Some(name.as_str()),
            None => self.files.get_key_value("default").map(|(k, _)| k.as_str()),
        }
    }

    /// Model file registered under `name`.
    pub fn file(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    /// Load the model registered under `name`.
    pub fn model(&self, name: &str) -> Result<TreeModel, ModelError> {
        let file = self.file(name).ok_or_else(|| ModelError::UnknownModel {
            spec: name.to_string(),
            known: self.to_string(),
        })?;
        xgboost::load_model(file)
    }
}

impl fmt::Display for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
        }
        f.write_str("}")
    }
}
