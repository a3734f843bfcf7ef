//! Forecast models.
//!
//! A forecast model is a [`PointPredictor`] over named feature columns (see
//! [`FeatureColumns`]). Models are referred to by a lightweight
//! [`ModelSpec`], either a name from a [`ModelRegistry`] or a file path, and
//! materialized through a [`ModelLoader`].
//!
//! The native model representation is an additive tree ensemble
//! ([`Forest`] of [`Tree`]s) converted from XGBoost JSON documents.

mod columns;
mod forest;
mod predictor;
mod registry;
mod tree;
pub mod xgboost;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use columns::{FeatureColumn, FeatureColumns, MAX_LAG_DAYS};
pub use forest::{Forest, OutputTransform, DEFAULT_BLOCK_SIZE};
pub use predictor::{PointPredictor, TreeModel};
pub use registry::ModelRegistry;
pub use tree::{MutableTree, NodeId, Tree, TreeValidationError};

/// Errors raised while resolving or loading a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot convert model '{}': {source}", .path.display())]
    Conversion {
        path: PathBuf,
        #[source]
        source: xgboost::ConversionError,
    },

    #[error("model '{}' declares no feature names", .0.display())]
    MissingFeatureNames(PathBuf),

    #[error("invalid feature column name '{0}'")]
    InvalidFeatureName(String),

    #[error("model path '{}' is not valid UTF-8", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("unknown model '{spec}', expected one of {known} or an existing model file")]
    UnknownModel { spec: String, known: String },
}

/// Reference to a model: a registered name or a file path.
///
/// Only the specifier is serialized with algorithm parameters; the model
/// itself is reloaded from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSpec(String);

impl ModelSpec {
    pub fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelSpec {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ModelSpec {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl TryFrom<PathBuf> for ModelSpec {
    type Error = ModelError;

    fn try_from(p: PathBuf) -> Result<Self, Self::Error> {
        p.into_os_string()
            .into_string()
            .map(Self)
            .map_err(|os| ModelError::NonUtf8Path(os.into()))
    }
}

impl TryFrom<&Path> for ModelSpec {
    type Error = ModelError;

    fn try_from(p: &Path) -> Result<Self, Self::Error> {
        p.to_str()
            .map(Self::new)
            .ok_or_else(|| ModelError::NonUtf8Path(p.to_path_buf()))
    }
}

/// Materializes models from specifiers.
pub trait ModelLoader: Send + Sync {
    fn load(&self, spec: &ModelSpec) -> Result<Arc<dyn PointPredictor>, ModelError>;
}

/// Loads XGBoost JSON model files, resolving registered names first.
#[derive(Debug, Clone, Default)]
pub struct FileModelLoader {
    registry: ModelRegistry,
}

impl FileModelLoader {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    #[inline]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// File a specifier refers to.
    pub fn resolve(&self, spec: &ModelSpec) -> Result<PathBuf, ModelError> {
        if let Some(file) = self.registry.file(spec.as_str()) {
            return Ok(file.to_path_buf());
        }
        let path = PathBuf::from(spec.as_str());
        if path.is_file() {
            Ok(path)
        } else {
            Err(ModelError::UnknownModel {
                spec: spec.to_string(),
                known: self.registry.to_string(),
            })
        }
    }
}

impl ModelLoader for FileModelLoader {
    fn load(&self, spec: &ModelSpec) -> Result<Arc<dyn PointPredictor>, ModelError> {
        let path = self.resolve(spec)?;
        let model = xgboost::load_model(&path)?;
        tracing::debug!(
            target: "wqf",
            model = %spec,
            path = %path.display(),
            "loaded forecast model"
        );
        Ok(Arc::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_paths_become_specs() {
        let spec = ModelSpec::try_from(Path::new("models/central.json")).unwrap();
        assert_eq!(spec.as_str(), "models/central.json");
        let spec = ModelSpec::try_from(PathBuf::from("coastal.json")).unwrap();
        assert_eq!(spec, ModelSpec::new("coastal.json"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_are_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"models/\xffcentral.json"));
        let err = ModelSpec::try_from(path).unwrap_err();
        assert!(matches!(err, ModelError::NonUtf8Path(ref p) if p == path));
        let err = ModelSpec::try_from(path.to_path_buf()).unwrap_err();
        assert!(matches!(err, ModelError::NonUtf8Path(ref p) if p == path));
    }
}
