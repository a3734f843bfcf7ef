//! XGBoost JSON model format support.
//!
//! Parses XGBoost JSON documents and converts them to native
//! [`TreeModel`]s.

mod convert;
mod json;

use std::path::Path;

pub use convert::ConversionError;
pub use json::XgbModel;

use super::{ModelError, TreeModel};

impl XgbModel {
    /// Parse a model from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| ModelError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Convert to a [`TreeModel`] carrying the declared feature names.
    pub fn to_tree_model(&self) -> Result<TreeModel, ConversionError> {
        let forest = self.to_forest()?;
        Ok(TreeModel::new(self.learner.feature_names.clone(), forest))
    }
}

/// Load an XGBoost JSON model file.
///
/// # Errors
///
/// Fails if the file cannot be read or parsed, if the booster cannot be
/// represented as a single-output tree ensemble, or if the model declares
/// no feature names.
pub fn load_model(path: impl AsRef<Path>) -> Result<TreeModel, ModelError> {
    let path = path.as_ref();
    let model = XgbModel::from_file(path)?;
    if model.learner.feature_names.is_empty() {
        return Err(ModelError::MissingFeatureNames(path.to_path_buf()));
    }
    model.to_tree_model().map_err(|source| ModelError::Conversion {
        path: path.to_path_buf(),
        source,
    })
}
