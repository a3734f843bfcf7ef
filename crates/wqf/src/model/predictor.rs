//! Point predictors over named feature columns.

use std::fmt::Debug;

use ndarray::{Array1, ArrayView2};

use super::forest::Forest;
use crate::utils::Parallelism;

/// A loaded model that predicts one value per table row.
///
/// Implementations are immutable once loaded and shared read-only between
/// concurrently processed blocks.
pub trait PointPredictor: Send + Sync + Debug {
    /// Declared feature names, in table column order.
    fn feature_names(&self) -> &[String];

    /// Predict one value per row of a `(n_rows, feature_names().len())` table.
    fn predict(&self, table: ArrayView2<'_, f32>, parallelism: Parallelism) -> Array1<f32>;
}

/// A tree ensemble together with its declared feature names.
#[derive(Debug, Clone)]
pub struct TreeModel {
    feature_names: Vec<String>,
    forest: Forest,
}

impl TreeModel {
    pub fn new(feature_names: Vec<String>, forest: Forest) -> Self {
        Self {
            feature_names,
            forest,
        }
    }

    #[inline]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }
}

impl PointPredictor for TreeModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, table: ArrayView2<'_, f32>, parallelism: Parallelism) -> Array1<f32> {
        self.forest.predict(table, parallelism)
    }
}
