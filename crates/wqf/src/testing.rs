//! Test helpers shared by unit tests, integration tests and benches.
//!
//! Builders for small data cubes, synthetic datasets, closure-backed models
//! and minimal XGBoost JSON documents.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Array3, ArrayView2};
use serde_json::{json, Value};

use crate::algorithms::Forecast;
use crate::block::AlgorithmError;
use crate::constants::{DID_LAT, DID_LON, DID_TIM, VID_CHL, VID_LAT, VID_LON, VID_NO3, VID_TIM};
use crate::data::{BuilderError, ChunkedArray, Dataset, DatasetBuilder};
use crate::model::{ModelError, ModelLoader, ModelSpec, PointPredictor};
use crate::utils::Parallelism;

/// Build a [`Tree`](crate::model::Tree) from a node listing.
///
/// ```
/// let tree = wqf::scalar_tree! {
///     0 => num(0, 0.5, L) -> 1, 2,
///     1 => leaf(1.0),
///     2 => leaf(2.0),
/// };
/// assert_eq!(tree.predict_row(&[0.2]), 1.0);
/// assert_eq!(tree.predict_row(&[f32::NAN]), 1.0);
/// ```
///
/// `L` and `R` give the side taken by missing values.
///
/// # Panics
///
/// Panics if the listing does not describe a valid tree.
#[macro_export]
macro_rules! scalar_tree {
    ($($node:literal => $kind:ident ( $($arg:tt)* ) $(-> $left:literal, $right:literal)?),* $(,)?) => {{
        let mut tree = $crate::model::MutableTree::with_n_nodes(0 $(+ { let _ = $node; 1 })*);
        $( $crate::scalar_tree!(@node tree, $node, $kind ( $($arg)* ) $(-> $left, $right)?); )*
        tree.freeze().expect("invalid tree listing")
    }};
    (@node $tree:ident, $node:literal, leaf ($value:expr)) => {
        $tree.make_leaf($node, $value);
    };
    (@node $tree:ident, $node:literal, num ($feature:expr, $threshold:expr, L) -> $left:literal, $right:literal) => {
        $tree.set_numeric_split($node, $feature, $threshold, true, $left, $right);
    };
    (@node $tree:ident, $node:literal, num ($feature:expr, $threshold:expr, R) -> $left:literal, $right:literal) => {
        $tree.set_numeric_split($node, $feature, $threshold, false, $left, $right);
    };
}

/// A `(days, ny, nx)` cube filled from `f(t, i, j)`.
pub fn cube(
    days: usize,
    ny: usize,
    nx: usize,
    f: impl Fn(usize, usize, usize) -> f32,
) -> Array3<f32> {
    Array3::from_shape_fn((days, ny, nx), |(t, i, j)| f(t, i, j))
}

/// Forecast one whole-array block holding only `chl` and `no3`.
pub fn forecast_chl_no3(
    f: &Forecast,
    chl: &Array3<f32>,
    no3: &Array3<f32>,
) -> Result<Array3<f32>, AlgorithmError> {
    f.forecast(&[chl.view(), no3.view()], &[VID_CHL, VID_NO3])
}

/// A dataset with `time`, `lat` and `lon` coordinates and `chl` and `no3`
/// data variables, all chunked by `chunk` along `(time, lat, lon)`.
///
/// Time is in days since the epoch, starting at `0`.
pub fn synthetic_dataset(
    chl: Array3<f32>,
    no3: Array3<f32>,
    chunk: [usize; 3],
) -> Result<Dataset, BuilderError> {
    let (days, ny, nx) = chl.dim();
    let time = Array1::from_iter((0..days).map(|t| t as i64)).into_dyn();
    let lat = Array1::from_iter((0..ny).map(|i| 50.0 + 0.25 * i as f64)).into_dyn();
    let lon = Array1::from_iter((0..nx).map(|j| 5.0 + 0.25 * j as f64)).into_dyn();

    let mut builder = DatasetBuilder::new();
    builder.add_attr("title", "synthetic");
    builder
        .declare_dimension_chunked(DID_TIM, days, chunk[0])?
        .declare_dimension_chunked(DID_LAT, ny, chunk[1])?
        .declare_dimension_chunked(DID_LON, nx, chunk[2])?;
    builder
        .declare_variable(VID_TIM, &[DID_TIM])?
        .declare_variable(VID_LAT, &[DID_LAT])?
        .declare_variable(VID_LON, &[DID_LON])?
        .declare_variable(VID_CHL, &[DID_TIM, DID_LAT, DID_LON])?
        .declare_variable(VID_NO3, &[DID_TIM, DID_LAT, DID_LON])?;
    builder
        .bind_array(VID_TIM, ChunkedArray::new(time, &[chunk[0]]))?
        .bind_array(VID_LAT, ChunkedArray::new(lat, &[chunk[1]]))?
        .bind_array(VID_LON, ChunkedArray::new(lon, &[chunk[2]]))?
        .bind_array(VID_CHL, ChunkedArray::new(chl.into_dyn(), &chunk))?
        .bind_array(VID_NO3, ChunkedArray::new(no3.into_dyn(), &chunk))?;
    Ok(builder.build())
}

type RowFn = dyn Fn(&[f32]) -> f32 + Send + Sync;

/// A [`PointPredictor`] computing each row with a closure.
pub struct ClosureModel {
    feature_names: Vec<String>,
    f: Box<RowFn>,
}

impl ClosureModel {
    pub fn new(feature_names: &[&str], f: impl Fn(&[f32]) -> f32 + Send + Sync + 'static) -> Self {
        Self {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            f: Box::new(f),
        }
    }
}

impl fmt::Debug for ClosureModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureModel")
            .field("feature_names", &self.feature_names)
            .finish_non_exhaustive()
    }
}

impl PointPredictor for ClosureModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, table: ArrayView2<'_, f32>, _parallelism: Parallelism) -> Array1<f32> {
        table
            .rows()
            .into_iter()
            .map(|row| (self.f)(&row.to_vec()))
            .collect()
    }
}

/// A [`ModelLoader`] that hands out the same model for every specifier.
#[derive(Debug, Clone)]
pub struct ClosureLoader {
    model: Arc<dyn PointPredictor>,
}

impl ClosureLoader {
    pub fn new(model: impl PointPredictor + 'static) -> Self {
        Self {
            model: Arc::new(model),
        }
    }
}

impl ModelLoader for ClosureLoader {
    fn load(&self, _spec: &ModelSpec) -> Result<Arc<dyn PointPredictor>, ModelError> {
        Ok(Arc::clone(&self.model))
    }
}

/// A minimal XGBoost JSON model document with a `gbtree` booster.
pub fn xgb_model_json(
    feature_names: &[&str],
    objective: &str,
    base_score: f32,
    trees: Vec<Value>,
) -> Value {
    let n_trees = trees.len();
    json!({
        "version": [2, 0, 3],
        "learner": {
            "attributes": {},
            "feature_names": feature_names,
            "feature_types": vec!["float"; feature_names.len()],
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "gbtree_model_param": {
                        "num_parallel_tree": "1",
                        "num_trees": n_trees.to_string()
                    },
                    "iteration_indptr": (0..=n_trees).collect::<Vec<_>>(),
                    "tree_info": vec![0; n_trees],
                    "trees": trees
                }
            },
            "learner_model_param": {
                "base_score": format!("[{base_score:E}]"),
                "boost_from_average": "1",
                "num_class": "0",
                "num_feature": feature_names.len().to_string(),
                "num_target": "1"
            },
            "objective": {"name": objective}
        }
    })
}

/// A single-split XGBoost tree: `feature < threshold` goes left, missing
/// values go left.
pub fn stump_tree_json(feature: i32, threshold: f32, left: f32, right: f32) -> Value {
    json!({
        "base_weights": [0.0, left, right],
        "categories": [],
        "categories_nodes": [],
        "categories_segments": [],
        "categories_sizes": [],
        "default_left": [1, 0, 0],
        "id": 0,
        "left_children": [1, -1, -1],
        "loss_changes": [1.0, 0.0, 0.0],
        "parents": [2147483647, 0, 0],
        "right_children": [2, -1, -1],
        "split_conditions": [threshold, left, right],
        "split_indices": [feature, 0, 0],
        "split_type": [0, 0, 0],
        "sum_hessian": [2.0, 1.0, 1.0],
        "tree_param": {
            "num_deleted": "0",
            "num_feature": (feature + 1).to_string(),
            "num_nodes": "3",
            "size_leaf_vector": "1"
        }
    })
}
