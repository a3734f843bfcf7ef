//! Additive tree ensembles.

use ndarray::{Array1, ArrayView2, Axis};

use super::tree::Tree;
use crate::utils::Parallelism;

/// Rows predicted together.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Transform from the summed margin to the prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputTransform {
    #[default]
    Identity,
    /// `1 / (1 + exp(-x))`, logistic objectives.
    Sigmoid,
    /// `exp(x)`, log-link objectives.
    Exp,
}

impl OutputTransform {
    #[inline]
    pub fn apply(self, margin: f32) -> f32 {
        match self {
            OutputTransform::Identity => margin,
            OutputTransform::Sigmoid => 1.0 / (1.0 + (-margin).exp()),
            OutputTransform::Exp => margin.exp(),
        }
    }
}

/// Single-output tree ensemble.
///
/// The prediction for a row is
/// `transform(base_score + sum_i weight_i * tree_i(row))`, where all
/// weights are one unless DART weights were attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    trees: Vec<Tree>,
    tree_weights: Option<Box<[f32]>>,
    base_score: f32,
    transform: OutputTransform,
}

impl Forest {
    /// Empty forest predicting `base_score` (in margin space).
    pub fn new(base_score: f32) -> Self {
        Self {
            trees: Vec::new(),
            tree_weights: None,
            base_score,
            transform: OutputTransform::Identity,
        }
    }

    pub fn with_transform(mut self, transform: OutputTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Attach one weight per tree (DART).
    pub fn with_tree_weights(mut self, weights: Vec<f32>) -> Self {
        debug_assert_eq!(weights.len(), self.trees.len());
        self.tree_weights = Some(weights.into_boxed_slice());
        self
    }

    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    #[inline]
    pub fn transform(&self) -> OutputTransform {
        self.transform
    }

    pub fn tree_weights(&self) -> Option<&[f32]> {
        self.tree_weights.as_deref()
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Untransformed score for one row.
    pub fn predict_margin_row(&self, features: &[f32]) -> f32 {
        let sum: f32 = match &self.tree_weights {
            Some(w) => self
                .trees
                .iter()
                .zip(w.iter())
                .map(|(t, &w)| w * t.predict_row(features))
                .sum(),
            None => self.trees.iter().map(|t| t.predict_row(features)).sum(),
        };
        self.base_score + sum
    }

    /// Prediction for one row.
    #[inline]
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        self.transform.apply(self.predict_margin_row(features))
    }

    /// Predict every row of a `(n_rows, n_features)` table.
    ///
    /// Rows are processed in blocks of [`DEFAULT_BLOCK_SIZE`]; blocks run in
    /// parallel when `parallelism` allows.
    pub fn predict(&self, table: ArrayView2<'_, f32>, parallelism: Parallelism) -> Array1<f32> {
        let mut output = Array1::<f32>::zeros(table.nrows());
        let blocks = output
            .axis_chunks_iter_mut(Axis(0), DEFAULT_BLOCK_SIZE)
            .zip(table.axis_chunks_iter(Axis(0), DEFAULT_BLOCK_SIZE));

        parallelism.maybe_par_bridge_for_each(blocks, |(mut out, rows)| {
            let mut buf = Vec::with_capacity(rows.ncols());
            for (row, y) in rows.outer_iter().zip(out.iter_mut()) {
                let features: &[f32] = match row.as_slice() {
                    Some(s) => s,
                    None => {
                        buf.clear();
                        buf.extend(row.iter().copied());
                        &buf
                    }
                };
                *y = self.predict_row(features);
            }
        });
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn stump(threshold: f32, left: f32, right: f32) -> Tree {
        crate::scalar_tree! {
            0 => num(0, threshold, L) -> 1, 2,
            1 => leaf(left),
            2 => leaf(right),
        }
    }

    #[test]
    fn sums_trees_and_base_score() {
        let mut forest = Forest::new(0.5);
        forest.push_tree(stump(1.0, 1.0, 2.0));
        forest.push_tree(stump(2.0, 10.0, 20.0));

        assert_eq!(forest.predict_row(&[0.0]), 11.5);
        assert_eq!(forest.predict_row(&[1.5]), 12.5);
        assert_eq!(forest.predict_row(&[3.0]), 22.5);
    }

    #[test]
    fn dart_weights_scale_trees() {
        let mut forest = Forest::new(0.0);
        forest.push_tree(stump(1.0, 1.0, 2.0));
        forest.push_tree(stump(1.0, 1.0, 2.0));
        let forest = forest.with_tree_weights(vec![0.5, 0.25]);

        assert_eq!(forest.predict_row(&[0.0]), 0.75);
    }

    #[test]
    fn transforms_apply_to_margin() {
        let forest = Forest::new(0.0).with_transform(OutputTransform::Sigmoid);
        assert_abs_diff_eq!(forest.predict_row(&[]), 0.5);

        let forest = Forest::new(1.0).with_transform(OutputTransform::Exp);
        assert_abs_diff_eq!(forest.predict_row(&[]), std::f32::consts::E, epsilon = 1e-6);
    }

    #[test]
    fn batch_matches_row_prediction() {
        let mut forest = Forest::new(0.0);
        forest.push_tree(stump(50.0, -1.0, 1.0));
        let table = Array2::from_shape_fn((200, 2), |(r, c)| (r + c) as f32);

        for parallelism in [Parallelism::Sequential, Parallelism::Parallel] {
            let out = forest.predict(table.view(), parallelism);
            assert_eq!(out.len(), 200);
            for (r, &v) in out.iter().enumerate() {
                assert_eq!(v, forest.predict_row(&[r as f32, r as f32 + 1.0]));
            }
        }
    }

    #[test]
    fn batch_handles_non_contiguous_rows() {
        let mut forest = Forest::new(0.0);
        forest.push_tree(stump(5.0, -1.0, 1.0));
        let table = Array2::from_shape_fn((2, 10), |(r, c)| (r * 10 + c) as f32);

        // transposed view: rows are strided columns of the original
        let out = forest.predict(table.t(), Parallelism::Sequential);
        assert_eq!(out.to_vec()[..6], [-1.0, -1.0, -1.0, -1.0, -1.0, 1.0]);
    }
}
