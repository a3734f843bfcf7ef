//! Conversion from XGBoost JSON types to native forests.

use super::json::{GradientBooster, Tree as XgbTree, XgbModel};
use crate::model::forest::{Forest, OutputTransform};
use crate::model::tree::{MutableTree, Tree, TreeValidationError};

/// Failures turning an XGBoost document into a [`Forest`].
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("gblinear boosters are not supported")]
    LinearBooster,

    #[error("multi-output models are not supported ({n_outputs} outputs)")]
    MultiOutput { n_outputs: i64 },

    #[error("objective '{0}' is not supported")]
    UnsupportedObjective(String),

    #[error("tree {tree} node {node} has a categorical split")]
    CategoricalSplit { tree: usize, node: usize },

    #[error("tree {tree} has vector leaves of size {size}")]
    VectorLeaf { tree: usize, size: i64 },

    #[error("tree {tree}: array '{field}' has {len} entries but tree has {n_nodes} nodes")]
    NodeArrayLenMismatch {
        tree: usize,
        field: &'static str,
        len: usize,
        n_nodes: usize,
    },

    #[error(
        "invalid node index in tree {tree}: node {node} references child {child} but tree has {n_nodes} nodes"
    )]
    InvalidNodeIndex {
        tree: usize,
        node: usize,
        child: i32,
        n_nodes: usize,
    },

    #[error("tree {tree} is malformed: {source}")]
    InvalidTree {
        tree: usize,
        #[source]
        source: TreeValidationError,
    },

    #[error("dart booster has {n_weights} weights for {n_trees} trees")]
    DartWeightsMismatch { n_weights: usize, n_trees: usize },
}

/// Map `base_score` into the raw score space of `objective`.
///
/// XGBoost stores base_score in the output space of the objective, while
/// trees sum in margin space.
fn prob_to_margin(base_score: f32, objective: &str) -> f32 {
    match objective {
        "binary:logistic" | "reg:logistic" => {
            let p = base_score.clamp(1e-7, 1.0 - 1e-7);
            (p / (1.0 - p)).ln()
        }
        "reg:gamma" | "reg:tweedie" | "count:poisson" => base_score.max(1e-7).ln(),
        _ => base_score,
    }
}

fn output_transform(objective: &str) -> Option<OutputTransform> {
    match objective {
        "reg:squarederror" | "reg:linear" | "reg:pseudohubererror" | "reg:squaredlogerror"
        | "reg:absoluteerror" | "reg:quantileerror" | "binary:logitraw" => {
            Some(OutputTransform::Identity)
        }
        "binary:logistic" | "reg:logistic" => Some(OutputTransform::Sigmoid),
        "reg:gamma" | "reg:tweedie" | "count:poisson" => Some(OutputTransform::Exp),
        _ => None,
    }
}

impl XgbModel {
    /// Whether the booster is `dart`.
    pub fn is_dart(&self) -> bool {
        matches!(&self.learner.gradient_booster, GradientBooster::Dart { .. })
    }

    /// Convert to a native single-output [`Forest`].
    ///
    /// Supports `gbtree` and `dart` boosters with numeric splits and scalar
    /// leaves.
    pub fn to_forest(&self) -> Result<Forest, ConversionError> {
        let (model_trees, weights) = match &self.learner.gradient_booster {
            GradientBooster::Gbtree { model } => (model, None),
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => (&gbtree.model, Some(weight_drop)),
            GradientBooster::Gblinear {} => return Err(ConversionError::LinearBooster),
        };

        let param = &self.learner.learner_model_param;
        if param.n_class > 1 || param.num_target > 1 {
            return Err(ConversionError::MultiOutput {
                n_outputs: param.n_class.max(param.num_target),
            });
        }

        let objective = self.learner.objective.name.as_str();
        let transform = output_transform(objective)
            .ok_or_else(|| ConversionError::UnsupportedObjective(objective.to_string()))?;
        let base_score = prob_to_margin(param.base_score, objective);

        let mut forest = Forest::new(base_score).with_transform(transform);
        for (tree_idx, xgb_tree) in model_trees.trees.iter().enumerate() {
            forest.push_tree(convert_tree(xgb_tree, tree_idx)?);
        }

        if let Some(weights) = weights {
            if weights.len() != forest.n_trees() {
                return Err(ConversionError::DartWeightsMismatch {
                    n_weights: weights.len(),
                    n_trees: forest.n_trees(),
                });
            }
            forest = forest.with_tree_weights(weights.clone());
        }
        Ok(forest)
    }
}

/// Convert a single XGBoost tree to a native [`Tree`].
fn convert_tree(xgb_tree: &XgbTree, tree_idx: usize) -> Result<Tree, ConversionError> {
    let size = xgb_tree.tree_param.size_leaf_vector;
    if size > 1 {
        return Err(ConversionError::VectorLeaf { tree: tree_idx, size });
    }

    let n_nodes = usize::try_from(xgb_tree.tree_param.num_nodes).unwrap_or(0);
    let check = |field: &'static str, len: usize| {
        if len == n_nodes {
            Ok(())
        } else {
            Err(ConversionError::NodeArrayLenMismatch {
                tree: tree_idx,
                field,
                len,
                n_nodes,
            })
        }
    };
    check("left_children", xgb_tree.left_children.len())?;
    check("right_children", xgb_tree.right_children.len())?;
    check("split_indices", xgb_tree.split_indices.len())?;
    check("split_conditions", xgb_tree.split_conditions.len())?;
    check("default_left", xgb_tree.default_left.len())?;
    check("base_weights", xgb_tree.base_weights.len())?;

    let mut tree = MutableTree::with_n_nodes(n_nodes);

    // XGBoost marks leaves with left_child == -1; the leaf value is stored
    // in split_conditions.
    for node_idx in 0..n_nodes {
        let left_child = xgb_tree.left_children[node_idx];
        let right_child = xgb_tree.right_children[node_idx];

        if left_child == -1 {
            tree.make_leaf(node_idx as u32, xgb_tree.split_conditions[node_idx]);
            continue;
        }

        if xgb_tree.split_type.get(node_idx).copied().unwrap_or(0) == 1 {
            return Err(ConversionError::CategoricalSplit {
                tree: tree_idx,
                node: node_idx,
            });
        }

        for child in [left_child, right_child] {
            if child < 0 || child as usize >= n_nodes {
                return Err(ConversionError::InvalidNodeIndex {
                    tree: tree_idx,
                    node: node_idx,
                    child,
                    n_nodes,
                });
            }
        }

        tree.set_numeric_split(
            node_idx as u32,
            xgb_tree.split_indices[node_idx] as u32,
            xgb_tree.split_conditions[node_idx],
            xgb_tree.default_left[node_idx] != 0,
            left_child as u32,
            right_child as u32,
        );
    }

    tree.freeze().map_err(|source| ConversionError::InvalidTree {
        tree: tree_idx,
        source,
    })
}
