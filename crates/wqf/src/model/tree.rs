//! Structure-of-arrays decision trees.
//!
//! - [`Tree`]: immutable storage used for prediction.
//! - [`MutableTree`]: node-by-node construction, validated by
//!   [`MutableTree::freeze`].

/// Node index local to one tree (0 = root).
pub type NodeId = u32;

/// Reasons a node listing is not a well-formed [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,

    #[error("node {node} has {side} child {child} but tree has {n_nodes} nodes")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },

    #[error("node {node} references itself as a child")]
    SelfLoop { node: NodeId },

    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },

    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },

    #[error("node {node} was never defined")]
    UndefinedNode { node: NodeId },
}

/// Immutable tree with numeric splits and scalar leaves.
///
/// A split sends a sample left when `value < threshold`. Missing values
/// (NaN) follow the node's default direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[NodeId]>,
    right_children: Box<[NodeId]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f32]>,
}

impl Tree {
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> f32 {
        self.leaf_values[node as usize]
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    /// Largest feature index used by any split, if the tree has splits.
    pub fn max_split_index(&self) -> Option<u32> {
        (0..self.n_nodes())
            .filter(|&i| !self.is_leaf[i])
            .map(|i| self.split_indices[i])
            .max()
    }

    /// Walk from the root to the leaf reached by `features`.
    ///
    /// Features beyond the end of the slice are treated as missing.
    #[inline]
    pub fn traverse_to_leaf(&self, features: &[f32]) -> NodeId {
        let mut node: NodeId = 0;
        while !self.is_leaf(node) {
            let i = node as usize;
            let value = features
                .get(self.split_indices[i] as usize)
                .copied()
                .unwrap_or(f32::NAN);
            let go_left = if value.is_nan() {
                self.default_left[i]
            } else {
                value < self.split_thresholds[i]
            };
            node = if go_left {
                self.left_children[i]
            } else {
                self.right_children[i]
            };
        }
        node
    }

    /// Leaf value reached by `features`.
    #[inline]
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        self.leaf_value(self.traverse_to_leaf(features))
    }

    /// Check that every node is reachable from the root along exactly one
    /// path and that all child indices are in bounds.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        let mut visited = vec![false; n_nodes];
        let mut stack: Vec<NodeId> = vec![0];
        while let Some(node) = stack.pop() {
            let i = node as usize;
            if visited[i] {
                return Err(TreeValidationError::DuplicateVisit { node });
            }
            visited[i] = true;
            if self.is_leaf[i] {
                continue;
            }
            let children = [
                ("left", self.left_children[i]),
                ("right", self.right_children[i]),
            ];
            for (side, child) in children {
                if child == node {
                    return Err(TreeValidationError::SelfLoop { node });
                }
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes,
                    });
                }
                stack.push(child);
            }
        }

        match visited.iter().position(|&v| !v) {
            Some(i) => Err(TreeValidationError::UnreachableNode { node: i as NodeId }),
            None => Ok(()),
        }
    }
}

/// Tree under construction.
///
/// Nodes are allocated up front with [`with_n_nodes`](Self::with_n_nodes)
/// and defined one at a time, in any order.
#[derive(Debug, Clone, Default)]
pub struct MutableTree {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<NodeId>,
    right_children: Vec<NodeId>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f32>,
    defined: Vec<bool>,
}

impl MutableTree {
    /// Allocate `n_nodes` undefined nodes.
    pub fn with_n_nodes(n_nodes: usize) -> Self {
        Self {
            split_indices: vec![0; n_nodes],
            split_thresholds: vec![0.0; n_nodes],
            left_children: vec![0; n_nodes],
            right_children: vec![0; n_nodes],
            default_left: vec![false; n_nodes],
            is_leaf: vec![true; n_nodes],
            leaf_values: vec![0.0; n_nodes],
            defined: vec![false; n_nodes],
        }
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Define `node` as a leaf.
    ///
    /// # Panics
    ///
    /// Panics if `node` was not allocated.
    pub fn make_leaf(&mut self, node: NodeId, value: f32) -> &mut Self {
        let i = node as usize;
        self.is_leaf[i] = true;
        self.leaf_values[i] = value;
        self.defined[i] = true;
        self
    }

    /// Define `node` as a numeric split on `feature < threshold`.
    ///
    /// # Panics
    ///
    /// Panics if `node` was not allocated.
    pub fn set_numeric_split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f32,
        default_left: bool,
        left: NodeId,
        right: NodeId,
    ) -> &mut Self {
        let i = node as usize;
        self.is_leaf[i] = false;
        self.split_indices[i] = feature;
        self.split_thresholds[i] = threshold;
        self.default_left[i] = default_left;
        self.left_children[i] = left;
        self.right_children[i] = right;
        self.defined[i] = true;
        self
    }

    /// Finish construction.
    pub fn freeze(self) -> Result<Tree, TreeValidationError> {
        if let Some(i) = self.defined.iter().position(|&d| !d) {
            return Err(TreeValidationError::UndefinedNode { node: i as NodeId });
        }
        let tree = Tree {
            split_indices: self.split_indices.into_boxed_slice(),
            split_thresholds: self.split_thresholds.into_boxed_slice(),
            left_children: self.left_children.into_boxed_slice(),
            right_children: self.right_children.into_boxed_slice(),
            default_left: self.default_left.into_boxed_slice(),
            is_leaf: self.is_leaf.into_boxed_slice(),
            leaf_values: self.leaf_values.into_boxed_slice(),
        };
        tree.validate()?;
        Ok(tree)
    }
}
