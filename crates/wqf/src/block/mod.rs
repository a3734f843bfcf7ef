//! Chunk-wise algorithms and their execution.
//!
//! A [`BlockAlgorithm`] computes one output block from the co-located blocks
//! of its inputs. Before anything runs, it declares how block shapes change
//! ([`BlockAlgorithm::output_chunk_shape`] and the axis sets), and
//! [`ChunkGeometry::resolve`] checks that declaration against the input
//! chunking. [`BlockEngine`] then runs the blocks and assembles the result.
//!
//! Axis vocabulary (see [`AxisRole`]):
//!
//! - *preserved*: output blocks have the input block sizes,
//! - *resized*: every output block has the declared size, computed by the
//!   algorithm from its configuration and the input chunk shape,
//! - *dropped*: the axis does not exist in the output,
//! - *created*: an output axis without an input counterpart.

mod engine;
mod geometry;

use std::collections::BTreeSet;

use ndarray::{ArrayD, ArrayViewD};

use crate::data::{ChunkLayout, DType};

pub use engine::{BlockEngine, BlockError, BlockPlan};
pub use geometry::{AxisRole, ChunkGeometry, GeometryError};

/// Errors raised by [`BlockAlgorithm::compute_block`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlgorithmError {
    #[error("missing input feature '{0}'")]
    MissingFeature(String),

    #[error("insufficient history: {required} days required, {available} available")]
    InsufficientHistory { required: usize, available: usize },

    #[error("expected {expected} input blocks, got {actual}")]
    InputCountMismatch { expected: usize, actual: usize },

    #[error("input '{name}' has {actual} dimensions, expected {expected}")]
    InputRankMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("input '{name}' has shape {actual:?}, expected {expected:?}")]
    InputShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// A computation applied independently to each block of its inputs.
///
/// Implementations must be pure: `compute_block` may run for any block, in
/// any order, concurrently with other blocks.
pub trait BlockAlgorithm: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Element type of the assembled output.
    fn dtype(&self) -> DType;

    /// Shape of one output block given the layouts of the inputs.
    ///
    /// `None` keeps the input chunk shape.
    fn output_chunk_shape(&self, inputs: &[&ChunkLayout]) -> Option<Vec<usize>> {
        let _ = inputs;
        None
    }

    /// Output axes without an input counterpart.
    fn created_axes(&self) -> BTreeSet<usize> {
        BTreeSet::new()
    }

    /// Input axes absent from the output.
    fn dropped_axes(&self) -> BTreeSet<usize> {
        BTreeSet::new()
    }

    /// Input axes whose block length is given by `output_chunk_shape`.
    fn resized_axes(&self) -> BTreeSet<usize> {
        BTreeSet::new()
    }

    /// Halo depth per input axis. Each block is extended by this many
    /// elements on both sides (NaN beyond the array edge) before
    /// `compute_block` runs, and the result is trimmed back. Empty means no
    /// halo.
    fn overlap(&self) -> Vec<usize> {
        Vec::new()
    }

    /// Compute one output block from the co-located input blocks, named by
    /// `names`.
    fn compute_block(
        &self,
        inputs: &[ArrayViewD<'_, f32>],
        names: &[&str],
    ) -> Result<ArrayD<f32>, AlgorithmError>;
}
