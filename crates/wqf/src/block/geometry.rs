//! Static validation of block shapes.

use std::collections::BTreeSet;

use super::BlockAlgorithm;
use crate::data::ChunkLayout;

/// Declared output block geometry disagrees with the input chunking.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("{algorithm}: no inputs")]
    NoInputs { algorithm: String },

    #[error("{algorithm}: input {index} has chunks {actual:?}, input 0 has {expected:?}")]
    InputLayoutMismatch {
        algorithm: String,
        index: usize,
        expected: Vec<Vec<usize>>,
        actual: Vec<Vec<usize>>,
    },

    #[error("{algorithm}: axis {axis} is declared as more than one of resized, dropped")]
    ConflictingAxisRoles { algorithm: String, axis: usize },

    #[error("{algorithm}: axis {axis} is out of range for {ndim} dimensions")]
    AxisOutOfRange {
        algorithm: String,
        axis: usize,
        ndim: usize,
    },

    #[error("{algorithm}: resized or created axes need a declared output chunk shape")]
    MissingOutputShape { algorithm: String },

    #[error("{algorithm}: output chunk shape has {actual} axes, expected {expected}")]
    RankMismatch {
        algorithm: String,
        expected: usize,
        actual: usize,
    },

    #[error("{algorithm}: preserved axis {axis} has chunk size {input}, output declares {output}")]
    PreservedAxisMismatch {
        algorithm: String,
        axis: usize,
        input: usize,
        output: usize,
    },

    #[error("{algorithm}: resized axis {axis} has chunks of differing sizes {chunks:?}")]
    NonUniformResizedAxis {
        algorithm: String,
        axis: usize,
        chunks: Vec<usize>,
    },

    #[error("{algorithm}: output axis {axis} has zero-sized blocks")]
    EmptyOutputChunk { algorithm: String, axis: usize },

    #[error("{algorithm}: dropped axis {axis} spans {n_blocks} chunks")]
    DroppedAxisChunked {
        algorithm: String,
        axis: usize,
        n_blocks: usize,
    },

    #[error("{algorithm}: overlap on axis {axis} which is not preserved")]
    OverlapOnNonPreservedAxis { algorithm: String, axis: usize },
}

/// What happens to an input axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    /// Output blocks keep the input block sizes.
    Preserved,
    /// Output blocks all have the given size.
    Resized(usize),
    /// The axis is removed.
    Dropped,
}

/// Resolved input and output block layout of one algorithm application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkGeometry {
    input: ChunkLayout,
    output: ChunkLayout,
    roles: Vec<AxisRole>,
    /// Input axis of each output axis; `None` for created axes.
    sources: Vec<Option<usize>>,
    overlap: Vec<usize>,
}

impl ChunkGeometry {
    /// Derive the output layout of `algorithm` applied to inputs laid out
    /// as `inputs`, without touching any data.
    ///
    /// # Errors
    ///
    /// Any inconsistency between the algorithm's declaration and the input
    /// chunking is reported here, before a block runs.
    pub fn resolve<A: BlockAlgorithm + ?Sized>(
        algorithm: &A,
        inputs: &[&ChunkLayout],
    ) -> Result<Self, GeometryError> {
        let name = || algorithm.name().to_string();

        let Some(&first) = inputs.first() else {
            return Err(GeometryError::NoInputs { algorithm: name() });
        };
        for (index, layout) in inputs.iter().enumerate().skip(1) {
            if *layout != first {
                return Err(GeometryError::InputLayoutMismatch {
                    algorithm: name(),
                    index,
                    expected: first.all_chunks().to_vec(),
                    actual: layout.all_chunks().to_vec(),
                });
            }
        }

        let ndim = first.ndim();
        let created = algorithm.created_axes();
        let dropped = algorithm.dropped_axes();
        let resized = algorithm.resized_axes();
        for &axis in dropped.iter().chain(&resized) {
            if axis >= ndim {
                return Err(GeometryError::AxisOutOfRange {
                    algorithm: name(),
                    axis,
                    ndim,
                });
            }
        }
        if let Some(&axis) = dropped.intersection(&resized).next() {
            return Err(GeometryError::ConflictingAxisRoles {
                algorithm: name(),
                axis,
            });
        }

        let out_ndim = ndim - dropped.len() + created.len();
        if let Some(&axis) = created.iter().find(|&&a| a >= out_ndim) {
            return Err(GeometryError::AxisOutOfRange {
                algorithm: name(),
                axis,
                ndim: out_ndim,
            });
        }

        let in_chunk = first.chunk_shape();
        let declared = match algorithm.output_chunk_shape(inputs) {
            Some(shape) => shape,
            None if created.is_empty() && resized.is_empty() => (0..ndim)
                .filter(|a| !dropped.contains(a))
                .map(|a| in_chunk[a])
                .collect(),
            None => return Err(GeometryError::MissingOutputShape { algorithm: name() }),
        };
        if declared.len() != out_ndim {
            return Err(GeometryError::RankMismatch {
                algorithm: name(),
                expected: out_ndim,
                actual: declared.len(),
            });
        }

        let sources = output_sources(ndim, out_ndim, &created, &dropped);

        let mut roles = vec![AxisRole::Preserved; ndim];
        let mut out_chunks = Vec::with_capacity(out_ndim);
        for (out_axis, source) in sources.iter().enumerate() {
            let size = declared[out_axis];
            let Some(axis) = *source else {
                if size == 0 {
                    return Err(GeometryError::EmptyOutputChunk {
                        algorithm: name(),
                        axis: out_axis,
                    });
                }
                out_chunks.push(vec![size]);
                continue;
            };
            if resized.contains(&axis) {
                if !first.is_uniform(axis) {
                    return Err(GeometryError::NonUniformResizedAxis {
                        algorithm: name(),
                        axis,
                        chunks: first.chunks(axis).to_vec(),
                    });
                }
                if size == 0 {
                    return Err(GeometryError::EmptyOutputChunk {
                        algorithm: name(),
                        axis: out_axis,
                    });
                }
                roles[axis] = AxisRole::Resized(size);
                out_chunks.push(vec![size; first.n_blocks(axis)]);
            } else {
                if size != in_chunk[axis] {
                    return Err(GeometryError::PreservedAxisMismatch {
                        algorithm: name(),
                        axis,
                        input: in_chunk[axis],
                        output: size,
                    });
                }
                out_chunks.push(first.chunks(axis).to_vec());
            }
        }

        for &axis in &dropped {
            if first.n_blocks(axis) > 1 {
                return Err(GeometryError::DroppedAxisChunked {
                    algorithm: name(),
                    axis,
                    n_blocks: first.n_blocks(axis),
                });
            }
            roles[axis] = AxisRole::Dropped;
        }

        let mut overlap = algorithm.overlap();
        if !overlap.is_empty() {
            overlap.resize(ndim, 0);
            for (axis, &depth) in overlap.iter().enumerate() {
                if depth > 0 && roles[axis] != AxisRole::Preserved {
                    return Err(GeometryError::OverlapOnNonPreservedAxis {
                        algorithm: name(),
                        axis,
                    });
                }
            }
        }

        // Chunks were checked to be non-empty above.
        let output =
            ChunkLayout::from_chunks(out_chunks).map_err(|_| GeometryError::EmptyOutputChunk {
                algorithm: name(),
                axis: 0,
            })?;

        Ok(Self {
            input: first.clone(),
            output,
            roles,
            sources,
            overlap,
        })
    }

    #[inline]
    pub fn input(&self) -> &ChunkLayout {
        &self.input
    }

    #[inline]
    pub fn output(&self) -> &ChunkLayout {
        &self.output
    }

    /// Role of each input axis.
    #[inline]
    pub fn roles(&self) -> &[AxisRole] {
        &self.roles
    }

    /// Halo depth per input axis (empty when there is none).
    #[inline]
    pub fn overlap(&self) -> &[usize] {
        &self.overlap
    }

    /// Whether blocks are extended by a halo.
    pub fn has_overlap(&self) -> bool {
        self.overlap.iter().any(|&d| d > 0)
    }

    /// Input axis feeding output axis `out_axis`; `None` for created axes.
    #[inline]
    pub fn source_axis(&self, out_axis: usize) -> Option<usize> {
        self.sources[out_axis]
    }

    /// Output axis fed by input axis `axis`; `None` for dropped axes.
    pub fn output_axis(&self, axis: usize) -> Option<usize> {
        self.sources.iter().position(|&s| s == Some(axis))
    }

    /// Number of blocks to compute.
    pub fn n_blocks(&self) -> usize {
        self.input.n_blocks_total()
    }
}

/// Input axis of each output axis: created axes take their declared
/// positions and the remaining positions take the kept input axes in order.
fn output_sources(
    ndim: usize,
    out_ndim: usize,
    created: &BTreeSet<usize>,
    dropped: &BTreeSet<usize>,
) -> Vec<Option<usize>> {
    let mut kept = (0..ndim).filter(|a| !dropped.contains(a));
    (0..out_ndim)
        .map(|out_axis| {
            if created.contains(&out_axis) {
                None
            } else {
                kept.next()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::AlgorithmError;
    use crate::data::DType;
    use ndarray::{ArrayD, ArrayViewD};

    /// Algorithm with a configurable declaration and no computation.
    #[derive(Default)]
    struct Declared {
        shape: Option<Vec<usize>>,
        created: BTreeSet<usize>,
        dropped: BTreeSet<usize>,
        resized: BTreeSet<usize>,
        overlap: Vec<usize>,
    }

    impl BlockAlgorithm for Declared {
        fn name(&self) -> &str {
            "declared"
        }
        fn dtype(&self) -> DType {
            DType::Float32
        }
        fn output_chunk_shape(&self, _inputs: &[&ChunkLayout]) -> Option<Vec<usize>> {
            self.shape.clone()
        }
        fn created_axes(&self) -> BTreeSet<usize> {
            self.created.clone()
        }
        fn dropped_axes(&self) -> BTreeSet<usize> {
            self.dropped.clone()
        }
        fn resized_axes(&self) -> BTreeSet<usize> {
            self.resized.clone()
        }
        fn overlap(&self) -> Vec<usize> {
            self.overlap.clone()
        }
        fn compute_block(
            &self,
            _inputs: &[ArrayViewD<'_, f32>],
            _names: &[&str],
        ) -> Result<ArrayD<f32>, AlgorithmError> {
            unreachable!()
        }
    }

    fn layout() -> ChunkLayout {
        ChunkLayout::regular(&[10, 4, 6], &[10, 2, 3])
    }

    #[test]
    fn default_geometry_copies_input() {
        let input = layout();
        let geom = ChunkGeometry::resolve(&Declared::default(), &[&input]).unwrap();
        assert_eq!(geom.output(), &input);
        assert_eq!(geom.roles(), &[AxisRole::Preserved; 3]);
        assert_eq!(geom.n_blocks(), 4);
    }

    #[test]
    fn resized_leading_axis() {
        let input = layout();
        let alg = Declared {
            shape: Some(vec![3, 2, 3]),
            resized: [0].into(),
            ..Default::default()
        };
        let geom = ChunkGeometry::resolve(&alg, &[&input]).unwrap();
        assert_eq!(geom.output().shape(), vec![3, 4, 6]);
        assert_eq!(geom.roles()[0], AxisRole::Resized(3));
    }

    #[test]
    fn resized_axis_must_be_uniform() {
        let input = ChunkLayout::regular(&[10, 4, 6], &[4, 4, 6]);
        let alg = Declared {
            shape: Some(vec![1, 4, 6]),
            resized: [0].into(),
            ..Default::default()
        };
        let err = ChunkGeometry::resolve(&alg, &[&input]).unwrap_err();
        assert!(matches!(err, GeometryError::NonUniformResizedAxis { axis: 0, .. }));
    }

    #[test]
    fn preserved_axis_must_match() {
        let input = layout();
        let alg = Declared {
            shape: Some(vec![10, 4, 3]),
            ..Default::default()
        };
        let err = ChunkGeometry::resolve(&alg, &[&input]).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::PreservedAxisMismatch { axis: 1, input: 2, output: 4, .. }
        ));
    }

    #[test]
    fn zero_sized_resized_axis_is_rejected() {
        let input = layout();
        let alg = Declared {
            shape: Some(vec![0, 2, 3]),
            resized: [0].into(),
            ..Default::default()
        };
        let err = ChunkGeometry::resolve(&alg, &[&input]).unwrap_err();
        assert!(matches!(err, GeometryError::EmptyOutputChunk { axis: 0, .. }));
    }

    #[test]
    fn inputs_must_share_layout() {
        let a = layout();
        let b = ChunkLayout::regular(&[10, 4, 6], &[10, 4, 6]);
        let err = ChunkGeometry::resolve(&Declared::default(), &[&a, &b]).unwrap_err();
        assert!(matches!(err, GeometryError::InputLayoutMismatch { index: 1, .. }));
    }

    #[test]
    fn dropped_axis_needs_single_chunk() {
        let alg = Declared {
            shape: Some(vec![2, 3]),
            dropped: [0].into(),
            ..Default::default()
        };
        let geom = ChunkGeometry::resolve(&alg, &[&layout()]).unwrap();
        assert_eq!(geom.output().shape(), vec![4, 6]);
        assert_eq!(geom.output_axis(0), None);
        assert_eq!(geom.output_axis(2), Some(1));

        let chunked = ChunkLayout::regular(&[10, 4, 6], &[5, 2, 3]);
        let err = ChunkGeometry::resolve(&alg, &[&chunked]).unwrap_err();
        assert!(matches!(err, GeometryError::DroppedAxisChunked { axis: 0, n_blocks: 2, .. }));
    }

    #[test]
    fn created_axis_is_inserted() {
        let alg = Declared {
            shape: Some(vec![2, 10, 2, 3]),
            created: [0].into(),
            ..Default::default()
        };
        let geom = ChunkGeometry::resolve(&alg, &[&layout()]).unwrap();
        assert_eq!(geom.output().shape(), vec![2, 10, 4, 6]);
        assert_eq!(geom.source_axis(0), None);
        assert_eq!(geom.source_axis(1), Some(0));
    }

    #[test]
    fn rank_mismatch_is_rejected() {
        let alg = Declared {
            shape: Some(vec![10, 2]),
            ..Default::default()
        };
        let err = ChunkGeometry::resolve(&alg, &[&layout()]).unwrap_err();
        assert!(matches!(err, GeometryError::RankMismatch { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn resize_without_shape_is_rejected() {
        let alg = Declared {
            resized: [0].into(),
            ..Default::default()
        };
        let err = ChunkGeometry::resolve(&alg, &[&layout()]).unwrap_err();
        assert!(matches!(err, GeometryError::MissingOutputShape { .. }));
    }

    #[test]
    fn overlap_only_on_preserved_axes() {
        let ok = Declared {
            overlap: vec![0, 1, 1],
            ..Default::default()
        };
        assert!(ChunkGeometry::resolve(&ok, &[&layout()]).unwrap().has_overlap());

        let bad = Declared {
            shape: Some(vec![3, 2, 3]),
            resized: [0].into(),
            overlap: vec![1, 0, 0],
            ..Default::default()
        };
        let err = ChunkGeometry::resolve(&bad, &[&layout()]).unwrap_err();
        assert!(matches!(err, GeometryError::OverlapOnNonPreservedAxis { axis: 0, .. }));
    }

    #[test]
    fn no_inputs_is_rejected() {
        let err = ChunkGeometry::resolve(&Declared::default(), &[]).unwrap_err();
        assert!(matches!(err, GeometryError::NoInputs { .. }));
    }
}
