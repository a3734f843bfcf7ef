//! In-process block scheduler.

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

use ndarray::{ArrayD, ArrayViewD, IxDyn, Slice};

use super::{AlgorithmError, BlockAlgorithm, ChunkGeometry, GeometryError};
use crate::data::{ArrayData, ChunkedArray, LayoutError};
use crate::utils::Parallelism;

/// Errors raised while executing a plan.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("{algorithm}: block {block:?} failed: {source}")]
    Algorithm {
        algorithm: String,
        block: Vec<usize>,
        #[source]
        source: AlgorithmError,
    },

    #[error("{algorithm}: block {block:?} has shape {actual:?}, planned {expected:?}")]
    BlockShapeMismatch {
        algorithm: String,
        block: Vec<usize>,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// A validated application of an algorithm to named inputs.
pub struct BlockPlan<'a, A: BlockAlgorithm + ?Sized> {
    algorithm: &'a A,
    inputs: Vec<&'a ChunkedArray>,
    names: Vec<&'a str>,
    geometry: ChunkGeometry,
}

impl<A: BlockAlgorithm + ?Sized> fmt::Debug for BlockPlan<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPlan")
            .field("algorithm", &self.algorithm.name())
            .field("names", &self.names)
            .field("geometry", &self.geometry)
            .finish_non_exhaustive()
    }
}

impl<'a, A: BlockAlgorithm + ?Sized> BlockPlan<'a, A> {
    #[inline]
    pub fn geometry(&self) -> &ChunkGeometry {
        &self.geometry
    }

    #[inline]
    pub fn n_blocks(&self) -> usize {
        self.geometry.n_blocks()
    }

    pub fn names(&self) -> &[&'a str] {
        &self.names
    }
}

/// Runs block algorithms over chunked arrays.
///
/// [`plan`](Self::plan) validates geometry without touching data;
/// [`execute`](Self::execute) computes every block (concurrently when
/// parallelism allows) and assembles the output.
#[derive(Debug, Clone, Copy)]
pub struct BlockEngine {
    parallelism: Parallelism,
}

impl BlockEngine {
    pub fn new(parallelism: Parallelism) -> Self {
        Self { parallelism }
    }

    /// Engine computing one block at a time.
    pub fn sequential() -> Self {
        Self::new(Parallelism::Sequential)
    }

    #[inline]
    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    /// Resolve the geometry of `algorithm` applied to `inputs`.
    pub fn plan<'a, A: BlockAlgorithm + ?Sized>(
        &self,
        algorithm: &'a A,
        inputs: &[(&'a str, &'a ChunkedArray)],
    ) -> Result<BlockPlan<'a, A>, GeometryError> {
        let layouts: Vec<_> = inputs.iter().map(|(_, a)| a.layout()).collect();
        let geometry = ChunkGeometry::resolve(algorithm, &layouts)?;
        Ok(BlockPlan {
            algorithm,
            inputs: inputs.iter().map(|(_, a)| *a).collect(),
            names: inputs.iter().map(|(n, _)| *n).collect(),
            geometry,
        })
    }

    /// Compute every block of `plan` and assemble the output.
    ///
    /// The first failing block (in block order) fails the whole execution.
    pub fn execute<A: BlockAlgorithm + ?Sized>(
        &self,
        plan: &BlockPlan<'_, A>,
    ) -> Result<ChunkedArray, BlockError> {
        let geometry = &plan.geometry;
        let data: Vec<Cow<'_, ArrayD<f32>>> = plan
            .inputs
            .iter()
            .map(|a| match a.data().as_f32() {
                Some(arr) => Cow::Borrowed(arr),
                None => Cow::Owned(a.data().to_f32()),
            })
            .collect();

        let blocks = block_indices(geometry);
        let results = self
            .parallelism
            .maybe_par_map(blocks, |block| self.compute(plan, &data, block));

        let mut output = ArrayD::<f32>::zeros(IxDyn(&geometry.output().shape()));
        for result in results {
            let (block, values) = result?;
            let ranges = output_ranges(geometry, &block);
            output
                .slice_each_axis_mut(|ax| Slice::from(ranges[ax.axis.index()].clone()))
                .assign(&values);
        }

        let data = ArrayData::from_f32(output, plan.algorithm.dtype());
        Ok(ChunkedArray::with_layout(data, geometry.output().clone())?)
    }

    fn compute<A: BlockAlgorithm + ?Sized>(
        &self,
        plan: &BlockPlan<'_, A>,
        data: &[Cow<'_, ArrayD<f32>>],
        block: Vec<usize>,
    ) -> Result<(Vec<usize>, ArrayD<f32>), BlockError> {
        let geometry = &plan.geometry;
        let input = geometry.input();
        let ranges: Vec<Range<usize>> = block
            .iter()
            .enumerate()
            .map(|(axis, &b)| input.block_range(axis, b))
            .collect();

        let result = if geometry.has_overlap() {
            let shape = input.shape();
            let padded: Vec<ArrayD<f32>> = data
                .iter()
                .map(|arr| with_halo(arr.view(), &shape, &ranges, geometry.overlap()))
                .collect();
            let views: Vec<_> = padded.iter().map(|a| a.view()).collect();
            plan.algorithm
                .compute_block(&views, &plan.names)
                .map(|out| trim_halo(out, geometry, &ranges))
        } else {
            let views: Vec<ArrayViewD<'_, f32>> = data
                .iter()
                .map(|arr| arr.slice_each_axis(|ax| Slice::from(ranges[ax.axis.index()].clone())))
                .collect();
            plan.algorithm.compute_block(&views, &plan.names)
        };

        let values = result.map_err(|source| BlockError::Algorithm {
            algorithm: plan.algorithm.name().to_string(),
            block: block.clone(),
            source,
        })?;

        let expected: Vec<usize> = output_ranges(geometry, &block)
            .iter()
            .map(|r| r.len())
            .collect();
        if values.shape() != expected.as_slice() {
            return Err(BlockError::BlockShapeMismatch {
                algorithm: plan.algorithm.name().to_string(),
                block,
                expected,
                actual: values.shape().to_vec(),
            });
        }
        Ok((block, values))
    }
}

/// Every block index of the input grid, in row-major order.
fn block_indices(geometry: &ChunkGeometry) -> Vec<Vec<usize>> {
    let input = geometry.input();
    let mut indices: Vec<Vec<usize>> = vec![Vec::new()];
    for axis in 0..input.ndim() {
        let n = input.n_blocks(axis);
        indices = indices
            .into_iter()
            .flat_map(|prefix| {
                (0..n).map(move |b| {
                    let mut idx = prefix.clone();
                    idx.push(b);
                    idx
                })
            })
            .collect();
    }
    indices
}

/// Element ranges of the output block produced by input block `block`.
fn output_ranges(geometry: &ChunkGeometry, block: &[usize]) -> Vec<Range<usize>> {
    let output = geometry.output();
    (0..output.ndim())
        .map(|out_axis| match geometry.source_axis(out_axis) {
            Some(axis) => output.block_range(out_axis, block[axis]),
            None => output.block_range(out_axis, 0),
        })
        .collect()
}

/// Copy of the block at `ranges` extended by `depth` elements per side.
/// Elements outside the array are NaN.
fn with_halo(
    array: ArrayViewD<'_, f32>,
    shape: &[usize],
    ranges: &[Range<usize>],
    depth: &[usize],
) -> ArrayD<f32> {
    let padded_shape: Vec<usize> = ranges
        .iter()
        .zip(depth)
        .map(|(r, &d)| r.len() + 2 * d)
        .collect();
    let mut padded = ArrayD::from_elem(IxDyn(&padded_shape), f32::NAN);

    // source window clipped to the array, and its position in the padded block
    let (src, dst): (Vec<Range<usize>>, Vec<Range<usize>>) = ranges
        .iter()
        .zip(depth)
        .zip(shape)
        .map(|((r, &d), &len)| {
            let lo = r.start.saturating_sub(d);
            let hi = (r.end + d).min(len);
            let offset = lo + d - r.start;
            (lo..hi, offset..offset + (hi - lo))
        })
        .unzip();

    padded
        .slice_each_axis_mut(|ax| Slice::from(dst[ax.axis.index()].clone()))
        .assign(&array.slice_each_axis(|ax| Slice::from(src[ax.axis.index()].clone())));
    padded
}

/// Remove the halo from a block computed on an extended input.
fn trim_halo(out: ArrayD<f32>, geometry: &ChunkGeometry, ranges: &[Range<usize>]) -> ArrayD<f32> {
    let depth = geometry.overlap();
    let trims: Vec<Range<usize>> = (0..out.ndim())
        .map(|out_axis| match geometry.source_axis(out_axis) {
            Some(axis) if depth[axis] > 0 => depth[axis]..depth[axis] + ranges[axis].len(),
            _ => 0..out.shape()[out_axis],
        })
        .collect();
    out.slice_each_axis(|ax| Slice::from(trims[ax.axis.index()].clone()))
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DType;
    use ndarray::{Array3, Axis};

    /// Sums the inputs elementwise.
    struct Sum;

    impl BlockAlgorithm for Sum {
        fn name(&self) -> &str {
            "sum"
        }
        fn dtype(&self) -> DType {
            DType::Float64
        }
        fn compute_block(
            &self,
            inputs: &[ArrayViewD<'_, f32>],
            _names: &[&str],
        ) -> Result<ArrayD<f32>, AlgorithmError> {
            let mut out = inputs[0].to_owned();
            for x in &inputs[1..] {
                out += x;
            }
            Ok(out)
        }
    }

    /// Sum of the three-element neighbourhood along the last axis, NaN
    /// counted as zero.
    struct Window;

    impl BlockAlgorithm for Window {
        fn name(&self) -> &str {
            "window"
        }
        fn dtype(&self) -> DType {
            DType::Float32
        }
        fn overlap(&self) -> Vec<usize> {
            vec![0, 0, 1]
        }
        fn compute_block(
            &self,
            inputs: &[ArrayViewD<'_, f32>],
            _names: &[&str],
        ) -> Result<ArrayD<f32>, AlgorithmError> {
            let x = &inputs[0];
            let n = x.shape()[2];
            let mut out = ArrayD::zeros(x.raw_dim());
            for j in 0..n {
                for k in j.saturating_sub(1)..(j + 2).min(n) {
                    let col = x.index_axis(Axis(2), k).mapv(|v| if v.is_nan() { 0.0 } else { v });
                    let mut dst = out.index_axis_mut(Axis(2), j);
                    dst += &col;
                }
            }
            Ok(out)
        }
    }

    /// Always returns a block of the wrong size.
    struct Broken;

    impl BlockAlgorithm for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn dtype(&self) -> DType {
            DType::Float32
        }
        fn compute_block(
            &self,
            _inputs: &[ArrayViewD<'_, f32>],
            _names: &[&str],
        ) -> Result<ArrayD<f32>, AlgorithmError> {
            Ok(ArrayD::zeros(IxDyn(&[1, 1, 1])))
        }
    }

    fn cube() -> Array3<f32> {
        Array3::from_shape_fn((2, 4, 6), |(t, i, j)| (t * 100 + i * 10 + j) as f32)
    }

    #[test]
    fn blocks_cover_grid_in_order() {
        let a = ChunkedArray::new(cube().into_dyn(), &[2, 2, 3]);
        let plan = BlockEngine::sequential().plan(&Sum, &[("a", &a)]).unwrap();
        assert_eq!(
            block_indices(plan.geometry()),
            vec![vec![0, 0, 0], vec![0, 0, 1], vec![0, 1, 0], vec![0, 1, 1]]
        );
    }

    #[test]
    fn execute_assembles_and_casts() {
        let a = ChunkedArray::new(cube().into_dyn(), &[2, 2, 3]);
        let b = ChunkedArray::new(cube().into_dyn(), &[2, 2, 3]);
        for engine in [BlockEngine::sequential(), BlockEngine::new(Parallelism::Parallel)] {
            let plan = engine.plan(&Sum, &[("a", &a), ("b", &b)]).unwrap();
            let out = engine.execute(&plan).unwrap();
            assert_eq!(out.dtype(), DType::Float64);
            assert_eq!(out.layout(), a.layout());
            let expected = (cube() * 2.0).mapv(f64::from).into_dyn();
            assert_eq!(out.data().as_f64().unwrap(), &expected);
        }
    }

    #[test]
    fn halo_hides_chunk_seams() {
        let chunked = ChunkedArray::new(cube().into_dyn(), &[2, 2, 2]);
        let whole = ChunkedArray::single_chunk(cube().into_dyn());
        let engine = BlockEngine::sequential();

        let a = engine.plan(&Window, &[("x", &chunked)]).unwrap();
        let a = engine.execute(&a).unwrap();
        let b = engine.plan(&Window, &[("x", &whole)]).unwrap();
        let b = engine.execute(&b).unwrap();
        assert_eq!(a.data(), b.data());
        // first column: own value plus right neighbour only
        assert_eq!(a.data().as_f32().unwrap()[[0, 0, 0]], 1.0);
    }

    #[test]
    fn wrong_block_shape_is_reported() {
        let a = ChunkedArray::new(cube().into_dyn(), &[2, 2, 3]);
        let engine = BlockEngine::sequential();
        let plan = engine.plan(&Broken, &[("a", &a)]).unwrap();
        let err = engine.execute(&plan).unwrap_err();
        assert!(matches!(err, BlockError::BlockShapeMismatch { .. }));
    }

    #[test]
    fn mismatched_inputs_fail_at_plan_time() {
        let a = ChunkedArray::new(cube().into_dyn(), &[2, 2, 3]);
        let b = ChunkedArray::new(cube().into_dyn(), &[2, 4, 6]);
        let err = BlockEngine::sequential()
            .plan(&Sum, &[("a", &a), ("b", &b)])
            .err();
        assert!(matches!(err, Some(GeometryError::InputLayoutMismatch { .. })));
    }

    #[test]
    fn plan_debug_names_algorithm_and_inputs() {
        let a = ChunkedArray::new(cube().into_dyn(), &[2, 2, 3]);
        let plan = BlockEngine::sequential().plan(&Sum, &[("a", &a)]).unwrap();
        let text = format!("{plan:?}");
        assert!(text.starts_with("BlockPlan"));
        assert!(text.contains("\"sum\""));
        assert!(text.contains("[\"a\"]"));
    }
}
