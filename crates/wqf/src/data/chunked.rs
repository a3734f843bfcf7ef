//! Chunked arrays.
//!
//! A [`ChunkLayout`] records, per axis, the sizes of the consecutive chunks
//! that tile the axis. A [`ChunkedArray`] pairs an [`ArrayData`] payload
//! with such a layout. The layout never affects the values; it tells the
//! block engine how to tile work.

use std::ops::Range;

use super::array::{ArrayData, DType};

/// Errors raised when a chunk layout does not tile an array.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("layout has {layout} axes but array has {array}")]
    RankMismatch { layout: usize, array: usize },

    #[error("chunks along axis {axis} sum to {sum} but axis length is {len}")]
    ChunkSumMismatch { axis: usize, sum: usize, len: usize },

    #[error("zero-sized chunk along axis {axis}")]
    EmptyChunk { axis: usize },
}

/// Per-axis chunk sizes of an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkLayout {
    chunks: Vec<Vec<usize>>,
}

impl ChunkLayout {
    /// Regular chunking: every chunk along axis `i` has `chunk_shape[i]`
    /// elements except possibly the last one.
    ///
    /// A chunk size of `0` or one exceeding the axis length means one chunk
    /// spanning the whole axis.
    ///
    /// # Panics
    ///
    /// Panics if `shape` and `chunk_shape` have different lengths.
    pub fn regular(shape: &[usize], chunk_shape: &[usize]) -> Self {
        assert_eq!(
            shape.len(),
            chunk_shape.len(),
            "chunk shape must have one entry per axis"
        );
        let chunks = shape
            .iter()
            .zip(chunk_shape)
            .map(|(&len, &chunk)| split_axis(len, chunk))
            .collect();
        Self { chunks }
    }

    /// One chunk spanning the whole array.
    pub fn single(shape: &[usize]) -> Self {
        Self::regular(shape, shape)
    }

    /// Explicit per-axis chunk sizes.
    pub fn from_chunks(chunks: Vec<Vec<usize>>) -> Result<Self, LayoutError> {
        for (axis, sizes) in chunks.iter().enumerate() {
            if sizes.iter().any(|&s| s == 0) {
                return Err(LayoutError::EmptyChunk { axis });
            }
        }
        Ok(Self { chunks })
    }

    /// Check that this layout tiles an array of `shape`.
    pub fn validate_for(&self, shape: &[usize]) -> Result<(), LayoutError> {
        if self.ndim() != shape.len() {
            return Err(LayoutError::RankMismatch {
                layout: self.ndim(),
                array: shape.len(),
            });
        }
        for (axis, (sizes, &len)) in self.chunks.iter().zip(shape).enumerate() {
            let sum: usize = sizes.iter().sum();
            if sum != len {
                return Err(LayoutError::ChunkSumMismatch { axis, sum, len });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.chunks.len()
    }

    /// Array shape implied by the chunks.
    pub fn shape(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.iter().sum()).collect()
    }

    /// Chunk sizes along one axis.
    #[inline]
    pub fn chunks(&self, axis: usize) -> &[usize] {
        &self.chunks[axis]
    }

    /// All per-axis chunk sizes.
    #[inline]
    pub fn all_chunks(&self) -> &[Vec<usize>] {
        &self.chunks
    }

    /// The largest chunk along each axis.
    pub fn chunk_shape(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .map(|c| c.iter().copied().max().unwrap_or(0))
            .collect()
    }

    /// Number of chunks along `axis`.
    #[inline]
    pub fn n_blocks(&self, axis: usize) -> usize {
        self.chunks[axis].len()
    }

    /// Total number of blocks.
    pub fn n_blocks_total(&self) -> usize {
        self.chunks.iter().map(Vec::len).product()
    }

    /// Element range covered by chunk `block` along `axis`.
    pub fn block_range(&self, axis: usize, block: usize) -> Range<usize> {
        let sizes = &self.chunks[axis];
        let start: usize = sizes[..block].iter().sum();
        start..start + sizes[block]
    }

    /// Whether every chunk along `axis` has the same size.
    pub fn is_uniform(&self, axis: usize) -> bool {
        self.chunks[axis].windows(2).all(|w| w[0] == w[1])
    }

    /// Layout of the sub-array `range` along `axis`.
    pub fn slice_axis(&self, axis: usize, range: Range<usize>) -> Self {
        let mut chunks = self.chunks.clone();
        let mut sliced = Vec::new();
        let mut start = 0;
        for &size in &self.chunks[axis] {
            let end = start + size;
            let lo = start.max(range.start);
            let hi = end.min(range.end);
            if hi > lo {
                sliced.push(hi - lo);
            }
            start = end;
        }
        chunks[axis] = sliced;
        Self { chunks }
    }
}

fn split_axis(len: usize, chunk: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let chunk = if chunk == 0 || chunk > len { len } else { chunk };
    let mut sizes = vec![chunk; len / chunk];
    if len % chunk != 0 {
        sizes.push(len % chunk);
    }
    sizes
}

/// An array together with its chunk layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedArray {
    data: ArrayData,
    layout: ChunkLayout,
}

impl ChunkedArray {
    /// Chunk `data` regularly with `chunk_shape`.
    pub fn new(data: impl Into<ArrayData>, chunk_shape: &[usize]) -> Self {
        let data = data.into();
        let layout = ChunkLayout::regular(data.shape(), chunk_shape);
        Self { data, layout }
    }

    /// Wrap `data` as a single chunk.
    pub fn single_chunk(data: impl Into<ArrayData>) -> Self {
        let data = data.into();
        let layout = ChunkLayout::single(data.shape());
        Self { data, layout }
    }

    /// Wrap `data` with an explicit layout.
    pub fn with_layout(
        data: impl Into<ArrayData>,
        layout: ChunkLayout,
    ) -> Result<Self, LayoutError> {
        let data = data.into();
        layout.validate_for(data.shape())?;
        Ok(Self { data, layout })
    }

    /// Constant array of `shape` chunked with `chunk_shape`.
    pub fn full(shape: &[usize], chunk_shape: &[usize], value: f64, dtype: DType) -> Self {
        Self::new(ArrayData::full(shape, value, dtype), chunk_shape)
    }

    #[inline]
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    #[inline]
    pub fn into_data(self) -> ArrayData {
        self.data
    }

    #[inline]
    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// The largest chunk along each axis.
    pub fn chunk_shape(&self) -> Vec<usize> {
        self.layout.chunk_shape()
    }

    /// Same data, regular chunks of `chunk_shape`.
    pub fn rechunk(&self, chunk_shape: &[usize]) -> Self {
        Self {
            data: self.data.clone(),
            layout: ChunkLayout::regular(self.shape(), chunk_shape),
        }
    }

    /// Copy of the elements within `range` along `axis`, keeping the chunk
    /// boundaries that fall inside the range.
    pub fn slice_axis(&self, axis: usize, range: Range<usize>) -> Self {
        Self {
            data: self.data.slice_axis(axis, range.clone()),
            layout: self.layout.slice_axis(axis, range),
        }
    }

    /// Same layout, elements cast to `dtype`.
    pub fn cast(&self, dtype: DType) -> Self {
        Self {
            data: self.data.cast(dtype),
            layout: self.layout.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn regular_layout_has_remainder_chunk() {
        let layout = ChunkLayout::regular(&[10, 4], &[4, 0]);
        assert_eq!(layout.chunks(0), &[4, 4, 2]);
        assert_eq!(layout.chunks(1), &[4]);
        assert_eq!(layout.chunk_shape(), vec![4, 4]);
        assert_eq!(layout.n_blocks_total(), 3);
        assert!(!layout.is_uniform(0));
    }

    #[test]
    fn block_range_walks_offsets() {
        let layout = ChunkLayout::regular(&[10], &[4]);
        assert_eq!(layout.block_range(0, 0), 0..4);
        assert_eq!(layout.block_range(0, 2), 8..10);
    }

    #[test]
    fn slice_keeps_inner_boundaries() {
        let layout = ChunkLayout::regular(&[10], &[4]);
        let tail = layout.slice_axis(0, 3..10);
        assert_eq!(tail.chunks(0), &[1, 4, 2]);
    }

    #[test]
    fn with_layout_rejects_wrong_sum() {
        let data = Array3::<f32>::zeros((2, 3, 3)).into_dyn();
        let layout = ChunkLayout::from_chunks(vec![vec![2], vec![2], vec![3]]).unwrap();
        let err = ChunkedArray::with_layout(data, layout).unwrap_err();
        assert_eq!(err, LayoutError::ChunkSumMismatch { axis: 1, sum: 2, len: 3 });
    }

    #[test]
    fn from_chunks_rejects_empty_chunk() {
        let err = ChunkLayout::from_chunks(vec![vec![2, 0]]).unwrap_err();
        assert_eq!(err, LayoutError::EmptyChunk { axis: 0 });
    }

    #[test]
    fn full_array_is_constant() {
        let arr = ChunkedArray::full(&[3, 2], &[2, 2], 7.0, DType::Float32);
        assert_eq!(arr.layout().chunks(0), &[2, 1]);
        assert!(arr.data().as_f32().unwrap().iter().all(|&v| v == 7.0));
    }
}
