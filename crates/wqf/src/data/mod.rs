//! Labeled, chunked data cubes.
//!
//! - [`ArrayData`] / [`DType`]: typed n-dimensional storage.
//! - [`ChunkLayout`] / [`ChunkedArray`]: arrays tiled into blocks.
//! - [`Dataset`] / [`Variable`]: named arrays over named dimensions.
//! - [`DatasetBuilder`]: incremental, consistency-checked assembly.

mod array;
mod builder;
mod chunked;
mod dataset;

pub use array::{ArrayData, DType};
pub use builder::{BuilderError, DatasetBuilder};
pub use chunked::{ChunkLayout, ChunkedArray, LayoutError};
pub use dataset::{Dataset, Variable};
