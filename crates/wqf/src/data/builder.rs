//! Incremental dataset assembly.
//!
//! [`DatasetBuilder`] collects dimensions, variables and arrays one call at a
//! time and checks consistency at the point of each call:
//!
//! - A dimension's size is fixed when it is declared. Every array bound along
//!   that dimension must match it exactly.
//! - The chunk size recorded for a dimension is the smallest chunk size of
//!   any array bound along it, so constants synthesized later never exceed
//!   the chunking an actual contributor produced.
//! - Variables must declare their dimensions before an array is bound, and
//!   each variable takes exactly one array.
//!
//! # Example
//!
//! ```
//! use wqf::data::{ChunkedArray, DType, DatasetBuilder};
//! use ndarray::Array1;
//!
//! let mut builder = DatasetBuilder::new();
//! builder.declare_dimension("time", 3)?;
//! builder.declare_variable("time", &["time"])?;
//! builder.declare_variable("flag", &["time"])?;
//! builder.bind_array("time", ChunkedArray::single_chunk(Array1::from(vec![0i64, 1, 2]).into_dyn()))?;
//! builder.bind_constant("flag", 1.0, DType::Float32)?;
//!
//! let ds = builder.build();
//! assert!(ds.is_coord("time"));
//! assert_eq!(ds.data_vars().count(), 1);
//! # Ok::<(), wqf::data::BuilderError>(())
//! ```

use std::collections::BTreeMap;

use super::array::DType;
use super::chunked::ChunkedArray;
use super::dataset::{Dataset, Variable};

/// Consistency violations raised by [`DatasetBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuilderError {
    #[error("dimension '{0}' is already defined")]
    DimensionAlreadyDefined(String),

    #[error("dimension '{dimension}' is not defined in variable '{variable}'")]
    UndefinedDimension { variable: String, dimension: String },

    #[error("variable '{0}' is already associated with dimensions")]
    VariableAlreadyDeclared(String),

    #[error("variable '{0}' is not associated with dimensions")]
    UndeclaredVariable(String),

    #[error("variable '{0}' is already associated with an array")]
    ArrayAlreadyBound(String),

    #[error("variable '{0}' is not associated with an array")]
    ArrayNotBound(String),

    #[error("array for variable '{variable}' has {actual} axes but {expected} dimensions are declared")]
    RankMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid array shape {actual} along dimension '{dimension}' for variable '{variable}' (expected {expected})")]
    SizeMismatch {
        variable: String,
        dimension: String,
        expected: usize,
        actual: usize,
    },

    #[error("dataset has no variable '{0}'")]
    MissingSourceVariable(String),
}

/// Builder for labeled datasets.
///
/// A builder is owned by the single assembly operation that created it.
/// [`build`](Self::build) leaves the accumulated state in place; call
/// [`clear`](Self::clear) to reuse the builder.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    attrs: BTreeMap<String, String>,
    arrays: BTreeMap<String, ChunkedArray>,
    dim_ids: BTreeMap<String, Vec<String>>,
    sizes: BTreeMap<String, usize>,
    chunk_sizes: BTreeMap<String, usize>,
}

impl DatasetBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global attribute. Later values replace earlier ones.
    pub fn add_attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Declare a dimension chunked as a single chunk.
    pub fn declare_dimension(&mut self, did: &str, size: usize) -> Result<&mut Self, BuilderError> {
        self.declare_dimension_chunked(did, size, size)
    }

    /// Declare a dimension with an explicit chunk size.
    pub fn declare_dimension_chunked(
        &mut self,
        did: &str,
        size: usize,
        chunk_size: usize,
    ) -> Result<&mut Self, BuilderError> {
        if self.sizes.contains_key(did) {
            return Err(BuilderError::DimensionAlreadyDefined(did.to_string()));
        }
        self.sizes.insert(did.to_string(), size);
        self.chunk_sizes.insert(did.to_string(), chunk_size);
        Ok(self)
    }

    /// Declare a variable laid out along `dims`.
    ///
    /// An empty `dims` declares a scalar variable.
    pub fn declare_variable(
        &mut self,
        vid: &str,
        dims: &[&str],
    ) -> Result<&mut Self, BuilderError> {
        if self.dim_ids.contains_key(vid) {
            return Err(BuilderError::VariableAlreadyDeclared(vid.to_string()));
        }
        if self.arrays.contains_key(vid) {
            return Err(BuilderError::ArrayAlreadyBound(vid.to_string()));
        }
        if let Some(missing) = dims.iter().find(|d| !self.sizes.contains_key(**d)) {
            return Err(BuilderError::UndefinedDimension {
                variable: vid.to_string(),
                dimension: missing.to_string(),
            });
        }
        let dims = dims.iter().map(|d| d.to_string()).collect();
        self.dim_ids.insert(vid.to_string(), dims);
        Ok(self)
    }

    /// Bind an array to a declared variable.
    ///
    /// Every axis must match the size of its dimension. On success the chunk
    /// size of each dimension becomes the minimum of its recorded chunk size
    /// and the array's chunk size along that axis. On failure nothing is
    /// recorded.
    pub fn bind_array(
        &mut self,
        vid: &str,
        array: ChunkedArray,
    ) -> Result<&mut Self, BuilderError> {
        if self.arrays.contains_key(vid) {
            return Err(BuilderError::ArrayAlreadyBound(vid.to_string()));
        }
        let dims = self
            .dim_ids
            .get(vid)
            .ok_or_else(|| BuilderError::UndeclaredVariable(vid.to_string()))?;
        if dims.len() != array.ndim() {
            return Err(BuilderError::RankMismatch {
                variable: vid.to_string(),
                expected: dims.len(),
                actual: array.ndim(),
            });
        }

        for (did, &actual) in dims.iter().zip(array.shape()) {
            let expected = self.sizes[did];
            if actual != expected {
                return Err(BuilderError::SizeMismatch {
                    variable: vid.to_string(),
                    dimension: did.clone(),
                    expected,
                    actual,
                });
            }
        }

        for (did, chunk) in dims.iter().zip(array.chunk_shape()) {
            let recorded = self.chunk_sizes.entry(did.clone()).or_insert(chunk);
            if chunk < *recorded {
                *recorded = chunk;
            }
        }

        self.arrays.insert(vid.to_string(), array);
        Ok(self)
    }

    /// Bind a constant array covering the variable's declared dimensions,
    /// chunked with the dimensions' recorded chunk sizes.
    pub fn bind_constant(
        &mut self,
        vid: &str,
        value: f64,
        dtype: DType,
    ) -> Result<&mut Self, BuilderError> {
        if self.arrays.contains_key(vid) {
            return Err(BuilderError::ArrayAlreadyBound(vid.to_string()));
        }
        let dims = self
            .dim_ids
            .get(vid)
            .ok_or_else(|| BuilderError::UndeclaredVariable(vid.to_string()))?;
        let shape: Vec<usize> = dims.iter().map(|d| self.sizes[d]).collect();
        let chunks: Vec<usize> = dims.iter().map(|d| self.chunk_size(d)).collect();
        let array = ChunkedArray::full(&shape, &chunks, value, dtype);
        self.bind_array(vid, array)
    }

    /// Bind variable `vid` to a copy of variable `uid` of `dataset`.
    pub fn add_dataset_array(
        &mut self,
        vid: &str,
        uid: &str,
        dataset: &Dataset,
    ) -> Result<&mut Self, BuilderError> {
        let source = dataset
            .variable(uid)
            .ok_or_else(|| BuilderError::MissingSourceVariable(uid.to_string()))?;
        self.bind_array(vid, source.data().clone())
    }

    /// The array bound to `vid`.
    pub fn get_array(&self, vid: &str) -> Result<&ChunkedArray, BuilderError> {
        self.arrays
            .get(vid)
            .ok_or_else(|| BuilderError::ArrayNotBound(vid.to_string()))
    }

    /// Size recorded for dimension `did`.
    pub fn dim_size(&self, did: &str) -> Option<usize> {
        self.sizes.get(did).copied()
    }

    /// Chunk size recorded for dimension `did`; falls back to its size.
    pub fn chunk_size(&self, did: &str) -> usize {
        self.chunk_sizes
            .get(did)
            .or_else(|| self.sizes.get(did))
            .copied()
            .unwrap_or(0)
    }

    /// Assemble the dataset from every variable with a bound array.
    ///
    /// Declared variables without an array are left out.
    pub fn build(&self) -> Dataset {
        let variables = self
            .arrays
            .iter()
            .map(|(vid, array)| {
                let dims = self.dim_ids[vid].clone();
                (vid.clone(), Variable::new(dims, array.clone()))
            })
            .collect();
        Dataset::from_parts(self.sizes.clone(), variables, self.attrs.clone())
    }

    /// Release all accumulated state.
    pub fn clear(&mut self) {
        self.attrs.clear();
        self.arrays.clear();
        self.dim_ids.clear();
        self.sizes.clear();
        self.chunk_sizes.clear();
    }
}
