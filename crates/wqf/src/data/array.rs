//! Typed n-dimensional array storage.

use std::ops::Range;

use ndarray::{ArrayD, Axis, IxDyn, Slice};
use serde::{Deserialize, Serialize};

/// Numeric element type of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// Single-precision float.
    #[default]
    Float32,
    /// Double-precision float.
    Float64,
    /// Signed 64-bit integer (e.g. time stamps).
    Int64,
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::Float32 => write!(f, "float32"),
            DType::Float64 => write!(f, "float64"),
            DType::Int64 => write!(f, "int64"),
        }
    }
}

/// Array payload tagged with its element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    Int64(ArrayD<i64>),
}

impl ArrayData {
    /// Create an array of the given shape filled with `value`.
    pub fn full(shape: &[usize], value: f64, dtype: DType) -> Self {
        let shape = IxDyn(shape);
        match dtype {
            DType::Float32 => ArrayData::Float32(ArrayD::from_elem(shape, value as f32)),
            DType::Float64 => ArrayData::Float64(ArrayD::from_elem(shape, value)),
            DType::Int64 => ArrayData::Int64(ArrayD::from_elem(shape, value as i64)),
        }
    }

    /// Wrap a single-precision array, casting it to `dtype`.
    pub fn from_f32(array: ArrayD<f32>, dtype: DType) -> Self {
        match dtype {
            DType::Float32 => ArrayData::Float32(array),
            DType::Float64 => ArrayData::Float64(array.mapv(f64::from)),
            DType::Int64 => ArrayData::Int64(array.mapv(|v| v as i64)),
        }
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Float32(_) => DType::Float32,
            ArrayData::Float64(_) => DType::Float64,
            ArrayData::Int64(_) => DType::Int64,
        }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        match self {
            ArrayData::Float32(a) => a.shape(),
            ArrayData::Float64(a) => a.shape(),
            ArrayData::Int64(a) => a.shape(),
        }
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Copy of the data as single precision.
    pub fn to_f32(&self) -> ArrayD<f32> {
        match self {
            ArrayData::Float32(a) => a.clone(),
            ArrayData::Float64(a) => a.mapv(|v| v as f32),
            ArrayData::Int64(a) => a.mapv(|v| v as f32),
        }
    }

    /// Borrow the data if it is already single precision.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            ArrayData::Float32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&ArrayD<f64>> {
        match self {
            ArrayData::Float64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            ArrayData::Int64(a) => Some(a),
            _ => None,
        }
    }

    /// Convert to another element type.
    pub fn cast(&self, dtype: DType) -> Self {
        if self.dtype() == dtype {
            return self.clone();
        }
        match (self, dtype) {
            (ArrayData::Float64(a), DType::Float32) => ArrayData::Float32(a.mapv(|v| v as f32)),
            (ArrayData::Float64(a), DType::Int64) => ArrayData::Int64(a.mapv(|v| v as i64)),
            (ArrayData::Int64(a), DType::Float64) => ArrayData::Float64(a.mapv(|v| v as f64)),
            (ArrayData::Int64(a), DType::Float32) => ArrayData::Float32(a.mapv(|v| v as f32)),
            (ArrayData::Float32(a), _) => ArrayData::from_f32(a.clone(), dtype),
            _ => self.clone(),
        }
    }

    /// Copy of the elements within `range` along `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis` or `range` is out of bounds.
    pub fn slice_axis(&self, axis: usize, range: Range<usize>) -> Self {
        let slice = Slice::from(range);
        match self {
            ArrayData::Float32(a) => ArrayData::Float32(a.slice_axis(Axis(axis), slice).to_owned()),
            ArrayData::Float64(a) => ArrayData::Float64(a.slice_axis(Axis(axis), slice).to_owned()),
            ArrayData::Int64(a) => ArrayData::Int64(a.slice_axis(Axis(axis), slice).to_owned()),
        }
    }
}

impl From<ArrayD<f32>> for ArrayData {
    fn from(array: ArrayD<f32>) -> Self {
        ArrayData::Float32(array)
    }
}

impl From<ArrayD<f64>> for ArrayData {
    fn from(array: ArrayD<f64>) -> Self {
        ArrayData::Float64(array)
    }
}

impl From<ArrayD<i64>> for ArrayData {
    fn from(array: ArrayD<i64>) -> Self {
        ArrayData::Int64(array)
    }
}
