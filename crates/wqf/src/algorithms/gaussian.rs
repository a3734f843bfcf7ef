//! Lateral Gaussian smoothing that does not propagate NaN.
//!
//! With `m = isnan(x)`, the filter computes
//! `where(m, x, G(where(m, 0, x)) / G(where(m, 0, 1)))` for each day, where
//! `G` is a separable Gaussian over latitude and longitude with zero
//! boundary. NaN pixels stay NaN and do not darken their neighbours.

use ndarray::{Array1, Array2, Array3, ArrayD, ArrayView2, ArrayView3, ArrayViewD, Axis, Ix3, Zip};

use crate::block::{AlgorithmError, BlockAlgorithm};
use crate::data::DType;

/// Kernel half-width in standard deviations.
const TRUNCATE: f32 = 4.0;

/// Gaussian smoothing over the lat/lon axes of `(day, lat, lon)` blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    sigma: f32,
    kernel: Array1<f32>,
    dtype: DType,
}

impl Gaussian {
    /// Filter with the given full width at half maximum (pixels).
    pub fn from_fwhm(fwhm: f32) -> Self {
        Self::from_sigma(fwhm / (2.0 * (2.0 * std::f32::consts::LN_2).sqrt()))
    }

    /// Filter with the given standard deviation (pixels).
    pub fn from_sigma(sigma: f32) -> Self {
        Self {
            sigma,
            kernel: kernel(sigma),
            dtype: DType::Float32,
        }
    }

    /// Output element type (defaults to `float32`).
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    #[inline]
    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Kernel radius in pixels.
    #[inline]
    pub fn radius(&self) -> usize {
        self.kernel.len() / 2
    }

    /// Filter every day of a `(day, lat, lon)` cube.
    pub fn filter(&self, cube: ArrayView3<'_, f32>) -> Array3<f32> {
        let mut out = Array3::<f32>::zeros(cube.raw_dim());
        for (day, mut dst) in cube.outer_iter().zip(out.outer_iter_mut()) {
            dst.assign(&self.filter_day(day));
        }
        out
    }

    fn filter_day(&self, x: ArrayView2<'_, f32>) -> Array2<f32> {
        let values = x.mapv(|v| if v.is_nan() { 0.0 } else { v });
        let weights = x.mapv(|v| if v.is_nan() { 0.0 } else { 1.0 });
        let v = self.convolve(&values);
        let w = self.convolve(&weights);

        let mut out = v;
        Zip::from(&mut out).and(&w).and(&x).for_each(|o, &w, &x| {
            *o = if x.is_nan() { x } else { *o / w };
        });
        out
    }

    /// Separable convolution along both axes, zero outside.
    fn convolve(&self, x: &Array2<f32>) -> Array2<f32> {
        let rows = convolve_axis(x, &self.kernel, Axis(0));
        convolve_axis(&rows, &self.kernel, Axis(1))
    }
}

fn kernel(sigma: f32) -> Array1<f32> {
    if sigma <= 0.0 {
        return Array1::from(vec![1.0]);
    }
    let radius = (TRUNCATE * sigma + 0.5) as i64;
    let mut k = Array1::from_iter((-radius..=radius).map(|i| {
        let x = i as f32;
        (-0.5 * x * x / (sigma * sigma)).exp()
    }));
    let sum = k.sum();
    k /= sum;
    k
}

fn convolve_axis(x: &Array2<f32>, kernel: &Array1<f32>, axis: Axis) -> Array2<f32> {
    let radius = kernel.len() / 2;
    let mut out = Array2::<f32>::zeros(x.raw_dim());
    for (src, mut dst) in x.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let n = src.len();
        for (i, y) in dst.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let j = i + k;
                if j >= radius && j - radius < n {
                    acc += w * src[j - radius];
                }
            }
            *y = acc;
        }
    }
    out
}

impl BlockAlgorithm for Gaussian {
    fn name(&self) -> &str {
        "gaussian"
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn overlap(&self) -> Vec<usize> {
        let r = self.radius();
        vec![0, r, r]
    }

    fn compute_block(
        &self,
        inputs: &[ArrayViewD<'_, f32>],
        names: &[&str],
    ) -> Result<ArrayD<f32>, AlgorithmError> {
        let [input] = inputs else {
            return Err(AlgorithmError::InputCountMismatch {
                expected: 1,
                actual: inputs.len(),
            });
        };
        let cube = input
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| AlgorithmError::InputRankMismatch {
                name: names.first().map_or_else(String::new, |n| n.to_string()),
                expected: 3,
                actual: input.ndim(),
            })?;
        Ok(self.filter(cube).into_dyn())
    }
}
