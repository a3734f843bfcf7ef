//! Autoregressive chlorophyll forecast.
//!
//! For a block of `history + horizon` days the forecast predicts the last
//! `horizon` days one at a time, oldest first. Each prediction is written
//! back into a working copy of the chlorophyll input before the next day is
//! predicted, so lagged chlorophyll columns that reach into the forecast
//! period read earlier predictions. Pixels with non-finite nitrate are
//! nullified afterwards.
//!
//! In test mode a window of `history + horizon` days slides over the block
//! with stride one, and the last forecast day of every window is kept.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use ndarray::{s, Array2, Array3, ArrayD, ArrayView3, ArrayViewD, Axis, Ix3, Zip};
use serde::{Deserialize, Serialize};

use crate::block::{AlgorithmError, BlockAlgorithm};
use crate::constants::{VID_CHL, VID_NO3};
use crate::data::{ChunkLayout, DType};
use crate::model::{FeatureColumns, ModelError, ModelLoader, ModelSpec, PointPredictor};
use crate::utils::Parallelism;

/// Serializable parameters of a [`Forecast`].
///
/// The model is carried as its specifier only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastParams {
    /// Model name or file path.
    pub model: ModelSpec,
    /// Days forecast per block.
    pub horizon: usize,
    /// Threads used for model prediction (0 = auto).
    pub n_threads: usize,
    /// Replay the forecast over historic data.
    pub test: bool,
}

impl ForecastParams {
    pub fn new(model: impl Into<ModelSpec>, horizon: usize) -> Self {
        Self {
            model: model.into(),
            horizon,
            n_threads: 1,
            test: false,
        }
    }

    pub fn with_n_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads;
        self
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }
}

/// The forecast block algorithm.
///
/// Serializes as its [`ForecastParams`]; rebuild it with
/// [`Forecast::from_params`].
#[derive(Debug, Clone)]
pub struct Forecast {
    params: ForecastParams,
    model: Arc<dyn PointPredictor>,
    columns: FeatureColumns,
}

impl Forecast {
    /// Wrap an already loaded model.
    ///
    /// # Errors
    ///
    /// Fails if a model feature name is not a valid feature column.
    pub fn new(params: ForecastParams, model: Arc<dyn PointPredictor>) -> Result<Self, ModelError> {
        let columns = FeatureColumns::from_names(model.feature_names())?;
        Ok(Self {
            params,
            model,
            columns,
        })
    }

    /// Load the model named by `params.model` and wrap it.
    pub fn from_params(
        params: ForecastParams,
        loader: &dyn ModelLoader,
    ) -> Result<Self, ModelError> {
        let model = loader.load(&params.model)?;
        Self::new(params, model)
    }

    #[inline]
    pub fn params(&self) -> &ForecastParams {
        &self.params
    }

    #[inline]
    pub fn model(&self) -> &Arc<dyn PointPredictor> {
        &self.model
    }

    #[inline]
    pub fn columns(&self) -> &FeatureColumns {
        &self.columns
    }

    /// Past days needed to predict one day.
    #[inline]
    pub fn history(&self) -> usize {
        self.columns.history()
    }

    #[inline]
    pub fn horizon(&self) -> usize {
        self.params.horizon
    }

    #[inline]
    pub fn is_test(&self) -> bool {
        self.params.test
    }

    /// Days each forecast window spans.
    #[inline]
    pub fn window(&self) -> usize {
        self.history().saturating_add(self.horizon())
    }

    /// Input features the forecast reads: the model's features, chlorophyll
    /// and nitrate.
    pub fn required_features(&self) -> Vec<&str> {
        let mut names = self.columns.feature_names();
        for name in [VID_CHL, VID_NO3] {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Number of output days for `days` input days.
    pub fn output_days(&self, days: usize) -> usize {
        if self.params.test {
            (days + 1).saturating_sub(self.window())
        } else {
            self.horizon()
        }
    }

    /// Forecast one block of `(day, lat, lon)` inputs named by `names`.
    ///
    /// # Errors
    ///
    /// - [`AlgorithmError::MissingFeature`] if a required feature is absent.
    /// - [`AlgorithmError::InsufficientHistory`] if the block has fewer than
    ///   `history + horizon` days.
    pub fn forecast(
        &self,
        inputs: &[ArrayView3<'_, f32>],
        names: &[&str],
    ) -> Result<Array3<f32>, AlgorithmError> {
        let features = FeatureTable::new(inputs, names)?;
        for name in self.required_features() {
            features.get(name)?;
        }

        let (days, ny, nx) = features.shape;
        let window = self.window();
        if days < window {
            return Err(AlgorithmError::InsufficientHistory {
                required: window,
                available: days,
            });
        }
        if self.horizon() == 0 {
            return Ok(Array3::zeros((0, ny, nx)));
        }

        if !self.params.test {
            return self.fc(&features, 0, days);
        }

        let n = days - window + 1;
        let mut y = Array3::<f32>::zeros((n, ny, nx));
        for t in 0..n {
            let forecast = self.fc(&features, t, window)?;
            y.index_axis_mut(Axis(0), t)
                .assign(&forecast.index_axis(Axis(0), forecast.len_of(Axis(0)) - 1));
        }
        Ok(y)
    }

    /// Forecast the last `horizon` days of the `len` days starting at `start`.
    fn fc(
        &self,
        features: &FeatureTable<'_, '_>,
        start: usize,
        len: usize,
    ) -> Result<Array3<f32>, AlgorithmError> {
        let horizon = self.horizon();
        let (_, ny, nx) = features.shape;
        let parallelism = Parallelism::from_threads(self.params.n_threads);

        let days = start..start + len;
        let mut chl = features
            .get(VID_CHL)?
            .slice(s![days.clone(), .., ..])
            .to_owned();
        let no3 = features.get(VID_NO3)?.slice(s![days.clone(), .., ..]);
        let sources = self
            .columns
            .iter()
            .map(|c| features.get(&c.name).map(|a| a.slice(s![days.clone(), .., ..])))
            .collect::<Result<Vec<_>, _>>()?;

        let mut table = Array2::<f32>::zeros((ny * nx, self.columns.len()));
        for h in (1..=horizon).rev() {
            let day = len - h;
            for (j, (column, source)) in self.columns.iter().zip(&sources).enumerate() {
                // day >= history >= -offset
                let src_day = (day as i64 + column.offset) as usize;
                let slice = if column.name == VID_CHL {
                    chl.index_axis(Axis(0), src_day)
                } else {
                    source.index_axis(Axis(0), src_day)
                };
                for (dst, &v) in table.column_mut(j).iter_mut().zip(slice.iter()) {
                    *dst = v;
                }
            }

            let predicted = self.model.predict(table.view(), parallelism);
            let mut today = chl.index_axis_mut(Axis(0), day);
            for (dst, &v) in today.iter_mut().zip(predicted.iter()) {
                // clip negatives, keep NaN
                *dst = if v < 0.0 { 0.0 } else { v };
            }
        }

        Zip::from(&mut chl).and(&no3).for_each(|c, &z| {
            if !z.is_finite() {
                *c = f32::NAN;
            }
        });

        Ok(chl.slice_move(s![len - horizon.., .., ..]))
    }
}

impl Serialize for Forecast {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.params.serialize(serializer)
    }
}

impl BlockAlgorithm for Forecast {
    fn name(&self) -> &str {
        "forecast"
    }

    fn dtype(&self) -> DType {
        DType::Float32
    }

    fn output_chunk_shape(&self, inputs: &[&ChunkLayout]) -> Option<Vec<usize>> {
        let chunk = inputs.first()?.chunk_shape();
        let days = chunk.first().copied().unwrap_or(0);
        let n = if self.params.test && self.horizon() > 0 {
            // a short block still yields one planned day and fails with
            // InsufficientHistory when computed
            self.output_days(days).max(1)
        } else {
            self.output_days(days)
        };
        let mut shape = chunk;
        if let Some(first) = shape.first_mut() {
            *first = n;
        }
        Some(shape)
    }

    fn resized_axes(&self) -> BTreeSet<usize> {
        BTreeSet::from([0])
    }

    fn compute_block(
        &self,
        inputs: &[ArrayViewD<'_, f32>],
        names: &[&str],
    ) -> Result<ArrayD<f32>, AlgorithmError> {
        let inputs = inputs
            .iter()
            .zip(names)
            .map(|(a, name)| {
                a.view()
                    .into_dimensionality::<Ix3>()
                    .map_err(|_| AlgorithmError::InputRankMismatch {
                        name: name.to_string(),
                        expected: 3,
                        actual: a.ndim(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.forecast(&inputs, names).map(Array3::into_dyn)
    }
}

/// Input blocks by feature name. The first block bound to a name wins.
struct FeatureTable<'a, 'n> {
    arrays: HashMap<&'n str, ArrayView3<'a, f32>>,
    shape: (usize, usize, usize),
}

impl<'a, 'n> FeatureTable<'a, 'n> {
    fn new(inputs: &[ArrayView3<'a, f32>], names: &[&'n str]) -> Result<Self, AlgorithmError> {
        if inputs.len() != names.len() {
            return Err(AlgorithmError::InputCountMismatch {
                expected: names.len(),
                actual: inputs.len(),
            });
        }
        let shape = inputs.first().map_or((0, 0, 0), |a| a.dim());
        let mut arrays = HashMap::with_capacity(inputs.len());
        for (array, &name) in inputs.iter().zip(names) {
            if array.dim() != shape {
                return Err(AlgorithmError::InputShapeMismatch {
                    name: name.to_string(),
                    expected: vec![shape.0, shape.1, shape.2],
                    actual: array.shape().to_vec(),
                });
            }
            arrays.entry(name).or_insert_with(|| array.clone());
        }
        Ok(Self { arrays, shape })
    }

    fn get(&self, name: &str) -> Result<&ArrayView3<'a, f32>, AlgorithmError> {
        self.arrays
            .get(name)
            .ok_or_else(|| AlgorithmError::MissingFeature(name.to_string()))
    }
}
