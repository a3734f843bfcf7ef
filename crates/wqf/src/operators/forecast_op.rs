//! The forecast operator.

use std::sync::Arc;

use crate::algorithms::{Forecast, Gaussian};
use crate::block::{BlockAlgorithm, BlockEngine};
use crate::config::{ChunkSize, ForecastConfig, Mode};
use crate::constants::{DID_DEP, DID_LAT, DID_LON, DID_TIM, VID_CHL, VID_LAT, VID_LON, VID_TIM};
use crate::data::{ChunkedArray, Dataset, DatasetBuilder};
use crate::error::Error;
use crate::logger::ForecastLogger;
use crate::model::ModelLoader;
use crate::utils::{run_with_threads, Parallelism};

use super::Operator;

/// Produces a chlorophyll forecast dataset from a source data cube.
///
/// Every `(time, lat, lon)` data variable of the source is offered to the
/// forecast model as a feature. The result has the dimensions `time`, `lat`
/// and `lon`, the coordinates of the same names, one data variable `chl`,
/// and the configuration as global attributes.
pub struct ForecastOp {
    config: ForecastConfig,
    loader: Arc<dyn ModelLoader>,
    logger: ForecastLogger,
}

impl ForecastOp {
    pub fn new(config: ForecastConfig, loader: Arc<dyn ModelLoader>) -> Self {
        let logger = ForecastLogger::new(config.verbosity);
        Self {
            config,
            loader,
            logger,
        }
    }

    #[inline]
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Feature arrays rechunked for processing: one chunk along time, lat
    /// and lon chunked per configuration.
    fn features(&self, source: &Dataset) -> Vec<(String, ChunkedArray)> {
        let mut vars = Vec::new();
        for (name, v) in source.data_vars() {
            if v.has_dims(&[DID_TIM, DID_LAT, DID_LON]) {
                vars.push((name, v));
            } else if v.dims().iter().any(|d| d == DID_DEP) {
                self.logger
                    .warn(&format!("ignoring '{name}': select a single {DID_DEP} level first"));
            }
        }
        let Some((_, first)) = vars.first() else {
            return Vec::new();
        };

        let shape = first.data().shape().to_vec();
        let source_chunk = |axis: usize| {
            vars.iter()
                .map(|(_, v)| v.data().chunk_shape()[axis])
                .min()
                .unwrap_or(shape[axis])
        };
        let lateral = |did: &str, size: ChunkSize, axis: usize| {
            if let ChunkSize::Fixed(n) = size {
                if n > shape[axis] {
                    self.logger.warn(&format!(
                        "{did} chunk size {n} exceeds {did} length {}",
                        shape[axis]
                    ));
                }
            }
            size.resolve(shape[axis], source_chunk(axis))
        };
        let chunks = [
            shape[0],
            lateral(DID_LAT, self.config.chunk_size_lat, 1),
            lateral(DID_LON, self.config.chunk_size_lon, 2),
        ];

        vars.into_iter()
            .map(|(name, v)| (name.to_string(), v.data().rechunk(&chunks)))
            .collect()
    }

    fn apply<A: BlockAlgorithm + ?Sized>(
        &self,
        engine: &BlockEngine,
        algorithm: &A,
        inputs: &[(&str, &ChunkedArray)],
    ) -> Result<ChunkedArray, Error> {
        let plan = engine.plan(algorithm, inputs)?;
        self.logger.debug(&format!(
            "{}: {} blocks, output chunks {:?}",
            algorithm.name(),
            plan.n_blocks(),
            plan.geometry().output().chunk_shape()
        ));
        Ok(engine.execute(&plan)?)
    }

    fn compute(
        &self,
        forecast: &Forecast,
        features: &[(String, ChunkedArray)],
        parallelism: Parallelism,
    ) -> Result<ChunkedArray, Error> {
        let engine = BlockEngine::new(parallelism);
        let inputs: Vec<(&str, &ChunkedArray)> =
            features.iter().map(|(n, a)| (n.as_str(), a)).collect();
        let mut array = self.apply(&engine, forecast, &inputs)?;

        if let Some(fwhm) = self.config.gaussian_filter {
            self.logger.info(&format!("applying gaussian filter (fwhm = {fwhm})"));
            let gaussian = Gaussian::from_fwhm(fwhm).with_dtype(array.dtype());
            array = self.apply(&engine, &gaussian, &[(VID_CHL, &array)])?;
        }
        Ok(array)
    }
}

impl Operator for ForecastOp {
    fn name(&self) -> &str {
        "forecast"
    }

    fn run(&self, source: &Dataset) -> Result<Dataset, Error> {
        for (name, value) in self.config.to_attrs() {
            self.logger.config(name, &value);
        }

        self.logger
            .debug(&format!("loading forecast model: {}", self.config.model));
        let forecast = Forecast::from_params(self.config.forecast_params(), self.loader.as_ref())?;
        self.logger.info(&format!(
            "forecast model: {} columns, history {} days, horizon {} days",
            forecast.columns().len(),
            forecast.history(),
            forecast.horizon()
        ));

        let features = self.features(source);
        if features.is_empty() {
            return Err(Error::MissingVariable(VID_CHL.to_string()));
        }

        let array = match self.config.mode {
            Mode::Synchronous => self.compute(&forecast, &features, Parallelism::Sequential)?,
            Mode::Multithreading => run_with_threads(self.config.n_workers, |parallelism| {
                self.compute(&forecast, &features, parallelism)
            })??,
        };

        let coord = |vid: &str| {
            source
                .variable(vid)
                .ok_or_else(|| Error::MissingVariable(vid.to_string()))
        };
        let time = coord(VID_TIM)?.data();
        let lat = coord(VID_LAT)?.data();
        let lon = coord(VID_LON)?.data();

        let shape = array.shape().to_vec();
        let n_days = shape[0];
        let n_source_days = time.shape()[0];
        let time_tail = time.slice_axis(0, n_source_days.saturating_sub(n_days)..n_source_days);

        let mut builder = DatasetBuilder::new();
        for (name, value) in self.config.to_attrs() {
            builder.add_attr(name, value);
        }
        builder
            .declare_dimension(DID_TIM, shape[0])?
            .declare_dimension(DID_LAT, shape[1])?
            .declare_dimension(DID_LON, shape[2])?;
        builder
            .declare_variable(VID_TIM, &[DID_TIM])?
            .declare_variable(VID_LAT, &[DID_LAT])?
            .declare_variable(VID_LON, &[DID_LON])?
            .declare_variable(VID_CHL, &[DID_TIM, DID_LAT, DID_LON])?;
        builder
            .bind_array(VID_TIM, time_tail)?
            .bind_array(VID_LAT, lat.clone())?
            .bind_array(VID_LON, lon.clone())?
            .bind_array(VID_CHL, array)?;

        self.logger
            .info(&format!("forecast result: {n_days} days of {} x {} pixels", shape[1], shape[2]));
        Ok(builder.build())
    }
}
