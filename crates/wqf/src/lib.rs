//! wqf: autoregressive water quality forecasts.
//!
//! Forecasts daily chlorophyll concentration over `(time, lat, lon)` data
//! cubes with a gradient-boosted tree model loaded from XGBoost JSON.
//!
//! # Key Types
//!
//! - [`ForecastConfig`] - Validated run configuration
//! - [`ForecastOp`] - Turns a source [`Dataset`] into a forecast dataset
//! - [`Forecast`] / [`Gaussian`] - Block algorithms run by the [`BlockEngine`]
//! - [`DatasetBuilder`] - Incremental, validated dataset assembly
//!
//! # Forecasting
//!
//! Configure with `ForecastConfig::builder()`, pick a [`model::ModelLoader`]
//! (usually a [`FileModelLoader`] over a [`ModelRegistry`]) and run a
//! [`ForecastOp`] on the source dataset. See the [`algorithms`] module for
//! the forecast itself and [`block`] for how chunked inputs are processed.

pub mod algorithms;
pub mod block;
pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod logger;
pub mod model;
pub mod operators;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Configuration
pub use config::{ChunkSize, ConfigError, ForecastConfig, Mode};

// Operators and algorithms
pub use algorithms::{Forecast, ForecastParams, Gaussian};
pub use block::{BlockAlgorithm, BlockEngine};
pub use operators::{ForecastOp, Operator};

// Models
pub use model::{FileModelLoader, ModelRegistry, ModelSpec, PointPredictor, TreeModel};

// Data types
pub use data::{ChunkedArray, DType, Dataset, DatasetBuilder};

// Errors and logging
pub use error::Error;
pub use logger::{ForecastLogger, Verbosity};

// Shared utilities
pub use utils::{run_with_threads, Parallelism};
