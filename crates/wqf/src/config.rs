//! Forecast configuration with builder pattern.
//!
//! # Example
//!
//! ```
//! use wqf::config::{ChunkSize, ForecastConfig, Mode};
//!
//! let config = ForecastConfig::builder()
//!     .model("ns-central")
//!     .horizon(3)
//!     .gaussian_filter(2.0)
//!     .chunk_size_lat(ChunkSize::Fixed(256))
//!     .mode(Mode::Synchronous)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.horizon, 3);
//! ```

use std::fmt;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::algorithms::ForecastParams;
use crate::logger::Verbosity;
use crate::model::ModelSpec;

// =============================================================================
// ConfigError
// =============================================================================

/// Rejected forecast settings.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Horizon must be at least 1.
    InvalidHorizon,
    /// Filter width must be positive and finite.
    InvalidFilterWidth(f32),
    /// A fixed chunk size must be at least 1.
    InvalidChunkSize { field: &'static str },
    /// The configuration document could not be parsed.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHorizon => write!(f, "horizon must be at least 1"),
            Self::InvalidFilterWidth(v) => {
                write!(f, "gaussian_filter must be positive, got {}", v)
            }
            Self::InvalidChunkSize { field } => {
                write!(f, "{} must be at least 1 when fixed", field)
            }
            Self::Parse(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// Option types
// =============================================================================

/// Chunking of a spatial axis for processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkSize {
    /// Keep the source chunking.
    #[default]
    Source,
    /// One chunk spanning the axis.
    Full,
    /// Chunks of the given number of pixels.
    Fixed(usize),
}

impl ChunkSize {
    /// Chunk size for an axis of `len` elements whose source chunks have
    /// `source` elements.
    pub fn resolve(self, len: usize, source: usize) -> usize {
        match self {
            ChunkSize::Source => source,
            ChunkSize::Full => len,
            ChunkSize::Fixed(n) => n.min(len),
        }
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkSize::Source => f.write_str("source"),
            ChunkSize::Full => f.write_str("full"),
            ChunkSize::Fixed(n) => write!(f, "{n}"),
        }
    }
}

/// Block scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Blocks run concurrently on a worker pool.
    #[default]
    Multithreading,
    /// Blocks run one after another on the calling thread.
    Synchronous,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Multithreading => f.write_str("multithreading"),
            Mode::Synchronous => f.write_str("synchronous"),
        }
    }
}

// =============================================================================
// ForecastConfig
// =============================================================================

/// Configuration of a forecast run.
///
/// Build with [`ForecastConfig::builder`], or parse a JSON document with
/// [`ForecastConfig::from_json`]; both validate.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct ForecastConfig {
    /// Registered model name or model file path.
    #[builder(into)]
    pub model: ModelSpec,

    /// Forecast horizon (days). Default: 1.
    #[builder(default = 1)]
    #[serde(default = "default_horizon")]
    pub horizon: usize,

    /// Threads used for model prediction. `0` = auto. Default: 1.
    #[builder(default = 1)]
    #[serde(default = "default_n_threads")]
    pub n_threads: usize,

    /// Replay the forecast over the whole source period. Default: false.
    #[builder(default)]
    #[serde(default)]
    pub test: bool,

    /// Full width at half maximum (pixels) of the lateral smoothing filter.
    /// `None` disables the filter.
    #[serde(default)]
    pub gaussian_filter: Option<f32>,

    /// Latitude chunking. Default: source chunking.
    #[builder(default)]
    #[serde(default)]
    pub chunk_size_lat: ChunkSize,

    /// Longitude chunking. Default: source chunking.
    #[builder(default)]
    #[serde(default)]
    pub chunk_size_lon: ChunkSize,

    /// Block scheduler. Default: multithreading.
    #[builder(default)]
    #[serde(default)]
    pub mode: Mode,

    /// Worker threads in multithreading mode. `0` = all cores.
    #[builder(default)]
    #[serde(default)]
    pub n_workers: usize,

    /// Log verbosity (`Silent` unless set).
    #[builder(default)]
    #[serde(default)]
    pub verbosity: Verbosity,
}

fn default_horizon() -> usize {
    1
}

fn default_n_threads() -> usize {
    1
}

/// Validating finisher for the generated builder.
impl<S: forecast_config_builder::IsComplete> ForecastConfigBuilder<S> {
    /// Finish the builder, rejecting inconsistent settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any parameter is invalid.
    pub fn build(self) -> Result<ForecastConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl ForecastConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::InvalidHorizon);
        }
        if let Some(fwhm) = self.gaussian_filter {
            if !(fwhm.is_finite() && fwhm > 0.0) {
                return Err(ConfigError::InvalidFilterWidth(fwhm));
            }
        }
        for (field, size) in [
            ("chunk_size_lat", self.chunk_size_lat),
            ("chunk_size_lon", self.chunk_size_lon),
        ] {
            if size == ChunkSize::Fixed(0) {
                return Err(ConfigError::InvalidChunkSize { field });
            }
        }
        Ok(())
    }

    /// Parameters of the forecast algorithm.
    pub fn forecast_params(&self) -> ForecastParams {
        ForecastParams::new(self.model.clone(), self.horizon)
            .with_n_threads(self.n_threads)
            .with_test(self.test)
    }

    /// Every field as a `(name, value)` pair, sorted by name.
    pub fn to_attrs(&self) -> Vec<(&'static str, String)> {
        let gaussian_filter = match self.gaussian_filter {
            Some(v) => v.to_string(),
            None => "none".to_string(),
        };
        let mut attrs = vec![
            ("model", self.model.to_string()),
            ("horizon", self.horizon.to_string()),
            ("n_threads", self.n_threads.to_string()),
            ("test", self.test.to_string()),
            ("gaussian_filter", gaussian_filter),
            ("chunk_size_lat", self.chunk_size_lat.to_string()),
            ("chunk_size_lon", self.chunk_size_lon.to_string()),
            ("mode", self.mode.to_string()),
            ("n_workers", self.n_workers.to_string()),
            ("verbosity", self.verbosity.to_string()),
        ];
        attrs.sort_by_key(|(name, _)| *name);
        attrs
    }
}
