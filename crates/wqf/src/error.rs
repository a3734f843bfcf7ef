//! Crate-level error type.

use crate::block::{BlockError, GeometryError};
use crate::config::ConfigError;
use crate::data::{BuilderError, LayoutError};
use crate::model::ModelError;

/// Any failure of a forecast run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("source dataset has no variable '{0}'")]
    MissingVariable(String),

    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
