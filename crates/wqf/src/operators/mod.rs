//! Operators turn a source dataset into a result dataset.

mod forecast_op;

pub use forecast_op::ForecastOp;

use crate::data::Dataset;
use crate::error::Error;

/// A processing step over labeled datasets.
pub trait Operator {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Run the operator on `source`.
    fn run(&self, source: &Dataset) -> Result<Dataset, Error>;
}
