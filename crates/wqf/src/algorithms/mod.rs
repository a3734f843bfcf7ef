//! Block algorithms of the forecast processor.

mod forecast;
mod gaussian;

pub use forecast::{Forecast, ForecastParams};
pub use gaussian::Gaussian;
