//! Dimension and variable identifiers of forecast data cubes.

/// The time dimension identifier.
pub const DID_TIM: &str = "time";
/// The latitude dimension identifier.
pub const DID_LAT: &str = "lat";
/// The longitude dimension identifier.
pub const DID_LON: &str = "lon";
/// The depth dimension identifier. Variables along it are not forecast
/// features.
pub const DID_DEP: &str = "depth";

/// The time coordinate variable identifier.
pub const VID_TIM: &str = "time";
/// The latitude coordinate variable identifier.
pub const VID_LAT: &str = "lat";
/// The longitude coordinate variable identifier.
pub const VID_LON: &str = "lon";

/// Chlorophyll concentration (mg m-3).
///
/// This is the forecast target. Its array is written in place while the
/// forecast walks forward through the horizon.
pub const VID_CHL: &str = "chl";

/// Concentration of nitrates (mmol m-3).
///
/// Non-finite values of this variable mark where chlorophyll forecasts are
/// nullified.
pub const VID_NO3: &str = "no3";
