//! Feature columns encoded in model feature names.
//!
//! A model declares one name per input column. Names of the form
//! `t-<n>_<feature>` refer to `<feature>` observed `n` days before the day
//! being predicted; any other name refers to the same day.

use std::fmt;

use super::ModelError;

/// Largest lag, in days, a feature column may declare.
pub const MAX_LAG_DAYS: i64 = 36_525;

/// One model input column: a feature observed at a day offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureColumn {
    /// Day offset relative to the predicted day (`0`, `-1`, `-2`, ...).
    pub offset: i64,
    /// Feature (variable) name.
    pub name: String,
}

impl FeatureColumn {
    /// Parse a column from a model feature name.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidFeatureName`] when a name starts with
    /// `t-` but does not continue with `<integer>_<feature>`, or when the lag
    /// exceeds [`MAX_LAG_DAYS`].
    pub fn parse(feature_name: &str) -> Result<Self, ModelError> {
        let lagged = feature_name.starts_with("t-");
        let Some(rest) = feature_name.strip_prefix('t').filter(|_| lagged) else {
            return Ok(Self {
                offset: 0,
                name: feature_name.to_string(),
            });
        };
        let invalid = || ModelError::InvalidFeatureName(feature_name.to_string());
        let (offset, name) = rest.split_once('_').ok_or_else(invalid)?;
        let offset: i64 = offset.parse().map_err(|_| invalid())?;
        if name.is_empty() || offset < -MAX_LAG_DAYS {
            return Err(invalid());
        }
        Ok(Self {
            offset,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset == 0 {
            f.write_str(&self.name)
        } else {
            write!(f, "t{}_{}", self.offset, self.name)
        }
    }
}

/// The ordered input columns of a model.
///
/// Column order is the model's declared feature order. Prediction tables
/// must be stacked in exactly this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureColumns {
    columns: Vec<FeatureColumn>,
    history: usize,
}

impl FeatureColumns {
    /// Parse the columns of a model from its declared feature names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ModelError> {
        let columns = names
            .iter()
            .map(|n| FeatureColumn::parse(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let history = columns
            .iter()
            .map(|c| c.offset)
            .min()
            .map_or(0, |min| min.unsigned_abs() as usize);
        Ok(Self { columns, history })
    }

    /// Number of past days needed to predict one day.
    #[inline]
    pub fn history(&self) -> usize {
        self.history
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureColumn> {
        self.columns.iter()
    }

    /// Distinct feature names in first-use order.
    pub fn feature_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for c in &self.columns {
            if !names.contains(&c.name.as_str()) {
                names.push(&c.name);
            }
        }
        names
    }
}

impl<'a> IntoIterator for &'a FeatureColumns {
    type Item = &'a FeatureColumn;
    type IntoIter = std::slice::Iter<'a, FeatureColumn>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
