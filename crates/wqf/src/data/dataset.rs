//! Labeled datasets.

use std::collections::BTreeMap;

use super::chunked::ChunkedArray;

/// A named array bound to an ordered tuple of dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    dims: Vec<String>,
    data: ChunkedArray,
}

impl Variable {
    pub(crate) fn new(dims: Vec<String>, data: ChunkedArray) -> Self {
        Self { dims, data }
    }

    /// Dimension identifiers, one per array axis.
    #[inline]
    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    #[inline]
    pub fn data(&self) -> &ChunkedArray {
        &self.data
    }

    /// Whether the variable is laid out along exactly `dims`.
    pub fn has_dims(&self, dims: &[&str]) -> bool {
        self.dims.len() == dims.len() && self.dims.iter().zip(dims).all(|(a, b)| a == b)
    }
}

/// An immutable labeled dataset.
///
/// Variables whose identifier also names a dimension are coordinates; all
/// other variables are data variables. The partition is a naming
/// convention only: both kinds live in the same map.
///
/// Datasets are assembled with [`DatasetBuilder`](super::DatasetBuilder).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    dims: BTreeMap<String, usize>,
    variables: BTreeMap<String, Variable>,
    attrs: BTreeMap<String, String>,
}

impl Dataset {
    pub(crate) fn from_parts(
        dims: BTreeMap<String, usize>,
        variables: BTreeMap<String, Variable>,
        attrs: BTreeMap<String, String>,
    ) -> Self {
        Self {
            dims,
            variables,
            attrs,
        }
    }

    /// Dimension sizes by identifier.
    #[inline]
    pub fn dims(&self) -> &BTreeMap<String, usize> {
        &self.dims
    }

    pub fn dim_size(&self, did: &str) -> Option<usize> {
        self.dims.get(did).copied()
    }

    pub fn variable(&self, vid: &str) -> Option<&Variable> {
        self.variables.get(vid)
    }

    pub fn contains(&self, vid: &str) -> bool {
        self.variables.contains_key(vid)
    }

    /// Whether `vid` is a coordinate variable.
    pub fn is_coord(&self, vid: &str) -> bool {
        self.variables.contains_key(vid) && self.dims.contains_key(vid)
    }

    /// Coordinate variables in identifier order.
    pub fn coords(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables
            .iter()
            .filter(|(vid, _)| self.dims.contains_key(vid.as_str()))
            .map(|(vid, var)| (vid.as_str(), var))
    }

    /// Data variables in identifier order.
    pub fn data_vars(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables
            .iter()
            .filter(|(vid, _)| !self.dims.contains_key(vid.as_str()))
            .map(|(vid, var)| (vid.as_str(), var))
    }

    /// Global attributes.
    #[inline]
    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}
