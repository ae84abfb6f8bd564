//! Defines the analysis products the provider knows how to locate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the gridded analysis product wind data is read from.
///
/// Only the 2.5 km CONUS URMA is supported. The identifier is passed to
/// [`crate::GridProvider::fetch_grid`] so that alternative providers can reject
/// products they do not serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// Un-Restricted Mesoscale Analysis, CONUS 2.5 km grid, hourly.
    Urma,
}

impl Model {
    pub fn id(&self) -> &'static str {
        match self {
            Model::Urma => "urma",
        }
    }

    /// Directory and file name prefix used by NOAA for this product.
    pub(crate) fn product_prefix(&self) -> &'static str {
        match self {
            Model::Urma => "urma2p5",
        }
    }

    /// Name of the analysis file within a cycle directory, minus the cycle prefix.
    pub(crate) fn analysis_suffix(&self) -> &'static str {
        match self {
            Model::Urma => "2dvaranl_ndfd.grb2_wexp",
        }
    }
}

/// Allows formatting a `Model` variant using its identifier.
///
/// # Examples
///
/// ```
/// use urma_wind::Model;
///
/// assert_eq!(Model::Urma.to_string(), "urma");
/// ```
impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
