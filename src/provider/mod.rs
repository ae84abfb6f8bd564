//! Sources of gridded wind data.
//!
//! The resolver only sees the [`GridProvider`] trait. [`urma::UrmaProvider`] is the
//! production implementation that downloads and caches NOAA files; tests plug in an
//! in-memory provider instead.

pub mod error;
pub mod grib2;
pub mod index;
pub mod urma;

use crate::grid::field::GridField;
use crate::provider::error::ProviderError;
use crate::types::model::Model;
use chrono::NaiveDateTime;
use std::future::Future;

/// Supplies the U/V wind field of an analysis product for one timestamp.
pub trait GridProvider {
    /// Fetches the field of `model` valid at `valid_time`.
    ///
    /// Implementations report data that does not exist with an error for which
    /// [`ProviderError::is_not_found`] is `true`.
    fn fetch_grid(
        &self,
        model: Model,
        valid_time: NaiveDateTime,
    ) -> impl Future<Output = Result<GridField, ProviderError>> + Send;
}
