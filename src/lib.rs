mod error;
mod grid;
mod provider;
mod types;
mod urma_wind;
mod utils;

#[cfg(test)]
mod test_support;

pub use error::WindSpeedError;
pub use urma_wind::*;

pub use types::lat_lon::LatLon;
pub use types::model::Model;
pub use types::query::{parse_timestamp, Query, TIMESTAMP_FORMAT};
pub use types::wind_speed::{format_failure, format_success, wind_speed, SpatialPolicy, WindSpeed};

pub use grid::error::GridError;
pub use grid::field::{GridCell, GridField};
pub use grid::projection::{
    GridGeometry, LambertConformal, Projection, RegularLatLon, ScanningMode, NCEP_EARTH_RADIUS_M,
    URMA_CONUS_SHAPE,
};

pub use provider::error::ProviderError;
pub use provider::grib2::decode_wind_field;
pub use provider::index::{ByteRange, IndexEntry, IndexTarget};
pub use provider::urma::{analysis_cycle, Source, UrmaProvider};
pub use provider::GridProvider;
