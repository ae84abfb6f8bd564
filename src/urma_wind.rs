//! The main entry point: resolves a point wind speed from the URMA analysis.
//!
//! [`UrmaWind`] turns a location and timestamp into a [`WindSpeed`] by asking a
//! [`GridProvider`] for the U/V field and reading the value at the requested
//! point. The production provider downloads from NOAA and caches on disk.

use crate::error::WindSpeedError;
use crate::grid::error::GridError;
use crate::grid::field::{GridCell, GridField};
use crate::provider::urma::{Source, UrmaProvider};
use crate::provider::GridProvider;
use crate::types::lat_lon::LatLon;
use crate::types::model::Model;
use crate::types::query::Query;
use crate::types::wind_speed::{wind_speed, SpatialPolicy, WindSpeed};
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use chrono::NaiveDateTime;
use log::{debug, info};
use std::path::PathBuf;

/// Client for resolving near-surface wind speed at a point.
///
/// Create one with [`UrmaWind::new()`] to cache in the default directory,
/// [`UrmaWind::with_cache_folder()`] for a custom location, or
/// [`UrmaWind::configure()`] for full control. Any [`GridProvider`] can be
/// plugged in with [`UrmaWind::with_provider()`].
///
/// # Examples
///
/// ```no_run
/// # use urma_wind::{UrmaWind, WindSpeedError};
/// # async fn run() -> Result<(), WindSpeedError> {
/// let client = UrmaWind::new().await?;
/// let result = client.resolve(40.7128, -74.0060, "2024-12-28 12:00").await?;
/// println!("{}", result);
/// # Ok(())
/// # }
/// ```
pub struct UrmaWind<P = UrmaProvider> {
    provider: P,
    model: Model,
    policy: SpatialPolicy,
}

#[bon]
impl UrmaWind<UrmaProvider> {
    /// Creates a client caching under the system cache directory
    /// (e.g. `~/.cache/urma_wind_rs_cache` on Linux).
    ///
    /// # Errors
    ///
    /// Returns [`WindSpeedError::CacheDirResolution`] if the system cache directory
    /// cannot be determined and [`WindSpeedError::CacheDirCreation`] if it cannot be created.
    pub async fn new() -> Result<Self, WindSpeedError> {
        Self::configure().call().await
    }

    /// Creates a client caching under `cache_folder`, which is created if missing.
    pub async fn with_cache_folder(cache_folder: PathBuf) -> Result<Self, WindSpeedError> {
        Self::configure().save_dir(cache_folder).call().await
    }

    /// Creates a client with explicit provider settings.
    ///
    /// # Optional Builder Methods
    ///
    /// * `.save_dir(PathBuf)`: cache directory. Defaults to the system cache directory.
    /// * `.overwrite(bool)`: download again even when a cached subset exists.
    /// * `.sources(Vec<Source>)`: mirrors to try, in order.
    /// * `.policy(SpatialPolicy)`: policy used by [`UrmaWind::resolve`].
    ///
    /// ```no_run
    /// # use urma_wind::{Source, SpatialPolicy, UrmaWind, WindSpeedError};
    /// # async fn run() -> Result<(), WindSpeedError> {
    /// let client = UrmaWind::configure()
    ///     .overwrite(true)
    ///     .sources(vec![Source::Nomads])
    ///     .policy(SpatialPolicy::Bilinear)
    ///     .call()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn configure(
        save_dir: Option<PathBuf>,
        #[builder(default)] overwrite: bool,
        #[builder(default = Source::priority())] sources: Vec<Source>,
        #[builder(default)] policy: SpatialPolicy,
    ) -> Result<Self, WindSpeedError> {
        let save_dir = match save_dir {
            Some(dir) => dir,
            None => get_cache_dir()?,
        };
        ensure_cache_dir_exists(&save_dir).await?;
        let provider = UrmaProvider::builder()
            .save_dir(save_dir)
            .overwrite(overwrite)
            .sources(sources)
            .build();
        Ok(UrmaWind::with_provider(provider).with_policy(policy))
    }
}

#[bon]
impl<P: GridProvider> UrmaWind<P> {
    pub fn with_provider(provider: P) -> Self {
        Self {
            provider,
            model: Model::Urma,
            policy: SpatialPolicy::default(),
        }
    }

    /// Sets the policy used by [`UrmaWind::resolve`] and by [`UrmaWind::wind_speed`]
    /// when no policy is given.
    pub fn with_policy(mut self, policy: SpatialPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn policy(&self) -> SpatialPolicy {
        self.policy
    }

    /// Resolves the wind speed at `(lat, lon)` for a `YYYY-MM-DD HH:MM` timestamp (UTC).
    ///
    /// With the default policy the result is `sqrt(U² + V²)` at the grid cell
    /// minimizing `|Δlat| + |Δlon|`, the first such cell in row-major order on ties.
    ///
    /// # Errors
    ///
    /// * [`WindSpeedError::Parse`]: the timestamp does not match the format. No data is requested.
    /// * [`WindSpeedError::InvalidCoordinate`]: the coordinate is out of range.
    /// * [`WindSpeedError::DataUnavailable`]: no analysis exists for the timestamp.
    /// * [`WindSpeedError::Fetch`]: retrieving or decoding the analysis failed.
    /// * [`WindSpeedError::Grid`]: the field has no usable cell at the location.
    pub async fn resolve(
        &self,
        lat: f64,
        lon: f64,
        timestamp: &str,
    ) -> Result<WindSpeed, WindSpeedError> {
        let query = Query::parse(lat, lon, timestamp)?;
        self.resolve_query(query, self.policy).await
    }

    /// Builder form of [`UrmaWind::resolve`] for an already parsed timestamp.
    ///
    /// ```no_run
    /// # use urma_wind::{LatLon, SpatialPolicy, UrmaWind, WindSpeedError};
    /// # use chrono::NaiveDate;
    /// # async fn run() -> Result<(), WindSpeedError> {
    /// let client = UrmaWind::new().await?;
    /// let at = NaiveDate::from_ymd_opt(2024, 12, 28).unwrap().and_hms_opt(12, 0, 0).unwrap();
    /// let result = client
    ///     .wind_speed()
    ///     .location(LatLon(40.7128, -74.0060))
    ///     .at(at)
    ///     .policy(SpatialPolicy::NearestCell)
    ///     .call()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn wind_speed(
        &self,
        location: LatLon,
        at: NaiveDateTime,
        policy: Option<SpatialPolicy>,
    ) -> Result<WindSpeed, WindSpeedError> {
        let query = Query::new(location, at)?;
        self.resolve_query(query, policy.unwrap_or(self.policy))
            .await
    }

    async fn resolve_query(
        &self,
        query: Query,
        policy: SpatialPolicy,
    ) -> Result<WindSpeed, WindSpeedError> {
        let Query {
            location,
            timestamp,
        } = query;
        debug!(
            "Resolving {} wind speed at {} for {} ({} policy)",
            self.model, location, timestamp, policy
        );

        let field = self
            .provider
            .fetch_grid(self.model, timestamp)
            .await
            .map_err(|source| WindSpeedError::from_provider(self.model, timestamp, source))?;

        let point = point_value(&field, location, policy)?;
        let result = WindSpeed {
            speed_m_s: point.speed_m_s,
            u: point.components.map(|(u, _)| u),
            v: point.components.map(|(_, v)| v),
            cell_distance_km: point.cell.map(|cell| location.distance_km(&cell.location)),
            cell: point.cell,
            location,
            requested_time: timestamp,
            valid_time: field.valid_time().unwrap_or(timestamp),
            model: self.model,
            policy,
        };
        info!(
            "{} wind speed at {} for {}: {:.2} m/s",
            self.model, location, timestamp, result.speed_m_s
        );
        Ok(result)
    }
}

struct PointValue {
    speed_m_s: f64,
    components: Option<(f64, f64)>,
    cell: Option<GridCell>,
}

fn point_value(
    field: &GridField,
    location: LatLon,
    policy: SpatialPolicy,
) -> Result<PointValue, GridError> {
    match policy {
        SpatialPolicy::NearestCell => {
            let cell = field.nearest_cell(location)?;
            let (u, v) = field.wind_at(cell.index)?;
            Ok(PointValue {
                speed_m_s: wind_speed(u, v),
                components: Some((u, v)),
                cell: Some(cell),
            })
        }
        SpatialPolicy::Bilinear => Ok(PointValue {
            speed_m_s: field.interpolate_speed(location)?,
            components: None,
            cell: None,
        }),
    }
}
