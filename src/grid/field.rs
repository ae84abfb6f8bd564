//! A decoded U/V wind field and the point lookups the resolver needs.

use crate::grid::error::GridError;
use crate::grid::projection::GridGeometry;
use crate::types::lat_lon::LatLon;
use crate::types::wind_speed::wind_speed;
use chrono::NaiveDateTime;
use log::debug;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A grid cell selected for a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Row-major index into the field arrays.
    pub index: usize,
    pub row: usize,
    pub col: usize,
    /// Coordinate of the cell center.
    pub location: LatLon,
}

/// U and V wind components on a 2-D grid, with per-cell coordinates.
///
/// All arrays are stored row-major (column index varies fastest) and have
/// `nx * ny` elements. Longitudes are in [-180, 180) for fields produced by the
/// URMA provider; fields built by hand are used as given.
#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
    nx: usize,
    ny: usize,
    lats: Vec<f64>,
    lons: Vec<f64>,
    u: Vec<f32>,
    v: Vec<f32>,
    valid_time: Option<NaiveDateTime>,
    geometry: Option<GridGeometry>,
}

impl GridField {
    /// Creates a field from coordinate and component arrays.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Empty`] for a grid without cells and
    /// [`GridError::ShapeMismatch`] when any array length differs from `nx * ny`.
    pub fn new(
        nx: usize,
        ny: usize,
        lats: Vec<f64>,
        lons: Vec<f64>,
        u: Vec<f32>,
        v: Vec<f32>,
    ) -> Result<Self, GridError> {
        let expected = nx * ny;
        if expected == 0 {
            return Err(GridError::Empty);
        }
        for (array, found) in [
            ("latitude", lats.len()),
            ("longitude", lons.len()),
            ("u", u.len()),
            ("v", v.len()),
        ] {
            if found != expected {
                return Err(GridError::ShapeMismatch {
                    array,
                    nx,
                    ny,
                    expected,
                    found,
                });
            }
        }
        Ok(Self {
            nx,
            ny,
            lats,
            lons,
            u,
            v,
            valid_time: None,
            geometry: None,
        })
    }

    /// Creates a field whose coordinates are computed from a grid geometry.
    pub fn from_geometry(
        geometry: GridGeometry,
        u: Vec<f32>,
        v: Vec<f32>,
    ) -> Result<Self, GridError> {
        let (lats, lons) = geometry.coordinates();
        let field = Self::new(geometry.nx, geometry.ny, lats, lons, u, v)?;
        Ok(field.with_geometry(geometry))
    }

    pub fn with_valid_time(mut self, valid_time: NaiveDateTime) -> Self {
        self.valid_time = Some(valid_time);
        self
    }

    pub fn with_geometry(mut self, geometry: GridGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn valid_time(&self) -> Option<NaiveDateTime> {
        self.valid_time
    }

    pub fn geometry(&self) -> Option<&GridGeometry> {
        self.geometry.as_ref()
    }

    pub fn location(&self, index: usize) -> LatLon {
        LatLon(self.lats[index], self.lons[index])
    }

    fn cell(&self, index: usize) -> GridCell {
        GridCell {
            index,
            row: index / self.nx,
            col: index % self.nx,
            location: self.location(index),
        }
    }

    /// Finds the cell minimizing `|Δlat| + |Δlon|` to `location`.
    ///
    /// This is an L1 proxy in degrees, not a geodesic nearest neighbour: it ignores
    /// meridian convergence and does not wrap across the antimeridian. When several
    /// cells share the minimum score the first one in row-major order wins. Cells
    /// with a NaN coordinate never win.
    pub fn nearest_cell(&self, location: LatLon) -> Result<GridCell, GridError> {
        let (index, score) = self
            .lats
            .iter()
            .zip(&self.lons)
            .map(|(&lat, &lon)| LatLon(lat, lon).l1_degrees(&location))
            .enumerate()
            .filter(|(_, score)| !score.is_nan())
            .min_by_key(|(_, score)| OrderedFloat(*score))
            .ok_or(GridError::NoValidCells)?;

        let cell = self.cell(index);
        debug!(
            "Nearest cell to {} is row {}, col {} at {} (score {:.5})",
            location, cell.row, cell.col, cell.location, score
        );
        Ok(cell)
    }

    /// U and V components of a cell, in m/s.
    pub fn wind_at(&self, index: usize) -> Result<(f64, f64), GridError> {
        let u = f64::from(self.u[index]);
        let v = f64::from(self.v[index]);
        if u.is_nan() || v.is_nan() {
            return Err(GridError::MissingData {
                row: index / self.nx,
                col: index % self.nx,
            });
        }
        Ok((u, v))
    }

    fn speed_at(&self, row: usize, col: usize) -> Result<f64, GridError> {
        let (u, v) = self.wind_at(row * self.nx + col)?;
        Ok(wind_speed(u, v))
    }

    /// Bilinearly interpolates wind speed at `location`.
    ///
    /// Speed is computed at the four surrounding cells first and then interpolated.
    /// Requires the field to carry a [`GridGeometry`].
    pub fn interpolate_speed(&self, location: LatLon) -> Result<f64, GridError> {
        let geometry = self.geometry.as_ref().ok_or(GridError::NoProjection)?;
        let (row, col) = geometry.fractional_position(location);

        let max_row = (self.ny - 1) as f64;
        let max_col = (self.nx - 1) as f64;
        if !(0.0..=max_row).contains(&row) || !(0.0..=max_col).contains(&col) {
            return Err(GridError::OutsideGrid {
                lat: location.0,
                lon: location.1,
            });
        }

        let r0 = (row.floor() as usize).min(self.ny.saturating_sub(2));
        let c0 = (col.floor() as usize).min(self.nx.saturating_sub(2));
        let r1 = (r0 + 1).min(self.ny - 1);
        let c1 = (c0 + 1).min(self.nx - 1);
        let fr = row - r0 as f64;
        let fc = col - c0 as f64;

        let s00 = self.speed_at(r0, c0)?;
        let s01 = self.speed_at(r0, c1)?;
        let s10 = self.speed_at(r1, c0)?;
        let s11 = self.speed_at(r1, c1)?;

        let bottom = s00 * (1.0 - fc) + s01 * fc;
        let top = s10 * (1.0 - fc) + s11 * fc;
        Ok(bottom * (1.0 - fr) + top * fr)
    }
}
