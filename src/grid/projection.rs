//! Mapping between grid indices and geographic coordinates.
//!
//! Two GRIB2 grid definitions are supported:
//! - Template 3.0, a regular latitude/longitude grid.
//! - Template 3.30, Lambert Conformal Conic, which URMA uses for its CONUS domain.
//!
//! Positions are expressed as fractional `(row, col)` pairs in storage order, so
//! scanning-mode flags are applied here and nowhere else.

use crate::types::lat_lon::{normalize_longitude, LatLon};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Radius of the spherical earth assumed by NCEP grids (GRIB2 shape of earth 6).
pub const NCEP_EARTH_RADIUS_M: f64 = 6_371_229.0;

/// `(nx, ny)` of the URMA 2.5 km CONUS grid published in the `wexp` files.
pub const URMA_CONUS_SHAPE: (usize, usize) = (2345, 1597);

/// Scanning mode flags from GRIB2 flag table 3.4 that affect index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanningMode {
    /// Bit 1: points of a row scan in the -i (westward) direction.
    pub negative_i: bool,
    /// Bit 2: rows scan in the +j (northward) direction.
    pub positive_j: bool,
}

impl ScanningMode {
    /// Returns `None` for column-major or boustrophedon layouts (bits 3 and 4).
    pub fn from_flags(flags: u8) -> Option<Self> {
        if flags & 0b0011_0000 != 0 {
            return None;
        }
        Some(Self {
            negative_i: flags & 0b1000_0000 != 0,
            positive_j: flags & 0b0100_0000 != 0,
        })
    }

    fn i_sign(&self) -> f64 {
        if self.negative_i {
            -1.0
        } else {
            1.0
        }
    }

    fn j_sign(&self) -> f64 {
        if self.positive_j {
            1.0
        } else {
            -1.0
        }
    }
}

/// A regular latitude/longitude grid (GRIB2 template 3.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularLatLon {
    /// Latitude of the first grid point, degrees.
    pub lat1: f64,
    /// Longitude of the first grid point, degrees.
    pub lon1: f64,
    /// Longitude increment, degrees.
    pub di: f64,
    /// Latitude increment, degrees.
    pub dj: f64,
}

/// Lambert Conformal Conic projection (GRIB2 template 3.30).
///
/// Grid coordinates are measured in grid lengths from the first grid point, with x
/// growing eastward along the projection plane and y growing northward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambertConformal {
    /// Orientation of the grid (LoV), radians.
    lov: f64,
    dx: f64,
    dy: f64,
    radius: f64,
    /// Cone constant.
    n: f64,
    /// Scaled F constant (`radius * F`).
    rf: f64,
    /// Rho of the first grid point, also used as the origin of projection y.
    rho1: f64,
    /// Projected x/y of the first grid point, meters.
    x1: f64,
    y1: f64,
}

impl LambertConformal {
    /// Builds the projection from template 3.30 parameters.
    ///
    /// # Arguments
    /// * `lat1_deg`, `lon1_deg` - first grid point
    /// * `lov_deg` - orientation of the grid (central meridian)
    /// * `latin1_deg`, `latin2_deg` - standard parallels, equal for a tangent cone
    /// * `dx`, `dy` - grid lengths in meters
    /// * `radius` - earth radius in meters
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lat1_deg: f64,
        lon1_deg: f64,
        lov_deg: f64,
        latin1_deg: f64,
        latin2_deg: f64,
        dx: f64,
        dy: f64,
        radius: f64,
    ) -> Self {
        let lat1 = lat1_deg.to_radians();
        let latin1 = latin1_deg.to_radians();
        let latin2 = latin2_deg.to_radians();
        let lov = lov_deg.to_radians();

        let n = if (latin1 - latin2).abs() < 1e-10 {
            latin1.sin()
        } else {
            (latin1.cos() / latin2.cos()).ln()
                / (half_angle_tan(latin2) / half_angle_tan(latin1)).ln()
        };
        let rf = radius * latin1.cos() * half_angle_tan(latin1).powf(n) / n;
        let rho1 = rf / half_angle_tan(lat1).powf(n);

        let theta1 = n * wrap_radians(lon1_deg.to_radians() - lov);
        let x1 = rho1 * theta1.sin();
        let y1 = rho1 - rho1 * theta1.cos();

        Self {
            lov,
            dx,
            dy,
            radius,
            n,
            rf,
            rho1,
            x1,
            y1,
        }
    }

    /// The 2.5 km CONUS grid used by URMA, see [`URMA_CONUS_SHAPE`].
    pub fn urma_conus() -> Self {
        Self::new(
            19.228976,
            233.723448,
            265.0,
            25.0,
            25.0,
            2539.703,
            2539.703,
            NCEP_EARTH_RADIUS_M,
        )
    }

    pub fn earth_radius(&self) -> f64 {
        self.radius
    }

    /// Converts geographic coordinates to fractional grid coordinates.
    pub fn geo_to_grid(&self, location: LatLon) -> (f64, f64) {
        let lat = location.0.to_radians();
        let theta = self.n * wrap_radians(location.1.to_radians() - self.lov);
        let rho = self.rf / half_angle_tan(lat).powf(self.n);

        let x = rho * theta.sin();
        let y = self.rho1 - rho * theta.cos();
        ((x - self.x1) / self.dx, (y - self.y1) / self.dy)
    }

    /// Converts fractional grid coordinates to geographic coordinates.
    pub fn grid_to_geo(&self, x: f64, y: f64) -> LatLon {
        let px = self.x1 + x * self.dx;
        let py = self.rho1 - (self.y1 + y * self.dy);

        let (rho, theta) = if self.n < 0.0 {
            (-(px * px + py * py).sqrt(), (-px).atan2(-py))
        } else {
            ((px * px + py * py).sqrt(), px.atan2(py))
        };

        let lat = 2.0 * (self.rf / rho).powf(1.0 / self.n).atan() - PI / 2.0;
        let lon = self.lov + theta / self.n;
        LatLon(lat.to_degrees(), normalize_longitude(lon.to_degrees()))
    }
}

/// Supported grid definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    LatLon(RegularLatLon),
    Lambert(LambertConformal),
}

/// Everything needed to locate cells of a decoded field on the globe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub projection: Projection,
    pub scanning: ScanningMode,
    pub nx: usize,
    pub ny: usize,
}

impl GridGeometry {
    /// Location of the cell stored at `row`, `col`.
    pub fn cell_location(&self, row: usize, col: usize) -> LatLon {
        let x = self.scanning.i_sign() * col as f64;
        let y = self.scanning.j_sign() * row as f64;
        match &self.projection {
            Projection::LatLon(grid) => LatLon(
                grid.lat1 + y * grid.dj,
                normalize_longitude(grid.lon1 + x * grid.di),
            ),
            Projection::Lambert(lambert) => lambert.grid_to_geo(x, y),
        }
    }

    /// Fractional `(row, col)` storage position of a location. The result may lie
    /// outside the grid.
    pub fn fractional_position(&self, location: LatLon) -> (f64, f64) {
        let i_sign = self.scanning.i_sign();
        let j_sign = self.scanning.j_sign();
        match &self.projection {
            Projection::LatLon(grid) => {
                let col = ((location.1 - grid.lon1) * i_sign).rem_euclid(360.0) / grid.di;
                let row = (location.0 - grid.lat1) * j_sign / grid.dj;
                (row, col)
            }
            Projection::Lambert(lambert) => {
                let (x, y) = lambert.geo_to_grid(location);
                (y * j_sign, x * i_sign)
            }
        }
    }

    /// Latitudes and longitudes of every cell in row-major storage order.
    pub fn coordinates(&self) -> (Vec<f64>, Vec<f64>) {
        let total = self.nx * self.ny;
        let mut lats = Vec::with_capacity(total);
        let mut lons = Vec::with_capacity(total);
        for row in 0..self.ny {
            for col in 0..self.nx {
                let location = self.cell_location(row, col);
                lats.push(location.0);
                lons.push(location.1);
            }
        }
        (lats, lons)
    }
}

fn half_angle_tan(lat: f64) -> f64 {
    (PI / 4.0 + lat / 2.0).tan()
}

/// Wraps an angle in radians into [-π, π].
fn wrap_radians(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}
