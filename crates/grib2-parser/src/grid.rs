//! Grid point coordinates for GRIB2 grid definitions.
//!
//! Supports regular latitude/longitude grids (template 3.0) and the
//! Lambert conformal conic grid used by HRRR (template 3.30). Longitudes
//! are always reported in [0, 360).

use crate::sections::{GridDefinition, GridLayout};
use crate::Grib2Error;
use forecast_common::point::normalize_longitude;
use std::f64::consts::PI;

/// Scanning mode flag: points scan in the -i direction
const SCAN_I_NEGATIVE: u8 = 0x80;
/// Scanning mode flag: points scan in the +j direction
const SCAN_J_POSITIVE: u8 = 0x40;
/// Scanning mode flag: adjacent points are consecutive in j
const SCAN_J_CONSECUTIVE: u8 = 0x20;

/// Latitude and longitude of every grid point, in data-section order.
#[derive(Debug, Clone)]
pub struct GridCoordinates {
    pub nx: usize,
    pub ny: usize,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
}

impl GridCoordinates {
    /// Compute coordinates for a parsed grid definition.
    pub fn from_definition(grid: &GridDefinition) -> Result<Self, Grib2Error> {
        match grid.layout {
            GridLayout::LatLon {
                ni,
                nj,
                first_latitude,
                first_longitude,
                i_increment,
                j_increment,
                scanning_mode,
                ..
            } => {
                let i_step = if scanning_mode & SCAN_I_NEGATIVE != 0 {
                    -i_increment
                } else {
                    i_increment
                };
                let j_step = if scanning_mode & SCAN_J_POSITIVE != 0 {
                    j_increment
                } else {
                    -j_increment
                };
                Ok(Self::build(ni as usize, nj as usize, scanning_mode, |i, j| {
                    (
                        first_latitude + j as f64 * j_step,
                        first_longitude + i as f64 * i_step,
                    )
                }))
            }
            GridLayout::LambertConformal {
                nx,
                ny,
                first_latitude,
                first_longitude,
                lov,
                dx,
                dy,
                latin1,
                latin2,
                scanning_mode,
                ..
            } => {
                let projection = LambertConformal::from_grib2(
                    first_latitude,
                    first_longitude,
                    lov,
                    latin1,
                    latin2,
                    dx,
                    dy,
                );
                let i_sign = if scanning_mode & SCAN_I_NEGATIVE != 0 { -1.0 } else { 1.0 };
                let j_sign = if scanning_mode & SCAN_J_POSITIVE != 0 { 1.0 } else { -1.0 };
                Ok(Self::build(nx as usize, ny as usize, scanning_mode, |i, j| {
                    projection.grid_to_geo(i as f64 * i_sign, j as f64 * j_sign)
                }))
            }
            GridLayout::Unsupported => Err(Grib2Error::UnsupportedTemplate {
                section: 3,
                template: grid.template,
            }),
        }
    }

    fn build(
        nx: usize,
        ny: usize,
        scanning_mode: u8,
        point: impl Fn(usize, usize) -> (f64, f64),
    ) -> Self {
        let total = nx * ny;
        let mut latitudes = Vec::with_capacity(total);
        let mut longitudes = Vec::with_capacity(total);

        for k in 0..total {
            let (i, j) = if scanning_mode & SCAN_J_CONSECUTIVE != 0 {
                (k / ny, k % ny)
            } else {
                (k % nx, k / nx)
            };
            let (lat, lon) = point(i, j);
            latitudes.push(lat);
            longitudes.push(normalize_longitude(lon));
        }

        Self {
            nx,
            ny,
            latitudes,
            longitudes,
        }
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.latitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latitudes.is_empty()
    }

    /// (latitude, longitude) of the point at data index `k`.
    pub fn get(&self, k: usize) -> Option<(f64, f64)> {
        Some((*self.latitudes.get(k)?, *self.longitudes.get(k)?))
    }
}

/// Lambert Conformal Conic projection.
///
/// Maps grid indices relative to the first grid point onto the sphere
/// used by NCEP models.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Central meridian (LoV) in radians
    lon0: f64,
    /// Longitude of first grid point in radians
    lon1: f64,
    /// Grid spacing in meters
    dx: f64,
    dy: f64,
    earth_radius: f64,
    /// Cone constant
    n: f64,
    f: f64,
    /// Rho at first grid point
    rho0: f64,
}

impl LambertConformal {
    /// Create a projection from GRIB2 template 3.30 parameters (degrees and meters).
    pub fn from_grib2(
        lat1_deg: f64,
        lon1_deg: f64,
        lov_deg: f64,
        latin1_deg: f64,
        latin2_deg: f64,
        dx: f64,
        dy: f64,
    ) -> Self {
        let to_rad = PI / 180.0;

        let lat1 = lat1_deg * to_rad;
        let lon1 = lon1_deg * to_rad;
        let lon0 = lov_deg * to_rad;
        let latin1 = latin1_deg * to_rad;
        let latin2 = latin2_deg * to_rad;

        let earth_radius = 6371229.0;

        let n = if (latin1 - latin2).abs() < 1e-10 {
            // Tangent cone
            latin1.sin()
        } else {
            let ln_ratio = (latin1.cos() / latin2.cos()).ln();
            let tan_ratio =
                ((PI / 4.0 + latin2 / 2.0).tan() / (PI / 4.0 + latin1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };

        let f = (latin1.cos() * (PI / 4.0 + latin1 / 2.0).tan().powf(n)) / n;
        let rho0 = earth_radius * f / (PI / 4.0 + lat1 / 2.0).tan().powf(n);

        Self {
            lon0,
            lon1,
            dx,
            dy,
            earth_radius,
            n,
            f,
            rho0,
        }
    }

    /// The HRRR CONUS grid: 3 km spacing, true at 38.5N, LoV 262.5E.
    pub fn hrrr() -> Self {
        Self::from_grib2(21.138123, 237.280472, 262.5, 38.5, 38.5, 3000.0, 3000.0)
    }

    fn origin(&self) -> (f64, f64) {
        let theta0 = self.n * wrap_pi(self.lon1 - self.lon0);
        (
            self.rho0 * theta0.sin(),
            self.rho0 - self.rho0 * theta0.cos(),
        )
    }

    /// Convert geographic coordinates (degrees) to fractional grid indices (i, j).
    pub fn geo_to_grid(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        let lat = lat_deg * to_rad;
        let dlon = wrap_pi(lon_deg * to_rad - self.lon0);

        let rho = self.earth_radius * self.f / (PI / 4.0 + lat / 2.0).tan().powf(self.n);
        let theta = self.n * dlon;

        let x = rho * theta.sin();
        let y = self.rho0 - rho * theta.cos();
        let (x0, y0) = self.origin();

        ((x - x0) / self.dx, (y - y0) / self.dy)
    }

    /// Convert grid indices (i, j) to (latitude, longitude) in degrees.
    pub fn grid_to_geo(&self, i: f64, j: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;
        let (x0, y0) = self.origin();

        let x = x0 + i * self.dx;
        let y = y0 + j * self.dy;

        let rho = (x * x + (self.rho0 - y) * (self.rho0 - y)).sqrt();
        let rho = if self.n < 0.0 { -rho } else { rho };
        let theta = (x / (self.rho0 - y)).atan();

        let lat =
            2.0 * ((self.earth_radius * self.f / rho).powf(1.0 / self.n)).atan() - PI / 2.0;
        let lon = self.lon0 + theta / self.n;

        (lat * to_deg, lon * to_deg)
    }
}

fn wrap_pi(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}
