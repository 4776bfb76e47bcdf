//! Spherical-Mercator projection helpers.
//!
//! The cluster engine operates in a square world space: longitude/latitude
//! are projected onto `[0, 1] x [0, 1]` so that a pixel radius at a given
//! zoom becomes a plain Euclidean distance. Latitudes beyond the Mercator
//! singularity clamp to the top/bottom edge.

use geo::Point;
use std::f64::consts::PI;

/// Project a longitude in degrees to world-space x in `[0, 1]`.
pub fn lon_to_x(lon: f64) -> f64 {
    lon / 360.0 + 0.5
}

/// Project a latitude in degrees to world-space y in `[0, 1]`.
///
/// y grows southward, matching tile pixel coordinates.
pub fn lat_to_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

/// Project a lon/lat point to world space.
pub fn project(point: &Point<f64>) -> (f64, f64) {
    (lon_to_x(point.x()), lat_to_y(point.y()))
}

/// Invert [`lon_to_x`].
pub fn x_to_lon(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

/// Invert [`lat_to_y`].
pub fn y_to_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}

/// Invert [`project`].
pub fn unproject(x: f64, y: f64) -> Point<f64> {
    Point::new(x_to_lon(x), y_to_lat(y))
}
