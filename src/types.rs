//! Core types and configuration.
//!
//! This module provides the serializable configuration for the engines plus
//! the small geographic value types shared across the crate.

use geo::Point;
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An axis-aligned geographic bounding box in decimal degrees.
///
/// Stored as `(west, south, east, north)`, matching the viewport boundary
/// used by map consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Maximum latitude.
    pub north: f64,
}

impl BoundingBox {
    /// The full WGS84 extent.
    pub const WORLD: Self = Self {
        west: -180.0,
        south: -90.0,
        east: 180.0,
        north: 90.0,
    };

    /// Create a bounding box from `(west, south, east, north)` degrees.
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Whether all four edges are finite numbers.
    pub fn is_finite(&self) -> bool {
        [self.west, self.south, self.east, self.north]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Return a copy with min/max edges swapped into place if needed.
    pub fn normalized(mut self) -> Self {
        if self.west > self.east {
            std::mem::swap(&mut self.west, &mut self.east);
        }
        if self.south > self.north {
            std::mem::swap(&mut self.south, &mut self.north);
        }
        self
    }

    /// Whether the point lies inside the box, edges inclusive.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        point.x() >= self.west
            && point.x() <= self.east
            && point.y() >= self.south
            && point.y() <= self.north
    }

    /// Whether this box intersects the box `(min_x, min_y, max_x, max_y)`,
    /// edges inclusive.
    pub fn intersects(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> bool {
        self.east >= min_x && self.north >= min_y && self.west <= max_x && self.south <= max_y
    }
}

/// A dataset record's position, keyed by its index into the source dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordPoint {
    /// Index of the record in the source dataset.
    pub id: u32,
    /// Longitude/latitude in decimal degrees.
    pub position: Point<f64>,
}

impl RecordPoint {
    /// Create a record point from an id and lon/lat degrees.
    pub fn new(id: u32, lon: f64, lat: f64) -> Self {
        Self {
            id,
            position: Point::new(lon, lat),
        }
    }
}

/// Companion metadata for a serialized spatial index artifact.
///
/// The binary artifact is not self-describing: the item count is carried
/// here, out-of-band, and both halves must be paired for reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Number of items the paired artifact encodes.
    pub count: usize,
}

impl IndexMeta {
    /// Load metadata from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize metadata as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Engine configuration.
///
/// Designed to be easily serializable and loadable from JSON while keeping
/// complexity minimal. Defaults reproduce the tuning of the production map
/// this core was built for.
///
/// # Example
///
/// ```rust
/// use caremap::Config;
///
/// let config = Config::default();
/// assert_eq!(config.min_points, 25);
///
/// let json = r#"{ "cluster_radius": 80.0, "max_zoom": 14 }"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.max_zoom, 14);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster merge radius in pixels at each zoom level.
    #[serde(default = "Config::default_cluster_radius")]
    pub cluster_radius: f64,

    /// Tile extent in pixels used to scale the radius per zoom.
    #[serde(default = "Config::default_cluster_extent")]
    pub cluster_extent: f64,

    /// Coarsest zoom level the cluster hierarchy is built for.
    #[serde(default)]
    pub min_zoom: u8,

    /// Finest zoom level at which merging still happens; at `max_zoom + 1`
    /// every point stands alone.
    #[serde(default = "Config::default_max_zoom")]
    pub max_zoom: u8,

    /// Minimum total point count for a merged group to materialize as a
    /// cluster; smaller groups stay individual points.
    #[serde(default = "Config::default_min_points")]
    pub min_points: u32,

    /// Fixed fanout of the packed spatial index.
    #[serde(default = "Config::default_node_size")]
    pub node_size: u16,

    /// Coalescing window for debounced filter re-evaluation, milliseconds.
    #[serde(default = "Config::default_debounce_ms")]
    pub debounce_ms: u64,

    /// Defensive cap on records processed per candidate-list evaluation.
    #[serde(default = "Config::default_max_candidates")]
    pub max_candidates: usize,
}

impl Config {
    const fn default_cluster_radius() -> f64 {
        150.0
    }

    const fn default_cluster_extent() -> f64 {
        512.0
    }

    const fn default_max_zoom() -> u8 {
        12
    }

    const fn default_min_points() -> u32 {
        25
    }

    const fn default_node_size() -> u16 {
        16
    }

    const fn default_debounce_ms() -> u64 {
        150
    }

    const fn default_max_candidates() -> usize {
        10_000
    }

    /// Set the cluster merge radius in pixels.
    pub fn with_cluster_radius(mut self, radius: f64) -> Self {
        assert!(
            radius.is_finite() && radius > 0.0,
            "Cluster radius must be positive and finite"
        );
        self.cluster_radius = radius;
        self
    }

    /// Set the zoom range the cluster hierarchy covers.
    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        assert!(
            min_zoom <= max_zoom && max_zoom < 30,
            "Zoom range must satisfy min <= max < 30"
        );
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    /// Set the cluster materialization threshold.
    pub fn with_min_points(mut self, min_points: u32) -> Self {
        assert!(min_points >= 2, "Min points must be at least 2");
        self.min_points = min_points;
        self
    }

    /// Set the packed index fanout.
    pub fn with_node_size(mut self, node_size: u16) -> Self {
        assert!(node_size >= 2, "Node size must be at least 2");
        self.node_size = node_size;
        self
    }

    /// Set the debounce window for filter re-evaluation.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_ms = window.as_millis() as u64;
        self
    }

    /// Set the defensive candidate-list cap.
    pub fn with_max_candidates(mut self, cap: usize) -> Self {
        assert!(cap > 0, "Candidate cap must be greater than zero");
        self.max_candidates = cap;
        self
    }

    /// Get the debounce window as a `Duration`.
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.cluster_radius.is_finite() || self.cluster_radius <= 0.0 {
            return Err("Cluster radius must be positive and finite".to_string());
        }
        if !self.cluster_extent.is_finite() || self.cluster_extent <= 0.0 {
            return Err("Cluster extent must be positive and finite".to_string());
        }
        if self.min_zoom > self.max_zoom {
            return Err("Min zoom must not exceed max zoom".to_string());
        }
        if self.max_zoom >= 30 {
            return Err("Max zoom must be below 30".to_string());
        }
        if self.min_points < 2 {
            return Err("Min points must be at least 2".to_string());
        }
        if self.node_size < 2 {
            return Err("Node size must be at least 2".to_string());
        }
        if self.max_candidates == 0 {
            return Err("Candidate cap must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_radius: Self::default_cluster_radius(),
            cluster_extent: Self::default_cluster_extent(),
            min_zoom: 0,
            max_zoom: Self::default_max_zoom(),
            min_points: Self::default_min_points(),
            node_size: Self::default_node_size(),
            debounce_ms: Self::default_debounce_ms(),
            max_candidates: Self::default_max_candidates(),
        }
    }
}
