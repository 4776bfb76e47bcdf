//! Geospatial data core for interactive service maps.
//!
//! Three engines feed a map view over a childcare-service dataset: a
//! static packed spatial index for viewport queries, a multi-zoom cluster
//! hierarchy for scalable rendering, and a compound criteria filter with
//! explicit unknown-value semantics.
//!
//! ```rust
//! use caremap::{BoundingBox, Point, SpatialIndexBuilder};
//!
//! let mut builder = SpatialIndexBuilder::new(2);
//! builder.add(&Point::new(151.2093, -33.8688))?;
//! builder.add(&Point::new(144.9631, -37.8136))?;
//! let index = builder.finish();
//!
//! let sydney = index.query(&BoundingBox::new(150.0, -35.0, 152.0, -33.0));
//! assert_eq!(sydney, vec![0]);
//! # Ok::<(), caremap::CoreError>(())
//! ```

pub mod arena;
pub mod cluster;
pub mod error;
pub mod filter;
pub mod record;
pub mod schedule;
pub mod spatial;
pub mod spatial_index;
pub mod types;

pub use error::{CoreError, Result};

pub use geo::Point;

pub use spatial_index::{SpatialIndex, SpatialIndexBuilder};

pub use cluster::{ClusterEngine, ClusterId, ClusterStats, MapFeature};

pub use filter::{
    CapacityRange, CategorySelection, ConditionsFilter, FilterCriteria, FilterEngine, TimeRange,
    TypeSelection,
};

pub use record::{
    ClockTime, DataRanges, QualityArea, RatingCode, RatingValue, RawServiceRecord, ServiceRecord,
};

pub use schedule::FilterScheduler;

pub use arena::{KeyedArena, MarkerKey, Reconciliation, reconcile};

pub use types::{BoundingBox, Config, IndexMeta, RecordPoint};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{CoreError, Result};

    pub use geo::Point;

    pub use crate::{BoundingBox, Config, IndexMeta, RecordPoint};

    pub use crate::{SpatialIndex, SpatialIndexBuilder};

    pub use crate::{ClusterEngine, MapFeature};

    pub use crate::{FilterCriteria, FilterEngine, FilterScheduler};

    pub use crate::{RawServiceRecord, ServiceRecord};
}
