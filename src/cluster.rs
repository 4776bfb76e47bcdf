//! Multi-zoom hierarchical point clustering.
//!
//! The engine builds one node set per zoom level: at `max_zoom + 1` every
//! point stands alone, and at each successively coarser zoom, nodes within
//! a pixel radius of each other are greedily merged. A merged group only
//! materializes as a cluster when its total point count reaches the
//! configured threshold; smaller groups pass through as individual nodes.
//! Cluster representatives are the running weighted average of the absolute
//! coordinates of every point merged in, which keeps markers stable while
//! the user pans.
//!
//! A rebuild replaces the whole hierarchy in one swap: queries observe
//! either the old structure or the new one, never a mix.

use crate::spatial::{project, unproject};
use crate::types::{BoundingBox, Config, RecordPoint};
use parking_lot::RwLock;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use serde::Serialize;
use smallvec::SmallVec;

/// Identifier of a cluster node, unique within one build session.
pub type ClusterId = u32;

type LevelTree = RTree<GeomWithData<[f64; 2], u32>>;

/// A renderable feature returned by viewport queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapFeature {
    /// A synthetic aggregate of nearby points.
    Cluster {
        /// Representative longitude (weighted average).
        lon: f64,
        /// Representative latitude (weighted average).
        lat: f64,
        /// Total points beneath this cluster, recursively.
        point_count: u32,
        /// Session-unique cluster id, usable with
        /// [`ClusterEngine::get_cluster_expansion_zoom`].
        cluster_id: ClusterId,
    },
    /// An individual, unclustered point.
    Point {
        /// Longitude of the record.
        lon: f64,
        /// Latitude of the record.
        lat: f64,
        /// Index of the record in the source dataset.
        record_id: u32,
    },
}

impl MapFeature {
    /// Total points this feature represents (1 for a plain point).
    pub fn point_count(&self) -> u32 {
        match self {
            Self::Cluster { point_count, .. } => *point_count,
            Self::Point { .. } => 1,
        }
    }

    /// Representative position in degrees.
    pub fn position(&self) -> geo::Point<f64> {
        match self {
            Self::Cluster { lon, lat, .. } | Self::Point { lon, lat, .. } => {
                geo::Point::new(*lon, *lat)
            }
        }
    }
}

#[derive(Debug)]
enum NodeKind {
    Leaf {
        record_id: u32,
    },
    Cluster {
        formed_at: u8,
        children: SmallVec<[u32; 8]>,
    },
}

#[derive(Debug)]
struct Node {
    /// Projected world-space x of the representative coordinate.
    x: f64,
    /// Projected world-space y of the representative coordinate.
    y: f64,
    num_points: u32,
    kind: NodeKind,
}

struct Hierarchy {
    nodes: Vec<Node>,
    /// One tree per zoom in `[min_zoom, max_zoom + 1]`, ascending.
    levels: Vec<LevelTree>,
    min_zoom: u8,
    max_zoom: u8,
    total_points: u32,
}

/// Statistics about a built cluster hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterStats {
    /// Number of zoom levels in the hierarchy.
    pub level_count: usize,
    /// Total nodes across the session (leaves plus clusters).
    pub node_count: usize,
    /// Input points the hierarchy covers.
    pub total_points: u32,
}

/// Multi-zoom clustering engine over a replaceable point set.
pub struct ClusterEngine {
    config: Config,
    hierarchy: RwLock<Option<Hierarchy>>,
}

impl ClusterEngine {
    /// Create an engine with the given configuration. No hierarchy is
    /// loaded yet; queries return empty until [`load`](Self::load).
    pub fn new(config: Config) -> Self {
        Self {
            config,
            hierarchy: RwLock::new(None),
        }
    }

    /// Build a fresh hierarchy over `points`, discarding any previous one.
    ///
    /// Input order determines iteration order during merging, so identical
    /// input sequences produce identical hierarchies. Points with
    /// non-finite coordinates are reported and excluded; they do not abort
    /// the build. An empty slice yields an empty hierarchy.
    pub fn load(&self, points: &[RecordPoint]) {
        let built = self.build(points);
        *self.hierarchy.write() = Some(built);
    }

    fn build(&self, points: &[RecordPoint]) -> Hierarchy {
        let min_zoom = self.config.min_zoom;
        let max_zoom = self.config.max_zoom;

        let mut nodes: Vec<Node> = Vec::with_capacity(points.len());
        for rp in points {
            let (lon, lat) = (rp.position.x(), rp.position.y());
            if !lon.is_finite() || !lat.is_finite() {
                log::warn!(
                    "Skipping record {} with non-finite coordinates ({lon}, {lat})",
                    rp.id
                );
                continue;
            }
            let (x, y) = project(&rp.position);
            nodes.push(Node {
                x,
                y,
                num_points: 1,
                kind: NodeKind::Leaf { record_id: rp.id },
            });
        }
        let total_points = nodes.len() as u32;

        // Finest level: every point is its own node.
        let mut current: Vec<u32> = (0..nodes.len() as u32).collect();
        let mut levels: Vec<LevelTree> = Vec::with_capacity(usize::from(max_zoom - min_zoom) + 2);
        levels.push(make_level(&current, &nodes));

        for zoom in (min_zoom..=max_zoom).rev() {
            let tree = levels.last().expect("at least one level");
            current = self.merge_level(&mut nodes, &current, tree, zoom);
            levels.push(make_level(&current, &nodes));
        }
        levels.reverse();

        Hierarchy {
            nodes,
            levels,
            min_zoom,
            max_zoom,
            total_points,
        }
    }

    /// Merge one zoom level: greedy radius grouping over the nodes of the
    /// next-finer level, in stable input order.
    fn merge_level(
        &self,
        nodes: &mut Vec<Node>,
        current: &[u32],
        tree: &LevelTree,
        zoom: u8,
    ) -> Vec<u32> {
        let r = self.config.cluster_radius
            / (self.config.cluster_extent * f64::powi(2.0, i32::from(zoom)));
        let r2 = r * r;

        let mut assigned = vec![false; nodes.len()];
        let mut next = Vec::with_capacity(current.len());

        for &id in current {
            if assigned[id as usize] {
                continue;
            }
            assigned[id as usize] = true;
            let (px, py, p_count) = {
                let p = &nodes[id as usize];
                (p.x, p.y, p.num_points)
            };

            let mut neighbors: Vec<u32> = tree
                .locate_within_distance([px, py], r2)
                .map(|entry| entry.data)
                .filter(|&nid| nid != id && !assigned[nid as usize])
                .collect();
            neighbors.sort_unstable();

            let total: u32 = p_count
                + neighbors
                    .iter()
                    .map(|&nid| nodes[nid as usize].num_points)
                    .sum::<u32>();

            if !neighbors.is_empty() && total >= self.config.min_points {
                let mut wx = px * f64::from(p_count);
                let mut wy = py * f64::from(p_count);
                let mut children: SmallVec<[u32; 8]> = SmallVec::new();
                children.push(id);
                for &nid in &neighbors {
                    assigned[nid as usize] = true;
                    let n = &nodes[nid as usize];
                    wx += n.x * f64::from(n.num_points);
                    wy += n.y * f64::from(n.num_points);
                    children.push(nid);
                }
                let cluster_id = nodes.len() as u32;
                nodes.push(Node {
                    x: wx / f64::from(total),
                    y: wy / f64::from(total),
                    num_points: total,
                    kind: NodeKind::Cluster {
                        formed_at: zoom,
                        children,
                    },
                });
                next.push(cluster_id);
            } else {
                // Below the threshold the group stays unclustered; the
                // neighbors remain claimable by their own iterations.
                next.push(id);
            }
        }
        next
    }

    /// Nodes whose representative coordinate falls inside `bbox` at the
    /// given zoom. Fractional zooms round down; zooms outside the
    /// configured range clamp. Summed over the world box, the returned
    /// point counts equal the loaded point count at every zoom.
    pub fn get_clusters(&self, bbox: &BoundingBox, zoom: f64) -> Vec<MapFeature> {
        let guard = self.hierarchy.read();
        let Some(h) = guard.as_ref() else {
            return Vec::new();
        };
        if h.total_points == 0 {
            return Vec::new();
        }
        if !bbox.is_finite() || !zoom.is_finite() {
            log::warn!("Rejecting cluster query with non-finite bounds or zoom");
            return Vec::new();
        }

        let tree = h.level_at(zoom);
        let b = bbox.normalized();
        let (min_x, max_y) = project(&geo::Point::new(b.west, b.south));
        let (max_x, min_y) = project(&geo::Point::new(b.east, b.north));
        let envelope = AABB::from_corners([min_x, min_y], [max_x, max_y]);

        let mut hits: Vec<u32> = tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        hits.sort_unstable();

        hits.iter().map(|&id| h.feature(id)).collect()
    }

    /// Lowest zoom at which the identified cluster's membership splits into
    /// more than one node — the level to jump to for "zoom to expand".
    ///
    /// # Panics
    ///
    /// Panics when no hierarchy is loaded, when the id is out of range, or
    /// when it identifies a plain point rather than a cluster: all are
    /// caller bugs, since valid ids only come from
    /// [`get_clusters`](Self::get_clusters).
    pub fn get_cluster_expansion_zoom(&self, cluster_id: ClusterId) -> u8 {
        let guard = self.hierarchy.read();
        let h = guard
            .as_ref()
            .expect("expansion zoom queried before any hierarchy was loaded");
        let (formed_at, children) = h.cluster_parts(cluster_id);
        debug_assert!(children.len() >= 2, "clusters always merge at least two nodes");
        (*formed_at + 1).min(h.max_zoom + 1)
    }

    /// The nodes a cluster merged, as they appeared one zoom level finer.
    ///
    /// # Panics
    ///
    /// Panics on unknown or non-cluster ids, like
    /// [`get_cluster_expansion_zoom`](Self::get_cluster_expansion_zoom).
    pub fn get_cluster_children(&self, cluster_id: ClusterId) -> Vec<MapFeature> {
        let guard = self.hierarchy.read();
        let h = guard
            .as_ref()
            .expect("children queried before any hierarchy was loaded");
        let (_, children) = h.cluster_parts(cluster_id);
        children.iter().map(|&child| h.feature(child)).collect()
    }

    /// Total points in the loaded hierarchy (0 when none is loaded).
    pub fn point_count(&self) -> u32 {
        self.hierarchy
            .read()
            .as_ref()
            .map_or(0, |h| h.total_points)
    }

    /// Whether [`load`](Self::load) has been called.
    pub fn is_loaded(&self) -> bool {
        self.hierarchy.read().is_some()
    }

    /// Statistics about the loaded hierarchy.
    pub fn stats(&self) -> ClusterStats {
        let guard = self.hierarchy.read();
        match guard.as_ref() {
            Some(h) => ClusterStats {
                level_count: h.levels.len(),
                node_count: h.nodes.len(),
                total_points: h.total_points,
            },
            None => ClusterStats {
                level_count: 0,
                node_count: 0,
                total_points: 0,
            },
        }
    }
}

impl Hierarchy {
    /// Resolve a cluster id to its formation zoom and children, panicking
    /// on ids that never came out of a cluster query.
    fn cluster_parts(&self, cluster_id: ClusterId) -> (&u8, &SmallVec<[u32; 8]>) {
        let node = self
            .nodes
            .get(cluster_id as usize)
            .unwrap_or_else(|| panic!("unknown cluster id {cluster_id}"));
        match &node.kind {
            NodeKind::Cluster {
                formed_at,
                children,
            } => (formed_at, children),
            NodeKind::Leaf { record_id } => {
                panic!("id {cluster_id} identifies point record {record_id}, not a cluster")
            }
        }
    }

    fn level_at(&self, zoom: f64) -> &LevelTree {
        let floored = zoom.floor();
        let clamped = floored.clamp(f64::from(self.min_zoom), f64::from(self.max_zoom) + 1.0);
        let offset = (clamped as u8 - self.min_zoom) as usize;
        &self.levels[offset]
    }

    fn feature(&self, id: u32) -> MapFeature {
        let node = &self.nodes[id as usize];
        let position = unproject(node.x, node.y);
        match &node.kind {
            NodeKind::Cluster { .. } => MapFeature::Cluster {
                lon: position.x(),
                lat: position.y(),
                point_count: node.num_points,
                cluster_id: id,
            },
            NodeKind::Leaf { record_id } => MapFeature::Point {
                lon: position.x(),
                lat: position.y(),
                record_id: *record_id,
            },
        }
    }
}

fn make_level(node_ids: &[u32], nodes: &[Node]) -> LevelTree {
    let entries: Vec<GeomWithData<[f64; 2], u32>> = node_ids
        .iter()
        .map(|&id| {
            let node = &nodes[id as usize];
            GeomWithData::new([node.x, node.y], id)
        })
        .collect();
    RTree::bulk_load(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(min_points: u32) -> ClusterEngine {
        ClusterEngine::new(Config::default().with_min_points(min_points))
    }

    /// A tight blob of `count` points around (lon, lat) plus its ids.
    fn blob(start_id: u32, lon: f64, lat: f64, count: u32) -> Vec<RecordPoint> {
        (0..count)
            .map(|i| {
                RecordPoint::new(
                    start_id + i,
                    lon + f64::from(i) * 1e-4,
                    lat + f64::from(i) * 1e-4,
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_load() {
        let engine = engine(2);
        engine.load(&[]);
        assert!(engine.is_loaded());
        assert_eq!(engine.point_count(), 0);
        assert!(engine.get_clusters(&BoundingBox::WORLD, 3.0).is_empty());
    }

    #[test]
    fn test_blob_clusters_at_low_zoom_and_splits_when_zoomed() {
        let engine = engine(2);
        let points = blob(0, 133.0, -25.0, 30);
        engine.load(&points);

        let coarse = engine.get_clusters(&BoundingBox::WORLD, 0.0);
        assert_eq!(coarse.len(), 1);
        let MapFeature::Cluster {
            point_count,
            cluster_id,
            ..
        } = coarse[0]
        else {
            panic!("expected a cluster at zoom 0");
        };
        assert_eq!(point_count, 30);

        let max = f64::from(engine.config.max_zoom);
        let finest = engine.get_clusters(&BoundingBox::WORLD, max + 1.0);
        assert_eq!(finest.len(), 30);
        assert!(finest.iter().all(|f| matches!(f, MapFeature::Point { .. })));

        let expansion = engine.get_cluster_expansion_zoom(cluster_id);
        let before = engine.get_clusters(&BoundingBox::WORLD, f64::from(expansion) - 1.0);
        let after = engine.get_clusters(&BoundingBox::WORLD, f64::from(expansion));
        assert!(after.len() > before.len(), "zooming to {expansion} must split");
    }

    #[test]
    fn test_min_points_threshold_keeps_small_groups_unclustered() {
        let engine = engine(25);
        engine.load(&blob(0, 151.0, -33.0, 10));
        let features = engine.get_clusters(&BoundingBox::WORLD, 0.0);
        assert_eq!(features.len(), 10);
        assert!(features.iter().all(|f| matches!(f, MapFeature::Point { .. })));
    }

    #[test]
    fn test_conservation_at_every_zoom() {
        let engine = engine(3);
        let mut points = blob(0, 133.0, -25.0, 40);
        points.extend(blob(40, 151.2, -33.8, 17));
        points.extend(blob(57, 115.8, -31.9, 5));
        points.push(RecordPoint::new(62, -74.0, 40.7));
        engine.load(&points);

        for zoom in 0..=(engine.config.max_zoom + 1) {
            let total: u32 = engine
                .get_clusters(&BoundingBox::WORLD, f64::from(zoom))
                .iter()
                .map(MapFeature::point_count)
                .sum();
            assert_eq!(total, 63, "conservation failed at zoom {zoom}");
        }
    }

    #[test]
    fn test_bbox_restricts_results() {
        let engine = engine(2);
        let mut points = blob(0, 133.0, -25.0, 8);
        points.push(RecordPoint::new(8, 50.0, 50.0));
        engine.load(&points);

        let around_blob = BoundingBox::new(130.0, -28.0, 136.0, -22.0);
        let features = engine.get_clusters(&around_blob, 2.0);
        let total: u32 = features.iter().map(MapFeature::point_count).sum();
        assert_eq!(total, 8);
    }

    #[test]
    fn test_representative_is_weighted_average() {
        let engine = engine(2);
        // Two points at distinct longitudes merge into one cluster whose
        // representative sits at their midpoint.
        let points = vec![
            RecordPoint::new(0, 10.0, 0.0),
            RecordPoint::new(1, 10.2, 0.0),
        ];
        engine.load(&points);
        let features = engine.get_clusters(&BoundingBox::WORLD, 0.0);
        assert_eq!(features.len(), 1);
        let MapFeature::Cluster { lon, .. } = features[0] else {
            panic!("expected cluster");
        };
        assert!((lon - 10.1).abs() < 1e-6, "representative lon {lon}");
    }

    #[test]
    fn test_non_finite_points_are_skipped() {
        let engine = engine(2);
        let points = vec![
            RecordPoint::new(0, 10.0, 10.0),
            RecordPoint::new(1, f64::NAN, 10.0),
            RecordPoint::new(2, 10.0, f64::INFINITY),
            RecordPoint::new(3, 11.0, 11.0),
        ];
        engine.load(&points);
        assert_eq!(engine.point_count(), 2);
    }

    #[test]
    fn test_reload_replaces_hierarchy() {
        let engine = engine(2);
        engine.load(&blob(0, 133.0, -25.0, 30));
        assert_eq!(engine.point_count(), 30);
        engine.load(&blob(100, 151.0, -33.0, 4));
        assert_eq!(engine.point_count(), 4);
        let ids: Vec<u32> = engine
            .get_clusters(&BoundingBox::WORLD, 13.0)
            .iter()
            .map(|f| match f {
                MapFeature::Point { record_id, .. } => *record_id,
                MapFeature::Cluster { .. } => panic!("unexpected cluster at finest zoom"),
            })
            .collect();
        assert_eq!(ids, vec![100, 101, 102, 103]);
    }

    #[test]
    fn test_deterministic_rebuild() {
        let engine = engine(5);
        let mut points = blob(0, 133.0, -25.0, 24);
        points.extend(blob(24, 134.0, -26.0, 13));
        engine.load(&points);
        let first = engine.get_clusters(&BoundingBox::WORLD, 4.0);
        engine.load(&points);
        assert_eq!(engine.get_clusters(&BoundingBox::WORLD, 4.0), first);
    }

    #[test]
    fn test_fractional_zoom_rounds_down() {
        let engine = engine(2);
        engine.load(&blob(0, 133.0, -25.0, 12));
        assert_eq!(
            engine.get_clusters(&BoundingBox::WORLD, 3.0),
            engine.get_clusters(&BoundingBox::WORLD, 3.9)
        );
    }

    #[test]
    #[should_panic(expected = "unknown cluster id")]
    fn test_unknown_cluster_id_panics() {
        let engine = engine(2);
        engine.load(&blob(0, 133.0, -25.0, 4));
        let _ = engine.get_cluster_expansion_zoom(9999);
    }

    #[test]
    #[should_panic(expected = "not a cluster")]
    fn test_point_id_is_not_a_cluster_id() {
        let engine = engine(25);
        engine.load(&blob(0, 133.0, -25.0, 3));
        let _ = engine.get_cluster_expansion_zoom(0);
    }

    #[test]
    fn test_cluster_children_partition_the_membership() {
        let engine = engine(2);
        let mut points = blob(0, 133.0, -25.0, 20);
        points.extend(blob(20, 133.5, -25.5, 9));
        engine.load(&points);

        for feature in engine.get_clusters(&BoundingBox::WORLD, 0.0) {
            let MapFeature::Cluster {
                cluster_id,
                point_count,
                ..
            } = feature
            else {
                continue;
            };
            let children = engine.get_cluster_children(cluster_id);
            assert!(children.len() >= 2);
            let child_total: u32 = children.iter().map(MapFeature::point_count).sum();
            assert_eq!(child_total, point_count);
        }
    }

    #[test]
    fn test_stats() {
        let engine = engine(2);
        engine.load(&blob(0, 133.0, -25.0, 20));
        let stats = engine.stats();
        assert_eq!(stats.total_points, 20);
        assert_eq!(
            stats.level_count,
            usize::from(engine.config.max_zoom) + 2
        );
        assert!(stats.node_count > 20, "clusters were formed");
    }
}
