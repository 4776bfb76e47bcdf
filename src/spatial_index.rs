//! Static packed spatial index over point coordinates.
//!
//! The index is built once over a fixed point set, packed bottom-up into
//! fixed-fanout nodes, and is immutable afterwards. Leaves carry degenerate
//! (zero-area) boxes, one per point, identified by their registration
//! order; every parent box is the union of its children up to a single
//! root. Packing uses a sort-tile pass: leaves are sorted by longitude,
//! sliced into vertical strips, and each strip is sorted by latitude, so
//! sibling boxes stay compact.
//!
//! The packed arrays serialize to a compact little-endian artifact. The
//! artifact is deliberately not self-describing: the item count travels in
//! a companion [`IndexMeta`](crate::types::IndexMeta) record and must be
//! supplied again at reconstruction time.

use crate::error::{CoreError, Result};
use crate::types::BoundingBox;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use geo::Point;

/// First artifact byte.
const MAGIC: u8 = 0xCA;
/// Artifact format version.
const VERSION: u8 = 1;
/// Artifact header length in bytes: magic, version, node size.
const HEADER_LEN: usize = 4;

/// Default node fanout.
pub const DEFAULT_NODE_SIZE: u16 = 16;

/// Cumulative end positions (in f64 slots, 4 per node) of each tree level,
/// finest first.
fn level_bounds(num_items: usize, node_size: usize) -> Vec<usize> {
    let mut n = num_items;
    let mut num_nodes = n;
    let mut bounds = vec![n * 4];
    loop {
        n = n.div_ceil(node_size);
        num_nodes += n;
        bounds.push(num_nodes * 4);
        if n == 1 {
            break;
        }
    }
    bounds
}

/// Incremental builder for a [`SpatialIndex`].
///
/// The item count is declared up front; [`add`](Self::add) must then be
/// called exactly that many times before [`finish`](Self::finish). Calling
/// `add` more often than declared, or finishing short, is a programmer
/// error and panics. Non-finite coordinates are rejected with a local
/// error and do not count toward the declared total; callers are expected
/// to pre-filter.
#[derive(Debug)]
pub struct SpatialIndexBuilder {
    node_size: u16,
    num_items: usize,
    boxes: Vec<f64>,
    indices: Vec<u32>,
    pos: usize,
}

impl SpatialIndexBuilder {
    /// Start a builder for exactly `num_items` points with the default
    /// fanout.
    ///
    /// # Panics
    ///
    /// Panics if `num_items` is zero.
    pub fn new(num_items: usize) -> Self {
        Self::with_node_size(num_items, DEFAULT_NODE_SIZE)
    }

    /// Start a builder with an explicit node fanout.
    ///
    /// # Panics
    ///
    /// Panics if `num_items` is zero or `node_size < 2`.
    pub fn with_node_size(num_items: usize, node_size: u16) -> Self {
        assert!(num_items > 0, "Index must contain at least one item");
        assert!(node_size >= 2, "Node size must be at least 2");
        Self {
            node_size,
            num_items,
            boxes: Vec::with_capacity(num_items * 4),
            indices: Vec::with_capacity(num_items),
            pos: 0,
        }
    }

    /// Register the next point and return its assigned id (its
    /// registration order, which doubles as the dataset record index).
    ///
    /// # Panics
    ///
    /// Panics when called more times than the declared item count.
    pub fn add(&mut self, point: &Point<f64>) -> Result<u32> {
        let (x, y) = (point.x(), point.y());
        if !x.is_finite() || !y.is_finite() {
            return Err(CoreError::NonFiniteCoordinate { lon: x, lat: y });
        }
        assert!(
            self.pos < self.num_items,
            "add() called more than the declared {} times",
            self.num_items
        );
        let id = self.pos as u32;
        self.boxes.extend_from_slice(&[x, y, x, y]);
        self.indices.push(id);
        self.pos += 1;
        Ok(id)
    }

    /// Number of points registered so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    /// Whether no points have been registered yet.
    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Pack the registered boxes into the finished, immutable index.
    ///
    /// # Panics
    ///
    /// Panics if fewer points were added than declared.
    pub fn finish(self) -> SpatialIndex {
        assert_eq!(
            self.pos, self.num_items,
            "index builder declared {} items but {} were added",
            self.num_items, self.pos
        );

        let node_size = self.node_size as usize;
        let n = self.num_items;
        let bounds = level_bounds(n, node_size);
        let num_nodes = bounds.last().expect("level bounds are never empty") / 4;

        // Sort-tile ordering: by longitude, then by latitude within each
        // vertical strip. total_cmp keeps the order deterministic.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| self.boxes[a * 4].total_cmp(&self.boxes[b * 4]));
        let leaf_nodes = n.div_ceil(node_size);
        let num_strips = (leaf_nodes as f64).sqrt().ceil() as usize;
        let strip_len = n.div_ceil(num_strips.max(1));
        for strip in order.chunks_mut(strip_len) {
            strip.sort_by(|&a, &b| self.boxes[a * 4 + 1].total_cmp(&self.boxes[b * 4 + 1]));
        }

        let mut boxes = Vec::with_capacity(num_nodes * 4);
        let mut indices = Vec::with_capacity(num_nodes);
        for &i in &order {
            boxes.extend_from_slice(&self.boxes[i * 4..i * 4 + 4]);
            indices.push(self.indices[i]);
        }
        boxes.resize(num_nodes * 4, 0.0);
        indices.resize(num_nodes, 0);

        // Union child boxes upward, level by level, to the root.
        let mut pos = 0;
        let mut write = n * 4;
        for &level_end in &bounds[..bounds.len() - 1] {
            while pos < level_end {
                let node_start = pos;
                let mut min_x = f64::INFINITY;
                let mut min_y = f64::INFINITY;
                let mut max_x = f64::NEG_INFINITY;
                let mut max_y = f64::NEG_INFINITY;
                let mut count = 0;
                while count < node_size && pos < level_end {
                    min_x = min_x.min(boxes[pos]);
                    min_y = min_y.min(boxes[pos + 1]);
                    max_x = max_x.max(boxes[pos + 2]);
                    max_y = max_y.max(boxes[pos + 3]);
                    pos += 4;
                    count += 1;
                }
                indices[write / 4] = node_start as u32;
                boxes[write] = min_x;
                boxes[write + 1] = min_y;
                boxes[write + 2] = max_x;
                boxes[write + 3] = max_y;
                write += 4;
            }
        }

        SpatialIndex {
            node_size: self.node_size,
            num_items: n,
            level_bounds: bounds,
            boxes,
            indices,
        }
    }
}

/// A finished, immutable packed index. Safe to share across readers.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialIndex {
    node_size: u16,
    num_items: usize,
    level_bounds: Vec<usize>,
    boxes: Vec<f64>,
    indices: Vec<u32>,
}

impl SpatialIndex {
    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.num_items
    }

    /// Always false; an index holds at least one point.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The configured node fanout.
    pub fn node_size(&self) -> u16 {
        self.node_size
    }

    /// Bounding box of the whole point set (the root box).
    pub fn bounds(&self) -> BoundingBox {
        let root = self.boxes.len() - 4;
        BoundingBox::new(
            self.boxes[root],
            self.boxes[root + 1],
            self.boxes[root + 2],
            self.boxes[root + 3],
        )
    }

    /// Ids of all points whose box intersects the query box, edges
    /// inclusive. No duplicates; the order is unspecified but stable for
    /// identical inputs.
    pub fn query(&self, bbox: &BoundingBox) -> Vec<u32> {
        let mut results = Vec::new();
        self.query_into(bbox, &mut results);
        results
    }

    /// [`query`](Self::query) appending into a caller-owned buffer.
    pub fn query_into(&self, bbox: &BoundingBox, results: &mut Vec<u32>) {
        if !bbox.is_finite() {
            log::warn!("Rejecting bounding box query with non-finite coordinates");
            return;
        }
        let b = bbox.normalized();

        let node_size = self.node_size as usize;
        let leaf_end = self.num_items * 4;
        let mut node_pos = self.boxes.len() - 4;
        let mut queue: Vec<usize> = Vec::new();

        loop {
            let end = (node_pos + node_size * 4).min(self.upper_bound(node_pos));
            for pos in (node_pos..end).step_by(4) {
                if !b.intersects(
                    self.boxes[pos],
                    self.boxes[pos + 1],
                    self.boxes[pos + 2],
                    self.boxes[pos + 3],
                ) {
                    continue;
                }
                let index = self.indices[pos / 4];
                if node_pos >= leaf_end {
                    queue.push(index as usize);
                } else {
                    results.push(index);
                }
            }
            match queue.pop() {
                Some(next) => node_pos = next,
                None => break,
            }
        }
    }

    /// First level boundary strictly above `pos`.
    fn upper_bound(&self, pos: usize) -> usize {
        *self
            .level_bounds
            .iter()
            .find(|&&bound| bound > pos)
            .expect("node positions always sit below the last level boundary")
    }

    /// Serialize to the compact binary artifact.
    ///
    /// The blob does not embed the item count; pair it with an
    /// [`IndexMeta`](crate::types::IndexMeta) record.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf =
            BytesMut::with_capacity(HEADER_LEN + self.boxes.len() * 8 + self.indices.len() * 4);
        buf.put_u8(MAGIC);
        buf.put_u8(VERSION);
        buf.put_u16_le(self.node_size);
        for &value in &self.boxes {
            buf.put_f64_le(value);
        }
        for &index in &self.indices {
            buf.put_u32_le(index);
        }
        buf.freeze()
    }

    /// Reconstruct an index from an artifact and its out-of-band item
    /// count.
    ///
    /// Structural problems yield [`CoreError::MalformedIndex`]; a blob
    /// whose length disagrees with the supplied count yields
    /// [`CoreError::IndexCountMismatch`]. The reconstructed index answers
    /// every query identically to the one that produced the blob.
    pub fn from_bytes(blob: &[u8], count: usize) -> Result<Self> {
        if blob.len() < HEADER_LEN {
            return Err(CoreError::MalformedIndex(format!(
                "artifact is {} bytes, shorter than the {HEADER_LEN}-byte header",
                blob.len()
            )));
        }
        let mut cursor = blob;
        let magic = cursor.get_u8();
        if magic != MAGIC {
            return Err(CoreError::MalformedIndex(format!(
                "unexpected magic byte {magic:#04x}"
            )));
        }
        let version = cursor.get_u8();
        if version != VERSION {
            return Err(CoreError::MalformedIndex(format!(
                "unsupported format version {version}"
            )));
        }
        let node_size = cursor.get_u16_le();
        if node_size < 2 {
            return Err(CoreError::MalformedIndex(format!(
                "node size {node_size} is below the minimum of 2"
            )));
        }
        if count == 0 {
            return Err(CoreError::MalformedIndex(
                "metadata item count must be positive".to_string(),
            ));
        }

        let bounds = level_bounds(count, node_size as usize);
        let num_nodes = bounds.last().expect("level bounds are never empty") / 4;
        let expected_len = HEADER_LEN + num_nodes * 4 * 8 + num_nodes * 4;
        if blob.len() != expected_len {
            return Err(CoreError::IndexCountMismatch {
                count,
                expected_len,
                actual_len: blob.len(),
            });
        }

        let mut boxes = Vec::with_capacity(num_nodes * 4);
        for _ in 0..num_nodes * 4 {
            boxes.push(cursor.get_f64_le());
        }
        let mut indices = Vec::with_capacity(num_nodes);
        for _ in 0..num_nodes {
            indices.push(cursor.get_u32_le());
        }

        // Leaf entries must reference items; upper entries must reference
        // node start positions inside the array.
        for (node, &index) in indices.iter().enumerate() {
            let reference_ok = if node < count {
                (index as usize) < count
            } else {
                let target = index as usize;
                target % 4 == 0 && target < (num_nodes - 1) * 4
            };
            if !reference_ok {
                return Err(CoreError::MalformedIndex(format!(
                    "node {node} references out-of-range target {index}"
                )));
            }
        }

        Ok(Self {
            node_size,
            num_items: count,
            level_bounds: bounds,
            boxes,
            indices,
        })
    }
}
