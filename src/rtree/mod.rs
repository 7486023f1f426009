mod bbox;
mod node;

use std::{mem::size_of, time::Instant};

use ordered_float::OrderedFloat;

use crate::{
    error::{IndexError, Result},
    index::{admit_range, bytes_to_mb, elapsed_ms, point_bytes, to_f64, Scan, SpatialIndex},
    point::{validate_points, DataPoint, QueryRange},
};

pub use bbox::TREE_DIMS;
use bbox::BBox;
use node::{Entry, Node};

pub const DEFAULT_FANOUT: usize = 16;

/// A bounding-box tree bulk-loaded with Sort-Tile-Recursive packing.
///
/// Boxes only cover the first three coordinates; every candidate is checked
/// against the full-dimensional copy of its point before it is returned.
pub struct RTreeIndex {
    fanout: usize,
    dimensions: usize,
    root: usize,
    nodes: Vec<Node>,
    entries: Vec<Entry>,
    points: Vec<DataPoint>,
    build_time_ms: f64,
}

// One child being packed into a parent: its box and its id on the level below.
#[derive(Clone, Copy)]
struct Packed {
    bbox: BBox,
    child: usize,
}

impl RTreeIndex {
    /// Creates an empty tree with at most `fanout` children per node.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFanout` when `fanout < 2`.
    pub fn new(fanout: usize) -> Result<Self> {
        if fanout < 2 {
            return Err(IndexError::InvalidFanout(fanout));
        }
        Ok(RTreeIndex {
            fanout,
            dimensions: 0,
            root: usize::MAX,
            nodes: Vec::new(),
            entries: Vec::new(),
            points: Vec::new(),
            build_time_ms: 0.0,
        })
    }

    #[must_use]
    pub fn fanout(&self) -> usize {
        self.fanout
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.nodes.get(self.root).map_or(0, |node| node.height)
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn add_node(&mut self, height: usize, group: &[Packed]) -> usize {
        let slot_id = self.nodes.len();
        let bbox = group
            .iter()
            .fold(BBox::default(), |acc, packed| acc.union(&packed.bbox));
        let children = group.iter().map(|packed| packed.child).collect();
        self.nodes.push(Node::new(height, bbox, children));
        slot_id
    }

    // Packs one level: the result holds one item per new parent node.
    fn pack_level(&mut self, mut items: Vec<Packed>, height: usize) -> Vec<Packed> {
        let mut groups = Vec::new();
        tile(&mut items, 0, self.fanout, &mut groups);
        groups
            .into_iter()
            .map(|group| {
                let child = self.add_node(height, &group);
                Packed {
                    bbox: self.nodes[child].bbox,
                    child,
                }
            })
            .collect()
    }

    fn bulk_load(&mut self) {
        let mut level = self
            .entries
            .iter()
            .enumerate()
            .map(|(child, entry)| Packed {
                bbox: entry.bbox,
                child,
            })
            .collect::<Vec<_>>();
        if level.is_empty() {
            return;
        }
        let mut height = 1;
        loop {
            level = self.pack_level(level, height);
            if level.len() == 1 {
                break;
            }
            height += 1;
        }
        self.root = level[0].child;
    }
}

/// Sort-Tile-Recursive grouping: sort by the center along `dim`, cut into
/// vertical slabs, and recurse on the next dimension inside each slab. The last
/// dimension is cut directly into runs of `fanout`.
fn tile(items: &mut [Packed], dim: usize, fanout: usize, groups: &mut Vec<Vec<Packed>>) {
    items.sort_unstable_by_key(|packed| OrderedFloat(packed.bbox.center(dim)));
    if dim + 1 == TREE_DIMS {
        groups.extend(items.chunks(fanout).map(<[Packed]>::to_vec));
        return;
    }
    let pages = items.len().div_ceil(fanout);
    let remaining = to_f64(TREE_DIMS - dim);
    let slabs = (to_f64(pages).powf(1.0 / remaining).ceil() as usize).max(1);
    let slab_size = fanout * pages.div_ceil(slabs);
    for slab in items.chunks_mut(slab_size) {
        tile(slab, dim + 1, fanout, groups);
    }
}

impl Default for RTreeIndex {
    fn default() -> Self {
        RTreeIndex {
            fanout: DEFAULT_FANOUT,
            dimensions: 0,
            root: usize::MAX,
            nodes: Vec::new(),
            entries: Vec::new(),
            points: Vec::new(),
            build_time_ms: 0.0,
        }
    }
}

impl SpatialIndex for RTreeIndex {
    fn build(&mut self, data: &[DataPoint]) -> Result<()> {
        let start = Instant::now();
        let dimensions = validate_points(data)?;

        self.dimensions = dimensions;
        self.root = usize::MAX;
        self.nodes = Vec::new();
        self.points = data.to_vec();
        self.entries = self
            .points
            .iter()
            .enumerate()
            .map(|(slot, point)| Entry {
                bbox: BBox::point(point),
                slot,
            })
            .collect();
        self.bulk_load();
        self.build_time_ms = elapsed_ms(start);

        if dimensions > TREE_DIMS {
            log::debug!(
                "r-tree keys cover {TREE_DIMS} of {dimensions} dimensions, the rest are filtered"
            );
        }
        log::debug!(
            "built r-tree: {} entries, {} nodes, height {}, {:.3} ms",
            self.entries.len(),
            self.nodes.len(),
            self.height(),
            self.build_time_ms
        );
        Ok(())
    }

    fn scan(&self, range: &QueryRange) -> Result<Scan> {
        let mut scan = Scan::default();
        if !admit_range(self.dimensions, self.points.len(), range)? {
            return Ok(scan);
        }
        let query_box = BBox::range(range);
        let mut queue = vec![self.root];
        while let Some(node_id) = queue.pop() {
            let node = &self.nodes[node_id];
            if !node.bbox.intersects(&query_box) {
                continue;
            }
            if node.is_leaf() {
                for &entry_id in &node.children {
                    let entry = &self.entries[entry_id];
                    if entry.bbox.intersects(&query_box) {
                        scan.scanned += 1;
                        let point = &self.points[entry.slot];
                        if range.contains(point) {
                            scan.points.push(point.clone());
                        }
                    }
                }
            } else {
                queue.extend(&node.children);
            }
        }
        Ok(scan)
    }

    fn size_mb(&self) -> f64 {
        let node = size_of::<Node>() + self.fanout * size_of::<usize>();
        let entry = size_of::<Entry>();
        bytes_to_mb(
            self.nodes.len() * node
                + self.entries.len() * entry
                + self.points.len() * point_bytes(self.dimensions),
        )
    }

    fn name(&self) -> &'static str {
        "R-tree"
    }

    fn build_time_ms(&self) -> f64 {
        self.build_time_ms
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
