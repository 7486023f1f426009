use std::{mem::size_of, time::Instant};

use ordered_float::OrderedFloat;

use crate::{
    error::Result,
    index::{admit_range, bytes_to_mb, elapsed_ms, point_bytes, Scan, SpatialIndex},
    point::{validate_points, DataPoint, QueryRange},
};

struct KdNode {
    point: DataPoint,
    split_dim: usize,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

impl KdNode {
    fn split_value(&self) -> f64 {
        self.point.coord(self.split_dim)
    }
}

/// A k-d tree that stores one point per node.
///
/// The split dimension cycles with depth and every node holds the median of its
/// subtree along that dimension, so the height stays logarithmic for any input.
#[derive(Default)]
pub struct KdTreeIndex {
    root: Option<Box<KdNode>>,
    dimensions: usize,
    num_nodes: usize,
    build_time_ms: f64,
}

impl KdTreeIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes on the longest root-to-leaf path (0 when empty).
    #[must_use]
    pub fn height(&self) -> usize {
        fn height_of(node: Option<&KdNode>) -> usize {
            node.map_or(0, |node| {
                1 + height_of(node.left.as_deref()).max(height_of(node.right.as_deref()))
            })
        }
        height_of(self.root.as_deref())
    }

    // The median at index `len / 2` becomes the node; the smaller half goes left
    // and the rest (greater or equal) goes right.
    fn build_tree(mut points: Vec<DataPoint>, depth: usize, dimensions: usize) -> Option<Box<KdNode>> {
        if points.is_empty() {
            return None;
        }
        let split_dim = depth % dimensions;
        let mid = points.len() / 2;
        points.select_nth_unstable_by_key(mid, |p| OrderedFloat(p.coord(split_dim)));

        let right = points.split_off(mid + 1);
        let point = points.pop()?;
        let left = points;

        Some(Box::new(KdNode {
            point,
            split_dim,
            left: Self::build_tree(left, depth + 1, dimensions),
            right: Self::build_tree(right, depth + 1, dimensions),
        }))
    }

    fn range_query(node: Option<&KdNode>, range: &QueryRange, scan: &mut Scan) {
        let Some(node) = node else {
            return;
        };
        scan.scanned += 1;
        if range.contains(&node.point) {
            scan.points.push(node.point.clone());
        }
        // A box straddling the split plane visits both sides.
        let split = node.split_value();
        if range.min()[node.split_dim] <= split {
            Self::range_query(node.left.as_deref(), range, scan);
        }
        if range.max()[node.split_dim] >= split {
            Self::range_query(node.right.as_deref(), range, scan);
        }
    }

    fn node_bytes(&self) -> usize {
        point_bytes(self.dimensions) + 2 * size_of::<Option<Box<KdNode>>>() + size_of::<usize>()
    }
}

impl SpatialIndex for KdTreeIndex {
    fn build(&mut self, data: &[DataPoint]) -> Result<()> {
        let start = Instant::now();
        let dimensions = validate_points(data)?;

        self.root = if dimensions == 0 {
            None
        } else {
            Self::build_tree(data.to_vec(), 0, dimensions)
        };
        self.dimensions = dimensions;
        self.num_nodes = data.len();
        self.build_time_ms = elapsed_ms(start);

        log::debug!(
            "built k-d tree: {} nodes, height {}, {:.3} ms",
            self.num_nodes,
            self.height(),
            self.build_time_ms
        );
        Ok(())
    }

    fn scan(&self, range: &QueryRange) -> Result<Scan> {
        let mut scan = Scan::default();
        if admit_range(self.dimensions, self.num_nodes, range)? {
            Self::range_query(self.root.as_deref(), range, &mut scan);
        }
        Ok(scan)
    }

    fn size_mb(&self) -> f64 {
        bytes_to_mb(self.num_nodes * self.node_bytes())
    }

    fn name(&self) -> &'static str {
        "k-d Tree"
    }

    fn build_time_ms(&self) -> f64 {
        self.build_time_ms
    }

    fn len(&self) -> usize {
        self.num_nodes
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::{KdNode, KdTreeIndex};
    use crate::{DataPoint, QueryRange, SpatialIndex};

    fn check_partition(node: &KdNode) {
        let dim = node.split_dim;
        let split = node.split_value();
        let mut stack = node.left.as_deref().into_iter().collect::<Vec<_>>();
        while let Some(child) = stack.pop() {
            assert!(child.point.coord(dim) <= split);
            stack.extend(child.left.as_deref());
            stack.extend(child.right.as_deref());
        }
        let mut stack = node.right.as_deref().into_iter().collect::<Vec<_>>();
        while let Some(child) = stack.pop() {
            assert!(child.point.coord(dim) >= split);
            stack.extend(child.left.as_deref());
            stack.extend(child.right.as_deref());
        }
        for child in [node.left.as_deref(), node.right.as_deref()].into_iter().flatten() {
            assert_eq!(child.split_dim, (dim + 1) % 3);
            check_partition(child);
        }
    }

    #[test]
    fn split_dimensions_cycle_and_partition() {
        let mut rng = StdRng::seed_from_u64(0);
        let points = (0..500)
            .map(|i| {
                let coords = (0..3).map(|_| f64::from(rng.gen_range(0..20_i32))).collect();
                DataPoint::new(coords, i)
            })
            .collect::<Vec<_>>();
        let mut tree = KdTreeIndex::new();
        tree.build(&points).unwrap();

        let root = tree.root.as_deref().unwrap();
        assert_eq!(root.split_dim, 0);
        check_partition(root);
    }

    #[test]
    fn height_is_logarithmic() {
        // Sorted and duplicated input must not degrade the tree.
        let points = (0..1023_i32)
            .map(|i| DataPoint::new(vec![f64::from(i / 4), 1.0], i as u64))
            .collect::<Vec<_>>();
        let mut tree = KdTreeIndex::new();
        tree.build(&points).unwrap();
        assert_eq!(tree.len(), 1023);
        assert_eq!(tree.height(), 10);
    }

    #[test]
    fn rebuild_replaces_state() {
        let mut tree = KdTreeIndex::new();
        tree.build(&[DataPoint::new(vec![1.0, 1.0], 7)]).unwrap();
        tree.build(&[DataPoint::new(vec![2.0], 8), DataPoint::new(vec![3.0], 9)])
            .unwrap();
        assert_eq!(tree.dimensions(), 1);
        assert_eq!(tree.len(), 2);

        let range = QueryRange::new(vec![0.0], vec![10.0]).unwrap();
        let mut ids = tree
            .query(&range)
            .unwrap()
            .iter()
            .map(DataPoint::id)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        assert_eq!(ids, vec![8, 9]);
    }

    #[test]
    fn size_grows_with_nodes() {
        let mut tree = KdTreeIndex::new();
        tree.build(&[]).unwrap();
        assert_eq!(tree.size_mb(), 0.0);
        assert_eq!(tree.height(), 0);

        let points = (0..100_i32)
            .map(|i| DataPoint::new(vec![f64::from(i), 0.0], i as u64))
            .collect::<Vec<_>>();
        tree.build(&points).unwrap();
        assert!(tree.size_mb() > 0.0);
    }
}
