use crate::point::{DataPoint, QueryRange};

/// Number of coordinates that take part in the tree's bounding boxes.
pub const TREE_DIMS: usize = 3;

/// An axis-aligned box over the first three coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub min: [f64; TREE_DIMS],
    pub max: [f64; TREE_DIMS],
}

impl BBox {
    pub fn new(min: [f64; TREE_DIMS], max: [f64; TREE_DIMS]) -> BBox {
        BBox { min, max }
    }

    /// Degenerate box at the first three coordinates of `point`. Missing
    /// coordinates are 0.
    pub fn point(point: &DataPoint) -> BBox {
        let corner = pad(point.coords(), 0.0);
        BBox::new(corner, corner)
    }

    /// Box covering the first three intervals of `range`. Missing dimensions
    /// span `[0, 1]`, which contains the padding used for points.
    pub fn range(range: &QueryRange) -> BBox {
        BBox::new(pad(range.min(), 0.0), pad(range.max(), 1.0))
    }

    pub fn union(&self, other: &BBox) -> BBox {
        let mut result = *self;
        for i in 0..TREE_DIMS {
            result.min[i] = result.min[i].min(other.min[i]);
            result.max[i] = result.max[i].max(other.max[i]);
        }
        result
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        (0..TREE_DIMS).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    pub fn center(&self, dim: usize) -> f64 {
        (self.min[dim] + self.max[dim]) / 2.0
    }
}

impl Default for BBox {
    // Empty box: the identity of `union`.
    fn default() -> Self {
        BBox {
            min: [f64::INFINITY; TREE_DIMS],
            max: [f64::NEG_INFINITY; TREE_DIMS],
        }
    }
}

fn pad(coords: &[f64], fill: f64) -> [f64; TREE_DIMS] {
    let mut padded = [fill; TREE_DIMS];
    for (slot, &c) in padded.iter_mut().zip(coords) {
        *slot = c;
    }
    padded
}

#[cfg(test)]
mod tests {
    use super::BBox;
    use crate::{DataPoint, QueryRange};

    #[test]
    fn padding() {
        let point = BBox::point(&DataPoint::new(vec![2.0, 3.0], 0));
        assert_eq!(point.min, [2.0, 3.0, 0.0]);
        assert_eq!(point.max, [2.0, 3.0, 0.0]);

        let range = BBox::range(&QueryRange::new(vec![1.0], vec![4.0]).unwrap());
        assert_eq!(range.min, [1.0, 0.0, 0.0]);
        assert_eq!(range.max, [4.0, 1.0, 1.0]);

        let wide = DataPoint::new(vec![1.0, 2.0, 3.0, 4.0, 5.0], 0);
        assert_eq!(BBox::point(&wide).max, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn union_and_intersection() {
        let a = BBox::new([0.0; 3], [1.0; 3]);
        let b = BBox::new([2.0; 3], [3.0; 3]);
        assert!(!a.intersects(&b));
        let ab = a.union(&b);
        assert_eq!(ab, BBox::new([0.0; 3], [3.0; 3]));
        assert!(ab.intersects(&a));
        assert!(BBox::default().union(&a) == a);

        // Touching faces intersect (closed intervals).
        let c = BBox::new([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]);
        assert!(a.intersects(&c));
        assert_eq!(c.center(0), 1.5);
    }
}
