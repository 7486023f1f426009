use super::bbox::BBox;

/// A node of the packed tree. Leaves have height 1 and their children index
/// entries; inner nodes index other nodes.
pub struct Node {
    pub height: usize,
    pub bbox: BBox,
    pub children: Vec<usize>,
}

impl Node {
    #[must_use]
    pub fn new(height: usize, bbox: BBox, children: Vec<usize>) -> Node {
        Node {
            height,
            bbox,
            children,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.height == 1
    }
}

/// A stored point: its tree key and the slot of its full-dimensional copy.
#[derive(Clone, Copy)]
pub struct Entry {
    pub bbox: BBox,
    pub slot: usize,
}
