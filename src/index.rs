use std::{fmt, str::FromStr, time::Instant};

use conv::ValueFrom;

use crate::{
    error::{IndexError, Result},
    flood::FloodIndex,
    kdtree::KdTreeIndex,
    linear::LinearIndex,
    point::{DataPoint, QueryRange},
    rtree::RTreeIndex,
    zorder::ZOrderIndex,
};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A range index built once from a static dataset and queried read-only afterwards.
///
/// `build` replaces any previous state and must not run concurrently with other
/// calls on the same instance. `query` never mutates the index, so a built index
/// can be shared across threads and queried concurrently.
pub trait SpatialIndex: Send + Sync {
    /// Builds the index from `data`, replacing any previous contents.
    ///
    /// # Errors
    ///
    /// Fails when points disagree on their dimensionality or carry a NaN or
    /// infinite coordinate. The previous state is kept in that case.
    fn build(&mut self, data: &[DataPoint]) -> Result<()>;

    /// Answers `range` and reports how many stored candidates were examined on
    /// the way, matching or not.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` when `range` and a non-empty index disagree on
    /// their dimensionality.
    fn scan(&self, range: &QueryRange) -> Result<Scan>;

    /// Returns every stored point contained in `range`, in no particular order.
    ///
    /// # Errors
    ///
    /// See [`SpatialIndex::scan`].
    fn query(&self, range: &QueryRange) -> Result<Vec<DataPoint>> {
        Ok(self.scan(range)?.points)
    }

    /// Estimated memory footprint in megabytes.
    fn size_mb(&self) -> f64;

    fn name(&self) -> &'static str;

    /// Wall-clock duration of the most recent `build`, in milliseconds.
    fn build_time_ms(&self) -> f64;

    /// Number of indexed points.
    fn len(&self) -> usize;

    /// Dimensionality of the indexed points, 0 while empty.
    fn dimensions(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one range query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scan {
    /// Points inside the range.
    pub points: Vec<DataPoint>,
    /// Candidates checked against the range, matching or not.
    pub scanned: usize,
}

/// The available index implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexKind {
    KdTree,
    ZOrder,
    RTree,
    Flood,
    Linear,
}

impl IndexKind {
    /// The four structured indexes, without the linear scan baseline.
    pub const ALL: [IndexKind; 4] = [
        IndexKind::KdTree,
        IndexKind::ZOrder,
        IndexKind::RTree,
        IndexKind::Flood,
    ];

    /// Creates an empty index with default parameters.
    #[must_use]
    pub fn create(self) -> Box<dyn SpatialIndex> {
        match self {
            IndexKind::KdTree => Box::new(KdTreeIndex::new()),
            IndexKind::ZOrder => Box::new(ZOrderIndex::new()),
            IndexKind::RTree => Box::new(RTreeIndex::default()),
            IndexKind::Flood => Box::new(FloodIndex::new()),
            IndexKind::Linear => Box::new(LinearIndex::new()),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::KdTree => "kd-tree",
            IndexKind::ZOrder => "z-order",
            IndexKind::RTree => "rtree",
            IndexKind::Flood => "flood",
            IndexKind::Linear => "linear",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kd-tree" | "kdtree" | "kd" => Ok(IndexKind::KdTree),
            "z-order" | "zorder" | "morton" => Ok(IndexKind::ZOrder),
            "rtree" | "r-tree" | "r*-tree" => Ok(IndexKind::RTree),
            "flood" => Ok(IndexKind::Flood),
            "linear" | "scan" => Ok(IndexKind::Linear),
            other => Err(IndexError::Parse {
                line: 0,
                message: format!("unknown index kind '{other}'"),
            }),
        }
    }
}

/// Decides whether `range` needs to be evaluated against an index holding `len`
/// points of `dims` dimensions. `Ok(false)` means the answer is empty.
pub(crate) fn admit_range(dims: usize, len: usize, range: &QueryRange) -> Result<bool> {
    if len == 0 {
        return Ok(false);
    }
    if range.dimensions() != dims {
        return Err(IndexError::DimensionMismatch {
            expected: dims,
            found: range.dimensions(),
        });
    }
    Ok(range.is_valid())
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

pub(crate) fn bytes_to_mb(bytes: usize) -> f64 {
    to_f64(bytes) / BYTES_PER_MB
}

pub(crate) fn to_f64(n: usize) -> f64 {
    f64::value_from(n).unwrap_or(f64::MAX)
}

/// Approximate heap footprint of one stored point with `dims` coordinates.
pub(crate) fn point_bytes(dims: usize) -> usize {
    std::mem::size_of::<DataPoint>() + dims * std::mem::size_of::<f64>()
}
