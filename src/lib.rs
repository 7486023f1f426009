mod benchmark;
mod dataset;
mod error;
#[allow(clippy::module_name_repetitions)]
mod flood;
mod index;
#[allow(clippy::module_name_repetitions)]
mod kdtree;
#[allow(clippy::module_name_repetitions)]
mod linear;
mod point;
mod rtree;
mod workload;
mod zorder;

pub use benchmark::{
    median, percentile, save_results, Benchmark, BenchmarkConfig, BenchmarkResult, IndexMetrics,
};
pub use dataset::{clean, load_binary, load_csv, save_binary, DatasetStats};
pub use error::{IndexError, Result};
pub use flood::{CostModel, FloodIndex};
pub use index::{IndexKind, Scan, SpatialIndex};
pub use kdtree::KdTreeIndex;
pub use linear::LinearIndex;
pub use point::{Bounds, DataPoint, QueryRange, DEGENERATE_WIDTH};
pub use rtree::{RTreeIndex, DEFAULT_FANOUT, TREE_DIMS};
pub use workload::{
    load_workload, save_workload, WorkloadConfig, WorkloadGenerator, WorkloadKind, TIME_DIMENSION,
};
pub use zorder::{ZOrderIndex, MAX_BITS_PER_DIM};
