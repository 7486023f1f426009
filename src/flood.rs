//! Flood: a learned multi-dimensional index.
//!
//! Points are projected onto one scalar key with a weight vector learned from
//! the data distribution, then kept in a sorted array. A range query maps the
//! corners of its box to a key interval, binary-searches both ends and filters
//! the run in between exactly, since the projection loses information.

use std::{mem::size_of, time::Instant};

use ordered_float::OrderedFloat;

use crate::{
    error::Result,
    index::{admit_range, bytes_to_mb, elapsed_ms, point_bytes, to_f64, Scan, SpatialIndex},
    point::{validate_points, Bounds, DataPoint, QueryRange, DEGENERATE_WIDTH},
};

/// Beyond this many dimensions the key interval is taken from the two extreme
/// corners only, which bound every other corner because all weights are
/// non-negative.
const MAX_CORNER_DIMS: usize = 16;

const DEFAULT_ALPHA: f64 = 1.0;
const DEFAULT_BETA: f64 = 0.1;

/// Linear query cost: `alpha * scanned + beta * random_accesses`.
#[derive(Clone, Debug, PartialEq)]
pub struct CostModel {
    /// Weight of each scanned record.
    pub alpha: f64,
    /// Weight of each random access (binary search step, page jump).
    pub beta: f64,
    /// Relative importance of each dimension; starts as the projection vector.
    pub dimension_weights: Vec<f64>,
}

impl CostModel {
    #[must_use]
    pub fn predict_cost(&self, scan_size: usize, random_accesses: usize) -> f64 {
        self.alpha * to_f64(scan_size) + self.beta * to_f64(random_accesses)
    }
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            dimension_weights: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct FloodIndex {
    dimensions: usize,
    bounds: Bounds,
    projection: Vec<f64>,
    keys: Vec<f64>,
    flattened: Vec<DataPoint>,
    position_map: Vec<usize>,
    cost_model: CostModel,
    build_time_ms: f64,
}

impl FloodIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn projection(&self) -> &[f64] {
        &self.projection
    }

    /// Flattened keys in storage order (non-decreasing).
    #[must_use]
    pub fn keys(&self) -> &[f64] {
        &self.keys
    }

    /// For each stored position, the index of the point in the build input.
    #[must_use]
    pub fn position_map(&self) -> &[usize] {
        &self.position_map
    }

    #[must_use]
    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    /// Calibration hook for the cost model. Currently resets `alpha` and `beta`
    /// to their defaults; the sample queries do not influence layout or queries.
    pub fn train(&mut self, training_queries: &[QueryRange]) {
        self.cost_model.alpha = DEFAULT_ALPHA;
        self.cost_model.beta = DEFAULT_BETA;
        log::debug!(
            "flood cost model reset with {} sample queries",
            training_queries.len()
        );
    }

    /// Predicted cost of answering `range`: the run it would scan plus the two
    /// binary searches that locate it.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` like [`SpatialIndex::query`].
    pub fn estimate_cost(&self, range: &QueryRange) -> Result<f64> {
        if !admit_range(self.dimensions, self.keys.len(), range)? {
            return Ok(0.0);
        }
        let (start, end) = self.scan_interval(range);
        Ok(self.cost_model.predict_cost(end - start, 2))
    }

    /// The scalar key of `coords`: a weighted sum of normalized coordinates.
    #[must_use]
    pub fn flattened_key(&self, coords: &[f64]) -> f64 {
        coords
            .iter()
            .zip(&self.projection)
            .enumerate()
            .map(|(dim, (&c, &w))| w * self.bounds.normalize(dim, c))
            .sum()
    }

    // Weights proportional to the standard deviation of each dimension, scaled so
    // their squares sum to one. Coordinates are divided by their largest magnitude
    // first so squared deviations stay finite; a common factor keeps the ratios.
    fn learn_projection(data: &[DataPoint], dims: usize) -> Vec<f64> {
        let uniform = vec![1.0 / to_f64(dims).sqrt(); dims];
        let scale = data
            .iter()
            .flat_map(DataPoint::coords)
            .fold(0.0_f64, |acc, c| acc.max(c.abs()));
        if scale == 0.0 || !scale.is_finite() {
            return uniform;
        }

        let n = to_f64(data.len());
        let mut mean = vec![0.0; dims];
        for point in data {
            for (m, c) in mean.iter_mut().zip(point.coords()) {
                *m += c / scale;
            }
        }
        for m in &mut mean {
            *m /= n;
        }
        let mut variance = vec![0.0; dims];
        for point in data {
            for ((v, c), m) in variance.iter_mut().zip(point.coords()).zip(&mean) {
                *v += (c / scale - m).powi(2);
            }
        }
        for v in &mut variance {
            *v /= n;
        }

        let total: f64 = variance.iter().sum();
        if !total.is_finite() || total < DEGENERATE_WIDTH {
            return uniform;
        }
        variance.iter().map(|v| (v / total).sqrt()).collect()
    }

    // Lowest and highest key over the corners of the query box.
    fn key_interval(&self, range: &QueryRange) -> (f64, f64) {
        if self.dimensions > MAX_CORNER_DIMS {
            return (
                self.flattened_key(range.min()),
                self.flattened_key(range.max()),
            );
        }
        let mut corner = vec![0.0; self.dimensions];
        let mut key_lo = f64::INFINITY;
        let mut key_hi = f64::NEG_INFINITY;
        for mask in 0..1usize << self.dimensions {
            for (dim, c) in corner.iter_mut().enumerate() {
                *c = if mask >> dim & 1 == 0 {
                    range.min()[dim]
                } else {
                    range.max()[dim]
                };
            }
            let key = self.flattened_key(&corner);
            key_lo = key_lo.min(key);
            key_hi = key_hi.max(key);
        }
        (key_lo, key_hi)
    }

    // Positions `[start, end)` of the keys inside the query's key interval.
    fn scan_interval(&self, range: &QueryRange) -> (usize, usize) {
        let (key_lo, key_hi) = self.key_interval(range);
        let start = self.keys.partition_point(|&k| k < key_lo);
        let end = self.keys.partition_point(|&k| k <= key_hi);
        (start, end.max(start))
    }
}

impl SpatialIndex for FloodIndex {
    fn build(&mut self, data: &[DataPoint]) -> Result<()> {
        let start = Instant::now();
        let dims = validate_points(data)?;

        // Distribution analysis and projection learning.
        self.dimensions = dims;
        self.bounds = Bounds::of(data);
        self.projection = if dims == 0 {
            Vec::new()
        } else {
            Self::learn_projection(data, dims)
        };
        self.cost_model = CostModel {
            dimension_weights: self.projection.clone(),
            ..CostModel::default()
        };

        // Flattening.
        let keys = data
            .iter()
            .map(|point| self.flattened_key(point.coords()))
            .collect::<Vec<_>>();
        let mut order = (0..data.len()).collect::<Vec<_>>();
        order.sort_by_key(|&i| OrderedFloat(keys[i]));
        self.keys = order.iter().map(|&i| keys[i]).collect();
        self.flattened = order.iter().map(|&i| data[i].clone()).collect();
        self.position_map = order;
        self.build_time_ms = elapsed_ms(start);

        log::debug!(
            "built flood index: {} points, projection {:?}, {:.3} ms",
            self.flattened.len(),
            self.projection,
            self.build_time_ms
        );
        Ok(())
    }

    fn scan(&self, range: &QueryRange) -> Result<Scan> {
        if !admit_range(self.dimensions, self.flattened.len(), range)? {
            return Ok(Scan::default());
        }
        let (start, end) = self.scan_interval(range);
        let points = self.flattened[start..end]
            .iter()
            .filter(|point| range.contains(point))
            .cloned()
            .collect();
        Ok(Scan {
            points,
            scanned: end - start,
        })
    }

    fn size_mb(&self) -> f64 {
        let n = self.flattened.len();
        let per_point = point_bytes(self.dimensions) + size_of::<f64>() + size_of::<usize>();
        let vectors = (self.projection.len() + self.cost_model.dimension_weights.len())
            * size_of::<f64>();
        bytes_to_mb(n * per_point + vectors)
    }

    fn name(&self) -> &'static str {
        "Flood"
    }

    fn build_time_ms(&self) -> f64 {
        self.build_time_ms
    }

    fn len(&self) -> usize {
        self.flattened.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::{CostModel, FloodIndex};
    use crate::{DataPoint, QueryRange, SpatialIndex};

    fn skewed_points(n: u64, seed: u64) -> Vec<DataPoint> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|id| {
                DataPoint::new(
                    vec![
                        rng.gen_range(0.0..1000.0),
                        rng.gen_range(0.0..10.0),
                        rng.gen_range(-1.0..1.0),
                    ],
                    id,
                )
            })
            .collect()
    }

    #[test]
    fn keys_are_sorted() {
        let mut flood = FloodIndex::new();
        flood.build(&skewed_points(2000, 0)).unwrap();
        assert_eq!(flood.keys().len(), 2000);
        assert!(flood.keys().windows(2).all(|w| w[0] <= w[1]));

        let mut positions = flood.position_map().to_vec();
        positions.sort_unstable();
        assert_eq!(positions, (0..2000).collect::<Vec<_>>());
    }

    #[test]
    fn projection_follows_variance() {
        let mut flood = FloodIndex::new();
        flood.build(&skewed_points(2000, 1)).unwrap();
        let w = flood.projection();
        assert!(w[0] > w[1] && w[1] > w[2]);
        let norm: f64 = w.iter().map(|x| x * x).sum();
        assert!((norm - 1.0).abs() < 1e-9);
        assert_eq!(flood.cost_model().dimension_weights, w.to_vec());
    }

    #[test]
    fn uniform_projection_without_variance() {
        let points = (0..10)
            .map(|id| DataPoint::new(vec![3.0, 3.0, 3.0, 3.0], id))
            .collect::<Vec<_>>();
        let mut flood = FloodIndex::new();
        flood.build(&points).unwrap();
        assert_eq!(flood.projection(), &[0.5, 0.5, 0.5, 0.5]);
        assert!(flood.keys().iter().all(|&k| k == 0.0));

        let range = QueryRange::new(vec![3.0; 4], vec![3.0; 4]).unwrap();
        assert_eq!(flood.query(&range).unwrap().len(), 10);
    }

    #[test]
    fn key_is_monotonic_in_each_coordinate() {
        let mut flood = FloodIndex::new();
        flood.build(&skewed_points(500, 2)).unwrap();
        for dim in 0..3 {
            let mut coords = vec![0.0, 0.0, -1.0];
            let mut previous = f64::NEG_INFINITY;
            for step in 0..=50_i32 {
                coords[dim] = -5.0 + f64::from(step) * 25.0;
                let key = flood.flattened_key(&coords);
                assert!(key >= previous);
                previous = key;
            }
        }
    }

    #[test]
    fn cost_model() {
        let model = CostModel::default();
        assert_eq!(model.predict_cost(100, 10), 101.0);

        let mut flood = FloodIndex::new();
        flood.build(&skewed_points(1000, 3)).unwrap();
        let everything = QueryRange::new(vec![-1.0, -1.0, -2.0], vec![1001.0, 11.0, 2.0]).unwrap();
        let nothing = QueryRange::new(vec![2000.0, 20.0, 5.0], vec![3000.0, 30.0, 6.0]).unwrap();
        assert!((flood.estimate_cost(&everything).unwrap() - 1000.2).abs() < 1e-9);
        assert!((flood.estimate_cost(&nothing).unwrap() - 0.2).abs() < 1e-9);

        flood.train(&[everything]);
        assert_eq!(flood.cost_model().alpha, 1.0);
        assert_eq!(flood.cost_model().beta, 0.1);
    }

    #[test]
    fn huge_coordinates_keep_a_finite_projection() {
        let points = (0..10_u32)
            .map(|i| DataPoint::new(vec![f64::from(i) * 1e160, f64::from(i)], u64::from(i)))
            .collect::<Vec<_>>();
        let mut flood = FloodIndex::new();
        flood.build(&points).unwrap();
        assert!(flood.projection().iter().all(|w| w.is_finite()));
        assert!(flood.keys().iter().all(|k| k.is_finite()));

        let range = QueryRange::new(vec![0.0, 0.0], vec![1e170, 10.0]).unwrap();
        assert_eq!(flood.query(&range).unwrap().len(), 10);
    }

    #[test]
    fn scan_counts_the_key_interval() {
        let points = (0..100_u32)
            .map(|i| DataPoint::new(vec![f64::from(i)], u64::from(i)))
            .collect::<Vec<_>>();
        let mut flood = FloodIndex::new();
        flood.build(&points).unwrap();

        // One dimension projects exactly, so the interval is the answer.
        let range = QueryRange::new(vec![10.0], vec![19.0]).unwrap();
        let scan = flood.scan(&range).unwrap();
        assert_eq!(scan.points.len(), 10);
        assert_eq!(scan.scanned, 10);
    }

    #[test]
    fn many_dimensions_use_extreme_corners() {
        let mut rng = StdRng::seed_from_u64(4);
        let points = (0..200)
            .map(|id| DataPoint::new((0..20).map(|_| rng.gen_range(0.0..1.0)).collect(), id))
            .collect::<Vec<_>>();
        let mut flood = FloodIndex::new();
        flood.build(&points).unwrap();

        let range = QueryRange::new(vec![0.1; 20], vec![0.95; 20]).unwrap();
        let expected = points.iter().filter(|p| range.contains(p)).count();
        assert_eq!(flood.query(&range).unwrap().len(), expected);
    }
}
