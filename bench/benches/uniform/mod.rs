mod build;
mod query;

use mdindex::DataPoint;
use rand::{rngs::StdRng, Rng, SeedableRng};

// Benchmark parameters:
pub const DIMENSION: usize = 3;
pub const NUM_POINTS: usize = 20_000;
pub const NUM_QUERIES: usize = 200;
pub const SELECTIVITY: f64 = 0.001; // Fraction of the domain covered by each query

pub use build::benchmark as build;
pub use query::benchmark as query;

pub fn dataset() -> Vec<[f64; DIMENSION]> {
    let mut rng = StdRng::seed_from_u64(0);
    (0..NUM_POINTS)
        .map(|_| {
            let mut point = [0.0; DIMENSION];
            for c in &mut point {
                *c = rng.gen_range(-100.0..100.0);
            }
            point
        })
        .collect()
}

pub fn data_points(points: &[[f64; DIMENSION]]) -> Vec<DataPoint> {
    points
        .iter()
        .zip(0u64..)
        .map(|(point, id)| DataPoint::new(point.to_vec(), id))
        .collect()
}
