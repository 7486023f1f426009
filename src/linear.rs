use std::time::Instant;

use crate::{
    error::Result,
    index::{admit_range, bytes_to_mb, elapsed_ms, point_bytes, Scan, SpatialIndex},
    point::{validate_points, DataPoint, QueryRange},
};

/// Full scan over a private copy of the dataset. Serves as ground truth for the
/// structured indexes and as the lower bound in benchmarks.
#[derive(Default)]
pub struct LinearIndex {
    dimensions: usize,
    data: Vec<DataPoint>,
    build_time_ms: f64,
}

impl LinearIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpatialIndex for LinearIndex {
    fn build(&mut self, data: &[DataPoint]) -> Result<()> {
        let start = Instant::now();
        self.dimensions = validate_points(data)?;
        self.data = data.to_vec();
        self.build_time_ms = elapsed_ms(start);
        Ok(())
    }

    fn scan(&self, range: &QueryRange) -> Result<Scan> {
        if !admit_range(self.dimensions, self.data.len(), range)? {
            return Ok(Scan::default());
        }
        let points = self
            .data
            .iter()
            .filter(|point| range.contains(point))
            .cloned()
            .collect();
        Ok(Scan {
            points,
            scanned: self.data.len(),
        })
    }

    fn size_mb(&self) -> f64 {
        bytes_to_mb(self.data.len() * point_bytes(self.dimensions))
    }

    fn name(&self) -> &'static str {
        "Linear Scan"
    }

    fn build_time_ms(&self) -> f64 {
        self.build_time_ms
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
