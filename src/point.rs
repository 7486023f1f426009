use std::fmt;

use crate::error::{IndexError, Result};

/// Widths below this are treated as a single value (degenerate dimension).
pub const DEGENERATE_WIDTH: f64 = 1e-10;

/// A point with a fixed number of coordinates and a 64-bit identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct DataPoint {
    coords: Vec<f64>,
    id: u64,
}

impl DataPoint {
    #[must_use]
    pub fn new(coords: Vec<f64>, id: u64) -> DataPoint {
        DataPoint { coords, id }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// The coordinate along `dim`.
    ///
    /// # Panics
    ///
    /// Panics if `dim` is not below [`DataPoint::dimensions`].
    #[must_use]
    pub fn coord(&self, dim: usize) -> f64 {
        self.coords[dim]
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.coords.len()
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataPoint(id={}, [", self.id)?;
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "])")
    }
}

/// An axis-aligned box predicate: closed interval `[min[i], max[i]]` per dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryRange {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl QueryRange {
    /// Creates a range from its lower and upper corners.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` when the corners have different lengths and
    /// `EmptyPoint` when they are empty. Inverted bounds are accepted; such a
    /// range matches nothing.
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Result<QueryRange> {
        if min.len() != max.len() {
            return Err(IndexError::DimensionMismatch {
                expected: min.len(),
                found: max.len(),
            });
        }
        if min.is_empty() {
            return Err(IndexError::EmptyPoint);
        }
        Ok(QueryRange { min, max })
    }

    #[must_use]
    pub fn min(&self) -> &[f64] {
        &self.min
    }

    #[must_use]
    pub fn max(&self) -> &[f64] {
        &self.max
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.min.len()
    }

    /// True when `min[i] <= max[i]` holds in every dimension.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.iter().zip(&self.max).all(|(lo, hi)| lo <= hi)
    }

    /// True iff every coordinate of `point` lies within its closed interval.
    /// Points of a different dimensionality never match.
    #[must_use]
    pub fn contains(&self, point: &DataPoint) -> bool {
        point.dimensions() == self.dimensions()
            && point
                .coords()
                .iter()
                .zip(self.min.iter().zip(&self.max))
                .all(|(c, (lo, hi))| lo <= c && c <= hi)
    }

    #[must_use]
    pub fn volume(&self) -> f64 {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(lo, hi)| (hi - lo).max(0.0))
            .product()
    }
}

impl fmt::Display for QueryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryRange(")?;
        for (i, (lo, hi)) in self.min.iter().zip(&self.max).enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            write!(f, "[{lo}, {hi}]")?;
        }
        write!(f, ")")
    }
}

/// Per-dimension minimum and maximum over a dataset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bounds {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl Bounds {
    /// Computes the bounds of `points`. An empty dataset has zero dimensions.
    #[must_use]
    pub fn of(points: &[DataPoint]) -> Bounds {
        let Some(first) = points.first() else {
            return Bounds::default();
        };
        let mut min = first.coords().to_vec();
        let mut max = first.coords().to_vec();
        for point in &points[1..] {
            for (dim, &c) in point.coords().iter().enumerate() {
                min[dim] = min[dim].min(c);
                max[dim] = max[dim].max(c);
            }
        }
        Bounds { min, max }
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.min.len()
    }

    #[must_use]
    pub fn width(&self, dim: usize) -> f64 {
        self.max[dim] - self.min[dim]
    }

    #[must_use]
    pub fn is_degenerate(&self, dim: usize) -> bool {
        self.width(dim) < DEGENERATE_WIDTH
    }

    /// Maps `value` linearly onto `[0, 1]` for values inside the bounds.
    /// Degenerate dimensions map everything to 0.
    #[must_use]
    pub fn normalize(&self, dim: usize, value: f64) -> f64 {
        if self.is_degenerate(dim) {
            0.0
        } else {
            (value - self.min[dim]) / self.width(dim)
        }
    }
}

/// Checks that every point has the same, non-zero dimensionality and returns it.
/// Empty input yields 0.
pub(crate) fn uniform_dimensions(points: &[DataPoint]) -> Result<usize> {
    let Some(first) = points.first() else {
        return Ok(0);
    };
    let dims = first.dimensions();
    if dims == 0 {
        return Err(IndexError::EmptyPoint);
    }
    for point in points {
        if point.dimensions() != dims {
            return Err(IndexError::DimensionMismatch {
                expected: dims,
                found: point.dimensions(),
            });
        }
    }
    Ok(dims)
}

/// Like [`uniform_dimensions`], and additionally rejects NaN or infinite
/// coordinates, which have no place in an ordering.
pub(crate) fn validate_points(points: &[DataPoint]) -> Result<usize> {
    let dims = uniform_dimensions(points)?;
    for point in points {
        if let Some(dim) = point.coords().iter().position(|c| !c.is_finite()) {
            return Err(IndexError::NonFiniteCoordinate { id: point.id(), dim });
        }
    }
    Ok(dims)
}
