//! Synthetic range-query workloads driven by a target selectivity, and their
//! plain-text file format.
//!
//! A workload file starts with `<count> <dimensions>`, followed by one query per
//! line: the `D` lower bounds and then the `D` upper bounds, space-separated.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
    str::FromStr,
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    dataset::PREALLOC_LIMIT,
    error::{IndexError, Result},
    index::to_f64,
    point::{validate_points, Bounds, DataPoint, QueryRange},
};

const SECONDS_PER_HOUR: f64 = 3600.0;
/// Dimension holding timestamps in temporal workloads.
pub const TIME_DIMENSION: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    /// Box on the first two dimensions, every other dimension unrestricted.
    Spatial,
    /// Box on the first two dimensions plus a bounded time window.
    Temporal,
    /// Box on every dimension.
    Mixed,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 3] = [
        WorkloadKind::Spatial,
        WorkloadKind::Temporal,
        WorkloadKind::Mixed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadKind::Spatial => "spatial",
            WorkloadKind::Temporal => "temporal",
            WorkloadKind::Mixed => "mixed",
        }
    }

    /// Fewest dimensions a dataset needs for this kind of workload.
    #[must_use]
    pub fn min_dimensions(self) -> usize {
        match self {
            WorkloadKind::Spatial => 2,
            WorkloadKind::Temporal => TIME_DIMENSION + 1,
            WorkloadKind::Mixed => 1,
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spatial" => Ok(WorkloadKind::Spatial),
            "temporal" => Ok(WorkloadKind::Temporal),
            "mixed" => Ok(WorkloadKind::Mixed),
            other => Err(IndexError::Parse {
                line: 0,
                message: format!("unknown workload kind '{other}'"),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadConfig {
    pub kind: WorkloadKind,
    pub num_queries: usize,
    /// Target fraction of the domain volume covered by each query, in `(0, 1]`.
    pub selectivity: f64,
    /// Upper bound on the time window of temporal queries.
    pub temporal_range_hours: f64,
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            kind: WorkloadKind::Mixed,
            num_queries: 1000,
            selectivity: 0.01,
            temporal_range_hours: 24.0,
            seed: 42,
        }
    }
}

/// Generates query ranges from an explicit, seeded random number generator.
pub struct WorkloadGenerator {
    rng: StdRng,
}

impl WorkloadGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        WorkloadGenerator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generates `config.num_queries` ranges of `config.kind`. The generator is
    /// reseeded with `config.seed`, so equal configs yield equal workloads.
    ///
    /// # Errors
    ///
    /// See [`WorkloadGenerator::spatial`].
    pub fn generate(
        &mut self,
        data: &[DataPoint],
        config: &WorkloadConfig,
    ) -> Result<Vec<QueryRange>> {
        self.rng = StdRng::seed_from_u64(config.seed);
        match config.kind {
            WorkloadKind::Spatial => self.spatial(data, config.num_queries, config.selectivity),
            WorkloadKind::Temporal => self.temporal(
                data,
                config.num_queries,
                config.selectivity,
                config.temporal_range_hours,
            ),
            WorkloadKind::Mixed => self.mixed(data, config.num_queries, config.selectivity),
        }
    }

    /// Ranges of width `domain · sqrt(s)` on dimensions 0 and 1. Every other
    /// dimension spans the whole domain.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelectivity` unless `0 < s <= 1`, and `DimensionMismatch`
    /// when the data has too few dimensions for the workload kind.
    pub fn spatial(
        &mut self,
        data: &[DataPoint],
        num_queries: usize,
        selectivity: f64,
    ) -> Result<Vec<QueryRange>> {
        let Some(bounds) = prepare(data, WorkloadKind::Spatial, selectivity)? else {
            return Ok(Vec::new());
        };
        let fraction = selectivity.sqrt();
        let widths = (0..bounds.dimensions())
            .map(|dim| {
                if dim < 2 {
                    bounds.width(dim) * fraction
                } else {
                    bounds.width(dim)
                }
            })
            .collect::<Vec<_>>();
        self.ranges(&bounds, &widths, num_queries)
    }

    /// Ranges of width `domain · sqrt(s / 2)` on dimensions 0 and 1 and a time
    /// window on dimension 2 of `min(domain, hours · 3600)` seconds.
    ///
    /// # Errors
    ///
    /// See [`WorkloadGenerator::spatial`].
    pub fn temporal(
        &mut self,
        data: &[DataPoint],
        num_queries: usize,
        selectivity: f64,
        time_range_hours: f64,
    ) -> Result<Vec<QueryRange>> {
        let Some(bounds) = prepare(data, WorkloadKind::Temporal, selectivity)? else {
            return Ok(Vec::new());
        };
        let fraction = (selectivity * 0.5).sqrt();
        let window = time_range_hours.max(0.0) * SECONDS_PER_HOUR;
        let widths = (0..bounds.dimensions())
            .map(|dim| match dim {
                0 | 1 => bounds.width(dim) * fraction,
                TIME_DIMENSION => bounds.width(dim).min(window),
                _ => bounds.width(dim),
            })
            .collect::<Vec<_>>();
        self.ranges(&bounds, &widths, num_queries)
    }

    /// Ranges of width `domain · s^(1/D)` on every dimension.
    ///
    /// # Errors
    ///
    /// See [`WorkloadGenerator::spatial`].
    pub fn mixed(
        &mut self,
        data: &[DataPoint],
        num_queries: usize,
        selectivity: f64,
    ) -> Result<Vec<QueryRange>> {
        let Some(bounds) = prepare(data, WorkloadKind::Mixed, selectivity)? else {
            return Ok(Vec::new());
        };
        let fraction = selectivity.powf(1.0 / to_f64(bounds.dimensions()));
        let widths = (0..bounds.dimensions())
            .map(|dim| bounds.width(dim) * fraction)
            .collect::<Vec<_>>();
        self.ranges(&bounds, &widths, num_queries)
    }

    // Each start is uniform over the positions where the range still fits.
    fn ranges(
        &mut self,
        bounds: &Bounds,
        widths: &[f64],
        num_queries: usize,
    ) -> Result<Vec<QueryRange>> {
        (0..num_queries)
            .map(|_| {
                let mut min = Vec::with_capacity(widths.len());
                let mut max = Vec::with_capacity(widths.len());
                for (dim, &width) in widths.iter().enumerate() {
                    let slack = bounds.width(dim) - width;
                    let start = if slack > 0.0 {
                        bounds.min[dim] + self.rng.gen_range(0.0..slack)
                    } else {
                        bounds.min[dim]
                    };
                    min.push(start);
                    max.push((start + width).min(bounds.max[dim]));
                }
                QueryRange::new(min, max)
            })
            .collect()
    }
}

fn prepare(data: &[DataPoint], kind: WorkloadKind, selectivity: f64) -> Result<Option<Bounds>> {
    if !(selectivity > 0.0 && selectivity <= 1.0) {
        return Err(IndexError::InvalidSelectivity(selectivity));
    }
    let dims = validate_points(data)?;
    if dims == 0 {
        log::warn!("no data to derive a {kind} workload from");
        return Ok(None);
    }
    if dims < kind.min_dimensions() {
        return Err(IndexError::DimensionMismatch {
            expected: kind.min_dimensions(),
            found: dims,
        });
    }
    Ok(Some(Bounds::of(data)))
}

/// Writes `ranges` to `path` in the workload file format.
///
/// # Errors
///
/// Fails on I/O errors or when the ranges disagree on their dimensionality.
pub fn save_workload(path: impl AsRef<Path>, ranges: &[QueryRange]) -> Result<()> {
    let dims = ranges.first().map_or(0, QueryRange::dimensions);
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writeln!(writer, "{} {dims}", ranges.len())?;
    for range in ranges {
        if range.dimensions() != dims {
            return Err(IndexError::DimensionMismatch {
                expected: dims,
                found: range.dimensions(),
            });
        }
        let values = range
            .min()
            .iter()
            .chain(range.max())
            .map(f64::to_string)
            .collect::<Vec<_>>();
        writeln!(writer, "{}", values.join(" "))?;
    }
    writer.flush()?;
    log::info!("saved {} queries to {}", ranges.len(), path.as_ref().display());
    Ok(())
}

/// Reads a workload written by [`save_workload`].
///
/// # Errors
///
/// Returns `Parse` with the 1-based line number on malformed content, including
/// a file holding fewer queries than its header announces.
pub fn load_workload(path: impl AsRef<Path>) -> Result<Vec<QueryRange>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut lines = reader.lines();

    let header = lines.next().transpose()?.unwrap_or_default();
    let header = parse_numbers::<usize>(&header, 1)?;
    let &[count, dims] = header.as_slice() else {
        return Err(IndexError::Parse {
            line: 1,
            message: "expected '<count> <dimensions>'".to_string(),
        });
    };

    let oversized = || IndexError::Parse {
        line: 1,
        message: format!("header '{count} {dims}' is too large"),
    };
    let last_line = count.checked_add(2).ok_or_else(oversized)?;
    let width = dims.checked_mul(2).ok_or_else(oversized)?;

    let mut ranges = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for line_no in 2..last_line {
        let line = lines.next().transpose()?.ok_or_else(|| IndexError::Parse {
            line: line_no,
            message: format!("expected {count} queries, found {}", line_no - 2),
        })?;
        let mut values = parse_numbers::<f64>(&line, line_no)?;
        if values.len() != width {
            return Err(IndexError::Parse {
                line: line_no,
                message: format!("expected {width} values, found {}", values.len()),
            });
        }
        let max = values.split_off(dims);
        ranges.push(QueryRange::new(values, max)?);
    }
    Ok(ranges)
}

fn parse_numbers<T: FromStr>(line: &str, line_no: usize) -> Result<Vec<T>>
where
    T::Err: fmt::Display,
{
    line.split_whitespace()
        .map(|token| {
            token.parse::<T>().map_err(|e| IndexError::Parse {
                line: line_no,
                message: format!("'{token}': {e}"),
            })
        })
        .collect()
}
