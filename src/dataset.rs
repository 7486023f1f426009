//! Loading, saving and cleaning raw point datasets.
//!
//! The binary format is a fixed-width little-endian stream: a `u64` point count,
//! a `u64` dimensionality, then for every point its coordinates as `f64`
//! followed by its `u64` id.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Read, Write},
    path::Path,
};

use bincode::config::{Config, Configuration, Fixint, LittleEndian};

use crate::{
    error::{IndexError, Result},
    index::to_f64,
    point::{uniform_dimensions, Bounds, DataPoint},
};

/// Most elements reserved up front from a length read out of a file header.
/// Larger files still load; their vectors grow as the data arrives.
pub(crate) const PREALLOC_LIMIT: usize = 1 << 16;

fn config() -> Configuration<LittleEndian, Fixint> {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

fn write_u64(writer: &mut impl Write, value: u64, config: impl Config) -> Result<()> {
    bincode::encode_into_std_write(value, writer, config)?;
    Ok(())
}

fn read_u64(reader: &mut impl Read, config: impl Config) -> Result<u64> {
    Ok(bincode::decode_from_std_read::<u64, _, _>(reader, config)?)
}

fn read_len(reader: &mut impl Read, config: impl Config, what: &str) -> Result<usize> {
    let value = read_u64(reader, config)?;
    usize::try_from(value).map_err(|_| IndexError::Parse {
        line: 0,
        message: format!("{what} {value} does not fit in memory"),
    })
}

/// Writes `points` to `path` in the binary point format.
///
/// # Errors
///
/// Fails on I/O errors or when the points disagree on their dimensionality.
pub fn save_binary(path: impl AsRef<Path>, points: &[DataPoint]) -> Result<()> {
    let dims = uniform_dimensions(points)?;
    let config = config();
    let mut writer = BufWriter::new(File::create(path.as_ref())?);

    write_u64(&mut writer, points.len() as u64, config)?;
    write_u64(&mut writer, dims as u64, config)?;
    for point in points {
        for &c in point.coords() {
            bincode::encode_into_std_write(c, &mut writer, config)?;
        }
        write_u64(&mut writer, point.id(), config)?;
    }
    writer.flush()?;

    log::info!(
        "saved {} points ({dims} dimensions) to {}",
        points.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Reads a dataset written by [`save_binary`].
///
/// # Errors
///
/// Truncated or malformed files fail as a whole; no partial dataset is returned.
pub fn load_binary(path: impl AsRef<Path>) -> Result<Vec<DataPoint>> {
    let config = config();
    let mut reader = BufReader::new(File::open(path.as_ref())?);

    let count = read_len(&mut reader, config, "point count")?;
    let dims = read_len(&mut reader, config, "dimensionality")?;
    if count > 0 && dims == 0 {
        return Err(IndexError::EmptyPoint);
    }

    let mut points = Vec::new();
    for _ in 0..count {
        let mut coords = Vec::with_capacity(dims.min(PREALLOC_LIMIT));
        for _ in 0..dims {
            coords.push(bincode::decode_from_std_read::<f64, _, _>(
                &mut reader,
                config,
            )?);
        }
        let id = read_u64(&mut reader, config)?;
        points.push(DataPoint::new(coords, id));
    }

    log::info!(
        "loaded {count} points ({dims} dimensions) from {}",
        path.as_ref().display()
    );
    Ok(points)
}

/// Reads the given numeric `columns` of a comma-separated file. The row number
/// (0-based, header excluded) becomes the point id. A first line that does not
/// parse as numbers is treated as a header and skipped; blank lines are ignored.
///
/// # Errors
///
/// Returns `Parse` with the 1-based line number when a column is missing or not
/// numeric, and `EmptyPoint` when `columns` is empty.
pub fn load_csv(path: impl AsRef<Path>, columns: &[usize]) -> Result<Vec<DataPoint>> {
    if columns.is_empty() {
        return Err(IndexError::EmptyPoint);
    }
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut points = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = line.split(',').map(str::trim).collect::<Vec<_>>();
        match parse_row(&fields, columns) {
            Ok(coords) => {
                let id = points.len() as u64;
                points.push(DataPoint::new(coords, id));
            }
            Err(_) if line_no == 0 => {
                log::debug!("skipping csv header: {line}");
            }
            Err(message) => {
                return Err(IndexError::Parse {
                    line: line_no + 1,
                    message,
                })
            }
        }
    }

    log::info!(
        "loaded {} points from {}",
        points.len(),
        path.as_ref().display()
    );
    Ok(points)
}

fn parse_row(fields: &[&str], columns: &[usize]) -> std::result::Result<Vec<f64>, String> {
    columns
        .iter()
        .map(|&col| {
            let field = fields
                .get(col)
                .ok_or_else(|| format!("missing column {col}"))?;
            field
                .parse::<f64>()
                .map_err(|e| format!("column {col}: '{field}': {e}"))
        })
        .collect()
}

/// Drops points with non-finite coordinates and, when `valid` is given, points
/// outside its per-dimension closed intervals. Ids are preserved.
#[must_use]
pub fn clean(points: Vec<DataPoint>, valid: Option<&Bounds>) -> Vec<DataPoint> {
    let before = points.len();
    let kept = points
        .into_iter()
        .filter(|point| {
            point.coords().iter().all(|c| c.is_finite())
                && valid.map_or(true, |bounds| {
                    point.coords().iter().enumerate().all(|(dim, &c)| {
                        match (bounds.min.get(dim), bounds.max.get(dim)) {
                            (Some(&lo), Some(&hi)) => lo <= c && c <= hi,
                            _ => true,
                        }
                    })
                })
        })
        .collect::<Vec<_>>();
    if kept.len() < before {
        log::info!("cleaning dropped {} of {before} points", before - kept.len());
    }
    kept
}

/// Summary statistics of a dataset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetStats {
    pub count: usize,
    pub dimensions: usize,
    pub bounds: Bounds,
    pub mean: Vec<f64>,
    pub stddev: Vec<f64>,
}

impl DatasetStats {
    /// # Errors
    ///
    /// Fails when the points disagree on their dimensionality.
    pub fn compute(points: &[DataPoint]) -> Result<DatasetStats> {
        let dimensions = uniform_dimensions(points)?;
        if dimensions == 0 {
            return Ok(DatasetStats::default());
        }
        let n = to_f64(points.len());
        let mut mean = vec![0.0; dimensions];
        for point in points {
            for (m, c) in mean.iter_mut().zip(point.coords()) {
                *m += c / n;
            }
        }
        let mut stddev = vec![0.0; dimensions];
        for point in points {
            for ((s, c), m) in stddev.iter_mut().zip(point.coords()).zip(&mean) {
                *s += (c - m).powi(2) / n;
            }
        }
        for s in &mut stddev {
            *s = s.sqrt();
        }
        Ok(DatasetStats {
            count: points.len(),
            dimensions,
            bounds: Bounds::of(points),
            mean,
            stddev,
        })
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} points, {} dimensions", self.count, self.dimensions)?;
        for dim in 0..self.dimensions {
            writeln!(
                f,
                "  dim {dim}: min {:.6}, max {:.6}, mean {:.6}, stddev {:.6}",
                self.bounds.min[dim], self.bounds.max[dim], self.mean[dim], self.stddev[dim]
            )?;
        }
        Ok(())
    }
}
