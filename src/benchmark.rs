//! Build-once, query-many measurements of [`SpatialIndex`] implementations.

use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    time::Instant,
};

use ordered_float::OrderedFloat;

use crate::{
    error::Result,
    index::{elapsed_ms, to_f64, IndexKind, SpatialIndex},
    point::{DataPoint, QueryRange},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// Queries issued before timing starts, taken from the head of the workload.
    pub warmup_queries: usize,
    /// Log every result at info level instead of debug.
    pub verbose: bool,
}

/// One index measured against one workload. Latencies are in milliseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BenchmarkResult {
    pub index_name: String,
    pub workload_name: String,
    pub build_time_ms: f64,
    pub index_size_mb: f64,
    pub avg_query_time_ms: f64,
    pub median_query_time_ms: f64,
    pub p95_query_time_ms: f64,
    pub p99_query_time_ms: f64,
    pub total_queries: usize,
    pub total_results: usize,
    /// Candidates examined per returned point, over the whole workload.
    pub scan_overhead: f64,
}

impl BenchmarkResult {
    pub const CSV_HEADER: &'static str = "index_name,workload_name,build_time_ms,index_size_mb,\
avg_query_time_ms,median_query_time_ms,p95_query_time_ms,p99_query_time_ms,\
total_queries,total_results,scan_overhead";

    /// One comma-separated record, fields in [`Self::CSV_HEADER`] order.
    #[must_use]
    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{}",
            self.index_name,
            self.workload_name,
            self.build_time_ms,
            self.index_size_mb,
            self.avg_query_time_ms,
            self.median_query_time_ms,
            self.p95_query_time_ms,
            self.p99_query_time_ms,
            self.total_queries,
            self.total_results,
            self.scan_overhead
        )
    }

    #[must_use]
    pub fn metrics(&self) -> IndexMetrics {
        IndexMetrics {
            build_time_ms: self.build_time_ms,
            index_size_mb: self.index_size_mb,
            avg_query_time_ms: self.avg_query_time_ms,
            scan_overhead: self.scan_overhead,
            total_queries: self.total_queries,
        }
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}: build {:.3} ms, {:.3} MB, query avg {:.4} / median {:.4} / p95 {:.4} / p99 {:.4} ms, {} queries, {} results, scan overhead {:.2}",
            self.index_name,
            self.workload_name,
            self.build_time_ms,
            self.index_size_mb,
            self.avg_query_time_ms,
            self.median_query_time_ms,
            self.p95_query_time_ms,
            self.p99_query_time_ms,
            self.total_queries,
            self.total_results,
            self.scan_overhead
        )
    }
}

/// Headline numbers of an index.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IndexMetrics {
    pub build_time_ms: f64,
    pub index_size_mb: f64,
    pub avg_query_time_ms: f64,
    pub scan_overhead: f64,
    pub total_queries: usize,
}

impl IndexMetrics {
    pub const CSV_HEADER: &'static str =
        "build_time_ms,index_size_mb,avg_query_time_ms,scan_overhead,total_queries";

    #[must_use]
    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.build_time_ms,
            self.index_size_mb,
            self.avg_query_time_ms,
            self.scan_overhead,
            self.total_queries
        )
    }

    pub fn reset(&mut self) {
        *self = IndexMetrics::default();
    }
}

impl fmt::Display for IndexMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "build {:.3} ms, size {:.3} MB, avg query {:.4} ms, scan overhead {:.2} over {} queries",
            self.build_time_ms,
            self.index_size_mb,
            self.avg_query_time_ms,
            self.scan_overhead,
            self.total_queries
        )
    }
}

#[derive(Default)]
pub struct Benchmark {
    config: BenchmarkConfig,
}

impl Benchmark {
    #[must_use]
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark { config }
    }

    #[must_use]
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Builds `index` from `data` once, issues the warm-up queries, then times
    /// every query of the workload individually.
    ///
    /// # Errors
    ///
    /// Propagates build and query errors.
    pub fn run(
        &self,
        index: &mut dyn SpatialIndex,
        data: &[DataPoint],
        queries: &[QueryRange],
        workload_name: &str,
    ) -> Result<BenchmarkResult> {
        index.build(data)?;

        for range in queries.iter().take(self.config.warmup_queries) {
            index.query(range)?;
        }

        let mut latencies = Vec::with_capacity(queries.len());
        let mut total_results = 0;
        let mut total_scanned = 0;
        for range in queries {
            let start = Instant::now();
            let scan = index.scan(range)?;
            latencies.push(elapsed_ms(start));
            total_results += scan.points.len();
            total_scanned += scan.scanned;
        }

        let avg = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / to_f64(latencies.len())
        };
        latencies.sort_unstable_by_key(|&ms| OrderedFloat(ms));

        let result = BenchmarkResult {
            index_name: index.name().to_string(),
            workload_name: workload_name.to_string(),
            build_time_ms: index.build_time_ms(),
            index_size_mb: index.size_mb(),
            avg_query_time_ms: avg,
            median_query_time_ms: median(&latencies),
            p95_query_time_ms: percentile(&latencies, 95.0),
            p99_query_time_ms: percentile(&latencies, 99.0),
            total_queries: queries.len(),
            total_results,
            scan_overhead: to_f64(total_scanned) / to_f64(total_results.max(1)),
        };
        if self.config.verbose {
            log::info!("{result}");
        } else {
            log::debug!("{result}");
        }
        Ok(result)
    }

    /// Runs every workload against a freshly created index of every kind.
    ///
    /// # Errors
    ///
    /// Stops at the first failing run.
    pub fn run_suite(
        &self,
        kinds: &[IndexKind],
        data: &[DataPoint],
        workloads: &[(String, Vec<QueryRange>)],
    ) -> Result<Vec<BenchmarkResult>> {
        let mut results = Vec::with_capacity(kinds.len() * workloads.len());
        for &kind in kinds {
            for (name, queries) in workloads {
                let mut index = kind.create();
                log::info!("running {kind} on {name} ({} queries)", queries.len());
                results.push(self.run(index.as_mut(), data, queries, name)?);
            }
        }
        Ok(results)
    }
}

/// Writes the CSV header followed by one line per result.
///
/// # Errors
///
/// Fails on I/O errors.
pub fn save_results(path: impl AsRef<Path>, results: &[BenchmarkResult]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writeln!(writer, "{}", BenchmarkResult::CSV_HEADER)?;
    for result in results {
        writeln!(writer, "{}", result.to_csv())?;
    }
    writer.flush()?;
    log::info!("saved {} results to {}", results.len(), path.as_ref().display());
    Ok(())
}

/// Median of sorted values; the mean of the two middle values for even counts.
#[must_use]
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 0 => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
        _ => sorted[n / 2],
    }
}

/// Nearest-rank percentile of sorted values, `p` in `[0, 100]`.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * to_f64(sorted.len()) / 100.0).ceil();
    let index = if rank >= 1.0 { rank as usize - 1 } else { 0 };
    sorted[index.min(sorted.len() - 1)]
}
