use std::{fs, path::PathBuf};

use clap::{Parser, Subcommand};
use mdindex::{
    clean, load_binary, load_csv, save_binary, save_results, save_workload, Benchmark,
    BenchmarkConfig, DatasetStats, IndexKind, QueryRange, WorkloadConfig, WorkloadGenerator,
    WorkloadKind,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Benchmarks the indexes on a binary dataset and writes results.csv.
    Run {
        /// Dataset in the binary point format.
        data: PathBuf,
        /// Directory receiving the workload files and results.csv.
        out_dir: PathBuf,
        #[clap(long, default_value_t = 1000)]
        queries: usize,
        #[clap(long, default_value_t = 0.01)]
        selectivity: f64,
        #[clap(long, default_value_t = 100)]
        warmup: usize,
        #[clap(long, default_value_t = 42)]
        seed: u64,
        /// Comma-separated index kinds; all structured indexes when omitted.
        #[clap(long, value_delimiter = ',', value_parser = parse_kind)]
        index: Vec<IndexKind>,
    },
    /// Converts numeric CSV columns to the binary point format.
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Comma-separated 0-based column numbers.
        #[clap(long, value_delimiter = ',', required = true)]
        columns: Vec<usize>,
    },
}

fn parse_kind(s: &str) -> Result<IndexKind, String> {
    s.parse().map_err(|e: mdindex::IndexError| e.to_string())
}

fn main() -> mdindex::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Run {
            data,
            out_dir,
            queries,
            selectivity,
            warmup,
            seed,
            index,
        } => {
            let points = load_binary(&data)?;
            println!("{}", DatasetStats::compute(&points)?);
            let dims = points.first().map_or(0, |p| p.dimensions());
            fs::create_dir_all(&out_dir)?;

            let mut generator = WorkloadGenerator::new(seed);
            let mut workloads: Vec<(String, Vec<QueryRange>)> = Vec::new();
            for kind in WorkloadKind::ALL {
                if dims < kind.min_dimensions() {
                    log::warn!("skipping {kind} workload: dataset has {dims} dimensions");
                    continue;
                }
                let config = WorkloadConfig {
                    kind,
                    num_queries: queries,
                    selectivity,
                    seed,
                    ..WorkloadConfig::default()
                };
                let ranges = generator.generate(&points, &config)?;
                save_workload(out_dir.join(format!("{kind}_workload.txt")), &ranges)?;
                workloads.push((kind.to_string(), ranges));
            }

            let kinds = if index.is_empty() {
                IndexKind::ALL.to_vec()
            } else {
                index
            };
            let benchmark = Benchmark::new(BenchmarkConfig {
                warmup_queries: warmup,
                verbose: true,
            });
            let results = benchmark.run_suite(&kinds, &points, &workloads)?;
            for result in &results {
                println!("{}: {}", result.index_name, result.metrics());
            }
            save_results(out_dir.join("results.csv"), &results)?;
        }
        Commands::Convert {
            input,
            output,
            columns,
        } => {
            let points = clean(load_csv(&input, &columns)?, None);
            println!("{}", DatasetStats::compute(&points)?);
            save_binary(&output, &points)?;
        }
    }
    Ok(())
}
