use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use layout_query_bench::benches;
use layout_query_bench::dataset::{self, GenerateConfig};
use layout_query_bench::harness::{BenchConfig, Profile};
use layout_query_bench::report;
use layout_query_bench::schema::{BenchReport, RunMeta, SCHEMA_VERSION};
use layout_query_bench::summary::Summary;
use layout_query_bench::LayoutVariant;
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Time the layout query suite for each selected variant.
    Run {
        /// Directory containing one subdirectory per dataset.
        #[arg(long, value_name = "DIR")]
        root: PathBuf,

        /// Which layout variant(s) to benchmark.
        #[arg(long, value_enum, default_value_t = LayoutVariant::All)]
        variant: LayoutVariant,
    },

    /// Generate deterministic synthetic datasets to benchmark against.
    Generate {
        /// Output directory; one `dsNNN` subdirectory is written per dataset.
        #[arg(long, short = 'o', value_name = "DIR")]
        output: PathBuf,

        #[arg(long, default_value_t = 3)]
        datasets: usize,

        #[arg(long, default_value_t = 20)]
        subjects: usize,

        #[arg(long, default_value_t = 3)]
        tasks: usize,

        /// Maximum runs per subject and task.
        #[arg(long, default_value_t = 2)]
        runs: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Print the summary table for a previously written results CSV.
    Summarize {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "layout-query-bench")]
#[command(about = "Side-by-side latency benchmarks for dataset layout variants")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    /// Repetitions per query; overrides the profile default. Loads always run once.
    #[arg(long, global = true)]
    loops: Option<u32>,

    /// Where to write the results CSV.
    #[arg(long, value_name = "DIR", default_value = "results", global = true)]
    out_dir: PathBuf,

    /// Also write a JSON report next to the CSV.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Also print median, min, max and standard deviation per operation.
    #[arg(long, default_value_t = false, global = true)]
    stats: bool,

    /// Log progress at info level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn git_sha_short() -> Option<String> {
    // Best-effort: read from environment set by CI/build scripts.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn print_report(summary: &Summary, stats: bool) {
    report::print_summary(&summary.pivot());
    if stats {
        report::print_stats(summary);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.loops == Some(0) {
        bail!("--loops must be at least 1");
    }
    let cfg = BenchConfig {
        profile: args.profile.into(),
        loops: args.loops,
    };

    match &args.cmd {
        Command::Run { root, variant } => {
            let backends = variant.backends();
            let log = benches::layout::run(&cfg, &backends, root)
                .with_context(|| format!("benchmark run over {} failed", root.display()))?;

            let summary = Summary::from_samples(&log);
            let now = Local::now();
            let csv_path = report::export_csv(log.samples(), &args.out_dir, &now)
                .with_context(|| format!("failed to write results to {}", args.out_dir.display()))?;
            eprintln!("Results saved: {}", csv_path.display());

            if args.json {
                let report = BenchReport {
                    run: RunMeta {
                        schema_version: SCHEMA_VERSION,
                        bench_version: env!("CARGO_PKG_VERSION").to_string(),
                        profile: cfg.profile.as_str().to_string(),
                        loops: cfg.loops(),
                        variants: backends.iter().map(|b| b.name().to_string()).collect(),
                        dataset_root: root.display().to_string(),
                        timestamp_utc: Utc::now().to_rfc3339(),
                        git_sha: git_sha_short(),
                    },
                    samples: log.into_samples(),
                };
                let json_path = report::export_json(&report, &args.out_dir, &now)
                    .context("failed to write JSON report")?;
                eprintln!("Report saved: {}", json_path.display());
            }

            print_report(&summary, args.stats);
        }
        Command::Generate {
            output,
            datasets,
            subjects,
            tasks,
            runs,
            seed,
        } => {
            let config = GenerateConfig {
                datasets: *datasets,
                subjects: *subjects,
                tasks: *tasks,
                runs: *runs,
                seed: *seed,
            };

            eprintln!(
                "Generating {} datasets ({} subjects, {} tasks, <= {} runs, seed={})...",
                datasets, subjects, tasks, runs, seed
            );
            let start = std::time::Instant::now();
            let stats = dataset::generate(output, &config)
                .with_context(|| format!("failed to generate datasets in {}", output.display()))?;
            eprintln!(
                "Wrote {} images and {} sidecars in {:.2}s to {}",
                stats.images,
                stats.sidecars,
                start.elapsed().as_secs_f64(),
                output.display()
            );
        }
        Command::Summarize { path } => {
            let file =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            let samples = report::read_csv(file)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            print_report(&Summary::from_samples(&samples), args.stats);
        }
    }

    Ok(())
}
