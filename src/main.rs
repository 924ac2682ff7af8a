//! Registry - student records in an open-addressing hash table
//!
//! An interactive menu for adding, finding and removing student records and
//! computing per-group grade averages, plus a benchmark comparing the
//! sequential and parallel aggregation paths.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, I/O, table invariant violation)
//!   2 - Benchmark found sequential and parallel results disagreeing

mod analysis;
mod bench;
mod cli;
mod config;
mod models;
mod registry;
mod report;
mod table;
mod view;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use registry::Registry;
use std::io;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("Registry v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let outcome = if args.bench {
        run_bench(&args, &config)
    } else {
        run_interactive(&config).map(|()| 0)
    };

    match outcome {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Registry failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .registry.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  .registry.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .registry.toml")?;

    println!("✅ Created .registry.toml with default settings.");
    println!("   Edit it to customize table capacity, workers, and benchmark sizes.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the interactive menu on stdin/stdout.
fn run_interactive(config: &Config) -> Result<()> {
    let registry = Registry::new(config.table.initial_capacity, config.aggregation.workers);

    let stdin = io::stdin();
    let mut console = view::Console::new(stdin.lock(), io::stdout());
    view::run_menu(&registry, &mut console)?;

    if registry.is_empty() {
        info!("Session ended with an empty registry");
    } else {
        info!("Session ended with {} records", registry.len());
    }
    Ok(())
}

/// Run the benchmark and write its report. Returns exit code (0 or 2).
fn run_bench(args: &Args, config: &Config) -> Result<i32> {
    let settings = bench::BenchmarkSettings {
        sizes: config.benchmark.sizes.clone(),
        seed: config.benchmark.seed,
        workers: config.aggregation.workers,
        initial_capacity: config.table.initial_capacity,
        show_progress: !args.quiet,
    };

    println!("⏱️  Registry aggregation benchmark");
    println!("   Sizes: {:?}", settings.sizes);

    let report = bench::run_benchmark(&settings)?;

    let output = match config.benchmark.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Csv => report::generate_csv_report(&report),
    };

    let path = &config.benchmark.output;
    std::fs::write(path, &output)
        .with_context(|| format!("Failed to write benchmark results to {}", path))?;

    println!("\n✅ Benchmark complete! Results saved to: {}", path);

    if !report.all_match() {
        eprintln!("\n⛔ Sequential and parallel results disagreed. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            // Logging is not up yet.
            eprintln!("⚠️  Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
