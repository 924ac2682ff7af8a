//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Registry - student records kept in an open-addressing hash table
///
/// Starts an interactive menu by default. With --bench, fills fresh
/// registries with generated records and compares sequential against
/// parallel group aggregation.
///
/// Examples:
///   registry
///   registry --workers 8
///   registry --bench --sizes 1000,10000,100000 --output results.csv
///   registry --bench --format json --output results.json
///   registry --init-config
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .registry.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of parallel aggregation workers (0 = one per CPU)
    #[arg(short, long, value_name = "NUM", env = "REGISTRY_WORKERS")]
    pub workers: Option<usize>,

    /// Initial number of hash table slots
    #[arg(long, value_name = "SLOTS")]
    pub initial_capacity: Option<usize>,

    /// Run the aggregation benchmark instead of the interactive menu
    #[arg(long)]
    pub bench: bool,

    /// Population sizes to benchmark (comma-separated)
    ///
    /// Example: --sizes 100,1000,10000
    #[arg(long, value_name = "SIZES", value_delimiter = ',', requires = "bench")]
    pub sizes: Option<Vec<usize>>,

    /// Seed for generated benchmark records
    #[arg(long, value_name = "SEED", requires = "bench")]
    pub seed: Option<u64>,

    /// Output file path for benchmark results
    #[arg(short, long, value_name = "FILE", requires = "bench")]
    pub output: Option<PathBuf>,

    /// Output format for benchmark results (csv, json)
    #[arg(long, value_name = "FORMAT", requires = "bench")]
    pub format: Option<OutputFormat>,

    /// Generate a default .registry.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for benchmark results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated values (default)
    #[default]
    Csv,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref sizes) = self.sizes {
            if sizes.is_empty() {
                return Err("At least one benchmark size is required".to_string());
            }
            if sizes.contains(&0) {
                return Err("Benchmark sizes must be at least 1".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
