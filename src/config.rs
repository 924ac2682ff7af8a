//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.registry.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".registry.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Hash table settings.
    #[serde(default)]
    pub table: TableConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Benchmark settings.
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Hash table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Slots allocated when a registry is created. Zero defers allocation
    /// to the first insert.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
        }
    }
}

fn default_initial_capacity() -> usize {
    crate::registry::DEFAULT_INITIAL_CAPACITY
}

/// Aggregation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Parallel worker count; 0 uses the available hardware concurrency.
    #[serde(default)]
    pub workers: usize,
}

/// Benchmark settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Population sizes to measure, in order.
    #[serde(default = "default_sizes")]
    pub sizes: Vec<usize>,

    /// Seed for the record generator.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Where results are written.
    #[serde(default = "default_output")]
    pub output: String,

    /// Result file format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            sizes: default_sizes(),
            seed: default_seed(),
            output: default_output(),
            format: OutputFormat::default(),
        }
    }
}

fn default_sizes() -> Vec<usize> {
    vec![100, 500, 1_000, 5_000, 10_000, 50_000, 100_000]
}

fn default_seed() -> u64 {
    42
}

fn default_output() -> String {
    "benchmark_results.csv".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(capacity) = args.initial_capacity {
            self.table.initial_capacity = capacity;
        }
        if let Some(workers) = args.workers {
            self.aggregation.workers = workers;
        }

        if let Some(ref sizes) = args.sizes {
            self.benchmark.sizes = sizes.clone();
        }
        if let Some(seed) = args.seed {
            self.benchmark.seed = seed;
        }
        if let Some(ref output) = args.output {
            self.benchmark.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.benchmark.format = format;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
