//! Command-line interface components.

use crate::config::{CompressionAlgorithm, Credentials, EtlConfig, IdStrategy};
use crate::models::ProcessingStats;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::*;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "songplays_etl")]
#[command(
    about = "Build a partitioned Parquet star schema from raw song-catalog and activity-log JSON"
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Root directory holding the song_data/ and log_data/ trees
    #[arg(value_name = "INPUT_PATH")]
    pub input_path: Option<PathBuf>,

    /// Output directory for the star-schema tables
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// TOML configuration file; command-line flags take precedence
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Glob, relative to the input root, matching song-catalog files
    #[arg(long, value_name = "GLOB")]
    pub song_pattern: Option<String>,

    /// Glob, relative to the input root, matching activity-log files
    #[arg(long, value_name = "GLOB")]
    pub log_pattern: Option<String>,

    /// Parquet compression algorithm (snappy, zstd, lz4, none)
    #[arg(long)]
    pub compression: Option<String>,

    /// Surrogate key strategy for songplays (sequential, partition-tagged)
    #[arg(long)]
    pub id_strategy: Option<String>,

    /// Block size for partition-tagged keys
    #[arg(long, value_name = "N")]
    pub rows_per_partition: Option<usize>,

    /// Maximum input files parsed concurrently
    #[arg(long, value_name = "N")]
    pub max_concurrent_files: Option<usize>,

    /// Storage access key id
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    /// Storage secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,

    /// Format of the run summary printed on success
    #[arg(long, value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    /// Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Output format options for the run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
}

impl Args {
    /// Determine the appropriate log level based on verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.quiet
    }

    /// Build the run configuration: defaults, then the config file, then flags
    pub fn resolve_config(&self) -> Result<EtlConfig> {
        let mut config = match &self.config {
            Some(path) => EtlConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => EtlConfig::default(),
        };

        if let Some(path) = &self.input_path {
            config = config.with_input_path(path.clone());
        }
        if let Some(path) = &self.output_path {
            config = config.with_output_path(path.clone());
        }
        if let Some(pattern) = &self.song_pattern {
            config = config.with_song_data_pattern(pattern.clone());
        }
        if let Some(pattern) = &self.log_pattern {
            config = config.with_log_data_pattern(pattern.clone());
        }
        if let Some(compression) = &self.compression {
            config = config.with_compression(compression.parse::<CompressionAlgorithm>()?);
        }
        let id_strategy = self.resolve_id_strategy(config.id_strategy)?;
        config = config.with_id_strategy(id_strategy);
        if let Some(max_files) = self.max_concurrent_files {
            config = config.with_max_concurrent_files(max_files);
        }

        match (&self.access_key_id, &self.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => {
                config = config.with_credentials(Credentials {
                    access_key_id: access_key_id.clone(),
                    secret_access_key: secret_access_key.clone(),
                });
            }
            (None, None) => {}
            _ => bail!("Access key id and secret access key must be supplied together"),
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply `--id-strategy` and `--rows-per-partition` over the configured strategy.
    /// Naming the partition-tagged strategy keeps an already configured block size.
    fn resolve_id_strategy(&self, current: IdStrategy) -> Result<IdStrategy> {
        let strategy = match &self.id_strategy {
            Some(name) => match (name.parse::<IdStrategy>()?, current) {
                (IdStrategy::PartitionTagged { .. }, IdStrategy::PartitionTagged { .. }) => current,
                (requested, _) => requested,
            },
            None => current,
        };

        match (strategy, self.rows_per_partition) {
            (_, None) => Ok(strategy),
            (IdStrategy::PartitionTagged { .. }, Some(rows_per_partition)) => {
                Ok(IdStrategy::PartitionTagged { rows_per_partition })
            }
            (IdStrategy::Sequential, Some(_)) => {
                bail!("--rows-per-partition requires the partition-tagged id strategy")
            }
        }
    }
}

/// Set up structured logging
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("songplays_etl={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Print the run summary in the requested format
pub fn print_summary(stats: &ProcessingStats, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => print_human_summary(stats),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(stats).context("Failed to encode summary")?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn print_human_summary(stats: &ProcessingStats) {
    println!();
    println!("{}", "Star schema build complete".bright_green().bold());
    println!(
        "  Song data: {} files, {} records",
        stats.song_data.files_read, stats.song_data.records_read
    );
    println!(
        "  Log data:  {} files, {} records, {} song plays",
        stats.log_data.files_read, stats.log_data.records_read, stats.song_play_events
    );

    let malformed = stats.song_data.malformed_lines + stats.log_data.malformed_lines;
    let coercion = stats.song_data.coercion_failures + stats.log_data.coercion_failures;
    if malformed > 0 || coercion > 0 {
        println!(
            "  {}",
            format!(
                "Skipped {} malformed lines, nulled {} unparseable values",
                malformed, coercion
            )
            .yellow()
        );
    }

    println!();
    for table in &stats.tables {
        println!(
            "  {:<10} {:>10} rows  {:>5} partition(s)  {}",
            table.table.bright_cyan(),
            table.rows,
            table.partitions,
            table.path.display().to_string().bright_black()
        );
    }
    println!();
    println!(
        "  Output: {}  ({}ms)",
        stats.output_path.display(),
        stats.processing_time_ms
    );
}
