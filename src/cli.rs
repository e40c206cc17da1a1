//! Command-line interface parsing for the Eurostat CLI
//!
//! This module handles parsing of CLI arguments using clap. Each subcommand maps
//! onto one [`Query`] variant; global flags override the loaded [`Config`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Config;
use crate::decode::DecodeMode;
use crate::query::{GenerateRequest, Query};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The dataset identifier contains characters Eurostat never uses
    #[error("Invalid dataset id: '{0}'. Use letters, digits and underscores, e.g. nama_10_gdp")]
    InvalidDatasetId(String),
}

/// Eurostat CLI - fetch, cache and decode Eurostat datasets
#[derive(Parser, Debug)]
#[command(name = "eurostat")]
#[command(about = "Fetch, cache and decode Eurostat JSON-stat datasets")]
#[command(version)]
pub struct Cli {
    /// Path to config file (default: ./eurostat.toml or $XDG_CONFIG_HOME/eurostat-cli/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Root directory for generate runs
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory for cached datasets
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the indicators of a dataset
    Indicators {
        /// Eurostat dataset id, e.g. nama_10_gdp
        #[arg(value_parser = parse_dataset_id)]
        dataset_id: String,
    },
    /// List the geography, unit and time options of a dataset
    Parameters {
        /// Eurostat dataset id, e.g. nama_10_gdp
        #[arg(value_parser = parse_dataset_id)]
        dataset_id: String,
    },
    /// Fetch a dataset, export per-indicator tables and print the filtered result
    ///
    /// Examples:
    ///   eurostat generate nama_10_gdp --geo IT --unit CP_MEUR
    ///   eurostat generate nama_10_gdp --geo IT --unit CP_MEUR --indicator "Gross domestic product at market prices" --time 2022 --time 2023
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Eurostat dataset id, e.g. nama_10_gdp
    #[arg(value_parser = parse_dataset_id)]
    pub dataset_id: String,

    /// Geography code
    #[arg(long)]
    pub geo: Option<String>,

    /// Unit code
    #[arg(long)]
    pub unit: Option<String>,

    /// Keep only this indicator label (repeatable)
    #[arg(long = "indicator", value_name = "LABEL")]
    pub indicators: Vec<String>,

    /// Keep only this time label (repeatable)
    #[arg(long = "time", value_name = "LABEL")]
    pub time_range: Vec<String>,

    /// Always fetch from the network and do not store the result
    #[arg(long)]
    pub no_cache: bool,

    /// Pin geo and unit to their first category (single geo/unit datasets only)
    #[arg(long)]
    pub legacy_decode: bool,
}

/// Parses a dataset identifier argument.
///
/// # Returns
/// * `Ok(String)` if the id consists of ASCII letters, digits and underscores
/// * `Err(CliError::InvalidDatasetId)` otherwise
pub fn parse_dataset_id(s: &str) -> Result<String, CliError> {
    let valid = !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(s.to_string())
    } else {
        Err(CliError::InvalidDatasetId(s.to_string()))
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

impl Cli {
    /// Applies command-line overrides on top of the loaded configuration
    pub fn apply_to(&self, mut config: Config) -> Config {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Command::Generate(args) = &self.command {
            if args.legacy_decode {
                config.decoder.mode = DecodeMode::FirstCategory;
            }
        }
        config
    }
}

impl Command {
    pub fn into_query(self) -> Query {
        match self {
            Command::Indicators { dataset_id } => Query::Indicators { dataset_id },
            Command::Parameters { dataset_id } => Query::Parameters { dataset_id },
            Command::Generate(args) => Query::Generate {
                request: GenerateRequest {
                    indicators: non_empty(&args.indicators),
                    time_range: non_empty(&args.time_range),
                    dataset_id: args.dataset_id,
                    geo: args.geo,
                    unit: args.unit,
                },
                use_cache: !args.no_cache,
            },
        }
    }
}
