//! Command line interface for modelcache.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// modelcache - inspect and drive configuration-keyed model result caches.
#[derive(Parser, Debug)]
#[command(name = "modelcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "modelcache.toml")]
    pub config: PathBuf,

    /// Verbose mode.
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode.
    #[arg(short, long)]
    pub quiet: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Writes a default configuration in the target directory.
    Init {
        /// Target directory (default: current directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Prints the cache key of a configuration and its inputs.
    Key {
        /// Model configuration (JSON).
        #[arg(long = "model-config")]
        model_config: PathBuf,

        /// Inputs (JSON object of name to value).
        #[arg(long)]
        inputs: PathBuf,

        /// Discrete inputs (JSON object of name to value).
        #[arg(long)]
        discrete: Option<PathBuf>,
    },

    /// Prints the entry stored under a key.
    Show {
        /// Cache key (64 hex characters).
        key: String,
    },

    /// Lists the entries of the cache directory.
    List,

    /// Checks that every entry of the cache directory can be loaded.
    Verify,

    /// Evaluates the power-curve wind model through the cache.
    Run {
        /// Wind model configuration (JSON).
        #[arg(short, long)]
        model: PathBuf,

        /// Wind speed series (JSON array, m/s).
        #[arg(short, long = "wind-speed")]
        wind_speed: PathBuf,
    },

    /// Evaluates the wind model for many wind speed series concurrently.
    Sweep {
        /// Wind model configuration (JSON).
        #[arg(short, long)]
        model: PathBuf,

        /// Cases (JSON array of wind speed arrays).
        #[arg(long)]
        cases: PathBuf,

        /// Maximum number of concurrent evaluations.
        #[arg(short, long, default_value_t = 4)]
        jobs: usize,
    },

    /// Shows the version.
    Version,
}
