//! CLI Module
//!
//! Command-line interface for running sessions against the simulated backend.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stillpoint - layered audio engine for guided meditation
#[derive(Parser, Debug)]
#[command(name = "stillpoint")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full session on the simulated backend and print layer status
    #[command(name = "play")]
    Play {
        /// JSON engine configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Narration source
        #[arg(long)]
        voice: Option<String>,

        /// Ambient bed source
        #[arg(long)]
        ambient: Option<String>,

        /// Chime source
        #[arg(long)]
        chime: Option<String>,

        /// Length of the sitting between start and completion, in seconds
        #[arg(long, default_value_t = 60)]
        sit_secs: u64,

        /// Multiply every delay by this factor (0.01 runs 100x faster)
        #[arg(long, default_value_t = 0.01)]
        time_scale: f64,

        /// Make opening this source fail (repeatable)
        #[arg(long = "fail-source")]
        fail_sources: Vec<String>,

        /// Cancel instead of completing the session
        #[arg(long)]
        cancel: bool,
    },

    /// Show how a source string is classified
    #[command(name = "check-source")]
    CheckSource {
        /// Source string to classify
        source: String,
    },
}
