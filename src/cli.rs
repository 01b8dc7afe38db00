//! Command-line interface components.

use crate::config::default_settings_path;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "measurement-merger")]
#[command(about = "Merge per-part results from two measuring stations into one results log")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Settings file (defaults to config.toml next to the executable)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Settings file to load, falling back to the default location
    pub fn settings_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_settings_path)
    }

    /// Log level for this crate's targets
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}
