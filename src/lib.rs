//! Measurement Merger Library
//!
//! Combines the results of two independent measuring stations into one
//! results log, matched by the part ID each station is currently checking.
//!
//! This library provides tools for:
//! - Reading the stations' current part IDs from the cell controller's numeric registers
//! - Locating the newest result file in each station's directory tree
//! - Reading the last result line of large, append-only result files
//! - Pairing both stations' results for the same part
//! - Appending the merged, locale-formatted row to the results log

pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod correlator;
pub mod error;
pub mod models;
pub mod registers;
pub mod sink;
pub mod station;

// Re-export commonly used types
pub use config::MergerConfig;
pub use correlator::Correlator;
pub use correlator::runner::{Bridge, BridgeStats};
pub use error::{MergerError, Result};
pub use models::{CorrelatedRecord, Readiness, Station, StationIds};
