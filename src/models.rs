//! Core data structures shared by the reader, correlator and sink.
//!
//! Defines the two stations, the per-station readings taken from result
//! files, and the correlated record written to the results log.

use crate::constants::results::{DECIMAL_SEPARATOR, SOURCE_SEPARATORS, TIMESTAMP_FORMAT};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The two measuring stations feeding the merger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Station {
    Marposs,
    Kogame,
}

impl Station {
    /// Both stations, in results-log column order
    pub const ALL: [Station; 2] = [Station::Marposs, Station::Kogame];

    /// Position of this station in per-station arrays
    pub fn index(self) -> usize {
        match self {
            Station::Marposs => 0,
            Station::Kogame => 1,
        }
    }

    /// Settings key naming this station's directory
    pub fn key(self) -> &'static str {
        match self {
            Station::Marposs => "marposs",
            Station::Kogame => "kogame",
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Part IDs currently reported by the controller, one per station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationIds {
    pub marposs: i64,
    pub kogame: i64,
}

impl StationIds {
    pub fn new(marposs: i64, kogame: i64) -> Self {
        Self { marposs, kogame }
    }

    pub fn get(&self, station: Station) -> i64 {
        match station {
            Station::Marposs => self.marposs,
            Station::Kogame => self.kogame,
        }
    }
}

/// Last part ID acted upon for one station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationSnapshot {
    pub station: Station,
    /// `None` until the first register read establishes a baseline
    pub last_seen_part_id: Option<i64>,
}

/// The newest result line found in a station directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationReading {
    pub line: String,
    pub source: PathBuf,
    pub modified: SystemTime,
}

impl StationReading {
    /// Base name of the file the line came from
    pub fn source_file_name(&self) -> String {
        file_name_of(&self.source)
    }
}

/// Outcome of a probe that may legitimately find nothing yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness<T> {
    Ready(T),
    /// Nothing usable yet; try again next cycle
    NotReady(String),
}

/// A station result waiting for its counterpart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResult {
    pub line: String,
    pub source_file_name: String,
    /// When the result was taken, as a UTC instant for age checks
    pub recorded_at: DateTime<Utc>,
}

/// One row of the results log, combining both stations' results for a part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedRecord {
    pub part_id: i64,
    pub timestamp: NaiveDateTime,
    pub marposs_fields: Vec<String>,
    pub kogame_fields: Vec<String>,
    pub marposs_source: String,
    pub kogame_source: String,
}

impl CorrelatedRecord {
    /// Build the record for a part from the two paired pending results
    pub fn compose(
        part_id: i64,
        timestamp: NaiveDateTime,
        marposs: &PendingResult,
        kogame: &PendingResult,
    ) -> Self {
        Self {
            part_id,
            timestamp,
            marposs_fields: normalize_fields(&marposs.line),
            kogame_fields: normalize_fields(&kogame.line),
            marposs_source: marposs.source_file_name.clone(),
            kogame_source: kogame.source_file_name.clone(),
        }
    }

    /// Formatted timestamp column
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// All columns of the results-log row, in order
    pub fn fields(&self) -> Vec<String> {
        let mut fields =
            Vec::with_capacity(3 + self.marposs_fields.len() + self.kogame_fields.len());
        fields.push(self.timestamp_string());
        fields.extend(self.marposs_fields.iter().cloned());
        fields.extend(self.kogame_fields.iter().cloned());
        fields.push(self.marposs_source.clone());
        fields.push(self.kogame_source.clone());
        fields
    }

    /// Human-readable summary of the measured values
    pub fn summary(&self) -> String {
        self.marposs_fields
            .iter()
            .chain(self.kogame_fields.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("  ")
    }
}

/// Split a raw station line into results-log fields.
///
/// Station separators (`,` or `;`) become field boundaries and decimal points
/// become decimal commas: `"12.5,OK"` yields `["12,5", "OK"]`.
pub fn normalize_fields(raw_line: &str) -> Vec<String> {
    raw_line
        .trim()
        .split(SOURCE_SEPARATORS)
        .map(|field| field.replace('.', &DECIMAL_SEPARATOR.to_string()))
        .collect()
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}
