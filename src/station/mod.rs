//! Station result access.
//!
//! Combines latest-file discovery and tail reading into the per-station
//! probe the correlator calls when a station reports a new part.

pub mod discovery;
pub mod tail;

use self::discovery::find_latest_file;
use self::tail::read_last_line;

use crate::error::Result;
use crate::models::{Readiness, Station, StationReading};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source of the most recent result line for a station
pub trait ResultProbe {
    fn latest_result(&self, station: Station) -> Result<Readiness<StationReading>>;
}

/// Probe reading station results from their output directories
#[derive(Debug, Clone)]
pub struct DirectoryProbe {
    directories: [PathBuf; 2],
    extension: String,
}

impl DirectoryProbe {
    pub fn new(marposs_dir: PathBuf, kogame_dir: PathBuf, extension: impl Into<String>) -> Self {
        Self {
            directories: [marposs_dir, kogame_dir],
            extension: extension.into(),
        }
    }

    pub fn directory(&self, station: Station) -> &Path {
        &self.directories[station.index()]
    }
}

impl ResultProbe for DirectoryProbe {
    fn latest_result(&self, station: Station) -> Result<Readiness<StationReading>> {
        let directory = self.directory(station);

        let Some(latest) = find_latest_file(directory, &self.extension)? else {
            return Ok(Readiness::NotReady(format!(
                "no .{} files under {}",
                self.extension,
                directory.display()
            )));
        };

        let Some(line) = read_last_line(&latest.path)? else {
            return Ok(Readiness::NotReady(format!(
                "{} has no result line yet",
                latest.path.display()
            )));
        };

        debug!("{} latest result from {}: {}", station, latest.path.display(), line);

        Ok(Readiness::Ready(StationReading {
            line,
            source: latest.path,
            modified: latest.modified,
        }))
    }
}
