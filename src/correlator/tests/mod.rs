//! Correlator tests
//!
//! Drive the step function with a scripted probe and fixed timestamps, and
//! the bridge with scripted register dumps over real station directories.

pub mod bridge_cycles;

use crate::error::{MergerError, Result};
use crate::models::{Readiness, Station, StationReading};
use crate::registers::RegisterSource;
use crate::station::ResultProbe;
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Probe serving whatever each station last "published"
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    state: RefCell<ScriptedState>,
}

#[derive(Debug, Default)]
struct ScriptedState {
    readings: HashMap<Station, StationReading>,
    failing: HashSet<Station>,
    calls: HashMap<Station, usize>,
    clock: u64,
}

impl ScriptedProbe {
    /// Make `line` the station's newest result, in a freshly modified file
    pub fn publish(&self, station: Station, line: &str, file: &str) {
        let mut state = self.state.borrow_mut();
        state.clock += 1;
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + state.clock);
        state.readings.insert(
            station,
            StationReading {
                line: line.to_string(),
                source: PathBuf::from("/stations").join(station.key()).join(file),
                modified,
            },
        );
        state.failing.remove(&station);
    }

    /// Make the station's next reads fail as if its file were locked
    pub fn fail(&self, station: Station) {
        self.state.borrow_mut().failing.insert(station);
    }

    pub fn calls(&self, station: Station) -> usize {
        self.state
            .borrow()
            .calls
            .get(&station)
            .copied()
            .unwrap_or_default()
    }
}

impl ResultProbe for ScriptedProbe {
    fn latest_result(&self, station: Station) -> Result<Readiness<StationReading>> {
        let mut state = self.state.borrow_mut();
        *state.calls.entry(station).or_default() += 1;

        if state.failing.contains(&station) {
            return Err(MergerError::TailRead {
                path: PathBuf::from(station.key()),
                source: std::io::Error::other("file locked by producer"),
            });
        }

        Ok(match state.readings.get(&station) {
            Some(reading) => Readiness::Ready(reading.clone()),
            None => Readiness::NotReady("nothing published".to_string()),
        })
    }
}

/// Register source replaying queued dumps, repeating the last one
#[derive(Debug, Default)]
pub struct ScriptedRegisters {
    dumps: RefCell<VecDeque<String>>,
    last: RefCell<Option<String>>,
}

impl ScriptedRegisters {
    pub fn push_ids(&self, marposs: i64, kogame: i64) {
        self.push_raw(&register_dump(marposs, kogame));
    }

    pub fn push_raw(&self, text: &str) {
        self.dumps.borrow_mut().push_back(text.to_string());
    }
}

impl RegisterSource for ScriptedRegisters {
    fn describe(&self) -> String {
        "scripted registers".to_string()
    }

    fn fetch(&self) -> Result<String> {
        if let Some(next) = self.dumps.borrow_mut().pop_front() {
            *self.last.borrow_mut() = Some(next);
        }
        self.last.borrow().clone().ok_or_else(|| {
            MergerError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "controller offline",
            ))
        })
    }
}

/// Controller dump with part IDs in registers 1 and 2
pub fn register_dump(marposs: i64, kogame: i64) -> String {
    format!(
        "$NUMREG  Storage: CMOS  Access: RW  : ARRAY[200] OF Numeric Reg\n  [1] = {}  'MARPOSS ID'\n  [2] = {}  'KOGAME ID'\n  [3] = 0  ''\n",
        marposs, kogame
    )
}

/// Fixed test clock, `seconds` after the start of a shift (UTC+1)
pub fn at(seconds: i64) -> DateTime<FixedOffset> {
    let shift_start = NaiveDate::from_ymd_opt(2024, 3, 18)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap()
        .and_local_timezone(FixedOffset::east_opt(3600).unwrap())
        .unwrap();
    shift_start + chrono::Duration::seconds(seconds)
}
