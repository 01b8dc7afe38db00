//! Result correlation between the two stations.
//!
//! The [`Correlator`] owns each station's last-seen part ID and its map of
//! results waiting for a counterpart. [`Correlator::step`] advances that
//! state by one poll cycle and returns every record completed during it;
//! scheduling and persistence live in [`runner`].

pub mod runner;

#[cfg(test)]
pub mod tests;

use crate::constants::NO_PART_ID;
use crate::models::{
    CorrelatedRecord, PendingResult, Readiness, Station, StationIds, StationSnapshot,
};
use crate::station::ResultProbe;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Per-station correlation state
#[derive(Debug, Clone)]
struct StationState {
    snapshot: StationSnapshot,
    pending: HashMap<i64, PendingResult>,
    /// Modification time of the last file a result was taken from
    last_consumed: Option<SystemTime>,
}

impl StationState {
    fn new(station: Station) -> Self {
        Self {
            snapshot: StationSnapshot {
                station,
                last_seen_part_id: None,
            },
            pending: HashMap::new(),
            last_consumed: None,
        }
    }
}

/// Result of checking one station during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observation {
    /// No new part ID to act on
    Unchanged,
    /// A new result was stored as pending
    Stored,
    /// The new part ID could not be served; retry next cycle
    Deferred,
}

/// What one poll cycle produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Records completed this cycle, in pairing order
    pub records: Vec<CorrelatedRecord>,
    /// Stations whose new part ID could not be served yet
    pub deferred: Vec<Station>,
    /// Pending results dropped for exceeding the maximum age
    pub evicted: usize,
    /// Whether this cycle only established the starting part IDs
    pub baseline: bool,
}

/// Pairs the two stations' results by part ID
#[derive(Debug, Clone)]
pub struct Correlator {
    stations: [StationState; 2],
    max_pending_age: Option<chrono::Duration>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            stations: [
                StationState::new(Station::Marposs),
                StationState::new(Station::Kogame),
            ],
            max_pending_age: None,
        }
    }

    /// Evict pending results older than `age`; a zero age disables eviction
    pub fn with_max_pending_age(mut self, age: Duration) -> Self {
        self.max_pending_age = if age.is_zero() {
            None
        } else {
            chrono::Duration::from_std(age).ok()
        };
        self
    }

    pub fn snapshot(&self, station: Station) -> StationSnapshot {
        self.stations[station.index()].snapshot
    }

    pub fn pending(&self, station: Station) -> &HashMap<i64, PendingResult> {
        &self.stations[station.index()].pending
    }

    /// Results still waiting for a counterpart, across both stations
    pub fn pending_count(&self) -> usize {
        self.stations.iter().map(|state| state.pending.len()).sum()
    }

    /// Advance by one poll cycle.
    ///
    /// `ids` are the part IDs the controller currently reports. A station
    /// whose ID changed to a non-zero value is probed for its newest result;
    /// when the counterpart station already holds a result for the same ID,
    /// both are removed and a record stamped with the local wall time of
    /// `now` is emitted. Pending ages are measured on the UTC instant, so a
    /// daylight-saving shift does not age waiting results.
    pub fn step<P>(
        &mut self,
        ids: StationIds,
        probe: &P,
        now: DateTime<FixedOffset>,
    ) -> StepReport
    where
        P: ResultProbe + ?Sized,
    {
        let mut report = StepReport::default();

        if self
            .stations
            .iter()
            .all(|state| state.snapshot.last_seen_part_id.is_none())
        {
            for station in Station::ALL {
                self.stations[station.index()].snapshot.last_seen_part_id =
                    Some(ids.get(station));
            }
            info!(
                "Baseline part IDs: marposs={}, kogame={}",
                ids.marposs, ids.kogame
            );
            report.baseline = true;
            return report;
        }

        for station in Station::ALL {
            let part_id = ids.get(station);
            match self.observe(station, part_id, probe, now) {
                Observation::Unchanged => {}
                Observation::Deferred => report.deferred.push(station),
                Observation::Stored => {
                    if let Some(record) = self.try_pair(part_id, now) {
                        report.records.push(record);
                    }
                }
            }
        }

        report.evicted = self.evict_stale(now);
        report
    }

    /// Record a station's result if its part ID changed
    fn observe<P>(
        &mut self,
        station: Station,
        part_id: i64,
        probe: &P,
        now: DateTime<FixedOffset>,
    ) -> Observation
    where
        P: ResultProbe + ?Sized,
    {
        let state = &self.stations[station.index()];
        if part_id == NO_PART_ID || state.snapshot.last_seen_part_id == Some(part_id) {
            return Observation::Unchanged;
        }

        let reading = match probe.latest_result(station) {
            Ok(Readiness::Ready(reading)) => reading,
            Ok(Readiness::NotReady(reason)) => {
                debug!("{} part {} not ready: {}", station, part_id, reason);
                return Observation::Deferred;
            }
            Err(e) => {
                warn!("{} part {}: {} (retrying next cycle)", station, part_id, e);
                return Observation::Deferred;
            }
        };

        if state
            .last_consumed
            .is_some_and(|consumed| reading.modified <= consumed)
        {
            debug!(
                "{} part {}: {} not updated since the previous part",
                station,
                part_id,
                reading.source.display()
            );
            return Observation::Deferred;
        }

        let state = &mut self.stations[station.index()];
        let pending = PendingResult {
            source_file_name: reading.source_file_name(),
            line: reading.line,
            recorded_at: now.with_timezone(&Utc),
        };

        if let Some(previous) = state.pending.insert(part_id, pending) {
            warn!(
                "{} part {} replaced an unmatched result from {} ({})",
                station, part_id, previous.recorded_at, previous.source_file_name
            );
        }

        state.snapshot.last_seen_part_id = Some(part_id);
        state.last_consumed = Some(reading.modified);
        debug!(
            "{} part {} pending ({} waiting)",
            station,
            part_id,
            state.pending.len()
        );
        Observation::Stored
    }

    /// Pop and combine both stations' results for `part_id` when both exist
    fn try_pair(&mut self, part_id: i64, now: DateTime<FixedOffset>) -> Option<CorrelatedRecord> {
        let [marposs, kogame] = &mut self.stations;
        if !marposs.pending.contains_key(&part_id) || !kogame.pending.contains_key(&part_id) {
            return None;
        }

        let marposs_result = marposs.pending.remove(&part_id)?;
        let kogame_result = kogame.pending.remove(&part_id)?;

        Some(CorrelatedRecord::compose(
            part_id,
            now.naive_local(),
            &marposs_result,
            &kogame_result,
        ))
    }

    fn evict_stale(&mut self, now: DateTime<FixedOffset>) -> usize {
        let Some(max_age) = self.max_pending_age else {
            return 0;
        };
        let now = now.with_timezone(&Utc);

        let mut evicted = 0;
        for state in &mut self.stations {
            let station = state.snapshot.station;
            state.pending.retain(|part_id, pending| {
                let keep = now - pending.recorded_at <= max_age;
                if !keep {
                    warn!(
                        "{} part {} evicted after waiting since {} without a counterpart",
                        station, part_id, pending.recorded_at
                    );
                    evicted += 1;
                }
                keep
            });
        }
        evicted
    }
}
