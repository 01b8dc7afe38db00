//! Poll loop driving the correlator.
//!
//! A [`Bridge`] wires the register source, station probe, correlator and
//! results log together. [`Bridge::cycle`] runs one synchronous poll;
//! [`Bridge::run`] repeats it on a fixed interval until cancelled.

use super::Correlator;
use crate::error::Result;
use crate::models::{CorrelatedRecord, StationIds};
use crate::registers::{RegisterDump, RegisterLayout, RegisterSource};
use crate::sink::ResultsLog;
use crate::station::ResultProbe;
use chrono::{DateTime, FixedOffset, Local};
use colored::*;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters accumulated over the life of the loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Poll cycles started
    pub cycles: u64,
    /// Cycles abandoned because the registers could not be read
    pub skipped_cycles: u64,
    /// Rows appended to the results log
    pub records_written: u64,
    /// Station reads postponed to a later cycle
    pub deferred_reads: u64,
    /// Pending results dropped by the age limit
    pub evicted: u64,
}

/// The merger's moving parts, owned by the poll loop
#[derive(Debug)]
pub struct Bridge<S, P> {
    source: S,
    probe: P,
    layout: RegisterLayout,
    correlator: Correlator,
    log: ResultsLog,
    stats: BridgeStats,
}

impl<S, P> Bridge<S, P>
where
    S: RegisterSource,
    P: ResultProbe,
{
    pub fn new(
        source: S,
        probe: P,
        layout: RegisterLayout,
        correlator: Correlator,
        log: ResultsLog,
    ) -> Self {
        Self {
            source,
            probe,
            layout,
            correlator,
            log,
            stats: BridgeStats::default(),
        }
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    pub fn log(&self) -> &ResultsLog {
        &self.log
    }

    /// Run one poll cycle at `now`.
    ///
    /// Register and station failures are logged and left for the next
    /// cycle. Only a failed write to the results log is returned as an error.
    pub fn cycle(&mut self, now: DateTime<FixedOffset>) -> Result<Vec<CorrelatedRecord>> {
        self.stats.cycles += 1;

        let ids = match self.read_ids() {
            Ok(ids) => ids,
            Err(e) => {
                warn!(
                    "Skipping cycle, registers from {} unavailable: {}",
                    self.source.describe(),
                    e
                );
                self.stats.skipped_cycles += 1;
                return Ok(Vec::new());
            }
        };
        debug!("Part IDs: marposs={}, kogame={}", ids.marposs, ids.kogame);

        let report = self.correlator.step(ids, &self.probe, now);
        self.stats.deferred_reads += report.deferred.len() as u64;
        self.stats.evicted += report.evicted as u64;

        for record in &report.records {
            self.log.append(record)?;
            self.stats.records_written += 1;
            info!(
                "Part {} merged: {} + {}",
                record.part_id, record.marposs_source, record.kogame_source
            );
        }

        Ok(report.records)
    }

    fn read_ids(&self) -> Result<StationIds> {
        let text = self.source.fetch()?;
        let dump = RegisterDump::parse(&text)?;
        self.layout.read_ids(&dump)
    }

    /// Poll every `poll_interval` until `cancel` fires or the log cannot be written
    pub async fn run(
        mut self,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<BridgeStats> {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Polling {} every {:?}, writing to {}",
            self.source.describe(),
            poll_interval,
            self.log.path().display()
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Local::now().fixed_offset();
                    match self.cycle(now) {
                        Ok(records) => records.iter().for_each(print_progress),
                        Err(e) => {
                            error!("Stopping: {}", e);
                            return Err(e);
                        }
                    }
                }
            }
        }

        let unmatched = self.correlator.pending_count();
        if unmatched > 0 {
            warn!("Stopped with {} unmatched pending results", unmatched);
        }
        info!(
            "Stopped after {} cycles: {} records written, {} skipped cycles, {} deferred reads, {} evicted",
            self.stats.cycles,
            self.stats.records_written,
            self.stats.skipped_cycles,
            self.stats.deferred_reads,
            self.stats.evicted
        );

        Ok(self.stats)
    }
}

/// Print the operator-facing line for a merged record
fn print_progress(record: &CorrelatedRecord) {
    println!(
        "{}\t{}  {}",
        record.timestamp_string().bright_cyan(),
        format!("#{}", record.part_id).bright_yellow().bold(),
        record.summary().bright_white()
    );
}
