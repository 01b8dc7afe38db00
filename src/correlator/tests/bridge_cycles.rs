//! Bridge cycles over real station directories and a results log

use super::{ScriptedRegisters, at};
use crate::correlator::Correlator;
use crate::correlator::runner::Bridge;
use crate::error::MergerError;
use crate::models::Station;
use crate::registers::RegisterLayout;
use crate::sink::ResultsLog;
use crate::station::DirectoryProbe;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const LAYOUT: RegisterLayout = RegisterLayout {
    marposs: 1,
    kogame: 2,
};

struct Workcell {
    _temp_dir: TempDir,
    marposs: PathBuf,
    kogame: PathBuf,
    results: PathBuf,
}

impl Workcell {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let marposs = temp_dir.path().join("marposs");
        let kogame = temp_dir.path().join("kogame");
        fs::create_dir_all(&marposs).unwrap();
        fs::create_dir_all(&kogame).unwrap();
        let results = temp_dir.path().join("result.csv");
        Self {
            _temp_dir: temp_dir,
            marposs,
            kogame,
            results,
        }
    }

    fn bridge(&self, registers: ScriptedRegisters) -> Bridge<ScriptedRegisters, DirectoryProbe> {
        Bridge::new(
            registers,
            DirectoryProbe::new(self.marposs.clone(), self.kogame.clone(), "csv"),
            LAYOUT,
            Correlator::new(),
            ResultsLog::new(self.results.clone()),
        )
    }

    fn results(&self) -> Vec<String> {
        fs::read_to_string(&self.results)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn write_result(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_new_part_on_both_stations_appends_one_row() {
    let cell = Workcell::new();
    let registers = ScriptedRegisters::default();
    registers.push_ids(6, 5);
    registers.push_ids(41, 41);
    let mut bridge = cell.bridge(registers);

    assert!(bridge.cycle(at(0)).unwrap().is_empty());

    write_result(&cell.marposs, "2024/03/18/M_0041.csv", "12.5,OK\n");
    write_result(&cell.kogame, "K_0041.csv", "3,PASS\n");

    let records = bridge.cycle(at(3)).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].part_id, 41);

    assert_eq!(
        cell.results(),
        vec!["2024-03-18 06:00:03;12,5;OK;3;PASS;M_0041.csv;K_0041.csv"]
    );
    assert_eq!(bridge.stats().records_written, 1);
    assert_eq!(bridge.correlator().pending_count(), 0);
}

#[test]
fn test_station_without_file_is_deferred_until_written() {
    let cell = Workcell::new();
    let registers = ScriptedRegisters::default();
    registers.push_ids(0, 0);
    registers.push_ids(9, 9);
    let mut bridge = cell.bridge(registers);

    bridge.cycle(at(0)).unwrap();
    write_result(&cell.kogame, "k.csv", "header\n7.25,PASS\n\n");

    assert!(bridge.cycle(at(3)).unwrap().is_empty());
    assert_eq!(bridge.stats().deferred_reads, 1);
    assert!(bridge.correlator().pending(Station::Kogame).contains_key(&9));

    write_result(&cell.marposs, "m.csv", "1.5\n");
    let records = bridge.cycle(at(6)).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        cell.results(),
        vec!["2024-03-18 06:00:06;1,5;7,25;PASS;m.csv;k.csv"]
    );
}

#[test]
fn test_register_failures_skip_cycle() {
    let cell = Workcell::new();
    let registers = ScriptedRegisters::default();
    let mut bridge = cell.bridge(registers);

    // Controller offline, then a dump without the header
    assert!(bridge.cycle(at(0)).unwrap().is_empty());
    assert_eq!(bridge.stats().skipped_cycles, 1);

    let registers = ScriptedRegisters::default();
    registers.push_raw("<html>maintenance</html>");
    let mut bridge = cell.bridge(registers);
    assert!(bridge.cycle(at(3)).unwrap().is_empty());
    assert_eq!(bridge.stats().skipped_cycles, 1);
    assert_eq!(bridge.stats().cycles, 1);
    assert!(cell.results().is_empty());
}

#[test]
fn test_unwritable_results_log_is_fatal() {
    let cell = Workcell::new();
    fs::create_dir_all(&cell.results).unwrap();

    let registers = ScriptedRegisters::default();
    registers.push_ids(0, 0);
    registers.push_ids(2, 2);
    let mut bridge = cell.bridge(registers);
    bridge.cycle(at(0)).unwrap();

    write_result(&cell.marposs, "m.csv", "1\n");
    write_result(&cell.kogame, "k.csv", "2\n");

    let error = bridge.cycle(at(3)).unwrap_err();
    assert!(error.is_fatal());
    assert!(matches!(error, MergerError::SinkWrite { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_cancel() {
    let cell = Workcell::new();
    let registers = ScriptedRegisters::default();
    registers.push_ids(0, 0);
    let bridge = cell.bridge(registers);

    let cancel = tokio_util::sync::CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            cancel.cancel();
        })
    };

    let stats = bridge
        .run(Duration::from_secs(3), cancel)
        .await
        .unwrap();
    handle.await.unwrap();

    // Ticks at 0, 3, 6 and 9 seconds
    assert_eq!(stats.cycles, 4);
    assert_eq!(stats.records_written, 0);
}
