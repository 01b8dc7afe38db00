//! Latest result file discovery for station directories
//!
//! Stations write their results into arbitrarily nested directory trees
//! (per day, per batch, per program). The newest matching file is the one
//! holding the most recent measurement.

use crate::error::{MergerError, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Newest matching file found under a station directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Find the most recently modified file with `extension` under `root`.
///
/// Returns `Ok(None)` when the tree holds no matching file yet. On equal
/// modification times the file visited last wins.
pub fn find_latest_file(root: &Path, extension: &str) -> Result<Option<LatestFile>> {
    let mut latest: Option<LatestFile> = None;
    let mut candidates = 0usize;

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            // The root itself vanishing is worth surfacing; a subdirectory
            // disappearing mid-walk is not
            Err(e) if e.depth() == 0 => {
                return Err(MergerError::DirectoryTraversal {
                    root: root.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
            continue;
        }

        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            Ok(Err(e)) => {
                warn!("No modification time for {}: {}", entry.path().display(), e);
                continue;
            }
            Err(e) => {
                warn!("No metadata for {}: {}", entry.path().display(), e);
                continue;
            }
        };

        candidates += 1;
        if latest.as_ref().is_none_or(|current| modified >= current.modified) {
            latest = Some(LatestFile {
                path: entry.into_path(),
                modified,
            });
        }
    }

    debug!(
        "Scanned {} .{} files under {}, latest: {:?}",
        candidates,
        extension,
        root.display(),
        latest.as_ref().map(|f| &f.path)
    );

    Ok(latest)
}

/// Check a path's extension, ignoring case
fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path, content: &str, modified: SystemTime) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    #[test]
    fn test_empty_tree_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("a").join("b")).unwrap();

        assert_eq!(find_latest_file(temp_dir.path(), "csv").unwrap(), None);
    }

    #[test]
    fn test_single_file_nested_three_levels() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir
            .path()
            .join("2024")
            .join("03")
            .join("18")
            .join("part_0041.csv");
        touch(&nested, "12.5,OK\n", SystemTime::now());

        let latest = find_latest_file(temp_dir.path(), "csv").unwrap().unwrap();
        assert_eq!(latest.path, nested);
    }

    #[test]
    fn test_newest_file_wins_and_other_extensions_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let base = SystemTime::now() - Duration::from_secs(600);

        let older = temp_dir.path().join("day1").join("a.csv");
        let newer = temp_dir.path().join("day2").join("b.CSV");
        let ignored = temp_dir.path().join("day2").join("notes.txt");
        touch(&older, "1", base);
        touch(&newer, "2", base + Duration::from_secs(60));
        touch(&ignored, "3", base + Duration::from_secs(120));

        let latest = find_latest_file(temp_dir.path(), "csv").unwrap().unwrap();
        assert_eq!(latest.path, newer);
        assert_eq!(latest.modified, base + Duration::from_secs(60));
    }

    #[test]
    fn test_missing_root_is_traversal_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone");

        match find_latest_file(&missing, "csv").unwrap_err() {
            MergerError::DirectoryTraversal { root, .. } => assert_eq!(root, missing),
            other => panic!("Expected DirectoryTraversal error, got {other:?}"),
        }
    }

    #[test]
    fn test_has_extension_is_case_insensitive() {
        assert!(has_extension(Path::new("result.csv"), "csv"));
        assert!(has_extension(Path::new("/x/RESULT.Csv"), "csv"));
        assert!(!has_extension(Path::new("result.csv.bak"), "csv"));
        assert!(!has_extension(Path::new("result"), "csv"));
    }
}
