//! Run history and undo for sort runs.
//!
//! After a sort, the operations that succeeded are written to a history file
//! in the destination root. [`UndoManager::undo`] reads it back and reverses
//! the run: moved files go back to where they came from, copies are deleted.

use crate::file_sorter::{OutcomeStatus, SortAction, SortResult, move_file, unique_destination};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the history file kept in the destination root.
pub const HISTORY_FILE_NAME: &str = ".dateiexperte_history.json";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to read history file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write history file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid history file format in {}: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("No previous sort run found to undo in {}", .0.display())]
    NotFound(PathBuf),
    #[error("Destination folder {} does not exist", .0.display())]
    InvalidBasePath(PathBuf),
}

/// One file placed by a sort run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedOperation {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub category: String,
}

/// The persisted record of one sort run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHistory {
    pub timestamp: DateTime<Utc>,
    pub action: SortAction,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub operations: Vec<RecordedOperation>,
}

impl RunHistory {
    /// Builds the history of a finished run from its successful outcomes.
    pub fn from_result(
        result: &SortResult,
        action: SortAction,
        source_root: &Path,
        destination_root: &Path,
    ) -> Self {
        let operations = result
            .with_status(OutcomeStatus::Success)
            .filter_map(|outcome| {
                Some(RecordedOperation {
                    source: outcome.source.clone(),
                    destination: outcome.destination.clone()?,
                    category: outcome.category.clone()?,
                })
            })
            .collect();

        Self {
            timestamp: Utc::now(),
            action,
            source_root: absolute(source_root),
            destination_root: absolute(destination_root),
            operations,
        }
    }

    pub fn file_path(destination_root: &Path) -> PathBuf {
        destination_root.join(HISTORY_FILE_NAME)
    }

    /// Writes the history into `destination_root`, replacing any earlier one.
    pub fn save(&self, destination_root: &Path) -> Result<(), HistoryError> {
        let path = Self::file_path(destination_root);
        let json = serde_json::to_string_pretty(self).map_err(|e| HistoryError::Write {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        fs::write(&path, json).map_err(|source| HistoryError::Write {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), operations = self.operations.len(), "saved run history");
        Ok(())
    }

    /// Loads the history kept in `destination_root`, if there is one.
    pub fn load(destination_root: &Path) -> Result<Option<Self>, HistoryError> {
        let path = Self::file_path(destination_root);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(HistoryError::Read { path, source }),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| HistoryError::Format { path, source })
    }

    pub fn delete(destination_root: &Path) -> Result<(), HistoryError> {
        let path = Self::file_path(destination_root);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(HistoryError::Write { path, source }),
        }
    }
}

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Moved files put back at (or next to) their original location.
    pub restored_files: usize,
    /// Copies deleted from the destination.
    pub removed_copies: usize,
    /// Files that were already gone from the destination.
    pub skipped_files: Vec<(PathBuf, String)>,
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Restored files whose original name was taken, with the name used instead.
    pub renamed: Vec<(PathBuf, PathBuf)>,
}

impl UndoReport {
    pub fn total_processed(&self) -> usize {
        self.restored_files
            + self.removed_copies
            + self.skipped_files.len()
            + self.failed_restores.len()
    }

    /// True if nothing failed. Skipped files count as done.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty()
    }
}

/// Reverses the most recent sort run into a destination folder.
pub struct UndoManager;

impl UndoManager {
    /// Undoes the run recorded in `destination_root`.
    ///
    /// Operations are reversed last to first. The history file is only
    /// deleted when every operation was reversed or already gone, so a
    /// partial undo can be retried.
    ///
    /// ```no_run
    /// use dateiexperte::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::undo(Path::new("/home/user/Sorted")) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(destination_root: &Path) -> Result<UndoReport, HistoryError> {
        if !destination_root.is_dir() {
            return Err(HistoryError::InvalidBasePath(destination_root.to_path_buf()));
        }

        let history = RunHistory::load(destination_root)?
            .ok_or_else(|| HistoryError::NotFound(destination_root.to_path_buf()))?;

        info!(
            operations = history.operations.len(),
            action = %history.action,
            recorded = %history.timestamp,
            "undoing sort run"
        );

        let mut report = UndoReport::default();
        for operation in history.operations.iter().rev() {
            Self::reverse(operation, history.action, &mut report);
            prune_empty_parents(&operation.destination, &history.destination_root);
        }

        if report.is_complete_success() {
            if let Err(e) = RunHistory::delete(destination_root) {
                warn!("Could not delete history file: {}", e);
            }
        } else {
            warn!(
                failed = report.failed_restores.len(),
                "undo incomplete, history file kept"
            );
        }

        Ok(report)
    }

    fn reverse(operation: &RecordedOperation, action: SortAction, report: &mut UndoReport) {
        if fs::symlink_metadata(&operation.destination).is_err() {
            report.skipped_files.push((
                operation.destination.clone(),
                "File not found at expected location".to_string(),
            ));
            return;
        }

        match action {
            SortAction::Copy => match fs::remove_file(&operation.destination) {
                Ok(()) => report.removed_copies += 1,
                Err(e) => report.failed_restores.push((
                    operation.destination.clone(),
                    format!("Failed to remove copy: {}", e),
                )),
            },
            SortAction::Move => match Self::restore_file(operation) {
                Ok(restored) => {
                    report.restored_files += 1;
                    if restored != operation.source {
                        report.renamed.push((operation.source.clone(), restored));
                    }
                }
                Err(reason) => report
                    .failed_restores
                    .push((operation.destination.clone(), reason)),
            },
        }
    }

    /// Moves one file back. An occupied original name gets a `(n)` suffix.
    fn restore_file(operation: &RecordedOperation) -> Result<PathBuf, String> {
        if let Some(parent) = operation.source.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Could not recreate {}: {}", parent.display(), e))?;
        }

        let target = unique_destination(&operation.source);
        move_file(&operation.destination, &target).map_err(|e| e.to_string())?;
        Ok(target)
    }
}

/// Removes the now-empty type and category folders above `path`, stopping
/// at `root`.
fn prune_empty_parents(path: &Path, root: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        // Fails on non-empty directories, which ends the walk up.
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SorterConfig;
    use crate::file_sorter::FileSorter;
    use tempfile::TempDir;

    struct Dirs {
        _temp_dir: TempDir,
        source: PathBuf,
        dest: PathBuf,
    }

    fn setup(files: &[(&str, &str)]) -> Dirs {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("source");
        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(&dest).expect("Failed to create dest");
        for (rel, content) in files {
            let path = source.join(rel);
            fs::create_dir_all(path.parent().unwrap()).expect("Failed to create dirs");
            fs::write(path, content).expect("Failed to write file");
        }
        Dirs {
            _temp_dir: temp_dir,
            source,
            dest,
        }
    }

    fn sort_and_record(dirs: &Dirs, action: SortAction) -> RunHistory {
        let config = SorterConfig::default();
        let result = FileSorter::new(&config).sort(&dirs.source, &dirs.dest, action, true);
        let history = RunHistory::from_result(&result, action, &dirs.source, &dirs.dest);
        history.save(&dirs.dest).expect("Failed to save history");
        history
    }

    #[test]
    fn test_undo_no_history() {
        let dirs = setup(&[]);
        let result = UndoManager::undo(&dirs.dest);
        assert!(matches!(result, Err(HistoryError::NotFound(_))));
    }

    #[test]
    fn test_undo_invalid_base_path() {
        let result = UndoManager::undo(Path::new("/non/existent/path"));
        assert!(matches!(result, Err(HistoryError::InvalidBasePath(_))));
    }

    #[test]
    fn test_history_round_trips_through_disk() {
        let dirs = setup(&[("a.jpg", "a"), ("b.txt", "b")]);
        let history = sort_and_record(&dirs, SortAction::Copy);

        let loaded = RunHistory::load(&dirs.dest).unwrap().unwrap();
        assert_eq!(loaded, history);
        assert_eq!(loaded.operations.len(), 2);
        assert_eq!(loaded.action, SortAction::Copy);
    }

    #[test]
    fn test_corrupt_history_is_format_error() {
        let dirs = setup(&[]);
        fs::write(dirs.dest.join(HISTORY_FILE_NAME), "{ not json").unwrap();

        assert!(matches!(
            UndoManager::undo(&dirs.dest),
            Err(HistoryError::Format { .. })
        ));
    }

    #[test]
    fn test_undo_move_restores_sources() {
        let dirs = setup(&[("a.jpg", "image"), ("nested/b.pdf", "doc")]);
        sort_and_record(&dirs, SortAction::Move);
        assert!(!dirs.source.join("a.jpg").exists());

        let report = UndoManager::undo(&dirs.dest).expect("Undo failed");

        assert_eq!(report.restored_files, 2);
        assert!(report.is_complete_success());
        assert_eq!(fs::read_to_string(dirs.source.join("a.jpg")).unwrap(), "image");
        assert_eq!(fs::read_to_string(dirs.source.join("nested/b.pdf")).unwrap(), "doc");
        assert!(!dirs.dest.join("Bilder").exists());
        assert!(!dirs.dest.join(HISTORY_FILE_NAME).exists());
    }

    #[test]
    fn test_undo_copy_removes_copies_only() {
        let dirs = setup(&[("a.jpg", "image")]);
        sort_and_record(&dirs, SortAction::Copy);
        assert!(dirs.dest.join("Bilder/jpg/a.jpg").exists());

        let report = UndoManager::undo(&dirs.dest).expect("Undo failed");

        assert_eq!(report.removed_copies, 1);
        assert_eq!(report.restored_files, 0);
        assert!(dirs.source.join("a.jpg").exists());
        assert!(!dirs.dest.join("Bilder/jpg/a.jpg").exists());
    }

    #[test]
    fn test_undo_move_with_occupied_original() {
        let dirs = setup(&[("test.txt", "original content")]);
        sort_and_record(&dirs, SortAction::Move);
        fs::write(dirs.source.join("test.txt"), "new content").unwrap();

        let report = UndoManager::undo(&dirs.dest).expect("Undo failed");

        assert_eq!(report.restored_files, 1);
        assert_eq!(report.renamed.len(), 1);
        assert_eq!(
            fs::read_to_string(dirs.source.join("test.txt")).unwrap(),
            "new content"
        );
        assert_eq!(
            fs::read_to_string(dirs.source.join("test(1).txt")).unwrap(),
            "original content"
        );
    }

    #[test]
    fn test_undo_with_missing_file() {
        let dirs = setup(&[("gone.txt", "x")]);
        sort_and_record(&dirs, SortAction::Move);
        fs::remove_file(dirs.dest.join("Dokumente/txt/gone.txt")).unwrap();

        let report = UndoManager::undo(&dirs.dest).expect("Undo failed");

        assert_eq!(report.restored_files, 0);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(report.total_processed(), 1);
        assert!(report.is_complete_success());
    }
}
