//! Sorting files from a source tree into `<category>/<extension>/` folders.
//!
//! [`FileSorter`] ties the walker and the classifier together. For every file
//! it plans a [`FileOperation`], executes it as a copy or a move, and records a
//! [`FileOutcome`]. A single file's failure never aborts the run, and
//! [`FileSorter::sort`] always hands back a complete [`SortResult`].

use crate::config::SorterConfig;
use crate::file_category::{Classifier, extension_of, target_folder};
use crate::walker::{TraversalError, TreeWalker, resolve};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Whether files are duplicated into the destination or relocated there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortAction {
    Copy,
    Move,
}

impl fmt::Display for SortAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortAction::Copy => write!(f, "copy"),
            SortAction::Move => write!(f, "move"),
        }
    }
}

/// A planned copy or move of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOperation {
    /// Absolute path of the file in the source tree.
    pub source: PathBuf,
    /// Nominal destination, before any name disambiguation.
    pub destination: PathBuf,
    /// Category the file was classified into.
    pub category: String,
    pub action: SortAction,
}

/// Where an executed operation actually put the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedOperation {
    pub destination: PathBuf,
    /// True if the nominal destination was taken and a `(n)` suffix was added.
    pub renamed: bool,
}

/// Per-file failure while copying or moving. Recorded, never fatal to a run.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Copied {} but could not remove the original: {source}", .path.display())]
    RemoveSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Problems with the directories chosen for a run.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Source folder {} does not exist or is not a directory", .0.display())]
    InvalidSource(PathBuf),
    #[error("Destination {} exists but is not a directory", .0.display())]
    DestinationNotDirectory(PathBuf),
    #[error(
        "Destination {} must not be the source folder or lie inside it ({})",
        .destination.display(),
        .source_root.display()
    )]
    DestinationInsideSource {
        source_root: PathBuf,
        destination: PathBuf,
    },
}

/// What happened to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Skipped,
    Failed,
}

/// The outcome record for one file of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub source: PathBuf,
    /// Final destination for successes, the attempted one for failures.
    pub destination: Option<PathBuf>,
    pub category: Option<String>,
    pub status: OutcomeStatus,
    /// Error text for failures, the reason for skips, rename notes for successes.
    pub message: Option<String>,
    pub renamed: bool,
}

impl FileOutcome {
    fn success(operation: FileOperation, executed: ExecutedOperation) -> Self {
        let message = if executed.renamed {
            executed
                .destination
                .file_name()
                .map(|name| format!("destination existed, renamed to {}", name.to_string_lossy()))
        } else {
            None
        };

        Self {
            source: operation.source,
            destination: Some(executed.destination),
            category: Some(operation.category),
            status: OutcomeStatus::Success,
            message,
            renamed: executed.renamed,
        }
    }

    fn skipped(source: PathBuf, reason: String) -> Self {
        Self {
            source,
            destination: None,
            category: None,
            status: OutcomeStatus::Skipped,
            message: Some(reason),
            renamed: false,
        }
    }

    fn failed(source: PathBuf, operation: Option<FileOperation>, message: String) -> Self {
        let (destination, category) = match operation {
            Some(op) => (Some(op.destination), Some(op.category)),
            None => (None, None),
        };

        Self {
            source,
            destination,
            category,
            status: OutcomeStatus::Failed,
            message: Some(message),
            renamed: false,
        }
    }
}

/// Aggregate result of one sort run.
#[derive(Debug, Clone, Default)]
pub struct SortResult {
    /// Files produced by the walk (traversal errors not included).
    pub files_scanned: usize,
    pub files_sorted: usize,
    pub files_skipped: usize,
    /// Failed operations plus traversal errors.
    pub errors: usize,
    /// Per-file records, in processing order.
    pub outcomes: Vec<FileOutcome>,
    /// Set when the run stopped early on request.
    pub cancelled: bool,
}

impl SortResult {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            OutcomeStatus::Success => self.files_sorted += 1,
            OutcomeStatus::Skipped => self.files_skipped += 1,
            OutcomeStatus::Failed => self.errors += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Outcomes with the given status.
    pub fn with_status(&self, status: OutcomeStatus) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes
            .iter()
            .filter(move |outcome| outcome.status == status)
    }

    /// Number of sorted files per category.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in self.with_status(OutcomeStatus::Success) {
            if let Some(category) = &outcome.category {
                *counts.entry(category.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// True if nothing failed and the run was not cancelled.
    pub fn is_complete_success(&self) -> bool {
        self.errors == 0 && !self.cancelled
    }
}

/// Progress messages emitted while a run is in flight, in order.
#[derive(Debug, Clone)]
pub enum SortEvent {
    /// The walk finished; `total` items will be processed.
    Discovered { total: usize },
    /// One item was processed. `index` counts from zero.
    Processed { index: usize, outcome: FileOutcome },
    /// The run ended, either normally or by cancellation.
    Finished { cancelled: bool },
}

/// Cooperative cancellation flag shared between a run and its controller.
///
/// The sorter checks it between files, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A file found during a dry run, and what would happen to it.
#[derive(Debug, Clone)]
pub enum PlannedItem {
    Operation(FileOperation),
    Excluded(PathBuf),
    Unreadable(TraversalError),
}

type Observer<'a> = Box<dyn FnMut(&SortEvent) + 'a>;

/// Sorts files according to a [`SorterConfig`].
///
/// # Examples
///
/// ```no_run
/// use dateiexperte::config::SorterConfig;
/// use dateiexperte::file_sorter::{FileSorter, SortAction};
/// use std::path::Path;
///
/// let config = SorterConfig::default();
/// let result = FileSorter::new(&config).sort(
///     Path::new("/home/user/Downloads"),
///     Path::new("/home/user/Sorted"),
///     SortAction::Copy,
///     true,
/// );
/// println!("{} sorted, {} skipped, {} errors", result.files_sorted, result.files_skipped, result.errors);
/// ```
pub struct FileSorter<'a> {
    config: &'a SorterConfig,
    classifier: Classifier,
    cancel: CancelToken,
    observers: Vec<Observer<'a>>,
}

impl<'a> FileSorter<'a> {
    pub fn new(config: &'a SorterConfig) -> Self {
        Self {
            config,
            classifier: Classifier::new(config),
            cancel: CancelToken::new(),
            observers: Vec::new(),
        }
    }

    /// Uses `token` to stop the run early.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Calls `observer` for every [`SortEvent`], on the sorting thread.
    pub fn on_event(mut self, observer: impl FnMut(&SortEvent) + 'a) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Sends every [`SortEvent`] through `sender`. A dropped receiver is ignored.
    pub fn with_channel(self, sender: Sender<SortEvent>) -> Self {
        self.on_event(move |event| {
            let _ = sender.send(event.clone());
        })
    }

    /// Plans the operation for one file, without touching the filesystem.
    ///
    /// Returns `None` if the file's extension is excluded.
    pub fn plan(
        &self,
        source: &Path,
        destination_root: &Path,
        action: SortAction,
    ) -> Option<FileOperation> {
        let extension = extension_of(source);
        if self.config.is_excluded_extension(&extension) {
            return None;
        }

        let file_name = source.file_name()?;
        let category = self.classifier.category_for(&extension).to_string();
        let destination = destination_root
            .join(target_folder(&category, &extension))
            .join(file_name);

        Some(FileOperation {
            source: source.to_path_buf(),
            destination,
            category,
            action,
        })
    }

    /// Plans a whole run without executing anything (dry run).
    pub fn plan_run(
        &self,
        source_root: &Path,
        destination_root: &Path,
        action: SortAction,
        recursive: bool,
    ) -> Vec<PlannedItem> {
        let destination_root = make_absolute(destination_root);
        self.walker(source_root, &destination_root, recursive)
            .walk()
            .map(|item| match item {
                Ok(path) => match self.plan(&path, &destination_root, action) {
                    Some(operation) => PlannedItem::Operation(operation),
                    None => PlannedItem::Excluded(path),
                },
                Err(error) => PlannedItem::Unreadable(error),
            })
            .collect()
    }

    /// Sorts every eligible file under `source_root` into `destination_root`.
    ///
    /// The destination is pruned from the walk if it lies inside the source.
    /// Never fails: per-file problems are recorded in the result, and a
    /// cancelled run returns what was done so far with `cancelled` set.
    pub fn sort(
        &mut self,
        source_root: &Path,
        destination_root: &Path,
        action: SortAction,
        recursive: bool,
    ) -> SortResult {
        let mut result = SortResult::default();
        let destination_root = make_absolute(destination_root);
        let walker = self.walker(source_root, &destination_root, recursive);

        info!(
            source = %walker.root().display(),
            destination = %destination_root.display(),
            %action,
            recursive,
            "starting sort run"
        );

        let mut discovered = Vec::new();
        for item in walker.walk() {
            if self.cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            discovered.push(item);
        }

        if !result.cancelled {
            debug!(total = discovered.len(), "discovery finished");
            self.emit(&SortEvent::Discovered {
                total: discovered.len(),
            });

            for (index, item) in discovered.into_iter().enumerate() {
                if self.cancel.is_cancelled() {
                    result.cancelled = true;
                    break;
                }

                let outcome = match item {
                    Ok(path) => {
                        result.files_scanned += 1;
                        self.process(path, &destination_root, action)
                    }
                    Err(error) => FileOutcome::failed(error.path.clone(), None, error.to_string()),
                };

                result.record(outcome.clone());
                self.emit(&SortEvent::Processed { index, outcome });
            }
        }

        if result.cancelled {
            info!(processed = result.outcomes.len(), "sort run cancelled");
        } else {
            info!(
                sorted = result.files_sorted,
                skipped = result.files_skipped,
                errors = result.errors,
                "sort run finished"
            );
        }

        self.emit(&SortEvent::Finished {
            cancelled: result.cancelled,
        });
        result
    }

    fn process(&self, source: PathBuf, destination_root: &Path, action: SortAction) -> FileOutcome {
        let Some(operation) = self.plan(&source, destination_root, action) else {
            debug!(file = %source.display(), "skipping excluded extension");
            let reason = format!("excluded extension {}", extension_of(&source));
            return FileOutcome::skipped(source, reason);
        };

        match execute(&operation) {
            Ok(executed) => {
                if executed.renamed {
                    info!(
                        file = %source.display(),
                        destination = %executed.destination.display(),
                        "destination existed, renamed"
                    );
                }
                FileOutcome::success(operation, executed)
            }
            Err(error) => {
                warn!(file = %source.display(), "{}", error);
                FileOutcome::failed(source, Some(operation), error.to_string())
            }
        }
    }

    fn walker(&self, source_root: &Path, destination_root: &Path, recursive: bool) -> TreeWalker {
        TreeWalker::new(source_root, &self.config.excluded_folders, recursive)
            .skip_path(destination_root)
    }

    fn emit(&mut self, event: &SortEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
    }
}

/// Sorts with a default [`FileSorter`]: no cancellation, no progress events.
pub fn sort(
    source_root: &Path,
    destination_root: &Path,
    config: &SorterConfig,
    action: SortAction,
    recursive: bool,
) -> SortResult {
    FileSorter::new(config).sort(source_root, destination_root, action, recursive)
}

/// Performs one planned operation.
///
/// Creates the destination folders and never overwrites: if the destination
/// name is taken, a free `name(n).ext` variant is used instead.
pub fn execute(operation: &FileOperation) -> Result<ExecutedOperation, OperationError> {
    if let Some(parent) = operation.destination.parent() {
        fs::create_dir_all(parent).map_err(|source| OperationError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let destination = unique_destination(&operation.destination);
    match operation.action {
        SortAction::Copy => copy_file(&operation.source, &destination)?,
        SortAction::Move => move_file(&operation.source, &destination)?,
    }

    Ok(ExecutedOperation {
        renamed: destination != operation.destination,
        destination,
    })
}

/// Returns `path` if nothing occupies it, otherwise the first free
/// `stem(n).ext` sibling, counting from 1.
pub fn unique_destination(path: &Path) -> PathBuf {
    if !is_occupied(path) {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());

    let mut counter: u64 = 1;
    loop {
        let name = match &extension {
            Some(ext) => format!("{}({}).{}", stem, counter, ext),
            None => format!("{}({})", stem, counter),
        };
        let candidate = parent.join(name);
        if !is_occupied(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Checks that a run can start: the source must be a directory, and the
/// destination must not be the source or lie inside it.
pub fn validate_directories(source: &Path, destination: &Path) -> Result<(), DirectoryError> {
    if !source.is_dir() {
        return Err(DirectoryError::InvalidSource(source.to_path_buf()));
    }
    if destination.exists() && !destination.is_dir() {
        return Err(DirectoryError::DestinationNotDirectory(
            destination.to_path_buf(),
        ));
    }

    let source_root = resolve(source);
    let resolved_destination = resolve(destination);
    if resolved_destination.starts_with(&source_root) {
        return Err(DirectoryError::DestinationInsideSource {
            source_root,
            destination: resolved_destination,
        });
    }

    Ok(())
}

/// Copies with create-new semantics and keeps the source's modification time.
/// A partially written destination is removed on failure.
pub(crate) fn copy_file(from: &Path, to: &Path) -> Result<(), OperationError> {
    let copy_error = |source: io::Error| OperationError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let mut reader = File::open(from).map_err(copy_error)?;
    let metadata = reader.metadata().map_err(copy_error)?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .map_err(copy_error)?;

    if let Err(e) = io::copy(&mut reader, &mut writer) {
        drop(writer);
        let _ = fs::remove_file(to);
        return Err(copy_error(e));
    }

    if let Ok(modified) = metadata.modified() {
        if let Err(e) = writer.set_modified(modified) {
            debug!(file = %to.display(), error = %e, "could not preserve modification time");
        }
    }
    if let Err(e) = writer.set_permissions(metadata.permissions()) {
        debug!(file = %to.display(), error = %e, "could not preserve permissions");
    }

    Ok(())
}

/// Moves by rename, falling back to copy and delete across filesystems.
///
/// On failure the source is left where it was.
pub(crate) fn move_file(from: &Path, to: &Path) -> Result<(), OperationError> {
    let rename_error = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    if fs::symlink_metadata(from).is_err() {
        return Err(OperationError::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: rename_error,
        });
    }

    debug!(file = %from.display(), error = %rename_error, "rename failed, copying instead");
    copy_file(from, to)?;

    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(OperationError::RemoveSource {
            path: from.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}

fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn make_absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
