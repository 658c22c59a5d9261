//! dateiexperte - sort files into category and file type folders
//!
//! This library classifies files by extension using user-defined categories,
//! walks source trees while skipping excluded folders, copies or moves every
//! file into `<category>/<extension>/` below a destination folder, and can
//! undo the last run. Rules are kept in a JSON configuration file.

pub mod cli;
pub mod config;
pub mod file_category;
pub mod file_info;
pub mod file_sorter;
pub mod output;
pub mod undo;
pub mod walker;

pub use config::{ConfigError, ConfigStore, SorterConfig};
pub use file_category::{Classifier, classify};
pub use file_sorter::{
    CancelToken, FileOutcome, FileSorter, OutcomeStatus, SortAction, SortEvent, SortResult, sort,
};
pub use undo::{RunHistory, UndoManager, UndoReport};
pub use walker::{TraversalError, TreeWalker};

pub use cli::{Cli, run_cli};
