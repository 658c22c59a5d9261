//! Command-line interface for dateiexperte.
//!
//! This module handles:
//! - Argument parsing (clap)
//! - Logging setup
//! - Running sorts with a progress bar, dry runs and undo
//! - Showing file details
//! - Editing the configuration file

use crate::config::{ConfigError, ConfigStore, SorterConfig};
use crate::file_info::FileInfo;
use crate::file_sorter::{
    CancelToken, FileSorter, SortAction, SortEvent, SortResult, validate_directories,
};
use crate::output::OutputFormatter;
use crate::undo::{RunHistory, UndoManager};
use anyhow::{Context, anyhow, bail};
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tracing::{Level, debug, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "dateiexperte")]
#[command(
    author,
    version,
    about = "Sort files into category and file type folders"
)]
#[command(after_help = "Examples:
  dateiexperte sort ~/Downloads ~/Sortiert
  dateiexperte sort ~/Downloads ~/Sortiert --move --dry-run
  dateiexperte undo ~/Sortiert
  dateiexperte config add-extension Bilder .heic")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log more details to stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sort the files of SOURCE into DEST
    Sort {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        #[arg(value_name = "DEST")]
        destination: PathBuf,
        /// Move files instead of copying them
        #[arg(long = "move")]
        move_files: bool,
        /// Only sort files directly inside SOURCE
        #[arg(long)]
        no_recursive: bool,
        /// Show what would happen without touching any file
        #[arg(long)]
        dry_run: bool,
    },
    /// Revert the last sort run into DEST
    Undo {
        #[arg(value_name = "DEST")]
        destination: PathBuf,
    },
    /// Show details about a file and where it would be sorted
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Show or edit the configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the current configuration
    Show,
    /// Print the path of the configuration file in use
    Path,
    /// Write the built-in default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    #[command(flatten)]
    Edit(ConfigEdit),
}

/// Configuration changes. Each one loads, edits and saves the file.
#[derive(Subcommand, Debug)]
pub enum ConfigEdit {
    /// Rename the folder for files matching no category
    SetDefault { name: String },
    AddCategory { name: String },
    RemoveCategory { name: String },
    /// Add one or more extensions to a category
    AddExtension {
        category: String,
        #[arg(required = true)]
        extensions: Vec<String>,
    },
    RemoveExtension { category: String, extension: String },
    /// Never sort files with this extension
    ExcludeExtension { extension: String },
    IncludeExtension { extension: String },
    /// Never descend into folders with this name
    ExcludeFolder { name: String },
    IncludeFolder { name: String },
}

/// Installs the stderr log subscriber. Warnings by default, then info and debug.
pub fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")
}

/// Runs the parsed command line.
///
/// ```no_run
/// use clap::Parser;
/// use dateiexperte::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["dateiexperte", "sort", "/tmp/in", "/tmp/out", "--dry-run"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {:#}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("interrupted, stopping after the current file");
        interrupt.cancel();
    }) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    run_command_with_cancel(cli.command, cli.config.as_deref(), &cancel)
}

/// Runs one command with an optional explicit configuration path.
pub fn run_command(command: Command, config_path: Option<&Path>) -> anyhow::Result<()> {
    run_command_with_cancel(command, config_path, &CancelToken::new())
}

/// Like [`run_command`], but a sort stops between files once `cancel` fires.
pub fn run_command_with_cancel(
    command: Command,
    config_path: Option<&Path>,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    let store = ConfigStore::locate(config_path);

    match command {
        Command::Sort {
            source,
            destination,
            move_files,
            no_recursive,
            dry_run,
        } => {
            let config = load_config(&store)?;
            let action = if move_files {
                SortAction::Move
            } else {
                SortAction::Copy
            };
            let request = SortRequest {
                source: &source,
                destination: &destination,
                action,
                recursive: !no_recursive,
                cancel,
            };
            if dry_run {
                sort_dry_run(&config, &request)
            } else {
                sort_files(&config, &request)
            }
        }
        Command::Undo { destination } => undo_sort(&destination),
        Command::Info { file } => {
            let config = load_config(&store)?;
            let info = FileInfo::gather(&file, &config)
                .with_context(|| format!("Could not read {}", file.display()))?;
            OutputFormatter::file_info(&info);
            Ok(())
        }
        Command::Config(command) => run_config_command(command, &store),
    }
}

struct SortRequest<'a> {
    source: &'a Path,
    destination: &'a Path,
    action: SortAction,
    recursive: bool,
    cancel: &'a CancelToken,
}

fn load_config(store: &ConfigStore) -> anyhow::Result<SorterConfig> {
    store
        .load()
        .with_context(|| format!("Error loading configuration {}", store.path().display()))
}

fn sort_files(config: &SorterConfig, request: &SortRequest<'_>) -> anyhow::Result<()> {
    validate_directories(request.source, request.destination)?;
    fs::create_dir_all(request.destination).with_context(|| {
        format!(
            "Could not create destination {}",
            request.destination.display()
        )
    })?;

    OutputFormatter::info(&format!(
        "Sorting {} into {} ({})",
        request.source.display(),
        request.destination.display(),
        request.action
    ));

    let result = run_with_progress(config, request)?;

    if result.files_sorted > 0 {
        let history = RunHistory::from_result(
            &result,
            request.action,
            request.source,
            request.destination,
        );
        match history.save(request.destination) {
            Ok(()) => OutputFormatter::plain(&format!(
                "History saved. Use 'dateiexperte undo {}' to revert this run.",
                request.destination.display()
            )),
            Err(e) => {
                warn!(error = %e, "could not save run history");
                OutputFormatter::warning(&format!("Could not save history, undo is unavailable: {}", e));
            }
        }
    }

    OutputFormatter::sort_report(&result);
    Ok(())
}

/// Sorts on a worker thread while this thread drives the progress bar.
fn run_with_progress(config: &SorterConfig, request: &SortRequest<'_>) -> anyhow::Result<SortResult> {
    let (sender, receiver) = mpsc::channel();
    let progress = OutputFormatter::create_progress_bar(0);

    thread::scope(|scope| {
        let worker = scope.spawn(move || {
            FileSorter::new(config)
                .with_cancel_token(request.cancel.clone())
                .with_channel(sender)
                .sort(
                    request.source,
                    request.destination,
                    request.action,
                    request.recursive,
                )
        });

        for event in receiver {
            match event {
                SortEvent::Discovered { total } => {
                    debug!(total, "files discovered");
                    progress.set_length(total as u64);
                }
                SortEvent::Processed { outcome, .. } => {
                    progress.inc(1);
                    if let Some(name) = outcome.source.file_name() {
                        progress.set_message(name.to_string_lossy().into_owned());
                    }
                }
                SortEvent::Finished { .. } => progress.finish_and_clear(),
            }
        }

        worker
            .join()
            .map_err(|_| anyhow!("Sorting thread terminated unexpectedly"))
    })
}

fn sort_dry_run(config: &SorterConfig, request: &SortRequest<'_>) -> anyhow::Result<()> {
    validate_directories(request.source, request.destination)?;

    let destination = std::path::absolute(request.destination)
        .unwrap_or_else(|_| request.destination.to_path_buf());
    let plan = FileSorter::new(config).plan_run(
        request.source,
        &destination,
        request.action,
        request.recursive,
    );

    OutputFormatter::dry_run_report(&plan, &destination);
    Ok(())
}

fn undo_sort(destination: &Path) -> anyhow::Result<()> {
    OutputFormatter::info("Undoing previous sort run...");

    let report = UndoManager::undo(destination)?;
    OutputFormatter::success(&format!(
        "Undo complete! {} recorded operation(s) processed.",
        report.total_processed()
    ));
    OutputFormatter::plain(&format!("  Restored: {}", report.restored_files));
    OutputFormatter::plain(&format!("  Copies removed: {}", report.removed_copies));

    for (original, restored) in &report.renamed {
        OutputFormatter::warning(&format!(
            "{} was occupied, restored as {}",
            original.display(),
            restored.display()
        ));
    }

    if !report.skipped_files.is_empty() {
        OutputFormatter::plain(&format!("  Skipped: {}", report.skipped_files.len()));
        for (path, reason) in &report.skipped_files {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }

    if !report.failed_restores.is_empty() {
        OutputFormatter::plain(&format!("  Failed: {}", report.failed_restores.len()));
        for (path, reason) in &report.failed_restores {
            OutputFormatter::error(&format!("{}: {}", path.display(), reason));
        }
        OutputFormatter::warning("History file was NOT deleted due to failures. Fix the issues and try again.");
    }

    Ok(())
}

fn run_config_command(command: ConfigCommand, store: &ConfigStore) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = load_config(store)?;
            OutputFormatter::config_summary(store.path(), &config);
        }
        ConfigCommand::Path => OutputFormatter::plain(&store.path().display().to_string()),
        ConfigCommand::Init { force } => {
            if store.path().exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    store.path().display()
                );
            }
            store.save(&SorterConfig::default())?;
            OutputFormatter::success(&format!(
                "Wrote default configuration to {}",
                store.path().display()
            ));
        }
        ConfigCommand::Edit(edit) => {
            let mut config = load_config(store)?;
            let message = apply_edit(&mut config, edit)?;
            store.save(&config)?;
            OutputFormatter::success(&message);
        }
    }
    Ok(())
}

/// Applies one edit and describes it.
fn apply_edit(config: &mut SorterConfig, edit: ConfigEdit) -> Result<String, ConfigError> {
    let message = match edit {
        ConfigEdit::SetDefault { name } => {
            config.set_default_category(&name)?;
            format!("Default category is now '{}'", config.default_category)
        }
        ConfigEdit::AddCategory { name } => {
            config.add_category(&name)?;
            format!("Added category '{}'", name.trim())
        }
        ConfigEdit::RemoveCategory { name } => {
            let extensions = config.remove_category(&name)?;
            format!(
                "Removed category '{}' ({} extensions)",
                name.trim(),
                extensions.len()
            )
        }
        ConfigEdit::AddExtension {
            category,
            extensions,
        } => {
            let added = extensions
                .iter()
                .map(|ext| config.add_extension(&category, ext))
                .collect::<Result<Vec<_>, _>>()?;
            format!("Added {} to '{}'", added.join(", "), category.trim())
        }
        ConfigEdit::RemoveExtension {
            category,
            extension,
        } => {
            config.remove_extension(&category, &extension)?;
            format!("Removed {} from '{}'", extension, category.trim())
        }
        ConfigEdit::ExcludeExtension { extension } => {
            let extension = config.add_excluded_extension(&extension)?;
            format!("Files ending in {} will be skipped", extension)
        }
        ConfigEdit::IncludeExtension { extension } => {
            config.remove_excluded_extension(&extension)?;
            format!("Files ending in {} will be sorted again", extension)
        }
        ConfigEdit::ExcludeFolder { name } => {
            let name = config.add_excluded_folder(&name)?;
            format!("Folders named '{}' will be skipped", name)
        }
        ConfigEdit::IncludeFolder { name } => {
            config.remove_excluded_folder(&name)?;
            format!("Folders named '{}' will be searched again", name.trim())
        }
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sort_flags() {
        let cli = Cli::try_parse_from([
            "dateiexperte",
            "sort",
            "in",
            "out",
            "--move",
            "--no-recursive",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Sort {
                source,
                destination,
                move_files,
                no_recursive,
                dry_run,
            } => {
                assert_eq!(source, PathBuf::from("in"));
                assert_eq!(destination, PathBuf::from("out"));
                assert!(move_files);
                assert!(no_recursive);
                assert!(!dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dateiexperte",
            "config",
            "add-extension",
            "Bilder",
            ".heic",
            "avif",
            "--config",
            "custom.json",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.json")));
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Edit(ConfigEdit::AddExtension { ref extensions, .. })) if extensions.len() == 2
        ));
    }

    #[test]
    fn test_add_extension_requires_a_value() {
        assert!(Cli::try_parse_from(["dateiexperte", "config", "add-extension", "Bilder"]).is_err());
    }
}
