//! Terminal output for the CLI.
//!
//! All user-facing text goes through [`OutputFormatter`] so styling stays in
//! one place. Diagnostics go through `tracing` instead.

use crate::config::SorterConfig;
use crate::file_info::FileInfo;
use crate::file_sorter::{FileOutcome, OutcomeStatus, PlannedItem, SortResult};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;

/// Prints styled CLI output.
///
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars and summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use dateiexperte::output::OutputFormatter;
    /// OutputFormatter::success("Sorting complete");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints sorted-file counts per category.
    ///
    /// ```no_run
    /// use dateiexperte::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Dokumente".to_string(), 15);
    /// counts.insert("Bilder".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = category_counts
            .keys()
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Category".len());

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                file_word(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            file_word(total_files),
            width = width
        );
    }

    /// Prints the end-of-run report: renamed files, failures, then counts.
    pub fn sort_report(result: &SortResult) {
        let renamed: Vec<&FileOutcome> = result.outcomes.iter().filter(|o| o.renamed).collect();
        if !renamed.is_empty() {
            Self::header("Renamed (destination already existed)");
            for outcome in renamed {
                if let Some(destination) = &outcome.destination {
                    Self::plain(&format!(
                        "  {} → {}",
                        outcome.source.display(),
                        destination.display()
                    ));
                }
            }
        }

        let failed: Vec<&FileOutcome> = result
            .with_status(OutcomeStatus::Failed)
            .collect();
        if !failed.is_empty() {
            Self::header("Errors");
            for outcome in failed {
                Self::error(&format!(
                    "{}: {}",
                    outcome.source.display(),
                    outcome.message.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        Self::summary_table(&result.category_counts(), result.files_sorted);
        Self::plain(&format!(
            "Scanned: {}  Sorted: {}  Skipped: {}  Errors: {}",
            result.files_scanned, result.files_sorted, result.files_skipped, result.errors
        ));

        if result.cancelled {
            Self::warning("Sorting was cancelled before all files were processed.");
        } else if result.errors > 0 {
            Self::warning(&format!("{} file(s) could not be sorted.", result.errors));
        } else {
            Self::success("Sorting complete.");
        }
    }

    /// Prints what a dry run found, grouped the way a real run would sort it.
    pub fn dry_run_report(plan: &[PlannedItem], destination_root: &Path) {
        Self::dry_run_notice(&format!(
            "Files would be sorted into {} as follows:",
            destination_root.display()
        ));

        let mut counts = BTreeMap::new();
        let mut planned = 0;
        for item in plan {
            match item {
                PlannedItem::Operation(op) => {
                    planned += 1;
                    *counts.entry(op.category.clone()).or_insert(0) += 1;
                    let target = op
                        .destination
                        .strip_prefix(destination_root)
                        .unwrap_or(&op.destination);
                    Self::plain(&format!(
                        "  {} → {}",
                        op.source.display(),
                        target.display()
                    ));
                }
                PlannedItem::Excluded(path) => {
                    Self::plain(&format!("  {} (excluded)", path.display()).dimmed().to_string());
                }
                PlannedItem::Unreadable(error) => Self::error(&error.to_string()),
            }
        }

        if planned == 0 {
            Self::info("No files found to sort.");
            return;
        }

        Self::summary_table(&counts, planned);
        Self::dry_run_notice("No files were modified.");
    }

    pub fn file_info(info: &FileInfo) {
        Self::header(&info.name);
        for (label, value) in info.entries() {
            println!("  {:<14} {}", format!("{}:", label).bold(), value);
        }
    }

    /// Prints the configuration the way it is applied: categories in
    /// lookup order, then the exclusion lists.
    pub fn config_summary(path: &Path, config: &SorterConfig) {
        Self::plain(&format!("Configuration: {}", path.display()).dimmed().to_string());

        Self::header("Categories");
        for (name, extensions) in &config.categories {
            let list = extensions.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
            println!("  {:<16} {}", name.green(), list);
        }
        println!(
            "  {:<16} {}",
            config.default_category.yellow(),
            "(everything else)".dimmed()
        );

        Self::header("Excluded extensions");
        Self::plain(&format!("  {}", join_or_none(&config.excluded_extensions)));
        Self::header("Excluded folders");
        Self::plain(&format!("  {}", join_or_none(&config.excluded_folders)));
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn file_word(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn join_or_none<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let joined = items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() { "(none)".to_string() } else { joined }
}
