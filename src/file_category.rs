//! Extension-based file classification.
//!
//! Categories are user-defined in [`SorterConfig`]. A file's extension is looked
//! up in the categories in declared order, and anything unmatched (including
//! files without an extension) falls back to the default category.
//!
//! # Examples
//!
//! ```
//! use dateiexperte::config::SorterConfig;
//! use dateiexperte::file_category::classify;
//!
//! let config = SorterConfig::default();
//! assert_eq!(classify("JPG", &config), "Bilder");
//! assert_eq!(classify(".unknown", &config), "_Unsortiert");
//! assert_eq!(classify("", &config), "_Unsortiert");
//! ```
use crate::config::SorterConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Normalizes an extension to lower-case with exactly one leading dot.
///
/// Returns an empty string for input that names no extension (`""`, `"."`).
///
/// ```
/// use dateiexperte::file_category::normalize_extension;
///
/// assert_eq!(normalize_extension("JPG"), ".jpg");
/// assert_eq!(normalize_extension(".Tar"), ".tar");
/// assert_eq!(normalize_extension(""), "");
/// ```
pub fn normalize_extension(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return String::new();
    }
    format!(".{}", trimmed.to_lowercase())
}

/// Returns the normalized extension of a file path, or `""` if it has none.
///
/// Only the suffix after the last dot counts: `archive.tar.gz` is `.gz`.
/// Dotfiles such as `.bashrc` have no extension.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Folder, relative to the destination root, that receives files of this
/// category and extension: `<category>/<extension without dot>`, or just
/// `<category>` for files without an extension.
pub fn target_folder(category: &str, extension: &str) -> PathBuf {
    let mut folder = PathBuf::from(category);
    let type_folder = extension.trim_start_matches('.');
    if !type_folder.is_empty() {
        folder.push(type_folder);
    }
    folder
}

/// Classifies an extension by scanning the categories in declared order.
///
/// Total and side-effect free: unmatched input always resolves to
/// `config.default_category`.
pub fn classify<'a>(extension: &str, config: &'a SorterConfig) -> &'a str {
    let extension = normalize_extension(extension);
    if extension.is_empty() {
        return &config.default_category;
    }

    config
        .categories
        .iter()
        .find(|(_, extensions)| extensions.contains(&extension))
        .map(|(name, _)| name.as_str())
        .unwrap_or(&config.default_category)
}

/// Precomputed extension lookup for classifying many files.
///
/// Gives the same answers as [`classify`]: when an extension is declared in
/// several categories the first one is kept.
#[derive(Debug, Clone)]
pub struct Classifier {
    extension_map: HashMap<String, String>,
    default_category: String,
}

impl Classifier {
    pub fn new(config: &SorterConfig) -> Self {
        let mut extension_map = HashMap::new();
        for (category, extensions) in &config.categories {
            for extension in extensions {
                extension_map
                    .entry(extension.clone())
                    .or_insert_with(|| category.clone());
            }
        }

        Self {
            extension_map,
            default_category: config.default_category.clone(),
        }
    }

    /// Maps an extension (any case, with or without the dot) to its category.
    pub fn category_for(&self, extension: &str) -> &str {
        self.extension_map
            .get(&normalize_extension(extension))
            .map(String::as_str)
            .unwrap_or(&self.default_category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexSet;

    fn config_with(categories: &[(&str, &[&str])]) -> SorterConfig {
        let mut config = SorterConfig::default();
        config.categories = categories
            .iter()
            .map(|(name, extensions)| {
                (
                    name.to_string(),
                    extensions.iter().map(|e| e.to_string()).collect::<IndexSet<_>>(),
                )
            })
            .collect();
        config
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("PDF"), ".pdf");
        assert_eq!(normalize_extension(".pdf"), ".pdf");
        assert_eq!(normalize_extension(" .Mp3 "), ".mp3");
        assert_eq!(normalize_extension("..gz"), ".gz");
        assert_eq!(normalize_extension("."), "");
        assert_eq!(normalize_extension(""), "");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/a/photo.JPG")), ".jpg");
        assert_eq!(extension_of(Path::new("archive.tar.gz")), ".gz");
        assert_eq!(extension_of(Path::new("README")), "");
        assert_eq!(extension_of(Path::new(".bashrc")), "");
        assert_eq!(extension_of(Path::new("trailing.")), "");
    }

    #[test]
    fn test_target_folder() {
        assert_eq!(target_folder("Bilder", ".jpg"), PathBuf::from("Bilder").join("jpg"));
        assert_eq!(target_folder("_Unsortiert", ""), PathBuf::from("_Unsortiert"));
    }

    #[test]
    fn test_classify_declared_extension() {
        let config = config_with(&[("Bilder", &[".jpg"]), ("Texte", &[".txt"])]);
        assert_eq!(classify(".jpg", &config), "Bilder");
        assert_eq!(classify("TXT", &config), "Texte");
    }

    #[test]
    fn test_classify_falls_back_to_default() {
        let config = config_with(&[("Bilder", &[".jpg"])]);
        assert_eq!(classify(".xyz", &config), config.default_category);
        assert_eq!(classify("", &config), config.default_category);
    }

    #[test]
    fn test_first_declared_category_wins() {
        let config = config_with(&[("Erste", &[".dat"]), ("Zweite", &[".dat", ".bin"])]);
        assert_eq!(classify(".dat", &config), "Erste");
        assert_eq!(classify(".bin", &config), "Zweite");

        let classifier = Classifier::new(&config);
        assert_eq!(classifier.category_for(".dat"), "Erste");
        assert_eq!(classifier.category_for("BIN"), "Zweite");
    }

    #[test]
    fn test_classifier_matches_classify() {
        let config = SorterConfig::default();
        let classifier = Classifier::new(&config);

        for ext in [".jpg", ".PDF", "mp3", ".woff2", ".nope", ""] {
            assert_eq!(classifier.category_for(ext), classify(ext, &config), "{ext}");
        }
        assert_eq!(classifier.category_for("TXT"), "Dokumente");
    }
}
