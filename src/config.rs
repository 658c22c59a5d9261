//! Sorter configuration: categories, default category and exclusion rules.
//!
//! The configuration is persisted as a JSON document with German key names:
//!
//! ```json
//! {
//!     "Kategorien": {
//!         "Bilder": [".jpg", ".png"],
//!         "Dokumente": [".pdf", ".txt"]
//!     },
//!     "StandardKategorie": "_Unsortiert",
//!     "AusgeschlosseneEndungen": [".tmp"],
//!     "AusgeschlosseneOrdner": ["temp", ".git"]
//! }
//! ```
//!
//! Unknown keys are ignored. A missing key falls back to the built-in default
//! for that key only. A known key holding a value of the wrong type is an error.

use crate::file_category::normalize_extension;
use indexmap::{IndexMap, IndexSet};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File name used when looking for a configuration next to the working directory.
pub const CONFIG_FILE_NAME: &str = "sorter_config.json";

/// Name of the folder that receives files matching no category.
pub const DEFAULT_CATEGORY: &str = "_Unsortiert";

/// Errors that can occur while loading, validating, editing or saving a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("Could not read configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The document is not valid JSON or a known key has the wrong type.
    #[error("Invalid configuration {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A value violates one of the validation rules.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    /// A category with this name is already declared.
    #[error("Category '{0}' already exists")]
    DuplicateCategory(String),
    /// No category with this name is declared.
    #[error("Category '{0}' does not exist")]
    UnknownCategory(String),
    /// The extension is already part of the given list.
    #[error("Extension '{extension}' is already listed in {owner}")]
    DuplicateExtension { extension: String, owner: String },
    /// The extension is not part of the given list.
    #[error("Extension '{extension}' is not listed in {owner}")]
    UnknownExtension { extension: String, owner: String },
    /// The folder name is already excluded.
    #[error("Folder '{0}' is already excluded")]
    DuplicateFolder(String),
    /// The folder name is not excluded.
    #[error("Folder '{0}' is not excluded")]
    UnknownFolder(String),
    /// Writing the configuration failed (permission, disk full, ...).
    #[error("Could not write configuration {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

const EXCLUDED_EXTENSIONS_LIST: &str = "excluded extensions";

/// Classification and exclusion rules for a sort run.
///
/// Extensions are always stored normalized (lower-case, leading dot) and
/// excluded folder names lower-cased, so lookups are plain set membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SorterConfig {
    /// Category name to extensions, in declared order. The first category
    /// listing an extension wins.
    pub categories: IndexMap<String, IndexSet<String>>,
    /// Folder for files whose extension matches no category.
    pub default_category: String,
    /// Files with these extensions are never copied or moved.
    pub excluded_extensions: BTreeSet<String>,
    /// Directories with these names are pruned, wherever they appear.
    pub excluded_folders: BTreeSet<String>,
}

impl Default for SorterConfig {
    fn default() -> Self {
        let categories: [(&str, &[&str]); 8] = [
            (
                "Bilder",
                &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".heic"],
            ),
            (
                "Dokumente",
                &[
                    ".pdf", ".docx", ".doc", ".txt", ".odt", ".rtf", ".xlsx", ".xls", ".pptx",
                    ".ppt", ".md",
                ],
            ),
            ("Musik", &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a"]),
            ("Videos", &[".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv"]),
            ("Archive", &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2"]),
            (
                "Code",
                &[
                    ".py", ".java", ".js", ".html", ".css", ".cpp", ".c", ".cs", ".php", ".json",
                    ".xml", ".yaml",
                ],
            ),
            ("Programme", &[".exe", ".msi", ".dmg", ".app", ".deb", ".rpm"]),
            ("Fonts", &[".ttf", ".otf", ".woff", ".woff2"]),
        ];

        Self {
            categories: categories
                .iter()
                .map(|(name, extensions)| {
                    (
                        name.to_string(),
                        extensions.iter().map(|ext| ext.to_string()).collect(),
                    )
                })
                .collect(),
            default_category: DEFAULT_CATEGORY.to_string(),
            excluded_extensions: [
                ".tmp", ".temp", ".lnk", ".ini", ".sys", ".dll", ".part", ".crdownload",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            excluded_folders: [
                "temp",
                "tmp",
                ".git",
                ".svn",
                "__pycache__",
                "archiv",
                "backup",
                "sicherung",
                "system volume information",
                ".trash",
                ".trash-1000",
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
        }
    }
}

impl SorterConfig {
    /// Returns true if files with this extension must be left alone.
    pub fn is_excluded_extension(&self, extension: &str) -> bool {
        self.excluded_extensions
            .contains(&normalize_extension(extension))
    }

    /// Checks every validation rule. Called before saving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, extensions) in &self.categories {
            if validate_folder_name(name, "category name")? != *name {
                return Err(ConfigError::Invalid(format!(
                    "category name '{}' has surrounding whitespace",
                    name
                )));
            }
            for extension in extensions {
                check_normalized(extension)?;
            }
        }

        if validate_folder_name(&self.default_category, "default category")? != self.default_category {
            return Err(ConfigError::Invalid(format!(
                "default category '{}' has surrounding whitespace",
                self.default_category
            )));
        }

        for extension in &self.excluded_extensions {
            check_normalized(extension)?;
        }

        for folder in &self.excluded_folders {
            if folder.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "excluded folder names must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Declares a new, empty category at the end of the category list.
    pub fn add_category(&mut self, name: &str) -> Result<(), ConfigError> {
        let name = validate_folder_name(name, "category name")?;
        if self.categories.contains_key(&name) {
            return Err(ConfigError::DuplicateCategory(name));
        }
        self.categories.insert(name, IndexSet::new());
        Ok(())
    }

    /// Removes a category together with its extensions, keeping the order of the others.
    pub fn remove_category(&mut self, name: &str) -> Result<IndexSet<String>, ConfigError> {
        let name = name.trim();
        self.categories
            .shift_remove(name)
            .ok_or_else(|| ConfigError::UnknownCategory(name.to_string()))
    }

    /// Adds an extension to a category and returns its normalized form.
    ///
    /// An extension already claimed by another category is accepted, but the
    /// earlier category keeps winning during classification.
    pub fn add_extension(&mut self, category: &str, extension: &str) -> Result<String, ConfigError> {
        let extension = validate_extension(extension)?;
        let category = category.trim();

        let earlier_owner = self
            .categories
            .iter()
            .find(|(name, extensions)| name.as_str() != category && extensions.contains(&extension))
            .map(|(name, _)| name.clone());

        let extensions = self
            .categories
            .get_mut(category)
            .ok_or_else(|| ConfigError::UnknownCategory(category.to_string()))?;

        if !extensions.insert(extension.clone()) {
            return Err(ConfigError::DuplicateExtension {
                extension,
                owner: format!("category '{}'", category),
            });
        }

        if let Some(owner) = earlier_owner {
            warn!(
                extension = %extension,
                category,
                owner = %owner,
                "extension is declared in more than one category; first declared match wins"
            );
        }

        Ok(extension)
    }

    /// Removes an extension from a category.
    pub fn remove_extension(&mut self, category: &str, extension: &str) -> Result<(), ConfigError> {
        let extension = normalize_extension(extension);
        let category = category.trim();
        let extensions = self
            .categories
            .get_mut(category)
            .ok_or_else(|| ConfigError::UnknownCategory(category.to_string()))?;

        if extensions.shift_remove(&extension) {
            Ok(())
        } else {
            Err(ConfigError::UnknownExtension {
                extension,
                owner: format!("category '{}'", category),
            })
        }
    }

    /// Excludes an extension from sorting and returns its normalized form.
    pub fn add_excluded_extension(&mut self, extension: &str) -> Result<String, ConfigError> {
        let extension = validate_extension(extension)?;
        if !self.excluded_extensions.insert(extension.clone()) {
            return Err(ConfigError::DuplicateExtension {
                extension,
                owner: EXCLUDED_EXTENSIONS_LIST.to_string(),
            });
        }
        Ok(extension)
    }

    pub fn remove_excluded_extension(&mut self, extension: &str) -> Result<(), ConfigError> {
        let extension = normalize_extension(extension);
        if self.excluded_extensions.remove(&extension) {
            Ok(())
        } else {
            Err(ConfigError::UnknownExtension {
                extension,
                owner: EXCLUDED_EXTENSIONS_LIST.to_string(),
            })
        }
    }

    /// Excludes a folder name from traversal and returns its stored form.
    pub fn add_excluded_folder(&mut self, name: &str) -> Result<String, ConfigError> {
        let name = normalize_folder(name)?;
        if !self.excluded_folders.insert(name.clone()) {
            return Err(ConfigError::DuplicateFolder(name));
        }
        Ok(name)
    }

    pub fn remove_excluded_folder(&mut self, name: &str) -> Result<(), ConfigError> {
        let name = name.trim().to_lowercase();
        if self.excluded_folders.remove(&name) {
            Ok(())
        } else {
            Err(ConfigError::UnknownFolder(name))
        }
    }

    /// Renames the folder that collects unmatched files.
    pub fn set_default_category(&mut self, name: &str) -> Result<(), ConfigError> {
        self.default_category = validate_folder_name(name, "default category")?;
        Ok(())
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let categories = match raw.categories {
            Some(CategoryEntries(entries)) => build_categories(entries)?,
            None => {
                debug!("'Kategorien' missing, using built-in categories");
                defaults.categories
            }
        };

        let default_category = match raw.default_category {
            Some(name) => validate_folder_name(&name, "default category")?,
            None => defaults.default_category,
        };

        let excluded_extensions = match raw.excluded_extensions {
            Some(extensions) => extensions
                .iter()
                .map(|ext| validate_extension(ext))
                .collect::<Result<BTreeSet<_>, _>>()?,
            None => defaults.excluded_extensions,
        };

        let excluded_folders = match raw.excluded_folders {
            Some(folders) => folders
                .iter()
                .map(|name| normalize_folder(name))
                .collect::<Result<BTreeSet<_>, _>>()?,
            None => defaults.excluded_folders,
        };

        Ok(Self {
            categories,
            default_category,
            excluded_extensions,
            excluded_folders,
        })
    }

    fn to_document(&self) -> ConfigDocument<'_> {
        ConfigDocument {
            categories: &self.categories,
            default_category: &self.default_category,
            excluded_extensions: &self.excluded_extensions,
            excluded_folders: &self.excluded_folders,
        }
    }
}

fn build_categories(
    entries: Vec<(String, Vec<String>)>,
) -> Result<IndexMap<String, IndexSet<String>>, ConfigError> {
    let mut categories = IndexMap::with_capacity(entries.len());
    for (name, extensions) in entries {
        let name = validate_folder_name(&name, "category name")?;
        let extensions = extensions
            .iter()
            .map(|ext| validate_extension(ext))
            .collect::<Result<IndexSet<_>, _>>()?;
        if categories.insert(name.clone(), extensions).is_some() {
            return Err(ConfigError::DuplicateCategory(name));
        }
    }
    Ok(categories)
}

/// Normalizes an extension and rejects values that cannot name an extension.
fn validate_extension(raw: &str) -> Result<String, ConfigError> {
    let extension = normalize_extension(raw);
    if extension.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "'{}' is not a valid extension",
            raw
        )));
    }
    if extension.contains(['/', '\\']) {
        return Err(ConfigError::Invalid(format!(
            "extension '{}' must not contain path separators",
            raw
        )));
    }
    // Only the suffix after the last dot is ever looked up.
    if extension[1..].contains('.') {
        return Err(ConfigError::Invalid(format!(
            "extension '{}' must be a single suffix such as '.gz'",
            raw
        )));
    }
    Ok(extension)
}

fn check_normalized(extension: &str) -> Result<(), ConfigError> {
    let normalized = validate_extension(extension)?;
    if normalized != extension {
        return Err(ConfigError::Invalid(format!(
            "extension '{}' is not normalized (expected '{}')",
            extension, normalized
        )));
    }
    Ok(())
}

/// Category names become directory names, so they must be a single path component.
fn validate_folder_name(raw: &str, what: &str) -> Result<String, ConfigError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ConfigError::Invalid(format!("{} must not be empty", what)));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ConfigError::Invalid(format!(
            "{} '{}' must be a plain folder name",
            what, name
        )));
    }
    Ok(name.to_string())
}

fn normalize_folder(raw: &str) -> Result<String, ConfigError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ConfigError::Invalid(
            "excluded folder names must not be empty".to_string(),
        ));
    }
    Ok(name.to_lowercase())
}

/// On-disk shape used for loading; every key is optional.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "Kategorien", default)]
    categories: Option<CategoryEntries>,
    #[serde(rename = "StandardKategorie", default)]
    default_category: Option<String>,
    #[serde(rename = "AusgeschlosseneEndungen", default)]
    excluded_extensions: Option<Vec<String>>,
    #[serde(rename = "AusgeschlosseneOrdner", default)]
    excluded_folders: Option<Vec<String>>,
}

/// On-disk shape used for saving.
#[derive(Serialize)]
struct ConfigDocument<'a> {
    #[serde(rename = "Kategorien")]
    categories: &'a IndexMap<String, IndexSet<String>>,
    #[serde(rename = "StandardKategorie")]
    default_category: &'a str,
    #[serde(rename = "AusgeschlosseneEndungen")]
    excluded_extensions: &'a BTreeSet<String>,
    #[serde(rename = "AusgeschlosseneOrdner")]
    excluded_folders: &'a BTreeSet<String>,
}

/// Category entries in document order, duplicates included, so that
/// validation can reject a category declared twice.
#[derive(Debug)]
struct CategoryEntries(Vec<(String, Vec<String>)>);

impl<'de> Deserialize<'de> for CategoryEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = CategoryEntries;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object mapping category names to extension lists")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Vec<String>>()? {
                    entries.push(entry);
                }
                Ok(CategoryEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Loads and saves a [`SorterConfig`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Picks the configuration file to use.
    ///
    /// Lookup order:
    /// 1. `explicit`, if provided
    /// 2. `sorter_config.json` in the current directory, if it exists
    /// 3. `<config dir>/dateiexperte/sorter_config.json`
    /// 4. `sorter_config.json` in the current directory
    pub fn locate(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::new(path);
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::new(local);
        }

        match dirs::config_dir() {
            Some(dir) => Self::new(dir.join("dateiexperte").join(CONFIG_FILE_NAME)),
            None => Self::new(local),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the configuration.
    ///
    /// A missing file is not an error: the built-in defaults are returned and
    /// written to the path right away. If that write fails the defaults are
    /// still returned.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file exists but cannot be read,
    /// `ConfigError::Parse` for malformed JSON or wrongly typed keys and
    /// `ConfigError::Invalid` (or a duplicate variant) for rule violations.
    pub fn load(&self) -> Result<SorterConfig, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "configuration not found, creating defaults");
                let config = SorterConfig::default();
                if let Err(e) = self.save(&config) {
                    warn!(error = %e, "could not persist default configuration");
                }
                return Ok(config);
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let raw: RawConfig = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: self.path.clone(),
            source: e,
        })?;

        let config = SorterConfig::from_raw(raw)?;
        debug!(
            path = %self.path.display(),
            categories = config.categories.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Validates and writes the configuration as pretty JSON (4-space indent).
    ///
    /// Missing parent directories are created.
    pub fn save(&self, config: &SorterConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let write_error = |source: io::Error| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
        }

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        config
            .to_document()
            .serialize(&mut serializer)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        buffer.push(b'\n');

        fs::write(&self.path, buffer).map_err(write_error)?;
        debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

/// Loads the configuration at `path`. See [`ConfigStore::load`].
pub fn load(path: &Path) -> Result<SorterConfig, ConfigError> {
    ConfigStore::new(path).load()
}

/// Saves the configuration to `path`. See [`ConfigStore::save`].
pub fn save(config: &SorterConfig, path: &Path) -> Result<(), ConfigError> {
    ConfigStore::new(path).save(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = SorterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_category, "_Unsortiert");
        assert_eq!(config.categories.get_index(0).unwrap().0, "Bilder");
        assert!(config.excluded_folders.contains(".git"));
    }

    #[test]
    fn test_load_missing_file_creates_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(CONFIG_FILE_NAME);

        let config = load(&path).unwrap();

        assert_eq!(config, SorterConfig::default());
        assert!(path.exists(), "defaults should be persisted immediately");
        assert_eq!(load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_normalizes_extensions_and_folders() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"{
                "Kategorien": {"Bilder": ["JPG", ".PNG"]},
                "StandardKategorie": "Rest",
                "AusgeschlosseneEndungen": ["TMP"],
                "AusgeschlosseneOrdner": [" Node_Modules "]
            }"#,
        );

        let config = load(&path).unwrap();

        let images: Vec<_> = config.categories["Bilder"].iter().cloned().collect();
        assert_eq!(images, vec![".jpg", ".png"]);
        assert!(config.excluded_extensions.contains(".tmp"));
        assert!(config.excluded_folders.contains("node_modules"));
        assert_eq!(config.default_category, "Rest");
    }

    #[test]
    fn test_missing_keys_fall_back_per_key() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"{"Kategorien": {"Bilder": [".jpg"]}, "Unbekannt": 42}"#,
        );

        let config = load(&path).unwrap();
        let defaults = SorterConfig::default();

        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.default_category, defaults.default_category);
        assert_eq!(config.excluded_extensions, defaults.excluded_extensions);
        assert_eq!(config.excluded_folders, defaults.excluded_folders);
    }

    #[test]
    fn test_wrong_value_type_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, r#"{"Kategorien": [".jpg"]}"#);
        assert!(matches!(load(&path), Err(ConfigError::Parse { .. })));

        let path = write_config(&temp_dir, r#"{"StandardKategorie": 7}"#);
        assert!(matches!(load(&path), Err(ConfigError::Parse { .. })));

        let path = write_config(&temp_dir, r#"[1, 2, 3]"#);
        assert!(matches!(load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_duplicate_category_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"{"Kategorien": {"Bilder": [".jpg"], "Bilder": [".png"]}}"#,
        );

        assert!(matches!(
            load(&path),
            Err(ConfigError::DuplicateCategory(name)) if name == "Bilder"
        ));
    }

    #[test]
    fn test_empty_values_are_rejected() {
        let temp_dir = TempDir::new().unwrap();

        let path = write_config(&temp_dir, r#"{"StandardKategorie": "  "}"#);
        assert!(matches!(load(&path), Err(ConfigError::Invalid(_))));

        let path = write_config(&temp_dir, r#"{"Kategorien": {"Bilder": [""]}}"#);
        assert!(matches!(load(&path), Err(ConfigError::Invalid(_))));

        let path = write_config(&temp_dir, r#"{"Kategorien": {"": [".jpg"]}}"#);
        assert!(matches!(load(&path), Err(ConfigError::Invalid(_))));

        let path = write_config(&temp_dir, r#"{"Kategorien": {"a/b": [".jpg"]}}"#);
        assert!(matches!(load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_multi_part_extension_is_rejected() {
        let temp_dir = TempDir::new().unwrap();

        let path = write_config(&temp_dir, r#"{"Kategorien": {"Archive": ["tar.gz"]}}"#);
        assert!(matches!(load(&path), Err(ConfigError::Invalid(_))));

        let mut config = SorterConfig::default();
        assert!(matches!(
            config.add_extension("Archive", ".tar.gz"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            config.add_excluded_extension("bak.old"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_save_preserves_category_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        let mut config = SorterConfig::default();
        config.categories.clear();
        config.add_category("Zeta").unwrap();
        config.add_category("Alpha").unwrap();
        config.add_extension("Zeta", "z").unwrap();

        save(&config, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.find("Zeta").unwrap() < content.find("Alpha").unwrap());
        assert!(content.contains("\n    \"Kategorien\""));

        let reloaded = load(&path).unwrap();
        let names: Vec<_> = reloaded.categories.keys().cloned().collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_save_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        let mut config = SorterConfig::default();
        config.default_category = String::new();

        assert!(matches!(save(&config, &path), Err(ConfigError::Invalid(_))));
        assert!(!path.exists());

        config.default_category = " Rest ".to_string();
        assert!(matches!(save(&config, &path), Err(ConfigError::Invalid(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_editing_categories() {
        let mut config = SorterConfig::default();

        assert!(matches!(
            config.add_category("Bilder"),
            Err(ConfigError::DuplicateCategory(_))
        ));
        config.add_category("Rohdaten").unwrap();
        assert_eq!(config.add_extension("Rohdaten", "CR2").unwrap(), ".cr2");
        assert!(matches!(
            config.add_extension("Rohdaten", ".cr2"),
            Err(ConfigError::DuplicateExtension { .. })
        ));
        assert!(matches!(
            config.add_extension("Fehlt", ".x"),
            Err(ConfigError::UnknownCategory(_))
        ));

        config.remove_extension("Rohdaten", ".CR2").unwrap();
        assert!(config.categories["Rohdaten"].is_empty());

        let removed = config.remove_category("Musik").unwrap();
        assert!(removed.contains(".mp3"));
        assert!(!config.categories.contains_key("Musik"));
        assert_eq!(config.categories.get_index(1).unwrap().0, "Dokumente");
    }

    #[test]
    fn test_editing_exclusions() {
        let mut config = SorterConfig::default();

        assert_eq!(config.add_excluded_extension("BAK").unwrap(), ".bak");
        assert!(config.is_excluded_extension("bak"));
        assert!(matches!(
            config.add_excluded_extension(".bak"),
            Err(ConfigError::DuplicateExtension { .. })
        ));
        config.remove_excluded_extension(".bak").unwrap();
        assert!(!config.is_excluded_extension(".bak"));

        assert_eq!(config.add_excluded_folder(" Build ").unwrap(), "build");
        assert!(config.excluded_folders.contains("build"));
        config.remove_excluded_folder("build").unwrap();
        assert!(matches!(
            config.remove_excluded_folder("build"),
            Err(ConfigError::UnknownFolder(_))
        ));

        assert!(config.set_default_category("").is_err());
        config.set_default_category("Sonstiges").unwrap();
        assert_eq!(config.default_category, "Sonstiges");
    }
}
