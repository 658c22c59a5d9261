//! Details about a single file: size, timestamps, detected type and where a
//! sort run would put it.

use crate::config::SorterConfig;
use crate::file_category::{Classifier, extension_of, target_folder};
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const NOT_AVAILABLE: &str = "N/A";

/// A snapshot of one file's metadata.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: String,
    pub path: PathBuf,
    pub directory: PathBuf,
    pub size_bytes: u64,
    pub created: Option<DateTime<Local>>,
    pub modified: Option<DateTime<Local>>,
    pub accessed: Option<DateTime<Local>>,
    /// Normalized extension, `None` if the name has none.
    pub extension: Option<String>,
    /// MIME type sniffed from the file's content.
    pub mime_type: Option<String>,
    pub category: String,
    /// Folder relative to the destination root that would receive the file.
    pub target_folder: PathBuf,
}

impl FileInfo {
    /// Reads the metadata of `path` and classifies it with `config`.
    ///
    /// Fails only if the file's metadata cannot be read; an undetectable
    /// content type or a missing timestamp just leaves that field empty.
    pub fn gather(path: &Path, config: &SorterConfig) -> io::Result<Self> {
        let path = std::path::absolute(path)?;
        let metadata = fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }

        let extension = extension_of(&path);
        let category = Classifier::new(config).category_for(&extension).to_string();
        let mime_type = infer::get_from_path(&path)
            .ok()
            .flatten()
            .map(|kind| kind.mime_type().to_string());

        Ok(Self {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            size_bytes: metadata.len(),
            created: local_time(metadata.created()),
            modified: local_time(metadata.modified()),
            accessed: local_time(metadata.accessed()),
            target_folder: target_folder(&category, &extension),
            extension: (!extension.is_empty()).then_some(extension),
            mime_type,
            category,
            path,
        })
    }

    /// Label/value pairs in display order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Name", self.name.clone()),
            ("Path", self.path.display().to_string()),
            ("Directory", self.directory.display().to_string()),
            (
                "Size",
                format!("{} ({} bytes)", format_size(self.size_bytes), self.size_bytes),
            ),
            ("Created", format_time(self.created)),
            ("Modified", format_time(self.modified)),
            ("Accessed", format_time(self.accessed)),
            (
                "Extension",
                self.extension.clone().unwrap_or_else(|| "(none)".to_string()),
            ),
            (
                "MIME type",
                self.mime_type.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ),
            ("Category", self.category.clone()),
            ("Target folder", self.target_folder.display().to_string()),
        ]
    }
}

/// Formats a byte count with binary units, e.g. `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

fn local_time(time: io::Result<SystemTime>) -> Option<DateTime<Local>> {
    time.ok().map(DateTime::<Local>::from)
}

fn format_time(time: Option<DateTime<Local>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
