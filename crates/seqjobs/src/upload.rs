//! Upload records: input files accepted for analysis.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Sequence file suffixes accepted by default.
pub const DEFAULT_SEQUENCE_EXTENSIONS: &[&str] = &[".fastq", ".fasta", ".fq", ".fa", ".gz"];

/// An accepted input file. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: String,
    pub original_name: String,
    #[serde(alias = "filename")]
    pub stored_name: String,
    pub size: u64,
    pub upload_time: DateTime<Utc>,
    #[serde(alias = "path")]
    pub source_path: PathBuf,
    #[serde(default)]
    pub is_system_file: bool,
}

impl UploadRecord {
    /// Record for a file already written to upload storage by the transport layer.
    pub fn from_stored(original_name: &str, stored_path: PathBuf, size: u64) -> Self {
        let stored_name = stored_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| original_name.to_string());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            original_name: original_name.to_string(),
            stored_name,
            size,
            upload_time: Utc::now(),
            source_path: stored_path,
            is_system_file: false,
        }
    }

    /// Record for a file selected in place on the local filesystem.
    ///
    /// The file must exist, must not be a directory, and its name must end
    /// with one of `allowed_extensions` (case-insensitive).
    pub fn from_local_file<P: AsRef<Path>>(
        path: P,
        allowed_extensions: &[String],
    ) -> Result<Self, UploadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(UploadError::NotFound(path.to_path_buf()));
        }

        let metadata = std::fs::metadata(path).map_err(|e| UploadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if metadata.is_dir() {
            return Err(UploadError::IsDirectory(path.to_path_buf()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !has_allowed_extension(&name, allowed_extensions) {
            return Err(UploadError::UnsupportedFormat {
                name,
                allowed: allowed_extensions.to_vec(),
            });
        }

        let source_path = std::path::absolute(path).map_err(|e| UploadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            original_name: name.clone(),
            stored_name: name,
            size: metadata.len(),
            upload_time: Utc::now(),
            source_path,
            is_system_file: true,
        })
    }

    /// Directory containing the input file.
    pub fn parent_dir(&self) -> Option<&Path> {
        self.source_path.parent()
    }
}

fn has_allowed_extension(name: &str, allowed: &[String]) -> bool {
    let lower = name.to_lowercase();
    allowed.iter().any(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Default accepted suffixes as owned strings.
pub fn default_extensions() -> Vec<String> {
    DEFAULT_SEQUENCE_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}
