use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::QueryError;
use crate::job::Job;
use crate::sanitize::is_plain_file_name;

/// One entry in a job's output directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResultFile {
    pub name: String,
    pub size: u64,
    pub modified_time: DateTime<Utc>,
    pub is_dir: bool,
}

/// Entries directly inside `dir`, sorted by name. A missing directory has
/// no entries.
pub fn list_result_files(dir: &Path) -> Result<Vec<ResultFile>, QueryError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| QueryError::Io {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let metadata = entry.metadata().map_err(|e| QueryError::Io {
            path: entry.path().to_path_buf(),
            source: e.into(),
        })?;
        let modified_time = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        files.push(ResultFile {
            name: entry.file_name().to_string_lossy().to_string(),
            size: metadata.len(),
            modified_time,
            is_dir: metadata.is_dir(),
        });
    }
    Ok(files)
}

/// Host path of result `name` for `job`. The name must be a single entry
/// inside the job's output directory.
pub fn resolve_result_file(job: &Job, name: &str) -> Result<PathBuf, QueryError> {
    if !is_plain_file_name(name) {
        return Err(QueryError::InvalidFileName(name.to_string()));
    }

    let path = job.output_dir.join(name);
    if !path.exists() {
        return Err(QueryError::ResultNotFound {
            job_id: job.id.clone(),
            name: name.to_string(),
        });
    }
    Ok(path)
}
