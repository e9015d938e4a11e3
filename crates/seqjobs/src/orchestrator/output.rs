//! Job output directory allocation.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::SubmitError;
use crate::job::output_dir_name;

const WRITE_TEST_PREFIX: &str = ".write_test_";

/// Resolves `root` and checks that it is a writable directory.
///
/// The check creates and removes `.write_test_<job_id>`. Existing files are
/// never overwritten.
pub fn check_output_root(root: &Path, job_id: &str) -> Result<PathBuf, SubmitError> {
    let unwritable = |reason: String| SubmitError::OutputUnwritable {
        path: root.to_path_buf(),
        reason,
    };

    let canonical = root
        .canonicalize()
        .map_err(|e| unwritable(format!("cannot resolve path: {}", e)))?;
    if !canonical.is_dir() {
        return Err(unwritable("not a directory".to_string()));
    }

    let marker = write_test_path(&canonical, job_id);
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&marker)
        .map_err(|e| unwritable(format!("not writable: {}", e)))?;
    if let Err(e) = fs::remove_file(&marker) {
        log::warn!("Failed to remove {}: {}", marker.display(), e);
    }

    Ok(canonical)
}

fn write_test_path(root: &Path, job_id: &str) -> PathBuf {
    root.join(format!("{}{}", WRITE_TEST_PREFIX, job_id))
}

/// Creates `<root>/<ANALYST>_job_<id>`. Fails if the directory already exists.
pub fn create_job_dir(root: &Path, analyst_name: &str, job_id: &str) -> Result<PathBuf, SubmitError> {
    let dir = root.join(output_dir_name(analyst_name, job_id));
    match fs::create_dir(&dir) {
        Ok(()) => {
            log::debug!("Created job output directory {}", dir.display());
            Ok(dir)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(SubmitError::OutputCollision(dir)),
        Err(e) => Err(SubmitError::OutputUnwritable {
            path: dir,
            reason: e.to_string(),
        }),
    }
}
