use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

use crate::error::StoreError;

const LOCK_FILE: &str = ".lock";

/// Exclusive advisory lock on a data directory, released on drop.
///
/// Only one orchestrator may own a data directory at a time. The lock is
/// held by an open handle on `<dir>/.lock`, so it also goes away when the
/// owning process dies.
#[derive(Debug)]
pub struct DataDirLock {
    path: PathBuf,
    _file: File,
}

impl DataDirLock {
    /// Takes the lock without waiting. Fails with [`StoreError::Locked`] if
    /// another handle holds it.
    pub fn acquire<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| StoreError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = dir.join(LOCK_FILE);
        let file = open_lock_file(&path)?;
        let acquired = file.try_lock_exclusive().map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        if !acquired {
            return Err(StoreError::Locked {
                path: dir.to_path_buf(),
            });
        }

        log::debug!("Locked data directory {}", dir.display());
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Blocks until the exclusive lock on `path` is held. The lock lasts as long
/// as the returned handle.
pub(crate) fn lock_exclusive(path: &Path) -> Result<File, StoreError> {
    let file = open_lock_file(path)?;
    file.lock_exclusive().map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(file)
}

fn open_lock_file(path: &Path) -> Result<File, StoreError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}
