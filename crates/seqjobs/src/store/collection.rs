use std::fs::{self, File};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::lock;
use crate::error::StoreError;

/// A persisted record with a stable identifier.
pub trait Record: Serialize + DeserializeOwned + Clone + Send {
    fn id(&self) -> &str;
}

/// An ordered collection of records kept in one JSON array file.
///
/// Every operation re-reads the file and every mutation rewrites it through a
/// temporary file and rename, all while holding the collection lock. Mutations
/// also hold an advisory lock on `<file>.lock` so writers in other processes
/// cannot interleave. Records are stored in insertion order.
pub struct JsonCollection<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> JsonCollection<T> {
    /// Opens the collection at `path`, creating its parent directory.
    ///
    /// A missing file is an empty collection. An existing file that does not
    /// parse fails with [`StoreError::Corrupt`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let collection = Self {
            path,
            lock: Mutex::new(()),
            _record: PhantomData,
        };
        let count = collection.load()?.len();
        log::debug!(
            "Opened {} with {} records",
            collection.path.display(),
            count
        );
        Ok(collection)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| {
            log::warn!("Store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// The in-process guard plus the cross-process lock for one
    /// read-modify-write cycle.
    fn write_guard(&self) -> Result<(MutexGuard<'_, ()>, File), StoreError> {
        let guard = self.guard();
        let file = lock::lock_exclusive(&self.lock_path())?;
        Ok((guard, file))
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn load(&self) -> Result<Vec<T>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            source: e,
        })
    }

    fn save(&self, records: &[T]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, json).map_err(|e| StoreError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    pub fn insert(&self, record: T) -> Result<(), StoreError> {
        let _guard = self.write_guard()?;
        let mut records = self.load()?;
        if records.iter().any(|r| r.id() == record.id()) {
            return Err(StoreError::DuplicateId(record.id().to_string()));
        }
        records.push(record);
        self.save(&records)
    }

    pub fn find(&self, id: &str) -> Result<Option<T>, StoreError> {
        let _guard = self.guard();
        Ok(self.load()?.into_iter().find(|r| r.id() == id))
    }

    /// All records, most recently inserted first.
    pub fn list_all(&self) -> Result<Vec<T>, StoreError> {
        let _guard = self.guard();
        let mut records = self.load()?;
        records.reverse();
        Ok(records)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let _guard = self.guard();
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Applies `mutate` to the record with `id` and persists the result.
    /// Nothing is written if `mutate` fails.
    pub fn update<F>(&self, id: &str, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut T) -> Result<(), StoreError>,
    {
        let _guard = self.write_guard()?;
        let mut records = self.load()?;
        let record = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        mutate(record)?;
        let updated = record.clone();
        self.save(&records)?;
        Ok(updated)
    }

    /// Applies `mutate` to every record in one locked cycle. Returns the
    /// records for which `mutate` reported a change.
    pub fn update_where<F>(&self, mut mutate: F) -> Result<Vec<T>, StoreError>
    where
        F: FnMut(&mut T) -> Result<bool, StoreError>,
    {
        let _guard = self.write_guard()?;
        let mut records = self.load()?;
        let mut changed = Vec::new();
        for record in records.iter_mut() {
            if mutate(record)? {
                changed.push(record.clone());
            }
        }

        if !changed.is_empty() {
            self.save(&records)?;
        }
        Ok(changed)
    }

    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_guard()?;
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records)?;
        Ok(true)
    }
}
