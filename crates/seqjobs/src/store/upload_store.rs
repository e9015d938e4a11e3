use std::path::Path;

use super::collection::{JsonCollection, Record};
use crate::error::StoreError;
use crate::upload::UploadRecord;

impl Record for UploadRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Upload history backed by `uploads.json`. Records are append-only.
pub struct UploadStore {
    uploads: JsonCollection<UploadRecord>,
}

impl UploadStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self {
            uploads: JsonCollection::open(path)?,
        })
    }

    pub fn record(&self, upload: UploadRecord) -> Result<UploadRecord, StoreError> {
        self.uploads.insert(upload.clone())?;
        log::info!(
            "Recorded upload {} ({}, {} bytes)",
            upload.id,
            upload.original_name,
            upload.size
        );
        Ok(upload)
    }

    pub fn find(&self, id: &str) -> Result<Option<UploadRecord>, StoreError> {
        self.uploads.find(id)
    }

    /// All uploads, most recent first.
    pub fn list_all(&self) -> Result<Vec<UploadRecord>, StoreError> {
        self.uploads.list_all()
    }
}
