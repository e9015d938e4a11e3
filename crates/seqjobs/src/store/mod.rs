//! File-backed persistence for jobs and uploads.

pub mod collection;
pub mod job_store;
pub mod lock;
pub mod upload_store;

pub use collection::{JsonCollection, Record};
pub use job_store::{JobCounts, JobStore};
pub use lock::DataDirLock;
pub use upload_store::UploadStore;
