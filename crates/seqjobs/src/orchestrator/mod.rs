//! Job submission, execution, and history queries.

pub mod output;
pub mod request;
pub mod results;
pub mod service;
pub mod worker;

pub use request::{RunRequest, SubmitReceipt};
pub use results::ResultFile;
pub use service::Orchestrator;
pub use worker::{WorkItem, WorkerMessage, WorkerPool};
