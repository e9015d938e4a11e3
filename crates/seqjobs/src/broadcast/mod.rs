//! Broadcasting of job events to live observers.

pub mod job_events;

pub use job_events::{JobEvent, JobEventBroadcaster};
