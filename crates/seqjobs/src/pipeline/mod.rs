//! External pipeline execution.

pub mod command;
pub mod invoker;

pub use command::{metontiime_command, MetontiimeRun, PipelineCommand};
pub use invoker::{list_output_entries, PipelineInvoker, PipelineRun};
