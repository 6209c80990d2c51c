//! Background jobs with poll-based status and progress reporting.
mod progress;
mod runner;

pub use progress::{NoProgress, ProgressSink, ScaledProgress};
pub use runner::{Job, JobHandle, JobId, JobRunner, JobStatus};
