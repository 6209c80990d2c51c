use std::{
    any::Any,
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::ProgressSink;

/// Unique identifier of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self { Self(Uuid::new_v4()) }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Self(s.parse()?)) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs never change again.
    #[inline]
    pub fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Failed) }
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    pub progress: f64,
    pub message: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

type SharedJob = Arc<Mutex<Job>>;

fn lock(job: &SharedJob) -> MutexGuard<'_, Job> {
    job.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of background jobs, each running on its own thread.
///
/// Cloning shares the registry. Jobs are never removed.
#[derive(Debug, Clone, Default)]
pub struct JobRunner {
    jobs: Arc<RwLock<HashMap<JobId, SharedJob>>>,
}

impl JobRunner {
    pub fn new() -> Self { Self::default() }

    /// Register a job as running and execute `operation` on a new thread.
    ///
    /// The operation's return value becomes the job's JSON `result`; an error
    /// or panic marks the job failed with a description in `error`.
    pub fn create_job<F, T>(&self, name: &str, operation: F) -> JobHandle
    where
        F: FnOnce(&dyn ProgressSink) -> Result<T> + Send + 'static,
        T: Serialize,
    {
        let id = JobId::new();
        let job = Arc::new(Mutex::new(Job {
            id,
            name: name.to_string(),
            status: JobStatus::Running,
            progress: 0.0,
            message: String::new(),
            result: None,
            error: None,
        }));
        self.jobs.write().unwrap_or_else(PoisonError::into_inner).insert(id, job.clone());
        info!(job = %id, name, "creating job");

        let progress = JobProgress { job: job.clone() };
        let spawned = thread::Builder::new()
            .name(format!("job-{name}"))
            .spawn(move || run_job(progress, operation));

        let thread = match spawned {
            Ok(thread) => Some(thread),
            Err(err) => {
                finish(&job, Err(anyhow::Error::new(err).context("Failed to spawn job thread")));
                None
            }
        };
        JobHandle { id, job, thread }
    }

    /// Snapshot of a job, `None` for an unknown id.
    pub fn get_job(&self, id: JobId) -> Option<Job> {
        let job = self.jobs.read().unwrap_or_else(PoisonError::into_inner).get(&id).cloned()?;
        let snapshot = lock(&job).clone();
        Some(snapshot)
    }
}

/// Handle returned by [`JobRunner::create_job`].
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    job: SharedJob,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    #[inline] pub fn id(&self) -> JobId { self.id }

    /// Current state of the job.
    pub fn snapshot(&self) -> Job { lock(&self.job).clone() }

    /// Block until the job's thread exits and return its final state.
    pub fn wait(mut self) -> Job {
        if let Some(thread) = self.thread.take() {
            // The job body catches panics itself, so join only fails if the bookkeeping did.
            let _ = thread.join();
        }
        self.snapshot()
    }
}

/// Progress sink bound to one job. Reports never lower the fraction and are
/// ignored once the job is terminal.
struct JobProgress {
    job: SharedJob,
}

impl ProgressSink for JobProgress {
    fn report(&self, fraction: f64, message: &str) {
        let mut job = lock(&self.job);
        if job.status.is_terminal() {
            return;
        }
        job.progress = job.progress.max(fraction.clamp(0.0, 1.0));
        job.message = message.to_string();
    }
}

fn run_job<F, T>(progress: JobProgress, operation: F)
where
    F: FnOnce(&dyn ProgressSink) -> Result<T>,
    T: Serialize,
{
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| operation(&progress))) {
        Ok(Ok(value)) => serde_json::to_value(value).context("Failed to serialize job result"),
        Ok(Err(err)) => Err(err),
        Err(payload) => Err(anyhow!("job panicked: {}", panic_message(payload.as_ref()))),
    };
    finish(&progress.job, outcome);
}

fn finish(job: &SharedJob, outcome: Result<Value>) {
    let mut job = lock(job);
    match outcome {
        Ok(value) => {
            job.status = JobStatus::Completed;
            job.progress = 1.0;
            job.message = "Done".to_string();
            job.result = Some(value);
            info!(job = %job.id, name = %job.name, "job completed");
        }
        Err(err) => {
            job.status = JobStatus::Failed;
            job.message = "Failed".to_string();
            job.error = Some(format!("{err:#}"));
            warn!(job = %job.id, name = %job.name, error = %format!("{err:#}"), "job failed");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
