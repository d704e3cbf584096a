//! Progress tracking and job polling for asynchronous bind/unbind operations
//!
//! Mutating calls may answer with a job instead of finishing synchronously.
//! [`poll_job`] waits for such a job at a fixed interval, with optional
//! progress callbacks for UI updates.

use crate::client::{CloudControllerApi, Job, JobRef, JobState};
use crate::error::{CoreError, Result};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default time to wait for a job (5 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default polling interval (2 seconds)
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// How long and how often to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl WaitConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Progress events emitted while waiting on a job
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Waiting has begun
    Started { job: String },
    /// Polling iteration with current state
    Polling {
        job: String,
        state: JobState,
        elapsed: Duration,
    },
    /// Job completed successfully
    Completed { job: String },
    /// Job failed
    Failed { job: String, error: String },
}

/// Callback type for progress updates
///
/// The CLI uses this to drive its spinner.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Poll a job until it reaches a terminal state
///
/// # Arguments
///
/// * `api` - The API to poll through
/// * `job` - The job to wait for
/// * `wait` - Timeout and interval
/// * `on_progress` - Optional callback for progress updates
///
/// # Returns
///
/// The completed job. A failed job yields [`CoreError::JobFailed`] with the
/// remote detail; running out of time yields [`CoreError::Timeout`], which
/// callers must treat as indeterminate since the job may still finish.
///
/// # Example
///
/// ```rust,ignore
/// use drainctl_core::client::AsyncOperation;
/// use drainctl_core::{WaitConfig, poll_job};
///
/// if let AsyncOperation::Job(job) = api.create_binding(&instance_guid, &app_guid).await? {
///     poll_job(&api, &job, &WaitConfig::default(), None).await?;
/// }
/// ```
pub async fn poll_job(
    api: &dyn CloudControllerApi,
    job: &JobRef,
    wait: &WaitConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<Job> {
    let start = Instant::now();

    emit(on_progress, ProgressEvent::Started {
        job: job.guid.clone(),
    });

    loop {
        let elapsed = start.elapsed();
        if elapsed > wait.timeout {
            debug!("Job {} still running after {:?}", job, wait.timeout);
            return Err(CoreError::Timeout {
                job: job.guid.clone(),
                after: wait.timeout,
            });
        }

        let current = api.get_job(job).await?;

        emit(on_progress, ProgressEvent::Polling {
            job: job.guid.clone(),
            state: current.state,
            elapsed,
        });

        match current.state {
            JobState::Complete => {
                debug!("Job {} complete after {:?}", job, start.elapsed());
                emit(on_progress, ProgressEvent::Completed {
                    job: job.guid.clone(),
                });
                return Ok(current);
            }
            JobState::Failed => {
                let error = current.error_detail();
                debug!("Job {} failed: {}", job, error);
                emit(on_progress, ProgressEvent::Failed {
                    job: job.guid.clone(),
                    error: error.clone(),
                });
                return Err(CoreError::JobFailed {
                    job: job.guid.clone(),
                    detail: error,
                });
            }
            JobState::Processing => {
                tokio::time::sleep(wait.interval).await;
            }
        }
    }
}

/// Helper to emit progress events
fn emit(callback: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}
