//! Job state machine.
//!
//! ```text
//! unsubmitted --submit--> processing --poll: completed--> completed
//!                                    \--poll: failed-----> failed
//! any state --reset--> unsubmitted
//! ```
//!
//! [`JobTracker`] performs no I/O. Every mutation checks that the caller
//! is talking about the current job, so a response that arrives after a
//! reset (or after a new submission) is rejected instead of applied.

use std::time::Duration;

use pokegen_client::TaskStatus;
use pokegen_core::artifact::GeneratedImage;
use pokegen_core::job::{Job, JobStatus};
use pokegen_core::progress::{elapsed_since, ProgressEstimate};
use pokegen_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};

/// Error message recorded when the backend reports failure without a reason.
pub const GENERIC_FAILURE_MESSAGE: &str = "Generation failed on the backend";

/// Outcome of applying a poll result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No state change (still processing, unknown status, or already terminal).
    Unchanged,
    Completed,
    Failed,
}

/// Errors from the job state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// A response arrived for a job that is no longer current.
    #[error("Stale response for job {received} (current: {})", describe_current(.current))]
    StaleJob {
        current: Option<JobId>,
        received: JobId,
    },

    /// The requested transition is not allowed from the current status.
    #[error("Cannot {action} while job is {from}")]
    InvalidTransition { from: JobStatus, action: &'static str },
}

fn describe_current(current: &Option<JobId>) -> &str {
    current.as_ref().map(JobId::as_str).unwrap_or("none")
}

/// Owner of the single active [`Job`].
///
/// Serializable so the host can persist and rehydrate it between
/// interactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobTracker {
    job: Job,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn status(&self) -> JobStatus {
        self.job.status
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job.job_id.as_ref()
    }

    pub fn cached_result(&self) -> Option<&GeneratedImage> {
        self.job.result.as_ref()
    }

    /// `unsubmitted -> processing` after the backend accepted a prompt.
    pub fn record_submission(
        &mut self,
        prompt: String,
        job_id: JobId,
        now: Timestamp,
    ) -> Result<(), TrackerError> {
        if self.job.status != JobStatus::Unsubmitted {
            return Err(TrackerError::InvalidTransition {
                from: self.job.status,
                action: "record a submission",
            });
        }

        self.job = Job {
            job_id: Some(job_id),
            status: JobStatus::Processing,
            prompt: Some(prompt),
            submitted_at: Some(now),
            ..Job::default()
        };
        Ok(())
    }

    /// Reconcile a status reported by the backend for `job_id`.
    pub fn apply_status(
        &mut self,
        job_id: &JobId,
        status: &TaskStatus,
        now: Timestamp,
    ) -> Result<Transition, TrackerError> {
        self.ensure_current(job_id)?;

        if self.job.status != JobStatus::Processing {
            return Ok(Transition::Unchanged);
        }

        match status {
            TaskStatus::Processing | TaskStatus::Unknown(_) => Ok(Transition::Unchanged),
            TaskStatus::Completed => {
                self.job.status = JobStatus::Completed;
                self.job.finished_at = Some(now);
                Ok(Transition::Completed)
            }
            TaskStatus::Failed { error } => {
                self.job.status = JobStatus::Failed;
                self.job.finished_at = Some(now);
                self.job.error_message = Some(
                    error
                        .clone()
                        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
                );
                Ok(Transition::Failed)
            }
        }
    }

    /// Cache the fetched image for a completed job.
    ///
    /// Returns `false` when an image was already cached; the first one wins.
    pub fn store_result(
        &mut self,
        job_id: &JobId,
        image: GeneratedImage,
    ) -> Result<bool, TrackerError> {
        self.ensure_current(job_id)?;

        if self.job.status != JobStatus::Completed {
            return Err(TrackerError::InvalidTransition {
                from: self.job.status,
                action: "store a result",
            });
        }
        if self.job.result.is_some() {
            return Ok(false);
        }

        self.job.result = Some(image);
        Ok(true)
    }

    /// Return to `unsubmitted`, clearing every field.
    ///
    /// Yields the previous job id so the caller can release backend
    /// resources for it.
    pub fn reset(&mut self) -> Option<JobId> {
        std::mem::take(&mut self.job).job_id
    }

    /// Time-based progress estimate.
    ///
    /// `None` unless the job has been submitted. A failed job reports the
    /// estimate frozen at the moment it failed.
    pub fn progress(&self, now: Timestamp, expected: Duration) -> Option<ProgressEstimate> {
        let submitted_at = self.job.submitted_at?;
        let end = self.job.finished_at.unwrap_or(now);
        let elapsed = elapsed_since(end - submitted_at);

        match self.job.status {
            JobStatus::Unsubmitted => None,
            JobStatus::Processing | JobStatus::Failed => {
                Some(ProgressEstimate::running(elapsed, expected))
            }
            JobStatus::Completed => Some(ProgressEstimate::finished(elapsed)),
        }
    }

    fn ensure_current(&self, job_id: &JobId) -> Result<(), TrackerError> {
        if self.job.job_id.as_ref() == Some(job_id) {
            Ok(())
        } else {
            Err(TrackerError::StaleJob {
                current: self.job.job_id.clone(),
                received: job_id.clone(),
            })
        }
    }
}
