//! Events emitted by a [`GenerationSession`](crate::session::GenerationSession).
//!
//! Hosts subscribe to these to redraw status without polling the session
//! themselves. Delivery is best effort: a host that falls behind the
//! broadcast buffer misses intermediate events, never the session state.

use pokegen_core::types::JobId;
use serde::Serialize;

/// A state change in the generation session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The backend accepted a prompt and assigned a job id.
    Submitted { job_id: JobId, prompt: String },

    /// A poll reported the job is still running.
    StillProcessing {
        job_id: JobId,
        /// Time-based estimate (0-95).
        percent: u8,
    },

    /// The backend reported the job finished successfully.
    Completed {
        job_id: JobId,
        generation_secs: Option<i64>,
    },

    /// The backend reported the job failed.
    Failed { job_id: JobId, error: String },

    /// The image for a completed job was fetched and cached.
    ResultFetched { job_id: JobId, bytes: usize },

    /// A poll could not be completed; it will be retried.
    PollFailed { job_id: JobId, error: String },

    /// The session was reset. `job_id` is the discarded job, if any.
    Reset { job_id: Option<JobId> },
}

impl SessionEvent {
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Submitted { job_id, .. }
            | Self::StillProcessing { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::ResultFetched { job_id, .. }
            | Self::PollFailed { job_id, .. } => Some(job_id),
            Self::Reset { job_id } => job_id.as_ref(),
        }
    }
}
