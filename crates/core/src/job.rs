//! The generation job data model.
//!
//! A [`Job`] is one user-submitted prompt tracked from submission to a
//! terminal status. Only the state machine in `pokegen-session` mutates
//! it; this module defines the shape and the read-side helpers.

use serde::{Deserialize, Serialize};

use crate::artifact::GeneratedImage;
use crate::types::{JobId, Timestamp};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Unsubmitted,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unsubmitted => "unsubmitted",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation request and everything known about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Backend task id. `None` until submission succeeds.
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    /// Prompt sent to the backend. Immutable once submitted.
    pub prompt: Option<String>,
    pub submitted_at: Option<Timestamp>,
    /// When a terminal status was first observed.
    pub finished_at: Option<Timestamp>,
    /// Cached image, only ever set while `completed`.
    pub result: Option<GeneratedImage>,
    /// Failure reason, only ever set while `failed`.
    pub error_message: Option<String>,
}

impl Job {
    /// Seconds between submission and the terminal transition.
    pub fn generation_secs(&self) -> Option<i64> {
        match (self.submitted_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds().max(0)),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == JobStatus::Processing
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Unsubmitted.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn default_job_is_unsubmitted_and_empty() {
        let job = Job::default();
        assert_eq!(job.status, JobStatus::Unsubmitted);
        assert!(job.job_id.is_none());
        assert!(job.prompt.is_none());
        assert!(job.result.is_none());
    }

    #[test]
    fn generation_secs_from_timestamps() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let job = Job {
            submitted_at: Some(start),
            finished_at: Some(start + Duration::seconds(412)),
            ..Default::default()
        };
        assert_eq!(job.generation_secs(), Some(412));
    }

    #[test]
    fn generation_secs_absent_while_running() {
        let job = Job {
            submitted_at: Some(Utc::now()),
            status: JobStatus::Processing,
            ..Default::default()
        };
        assert_eq!(job.generation_secs(), None);
        assert!(job.is_active());
    }
}
