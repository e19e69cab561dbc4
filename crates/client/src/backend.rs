//! The backend trait seam and health classification.

use async_trait::async_trait;
use pokegen_core::artifact::GeneratedImage;
use pokegen_core::types::JobId;

use crate::api::BackendError;
use crate::messages::TaskStatus;

/// Operations the session layer needs from a generation backend.
///
/// [`BackendApi`](crate::api::BackendApi) is the HTTP implementation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Probe reachability and model readiness. Never fails.
    async fn check_health(&self) -> BackendHealth;

    /// Start a generation job and return its task id immediately.
    async fn submit_job(&self, prompt: &str) -> Result<JobId, BackendError>;

    /// Read the current status of a job.
    async fn poll_status(&self, job_id: &JobId) -> Result<TaskStatus, BackendError>;

    /// Retrieve the finished image. Only valid once the job completed.
    async fn fetch_result(&self, job_id: &JobId) -> Result<GeneratedImage, BackendError>;

    /// Ask the backend to release resources for a job. Failures are swallowed.
    async fn cleanup(&self, job_id: &JobId);
}

/// Result of a health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendHealth {
    /// `true` only for a 200 response.
    pub online: bool,
    pub model_loaded: bool,
    /// HTTP status when the backend answered at all.
    pub status_code: Option<u16>,
}

impl BackendHealth {
    pub fn offline() -> Self {
        Self {
            online: false,
            model_loaded: false,
            status_code: None,
        }
    }

    pub fn state(&self) -> HealthState {
        match (self.online, self.model_loaded, self.status_code) {
            (true, true, _) => HealthState::Ready,
            (true, false, _) => HealthState::ModelLoading,
            (false, _, Some(status)) => HealthState::Unresponsive { status },
            (false, _, None) => HealthState::Offline,
        }
    }
}

/// Health as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Ready,
    ModelLoading,
    /// Reachable but answered with a non-200 status.
    Unresponsive { status: u16 },
    Offline,
}

impl HealthState {
    pub fn message(self) -> String {
        match self {
            Self::Ready => "Backend is online and model is loaded".to_string(),
            Self::ModelLoading => "Backend is online but model is not loaded yet".to_string(),
            Self::Unresponsive { status } => {
                format!("Backend is online but not responding correctly (HTTP {status})")
            }
            Self::Offline => "Backend is offline. Please start the backend server.".to_string(),
        }
    }
}
