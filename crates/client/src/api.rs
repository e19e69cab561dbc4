//! HTTP client for the generation backend.
//!
//! Every call carries its own short timeout. Submission returns as soon
//! as the backend has assigned a task id; the minutes-long generation is
//! observed through status polls, never through a long-held request.

use std::time::Duration;

use async_trait::async_trait;
use pokegen_core::address::BackendAddress;
use pokegen_core::artifact::GeneratedImage;
use pokegen_core::types::JobId;

use crate::backend::{BackendHealth, GenerationBackend};
use crate::messages::{
    HealthResponse, ImageResponse, StartGenerationRequest, StartGenerationResponse, TaskStatus,
    TaskStatusResponse,
};

/// Per-endpoint request timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiTimeouts {
    pub health: Duration,
    pub submit: Duration,
    pub status: Duration,
    pub fetch: Duration,
    pub cleanup: Duration,
}

impl Default for ApiTimeouts {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(10),
            submit: Duration::from_secs(20),
            status: Duration::from_secs(10),
            fetch: Duration::from_secs(60),
            cleanup: Duration::from_secs(10),
        }
    }
}

/// HTTP client for a single generation backend.
pub struct BackendApi {
    client: reqwest::Client,
    address: BackendAddress,
    timeouts: ApiTimeouts,
}

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or did not answer in time.
    #[error("Backend unreachable: {0}")]
    Connectivity(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status code.
    #[error("Backend error ({status}): {body}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Malformed backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Connectivity(e) if e.is_timeout())
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

impl BackendApi {
    /// Create a client with default timeouts.
    pub fn new(address: BackendAddress) -> Self {
        Self::with_timeouts(address, ApiTimeouts::default())
    }

    pub fn with_timeouts(address: BackendAddress, timeouts: ApiTimeouts) -> Self {
        Self {
            client: reqwest::Client::new(),
            address,
            timeouts,
        }
    }

    /// Probe `GET /health`.
    ///
    /// Any network failure is reported as offline; a non-200 answer as
    /// offline with its status code; a 200 without the `"loaded"` marker
    /// as online with the model not yet loaded.
    pub async fn check_health(&self) -> BackendHealth {
        let response = match self
            .client
            .get(self.address.endpoint("/health"))
            .timeout(self.timeouts.health)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(backend = %self.address, error = %e, "Health check failed");
                return BackendHealth::offline();
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::debug!(
                backend = %self.address,
                status = status.as_u16(),
                "Health check non-200",
            );
            return BackendHealth {
                online: false,
                model_loaded: false,
                status_code: Some(status.as_u16()),
            };
        }

        let model_loaded = match response.text().await {
            Ok(text) => serde_json::from_str::<HealthResponse>(&text)
                .map(|h| h.model_loaded())
                .unwrap_or(false),
            Err(_) => false,
        };

        BackendHealth {
            online: true,
            model_loaded,
            status_code: Some(status.as_u16()),
        }
    }

    /// Start a generation job via `POST /start-generation`.
    pub async fn submit_job(&self, prompt: &str) -> Result<JobId, BackendError> {
        let response = self
            .client
            .post(self.address.endpoint("/start-generation"))
            .json(&StartGenerationRequest { prompt })
            .timeout(self.timeouts.submit)
            .send()
            .await?;

        let body: StartGenerationResponse = Self::parse_response(response).await?;
        if body.task_id.trim().is_empty() {
            return Err(BackendError::Decode("backend returned an empty task_id".into()));
        }

        tracing::info!(
            backend = %self.address,
            task_id = %body.task_id,
            "Generation job submitted",
        );
        Ok(JobId::new(body.task_id))
    }

    /// Read job status via `GET /task-status/{task_id}`.
    pub async fn poll_status(&self, job_id: &JobId) -> Result<TaskStatus, BackendError> {
        let response = self
            .client
            .get(self.address.endpoint(&format!("/task-status/{job_id}")))
            .timeout(self.timeouts.status)
            .send()
            .await?;

        let body: TaskStatusResponse = Self::parse_response(response).await?;
        let status = TaskStatus::from(body);
        tracing::debug!(task_id = %job_id, ?status, "Polled task status");
        Ok(status)
    }

    /// Retrieve and decode the finished image via `GET /get-image/{task_id}`.
    pub async fn fetch_result(&self, job_id: &JobId) -> Result<GeneratedImage, BackendError> {
        let response = self
            .client
            .get(self.address.endpoint(&format!("/get-image/{job_id}")))
            .timeout(self.timeouts.fetch)
            .send()
            .await?;

        let body: ImageResponse = Self::parse_response(response).await?;
        let image = GeneratedImage::from_base64(&body.image, body.prompt)
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        tracing::info!(task_id = %job_id, bytes = image.bytes.len(), "Fetched generated image");
        Ok(image)
    }

    /// Release server-side resources via `DELETE /cleanup-task/{task_id}`.
    ///
    /// Best effort: every failure is logged and dropped.
    pub async fn cleanup(&self, job_id: &JobId) {
        let result = self
            .client
            .delete(self.address.endpoint(&format!("/cleanup-task/{job_id}")))
            .timeout(self.timeouts.cleanup)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(task_id = %job_id, "Cleaned up backend task");
            }
            Ok(response) => {
                tracing::warn!(
                    task_id = %job_id,
                    status = response.status().as_u16(),
                    "Cleanup rejected",
                );
            }
            Err(e) => {
                tracing::warn!(task_id = %job_id, error = %e, "Cleanup request failed");
            }
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, or return a
    /// [`BackendError::Server`] with the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    ///
    /// The body is read as text first so malformed JSON surfaces as
    /// [`BackendError::Decode`] rather than a transport error.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GenerationBackend for BackendApi {
    async fn check_health(&self) -> BackendHealth {
        BackendApi::check_health(self).await
    }

    async fn submit_job(&self, prompt: &str) -> Result<JobId, BackendError> {
        BackendApi::submit_job(self, prompt).await
    }

    async fn poll_status(&self, job_id: &JobId) -> Result<TaskStatus, BackendError> {
        BackendApi::poll_status(self, job_id).await
    }

    async fn fetch_result(&self, job_id: &JobId) -> Result<GeneratedImage, BackendError> {
        BackendApi::fetch_result(self, job_id).await
    }

    async fn cleanup(&self, job_id: &JobId) {
        BackendApi::cleanup(self, job_id).await
    }
}
