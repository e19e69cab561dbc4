//! The generation session: one backend, one tracked job.
//!
//! [`GenerationSession`] is the single reconciliation path. Timer-driven
//! polls, manual status checks, result reads and resets all go through
//! it, and only it mutates the [`JobTracker`].
//!
//! Status polls run without holding the tracker lock, so a slow backend
//! never blocks a reset. The poll result is applied afterwards only if the
//! job it was issued for is still current. Result retrieval follows the
//! same rule and serializes on a separate fetch gate, so concurrent readers
//! share one fetch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pokegen_client::{BackendError, BackendHealth, GenerationBackend, HealthState, TaskStatus};
use pokegen_core::artifact::GeneratedImage;
use pokegen_core::job::JobStatus;
use pokegen_core::progress::{ProgressEstimate, DEFAULT_EXPECTED_DURATION};
use pokegen_core::types::JobId;
use tokio::sync::{broadcast, Mutex};

use crate::events::SessionEvent;
use crate::tracker::{JobTracker, TrackerError, Transition};

/// Broadcast channel capacity for session events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Duration the progress estimate treats as 100%.
    pub expected_duration: Duration,
    /// Refuse to submit when the health probe says the backend is down.
    pub preflight_health: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expected_duration: DEFAULT_EXPECTED_DURATION,
            preflight_health: true,
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCheck {
    pub job_id: JobId,
    /// Tracker status after the pass.
    pub status: JobStatus,
    pub transition: Transition,
}

/// Errors surfaced by the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Job {0} is still processing")]
    JobInProgress(JobId),

    #[error("No job has been submitted")]
    NoActiveJob,

    #[error("Job is {0}, no image is available")]
    NotCompleted(JobStatus),

    #[error("Backend is offline")]
    BackendOffline,

    #[error("Backend is not responding correctly (HTTP {status})")]
    BackendUnresponsive { status: u16 },

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A response arrived for a job that is no longer current.
    #[error("Discarded response for superseded job {0}")]
    StaleJob(JobId),

    #[error(transparent)]
    Tracker(TrackerError),
}

impl From<TrackerError> for SessionError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::StaleJob { received, .. } => Self::StaleJob(received),
            other => Self::Tracker(other),
        }
    }
}

impl SessionError {
    /// Actionable text for the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::JobInProgress(_) => {
                "A generation is already in progress. Wait for it to finish or reset it.".into()
            }
            Self::NoActiveJob => "No generation in progress. Submit a prompt first.".into(),
            Self::NotCompleted(status) => format!("The image is not ready yet (job is {status})."),
            Self::BackendOffline => HealthState::Offline.message(),
            Self::BackendUnresponsive { status } => {
                HealthState::Unresponsive { status: *status }.message()
            }
            Self::Backend(BackendError::Connectivity(e)) if e.is_timeout() => {
                "Backend did not respond in time. Check that the backend server is running.".into()
            }
            Self::Backend(BackendError::Connectivity(_)) => HealthState::Offline.message(),
            Self::Backend(BackendError::Server { status, .. }) => {
                format!("Error: Server returned status code {status}")
            }
            Self::Backend(BackendError::Decode(msg)) => {
                format!("Error processing the image: {msg}")
            }
            Self::StaleJob(_) | Self::Tracker(_) => self.to_string(),
        }
    }
}

/// A client session tracking at most one generation job.
pub struct GenerationSession {
    backend: Arc<dyn GenerationBackend>,
    tracker: Mutex<JobTracker>,
    /// Held across a result fetch; never taken while holding `tracker`.
    fetch_gate: Mutex<()>,
    config: SessionConfig,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl GenerationSession {
    /// Start a fresh session with no job.
    pub fn new(backend: Arc<dyn GenerationBackend>, config: SessionConfig) -> Arc<Self> {
        Self::restore(backend, config, JobTracker::new())
    }

    /// Rehydrate a session from a persisted tracker.
    pub fn restore(
        backend: Arc<dyn GenerationBackend>,
        config: SessionConfig,
        tracker: JobTracker,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            backend,
            tracker: Mutex::new(tracker),
            fetch_gate: Mutex::new(()),
            config,
            event_tx,
        })
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Copy of the current tracker, for persistence and rendering.
    pub async fn snapshot(&self) -> JobTracker {
        self.tracker.lock().await.clone()
    }

    pub async fn status(&self) -> JobStatus {
        self.tracker.lock().await.status()
    }

    pub async fn current_job_id(&self) -> Option<JobId> {
        self.tracker.lock().await.job_id().cloned()
    }

    /// Time-based progress estimate for the current job.
    pub async fn progress(&self) -> Option<ProgressEstimate> {
        self.tracker
            .lock()
            .await
            .progress(Utc::now(), self.config.expected_duration)
    }

    pub async fn check_health(&self) -> BackendHealth {
        let health = self.backend.check_health().await;
        tracing::debug!(state = ?health.state(), "Backend health checked");
        health
    }

    /// Submit a prompt as a new job.
    ///
    /// A completed or failed job is discarded (and cleaned up on the
    /// backend) first. A job still processing is never replaced. On any
    /// failure the tracker stays `unsubmitted` with no job id.
    pub async fn submit(&self, prompt: &str) -> Result<JobId, SessionError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::Validation("Please enter a prompt".into()));
        }

        let discarded = {
            let mut tracker = self.tracker.lock().await;
            match tracker.status() {
                JobStatus::Processing => {
                    let id = tracker.job_id().cloned().ok_or(SessionError::NoActiveJob)?;
                    return Err(SessionError::JobInProgress(id));
                }
                status if status.is_terminal() => tracker.reset(),
                _ => None,
            }
        };
        if discarded.is_some() {
            self.release(discarded).await;
        }

        if self.config.preflight_health {
            match self.backend.check_health().await.state() {
                HealthState::Offline => return Err(SessionError::BackendOffline),
                HealthState::Unresponsive { status } => {
                    return Err(SessionError::BackendUnresponsive { status })
                }
                HealthState::ModelLoading => {
                    tracing::warn!("Submitting while the backend model is not loaded yet");
                }
                HealthState::Ready => {}
            }
        }

        let job_id = self.backend.submit_job(prompt).await.map_err(|e| {
            tracing::error!(error = %e, "Job submission failed");
            SessionError::Backend(e)
        })?;

        let recorded = self.tracker.lock().await.record_submission(
            prompt.to_string(),
            job_id.clone(),
            Utc::now(),
        );
        if let Err(e) = recorded {
            // Another submission won the race; do not leak this one.
            tracing::warn!(job_id = %job_id, error = %e, "Discarding orphaned submission");
            self.backend.cleanup(&job_id).await;
            return Err(e.into());
        }

        tracing::info!(job_id = %job_id, "Job processing");
        self.emit(SessionEvent::Submitted {
            job_id: job_id.clone(),
            prompt: prompt.to_string(),
        });
        Ok(job_id)
    }

    /// Poll the backend once and reconcile the answer into the tracker.
    ///
    /// Terminal jobs are reported without a network call. Network and
    /// server errors are returned to the caller, which decides whether
    /// they are transient.
    pub async fn check_status(&self) -> Result<StatusCheck, SessionError> {
        let job_id = {
            let tracker = self.tracker.lock().await;
            let job_id = tracker.job_id().cloned().ok_or(SessionError::NoActiveJob)?;
            if tracker.status() != JobStatus::Processing {
                return Ok(StatusCheck {
                    job_id,
                    status: tracker.status(),
                    transition: Transition::Unchanged,
                });
            }
            job_id
        };

        let reported = match self.backend.poll_status(&job_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Status poll failed");
                self.emit(SessionEvent::PollFailed {
                    job_id: job_id.clone(),
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };

        self.reconcile(job_id, &reported).await
    }

    /// The image for the current job, fetched on first read and cached.
    ///
    /// Concurrent readers queue on the fetch gate, so the backend sees one
    /// fetch per job. The tracker stays unlocked during the download; an
    /// image for a job reset meanwhile is dropped as stale. A failed fetch
    /// leaves the job `completed` so it can be retried.
    pub async fn result(&self) -> Result<GeneratedImage, SessionError> {
        let _gate = self.fetch_gate.lock().await;

        let job_id = {
            let tracker = self.tracker.lock().await;
            if let Some(image) = tracker.cached_result() {
                return Ok(image.clone());
            }
            let job_id = tracker.job_id().cloned().ok_or(SessionError::NoActiveJob)?;
            if tracker.status() != JobStatus::Completed {
                return Err(SessionError::NotCompleted(tracker.status()));
            }
            job_id
        };

        let image = self.backend.fetch_result(&job_id).await.map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Failed to fetch generated image");
            SessionError::Backend(e)
        })?;

        self.tracker
            .lock()
            .await
            .store_result(&job_id, image.clone())
            .inspect_err(|e| tracing::debug!(error = %e, "Dropping fetched image"))?;

        self.emit(SessionEvent::ResultFetched {
            job_id,
            bytes: image.bytes.len(),
        });
        Ok(image)
    }

    /// Clear the session and release the previous job on the backend.
    ///
    /// Returns the discarded job id, if there was one.
    pub async fn reset(&self) -> Option<JobId> {
        let discarded = self.tracker.lock().await.reset();
        self.release(discarded.clone()).await;
        discarded
    }

    // ---- private helpers ----

    async fn reconcile(
        &self,
        job_id: JobId,
        reported: &TaskStatus,
    ) -> Result<StatusCheck, SessionError> {
        let mut tracker = self.tracker.lock().await;
        let transition = tracker
            .apply_status(&job_id, reported, Utc::now())
            .inspect_err(|e| tracing::debug!(error = %e, "Ignoring poll result"))?;

        let status = tracker.status();
        let event = match transition {
            Transition::Unchanged => SessionEvent::StillProcessing {
                job_id: job_id.clone(),
                percent: tracker
                    .progress(Utc::now(), self.config.expected_duration)
                    .map(|p| p.percent())
                    .unwrap_or(0),
            },
            Transition::Completed => {
                tracing::info!(job_id = %job_id, "Job completed");
                SessionEvent::Completed {
                    job_id: job_id.clone(),
                    generation_secs: tracker.job().generation_secs(),
                }
            }
            Transition::Failed => {
                let error = tracker.job().error_message.clone().unwrap_or_default();
                tracing::warn!(job_id = %job_id, error = %error, "Job failed");
                SessionEvent::Failed {
                    job_id: job_id.clone(),
                    error,
                }
            }
        };
        drop(tracker);
        self.emit(event);

        Ok(StatusCheck {
            job_id,
            status,
            transition,
        })
    }

    /// Announce a reset and clean up the discarded job, if any.
    async fn release(&self, discarded: Option<JobId>) {
        self.emit(SessionEvent::Reset {
            job_id: discarded.clone(),
        });
        if let Some(job_id) = discarded {
            tracing::info!(job_id = %job_id, "Releasing backend task");
            self.backend.cleanup(&job_id).await;
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}
