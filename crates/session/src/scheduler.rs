//! Periodic status polling for the active job.
//!
//! [`PollScheduler::start`] spawns one task for the job that is processing
//! right now. The task wakes on a fixed interval or on a manual trigger
//! from [`PollHandle::check_now`]; either way it runs the same
//! [`GenerationSession::check_status`] pass, so polls are never concurrent.
//!
//! The task stops itself when the job reaches a terminal status, when the
//! session is reset, or when a newer job replaces the one it watches.
//! There is no deadline: a job that keeps reporting `processing` is polled
//! until one of those happens or the handle is stopped.

use std::sync::Arc;
use std::time::Duration;

use pokegen_core::job::JobStatus;
use pokegen_core::types::JobId;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::SessionEvent;
use crate::session::{GenerationSession, SessionError};

/// Default time between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// How long [`PollHandle::stop`] waits for the task to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a poll task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job reached `completed` or `failed`.
    Finished { job_id: JobId, status: JobStatus },
    /// The session was reset or the job was replaced.
    Superseded,
    /// The handle was stopped.
    Cancelled,
}

/// Spawns poll tasks with a fixed interval.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    interval: Duration,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Start polling the session's current job.
    ///
    /// The first timed poll happens one interval after start; use
    /// [`PollHandle::check_now`] for an immediate one.
    pub fn start(&self, session: Arc<GenerationSession>) -> PollHandle {
        let cancel = CancellationToken::new();
        let trigger = Arc::new(Notify::new());
        let interval = self.interval;

        let task = tokio::spawn(poll_loop(
            session,
            interval,
            cancel.clone(),
            Arc::clone(&trigger),
        ));

        PollHandle {
            cancel,
            trigger,
            task,
        }
    }
}

/// Control handle for a running poll task.
pub struct PollHandle {
    cancel: CancellationToken,
    trigger: Arc<Notify>,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Request an immediate status check.
    ///
    /// Requests made while a check is running coalesce into one more check.
    pub fn check_now(&self) {
        self.trigger.notify_one();
    }

    /// Token that stops the task when cancelled, for use alongside
    /// [`finished`](Self::finished).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end on its own.
    pub async fn finished(self) -> PollOutcome {
        self.task.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Poll task panicked");
            PollOutcome::Cancelled
        })
    }

    /// Cancel the task and wait up to 5 seconds for it to exit.
    pub async fn stop(self) -> PollOutcome {
        self.cancel.cancel();
        match tokio::time::timeout(STOP_TIMEOUT, self.task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Poll task panicked");
                PollOutcome::Cancelled
            }
            Err(_) => {
                tracing::warn!("Poll task did not stop in time");
                PollOutcome::Cancelled
            }
        }
    }
}

/// Core poll loop: wait for a tick, trigger or session event, then reconcile.
async fn poll_loop(
    session: Arc<GenerationSession>,
    interval: Duration,
    cancel: CancellationToken,
    trigger: Arc<Notify>,
) -> PollOutcome {
    // Subscribe before reading the job id so no reset can slip between.
    let mut events = session.subscribe();

    let snapshot = session.snapshot().await;
    let Some(watched) = snapshot.job_id().cloned() else {
        tracing::debug!("No job to poll");
        return PollOutcome::Superseded;
    };
    if snapshot.status().is_terminal() {
        return PollOutcome::Finished {
            job_id: watched,
            status: snapshot.status(),
        };
    }

    tracing::info!(job_id = %watched, interval_secs = interval.as_secs(), "Polling started");

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %watched, "Polling cancelled");
                return PollOutcome::Cancelled;
            }
            _ = ticker.tick() => {}
            _ = trigger.notified() => {
                tracing::debug!(job_id = %watched, "Manual status check");
            }
            event = events.recv() => {
                match event {
                    Ok(SessionEvent::Reset { .. }) => {
                        tracing::info!(job_id = %watched, "Session reset, polling stopped");
                        return PollOutcome::Superseded;
                    }
                    Ok(SessionEvent::Submitted { job_id, .. }) if job_id != watched => {
                        return PollOutcome::Superseded;
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return PollOutcome::Cancelled,
                }
            }
        }

        match session.check_status().await {
            Ok(check) if check.job_id != watched => return PollOutcome::Superseded,
            Ok(check) if check.status.is_terminal() => {
                tracing::info!(job_id = %watched, status = %check.status, "Polling finished");
                return PollOutcome::Finished {
                    job_id: watched,
                    status: check.status,
                };
            }
            Ok(_) => {}
            Err(SessionError::NoActiveJob | SessionError::StaleJob(_)) => {
                return PollOutcome::Superseded;
            }
            Err(e) => {
                // Transient: retried on the next tick.
                tracing::warn!(job_id = %watched, error = %e, "Status poll failed, will retry");
            }
        }
    }
}
