//! Shared fixtures for session integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pokegen_client::{BackendError, BackendHealth, GenerationBackend, TaskStatus};
use pokegen_core::address::BackendAddress;
use pokegen_core::artifact::{GeneratedImage, PNG_SIGNATURE};
use pokegen_core::types::JobId;
use pokegen_session::{GenerationSession, SessionConfig};
use tokio::sync::Notify;

/// A scripted in-memory backend that counts every call.
///
/// Polls pop from a queue of scripted answers and report `processing`
/// once it runs dry.
pub struct FakeBackend {
    health: Mutex<BackendHealth>,
    task_ids: Mutex<VecDeque<String>>,
    submit_failure: Mutex<Option<u16>>,
    statuses: Mutex<VecDeque<Result<TaskStatus, u16>>>,
    images: Mutex<VecDeque<Result<GeneratedImage, String>>>,
    fetch_delay: Duration,
    poll_gate: Option<Arc<Notify>>,
    pub poll_started: Arc<Notify>,
    pub submits: AtomicUsize,
    pub polls: AtomicUsize,
    pub fetches: AtomicUsize,
    pub cleaned: Mutex<Vec<JobId>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            health: Mutex::new(BackendHealth {
                online: true,
                model_loaded: true,
                status_code: Some(200),
            }),
            task_ids: Mutex::new(VecDeque::new()),
            submit_failure: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            images: Mutex::new(VecDeque::new()),
            fetch_delay: Duration::ZERO,
            poll_gate: None,
            poll_started: Arc::new(Notify::new()),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            cleaned: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task_ids(self, ids: &[&str]) -> Self {
        *self.task_ids.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_statuses(self, statuses: Vec<TaskStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into_iter().map(Ok).collect();
        self
    }

    pub fn with_poll_answers(self, answers: Vec<Result<TaskStatus, u16>>) -> Self {
        *self.statuses.lock().unwrap() = answers.into_iter().collect();
        self
    }

    pub fn with_images(self, images: Vec<Result<GeneratedImage, String>>) -> Self {
        *self.images.lock().unwrap() = images.into_iter().collect();
        self
    }

    pub fn with_health(self, health: BackendHealth) -> Self {
        *self.health.lock().unwrap() = health;
        self
    }

    pub fn with_submit_failure(self, status: u16) -> Self {
        *self.submit_failure.lock().unwrap() = Some(status);
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Make every poll wait until `gate` is notified.
    pub fn with_poll_gate(mut self, gate: Arc<Notify>) -> Self {
        self.poll_gate = Some(gate);
        self
    }

    pub fn push_status(&self, status: TaskStatus) {
        self.statuses.lock().unwrap().push_back(Ok(status));
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn cleaned_ids(&self) -> Vec<JobId> {
        self.cleaned.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn check_health(&self) -> BackendHealth {
        *self.health.lock().unwrap()
    }

    async fn submit_job(&self, _prompt: &str) -> Result<JobId, BackendError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        let failure = *self.submit_failure.lock().unwrap();
        if let Some(status) = failure {
            return Err(BackendError::Server {
                status,
                body: "scripted failure".into(),
            });
        }
        let id = self
            .task_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("task-{}", self.submit_count()));
        Ok(JobId::new(id))
    }

    async fn poll_status(&self, _job_id: &JobId) -> Result<TaskStatus, BackendError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.poll_started.notify_one();
        if let Some(gate) = &self.poll_gate {
            gate.notified().await;
        }
        let answer = self.statuses.lock().unwrap().pop_front();
        match answer {
            Some(Ok(status)) => Ok(status),
            Some(Err(code)) => Err(BackendError::Server {
                status: code,
                body: "scripted poll failure".into(),
            }),
            None => Ok(TaskStatus::Processing),
        }
    }

    async fn fetch_result(&self, _job_id: &JobId) -> Result<GeneratedImage, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        let next = self.images.lock().unwrap().pop_front();
        match next {
            Some(Ok(image)) => Ok(image),
            Some(Err(msg)) => Err(BackendError::Decode(msg)),
            None => Ok(png_image("X")),
        }
    }

    async fn cleanup(&self, job_id: &JobId) {
        self.cleaned.lock().unwrap().push(job_id.clone());
    }
}

pub fn png_bytes() -> Vec<u8> {
    let mut bytes = PNG_SIGNATURE.to_vec();
    bytes.extend_from_slice(b"\0\0\0\rIHDR");
    bytes
}

pub fn png_image(prompt: &str) -> GeneratedImage {
    GeneratedImage {
        bytes: png_bytes(),
        prompt_used: prompt.to_string(),
    }
}

/// Session over `backend` with the health preflight disabled.
pub fn session_with(backend: Arc<FakeBackend>) -> Arc<GenerationSession> {
    GenerationSession::new(
        backend,
        SessionConfig {
            preflight_health: false,
            ..Default::default()
        },
    )
}

/// Serve `app` on an ephemeral port and return its address.
pub async fn spawn_stub(app: axum::Router) -> BackendAddress {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    BackendAddress::parse(&format!("http://{addr}")).unwrap()
}
