//! Command implementations behind the `pokegen` binary.
//!
//! [`App`] binds a configuration, a persisted session file and a live
//! [`GenerationSession`]. Each command runs against the session and saves
//! the tracker before returning, so the next invocation picks up where
//! this one stopped.

use std::future::Future;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use pokegen_client::{BackendApi, HealthState};
use pokegen_core::artifact::{GeneratedImage, IMAGE_MIME_TYPE};
use pokegen_core::job::JobStatus;
use pokegen_core::types::JobId;
use pokegen_session::{GenerationSession, PollOutcome, PollScheduler, SessionError};

use crate::config::ClientConfig;
use crate::render;
use crate::store::SessionStore;

/// How often the progress line is redrawn while waiting.
const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

/// How a foreground `generate` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// The image was written to the output file.
    Saved { job_id: JobId, path: PathBuf },
    /// The user stopped waiting; the job keeps running on the backend.
    Detached { job_id: JobId },
}

/// A configured client with its rehydrated session.
pub struct App {
    config: ClientConfig,
    store: SessionStore,
    session: Arc<GenerationSession>,
}

impl App {
    /// Build the backend client and restore the persisted session.
    pub async fn open(config: ClientConfig) -> anyhow::Result<Self> {
        let address = config.backend_address()?;
        let store = SessionStore::new(&config.session_file);
        let tracker = store.load().await?;

        tracing::info!(
            backend = %address,
            status = %tracker.status(),
            session_file = %store.path().display(),
            "Session opened",
        );

        let backend = Arc::new(BackendApi::new(address));
        let session = GenerationSession::restore(backend, config.session_config(), tracker);

        Ok(Self {
            config,
            store,
            session,
        })
    }

    pub fn session(&self) -> &Arc<GenerationSession> {
        &self.session
    }

    /// Probe the backend and print its state.
    pub async fn health(&self) -> HealthState {
        let state = self.session.check_health().await.state();
        println!("{}", render::health_line(state));
        state
    }

    /// Submit `prompt`; unless `detach`, wait for the result and save it.
    ///
    /// Ctrl-C stops waiting without touching the job.
    pub async fn generate(&self, prompt: &str, detach: bool) -> anyhow::Result<GenerateOutcome> {
        if detach {
            let job_id = self.submit(prompt).await?;
            println!("Run `pokegen status` to check on it.");
            return Ok(GenerateOutcome::Detached { job_id });
        }
        self.generate_until(prompt, interrupted()).await
    }

    /// Submit `prompt` and wait for the result until `interrupt` resolves.
    pub async fn generate_until(
        &self,
        prompt: &str,
        interrupt: impl Future<Output = ()>,
    ) -> anyhow::Result<GenerateOutcome> {
        let job_id = self.submit(prompt).await?;

        let outcome = self.wait_for_job(interrupt).await;
        self.persist().await?;

        match outcome {
            PollOutcome::Finished {
                status: JobStatus::Completed,
                ..
            } => {
                let path = self.save_image().await?;
                Ok(GenerateOutcome::Saved { job_id, path })
            }
            PollOutcome::Finished { .. } => {
                let snapshot = self.session.snapshot().await;
                anyhow::bail!("{}", render::status_line(&snapshot, None))
            }
            PollOutcome::Superseded => anyhow::bail!("Job {job_id} was reset while waiting"),
            PollOutcome::Cancelled => {
                println!(
                    "\nStopped waiting. Job {job_id} keeps running; run `pokegen status` later."
                );
                Ok(GenerateOutcome::Detached { job_id })
            }
        }
    }

    /// Manually check the current job and save the image once complete.
    pub async fn status(&self) -> anyhow::Result<JobStatus> {
        let checked = match self.session.status().await {
            JobStatus::Processing => self.session.check_status().await.map(|_| ()),
            _ => Ok(()),
        };
        self.persist().await?;
        checked.map_err(surface)?;

        let snapshot = self.session.snapshot().await;
        let progress = self.session.progress().await;
        println!("{}", render::status_line(&snapshot, progress.as_ref()));

        if snapshot.status() == JobStatus::Completed {
            self.save_image().await?;
        }
        Ok(snapshot.status())
    }

    /// Write the image of the completed job to the output file.
    pub async fn download(&self) -> anyhow::Result<PathBuf> {
        self.save_image().await
    }

    /// Discard the current job and release it on the backend.
    pub async fn reset(&self) -> anyhow::Result<Option<JobId>> {
        let discarded = self.session.reset().await;
        self.persist().await?;
        match &discarded {
            Some(id) => println!("Discarded job {id}"),
            None => println!("Nothing to reset"),
        }
        Ok(discarded)
    }

    // ---- private helpers ----

    async fn submit(&self, prompt: &str) -> anyhow::Result<JobId> {
        let submitted = self.session.submit(prompt).await;
        self.persist().await?;
        let job_id = submitted.map_err(surface)?;
        println!("Submitted job {job_id}. Image generation may take a few minutes.");
        Ok(job_id)
    }

    /// Poll until the job ends, redrawing progress every second.
    ///
    /// `interrupt` is registered once, before the first redraw, so it is
    /// observed even while a redraw is running.
    async fn wait_for_job(&self, interrupt: impl Future<Output = ()>) -> PollOutcome {
        let handle = PollScheduler::new(self.config.poll_interval).start(Arc::clone(&self.session));
        let cancel = handle.cancel_token();
        let finished = handle.finished();
        tokio::pin!(finished);
        tokio::pin!(interrupt);

        let mut redraw = tokio::time::interval(REDRAW_INTERVAL);
        let mut stdout = std::io::stdout();

        let outcome = loop {
            tokio::select! {
                outcome = &mut finished => break outcome,
                _ = redraw.tick() => {
                    if let Some(progress) = self.session.progress().await {
                        // Best effort; a closed stdout must not stop polling.
                        let _ = write!(stdout, "\r{}", render::progress_line(&progress));
                        let _ = stdout.flush();
                    }
                }
                _ = &mut interrupt, if !cancel.is_cancelled() => {
                    cancel.cancel();
                }
            }
        };
        println!();
        outcome
    }

    async fn save_image(&self) -> anyhow::Result<PathBuf> {
        let image = self.session.result().await;
        self.persist().await?;
        let image = image.map_err(surface)?;
        self.write_image(&image).await
    }

    async fn write_image(&self, image: &GeneratedImage) -> anyhow::Result<PathBuf> {
        let path = self.config.output_file.clone();
        tokio::fs::write(&path, &image.bytes)
            .await
            .with_context(|| format!("Failed to write image to {}", path.display()))?;

        let snapshot = self.session.snapshot().await;
        if let Some(secs) = snapshot.job().generation_secs() {
            println!("Image generated in {secs} seconds");
        }
        println!(
            "Saved {} ({}, {} bytes), prompt: {}",
            path.display(),
            IMAGE_MIME_TYPE,
            image.bytes.len(),
            image.prompt_used
        );
        Ok(path)
    }

    async fn persist(&self) -> anyhow::Result<()> {
        let snapshot = self.session.snapshot().await;
        self.store.save(&snapshot).await?;
        Ok(())
    }
}

/// Resolves on the first Ctrl-C. Never resolves when no handler can be
/// installed, so waiting is not cut short.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// Wrap a session error so its actionable text leads the report.
fn surface(err: SessionError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}
