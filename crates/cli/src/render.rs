//! Terminal rendering of job status and progress.

use std::time::Duration;

use pokegen_client::HealthState;
use pokegen_core::job::JobStatus;
use pokegen_core::progress::ProgressEstimate;
use pokegen_session::JobTracker;

/// Width of the progress bar in characters.
const BAR_WIDTH: usize = 30;

/// `3m 05s`, or `42s` under a minute.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

/// `[###############---------------]  50%  elapsed 3m 30s, ~3m 30s left`
pub fn progress_line(progress: &ProgressEstimate) -> String {
    let filled = ((progress.fraction * BAR_WIDTH as f64).floor() as usize).min(BAR_WIDTH);
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));

    let tail = if progress.fraction >= 1.0 {
        format!("done in {}", format_duration(progress.elapsed))
    } else if progress.remaining.is_zero() {
        format!(
            "elapsed {}, taking longer than usual",
            format_duration(progress.elapsed)
        )
    } else {
        format!(
            "elapsed {}, ~{} left",
            format_duration(progress.elapsed),
            format_duration(progress.remaining)
        )
    };

    format!("[{bar}] {:>3}%  {tail}", progress.percent())
}

/// One-line summary of the tracked job.
pub fn status_line(tracker: &JobTracker, progress: Option<&ProgressEstimate>) -> String {
    let job = tracker.job();
    let id = job
        .job_id
        .as_ref()
        .map(|id| id.as_str().to_string())
        .unwrap_or_default();

    match job.status {
        JobStatus::Unsubmitted => "No generation in progress".to_string(),
        JobStatus::Processing => match progress {
            Some(p) => format!("Job {id} processing {}", progress_line(p)),
            None => format!("Job {id} processing"),
        },
        JobStatus::Completed => match job.generation_secs() {
            Some(secs) => format!("Job {id} completed: image generated in {secs} seconds"),
            None => format!("Job {id} completed"),
        },
        JobStatus::Failed => format!(
            "Job {id} failed: {}",
            job.error_message.as_deref().unwrap_or("unknown error")
        ),
    }
}

pub fn health_line(state: HealthState) -> String {
    let marker = match state {
        HealthState::Ready => "ok",
        HealthState::ModelLoading => "warn",
        HealthState::Unresponsive { .. } | HealthState::Offline => "error",
    };
    format!("[{marker}] {}", state.message())
}
