//! Job lifecycle for the image-generation client.
//!
//! [`tracker::JobTracker`] is the pure state machine for the single active
//! job. [`session::GenerationSession`] wraps it with a backend and is the
//! only path through which poll results reach the tracker.
//! [`scheduler::PollScheduler`] drives that path on a timer while a job
//! is processing.

pub mod events;
pub mod scheduler;
pub mod session;
pub mod tracker;

pub use events::SessionEvent;
pub use scheduler::{PollHandle, PollOutcome, PollScheduler, DEFAULT_POLL_INTERVAL};
pub use session::{GenerationSession, SessionConfig, SessionError, StatusCheck};
pub use tracker::{JobTracker, TrackerError, Transition};
