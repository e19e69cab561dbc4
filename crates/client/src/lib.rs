//! REST client for the image-generation backend.
//!
//! Wraps the task/poll protocol (health, start generation, task status,
//! image retrieval, cleanup) in typed calls over [`reqwest`], and defines
//! the [`GenerationBackend`](backend::GenerationBackend) trait that the
//! session layer depends on.

pub mod api;
pub mod backend;
pub mod messages;

pub use api::{ApiTimeouts, BackendApi, BackendError};
pub use backend::{BackendHealth, GenerationBackend, HealthState};
pub use messages::TaskStatus;
