//! Wire types for the backend REST endpoints.
//!
//! | Method | Path                        | Body / Response                       |
//! |--------|-----------------------------|---------------------------------------|
//! | GET    | `/health`                   | `{"model": "loaded" \| ...}`          |
//! | POST   | `/start-generation`         | `{"prompt"}` -> `{"task_id"}`         |
//! | GET    | `/task-status/{task_id}`    | `{"status", "error"?}`                |
//! | GET    | `/get-image/{task_id}`      | `{"image": <base64>, "prompt"}`       |
//! | DELETE | `/cleanup-task/{task_id}`   | anything                              |

use serde::{Deserialize, Serialize};

/// Marker the backend reports once the model is ready.
pub const MODEL_LOADED: &str = "loaded";

/// Response body of `GET /health`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub model: Option<String>,
}

impl HealthResponse {
    pub fn model_loaded(&self) -> bool {
        self.model.as_deref() == Some(MODEL_LOADED)
    }
}

/// Request body of `POST /start-generation`.
#[derive(Debug, Clone, Serialize)]
pub struct StartGenerationRequest<'a> {
    pub prompt: &'a str,
}

/// Response body of `POST /start-generation`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartGenerationResponse {
    pub task_id: String,
}

/// Response body of `GET /task-status/{task_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusResponse {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response body of `GET /get-image/{task_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageResponse {
    /// Base64-encoded PNG.
    pub image: String,
    /// Prompt the backend used for this image.
    #[serde(default)]
    pub prompt: String,
}

/// Task status as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed { error: Option<String> },
    /// A status string this client does not know.
    Unknown(String),
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

impl From<TaskStatusResponse> for TaskStatus {
    fn from(response: TaskStatusResponse) -> Self {
        match response.status.as_str() {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed {
                error: response.error.filter(|e| !e.trim().is_empty()),
            },
            _ => Self::Unknown(response.status),
        }
    }
}
