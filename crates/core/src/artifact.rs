//! Generated image artifact: decoding and download metadata.
//!
//! The backend transports the PNG as standard-alphabet base64 text inside
//! JSON. It is decoded once on retrieval and kept as raw bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// File name offered for downloads of the generated image.
pub const DOWNLOAD_FILE_NAME: &str = "generated_pokemon.png";

/// MIME type of the generated image.
pub const IMAGE_MIME_TYPE: &str = "image/png";

/// Prompt suggested when the user has not typed one.
pub const DEFAULT_PROMPT: &str = "A cartoon drawing of a blue Pokemon with wings and a fiery tail";

/// First eight bytes of every PNG file.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

// ---------------------------------------------------------------------------
// GeneratedImage
// ---------------------------------------------------------------------------

/// A decoded image returned by the backend for a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Raw PNG bytes. Persisted as base64 text.
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    /// The prompt the backend reports having used.
    pub prompt_used: String,
}

impl GeneratedImage {
    /// Decode a base64 payload from the backend into an image.
    pub fn from_base64(encoded: &str, prompt_used: String) -> Result<Self, CoreError> {
        let bytes = decode_image(encoded)?;
        Ok(Self { bytes, prompt_used })
    }

    pub fn is_png(&self) -> bool {
        self.bytes.starts_with(&PNG_SIGNATURE)
    }
}

/// Decode a base64 image payload.
///
/// Surrounding whitespace is ignored. A payload that decodes but does not
/// carry the PNG signature is accepted with a warning.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, CoreError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CoreError::Decode(format!("invalid base64 image payload: {e}")))?;

    if bytes.is_empty() {
        return Err(CoreError::Decode("image payload is empty".to_string()));
    }

    if !bytes.starts_with(&PNG_SIGNATURE) {
        tracing::warn!(len = bytes.len(), "Decoded image does not carry a PNG signature");
    }

    Ok(bytes)
}

/// Serde adapter storing `Vec<u8>` as a base64 string.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
