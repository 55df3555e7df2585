use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::MessageError;

/// Label the recognizer reports when a frame contains no hand.
pub const NO_HANDS_SENTINEL: &str = "No hands detected.";

/// One classification result. Results carry no frame correlation; they are
/// ordered only by arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationMessage {
    pub label: String,
    /// Annotated frame (base64 JPEG with landmarks drawn), sent alongside real detections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ClassificationMessage {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            image: None,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn parse_bytes(raw: &[u8]) -> Result<Self, MessageError> {
        let text = std::str::from_utf8(raw).map_err(|_| MessageError::NotUtf8)?;
        Self::parse(text)
    }

    pub fn is_sentinel(&self) -> bool {
        self.label == NO_HANDS_SENTINEL
    }

    /// Decoded annotated JPEG, if the message carried a well-formed one.
    pub fn annotated_jpeg(&self) -> Option<Vec<u8>> {
        self.image.as_deref().and_then(|b64| STANDARD.decode(b64).ok())
    }
}
