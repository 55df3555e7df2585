use thiserror::Error;

/// Camera acquisition and per-frame read failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The platform refused access to the camera.
    #[error("camera access denied: {0}")]
    Denied(String),
    /// No usable camera device.
    #[error("no camera available: {0}")]
    Unavailable(String),
    /// The handle was released; its tracks no longer produce frames.
    #[error("camera handle already released")]
    Released,
    /// Nothing is attached to the surface, or the device has not produced a frame yet.
    #[error("no frame available on the video surface")]
    NoFrame,
}

/// Connection-level failures of the recognizer link.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("could not connect to recognizer at {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("recognizer connection closed: {0}")]
    Closed(String),
}

/// An inbound payload that is not a classification message.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed classification message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("classification message is not valid UTF-8")]
    NotUtf8,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame has zero area ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("jpeg encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported file type for {0} (expected .png, .jpg or .jpeg)")]
    UnsupportedFileType(String),
    #[error("recognizer rejected upload with status {0}")]
    Status(reqwest::StatusCode),
    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors `SessionController::start` can surface to the UI.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
}
