pub mod config;
pub mod error;
pub mod kernel;
pub mod services;
pub mod vision;

// Re-export the pieces a front end needs
pub use kernel::controller::{SessionController, TranscriptView};
pub use kernel::event::SessionNotice;
pub use services::recognizer::protocol::NO_HANDS_SENTINEL;
