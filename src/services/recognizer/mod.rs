//! Client side of the remote sign recognizer: the streaming WebSocket link
//! and the one-shot image upload.

pub mod protocol;
pub mod transport;
pub mod upload;
