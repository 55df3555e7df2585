use std::fmt;
use uuid::Uuid;

use crate::error::TransportError;
use crate::services::recognizer::protocol::ClassificationMessage;

/// Identity of one Active lifetime. Events stamped with an older id are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a link ended without the controller asking for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    ConnectFailed(String),
    Error(String),
    /// The recognizer closed the socket.
    Remote,
}

impl CloseCause {
    pub fn into_error(self, endpoint: &str) -> TransportError {
        match self {
            CloseCause::ConnectFailed(reason) => TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason,
            },
            CloseCause::Error(reason) => TransportError::Closed(reason),
            CloseCause::Remote => TransportError::Closed("closed by recognizer".to_string()),
        }
    }
}

/// Socket-side facts reported by the link task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Opened,
    Classified(ClassificationMessage),
    Closed(CloseCause),
}

/// A link event stamped with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub kind: LinkEvent,
}

impl SessionEvent {
    pub fn new(session: SessionId, kind: LinkEvent) -> Self {
        Self { session, kind }
    }
}

/// What the UI needs to hear about after an event is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The link is open and sampling frames are flowing.
    Connected,
    /// A new transcript entry.
    SignAccepted(String),
    /// Non-fatal: the session was torn down. Restarting is up to the user.
    TransportLost(TransportError),
}
