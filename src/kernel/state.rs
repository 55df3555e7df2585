use serde::{Deserialize, Serialize};

/// Lifecycle of the live-detection feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No camera, no connection, no timer.
    #[default]
    Idle,
    /// Camera, connection and sampling timer all exist.
    Active,
}

/// Requests that may move the session. The graph validates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRequest {
    Start,
    Stop,
    /// The link closed or failed under an active session.
    TransportLost,
}

pub struct SessionGraph;

impl SessionGraph {
    /// Pure function: (current, request) -> next state.
    /// Returns None when the request does not apply, which callers treat as a no-op.
    pub fn transition(current: SessionState, request: SessionRequest) -> Option<SessionState> {
        use SessionRequest::*;
        use SessionState::*;

        match (current, request) {
            (Idle, Start) => Some(Active),
            (Active, Stop) => Some(Idle),
            (Active, TransportLost) => Some(Idle),
            // Start while Active is ignored rather than restarted.
            _ => None,
        }
    }
}

/// Sub-state of one recognizer link. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkState {
    #[default]
    Connecting,
    Open,
    Closed,
}

impl LinkState {
    /// Forward-only transitions. A link never returns to `Connecting`.
    pub fn advance(self, next: LinkState) -> Option<LinkState> {
        use LinkState::*;

        match (self, next) {
            (Connecting, Open) | (Connecting, Closed) | (Open, Closed) => Some(next),
            _ => None,
        }
    }

    pub fn accepts_frames(self) -> bool {
        self == LinkState::Open
    }
}
