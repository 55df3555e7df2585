use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::ClassificationMessage;
use crate::kernel::event::{CloseCause, LinkEvent, SessionEvent, SessionId};
use crate::kernel::state::LinkState;
use crate::kernel::telemetry::SessionStats;
use crate::vision::encoder::EncodedFrame;

/// Upper bound on the goodbye handshake when closing locally.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Result of offering a frame to the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    /// Link is Connecting or Closed. The frame is dropped.
    NotOpen,
    /// A previous frame is still waiting for the socket. The frame is dropped.
    Full,
}

/// Sender-side view of a link: readiness plus a non-blocking outbound slot.
#[derive(Clone)]
pub struct LinkHandle {
    state: watch::Receiver<LinkState>,
    outbound: mpsc::Sender<EncodedFrame>,
}

impl LinkHandle {
    pub fn new(state: watch::Receiver<LinkState>, outbound: mpsc::Sender<EncodedFrame>) -> Self {
        Self { state, outbound }
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state().accepts_frames()
    }

    /// Never waits. Frames are only accepted while Open; nothing is queued behind a full slot.
    pub fn try_send(&self, frame: EncodedFrame) -> Dispatch {
        if !self.is_open() {
            return Dispatch::NotOpen;
        }
        match self.outbound.try_send(frame) {
            Ok(()) => Dispatch::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => Dispatch::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Dispatch::NotOpen,
        }
    }
}

/// Apply a forward-only sub-state transition. Returns false if it did not apply.
fn advance(state: &watch::Sender<LinkState>, next: LinkState) -> bool {
    state.send_if_modified(|current| match current.advance(next) {
        Some(state) => {
            *current = state;
            true
        }
        None => false,
    })
}

/// One persistent WebSocket to the recognizer for the lifetime of a session.
///
/// Sub-state runs `Connecting -> Open -> Closed`. The transport never
/// reconnects; a new session opens a new transport.
pub struct StreamTransport {
    endpoint: String,
    state: Arc<watch::Sender<LinkState>>,
    handle: LinkHandle,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamTransport {
    /// Start connecting. Returns immediately in `Connecting`; the outcome
    /// arrives on `events` as `Opened` or `Closed`.
    pub fn connect(
        endpoint: &str,
        session: SessionId,
        outbound_capacity: usize,
        events: mpsc::Sender<SessionEvent>,
        stats: SessionStats,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);
        let state = Arc::new(state_tx);
        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_capacity.max(1));
        let shutdown = CancellationToken::new();

        let link = LinkTask {
            endpoint: endpoint.to_string(),
            session,
            state: state.clone(),
            outbound: outbound_rx,
            events,
            shutdown: shutdown.clone(),
            stats,
        };
        let task = tokio::spawn(link.run());

        Self {
            endpoint: endpoint.to_string(),
            state,
            handle: LinkHandle::new(state_rx, outbound_tx),
            shutdown,
            task: Some(task),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn handle(&self) -> LinkHandle {
        self.handle.clone()
    }

    /// Local close. Idempotent. The sub-state is `Closed` when this returns;
    /// the close handshake finishes in the background.
    pub fn close(&mut self) {
        if advance(&self.state, LinkState::Closed) {
            debug!(endpoint = %self.endpoint, "closing recognizer link");
        }
        self.shutdown.cancel();
        // Detach; the task exits on its own once it sees the token.
        self.task.take();
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.close();
    }
}

struct LinkTask {
    endpoint: String,
    session: SessionId,
    state: Arc<watch::Sender<LinkState>>,
    outbound: mpsc::Receiver<EncodedFrame>,
    events: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
    stats: SessionStats,
}

impl LinkTask {
    /// Waits for room on the event channel, but never past a local close.
    async fn emit(&self, kind: LinkEvent) {
        let event = SessionEvent::new(self.session, kind);
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!(session = %self.session, "link closing, undelivered event dropped");
            }
            // The controller may be gone already; nobody is left to tell.
            _ = self.events.send(event) => {}
        }
    }

    async fn run(mut self) {
        // 1. Connect (abandoned if the session stops first)
        let connected = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return,
            res = tokio_tungstenite::connect_async(self.endpoint.as_str()) => res,
        };

        let socket = match connected {
            Ok((socket, _response)) => socket,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "recognizer connection failed");
                if advance(&self.state, LinkState::Closed) {
                    self.emit(LinkEvent::Closed(CloseCause::ConnectFailed(e.to_string()))).await;
                }
                return;
            }
        };

        if !advance(&self.state, LinkState::Open) {
            // Closed locally while the handshake was in flight.
            return;
        }
        info!(endpoint = %self.endpoint, session = %self.session, "recognizer link open");
        self.emit(LinkEvent::Opened).await;

        // 2. Pump frames out and results in until either side ends it
        let (mut sink, mut stream) = socket.split();
        let cause = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(None))).await;
                    break None;
                }
                frame = self.outbound.recv() => {
                    let Some(frame) = frame else { break None };
                    if let Err(e) = sink.send(Message::Text(frame.to_data_url())).await {
                        break Some(CloseCause::Error(e.to_string()));
                    }
                    self.stats.record_frame_sent();
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.on_payload(ClassificationMessage::parse(&text)).await,
                    Some(Ok(Message::Binary(bytes))) => self.on_payload(ClassificationMessage::parse_bytes(&bytes)).await,
                    Some(Ok(Message::Close(_))) | None => break Some(CloseCause::Remote),
                    // ping/pong are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(CloseCause::Error(e.to_string())),
                },
            }
        };

        // 3. Report unexpected endings only; a local close needs no notice
        if let Some(cause) = cause {
            if advance(&self.state, LinkState::Closed) {
                info!(endpoint = %self.endpoint, ?cause, "recognizer link closed");
                self.emit(LinkEvent::Closed(cause)).await;
            }
        }
        debug!(session = %self.session, "link task finished");
    }

    async fn on_payload(&self, parsed: Result<ClassificationMessage, crate::error::MessageError>) {
        self.stats.record_message();
        match parsed {
            Ok(message) => self.emit(LinkEvent::Classified(message)).await,
            Err(e) => {
                self.stats.record_malformed();
                warn!(error = %e, "discarding malformed recognizer message");
            }
        }
    }
}
