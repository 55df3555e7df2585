use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::event::{LinkEvent, SessionEvent, SessionId, SessionNotice};
use super::state::{LinkState, SessionGraph, SessionRequest, SessionState};
use super::telemetry::{SessionStats, StatsSnapshot};
use super::transcript::{Reduction, Transcript};
use crate::config::SessionConfig;
use crate::error::{ConfigError, SessionError};
use crate::services::recognizer::protocol::ClassificationMessage;
use crate::services::recognizer::transport::StreamTransport;
use crate::vision::capture::{CameraSource, CaptureGuard, VideoSurface};
use crate::vision::encoder::FrameEncoder;
use crate::vision::sampler::{FrameSampler, SamplerTask};

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Read-only view of the session for the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptView {
    pub active: bool,
    pub entries: Vec<String>,
}

/// Everything an Active session owns. Built in one step, torn down in one step.
struct ActiveSession {
    id: SessionId,
    capture: CaptureGuard,
    transport: StreamTransport,
    sampler: SamplerTask,
}

impl ActiveSession {
    fn teardown(&mut self) {
        // Timer first so no tick races the release.
        self.sampler.cancel();
        self.capture.release();
        self.transport.close();
    }
}

/// The Idle/Active state machine tying capture, sampler, transport and
/// transcript together.
///
/// Link callbacks arrive as `SessionEvent`s on a channel and are applied by
/// `handle_event`; nothing outside the controller mutates session state.
pub struct SessionController {
    config: SessionConfig,
    camera: Arc<dyn CameraSource>,
    surface: VideoSurface,
    state: SessionState,
    active: Option<ActiveSession>,
    transcript: Transcript,
    latest_annotated: Option<ClassificationMessage>,
    view: watch::Sender<TranscriptView>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    stats: SessionStats,
}

impl SessionController {
    /// Rejects a config the sampler or link could not run with, so a started
    /// session always has a live timer.
    pub fn new(config: SessionConfig, camera: Arc<dyn CameraSource>) -> Result<Self, ConfigError> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (view, _) = watch::channel(TranscriptView::default());
        Ok(Self {
            config,
            camera,
            surface: VideoSurface::new(),
            state: SessionState::Idle,
            active: None,
            transcript: Transcript::new(),
            latest_annotated: None,
            view,
            events_tx,
            events_rx,
            stats: SessionStats::new(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &[String] {
        self.transcript.entries()
    }

    /// Observable `{ active, entries }`, republished on every change.
    pub fn subscribe(&self) -> watch::Receiver<TranscriptView> {
        self.view.subscribe()
    }

    pub fn surface(&self) -> &VideoSurface {
        &self.surface
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn link_state(&self) -> Option<LinkState> {
        self.active.as_ref().map(|a| a.transport.state())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Decoded annotated frame from the most recent detection that carried one.
    /// Kept after the session ends, replaced on the next start.
    pub fn latest_annotated_frame(&self) -> Option<Vec<u8>> {
        self.latest_annotated.as_ref().and_then(|m| m.annotated_jpeg())
    }

    /// Idle -> Active.
    ///
    /// Waits for camera access first; if that fails nothing is created and the
    /// controller stays Idle. Calling this while Active is a no-op.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        let Some(next) = SessionGraph::transition(self.state, SessionRequest::Start) else {
            debug!("start ignored: session already active");
            return Ok(());
        };

        // 1. Camera (suspension point: permission prompt / device open)
        let handle = match self.camera.acquire().await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "camera acquisition failed, staying idle");
                return Err(e.into());
            }
        };

        // 2. Everything else is created synchronously, so the UI never sees a partial session
        let id = SessionId::new();
        let capture = CaptureGuard::attach(handle, &self.surface);
        let transport = StreamTransport::connect(
            &self.config.endpoint,
            id,
            self.config.outbound_capacity,
            self.events_tx.clone(),
            self.stats.clone(),
        );
        let sampler = FrameSampler::new(
            self.config.sample_interval(),
            self.surface.clone(),
            transport.handle(),
            FrameEncoder::new(self.config.jpeg_quality),
            self.stats.clone(),
        )
        .spawn();

        self.active = Some(ActiveSession {
            id,
            capture,
            transport,
            sampler,
        });
        self.state = next;
        self.transcript.clear();
        self.latest_annotated = None;
        self.stats.record_session_started();
        self.publish();

        info!(session = %id, endpoint = %self.config.endpoint, "live session started");
        Ok(())
    }

    /// Active -> Idle. Idempotent, synchronous, never waits on in-flight frames.
    pub fn stop(&mut self) {
        self.transition_to_idle(SessionRequest::Stop);
    }

    fn transition_to_idle(&mut self, request: SessionRequest) -> bool {
        let Some(next) = SessionGraph::transition(self.state, request) else {
            return false;
        };

        if let Some(mut active) = self.active.take() {
            active.teardown();
            info!(session = %active.id, ?request, "live session stopped");
        }
        self.state = next;
        self.transcript.clear();
        self.publish();
        true
    }

    /// Apply one link event. Events from any session but the current one are
    /// stale and dropped.
    pub fn handle_event(&mut self, event: SessionEvent) -> Option<SessionNotice> {
        if self.session_id() != Some(event.session) {
            debug!(session = %event.session, "discarding stale link event");
            return None;
        }

        match event.kind {
            LinkEvent::Opened => {
                self.transcript.clear();
                self.publish();
                Some(SessionNotice::Connected)
            }
            LinkEvent::Classified(message) => self.apply_classification(message),
            LinkEvent::Closed(cause) => {
                let endpoint = self.config.endpoint.clone();
                self.stats.record_transport_lost();
                // Forced teardown: camera and timer go with the link.
                self.transition_to_idle(SessionRequest::TransportLost);
                let error = cause.into_error(&endpoint);
                warn!(error = %error, "recognizer link lost, session returned to idle");
                Some(SessionNotice::TransportLost(error))
            }
        }
    }

    fn apply_classification(&mut self, message: ClassificationMessage) -> Option<SessionNotice> {
        match self.transcript.reduce(&message.label) {
            Reduction::Appended => {
                self.stats.record_accepted();
                let label = message.label.clone();
                if message.image.is_some() {
                    self.latest_annotated = Some(message);
                }
                self.publish();
                Some(SessionNotice::SignAccepted(label))
            }
            Reduction::Repeated => {
                self.stats.record_repeated();
                if message.image.is_some() {
                    self.latest_annotated = Some(message);
                }
                None
            }
            Reduction::Filtered => {
                self.stats.record_filtered();
                None
            }
        }
    }

    /// Wait for the next link event that the UI should hear about.
    pub async fn next_notice(&mut self) -> Option<SessionNotice> {
        loop {
            // The controller holds a sender, so the channel never closes under it.
            let event = self.events_rx.recv().await?;
            if let Some(notice) = self.handle_event(event) {
                return Some(notice);
            }
        }
    }

    /// Apply every event already queued without waiting.
    pub fn drain_events(&mut self) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            notices.extend(self.handle_event(event));
        }
        notices
    }

    fn publish(&self) {
        self.view.send_replace(TranscriptView {
            active: self.is_active(),
            entries: self.transcript.entries().to_vec(),
        });
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}
