use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::capture::VideoSurface;
use super::encoder::FrameEncoder;
use crate::kernel::telemetry::SessionStats;
use crate::services::recognizer::transport::{Dispatch, LinkHandle};

/// What one tick did. Returned for observability; the timer ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The link cannot accept data. Nothing sampled.
    NotReady,
    /// The surface had no frame to draw.
    NoFrame,
    /// A frame was snapshotted and handed to the encoder.
    Dispatched,
    /// Stop was requested.
    Cancelled,
}

/// Samples the video surface on a fixed cadence and offers each encoded
/// frame to the link.
///
/// Backpressure is a readiness check, not a queue: a tick that finds the link
/// not Open does nothing, and a finished encode that finds the link busy or
/// closed is dropped.
pub struct FrameSampler {
    period: Duration,
    surface: VideoSurface,
    link: LinkHandle,
    encoder: FrameEncoder,
    stats: SessionStats,
}

impl FrameSampler {
    pub fn new(
        period: Duration,
        surface: VideoSurface,
        link: LinkHandle,
        encoder: FrameEncoder,
        stats: SessionStats,
    ) -> Self {
        Self {
            period,
            surface,
            link,
            encoder,
            stats,
        }
    }

    pub fn spawn(self) -> SamplerTask {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.run(cancel.clone()));
        SamplerTask {
            cancel,
            handle: Some(handle),
        }
    }

    async fn run(self, cancel: CancellationToken) {
        info!(period_ms = self.period.as_millis() as u64, "frame sampler started");

        let mut cadence = interval(self.period);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = cadence.tick() => {
                    let outcome = self.tick(&cancel);
                    trace!(?outcome, "sampler tick");
                }
            }
        }

        debug!("frame sampler stopped");
    }

    /// One tick. Synchronous: snapshots the surface and hands off encode+send
    /// to the blocking pool without waiting for it.
    pub fn tick(&self, cancel: &CancellationToken) -> TickOutcome {
        if cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        self.stats.record_tick();

        // 1. Readiness guard
        if !self.link.is_open() {
            self.stats.record_not_ready();
            return TickOutcome::NotReady;
        }

        // 2. Draw the surface as it is right now
        let frame = match self.surface.snapshot() {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_no_frame();
                debug!(error = %e, "no frame on surface, tick skipped");
                return TickOutcome::NoFrame;
            }
        };

        // 3. Encode off the runtime, then dispatch. Fire-and-forget.
        let encoder = self.encoder;
        let link = self.link.clone();
        let stats = self.stats.clone();
        tokio::task::spawn_blocking(move || match encoder.encode(&frame) {
            Ok(encoded) => match link.try_send(encoded) {
                Dispatch::Sent => {}
                dropped => {
                    stats.record_frame_dropped();
                    trace!(?dropped, "encoded frame dropped");
                }
            },
            Err(e) => {
                stats.record_encode_failure();
                debug!(error = %e, "frame encode failed, tick skipped");
            }
        });

        TickOutcome::Dispatched
    }
}

/// Running sampler. Cancelling is synchronous: once `cancel` returns no
/// further tick does any work.
pub struct SamplerTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SamplerTask {
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SamplerTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
