mod common;

use common::{eventually, CountingCamera};
use signstream::kernel::state::LinkState;
use signstream::kernel::telemetry::SessionStats;
use signstream::services::recognizer::transport::LinkHandle;
use signstream::vision::capture::{CameraHandle, CameraSource, VideoSurface};
use signstream::vision::encoder::{EncodedFrame, FrameEncoder};
use signstream::vision::sampler::{FrameSampler, TickOutcome};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

struct Rig {
    sampler: FrameSampler,
    state: watch::Sender<LinkState>,
    outbound: mpsc::Receiver<EncodedFrame>,
    surface: VideoSurface,
    stats: SessionStats,
}

fn rig(period: Duration, capacity: usize) -> Rig {
    let (state, state_rx) = watch::channel(LinkState::Connecting);
    let (outbound_tx, outbound) = mpsc::channel(capacity);
    let surface = VideoSurface::new();
    let stats = SessionStats::new();
    let sampler = FrameSampler::new(
        period,
        surface.clone(),
        LinkHandle::new(state_rx, outbound_tx),
        FrameEncoder::new(80),
        stats.clone(),
    );
    Rig {
        sampler,
        state,
        outbound,
        surface,
        stats,
    }
}

async fn attach_camera(surface: &VideoSurface) {
    let handle = CountingCamera::new().acquire().await.expect("acquire");
    surface.attach(handle);
}

#[tokio::test(start_paused = true)]
async fn test_cadence_runs_while_link_not_ready() {
    let Rig {
        sampler,
        mut outbound,
        surface,
        stats,
        state: _state,
    } = rig(Duration::from_millis(100), 1);
    attach_camera(&surface).await;

    let mut task = sampler.spawn();
    tokio::time::sleep(Duration::from_millis(1_050)).await;

    let snapshot = stats.snapshot();
    // First tick fires immediately, then every 100ms.
    assert!((10..=11).contains(&snapshot.ticks), "ticks = {}", snapshot.ticks);
    assert_eq!(snapshot.ticks_not_ready, snapshot.ticks);
    assert_eq!(snapshot.frames_dropped, 0);
    assert!(outbound.try_recv().is_err());

    task.cancel();
    assert!(task.is_cancelled());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(stats.snapshot().ticks, snapshot.ticks);
}

#[tokio::test]
async fn test_not_ready_tick_does_nothing() {
    let rig = rig(Duration::from_millis(100), 1);
    attach_camera(&rig.surface).await;
    let cancel = CancellationToken::new();

    assert_eq!(rig.sampler.tick(&cancel), TickOutcome::NotReady);

    rig.state.send_replace(LinkState::Closed);
    assert_eq!(rig.sampler.tick(&cancel), TickOutcome::NotReady);

    let snapshot = rig.stats.snapshot();
    assert_eq!(snapshot.ticks, 2);
    assert_eq!(snapshot.ticks_not_ready, 2);
}

#[tokio::test]
async fn test_open_tick_sends_data_url() {
    let mut rig = rig(Duration::from_millis(100), 1);
    attach_camera(&rig.surface).await;
    rig.state.send_replace(LinkState::Open);
    let cancel = CancellationToken::new();

    assert_eq!(rig.sampler.tick(&cancel), TickOutcome::Dispatched);

    let frame = tokio::time::timeout(Duration::from_secs(5), rig.outbound.recv())
        .await
        .expect("frame within timeout")
        .expect("outbound open");
    assert!(!frame.is_empty());
    assert!(frame.to_data_url().starts_with("data:image/jpeg;base64,"));
    assert_eq!(&frame.jpeg()[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_busy_link_drops_frame() {
    let mut rig = rig(Duration::from_millis(100), 1);
    attach_camera(&rig.surface).await;
    rig.state.send_replace(LinkState::Open);
    let cancel = CancellationToken::new();

    // Nobody drains the slot, so only one of the two frames fits.
    rig.sampler.tick(&cancel);
    rig.sampler.tick(&cancel);

    let stats = rig.stats.clone();
    assert!(eventually(Duration::from_secs(5), || stats.snapshot().frames_dropped == 1).await);
    assert!(rig.outbound.try_recv().is_ok());
    assert!(rig.outbound.try_recv().is_err());
}

#[tokio::test]
async fn test_missing_frame_skips_tick() {
    let rig = rig(Duration::from_millis(100), 1);
    rig.state.send_replace(LinkState::Open);
    let cancel = CancellationToken::new();

    // Nothing attached yet.
    assert_eq!(rig.sampler.tick(&cancel), TickOutcome::NoFrame);

    // Attached but released.
    let handle = CountingCamera::new().acquire().await.expect("acquire");
    rig.surface.attach(handle.clone());
    handle.stop_tracks();
    assert_eq!(rig.sampler.tick(&cancel), TickOutcome::NoFrame);

    assert_eq!(rig.stats.snapshot().ticks_no_frame, 2);
}

#[tokio::test]
async fn test_cancelled_tick_is_inert() {
    let rig = rig(Duration::from_millis(100), 1);
    attach_camera(&rig.surface).await;
    rig.state.send_replace(LinkState::Open);
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert_eq!(rig.sampler.tick(&cancel), TickOutcome::Cancelled);
    assert_eq!(rig.stats.snapshot().ticks, 0);
}
