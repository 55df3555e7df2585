//! Session counters.
//!
//! Telemetry is a read-only side layer: decision logic never reads it.
//! Counters hold numbers only, no labels or frame content.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    ticks_not_ready: AtomicU64,
    ticks_no_frame: AtomicU64,
    encode_failures: AtomicU64,
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    messages_received: AtomicU64,
    malformed_messages: AtomicU64,
    labels_accepted: AtomicU64,
    labels_repeated: AtomicU64,
    labels_filtered: AtomicU64,
    sessions_started: AtomicU64,
    transports_lost: AtomicU64,
}

/// Cheap-to-clone handle shared by the sampler, the link task and the controller.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    inner: Arc<Counters>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub ticks_not_ready: u64,
    pub ticks_no_frame: u64,
    pub encode_failures: u64,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub messages_received: u64,
    pub malformed_messages: u64,
    pub labels_accepted: u64,
    pub labels_repeated: u64,
    pub labels_filtered: u64,
    pub sessions_started: u64,
    pub transports_lost: u64,
}

impl StatsSnapshot {
    /// Share of sampler ticks that produced a frame on the wire.
    pub fn delivery_ratio(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.frames_sent as f64 / self.ticks as f64
        }
    }
}

macro_rules! counter {
    ($($name:ident => $field:ident),* $(,)?) => {
        impl SessionStats {
            $(
                pub fn $name(&self) {
                    self.inner.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*
        }
    };
}

counter! {
    record_tick => ticks,
    record_not_ready => ticks_not_ready,
    record_no_frame => ticks_no_frame,
    record_encode_failure => encode_failures,
    record_frame_sent => frames_sent,
    record_frame_dropped => frames_dropped,
    record_message => messages_received,
    record_malformed => malformed_messages,
    record_accepted => labels_accepted,
    record_repeated => labels_repeated,
    record_filtered => labels_filtered,
    record_session_started => sessions_started,
    record_transport_lost => transports_lost,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.inner;
        let load = |v: &AtomicU64| v.load(Ordering::Relaxed);
        StatsSnapshot {
            ticks: load(&c.ticks),
            ticks_not_ready: load(&c.ticks_not_ready),
            ticks_no_frame: load(&c.ticks_no_frame),
            encode_failures: load(&c.encode_failures),
            frames_sent: load(&c.frames_sent),
            frames_dropped: load(&c.frames_dropped),
            messages_received: load(&c.messages_received),
            malformed_messages: load(&c.malformed_messages),
            labels_accepted: load(&c.labels_accepted),
            labels_repeated: load(&c.labels_repeated),
            labels_filtered: load(&c.labels_filtered),
            sessions_started: load(&c.sessions_started),
            transports_lost: load(&c.transports_lost),
        }
    }
}
