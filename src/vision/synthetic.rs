use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use super::capture::{CameraHandle, CameraSource};
use crate::error::CaptureError;

/// Camera that renders a moving gradient. Stands in for a webcam when none is
/// present, and keeps frames cheap and deterministic.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new(224, 224)
    }
}

#[async_trait]
impl CameraSource for SyntheticCamera {
    async fn acquire(&self) -> Result<Arc<dyn CameraHandle>, CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::Unavailable(format!(
                "synthetic camera configured with {}x{}",
                self.width, self.height
            )));
        }
        info!(width = self.width, height = self.height, "synthetic camera acquired");
        Ok(Arc::new(SyntheticHandle {
            width: self.width,
            height: self.height,
            live: AtomicBool::new(true),
            frame_no: AtomicU64::new(0),
        }))
    }
}

struct SyntheticHandle {
    width: u32,
    height: u32,
    live: AtomicBool,
    frame_no: AtomicU64,
}

impl CameraHandle for SyntheticHandle {
    fn current_frame(&self) -> Result<RgbImage, CaptureError> {
        if !self.live.load(Ordering::Acquire) {
            return Err(CaptureError::Released);
        }
        let shift = (self.frame_no.fetch_add(1, Ordering::Relaxed) % 256) as u32;
        let (w, h) = (self.width, self.height);
        Ok(RgbImage::from_fn(w, h, |x, y| {
            let r = ((x * 255 / w.max(1)) + shift) % 256;
            let g = (y * 255 / h.max(1)) % 256;
            Rgb([r as u8, g as u8, 128])
        }))
    }

    fn stop_tracks(&self) {
        self.live.store(false, Ordering::Release);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::capture::{CaptureGuard, VideoSurface};

    #[tokio::test]
    async fn frames_change_between_snapshots_and_stop_after_release() {
        let camera = SyntheticCamera::new(32, 16);
        let surface = VideoSurface::new();
        let mut guard = CaptureGuard::attach(camera.acquire().await.unwrap(), &surface);

        let first = surface.snapshot().unwrap();
        let second = surface.snapshot().unwrap();
        assert_eq!(first.dimensions(), (32, 16));
        assert_ne!(first.as_raw(), second.as_raw());

        guard.release();
        assert!(!surface.is_attached());
        assert_eq!(surface.snapshot().unwrap_err(), CaptureError::NoFrame);

        // idempotent
        guard.release();
    }

    #[tokio::test]
    async fn zero_sized_camera_is_unavailable() {
        let err = SyntheticCamera::new(0, 480).acquire().await.err().unwrap();
        assert!(matches!(err, CaptureError::Unavailable(_)));
    }
}
