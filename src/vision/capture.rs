use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::CaptureError;

/// A live camera stream.
pub trait CameraHandle: Send + Sync {
    /// Contents of the stream at this instant. Never blocks on the device.
    fn current_frame(&self) -> Result<RgbImage, CaptureError>;

    /// Stop every track. Further `current_frame` calls return `Released`.
    /// Must tolerate being called more than once.
    fn stop_tracks(&self);

    fn is_live(&self) -> bool;
}

/// Platform entry point for camera access.
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Waits on the platform (permission prompt, device open).
    async fn acquire(&self) -> Result<Arc<dyn CameraHandle>, CaptureError>;
}

/// The slot a live handle is attached to for preview and sampling.
///
/// Cloning yields another view of the same slot. UI collaborators can
/// `subscribe` to learn when a stream is attached or detached.
#[derive(Clone)]
pub struct VideoSurface {
    slot: Arc<watch::Sender<Option<Arc<dyn CameraHandle>>>>,
}

impl Default for VideoSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSurface {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    pub fn attach(&self, handle: Arc<dyn CameraHandle>) {
        self.slot.send_replace(Some(handle));
    }

    pub fn detach(&self) -> Option<Arc<dyn CameraHandle>> {
        self.slot.send_replace(None)
    }

    pub fn is_attached(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<dyn CameraHandle>>> {
        self.slot.subscribe()
    }

    /// Draw whatever the attached stream shows right now.
    pub fn snapshot(&self) -> Result<RgbImage, CaptureError> {
        let handle = self.slot.borrow().clone();
        match handle {
            Some(handle) => handle.current_frame(),
            None => Err(CaptureError::NoFrame),
        }
    }
}

/// Scoped ownership of an acquired camera.
///
/// `release` stops the tracks and detaches the surface. It is idempotent and
/// also runs on drop, so every exit path out of a session gives the camera back.
pub struct CaptureGuard {
    handle: Option<Arc<dyn CameraHandle>>,
    surface: VideoSurface,
}

impl CaptureGuard {
    /// Attach a freshly acquired handle to the surface.
    pub fn attach(handle: Arc<dyn CameraHandle>, surface: &VideoSurface) -> Self {
        surface.attach(handle.clone());
        debug!("camera attached to video surface");
        Self {
            handle: Some(handle),
            surface: surface.clone(),
        }
    }

    pub fn is_held(&self) -> bool {
        self.handle.is_some()
    }

    pub fn release(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        handle.stop_tracks();
        // Only clear the slot if it still shows our stream.
        if let Some(current) = self.surface.detach() {
            if !Arc::ptr_eq(&current, &handle) {
                self.surface.attach(current);
            }
        }
        info!("camera released");
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.release();
    }
}
