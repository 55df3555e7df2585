//! Direct V4L2 webcam capture.
//!
//! A dedicated thread owns the device and its mmap stream, converts each YUYV
//! buffer to RGB and keeps only the most recent frame. Sampling reads that
//! frame; nothing is queued.

use async_trait::async_trait;
use image::RgbImage;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use super::capture::{CameraHandle, CameraSource};
use super::convert::yuyv_to_rgb;
use crate::error::CaptureError;

pub struct V4l2Camera {
    index: usize,
    width: u32,
    height: u32,
}

impl V4l2Camera {
    pub fn new(index: usize, width: u32, height: u32) -> Self {
        Self { index, width, height }
    }
}

fn map_open_error(index: usize, err: io::Error) -> CaptureError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => CaptureError::Denied(format!("/dev/video{}: {}", index, err)),
        _ => CaptureError::Unavailable(format!("/dev/video{}: {}", index, err)),
    }
}

#[async_trait]
impl CameraSource for V4l2Camera {
    async fn acquire(&self) -> Result<Arc<dyn CameraHandle>, CaptureError> {
        let latest = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = oneshot::channel();

        let (index, width, height) = (self.index, self.width, self.height);
        let latest_clone = latest.clone();
        let running_clone = running.clone();
        std::thread::Builder::new()
            .name(format!("v4l2-capture-{}", index))
            .spawn(move || capture_loop(index, width, height, latest_clone, running_clone, ready_tx))
            .map_err(|e| CaptureError::Unavailable(format!("failed to spawn capture thread: {}", e)))?;

        let (width, height) = match ready_rx.await {
            Ok(Ok(geometry)) => geometry,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(CaptureError::Unavailable("capture thread exited during setup".into())),
        };
        info!(device = index, width, height, "V4L2 camera acquired");

        Ok(Arc::new(V4l2Handle { latest, running }))
    }
}

struct V4l2Handle {
    latest: Arc<Mutex<Option<RgbImage>>>,
    running: Arc<AtomicBool>,
}

impl CameraHandle for V4l2Handle {
    fn current_frame(&self) -> Result<RgbImage, CaptureError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::Released);
        }
        let latest = self.latest.lock().map_err(|_| CaptureError::NoFrame)?;
        latest.clone().ok_or(CaptureError::NoFrame)
    }

    fn stop_tracks(&self) {
        // The capture thread notices on its next buffer and closes the device.
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for V4l2Handle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn capture_loop(
    index: usize,
    width: u32,
    height: u32,
    latest: Arc<Mutex<Option<RgbImage>>>,
    running: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<(u32, u32), CaptureError>>,
) {
    let mut dev = match Device::new(index) {
        Ok(dev) => dev,
        Err(e) => {
            let _ = ready.send(Err(map_open_error(index, e)));
            return;
        }
    };

    let yuyv = v4l::FourCC::new(b"YUYV");
    let format = match dev.format() {
        Ok(mut format) => {
            format.width = width;
            format.height = height;
            format.fourcc = yuyv;
            dev.set_format(&format)
        }
        Err(e) => Err(e),
    };
    let format = match format {
        Ok(f) if f.fourcc == yuyv => f,
        Ok(f) => {
            let _ = ready.send(Err(CaptureError::Unavailable(format!(
                "device does not offer YUYV (got {:?})",
                f.fourcc
            ))));
            return;
        }
        Err(e) => {
            let _ = ready.send(Err(map_open_error(index, e)));
            return;
        }
    };

    let mut stream = match MmapStream::with_buffers(&mut dev, Type::VideoCapture, 4) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(map_open_error(index, e)));
            return;
        }
    };

    if ready.send(Ok((format.width, format.height))).is_err() {
        // acquire() was abandoned
        return;
    }

    while running.load(Ordering::SeqCst) {
        match stream.next() {
            Ok((buf, meta)) => match yuyv_to_rgb(buf, format.width, format.height) {
                Some(frame) => {
                    if let Ok(mut slot) = latest.lock() {
                        *slot = Some(frame);
                    }
                }
                None => debug!(sequence = meta.sequence, len = buf.len(), "short YUYV buffer dropped"),
            },
            Err(e) => {
                warn!(error = %e, "failed to dequeue V4L2 buffer");
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
        }
    }

    if let Ok(mut slot) = latest.lock() {
        *slot = None;
    }
    drop(stream);
    drop(dev);
    info!(device = index, "V4L2 capture stopped");
}
