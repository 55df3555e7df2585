#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use image::{Rgb, RgbImage};
use signstream::error::CaptureError;
use signstream::vision::capture::{CameraHandle, CameraSource};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

pub fn label(label: &str) -> String {
    serde_json::json!({ "label": label }).to_string()
}

/// A detection that echoes back an annotated JPEG.
pub fn annotated(label: &str, jpeg: &[u8]) -> String {
    serde_json::json!({ "label": label, "image": STANDARD.encode(jpeg) }).to_string()
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// What the fake recognizer does on each connection.
#[derive(Clone, Default)]
pub struct Script {
    /// Sent right after the handshake, in order.
    pub greeting: Vec<String>,
    /// Sent back for every frame received.
    pub reply_per_frame: Option<String>,
    /// Close the socket once the greeting is out.
    pub close_after_greeting: bool,
}

/// In-process WebSocket recognizer that counts what it sees.
pub struct FakeRecognizer {
    addr: SocketAddr,
    pub accepted: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub frames: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeRecognizer {
    pub async fn spawn(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake recognizer");
        let addr = listener.local_addr().expect("local addr");
        let accepted = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let frames = Arc::new(AtomicUsize::new(0));

        let (acc, clo, fra) = (accepted.clone(), closed.clone(), frames.clone());
        let task = tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let script = script.clone();
                let (accepted, closed, frames) = (acc.clone(), clo.clone(), fra.clone());
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                        return;
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);

                    for message in &script.greeting {
                        if ws.send(Message::Text(message.clone())).await.is_err() {
                            closed.fetch_add(1, Ordering::SeqCst);
                            return;
                        }
                    }
                    if script.close_after_greeting {
                        let _ = ws.close(None).await;
                        closed.fetch_add(1, Ordering::SeqCst);
                        return;
                    }

                    while let Some(message) = ws.next().await {
                        match message {
                            Ok(Message::Text(text)) if text.starts_with("data:image/jpeg;base64,") => {
                                frames.fetch_add(1, Ordering::SeqCst);
                                if let Some(reply) = &script.reply_per_frame {
                                    let _ = ws.send(Message::Text(reply.clone())).await;
                                }
                            }
                            Ok(Message::Close(_)) | Err(_) => break,
                            Ok(_) => {}
                        }
                    }
                    closed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            accepted,
            closed,
            frames,
            task,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

impl Drop for FakeRecognizer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Camera that counts acquisitions and track stops.
#[derive(Clone, Default)]
pub struct CountingCamera {
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
    fail_with: Option<CaptureError>,
}

impl CountingCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(err: CaptureError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::default()
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraSource for CountingCamera {
    async fn acquire(&self) -> Result<Arc<dyn CameraHandle>, CaptureError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CountingHandle {
            live: AtomicBool::new(true),
            released: self.released.clone(),
        }))
    }
}

struct CountingHandle {
    live: AtomicBool,
    released: Arc<AtomicUsize>,
}

impl CameraHandle for CountingHandle {
    fn current_frame(&self) -> Result<RgbImage, CaptureError> {
        if !self.live.load(Ordering::SeqCst) {
            return Err(CaptureError::Released);
        }
        Ok(RgbImage::from_pixel(64, 48, Rgb([30, 160, 90])))
    }

    fn stop_tracks(&self) {
        // Counts every call so a double release shows up.
        self.live.store(false, Ordering::SeqCst);
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
