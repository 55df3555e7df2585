use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use signstream::config::{CameraBackend, ClientConfig};
use signstream::kernel::event::SessionNotice;
use signstream::services::recognizer::upload::UploadClient;
use signstream::vision::capture::CameraSource;
use signstream::vision::synthetic::SyntheticCamera;
use signstream::SessionController;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "signstream", version, about = "Live sign-language transcript client")]
struct Cli {
    /// JSON config file. Command-line flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream camera frames to the recognizer and print the transcript.
    Live(LiveArgs),
    /// Classify a single image file.
    Classify(ClassifyArgs),
}

#[derive(Args)]
struct LiveArgs {
    /// Recognizer WebSocket endpoint.
    #[arg(long, env = "SIGNSTREAM_ENDPOINT")]
    endpoint: Option<String>,
    /// Sampling interval in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,
    /// JPEG quality (1-100).
    #[arg(long)]
    quality: Option<u8>,
    /// Camera backend: synthetic or v4l2.
    #[arg(long, value_parser = parse_backend)]
    camera: Option<CameraBackend>,
    /// V4L2 device index.
    #[arg(long)]
    device: Option<usize>,
    /// Stop after this many seconds instead of waiting for Ctrl+C.
    #[arg(long)]
    duration_secs: Option<u64>,
    /// Write the latest annotated frame from the recognizer here when the session ends.
    #[arg(long)]
    save_annotated: Option<PathBuf>,
}

#[derive(Args)]
struct ClassifyArgs {
    /// Image to upload (.png, .jpg, .jpeg).
    file: PathBuf,
    /// Recognizer HTTP origin.
    #[arg(long, env = "SIGNSTREAM_ORIGIN")]
    origin: Option<String>,
}

fn parse_backend(raw: &str) -> Result<CameraBackend, String> {
    match raw.to_ascii_lowercase().as_str() {
        "synthetic" => Ok(CameraBackend::Synthetic),
        "v4l2" => Ok(CameraBackend::V4l2),
        other => Err(format!("unknown camera backend '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClientConfig::new(),
    };

    match cli.command {
        Command::Live(args) => {
            apply_live_overrides(&mut config, &args);
            run_live(config, args).await
        }
        Command::Classify(args) => {
            if let Some(origin) = args.origin {
                config.origin = origin;
            }
            let client = UploadClient::new(&config.origin)?;
            let result = client.classify_file(&args.file).await?;
            println!("Detected sign: {}", result.label);
            println!("Annotated image: {}", result.image_url);
            Ok(())
        }
    }
}

fn apply_live_overrides(config: &mut ClientConfig, args: &LiveArgs) {
    if let Some(endpoint) = &args.endpoint {
        config.session.endpoint = endpoint.clone();
    }
    if let Some(ms) = args.interval_ms {
        config.session.sample_interval_ms = ms;
    }
    if let Some(quality) = args.quality {
        config.session.jpeg_quality = quality;
    }
    if let Some(backend) = args.camera {
        config.camera.backend = backend;
    }
    if let Some(device) = args.device {
        config.camera.device_index = device;
    }
}

fn build_camera(config: &ClientConfig) -> Result<Arc<dyn CameraSource>> {
    let camera = &config.camera;
    match camera.backend {
        CameraBackend::Synthetic => Ok(Arc::new(SyntheticCamera::new(camera.width, camera.height))),
        #[cfg(all(target_os = "linux", feature = "v4l2"))]
        CameraBackend::V4l2 => Ok(Arc::new(signstream::vision::v4l2::V4l2Camera::new(
            camera.device_index,
            camera.width,
            camera.height,
        ))),
        #[cfg(not(all(target_os = "linux", feature = "v4l2")))]
        CameraBackend::V4l2 => bail!("this build has no V4L2 support (rebuild with --features v4l2)"),
    }
}

async fn run_live(config: ClientConfig, args: LiveArgs) -> Result<()> {
    let camera = build_camera(&config)?;
    let mut controller = SessionController::new(config.session.clone(), camera)?;

    tracing::info!("Starting live session against {}", config.session.endpoint);
    controller.start().await?;

    let deadline = async {
        match args.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted.");
                break;
            }
            _ = &mut deadline => break,
            notice = controller.next_notice() => match notice {
                Some(SessionNotice::Connected) => println!("-- connected, signing is live --"),
                Some(SessionNotice::SignAccepted(label)) => {
                    println!("{:>3}. {}", controller.transcript().len(), label);
                }
                Some(SessionNotice::TransportLost(e)) => {
                    // No automatic reconnect; the user restarts the session.
                    eprintln!("Connection lost: {}. Run again to start a new session.", e);
                    break;
                }
                None => break,
            },
        }
    }

    if let Some(path) = &args.save_annotated {
        match controller.latest_annotated_frame() {
            Some(jpeg) => {
                tokio::fs::write(path, jpeg)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Saved annotated frame to {}", path.display());
            }
            None => println!("No annotated frame received."),
        }
    }

    let stats = controller.stats();
    controller.stop();
    tracing::info!(
        ticks = stats.ticks,
        frames_sent = stats.frames_sent,
        frames_dropped = stats.frames_dropped,
        labels_accepted = stats.labels_accepted,
        "Session ended."
    );
    Ok(())
}
