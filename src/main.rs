use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use parley_live::{
    Config, ConnectOptions, SessionCollaborators, SessionConfig, SessionController,
    StillImageCamera, VisionClient, VisionOptions, WavFileCapture, WavFilePlayback,
};
use tracing::{error, info};

/// Live voice+vision conversation session using file-backed devices.
#[derive(Debug, Parser)]
#[command(name = "parley-live", version)]
struct Args {
    /// Config file (without extension, e.g. "config/parley-live")
    #[arg(long, default_value = "config/parley-live")]
    config: String,

    /// WAV file (16 kHz mono) standing in for the microphone
    #[arg(long)]
    mic_wav: PathBuf,

    /// JPEG file standing in for the camera
    #[arg(long)]
    camera_jpeg: PathBuf,

    /// WAV file the model's speech is written to
    #[arg(long, default_value = "model-speech.wav")]
    speaker_wav: PathBuf,

    /// Capture frame duration in milliseconds
    #[arg(long, default_value_t = 100)]
    frame_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config: {}", args.config))?;
    let api_key = cfg.resolve_api_key()?;

    let session_config = SessionConfig::default();
    info!("parley-live v{}", env!("CARGO_PKG_VERSION"));
    info!("Session: {}", session_config.session_id);

    let connect_options = ConnectOptions {
        url: cfg.api.realtime_url.clone(),
        api_key: api_key.clone(),
        connect_timeout: Duration::from_secs(cfg.api.connect_timeout_secs),
    };
    let describer = VisionClient::new(VisionOptions {
        url: cfg.api.vision_url.clone(),
        api_key,
        model: cfg.vision.model.clone(),
        prompt: cfg.vision.prompt.clone(),
        max_tokens: cfg.vision.max_tokens,
        request_timeout: Duration::from_secs(cfg.vision.request_timeout_secs),
    })?;

    let playback_rate = session_config.playback_sample_rate;
    let collaborators = SessionCollaborators {
        capture: Box::new(WavFileCapture::new(&args.mic_wav, args.frame_ms)),
        playback: Box::new(WavFilePlayback::new(&args.speaker_wav, playback_rate)),
        camera: Box::new(StillImageCamera::new(&args.camera_jpeg)),
        describer: Arc::new(describer),
    };

    let controller = SessionController::new(
        connect_options,
        session_config,
        Duration::from_millis(cfg.vision.interval_ms),
    );
    let mut faults = controller
        .take_faults()
        .await
        .context("Fault receiver already taken")?;

    controller.start(collaborators).await?;
    info!("Session running; press Ctrl-C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
        fault = faults.recv() => {
            if let Some(fault) = fault {
                error!("Session fault: {}", fault);
            }
        }
    }

    controller.stop().await?;

    let stats = controller.stats().await;
    info!(
        "Session ended after {:.1}s ({} audio frames sent, {} vision descriptions)",
        stats.duration_secs, stats.frames_sent, stats.vision_descriptions
    );

    for message in controller.conversation().snapshot().await {
        println!("{:?}: {}", message.role, message.text);
    }

    Ok(())
}
