//! RGB-D Session Runner - Main Entry Point
//!
//! Replays a recorded session and, when the capture options ask for it,
//! re-records the replayed frames into a new session with the configured
//! formats and orientation.

use anyhow::Context;
use rgbd_record::{
    capture::{CaptureSession, ReplaySource},
    config::{self, CaptureOptions, RecordingConfig},
    frame::PayloadKind,
    session::{WriteSession, WriterOptions},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rgbd_record=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RGB-D session runner");

    let config_path = config::recording_config_path();
    let config = RecordingConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let options_path = config::capture_options_path();
    let options = match CaptureOptions::load(&options_path) {
        Ok(options) => options,
        Err(e) => {
            tracing::warn!("Failed to load capture options: {}; using defaults", e);
            CaptureOptions::default()
        }
    };

    let replay = ReplaySource::open(&config, options.recorded_file_number)?;
    tracing::info!(
        session = replay.session_number(),
        fps = replay.parameters().fps,
        "replaying session"
    );

    let writer = if options.with_record {
        let writer_options = WriterOptions {
            image_format: options.image_format()?,
            depth_format: options.depth_format()?,
            parameters_format: options.parameters_format()?,
            rotation: options.rotation()?,
            payload: PayloadKind::Structured,
            session: None,
        };
        let writer = WriteSession::with_parameters(&config, writer_options, replay.parameters())?;
        tracing::info!(
            session = writer.session_number(),
            "re-recording into a new session"
        );
        Some(writer)
    } else {
        None
    };

    let summary = CaptureSession::new(replay, writer).run()?;
    tracing::info!(
        frames = summary.frames,
        elapsed_s = summary.elapsed.as_secs_f64(),
        "Shutting down"
    );
    Ok(())
}
