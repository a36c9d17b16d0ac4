//! # rgbd-record: RGB-D Session Recorder
//!
//! Records and replays synchronized color/depth frame streams as numbered
//! sessions on disk. The architecture separates frame production from
//! persistence: a capture loop pulls frame pairs from a source and hands
//! them to an asynchronous writer, which rotates and encodes them on a
//! dedicated worker thread behind a fixed-capacity ring buffer.
//!
//! ## Architecture
//!
//! - **Frames**: color and depth payloads in either a structured or a raw
//!   representation, with the rotation and unit conversions between them
//! - **Backends**: container codecs for the image and depth substreams
//! - **Sessions**: numbered parameter/image/depth file triples, resolved
//!   on disk with append and overwrite semantics
//! - **Capture**: a thin loop between a frame source and the writer
//!
//! ## Configuration
//!
//! Two JSON files in the config directory (named by the
//! `RGBD_RECORD_CONFIG_DIR` environment variable, defaulting to the
//! working directory) drive a run:
//!
//! - `recording.cfg` - output directory and writer ring capacity
//! - `capture.cfg` - replay selection, re-record switch, formats
//!
//! ## Example
//!
//! ```ignore
//! use rgbd_record::{
//!     capture::{CaptureSession, ReplaySource},
//!     config::RecordingConfig,
//!     frame::Rotation,
//!     session::{WriteSession, WriterOptions},
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = RecordingConfig::new("./sessions", 32)?;
//!
//!     // Replay the latest recorded session...
//!     let replay = ReplaySource::open(&config, None)?;
//!
//!     // ...and re-record it into a new session with a half turn
//!     let options = WriterOptions {
//!         rotation: Rotation::Rot180,
//!         ..WriterOptions::default()
//!     };
//!     let writer = WriteSession::with_parameters(&config, options, replay.parameters())?;
//!
//!     let summary = CaptureSession::new(replay, Some(writer)).run()?;
//!     println!("copied {} frames", summary.frames);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod session;

// Re-export commonly used types
pub use capture::{CaptureSession, ChannelFrameSource, FrameSet, FrameSource, ReplaySource};
pub use config::{CaptureOptions, RecordingConfig};
pub use error::{RecordingError, Result};
pub use frame::{ColorFrame, DepthFrame, DepthPayload, ImagePayload, PayloadKind, Rotation};
pub use session::{FramePair, ReadSession, RecordingParameters, WriteSession, WriterOptions};
