//! Capture orchestration
//!
//! [`CaptureSession`] is a thin loop between a [`FrameSource`] and an
//! optional [`WriteSession`]: it pulls frame sets until the source ends,
//! forwards them to the writer and reports the measured frame rate about
//! once a second.
//!
//! Two sources are provided. [`ChannelFrameSource`] receives frame sets
//! from a producer thread over a bounded channel, which is how a live
//! sensor feeds the loop. [`ReplaySource`] re-emits a recorded session at
//! its original frame rate, so a recording can be reviewed or re-recorded
//! with different settings.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info};

use crate::config::RecordingConfig;
use crate::error::{RecordingError, Result};
use crate::frame::{ColorFrame, DepthFrame, DepthPayload, ImagePayload, PayloadKind};
use crate::session::parameters::{RecordingParameters, StreamProfile};
use crate::session::reader::ReadSession;
use crate::session::writer::WriteSession;

/// Time a source is given to produce the next frame set before the
/// capture loop gives up
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep margin subtracted from the replay frame interval to absorb
/// decode time
const REPLAY_PACING_MARGIN: Duration = Duration::from_millis(5);

/// One synchronized color/depth acquisition
#[derive(Debug, Clone)]
pub struct FrameSet {
    pub color: ColorFrame,
    pub depth: DepthFrame,
}

/// Supplier of synchronized frame sets
pub trait FrameSource {
    /// Produce the next frame set
    ///
    /// `Ok(None)` means the source ended normally; exceeding `timeout`
    /// without a frame is an error.
    fn next_frames(&mut self, timeout: Duration) -> Result<Option<FrameSet>>;

    /// Stream geometry and frame rate of this source
    fn profile(&self) -> StreamProfile;
}

/// Frame source fed by a producer thread over a bounded channel
///
/// The producer side closes the stream by dropping its sender.
pub struct ChannelFrameSource {
    receiver: Receiver<FrameSet>,
    profile: StreamProfile,
}

impl ChannelFrameSource {
    pub fn new(receiver: Receiver<FrameSet>, profile: StreamProfile) -> Self {
        Self { receiver, profile }
    }
}

impl FrameSource for ChannelFrameSource {
    fn next_frames(&mut self, timeout: Duration) -> Result<Option<FrameSet>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(set) => Ok(Some(set)),
            Err(RecvTimeoutError::Timeout) => Err(RecordingError::Timeout(format!(
                "no frame set within {:?}",
                timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn profile(&self) -> StreamProfile {
        self.profile
    }
}

/// Frame source that replays a recorded session at its original rate
pub struct ReplaySource {
    session: ReadSession,
    frame_delay: Duration,
    started: bool,
}

impl ReplaySource {
    /// Open a recorded session for replay
    ///
    /// `session` selects an explicit session number; `None` picks the
    /// latest complete one.
    pub fn open(config: &RecordingConfig, session: Option<u32>) -> Result<Self> {
        let session = ReadSession::open(config, session, PayloadKind::Structured)?;
        let fps = session.parameters().fps;
        let frame_delay = if fps > 0.0 {
            Duration::from_millis((1000.0 / fps) as u64).saturating_sub(REPLAY_PACING_MARGIN)
        } else {
            Duration::ZERO
        };
        debug!(
            session = session.session_number(),
            fps, "replay source opened"
        );
        Ok(Self {
            session,
            frame_delay,
            started: false,
        })
    }

    /// Descriptor of the session being replayed
    pub fn parameters(&self) -> &RecordingParameters {
        self.session.parameters()
    }

    pub fn session_number(&self) -> u32 {
        self.session.session_number()
    }
}

impl FrameSource for ReplaySource {
    fn next_frames(&mut self, _timeout: Duration) -> Result<Option<FrameSet>> {
        if self.started {
            std::thread::sleep(self.frame_delay);
        }
        self.started = true;

        let Some(pair) = self.session.pull()? else {
            return Ok(None);
        };
        match (pair.image, pair.depth) {
            (ImagePayload::Frame(color), DepthPayload::Map(depth)) => {
                Ok(Some(FrameSet { color, depth }))
            }
            (image, _) => Err(RecordingError::PayloadKindMismatch {
                expected: PayloadKind::Structured,
                actual: image.kind(),
            }),
        }
    }

    fn profile(&self) -> StreamProfile {
        let parameters = self.session.parameters();
        StreamProfile {
            fps: parameters.fps,
            intrinsics: parameters.intrinsics(),
        }
    }
}

/// Totals of one capture run
#[derive(Debug, Clone, Copy)]
pub struct CaptureSummary {
    pub frames: u64,
    pub elapsed: Duration,
}

/// Loop between a frame source and an optional writer
pub struct CaptureSession<S: FrameSource> {
    source: S,
    writer: Option<WriteSession>,
    timeout: Duration,
}

impl<S: FrameSource> CaptureSession<S> {
    /// Create a capture loop; `writer` is `None` for a view-only run
    pub fn new(source: S, writer: Option<WriteSession>) -> Self {
        Self {
            source,
            writer,
            timeout: DEFAULT_FRAME_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run until the source ends, then finish the writer
    ///
    /// Reports the measured frame rate about once a second while running.
    pub fn run(mut self) -> Result<CaptureSummary> {
        let recording = self.writer.is_some();
        info!(recording, "capture started");

        let run_start = Instant::now();
        let mut frames = 0u64;
        let mut window_start = run_start;
        let mut window_frames = 0u32;

        while let Some(set) = self.source.next_frames(self.timeout)? {
            if let Some(writer) = &mut self.writer {
                writer.push(
                    Some(ImagePayload::Frame(set.color)),
                    Some(DepthPayload::Map(set.depth)),
                    frames,
                )?;
            }
            frames += 1;
            window_frames += 1;

            let window = window_start.elapsed();
            if window >= Duration::from_secs(1) {
                let fps = window_frames as f64 / window.as_secs_f64();
                info!(fps, frames, "capturing");
                window_start = Instant::now();
                window_frames = 0;
            }
        }

        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        let summary = CaptureSummary {
            frames,
            elapsed: run_start.elapsed(),
        };
        info!(
            frames = summary.frames,
            elapsed_s = summary.elapsed.as_secs_f64(),
            "capture finished"
        );
        Ok(summary)
    }
}
