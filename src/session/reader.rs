//! Session replay
//!
//! [`ReadSession`] resolves a recorded session on disk and pulls paired
//! image/depth frames from its two container files. A pull always
//! advances both substreams together; when one ends before the other the
//! recording is desynchronized, which is logged as a warning and ends
//! the session like a normal end of stream.
//!
//! Containers are opened lazily on the first pull. The payload
//! representation of the returned pairs is chosen at open time and never
//! changes for the lifetime of the session.

use tracing::{debug, info, warn};

use crate::backend::{DecodedDepth, DecodedImage, DepthReadBackend, ImageReadBackend};
use crate::config::RecordingConfig;
use crate::error::Result;
use crate::frame::{ColorFrame, DepthFrame, DepthPayload, ImagePayload, PayloadKind};
use crate::session::parameters::{Intrinsics, RecordingParameters};
use crate::session::paths::{resolve_read, SessionFilePaths};

/// One pulled frame pair
#[derive(Debug, Clone)]
pub struct FramePair {
    pub image: ImagePayload,
    pub depth: DepthPayload,
}

#[derive(Debug)]
enum ReadState {
    /// Resolved but no container opened yet
    Ready,
    /// Containers open, frames remaining
    Streaming {
        image: ImageReadBackend,
        depth: DepthReadBackend,
    },
    /// Either substream ended; every further pull returns `None`
    Exhausted,
}

/// Reader of one recorded session
#[derive(Debug)]
pub struct ReadSession {
    parameters: RecordingParameters,
    paths: SessionFilePaths,
    session_number: u32,
    payload_kind: PayloadKind,
    state: ReadState,
    frames_pulled: u64,
}

impl ReadSession {
    /// Resolve and open a recorded session
    ///
    /// `session` selects an explicit session number; `None` picks the
    /// last complete session of the contiguous run starting at zero.
    pub fn open(
        config: &RecordingConfig,
        session: Option<u32>,
        payload: PayloadKind,
    ) -> Result<Self> {
        let mut parameters = RecordingParameters::default();
        let (paths, session_number) = resolve_read(config, &mut parameters, session)?;
        info!(session = session_number, payload = %payload, "read session opened");
        Ok(Self {
            parameters,
            paths,
            session_number,
            payload_kind: payload,
            state: ReadState::Ready,
            frames_pulled: 0,
        })
    }

    pub fn parameters(&self) -> &RecordingParameters {
        &self.parameters
    }

    pub fn intrinsics(&self) -> Intrinsics {
        self.parameters.intrinsics()
    }

    pub fn session_number(&self) -> u32 {
        self.session_number
    }

    pub fn payload_kind(&self) -> PayloadKind {
        self.payload_kind
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, ReadState::Exhausted)
    }

    /// Number of pairs pulled so far
    pub fn frames_pulled(&self) -> u64 {
        self.frames_pulled
    }

    /// Pull the next frame pair
    ///
    /// Returns `Ok(None)` once the session is exhausted. Container-level
    /// failures (unreadable file, geometry mismatch) surface as errors.
    pub fn pull(&mut self) -> Result<Option<FramePair>> {
        let kind = self.payload_kind;
        loop {
            match &mut self.state {
                ReadState::Exhausted => return Ok(None),
                ReadState::Ready => {
                    let shape = self.parameters.shape();
                    let image = ImageReadBackend::open(
                        self.parameters.image_format,
                        &self.paths.image,
                        &shape,
                    )?;
                    let depth =
                        DepthReadBackend::open(self.parameters.depth_format, &self.paths.depth)?;
                    debug!(session = self.session_number, "containers opened");
                    self.state = ReadState::Streaming { image, depth };
                }
                ReadState::Streaming { image, depth } => {
                    let image_frame = image.read_frame()?;
                    let depth_frame = depth.read_frame()?;
                    return match (image_frame, depth_frame) {
                        (Some(image), Some(depth)) => {
                            self.frames_pulled += 1;
                            Ok(Some(make_pair(kind, image, depth)))
                        }
                        (None, None) => {
                            debug!(frames = self.frames_pulled, "session exhausted");
                            self.state = ReadState::Exhausted;
                            Ok(None)
                        }
                        (Some(_), None) => {
                            warn!(
                                frames = self.frames_pulled,
                                "depth stream ended before the image stream; \
                                 recording is desynchronized"
                            );
                            self.state = ReadState::Exhausted;
                            Ok(None)
                        }
                        (None, Some(_)) => {
                            warn!(
                                frames = self.frames_pulled,
                                "image stream ended before the depth stream; \
                                 recording is desynchronized"
                            );
                            self.state = ReadState::Exhausted;
                            Ok(None)
                        }
                    };
                }
            }
        }
    }
}

/// Convert decoded frames into the representation the session was opened
/// with
fn make_pair(kind: PayloadKind, image: DecodedImage, depth: DecodedDepth) -> FramePair {
    let image = match kind {
        PayloadKind::Structured => ImagePayload::Frame(ColorFrame::new(
            image.width,
            image.height,
            image.channels,
            image.data,
        )),
        PayloadKind::RawBytes => ImagePayload::Raw(image.data),
    };
    let depth = match kind {
        PayloadKind::Structured => DepthPayload::Map(DepthFrame::new(
            depth.width,
            depth.height,
            depth.samples.into_meters(),
        )),
        PayloadKind::RawBytes => DepthPayload::Millimeters(depth.samples.into_millimeters()),
    };
    FramePair { image, depth }
}
