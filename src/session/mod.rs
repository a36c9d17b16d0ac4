//! Session recording and replay
//!
//! A recorded session is a numbered triple of files in the output
//! directory: a parameter file describing geometry and formats, an image
//! container and a depth container. This module provides the pieces that
//! manage those triples end to end.
//!
//! # Features
//!
//! - Describe a session with a serializable parameter descriptor
//! - Resolve session numbers and file names on disk
//! - Record frame pairs asynchronously through a ring buffer
//! - Replay recorded sessions as paired image/depth pulls

pub mod parameters;
pub mod paths;
pub mod reader;
pub mod writer;

pub use parameters::{DistortionModel, Intrinsics, RecordingParameters, StreamProfile};
pub use paths::{resolve_read, resolve_write, SessionFilePaths};
pub use reader::{FramePair, ReadSession};
pub use writer::{WriteSession, WriterOptions};
