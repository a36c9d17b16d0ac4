//! Container format backends for the recorded substreams
//!
//! A session persists its two substreams through one backend each. The
//! format of a backend is chosen by a tag that is also the file extension,
//! so a session directory is self-describing:
//!
//! - [`ImageFormat`] - `bin` (self-describing frame headers) or `vid`
//!   (fixed-geometry chunked container)
//! - [`DepthFormat`] - `bin`
//! - [`ParameterFormat`] - `json` or `toml` for the parameter descriptor
//!
//! The tags form closed sets: a string that parses is guaranteed to have a
//! working backend, and a string that does not parse fails before any file
//! is touched. Every backend accepts both payload representations on write
//! and produces geometry-carrying decoded frames on read.

pub mod binary;
pub mod video;

pub use binary::{BinaryDepthReader, BinaryDepthWriter, BinaryImageReader, BinaryImageWriter};
pub use video::{VideoReader, VideoWriter};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{RecordingError, Result};
use crate::frame::{millimeters_to_meters, meters_to_millimeters, DepthView, FrameShape, ImageView};

/// Container format of the image substream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// Binary container with per-frame geometry headers
    #[default]
    Bin,
    /// Chunked video container with one geometry header per file
    Vid,
}

impl ImageFormat {
    /// File extension carried by this format's recordings
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Bin => "bin",
            ImageFormat::Vid => "vid",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = RecordingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bin" => Ok(ImageFormat::Bin),
            "vid" => Ok(ImageFormat::Vid),
            _ => Err(RecordingError::UnknownFormat {
                kind: "image",
                tag: s.to_string(),
            }),
        }
    }
}

/// Container format of the depth substream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthFormat {
    /// Binary container with per-frame geometry headers
    #[default]
    Bin,
}

impl DepthFormat {
    /// File extension carried by this format's recordings
    pub fn extension(&self) -> &'static str {
        match self {
            DepthFormat::Bin => "bin",
        }
    }
}

impl fmt::Display for DepthFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DepthFormat {
    type Err = RecordingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bin" => Ok(DepthFormat::Bin),
            _ => Err(RecordingError::UnknownFormat {
                kind: "depth",
                tag: s.to_string(),
            }),
        }
    }
}

/// Serialization format of the parameter descriptor file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterFormat {
    #[default]
    Json,
    Toml,
}

impl ParameterFormat {
    /// Probe order used when discovering which format a session was
    /// recorded with
    pub const PROBE_ORDER: [ParameterFormat; 2] = [ParameterFormat::Json, ParameterFormat::Toml];

    /// File extension carried by this format's parameter files
    pub fn extension(&self) -> &'static str {
        match self {
            ParameterFormat::Json => "json",
            ParameterFormat::Toml => "toml",
        }
    }
}

impl fmt::Display for ParameterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ParameterFormat {
    type Err = RecordingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(ParameterFormat::Json),
            "toml" => Ok(ParameterFormat::Toml),
            _ => Err(RecordingError::UnknownFormat {
                kind: "parameter",
                tag: s.to_string(),
            }),
        }
    }
}

/// A decoded image frame with the geometry the container recorded for it
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

/// Sample buffer of a decoded depth frame
#[derive(Debug, Clone)]
pub enum DepthSampleBuffer {
    Millimeters(Vec<u16>),
    Meters(Vec<f64>),
}

impl DepthSampleBuffer {
    /// Samples in f64 meters, upconverting persisted millimeters
    pub fn into_meters(self) -> Vec<f64> {
        match self {
            DepthSampleBuffer::Millimeters(samples) => {
                samples.into_iter().map(millimeters_to_meters).collect()
            }
            DepthSampleBuffer::Meters(samples) => samples,
        }
    }

    /// Samples in u16 millimeters, truncating persisted meters
    pub fn into_millimeters(self) -> Vec<u16> {
        match self {
            DepthSampleBuffer::Millimeters(samples) => samples,
            DepthSampleBuffer::Meters(samples) => {
                samples.into_iter().map(meters_to_millimeters).collect()
            }
        }
    }
}

/// A decoded depth frame with the geometry the container recorded for it
#[derive(Debug, Clone)]
pub struct DecodedDepth {
    pub width: u32,
    pub height: u32,
    pub samples: DepthSampleBuffer,
}

/// Write side of the image substream
#[derive(Debug)]
pub enum ImageWriteBackend {
    Binary(BinaryImageWriter),
    Video(VideoWriter),
}

impl ImageWriteBackend {
    /// Create the container file for the given format
    pub fn create(format: ImageFormat, path: &Path, fps: f64, shape: &FrameShape) -> Result<Self> {
        match format {
            ImageFormat::Bin => Ok(ImageWriteBackend::Binary(BinaryImageWriter::create(path)?)),
            ImageFormat::Vid => Ok(ImageWriteBackend::Video(VideoWriter::create(
                path, fps, shape,
            )?)),
        }
    }

    pub fn write_frame(&mut self, frame: &ImageView<'_>) -> Result<()> {
        match self {
            ImageWriteBackend::Binary(writer) => writer.write_frame(frame),
            ImageWriteBackend::Video(writer) => writer.write_frame(frame),
        }
    }

    /// Flush and finalize the container
    pub fn finish(&mut self) -> Result<()> {
        match self {
            ImageWriteBackend::Binary(writer) => writer.finish(),
            ImageWriteBackend::Video(writer) => writer.finish(),
        }
    }
}

/// Read side of the image substream
#[derive(Debug)]
pub enum ImageReadBackend {
    Binary(BinaryImageReader),
    Video(VideoReader),
}

impl ImageReadBackend {
    /// Open the container; `shape` is the session geometry used by
    /// fixed-geometry containers for validation
    pub fn open(format: ImageFormat, path: &Path, shape: &FrameShape) -> Result<Self> {
        match format {
            ImageFormat::Bin => Ok(ImageReadBackend::Binary(BinaryImageReader::open(path)?)),
            ImageFormat::Vid => Ok(ImageReadBackend::Video(VideoReader::open(path, shape)?)),
        }
    }

    pub fn read_frame(&mut self) -> Result<Option<DecodedImage>> {
        match self {
            ImageReadBackend::Binary(reader) => reader.read_frame(),
            ImageReadBackend::Video(reader) => reader.read_frame(),
        }
    }
}

/// Write side of the depth substream
#[derive(Debug)]
pub enum DepthWriteBackend {
    Binary(BinaryDepthWriter),
}

impl DepthWriteBackend {
    pub fn create(format: DepthFormat, path: &Path) -> Result<Self> {
        match format {
            DepthFormat::Bin => Ok(DepthWriteBackend::Binary(BinaryDepthWriter::create(path)?)),
        }
    }

    pub fn write_frame(&mut self, frame: &DepthView<'_>) -> Result<()> {
        match self {
            DepthWriteBackend::Binary(writer) => writer.write_frame(frame),
        }
    }

    /// Flush and finalize the container
    pub fn finish(&mut self) -> Result<()> {
        match self {
            DepthWriteBackend::Binary(writer) => writer.finish(),
        }
    }
}

/// Read side of the depth substream
#[derive(Debug)]
pub enum DepthReadBackend {
    Binary(BinaryDepthReader),
}

impl DepthReadBackend {
    pub fn open(format: DepthFormat, path: &Path) -> Result<Self> {
        match format {
            DepthFormat::Bin => Ok(DepthReadBackend::Binary(BinaryDepthReader::open(path)?)),
        }
    }

    pub fn read_frame(&mut self) -> Result<Option<DecodedDepth>> {
        match self {
            DepthReadBackend::Binary(reader) => reader.read_frame(),
        }
    }
}
