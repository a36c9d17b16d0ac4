//! Self-describing binary frame containers
//!
//! The `bin` container is a flat sequence of frames, each preceded by a
//! little-endian header of `height: u32, width: u32, pixel_type: u8,
//! channels: u8`. Image frames hold interleaved u8 samples; depth frames
//! hold u16 millimeter samples (f64 meter samples are accepted on read).
//!
//! A clean end of file before a header is the end of the substream. A file
//! that ends in the middle of a frame is reported as end of data with a
//! warning, so a recording cut short by a crash stays readable.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;

use crate::error::{RecordingError, Result, ResultExt};
use crate::frame::{meters_to_millimeters, DepthSamples, DepthView, ImageView, PixelType};

use super::{DecodedDepth, DecodedImage, DepthSampleBuffer};

/// Writes image frames to a `bin` container
#[derive(Debug)]
pub struct BinaryImageWriter {
    out: BufWriter<File>,
}

impl BinaryImageWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create image container {}", path.display()))?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    pub fn write_frame(&mut self, frame: &ImageView<'_>) -> Result<()> {
        self.out.write_u32::<LittleEndian>(frame.height)?;
        self.out.write_u32::<LittleEndian>(frame.width)?;
        self.out.write_u8(PixelType::U8.tag())?;
        self.out.write_u8(frame.channels)?;
        self.out.write_all(frame.data)?;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Reads image frames from a `bin` container
#[derive(Debug)]
pub struct BinaryImageReader {
    input: BufReader<File>,
    path: PathBuf,
}

impl BinaryImageReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open image container {}", path.display()))?;
        Ok(Self {
            input: BufReader::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Read the next frame; `Ok(None)` once the substream ends
    pub fn read_frame(&mut self) -> Result<Option<DecodedImage>> {
        let height = match self.input.read_u32::<LittleEndian>() {
            Ok(value) => value,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (width, pixel_tag, channels) = match self.read_header_rest() {
            Ok(rest) => rest,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                warn!(path = %self.path.display(), "image container ends inside a frame header");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let pixel = PixelType::from_tag(pixel_tag).ok_or_else(|| {
            RecordingError::ContainerMismatch(format!(
                "unknown pixel type tag {} in {}",
                pixel_tag,
                self.path.display()
            ))
        })?;
        if pixel != PixelType::U8 {
            return Err(RecordingError::ContainerMismatch(format!(
                "image container {} holds {} samples",
                self.path.display(),
                pixel
            )));
        }
        let mut data = vec![0u8; height as usize * width as usize * channels as usize];
        match self.input.read_exact(&mut data) {
            Ok(()) => Ok(Some(DecodedImage {
                width,
                height,
                channels,
                data,
            })),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                warn!(path = %self.path.display(), "image container ends inside a frame");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_header_rest(&mut self) -> io::Result<(u32, u8, u8)> {
        let width = self.input.read_u32::<LittleEndian>()?;
        let pixel_tag = self.input.read_u8()?;
        let channels = self.input.read_u8()?;
        Ok((width, pixel_tag, channels))
    }
}

/// Writes depth frames to a `bin` container
///
/// Samples are always persisted as u16 millimeters; meter samples are
/// truncated during the write.
#[derive(Debug)]
pub struct BinaryDepthWriter {
    out: BufWriter<File>,
}

impl BinaryDepthWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create depth container {}", path.display()))?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    pub fn write_frame(&mut self, frame: &DepthView<'_>) -> Result<()> {
        self.out.write_u32::<LittleEndian>(frame.height)?;
        self.out.write_u32::<LittleEndian>(frame.width)?;
        self.out.write_u8(PixelType::U16.tag())?;
        self.out.write_u8(1)?;
        match frame.samples {
            DepthSamples::Millimeters(samples) => {
                for &sample in samples {
                    self.out.write_u16::<LittleEndian>(sample)?;
                }
            }
            DepthSamples::Meters(samples) => {
                for &sample in samples {
                    self.out
                        .write_u16::<LittleEndian>(meters_to_millimeters(sample))?;
                }
            }
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Reads depth frames from a `bin` container
#[derive(Debug)]
pub struct BinaryDepthReader {
    input: BufReader<File>,
    path: PathBuf,
}

impl BinaryDepthReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open depth container {}", path.display()))?;
        Ok(Self {
            input: BufReader::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Read the next frame; `Ok(None)` once the substream ends
    pub fn read_frame(&mut self) -> Result<Option<DecodedDepth>> {
        let height = match self.input.read_u32::<LittleEndian>() {
            Ok(value) => value,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (width, pixel_tag, _channels) = match self.read_header_rest() {
            Ok(rest) => rest,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                warn!(path = %self.path.display(), "depth container ends inside a frame header");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let pixel = PixelType::from_tag(pixel_tag).ok_or_else(|| {
            RecordingError::ContainerMismatch(format!(
                "unknown pixel type tag {} in {}",
                pixel_tag,
                self.path.display()
            ))
        })?;
        let elements = height as usize * width as usize;
        let samples = match pixel {
            PixelType::U16 => {
                let mut samples = vec![0u16; elements];
                match self.input.read_u16_into::<LittleEndian>(&mut samples) {
                    Ok(()) => DepthSampleBuffer::Millimeters(samples),
                    Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                        warn!(path = %self.path.display(), "depth container ends inside a frame");
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            PixelType::F64 => {
                let mut samples = vec![0f64; elements];
                match self.input.read_f64_into::<LittleEndian>(&mut samples) {
                    Ok(()) => DepthSampleBuffer::Meters(samples),
                    Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                        warn!(path = %self.path.display(), "depth container ends inside a frame");
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            PixelType::U8 => {
                return Err(RecordingError::ContainerMismatch(format!(
                    "depth container {} holds u8 samples",
                    self.path.display()
                )))
            }
        };
        Ok(Some(DecodedDepth {
            width,
            height,
            samples,
        }))
    }

    fn read_header_rest(&mut self) -> io::Result<(u32, u8, u8)> {
        let width = self.input.read_u32::<LittleEndian>()?;
        let pixel_tag = self.input.read_u8()?;
        let channels = self.input.read_u8()?;
        Ok((width, pixel_tag, channels))
    }
}
