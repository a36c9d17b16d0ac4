//! Chunked video container for the image substream
//!
//! The `vid` container fixes the frame geometry once in a file header and
//! stores frames as length-prefixed chunks, so a replay can seek through
//! it without per-frame geometry headers. Layout, all little-endian:
//!
//! ```text
//! magic "RVID" | version u8 | channels u8 | width u32 | height u32
//! fps f64 | frame_count u32 | (len u32, samples)...
//! ```
//!
//! `frame_count` is written as zero when the file is created and patched
//! in place when the writer finishes. A reader that sees a zero count
//! treats the container as unfinished and reads until end of file, so a
//! recording interrupted before the patch is still replayable.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, warn};

use crate::error::{RecordingError, Result, ResultExt};
use crate::frame::{FrameShape, ImageView};

use super::DecodedImage;

const MAGIC: [u8; 4] = *b"RVID";
const FORMAT_VERSION: u8 = 1;
/// Byte offset of `frame_count` within the file header
const FRAME_COUNT_OFFSET: u64 = 22;

/// Writes image frames to a `vid` container
#[derive(Debug)]
pub struct VideoWriter {
    out: BufWriter<File>,
    shape: FrameShape,
    frames: u32,
}

impl VideoWriter {
    /// Create the container and write its header with a zero frame count
    pub fn create(path: &Path, fps: f64, shape: &FrameShape) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create video container {}", path.display()))?;
        let mut out = BufWriter::new(file);
        out.write_all(&MAGIC)?;
        out.write_u8(FORMAT_VERSION)?;
        out.write_u8(shape.channels)?;
        out.write_u32::<LittleEndian>(shape.width)?;
        out.write_u32::<LittleEndian>(shape.height)?;
        out.write_f64::<LittleEndian>(fps)?;
        out.write_u32::<LittleEndian>(0)?;
        Ok(Self {
            out,
            shape: *shape,
            frames: 0,
        })
    }

    /// Append one frame; its geometry must match the container header
    pub fn write_frame(&mut self, frame: &ImageView<'_>) -> Result<()> {
        if frame.width != self.shape.width
            || frame.height != self.shape.height
            || frame.channels != self.shape.channels
        {
            return Err(RecordingError::ContainerMismatch(format!(
                "frame is {}x{}x{} but the container is {}x{}x{}",
                frame.width,
                frame.height,
                frame.channels,
                self.shape.width,
                self.shape.height,
                self.shape.channels
            )));
        }
        self.out.write_u32::<LittleEndian>(frame.data.len() as u32)?;
        self.out.write_all(frame.data)?;
        self.frames += 1;
        Ok(())
    }

    /// Patch the header frame count and flush
    pub fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        self.out.seek(SeekFrom::Start(FRAME_COUNT_OFFSET))?;
        self.out.write_u32::<LittleEndian>(self.frames)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Reads image frames from a `vid` container
#[derive(Debug)]
pub struct VideoReader {
    input: BufReader<File>,
    path: PathBuf,
    shape: FrameShape,
    total: u32,
    read: u32,
}

impl VideoReader {
    /// Open the container and validate its header against the session
    /// geometry
    pub fn open(path: &Path, expected: &FrameShape) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open video container {}", path.display()))?;
        let mut input = BufReader::new(file);

        let mut magic = [0u8; 4];
        input.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(RecordingError::ContainerMismatch(format!(
                "{} is not a video container",
                path.display()
            )));
        }
        let version = input.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(RecordingError::ContainerMismatch(format!(
                "unsupported video container version {} in {}",
                version,
                path.display()
            )));
        }
        let channels = input.read_u8()?;
        let width = input.read_u32::<LittleEndian>()?;
        let height = input.read_u32::<LittleEndian>()?;
        let fps = input.read_f64::<LittleEndian>()?;
        let total = input.read_u32::<LittleEndian>()?;

        if width != expected.width || height != expected.height || channels != expected.channels {
            return Err(RecordingError::ContainerMismatch(format!(
                "video container {} is {}x{}x{} but the session parameters say {}x{}x{}",
                path.display(),
                width,
                height,
                channels,
                expected.width,
                expected.height,
                expected.channels
            )));
        }
        debug!(
            path = %path.display(),
            fps,
            frames = total,
            "opened video container"
        );

        Ok(Self {
            input,
            path: path.to_path_buf(),
            shape: *expected,
            total,
            read: 0,
        })
    }

    /// Read the next frame; `Ok(None)` once the substream ends
    pub fn read_frame(&mut self) -> Result<Option<DecodedImage>> {
        if self.total > 0 && self.read == self.total {
            return Ok(None);
        }
        let len = match self.input.read_u32::<LittleEndian>() {
            Ok(value) => value,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                if self.total > 0 {
                    warn!(
                        path = %self.path.display(),
                        declared = self.total,
                        read = self.read,
                        "video container ended before its declared frame count"
                    );
                }
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let expected = self.shape.image_elements();
        if len as usize != expected {
            return Err(RecordingError::ContainerMismatch(format!(
                "frame chunk of {} bytes in {} does not match the {} byte geometry",
                len,
                self.path.display(),
                expected
            )));
        }
        let mut data = vec![0u8; expected];
        match self.input.read_exact(&mut data) {
            Ok(()) => {
                self.read += 1;
                Ok(Some(DecodedImage {
                    width: self.shape.width,
                    height: self.shape.height,
                    channels: self.shape.channels,
                    data,
                }))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                warn!(path = %self.path.display(), "video container ends inside a frame");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn shape() -> FrameShape {
        FrameShape {
            width: 2,
            height: 2,
            channels: 3,
        }
    }

    #[test]
    fn test_video_round_trip_with_frame_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.vid");

        let mut writer = VideoWriter::create(&path, 30.0, &shape()).unwrap();
        for value in 0..3u8 {
            let data = vec![value; 12];
            writer
                .write_frame(&ImageView {
                    width: 2,
                    height: 2,
                    channels: 3,
                    data: &data,
                })
                .unwrap();
        }
        writer.finish().unwrap();

        let mut reader = VideoReader::open(&path, &shape()).unwrap();
        assert_eq!(reader.total, 3);
        for value in 0..3u8 {
            let frame = reader.read_frame().unwrap().unwrap();
            assert_eq!(frame.data, vec![value; 12]);
        }
        assert!(reader.read_frame().unwrap().is_none());
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_unfinished_container_reads_until_eof() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.vid");

        // A container that never got its frame count patched
        {
            let mut out = BufWriter::new(File::create(&path).unwrap());
            out.write_all(&MAGIC).unwrap();
            out.write_u8(FORMAT_VERSION).unwrap();
            out.write_u8(3).unwrap();
            out.write_u32::<LittleEndian>(2).unwrap();
            out.write_u32::<LittleEndian>(2).unwrap();
            out.write_f64::<LittleEndian>(15.0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            for value in 0..2u8 {
                out.write_u32::<LittleEndian>(12).unwrap();
                out.write_all(&[value; 12]).unwrap();
            }
            out.flush().unwrap();
        }

        let mut reader = VideoReader::open(&path, &shape()).unwrap();
        assert!(reader.read_frame().unwrap().is_some());
        assert!(reader.read_frame().unwrap().is_some());
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_geometry_mismatch_rejected_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.vid");

        let mut writer = VideoWriter::create(&path, 30.0, &shape()).unwrap();
        writer.finish().unwrap();

        let other = FrameShape {
            width: 4,
            height: 2,
            channels: 3,
        };
        assert!(matches!(
            VideoReader::open(&path, &other),
            Err(RecordingError::ContainerMismatch(_))
        ));
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.vid");
        std::fs::write(&path, b"AVI!not-our-container").unwrap();

        assert!(matches!(
            VideoReader::open(&path, &shape()),
            Err(RecordingError::ContainerMismatch(_))
        ));
    }

    #[test]
    fn test_mismatched_frame_geometry_rejected_on_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.vid");

        let mut writer = VideoWriter::create(&path, 30.0, &shape()).unwrap();
        let data = vec![0u8; 6];
        let result = writer.write_frame(&ImageView {
            width: 2,
            height: 1,
            channels: 3,
            data: &data,
        });
        assert!(matches!(
            result,
            Err(RecordingError::ContainerMismatch(_))
        ));
    }
}
