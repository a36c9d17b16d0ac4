//! Frame payloads and orientation transforms
//!
//! This module contains the data structures exchanged between the sensor
//! boundary, the session writer and the session reader.
//!
//! # Main Types
//!
//! - [`ColorFrame`] / [`DepthFrame`] - Self-describing frames that carry
//!   their own geometry
//! - [`ImagePayload`] / [`DepthPayload`] - The two payload representations
//!   a session can carry (structured frames, or raw sample buffers whose
//!   geometry comes from the session descriptor)
//! - [`Rotation`] - Quarter-turn orientation applied to frame content
//!   before it is persisted
//!
//! # Depth Units
//!
//! Depth maps are handled in f64 meters on the structured side and u16
//! millimeters on the persisted/raw side. Meters convert to millimeters by
//! truncation: 1.234 m becomes exactly 1234 mm, never 1235.

use std::fmt;

/// Number of interleaved channels in a color frame
pub const COLOR_CHANNELS: u8 = 3;

/// Element type of a persisted sample buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    /// 8-bit unsigned samples (color)
    U8,
    /// 16-bit unsigned samples (depth millimeters)
    U16,
    /// 64-bit float samples (depth meters)
    F64,
}

impl PixelType {
    /// Returns the size in bytes of one sample
    pub fn size_bytes(&self) -> usize {
        match self {
            PixelType::U8 => 1,
            PixelType::U16 => 2,
            PixelType::F64 => 8,
        }
    }

    /// Tag byte persisted in frame headers
    pub fn tag(&self) -> u8 {
        match self {
            PixelType::U8 => 0,
            PixelType::U16 => 1,
            PixelType::F64 => 2,
        }
    }

    /// Inverse of [`PixelType::tag`]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PixelType::U8),
            1 => Some(PixelType::U16),
            2 => Some(PixelType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelType::U8 => write!(f, "u8"),
            PixelType::U16 => write!(f, "u16"),
            PixelType::F64 => write!(f, "f64"),
        }
    }
}

/// Quarter-turn rotation applied to frame content before persisting
///
/// `Left90`/`Left270` swap the frame axes; the session descriptor stores
/// geometry post-rotation, so those two variants also swap width/height,
/// fx/fy and ppx/ppy at descriptor assignment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// Content persisted as captured
    #[default]
    None,
    /// Quarter turn counter-clockwise
    Left90,
    /// Half turn; dimensions are unchanged
    Rot180,
    /// Quarter turn clockwise
    Left270,
}

impl Rotation {
    /// Integer code persisted in parameter files
    pub fn code(&self) -> u8 {
        match self {
            Rotation::None => 0,
            Rotation::Left90 => 1,
            Rotation::Rot180 => 2,
            Rotation::Left270 => 3,
        }
    }

    /// Inverse of [`Rotation::code`]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Rotation::None),
            1 => Some(Rotation::Left90),
            2 => Some(Rotation::Rot180),
            3 => Some(Rotation::Left270),
            _ => None,
        }
    }

    /// True for the two quarter turns that swap frame axes
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Left90 | Rotation::Left270)
    }

    /// Dimensions of a frame after this rotation
    pub fn rotated_dims(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Dimensions a source frame must have so that the rotated frame has
    /// the given (post-rotation) dimensions
    pub fn source_dims(&self, width: u32, height: u32) -> (u32, u32) {
        // Quarter turns are their own dimensional inverse
        self.rotated_dims(width, height)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rotation::None => write!(f, "none"),
            Rotation::Left90 => write!(f, "left 90"),
            Rotation::Rot180 => write!(f, "180"),
            Rotation::Left270 => write!(f, "left 270"),
        }
    }
}

/// Convert a depth sample from meters to millimeters, truncating
#[inline]
pub fn meters_to_millimeters(meters: f64) -> u16 {
    // `as` truncates toward zero and saturates at the type bounds
    (meters * 1000.0) as u16
}

/// Convert a depth sample from millimeters to meters
#[inline]
pub fn millimeters_to_meters(millimeters: u16) -> f64 {
    millimeters as f64 / 1000.0
}

/// Rotate a single-channel sample plane, returning the rotated plane
///
/// The output dimensions follow [`Rotation::rotated_dims`]. The input
/// slice must hold exactly `width * height` samples.
pub fn rotate_plane<T: Copy + Default>(
    src: &[T],
    width: usize,
    height: usize,
    rotation: Rotation,
) -> Vec<T> {
    if rotation == Rotation::None {
        return src.to_vec();
    }
    let mut dst = vec![T::default(); width * height];
    let dst_width = match rotation {
        Rotation::Rot180 => width,
        _ => height,
    };
    for y in 0..height {
        for x in 0..width {
            let (dx, dy) = match rotation {
                Rotation::Left90 => (y, width - 1 - x),
                Rotation::Rot180 => (width - 1 - x, height - 1 - y),
                Rotation::Left270 => (height - 1 - y, x),
                Rotation::None => unreachable!(),
            };
            dst[dy * dst_width + dx] = src[y * width + x];
        }
    }
    dst
}

/// Rotate an interleaved byte buffer with `pixel_stride` bytes per pixel
pub fn rotate_interleaved(
    src: &[u8],
    width: usize,
    height: usize,
    pixel_stride: usize,
    rotation: Rotation,
) -> Vec<u8> {
    if rotation == Rotation::None {
        return src.to_vec();
    }
    let mut dst = vec![0u8; width * height * pixel_stride];
    let dst_width = match rotation {
        Rotation::Rot180 => width,
        _ => height,
    };
    for y in 0..height {
        for x in 0..width {
            let (dx, dy) = match rotation {
                Rotation::Left90 => (y, width - 1 - x),
                Rotation::Rot180 => (width - 1 - x, height - 1 - y),
                Rotation::Left270 => (height - 1 - y, x),
                Rotation::None => unreachable!(),
            };
            let s = (y * width + x) * pixel_stride;
            let d = (dy * dst_width + dx) * pixel_stride;
            dst[d..d + pixel_stride].copy_from_slice(&src[s..s + pixel_stride]);
        }
    }
    dst
}

/// Post-rotation frame geometry derived from the session descriptor
///
/// Raw payloads carry no geometry of their own; the writer and reader use
/// this shape to interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl FrameShape {
    /// Sample count of one image frame (width * height * channels)
    pub fn image_elements(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Sample count of one depth frame (width * height)
    pub fn depth_elements(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A self-describing interleaved color frame (u8 samples)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

impl ColorFrame {
    /// Create a frame from interleaved sample data
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * channels as usize
        );
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// Total payload size in bytes
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Rotate the frame content and its dimensions in place
    pub fn rotate(&mut self, rotation: Rotation) {
        if rotation == Rotation::None {
            return;
        }
        self.data = rotate_interleaved(
            &self.data,
            self.width as usize,
            self.height as usize,
            self.channels as usize,
            rotation,
        );
        let (w, h) = rotation.rotated_dims(self.width, self.height);
        self.width = w;
        self.height = h;
    }
}

/// A self-describing depth map in f64 meters
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f64>,
}

impl DepthFrame {
    /// Create a depth map from samples in meters
    pub fn new(width: u32, height: u32, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            width,
            height,
            data,
        }
    }

    /// Total payload size in bytes
    pub fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f64>()
    }

    /// Rotate the map content and its dimensions in place
    pub fn rotate(&mut self, rotation: Rotation) {
        if rotation == Rotation::None {
            return;
        }
        self.data = rotate_plane(&self.data, self.width as usize, self.height as usize, rotation);
        let (w, h) = rotation.rotated_dims(self.width, self.height);
        self.width = w;
        self.height = h;
    }

    /// Convert the map to u16 millimeters, truncating each sample
    pub fn to_millimeters(&self) -> Vec<u16> {
        self.data.iter().copied().map(meters_to_millimeters).collect()
    }
}

/// Which payload representation a session carries
///
/// Chosen once when the session is created; the two representations are
/// never mixed within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadKind {
    /// Self-describing [`ColorFrame`] / [`DepthFrame`] payloads
    #[default]
    Structured,
    /// Raw sample buffers interpreted through the session descriptor
    RawBytes,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Structured => write!(f, "structured"),
            PayloadKind::RawBytes => write!(f, "raw"),
        }
    }
}

/// An image payload in either representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Self-describing frame
    Frame(ColorFrame),
    /// Raw interleaved u8 samples; geometry comes from the descriptor
    Raw(Vec<u8>),
}

impl ImagePayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            ImagePayload::Frame(_) => PayloadKind::Structured,
            ImagePayload::Raw(_) => PayloadKind::RawBytes,
        }
    }

    /// Total payload size in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            ImagePayload::Frame(frame) => frame.byte_size(),
            ImagePayload::Raw(data) => data.len(),
        }
    }

    /// Rotate the payload content in place
    ///
    /// `shape` is the post-rotation geometry from the session descriptor;
    /// raw payloads derive their source dimensions from it, structured
    /// frames describe themselves.
    pub fn rotate(&mut self, rotation: Rotation, shape: &FrameShape) {
        match self {
            ImagePayload::Frame(frame) => frame.rotate(rotation),
            ImagePayload::Raw(data) => {
                if rotation == Rotation::None {
                    return;
                }
                let (sw, sh) = rotation.source_dims(shape.width, shape.height);
                *data = rotate_interleaved(
                    data,
                    sw as usize,
                    sh as usize,
                    shape.channels as usize,
                    rotation,
                );
            }
        }
    }

    /// Borrowed encode view; raw payloads take their geometry from `shape`
    pub fn view<'a>(&'a self, shape: &FrameShape) -> ImageView<'a> {
        match self {
            ImagePayload::Frame(frame) => ImageView {
                width: frame.width,
                height: frame.height,
                channels: frame.channels,
                data: &frame.data,
            },
            ImagePayload::Raw(data) => ImageView {
                width: shape.width,
                height: shape.height,
                channels: shape.channels,
                data,
            },
        }
    }
}

/// A depth payload in either representation
#[derive(Debug, Clone, PartialEq)]
pub enum DepthPayload {
    /// Self-describing map in f64 meters
    Map(DepthFrame),
    /// Raw u16 millimeter samples; geometry comes from the descriptor
    Millimeters(Vec<u16>),
}

impl DepthPayload {
    /// Build a raw payload from samples in meters, truncating to
    /// millimeters
    pub fn from_meters(samples: &[f64]) -> Self {
        DepthPayload::Millimeters(samples.iter().copied().map(meters_to_millimeters).collect())
    }

    /// Samples in f64 meters regardless of representation
    pub fn to_meters(&self) -> Vec<f64> {
        match self {
            DepthPayload::Map(map) => map.data.clone(),
            DepthPayload::Millimeters(data) => {
                data.iter().copied().map(millimeters_to_meters).collect()
            }
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            DepthPayload::Map(_) => PayloadKind::Structured,
            DepthPayload::Millimeters(_) => PayloadKind::RawBytes,
        }
    }

    /// Total payload size in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            DepthPayload::Map(map) => map.byte_size(),
            DepthPayload::Millimeters(data) => data.len() * std::mem::size_of::<u16>(),
        }
    }

    /// Rotate the payload content in place (see [`ImagePayload::rotate`])
    pub fn rotate(&mut self, rotation: Rotation, shape: &FrameShape) {
        match self {
            DepthPayload::Map(map) => map.rotate(rotation),
            DepthPayload::Millimeters(data) => {
                if rotation == Rotation::None {
                    return;
                }
                let (sw, sh) = rotation.source_dims(shape.width, shape.height);
                *data = rotate_plane(data, sw as usize, sh as usize, rotation);
            }
        }
    }

    /// Borrowed encode view; raw payloads take their geometry from `shape`
    pub fn view<'a>(&'a self, shape: &FrameShape) -> DepthView<'a> {
        match self {
            DepthPayload::Map(map) => DepthView {
                width: map.width,
                height: map.height,
                samples: DepthSamples::Meters(&map.data),
            },
            DepthPayload::Millimeters(data) => DepthView {
                width: shape.width,
                height: shape.height,
                samples: DepthSamples::Millimeters(data),
            },
        }
    }
}

/// Borrowed image frame handed to a write backend
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: &'a [u8],
}

/// Borrowed depth samples handed to a write backend
#[derive(Debug, Clone, Copy)]
pub enum DepthSamples<'a> {
    Millimeters(&'a [u16]),
    Meters(&'a [f64]),
}

/// Borrowed depth frame handed to a write backend
#[derive(Debug, Clone, Copy)]
pub struct DepthView<'a> {
    pub width: u32,
    pub height: u32,
    pub samples: DepthSamples<'a>,
}
