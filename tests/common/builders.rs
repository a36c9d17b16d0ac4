//! Test data builders for recording small sessions

use rgbd_record::backend::{DepthFormat, ImageFormat, ParameterFormat};
use rgbd_record::config::RecordingConfig;
use rgbd_record::frame::{ColorFrame, DepthFrame, DepthPayload, ImagePayload, Rotation};
use rgbd_record::session::{DistortionModel, Intrinsics, WriteSession, WriterOptions};

/// Builder for recording test sessions with deterministic content
///
/// Frame `i` carries the sample value `base_value + i` in every pixel,
/// so replayed content identifies both the session and the frame.
pub struct SessionBuilder {
    frames: u8,
    base_value: u8,
    fps: f64,
    width: u32,
    height: u32,
    rotation: Rotation,
    image_format: ImageFormat,
    depth_format: DepthFormat,
    parameters_format: ParameterFormat,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            frames: 3,
            base_value: 10,
            fps: 30.0,
            width: 4,
            height: 2,
            rotation: Rotation::None,
            image_format: ImageFormat::Bin,
            depth_format: DepthFormat::Bin,
            parameters_format: ParameterFormat::Json,
        }
    }

    pub fn frames(mut self, frames: u8) -> Self {
        self.frames = frames;
        self
    }

    pub fn base_value(mut self, base_value: u8) -> Self {
        self.base_value = base_value;
        self
    }

    pub fn fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.image_format = format;
        self
    }

    pub fn parameters_format(mut self, format: ParameterFormat) -> Self {
        self.parameters_format = format;
        self
    }

    /// Intrinsics of the source frames (pre-rotation)
    pub fn intrinsics(&self) -> Intrinsics {
        Intrinsics {
            width: self.width,
            height: self.height,
            fx: 88.0,
            fy: 99.0,
            ppx: self.width as f32 / 2.0,
            ppy: self.height as f32 / 2.0,
            model: DistortionModel::BrownConrady,
            coefficients: [0.1, 0.2, 0.3, 0.4, 0.5],
        }
    }

    /// Sample value of frame `index`
    pub fn value(&self, index: u8) -> u8 {
        self.base_value + index
    }

    /// Color frame `index` of the session
    pub fn color_frame(&self, index: u8) -> ColorFrame {
        let pixels = (self.width * self.height * 3) as usize;
        ColorFrame::new(self.width, self.height, 3, vec![self.value(index); pixels])
    }

    /// Depth frame `index` of the session, in meters
    pub fn depth_frame(&self, index: u8) -> DepthFrame {
        let samples = (self.width * self.height) as usize;
        DepthFrame::new(
            self.width,
            self.height,
            vec![self.value(index) as f64 * 0.01; samples],
        )
    }

    /// Record the session and return its number
    pub fn record(&self, config: &RecordingConfig) -> u32 {
        let options = WriterOptions {
            image_format: self.image_format,
            depth_format: self.depth_format,
            parameters_format: self.parameters_format,
            rotation: self.rotation,
            ..WriterOptions::default()
        };
        let mut writer =
            WriteSession::with_intrinsics(config, options, self.fps, &self.intrinsics())
                .expect("write session must open");
        for i in 0..self.frames {
            writer
                .push(
                    Some(ImagePayload::Frame(self.color_frame(i))),
                    Some(DepthPayload::Map(self.depth_frame(i))),
                    i as u64,
                )
                .expect("push must succeed");
        }
        let number = writer.session_number();
        writer.finish().expect("finish must succeed");
        number
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_session_builder_records_a_complete_session() {
        let dir = tempdir().unwrap();
        let config = RecordingConfig::new(dir.path(), 4).unwrap();

        let number = SessionBuilder::new().frames(2).record(&config);
        assert_eq!(number, 0);
        assert!(dir.path().join("recording_parameters_0.json").is_file());
        assert!(dir.path().join("recording_video_0.bin").is_file());
        assert!(dir.path().join("recording_depth_0.bin").is_file());
    }
}
