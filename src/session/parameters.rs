//! Session parameter descriptor
//!
//! Every recorded session carries one parameter file describing the
//! geometry and calibration of its frames plus the container formats of
//! its substreams. The descriptor survives a textual round trip in either
//! of two formats (JSON or TOML) without losing a field.
//!
//! # Rotation and geometry
//!
//! The descriptor stores geometry *post-rotation*: when the session
//! rotation is a quarter turn, width/height, fx/fy and ppx/ppy are swapped
//! exactly once at assignment time. A replay therefore reads dimensions
//! that match the persisted frame content directly.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backend::{DepthFormat, ImageFormat, ParameterFormat};
use crate::error::{RecordingError, Result, ResultExt};
use crate::frame::{FrameShape, Rotation, COLOR_CHANNELS};

/// Lens distortion model of the recorded sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistortionModel {
    /// No distortion compensation
    #[default]
    None,
    ModifiedBrownConrady,
    InverseBrownConrady,
    Ftheta,
    BrownConrady,
    KannalaBrandt4,
}

impl DistortionModel {
    /// String tag persisted in parameter files
    pub fn tag(&self) -> &'static str {
        match self {
            DistortionModel::None => "none",
            DistortionModel::ModifiedBrownConrady => "modified_brown_conrady",
            DistortionModel::InverseBrownConrady => "inverse_brown_conrady",
            DistortionModel::Ftheta => "ftheta",
            DistortionModel::BrownConrady => "brown_conrady",
            DistortionModel::KannalaBrandt4 => "kannala_brandt4",
        }
    }
}

impl fmt::Display for DistortionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for DistortionModel {
    type Err = RecordingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(DistortionModel::None),
            "modified_brown_conrady" => Ok(DistortionModel::ModifiedBrownConrady),
            "inverse_brown_conrady" => Ok(DistortionModel::InverseBrownConrady),
            "ftheta" => Ok(DistortionModel::Ftheta),
            "brown_conrady" => Ok(DistortionModel::BrownConrady),
            "kannala_brandt4" => Ok(DistortionModel::KannalaBrandt4),
            _ => Err(RecordingError::UnknownDistortionModel(s.to_string())),
        }
    }
}

/// Camera intrinsics as exposed by the sensor boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    pub fx: f32,
    pub fy: f32,
    pub ppx: f32,
    pub ppy: f32,
    pub model: DistortionModel,
    pub coefficients: [f32; 5],
}

/// A sensor stream profile: frame rate plus intrinsics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamProfile {
    pub fps: f64,
    pub intrinsics: Intrinsics,
}

/// Geometry, calibration and format metadata of one session
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingParameters {
    /// Frame rate of the recorded stream
    pub fps: f64,
    /// Frame width, post-rotation
    pub width: u32,
    /// Frame height, post-rotation
    pub height: u32,
    /// Focal length x, post-rotation
    pub fx: f32,
    /// Focal length y, post-rotation
    pub fy: f32,
    /// Principal point x, post-rotation
    pub ppx: f32,
    /// Principal point y, post-rotation
    pub ppy: f32,
    /// Distortion coefficients of `model`
    pub coefficients: [f32; 5],
    /// Lens distortion model
    pub model: DistortionModel,
    /// Orientation applied to frame content when recording
    pub rotation: Rotation,
    /// Container format of the image substream
    pub image_format: ImageFormat,
    /// Container format of the depth substream
    pub depth_format: DepthFormat,
    /// Serialization format of this descriptor
    pub parameters_format: ParameterFormat,
    initialized: bool,
}

impl RecordingParameters {
    /// Create an uninitialized descriptor carrying only formats and the
    /// rotation
    pub fn new(
        image_format: ImageFormat,
        depth_format: DepthFormat,
        parameters_format: ParameterFormat,
        rotation: Rotation,
    ) -> Self {
        Self {
            fps: 0.0,
            width: 0,
            height: 0,
            fx: 0.0,
            fy: 0.0,
            ppx: 0.0,
            ppy: 0.0,
            coefficients: [0.0; 5],
            model: DistortionModel::None,
            rotation,
            image_format,
            depth_format,
            parameters_format,
            initialized: false,
        }
    }

    /// Whether geometry has been supplied
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Fill geometry from a sensor stream profile
    pub fn set_from_profile(&mut self, profile: &StreamProfile) {
        self.set_from_intrinsics(profile.fps, &profile.intrinsics);
    }

    /// Fill geometry from intrinsics and a frame rate
    pub fn set_from_intrinsics(&mut self, fps: f64, intrinsics: &Intrinsics) {
        self.fps = fps;
        self.assign_geometry(
            intrinsics.width,
            intrinsics.height,
            intrinsics.fx,
            intrinsics.fy,
            intrinsics.ppx,
            intrinsics.ppy,
        );
        self.coefficients = intrinsics.coefficients;
        self.model = intrinsics.model;
        self.initialized = true;
    }

    /// Fill geometry from a source that only knows frame rate and
    /// dimensions; calibration fields keep their current values
    pub fn set_from_dimensions(&mut self, fps: f64, width: u32, height: u32) {
        self.fps = fps;
        self.assign_dimensions(width, height);
        self.initialized = true;
    }

    /// Copy geometry and calibration from another descriptor, applying
    /// this descriptor's own rotation; formats stay untouched
    pub fn set_from_parameters(&mut self, other: &RecordingParameters) {
        self.fps = other.fps;
        self.assign_geometry(
            other.width,
            other.height,
            other.fx,
            other.fy,
            other.ppx,
            other.ppy,
        );
        self.coefficients = other.coefficients;
        self.model = other.model;
        self.initialized = true;
    }

    /// Reset all fields to their unit values
    ///
    /// Invoked when a session read fails to find the expected files, so a
    /// stale descriptor never describes files that do not exist.
    pub fn clear(&mut self) {
        *self = RecordingParameters::new(
            ImageFormat::default(),
            DepthFormat::default(),
            ParameterFormat::default(),
            Rotation::None,
        );
    }

    /// Reconstruct sensor intrinsics from the stored (post-rotation)
    /// geometry
    pub fn intrinsics(&self) -> Intrinsics {
        Intrinsics {
            width: self.width,
            height: self.height,
            fx: self.fx,
            fy: self.fy,
            ppx: self.ppx,
            ppy: self.ppy,
            model: self.model,
            coefficients: self.coefficients,
        }
    }

    /// Post-rotation frame geometry used to interpret raw payloads
    pub fn shape(&self) -> FrameShape {
        FrameShape {
            width: self.width,
            height: self.height,
            channels: COLOR_CHANNELS,
        }
    }

    /// Write the descriptor to `path` in its own parameter format
    pub fn serialize(&self, path: &Path) -> Result<()> {
        let file = ParameterFile::from(self);
        let content = match self.parameters_format {
            ParameterFormat::Json => serde_json::to_string_pretty(&file).map_err(|e| {
                RecordingError::ParameterFile(format!("Failed to serialize parameters: {}", e))
            })?,
            ParameterFormat::Toml => toml::to_string_pretty(&file).map_err(|e| {
                RecordingError::ParameterFile(format!("Failed to serialize parameters: {}", e))
            })?,
        };
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write parameter file {}", path.display()))?;
        Ok(())
    }

    /// Replace this descriptor with the contents of a parameter file
    pub fn deserialize(&mut self, path: &Path, format: ParameterFormat) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameter file {}", path.display()))?;
        let file: ParameterFile = match format {
            ParameterFormat::Json => serde_json::from_str(&content).map_err(|e| {
                RecordingError::ParameterFile(format!(
                    "Failed to parse {}: {}",
                    path.display(),
                    e
                ))
            })?,
            ParameterFormat::Toml => toml::from_str(&content).map_err(|e| {
                RecordingError::ParameterFile(format!(
                    "Failed to parse {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };
        self.apply_file(file)
    }

    /// Assign post-rotation geometry: quarter turns swap the pairs once
    fn assign_geometry(&mut self, width: u32, height: u32, fx: f32, fy: f32, ppx: f32, ppy: f32) {
        if self.rotation.swaps_axes() {
            self.width = height;
            self.height = width;
            self.fx = fy;
            self.fy = fx;
            self.ppx = ppy;
            self.ppy = ppx;
        } else {
            self.width = width;
            self.height = height;
            self.fx = fx;
            self.fy = fy;
            self.ppx = ppx;
            self.ppy = ppy;
        }
    }

    fn assign_dimensions(&mut self, width: u32, height: u32) {
        if self.rotation.swaps_axes() {
            self.width = height;
            self.height = width;
        } else {
            self.width = width;
            self.height = height;
        }
    }

    fn apply_file(&mut self, file: ParameterFile) -> Result<()> {
        let model = file.distortion_model.parse::<DistortionModel>()?;
        let rotation = Rotation::from_code(file.rotation).ok_or_else(|| {
            RecordingError::Config(format!("Unknown rotation code {}", file.rotation))
        })?;
        let image_format = file.image_format.parse::<ImageFormat>()?;
        let depth_format = file.depth_format.parse::<DepthFormat>()?;
        let parameters_format = file.parameters_format.parse::<ParameterFormat>()?;

        self.fps = file.fps;
        self.width = file.w;
        self.height = file.h;
        self.fx = file.fx;
        self.fy = file.fy;
        self.ppx = file.ppx;
        self.ppy = file.ppy;
        self.coefficients = [
            file.coefficient_0,
            file.coefficient_1,
            file.coefficient_2,
            file.coefficient_3,
            file.coefficient_4,
        ];
        self.model = model;
        self.rotation = rotation;
        self.image_format = image_format;
        self.depth_format = depth_format;
        self.parameters_format = parameters_format;
        self.initialized = true;
        Ok(())
    }
}

impl Default for RecordingParameters {
    fn default() -> Self {
        Self::new(
            ImageFormat::default(),
            DepthFormat::default(),
            ParameterFormat::default(),
            Rotation::None,
        )
    }
}

/// On-disk schema of a parameter file
///
/// Key names are fixed by previously recorded sessions and must not
/// change.
#[derive(Debug, Serialize, Deserialize)]
struct ParameterFile {
    fps: f64,
    rotation: u8,
    w: u32,
    h: u32,
    fx: f32,
    fy: f32,
    ppx: f32,
    ppy: f32,
    #[serde(rename = "imageFormat")]
    image_format: String,
    #[serde(rename = "depthFormat")]
    depth_format: String,
    #[serde(rename = "parametersFormat")]
    parameters_format: String,
    coefficient_0: f32,
    coefficient_1: f32,
    coefficient_2: f32,
    coefficient_3: f32,
    coefficient_4: f32,
    distortion_model: String,
}

impl From<&RecordingParameters> for ParameterFile {
    fn from(p: &RecordingParameters) -> Self {
        Self {
            fps: p.fps,
            rotation: p.rotation.code(),
            w: p.width,
            h: p.height,
            fx: p.fx,
            fy: p.fy,
            ppx: p.ppx,
            ppy: p.ppy,
            image_format: p.image_format.extension().to_string(),
            depth_format: p.depth_format.extension().to_string(),
            parameters_format: p.parameters_format.extension().to_string(),
            coefficient_0: p.coefficients[0],
            coefficient_1: p.coefficients[1],
            coefficient_2: p.coefficients[2],
            coefficient_3: p.coefficients[3],
            coefficient_4: p.coefficients[4],
            distortion_model: p.model.tag().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn sample_intrinsics() -> Intrinsics {
        Intrinsics {
            width: 1280,
            height: 720,
            fx: 900.5,
            fy: 901.25,
            ppx: 640.75,
            ppy: 360.5,
            model: DistortionModel::BrownConrady,
            coefficients: [0.1, -0.2, 0.0, 0.05, 0.125],
        }
    }

    fn json_parameters() -> RecordingParameters {
        let mut p = RecordingParameters::new(
            ImageFormat::Bin,
            DepthFormat::Bin,
            ParameterFormat::Json,
            Rotation::None,
        );
        p.set_from_intrinsics(30.0, &sample_intrinsics());
        p
    }

    #[test]
    fn test_quarter_turn_swaps_geometry_pairs() {
        let mut p = RecordingParameters::new(
            ImageFormat::Bin,
            DepthFormat::Bin,
            ParameterFormat::Json,
            Rotation::Left90,
        );
        p.set_from_intrinsics(30.0, &sample_intrinsics());

        assert_eq!((p.width, p.height), (720, 1280));
        assert_eq!((p.fx, p.fy), (901.25, 900.5));
        assert_eq!((p.ppx, p.ppy), (360.5, 640.75));
        assert!(p.is_initialized());
    }

    #[test]
    fn test_half_turn_keeps_geometry() {
        let mut p = RecordingParameters::new(
            ImageFormat::Bin,
            DepthFormat::Bin,
            ParameterFormat::Json,
            Rotation::Rot180,
        );
        p.set_from_intrinsics(30.0, &sample_intrinsics());

        assert_eq!((p.width, p.height), (1280, 720));
        assert_eq!((p.fx, p.fy), (900.5, 901.25));
        assert_eq!((p.ppx, p.ppy), (640.75, 360.5));
    }

    #[test]
    fn test_set_from_dimensions_keeps_calibration() {
        let mut p = json_parameters();
        let fx_before = p.fx;
        p.set_from_dimensions(15.0, 640, 480);

        assert_eq!(p.fps, 15.0);
        assert_eq!((p.width, p.height), (640, 480));
        assert_eq!(p.fx, fx_before);
    }

    #[test]
    fn test_set_from_parameters_applies_own_rotation() {
        let source = json_parameters();
        let mut target = RecordingParameters::new(
            ImageFormat::Vid,
            DepthFormat::Bin,
            ParameterFormat::Toml,
            Rotation::Left270,
        );
        target.set_from_parameters(&source);

        assert_eq!((target.width, target.height), (source.height, source.width));
        assert_eq!(target.model, source.model);
        // Own formats survive the copy
        assert_eq!(target.image_format, ImageFormat::Vid);
        assert_eq!(target.parameters_format, ParameterFormat::Toml);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut p = json_parameters();
        p.clear();

        assert!(!p.is_initialized());
        assert_eq!(p.fps, 0.0);
        assert_eq!((p.width, p.height), (0, 0));
        assert_eq!(p.model, DistortionModel::None);
        assert_eq!(p.rotation, Rotation::None);
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recording_parameters_0.json");

        let p = json_parameters();
        p.serialize(&path).unwrap();

        let mut loaded = RecordingParameters::default();
        loaded.deserialize(&path, ParameterFormat::Json).unwrap();
        assert_eq!(loaded, p);
    }

    #[test]
    fn test_toml_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recording_parameters_0.toml");

        let mut p = RecordingParameters::new(
            ImageFormat::Vid,
            DepthFormat::Bin,
            ParameterFormat::Toml,
            Rotation::Left90,
        );
        p.set_from_intrinsics(60.0, &sample_intrinsics());
        p.serialize(&path).unwrap();

        let mut loaded = RecordingParameters::default();
        loaded.deserialize(&path, ParameterFormat::Toml).unwrap();
        assert_eq!(loaded, p);
    }

    #[test]
    fn test_schema_keys_are_stable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.json");
        json_parameters().serialize(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        for key in [
            "fps",
            "rotation",
            "\"w\"",
            "\"h\"",
            "fx",
            "fy",
            "ppx",
            "ppy",
            "imageFormat",
            "depthFormat",
            "parametersFormat",
            "coefficient_0",
            "coefficient_4",
            "distortion_model",
        ] {
            assert!(content.contains(key), "missing key {} in {}", key, content);
        }
    }

    #[test]
    fn test_unknown_distortion_model_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.json");
        json_parameters().serialize(&path).unwrap();

        let content = std::fs::read_to_string(&path)
            .unwrap()
            .replace("brown_conrady", "fisheye2");
        std::fs::write(&path, content).unwrap();

        let mut loaded = RecordingParameters::default();
        assert!(matches!(
            loaded.deserialize(&path, ParameterFormat::Json),
            Err(RecordingError::UnknownDistortionModel(_))
        ));
    }

    #[test]
    fn test_unknown_rotation_code_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.json");
        json_parameters().serialize(&path).unwrap();

        let content = std::fs::read_to_string(&path)
            .unwrap()
            .replace("\"rotation\": 0", "\"rotation\": 7");
        std::fs::write(&path, content).unwrap();

        let mut loaded = RecordingParameters::default();
        assert!(matches!(
            loaded.deserialize(&path, ParameterFormat::Json),
            Err(RecordingError::Config(_))
        ));
    }

    fn model_strategy() -> impl Strategy<Value = DistortionModel> {
        prop::sample::select(vec![
            DistortionModel::None,
            DistortionModel::ModifiedBrownConrady,
            DistortionModel::InverseBrownConrady,
            DistortionModel::Ftheta,
            DistortionModel::BrownConrady,
            DistortionModel::KannalaBrandt4,
        ])
    }

    fn rotation_strategy() -> impl Strategy<Value = Rotation> {
        prop::sample::select(vec![
            Rotation::None,
            Rotation::Left90,
            Rotation::Rot180,
            Rotation::Left270,
        ])
    }

    fn parameters_strategy() -> impl Strategy<Value = RecordingParameters> {
        (
            1.0f64..240.0,
            (1u32..4096, 1u32..4096),
            (0.0f32..5000.0, 0.0f32..5000.0),
            (0.0f32..4096.0, 0.0f32..4096.0),
            prop::array::uniform5(-1.0f32..1.0),
            model_strategy(),
            rotation_strategy(),
            prop::sample::select(vec![ImageFormat::Bin, ImageFormat::Vid]),
            prop::sample::select(vec![ParameterFormat::Json, ParameterFormat::Toml]),
        )
            .prop_map(
                |(fps, (w, h), (fx, fy), (ppx, ppy), coefficients, model, rotation, imgf, parf)| {
                    let mut p =
                        RecordingParameters::new(imgf, DepthFormat::Bin, parf, rotation);
                    p.set_from_intrinsics(
                        fps,
                        &Intrinsics {
                            width: w,
                            height: h,
                            fx,
                            fy,
                            ppx,
                            ppy,
                            model,
                            coefficients,
                        },
                    );
                    p
                },
            )
    }

    proptest! {
        #[test]
        fn prop_parameter_file_round_trip(p in parameters_strategy()) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("p.cfg");
            p.serialize(&path).unwrap();

            let mut loaded = RecordingParameters::default();
            loaded.deserialize(&path, p.parameters_format).unwrap();
            prop_assert_eq!(loaded, p);
        }
    }
}
