//! Configuration for recording and replay
//!
//! Two JSON files drive the library and the capture runner:
//!
//! - `recording.cfg` - where sessions live on disk and how large the
//!   writer ring buffer is ([`RecordingConfig`])
//! - `capture.cfg` - what the capture runner should do: replay source,
//!   whether to re-record, formats and orientation ([`CaptureOptions`])
//!
//! Both use the camelCase key names of the original capture tooling, so
//! existing config files keep working. The config directory is taken from
//! the `RGBD_RECORD_CONFIG_DIR` environment variable and defaults to the
//! working directory.
//!
//! [`RecordingConfig`] is an explicit object handed to every session;
//! there is no process-wide configuration state.

use crate::backend::{DepthFormat, ImageFormat, ParameterFormat};
use crate::error::{RecordingError, Result};
use crate::frame::Rotation;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Recording config filename inside the config directory
pub const RECORDING_CONFIG_FILE: &str = "recording.cfg";

/// Capture options filename inside the config directory
pub const CAPTURE_OPTIONS_FILE: &str = "capture.cfg";

/// Environment variable naming the config directory
pub const CONFIG_DIR_ENV: &str = "RGBD_RECORD_CONFIG_DIR";

// ==================== Config Directory ====================

/// Directory holding the config files
///
/// Taken from [`CONFIG_DIR_ENV`], defaulting to the working directory.
pub fn config_dir() -> PathBuf {
    std::env::var_os(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Path of the recording config file
pub fn recording_config_path() -> PathBuf {
    config_dir().join(RECORDING_CONFIG_FILE)
}

/// Path of the capture options file
pub fn capture_options_path() -> PathBuf {
    config_dir().join(CAPTURE_OPTIONS_FILE)
}

// ==================== Recording Config ====================

/// Storage and buffering configuration shared by all sessions
///
/// Loaded once and passed by reference to every reader and writer; the
/// ring-buffer capacity is fixed for the lifetime of a writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Directory holding the numbered session files
    pub output_directory: PathBuf,

    /// Ring-buffer capacity of the asynchronous writer, in frames
    pub write_buffer_size: usize,
}

impl RecordingConfig {
    /// Create a validated config
    pub fn new(output_directory: impl Into<PathBuf>, write_buffer_size: usize) -> Result<Self> {
        let config = Self {
            output_directory: output_directory.into(),
            write_buffer_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecordingError::Config(format!(
                "Failed to read recording config {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            RecordingError::Config(format!(
                "Failed to parse recording config {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<Self> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RecordingError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            RecordingError::Config(format!(
                "Failed to write recording config {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(self.clone())
    }

    fn validate(&self) -> Result<()> {
        if self.write_buffer_size < 1 {
            return Err(RecordingError::Config(
                "writeBufferSize must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ==================== Capture Options ====================

/// Options of the capture runner
///
/// Format tags and the rotation are kept in their file representation and
/// validated by the typed accessors, so a bad value fails before any
/// session file is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    /// Target frame rate of the capture loop
    #[serde(default = "default_fps")]
    pub fps: f64,

    /// Record the captured frames to a new session
    #[serde(default)]
    pub with_record: bool,

    /// Session number to replay; absent means nothing to replay
    #[serde(default)]
    pub recorded_file_number: Option<u32>,

    /// Orientation code applied when recording (0 none, 1 left 90,
    /// 2 half turn, 3 left 270)
    #[serde(default, rename = "rotation")]
    pub rotation_code: u8,

    /// Container format tag of the image substream
    #[serde(default = "default_image_format")]
    pub record_image_format: String,

    /// Container format tag of the depth substream
    #[serde(default = "default_depth_format")]
    pub record_depth_format: String,

    /// Serialization format tag of the parameter file
    #[serde(default = "default_parameters_format")]
    pub record_parameters_format: String,
}

fn default_fps() -> f64 {
    30.0
}

fn default_image_format() -> String {
    ImageFormat::Bin.extension().to_string()
}

fn default_depth_format() -> String {
    DepthFormat::Bin.extension().to_string()
}

fn default_parameters_format() -> String {
    ParameterFormat::Json.extension().to_string()
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            with_record: false,
            recorded_file_number: None,
            rotation_code: 0,
            record_image_format: default_image_format(),
            record_depth_format: default_depth_format(),
            record_parameters_format: default_parameters_format(),
        }
    }
}

impl CaptureOptions {
    /// Load capture options from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecordingError::Config(format!(
                "Failed to read capture options {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            RecordingError::Config(format!(
                "Failed to parse capture options {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Recording orientation, validated
    pub fn rotation(&self) -> Result<Rotation> {
        Rotation::from_code(self.rotation_code).ok_or_else(|| {
            RecordingError::Config(format!("Unknown rotation code {}", self.rotation_code))
        })
    }

    /// Image container format, validated
    pub fn image_format(&self) -> Result<ImageFormat> {
        self.record_image_format.parse()
    }

    /// Depth container format, validated
    pub fn depth_format(&self) -> Result<DepthFormat> {
        self.record_depth_format.parse()
    }

    /// Parameter file format, validated
    pub fn parameters_format(&self) -> Result<ParameterFormat> {
        self.record_parameters_format.parse()
    }
}
