//! Session file discovery and allocation
//!
//! A session `n` owns exactly three files in the output directory, named
//! `recording_<kind>_<n>.<ext>`:
//!
//! - `recording_parameters_<n>.<json|toml>` - the descriptor
//! - `recording_video_<n>.<bin|vid>` - the image substream
//! - `recording_depth_<n>.bin` - the depth substream
//!
//! The resolver hands out all three paths together so reader and writer
//! agree on the layout. Session numbers are dense from zero: discovery
//! scans upward and stops at the first number with no parameter file,
//! which makes appending deterministic ("first free number") and reading
//! deterministic ("last complete session of the contiguous run").

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::backend::ParameterFormat;
use crate::config::RecordingConfig;
use crate::error::{RecordingError, Result};
use crate::session::parameters::RecordingParameters;

/// The three files of one session, always resolved together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFilePaths {
    pub parameters: PathBuf,
    pub image: PathBuf,
    pub depth: PathBuf,
}

impl SessionFilePaths {
    /// Paths of session `number` using the format tags of `params`
    pub fn for_session(dir: &Path, params: &RecordingParameters, number: u32) -> Self {
        Self {
            parameters: dir.join(file_name(
                "parameters",
                number,
                params.parameters_format.extension(),
            )),
            image: dir.join(file_name("video", number, params.image_format.extension())),
            depth: dir.join(file_name("depth", number, params.depth_format.extension())),
        }
    }
}

/// `recording_<kind>_<number>.<extension>`
fn file_name(kind: &str, number: u32, extension: &str) -> String {
    format!("recording_{}_{}.{}", kind, number, extension)
}

/// Parameter file path of session `number` in a specific format
fn parameters_path(dir: &Path, format: ParameterFormat, number: u32) -> PathBuf {
    dir.join(file_name("parameters", number, format.extension()))
}

/// Find the parameter file of session `number`, probing formats in their
/// fixed priority order
fn probe_parameters(dir: &Path, number: u32) -> Option<(PathBuf, ParameterFormat)> {
    for format in ParameterFormat::PROBE_ORDER {
        let path = parameters_path(dir, format, number);
        if path.is_file() {
            return Some((path, format));
        }
    }
    None
}

/// Resolve a session for reading
///
/// With `Some(n)`, session `n` must exist completely; its descriptor is
/// deserialized into `params`. With `None`, the last complete session of
/// the contiguous run starting at zero is returned, again with its own
/// descriptor in `params`. On failure `params` is cleared so it never
/// describes files that were not found.
pub fn resolve_read(
    config: &RecordingConfig,
    params: &mut RecordingParameters,
    session: Option<u32>,
) -> Result<(SessionFilePaths, u32)> {
    match session {
        Some(number) => resolve_read_explicit(config, params, number),
        None => resolve_read_latest(config, params),
    }
}

fn resolve_read_explicit(
    config: &RecordingConfig,
    params: &mut RecordingParameters,
    number: u32,
) -> Result<(SessionFilePaths, u32)> {
    let dir = &config.output_directory;
    let Some((parameters, format)) = probe_parameters(dir, number) else {
        params.clear();
        return Err(RecordingError::SessionNotFound(format!(
            "session {} has no parameter file in {}",
            number,
            dir.display()
        )));
    };
    params.deserialize(&parameters, format)?;

    let derived = SessionFilePaths::for_session(dir, params, number);
    // Keep the probed parameter path; the descriptor content decides the
    // substream paths
    let paths = SessionFilePaths {
        parameters,
        image: derived.image,
        depth: derived.depth,
    };

    let mut missing = Vec::new();
    if !paths.image.is_file() {
        missing.push(paths.image.display().to_string());
    }
    if !paths.depth.is_file() {
        missing.push(paths.depth.display().to_string());
    }
    if !missing.is_empty() {
        params.clear();
        return Err(RecordingError::SessionNotFound(format!(
            "session {} is missing {}",
            number,
            missing.join(" and ")
        )));
    }

    debug!(session = number, dir = %dir.display(), "resolved session for reading");
    Ok((paths, number))
}

fn resolve_read_latest(
    config: &RecordingConfig,
    params: &mut RecordingParameters,
) -> Result<(SessionFilePaths, u32)> {
    let dir = &config.output_directory;
    let mut last_complete: Option<u32> = None;
    let mut number = 0u32;

    while let Some((parameters, format)) = probe_parameters(dir, number) {
        let mut probe = RecordingParameters::default();
        probe.deserialize(&parameters, format)?;
        let paths = SessionFilePaths::for_session(dir, &probe, number);
        if !paths.image.is_file() || !paths.depth.is_file() {
            // An incomplete session ends the contiguous run
            break;
        }
        last_complete = Some(number);
        number += 1;
    }

    match last_complete {
        // Re-read the winning session so the descriptor always matches the
        // returned paths
        Some(number) => resolve_read_explicit(config, params, number),
        None => {
            params.clear();
            Err(RecordingError::SessionNotFound(format!(
                "no complete session in {}",
                dir.display()
            )))
        }
    }
}

/// Resolve a session for writing
///
/// With `None`, the first session number with no parameter file is
/// allocated (append semantics; existing sessions are never touched).
/// With `Some(n)`, session `n` is overwritten: an existing triple is
/// deleted first, using the stored format tags of the old descriptor to
/// find its substream files.
pub fn resolve_write(
    config: &RecordingConfig,
    params: &RecordingParameters,
    session: Option<u32>,
) -> Result<(SessionFilePaths, u32)> {
    let dir = &config.output_directory;
    let number = match session {
        Some(number) => {
            if let Some((parameters, format)) = probe_parameters(dir, number) {
                let mut existing = RecordingParameters::default();
                existing.deserialize(&parameters, format)?;
                let derived = SessionFilePaths::for_session(dir, &existing, number);
                remove_session_file(&parameters);
                remove_session_file(&derived.image);
                remove_session_file(&derived.depth);
            }
            number
        }
        None => {
            let mut number = 0u32;
            while probe_parameters(dir, number).is_some() {
                number += 1;
            }
            number
        }
    };

    let paths = SessionFilePaths::for_session(dir, params, number);
    debug!(session = number, dir = %dir.display(), "resolved session for writing");
    Ok((paths, number))
}

/// Best-effort deletion of one file of an overwritten session
fn remove_session_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => warn!(path = %path.display(), "deleted file of overwritten session"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not delete session file"),
    }
}
