//! Error handling for session recording and replay
//!
//! This module defines the crate error type and a Result alias for use
//! throughout the library.

use thiserror::Error;

use crate::frame::PayloadKind;

/// Main error type for recording operations
#[derive(Error, Debug)]
pub enum RecordingError {
    /// Errors related to configuration loading/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// A format tag string that names no known container format
    #[error("Unknown {kind} format '{tag}'")]
    UnknownFormat { kind: &'static str, tag: String },

    /// A distortion model tag outside the known model set
    #[error("Unknown distortion model '{0}'")]
    UnknownDistortionModel(String),

    /// A requested session (or its companion files) does not exist
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Errors related to parameter file serialization
    #[error("Parameter file error: {0}")]
    ParameterFile(String),

    /// Data was pushed before the session parameters were supplied
    #[error("Parameters have not been set but data was pushed to the session")]
    ParametersNotSet,

    /// A payload of the wrong representation was pushed to a session
    #[error("Payload kind mismatch: session carries {expected} payloads but {actual} was supplied")]
    PayloadKindMismatch {
        expected: PayloadKind,
        actual: PayloadKind,
    },

    /// A raw payload whose length disagrees with the session geometry
    #[error("Payload size mismatch: expected {expected} elements but got {actual}")]
    PayloadSizeMismatch { expected: usize, actual: usize },

    /// A persisted frame header disagrees with the session descriptor
    #[error("Container mismatch: {0}")]
    ContainerMismatch(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RecordingError>,
    },
}

impl RecordingError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RecordingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for recording operations
pub type Result<T> = std::result::Result<T, RecordingError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| RecordingError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| RecordingError::from(e).with_context(f()))
    }
}
