//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use rgbd_record::config::RecordingConfig;
use std::path::Path;

/// Recording config pointing at a test directory
pub fn test_config(dir: &Path, write_buffer_size: usize) -> RecordingConfig {
    RecordingConfig::new(dir, write_buffer_size).expect("test config must validate")
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
