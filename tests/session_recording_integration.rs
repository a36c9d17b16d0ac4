//! Integration tests for the session recording workflow
//!
//! These tests validate the complete disk round trip:
//! - Recording sessions and replaying them in both payload representations
//! - Session numbering: append, overwrite and latest-session discovery
//! - Format selection across containers and parameter files
//! - Rotation applied to persisted content and descriptor geometry

mod common;

use common::builders::SessionBuilder;
use common::{assert_float_eq, test_config};
use rgbd_record::backend::{ImageFormat, ParameterFormat};
use rgbd_record::error::RecordingError;
use rgbd_record::frame::{meters_to_millimeters, DepthPayload, ImagePayload, PayloadKind, Rotation};
use rgbd_record::session::{DistortionModel, ReadSession, WriteSession, WriterOptions};
use tempfile::tempdir;

#[test]
fn test_record_then_replay_latest_session() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 8);
    let builder = SessionBuilder::new().frames(4).base_value(20);
    builder.record(&config);

    let mut reader = ReadSession::open(&config, None, PayloadKind::Structured).unwrap();
    assert_eq!(reader.session_number(), 0);

    let parameters = reader.parameters().clone();
    assert_eq!((parameters.width, parameters.height), (4, 2));
    assert_float_eq(parameters.fps, 30.0, 1e-9);
    assert_eq!(parameters.model, DistortionModel::BrownConrady);

    for i in 0..4u8 {
        let pair = reader.pull().unwrap().unwrap();
        match pair.image {
            ImagePayload::Frame(frame) => {
                assert_eq!((frame.width, frame.height, frame.channels), (4, 2, 3));
                assert!(frame.data.iter().all(|&b| b == builder.value(i)));
            }
            other => panic!("expected structured image, got {:?}", other.kind()),
        }
        match pair.depth {
            DepthPayload::Map(map) => {
                // Depth survives at millimeter precision
                assert_float_eq(map.data[0], builder.value(i) as f64 * 0.01, 1e-3);
            }
            other => panic!("expected structured depth, got {:?}", other.kind()),
        }
    }
    assert!(reader.pull().unwrap().is_none());
    assert!(reader.is_exhausted());
}

#[test]
fn test_append_allocates_next_session_number() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 4);

    assert_eq!(SessionBuilder::new().base_value(10).record(&config), 0);
    assert_eq!(SessionBuilder::new().base_value(50).record(&config), 1);

    // The latest session wins when none is named
    let mut reader = ReadSession::open(&config, None, PayloadKind::Structured).unwrap();
    assert_eq!(reader.session_number(), 1);
    let pair = reader.pull().unwrap().unwrap();
    match pair.image {
        ImagePayload::Frame(frame) => assert_eq!(frame.data[0], 50),
        other => panic!("expected structured image, got {:?}", other.kind()),
    }

    // Earlier sessions stay reachable by number
    let mut reader = ReadSession::open(&config, Some(0), PayloadKind::Structured).unwrap();
    let pair = reader.pull().unwrap().unwrap();
    match pair.image {
        ImagePayload::Frame(frame) => assert_eq!(frame.data[0], 10),
        other => panic!("expected structured image, got {:?}", other.kind()),
    }
}

#[test]
fn test_overwrite_replaces_session_files() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 4);

    let builder = SessionBuilder::new()
        .parameters_format(ParameterFormat::Toml)
        .image_format(ImageFormat::Vid);
    builder.record(&config);
    assert!(dir.path().join("recording_parameters_0.toml").is_file());
    assert!(dir.path().join("recording_video_0.vid").is_file());

    // Overwriting session 0 with different formats removes the old triple
    let options = WriterOptions {
        session: Some(0),
        ..WriterOptions::default()
    };
    let mut writer =
        WriteSession::with_intrinsics(&config, options, 30.0, &builder.intrinsics()).unwrap();
    writer
        .push(
            Some(ImagePayload::Frame(builder.color_frame(0))),
            Some(DepthPayload::Map(builder.depth_frame(0))),
            0,
        )
        .unwrap();
    writer.finish().unwrap();

    assert!(!dir.path().join("recording_parameters_0.toml").exists());
    assert!(!dir.path().join("recording_video_0.vid").exists());
    assert!(dir.path().join("recording_parameters_0.json").is_file());
    assert!(dir.path().join("recording_video_0.bin").is_file());

    let mut reader = ReadSession::open(&config, Some(0), PayloadKind::Structured).unwrap();
    assert_eq!(reader.parameters().image_format, ImageFormat::Bin);
    assert!(reader.pull().unwrap().is_some());
    assert!(reader.pull().unwrap().is_none());
}

#[test]
fn test_latest_stops_at_first_incomplete_session() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 4);

    SessionBuilder::new().base_value(10).record(&config);
    SessionBuilder::new().base_value(60).record(&config);

    // A parameter file without substream files is an incomplete session
    std::fs::copy(
        dir.path().join("recording_parameters_1.json"),
        dir.path().join("recording_parameters_2.json"),
    )
    .unwrap();

    let reader = ReadSession::open(&config, None, PayloadKind::Structured).unwrap();
    assert_eq!(reader.session_number(), 1);

    // Asking for the incomplete session by number fails
    let result = ReadSession::open(&config, Some(2), PayloadKind::Structured);
    assert!(matches!(result, Err(RecordingError::SessionNotFound(_))));
}

#[test]
fn test_toml_parameter_files_resolve() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 4);

    SessionBuilder::new()
        .parameters_format(ParameterFormat::Toml)
        .fps(15.0)
        .record(&config);
    assert!(dir.path().join("recording_parameters_0.toml").is_file());
    assert!(!dir.path().join("recording_parameters_0.json").exists());

    let mut reader = ReadSession::open(&config, None, PayloadKind::Structured).unwrap();
    assert_eq!(reader.parameters().parameters_format, ParameterFormat::Toml);
    assert_float_eq(reader.parameters().fps, 15.0, 1e-9);
    assert!(reader.pull().unwrap().is_some());
}

#[test]
fn test_rotation_swaps_descriptor_and_content() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 4);

    // 4x2 source frames recorded with a left quarter turn
    SessionBuilder::new()
        .dimensions(4, 2)
        .rotation(Rotation::Left90)
        .frames(1)
        .record(&config);

    let mut reader = ReadSession::open(&config, None, PayloadKind::Structured).unwrap();
    let parameters = reader.parameters().clone();
    assert_eq!((parameters.width, parameters.height), (2, 4));
    // Focal lengths and principal point swap with the axes
    assert_eq!((parameters.fx, parameters.fy), (99.0, 88.0));
    assert_eq!((parameters.ppx, parameters.ppy), (1.0, 2.0));
    assert_eq!(parameters.rotation, Rotation::Left90);

    let pair = reader.pull().unwrap().unwrap();
    match pair.image {
        ImagePayload::Frame(frame) => {
            assert_eq!((frame.width, frame.height), (2, 4));
        }
        other => panic!("expected structured image, got {:?}", other.kind()),
    }
    match pair.depth {
        DepthPayload::Map(map) => {
            assert_eq!((map.width, map.height), (2, 4));
        }
        other => panic!("expected structured depth, got {:?}", other.kind()),
    }
}

#[test]
fn test_raw_payload_replay_of_recorded_session() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 4);
    let builder = SessionBuilder::new().frames(2).base_value(30);
    builder.record(&config);

    let mut reader = ReadSession::open(&config, None, PayloadKind::RawBytes).unwrap();
    for i in 0..2u8 {
        let pair = reader.pull().unwrap().unwrap();
        match pair.image {
            ImagePayload::Raw(data) => {
                assert_eq!(data.len(), 4 * 2 * 3);
                assert!(data.iter().all(|&b| b == builder.value(i)));
            }
            other => panic!("expected raw image, got {:?}", other.kind()),
        }
        match pair.depth {
            DepthPayload::Millimeters(samples) => {
                let expected = meters_to_millimeters(builder.value(i) as f64 * 0.01);
                assert!(samples.iter().all(|&mm| mm == expected));
            }
            other => panic!("expected raw depth, got {:?}", other.kind()),
        }
    }
    assert!(reader.pull().unwrap().is_none());
}

#[test]
fn test_mixed_format_sessions_coexist() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 4);

    SessionBuilder::new().base_value(10).record(&config);
    SessionBuilder::new()
        .base_value(70)
        .image_format(ImageFormat::Vid)
        .parameters_format(ParameterFormat::Toml)
        .record(&config);

    let mut reader = ReadSession::open(&config, None, PayloadKind::Structured).unwrap();
    assert_eq!(reader.session_number(), 1);
    assert_eq!(reader.parameters().image_format, ImageFormat::Vid);
    let pair = reader.pull().unwrap().unwrap();
    match pair.image {
        ImagePayload::Frame(frame) => assert_eq!(frame.data[0], 70),
        other => panic!("expected structured image, got {:?}", other.kind()),
    }

    let mut reader = ReadSession::open(&config, Some(0), PayloadKind::Structured).unwrap();
    assert_eq!(reader.parameters().image_format, ImageFormat::Bin);
    let pair = reader.pull().unwrap().unwrap();
    match pair.image {
        ImagePayload::Frame(frame) => assert_eq!(frame.data[0], 10),
        other => panic!("expected structured image, got {:?}", other.kind()),
    }
}
