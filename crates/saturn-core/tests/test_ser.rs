mod common;

use saturn_core::frame::{CfaPattern, ColorMode, Image, SourceKind};
use saturn_core::io::ser::SerReader;
use saturn_core::io::FrameSource;

use common::*;

#[test]
fn test_parse_8bit_mono() {
    let dir = tempfile::tempdir().unwrap();
    let frame: Vec<u8> = (0u8..12).collect();
    let path = write_file(dir.path(), "mono.ser", &build_ser_with_frames(4, 3, &[frame]));

    let reader = SerReader::open(&path).unwrap();
    assert_eq!(reader.frame_count(), 1);
    assert_eq!(reader.header.width, 4);
    assert_eq!(reader.header.height, 3);
    assert_eq!(reader.header.color_mode(), ColorMode::Mono);

    let frame = reader.read_frame(0).unwrap();
    assert_eq!((frame.width(), frame.height()), (4, 3));
    assert!((frame.data[[0, 1]] - 1.0 / 255.0).abs() < 1e-4);
    assert!((frame.data[[2, 3]] - 11.0 / 255.0).abs() < 1e-4);
}

#[test]
fn test_parse_16bit_mono() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = build_ser_header_full(2, 2, 16, 1, 0);
    for v in [0u16, 1000, 32767, 65535] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    let path = write_file(dir.path(), "deep.ser", &data);

    let frame = SerReader::open(&path).unwrap().read_frame(0).unwrap();
    assert!((frame.data[[0, 1]] - 1000.0 / 65535.0).abs() < 1e-4);
    assert!((frame.data[[1, 1]] - 1.0).abs() < 1e-6);
}

#[test]
fn test_frame_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "one.ser", &build_ser_with_frames(2, 2, &[vec![0; 4]]));
    let reader = SerReader::open(&path).unwrap();
    assert!(reader.read_frame(1).is_err());
}

#[test]
fn test_truncated_header_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "short.ser", b"LUCAM-RECORDER");
    assert!(SerReader::open(&path).is_err());
}

#[test]
fn test_bayer_header_is_demosaiced() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = build_ser_header_full(4, 4, 8, 1, 8);
    data.extend_from_slice(&[128u8; 16]);
    let path = write_file(dir.path(), "bayer.ser", &data);

    let source = FrameSource::open(&path, CfaPattern::None).unwrap();
    assert_eq!(source.effective_cfa(), CfaPattern::Rggb);
    assert!(source.is_color());
    assert!(matches!(source.read(0).unwrap(), Image::Color(_)));
}

#[test]
fn test_job_cfa_overrides_mono_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "raw.ser", &build_ser_with_frames(4, 4, &[vec![64; 16]]));

    let mono = FrameSource::open(&path, CfaPattern::None).unwrap();
    assert!(matches!(mono.read(0).unwrap(), Image::Mono(_)));

    let raw = FrameSource::open(&path, CfaPattern::Gbrg).unwrap();
    assert_eq!(raw.effective_cfa(), CfaPattern::Gbrg);
    assert!(matches!(raw.read(0).unwrap(), Image::Color(_)));
}

#[test]
fn test_source_info_for_video() {
    let dir = tempfile::tempdir().unwrap();
    let frames = vec![vec![0u8; 6]; 3];
    let path = write_file(dir.path(), "info.ser", &build_ser_with_frames(3, 2, &frames));

    let info = FrameSource::open(&path, CfaPattern::None).unwrap().source_info(&path);
    assert_eq!(info.kind, SourceKind::Video);
    assert_eq!(info.total_frames, 3);
    assert_eq!((info.width, info.height), (3, 2));
    assert!(info.observer.is_none());
}

#[test]
fn test_unsupported_and_missing_sources() {
    let dir = tempfile::tempdir().unwrap();
    let text = write_file(dir.path(), "notes.txt", b"not frames");
    assert!(FrameSource::open(&text, CfaPattern::None).is_err());
    assert!(FrameSource::open(&dir.path().join("gone.ser"), CfaPattern::None).is_err());

    let empty = dir.path().join("empty");
    std::fs::create_dir(&empty).unwrap();
    assert!(FrameSource::open(&empty, CfaPattern::None).is_err());
}
