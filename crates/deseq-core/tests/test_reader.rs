mod common;

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use tempfile::TempDir;

use common::{
    build_binary_metadata, build_record, build_reference, build_seq_header, build_single_file,
    build_split_files, merged_value, sidecar_xml, single_value, split_spec, write_file, HeaderSpec,
};
use deseq_core::consts::SEQ_HEADER_SIZE;
use deseq_core::frame::SampleType;
use deseq_core::reader::SequenceSource;
use deseq_core::{read, read_path, CameraVariant, ReadOptions, SequenceData, SeqError};

/// 64x64 frames, 16-bit storage with 12 significant bits, 10 frames, 16384-byte records.
fn scenario_a(dir: &Path) -> PathBuf {
    let mut spec = HeaderSpec::twelve_bit(64, 64, 10, 0);
    spec.record_size = 16384;
    let path = write_file(dir, "a.seq", &build_single_file(&spec, 10));
    write_file(dir, "a.seq.dark.mrc", &build_reference(64, 64, |_, _| 100.0));
    write_file(dir, "a.seq.metadata", b"PixelSize = 0.5\nExposure = 10\n");
    path
}

/// Split recording of `records` records with `pre_buffer` frames of
/// `2 * half_height` x `width` each, plus its XML sidecar.
fn write_split(
    dir: &Path,
    width: u32,
    half_height: u32,
    pre_buffer: usize,
    records: usize,
    declared: i32,
) -> PathBuf {
    let (top, bottom) = build_split_files(width, half_height, pre_buffer, records, 0, declared);
    let top = write_file(dir, "run_Top.seq", &top);
    write_file(dir, "run_Bottom.seq", &bottom);
    write_file(
        dir,
        "run.seq.Config.Metadata.xml",
        sidecar_xml(width, 2 * half_height, 40000, pre_buffer).as_bytes(),
    );
    top
}

#[test]
fn test_single_sensor_default_shape() {
    let dir = TempDir::new().unwrap();
    let path = scenario_a(dir.path());

    let result = read_path(&path, &ReadOptions::default()).unwrap();
    assert_eq!(result.data.shape(), vec![10, 64, 64]);
    assert_eq!(result.data.sample_type(), SampleType::U16);
    assert!(!result.data.is_lazy());

    let meta = &result.metadata;
    assert_eq!(meta.frame_count, 10);
    assert_eq!(meta.header.real_bit_depth, 12);
    assert_relative_eq!(meta.frame_rate, 30.0);
    assert!(meta.references.dark.is_some());
    assert!(meta.references.gain.is_none());
    assert!(meta.sidecar.is_none());
    assert!(meta.xml_fields.is_none());
    assert_relative_eq!(meta.pixel_size().unwrap(), 0.5);

    let stamps = meta.timestamps.as_ref().unwrap();
    assert_eq!(stamps.len(), 10);
    assert_eq!(stamps[9].seconds, 9);

    let stack = result.data.as_u16().unwrap();
    let frame = stack.chunk(&[7]).unwrap();
    assert_eq!(frame[[3, 60]], single_value(7, 3, 60));
}

#[test]
fn test_single_sensor_axes() {
    let dir = TempDir::new().unwrap();
    let path = scenario_a(dir.path());

    let result = read_path(&path, &ReadOptions::default()).unwrap();
    assert_eq!(result.axes.len(), 3);
    let time = &result.axes[0];
    assert_eq!(time.name.as_deref(), Some("time"));
    assert_eq!(time.unit.as_deref(), Some("s"));
    assert!(time.navigate);
    assert_relative_eq!(time.scale, 1.0 / 30.0);

    let x = &result.axes[2];
    assert_eq!(x.name.as_deref(), Some("x"));
    assert_eq!(x.size, 64);
    assert!(!x.navigate);
    assert_relative_eq!(x.scale, 0.5);
}

#[test]
fn test_single_sensor_navigation_shape() {
    let dir = TempDir::new().unwrap();
    let path = scenario_a(dir.path());

    let options = ReadOptions::default().with_navigation_shape(vec![5, 2]);
    let result = read_path(&path, &options).unwrap();
    assert_eq!(result.data.shape(), vec![5, 2, 64, 64]);
    assert_eq!(result.axes.len(), 4);
    assert!(result.axes[0].navigate && result.axes[1].navigate);
    assert_eq!(result.axes[1].size, 2);

    let stack = result.data.as_u16().unwrap();
    let frame = stack.chunk(&[3, 1]).unwrap();
    assert_eq!(frame[[0, 0]], single_value(7, 0, 0));
}

#[test]
fn test_single_sensor_shape_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = scenario_a(dir.path());

    for lazy in [false, true] {
        let options = ReadOptions::default()
            .with_navigation_shape(vec![5, 3])
            .with_lazy(lazy);
        let err = read_path(&path, &options).unwrap_err();
        assert!(
            matches!(err, SeqError::ShapeMismatch { product: 15, total: 10, .. }),
            "{err}"
        );
    }
}

#[test]
fn test_lazy_matches_eager() {
    let dir = TempDir::new().unwrap();
    let path = scenario_a(dir.path());

    let options = ReadOptions::default().with_navigation_shape(vec![5, 2]);
    let eager = read_path(&path, &options).unwrap();
    let lazy = read_path(&path, &options.clone().with_lazy(true)).unwrap();

    assert!(lazy.data.is_lazy());
    assert!(lazy.metadata.timestamps.is_none());
    let eager = eager.data.as_u16().unwrap().to_array().unwrap();
    let lazy = lazy.data.as_u16().unwrap().to_array().unwrap();
    assert_eq!(eager, lazy);
}

#[test]
fn test_required_reference_missing() {
    let dir = TempDir::new().unwrap();
    let path = scenario_a(dir.path());

    let options = ReadOptions {
        require_gain: true,
        ..ReadOptions::default()
    };
    let err = read_path(&path, &options).unwrap_err();
    assert!(matches!(err, SeqError::Io { .. }), "{err}");
}

#[test]
fn test_single_sensor_without_companions() {
    let dir = TempDir::new().unwrap();
    let mut spec = HeaderSpec::twelve_bit(6, 4, 3, 0);
    spec.bit_depth = 8;
    spec.real_bit_depth = 8;
    spec.record_size = 6 * 4 + 8;
    let mut data = build_seq_header(&spec);
    for f in 0..3u8 {
        let image: Vec<u8> = (0..24u8).map(|v| v + f * 24).collect();
        data.extend(build_record(&spec, &image, 0, 0));
    }
    let path = write_file(dir.path(), "bare.seq", &data);
    write_file(
        dir.path(),
        "bare.seq.Config.Metadata.xml",
        b"<Info><Operator>jdoe</Operator></Info>",
    );

    let result = read_path(&path, &ReadOptions::default()).unwrap();
    let SequenceData::U8(stack) = &result.data else {
        panic!("expected 8-bit data, got {}", result.data.sample_type());
    };
    assert_eq!(stack.shape(), vec![3, 4, 6]);
    assert_eq!(stack.chunk(&[2]).unwrap()[[3, 5]], 71);
    assert!(result.metadata.references.dark.is_none());
    assert!(result.metadata.acquisition.is_none());
    assert!(result.metadata.pixel_size().is_none());
    assert_eq!(result.metadata.xml_fields.as_ref().unwrap()["Operator"], "jdoe");
    assert_relative_eq!(result.axes[1].scale, 1.0);
}

#[test]
fn test_dual_sensor_record() {
    let dir = TempDir::new().unwrap();
    // 256 wide, 64-row halves, pre-buffer 128: one record holds 128 frames.
    // The header claims 4 frames and 300 fps; neither is trusted.
    let top = write_split(dir.path(), 256, 64, 128, 1, 4);
    write_file(dir.path(), "run_Bottom.seq.metadata", &build_binary_metadata(2.0));

    let result = read_path(&top, &ReadOptions::default()).unwrap();
    assert_eq!(result.data.shape(), vec![128, 128, 256]);

    let meta = &result.metadata;
    assert_eq!(meta.frame_count, 128);
    assert_eq!(meta.header.declared_frame_count, 4);
    assert_eq!(meta.header.height, 8192);
    assert_relative_eq!(meta.header.declared_fps, 300.0);
    assert_relative_eq!(meta.frame_rate, 40000.0);
    assert_eq!(meta.files.segments.len(), 1);
    let sidecar = meta.sidecar.as_ref().unwrap();
    assert_eq!(sidecar.segment_pre_buffer, 128);
    // Listed in the sidecar but not on disk.
    assert!(sidecar.dark_reference);
    assert!(meta.references.dark.is_none());
    assert_eq!(meta.timestamps.as_ref().unwrap().len(), 1);

    assert_relative_eq!(result.axes[0].scale, 1.0 / 40000.0);
    assert_relative_eq!(result.axes[1].scale, 2.0);

    let stack = result.data.as_u16().unwrap();
    for f in [0, 63, 127] {
        let frame = stack.chunk(&[f]).unwrap();
        for (r, c) in [(0, 0), (63, 255), (64, 0), (127, 128)] {
            assert_eq!(frame[[r, c]], merged_value(f, r, c), "frame {f} ({r}, {c})");
        }
    }
}

#[test]
fn test_dual_sensor_lazy_navigation() {
    let dir = TempDir::new().unwrap();
    // 50 records of 50 frames: 2500 frames of 64x64.
    let top = write_split(dir.path(), 64, 32, 50, 50, 50);

    let options = ReadOptions::default()
        .with_navigation_shape(vec![50, 50])
        .with_lazy(true);
    let result = read_path(&top, &options).unwrap();
    assert!(result.data.is_lazy());
    assert_eq!(result.data.shape(), vec![50, 50, 64, 64]);
    assert!(result.metadata.timestamps.is_none());

    let stack = result.data.as_u16().unwrap();
    let frame = stack.chunk(&[49, 49]).unwrap();
    assert_eq!(frame[[40, 10]], merged_value(2499, 40, 10));
    assert_eq!(frame[[5, 63]], merged_value(2499, 5, 63));

    // Frames are decoded when asked for, so a later change on disk shows up.
    let spec = split_spec(64, 32 * 50, 1, 50);
    let slot_bytes = 32 * 64 * 2;
    let offset = SEQ_HEADER_SIZE + 49 * spec.record_size as usize + 49 * slot_bytes;
    let mut file = OpenOptions::new()
        .write(true)
        .open(dir.path().join("run_Bottom.seq"))
        .unwrap();
    file.seek(SeekFrom::Start(offset as u64)).unwrap();
    file.write_all(&vec![0u8; slot_bytes]).unwrap();
    drop(file);

    let frame = stack.chunk(&[49, 49]).unwrap();
    assert_eq!(frame[[40, 10]], 0);
    assert_eq!(frame[[5, 63]], merged_value(2499, 5, 63));
    let earlier = stack.chunk(&[49, 48]).unwrap();
    assert_eq!(earlier[[40, 10]], merged_value(2498, 40, 10));
}

#[test]
fn test_dual_sensor_missing_sidecar() {
    let dir = TempDir::new().unwrap();
    let top = write_split(dir.path(), 8, 4, 2, 1, 1);
    std::fs::remove_file(dir.path().join("run.seq.Config.Metadata.xml")).unwrap();

    let err = read_path(&top, &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, SeqError::Io { .. }), "{err}");
}

#[test]
fn test_variant_selection() {
    let dir = TempDir::new().unwrap();
    let top = write_split(dir.path(), 8, 4, 2, 1, 1);
    let plain = scenario_a(dir.path());

    assert!(matches!(
        SequenceSource::from_path(&top, CameraVariant::Auto).unwrap(),
        SequenceSource::Dual(_)
    ));
    assert!(matches!(
        SequenceSource::from_path(&plain, CameraVariant::Auto).unwrap(),
        SequenceSource::Single(_)
    ));
    assert!(matches!(
        SequenceSource::from_path(&top, CameraVariant::SingleSensor).unwrap(),
        SequenceSource::Single(_)
    ));
    assert!(SequenceSource::from_path(&plain, CameraVariant::Celeritas).is_err());

    let source = SequenceSource::from_path(&dir.path().join("run_Bottom.seq"), CameraVariant::Celeritas)
        .unwrap();
    let result = read(&source, &ReadOptions::default()).unwrap();
    assert_eq!(result.data.shape(), vec![2, 8, 8]);
}

#[test]
fn test_same_stem_recordings_stay_apart() {
    let dir = TempDir::new().unwrap();
    let d = dir.path();
    // Two recordings share the stem "test"; the halves carry their own times.
    let (top, bottom) = build_split_files(8, 4, 2, 2, 0, 2);
    let first = write_file(d, "test_Top_14-04-59.355.seq", &top);
    write_file(d, "test_Bottom_14-13-42.822.seq", &bottom);
    let (top, bottom) = build_split_files(8, 4, 2, 3, 100, 3);
    write_file(d, "test_Top_15-20-01.100.seq", &top);
    let second = write_file(d, "test_Bottom_15-20-09.412.seq", &bottom);
    write_file(d, "test.seq.Config.Metadata.xml", sidecar_xml(8, 8, 40000, 2).as_bytes());

    let result = read_path(&first, &ReadOptions::default()).unwrap();
    assert_eq!(result.data.shape(), vec![4, 8, 8]);
    let segments = &result.metadata.files.segments;
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].top, first);
    assert!(segments[0].bottom.ends_with("test_Bottom_14-13-42.822.seq"));
    assert_eq!(result.metadata.timestamps.as_ref().unwrap().len(), 2);
    let stack = result.data.as_u16().unwrap();
    assert_eq!(stack.chunk(&[3]).unwrap()[[6, 2]], merged_value(3, 6, 2));

    let result = read_path(&second, &ReadOptions::default()).unwrap();
    assert_eq!(result.data.shape(), vec![6, 8, 8]);
    let segments = &result.metadata.files.segments;
    assert_eq!(segments.len(), 1);
    assert!(segments[0].top.ends_with("test_Top_15-20-01.100.seq"));
    assert_eq!(segments[0].bottom, second);
    let stack = result.data.as_u16().unwrap();
    assert_eq!(stack.chunk(&[0]).unwrap()[[1, 7]], merged_value(100, 1, 7));
    assert_eq!(stack.chunk(&[5]).unwrap()[[6, 2]], merged_value(105, 6, 2));
}

#[test]
fn test_marker_must_end_a_name_component() {
    let dir = TempDir::new().unwrap();
    let spec = HeaderSpec::twelve_bit(16, 8, 3, 0);
    let path = write_file(dir.path(), "scan_Topography.seq", &build_single_file(&spec, 3));

    assert!(matches!(
        SequenceSource::from_path(&path, CameraVariant::Auto).unwrap(),
        SequenceSource::Single(_)
    ));
    let result = read_path(&path, &ReadOptions::default()).unwrap();
    assert_eq!(result.data.shape(), vec![3, 8, 16]);
    assert!(result.metadata.files.segments.is_empty());
}

#[test]
fn test_dual_sensor_shape_mismatch_before_timestamps() {
    let dir = TempDir::new().unwrap();
    // 10 frames: 5 records of 2.
    let top = write_split(dir.path(), 8, 4, 2, 5, 5);

    let options = ReadOptions::default().with_navigation_shape(vec![5, 3]);
    let err = read_path(&top, &options).unwrap_err();
    assert!(
        matches!(err, SeqError::ShapeMismatch { product: 15, total: 10, .. }),
        "{err}"
    );

    let result = read_path(&top, &options.with_navigation_shape(vec![5, 2])).unwrap();
    assert_eq!(result.data.shape(), vec![5, 2, 8, 8]);
    assert_eq!(result.metadata.timestamps.as_ref().unwrap().len(), 5);
}

#[test]
fn test_dual_sensor_chunks_read_concurrently() {
    let dir = TempDir::new().unwrap();
    let top = write_split(dir.path(), 16, 8, 4, 6, 6);
    let options = ReadOptions::default().with_navigation_shape(vec![4, 6]);

    let eager = read_path(&top, &options).unwrap();
    let eager = eager
        .data
        .as_u16()
        .unwrap()
        .to_array()
        .unwrap()
        .into_dimensionality::<ndarray::Ix4>()
        .unwrap();
    let lazy = read_path(&top, &options.with_lazy(true)).unwrap();
    let stack = lazy.data.as_u16().unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let eager = &eager;
            scope.spawn(move || {
                // Each worker walks the stack from a different starting frame.
                for k in 0..24 {
                    let i = (k + worker * 6) % 24;
                    let (row, col) = (i / 6, i % 6);
                    let chunk = stack.chunk(&[row, col]).unwrap();
                    assert_eq!(chunk, eager.slice(ndarray::s![row, col, .., ..]), "frame {i}");
                }
            });
        }
    });
}
