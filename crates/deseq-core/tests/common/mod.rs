#![allow(dead_code)]

use std::path::{Path, PathBuf};

use deseq_core::consts::{REFERENCE_HEADER_SIZE, SEQ_HEADER_SIZE, TIMESTAMP_SIZE};

/// Header fields written by [`build_seq_header`].
#[derive(Clone, Copy, Debug)]
pub struct HeaderSpec {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
    pub real_bit_depth: u32,
    pub frame_count: i32,
    pub record_size: i32,
    pub fps: f64,
}

impl HeaderSpec {
    /// 16-bit storage, 12 significant bits, records padded by `padding` bytes.
    pub fn twelve_bit(width: u32, height: u32, frame_count: i32, padding: usize) -> Self {
        let record = width as usize * height as usize * 2 + TIMESTAMP_SIZE + padding;
        Self {
            width,
            height,
            bit_depth: 16,
            real_bit_depth: 12,
            frame_count,
            record_size: record as i32,
            fps: 30.0,
        }
    }

    pub fn image_bytes(&self) -> usize {
        self.width as usize * self.height as usize * (self.bit_depth as usize / 8)
    }
}

/// Build the 8192-byte header block.
pub fn build_seq_header(spec: &HeaderSpec) -> Vec<u8> {
    let mut buf = vec![0u8; SEQ_HEADER_SIZE];
    buf[548..552].copy_from_slice(&spec.width.to_le_bytes());
    buf[552..556].copy_from_slice(&spec.height.to_le_bytes());
    buf[556..560].copy_from_slice(&spec.bit_depth.to_le_bytes());
    buf[560..564].copy_from_slice(&spec.real_bit_depth.to_le_bytes());
    buf[572..576].copy_from_slice(&spec.frame_count.to_le_bytes());
    buf[580..584].copy_from_slice(&spec.record_size.to_le_bytes());
    buf[584..592].copy_from_slice(&spec.fps.to_le_bytes());
    buf
}

/// One record: image bytes, timestamp, zero padding up to the record size.
pub fn build_record(spec: &HeaderSpec, image: &[u8], seconds: u32, millis: u16) -> Vec<u8> {
    assert_eq!(image.len(), spec.image_bytes());
    let mut rec = Vec::with_capacity(spec.record_size as usize);
    rec.extend_from_slice(image);
    rec.extend_from_slice(&seconds.to_le_bytes());
    rec.extend_from_slice(&millis.to_le_bytes());
    rec.extend_from_slice(&0u16.to_le_bytes());
    rec.resize(spec.record_size as usize, 0);
    rec
}

pub fn u16_bytes(values: impl IntoIterator<Item = u16>) -> Vec<u8> {
    values.into_iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// 12-bit test pattern of a single-sensor frame.
pub fn single_value(frame: usize, row: usize, col: usize) -> u16 {
    ((frame * 131 + row * 17 + col) % 4096) as u16
}

/// 12-bit test pattern of a merged dual-sensor frame.
pub fn merged_value(frame: usize, row: usize, col: usize) -> u16 {
    ((frame * 31 + row * 7 + col * 3) % 4096) as u16
}

/// A complete single-sensor file whose frames follow [`single_value`].
pub fn build_single_file(spec: &HeaderSpec, frames: usize) -> Vec<u8> {
    let (h, w) = (spec.height as usize, spec.width as usize);
    let mut buf = build_seq_header(spec);
    for f in 0..frames {
        let image = u16_bytes((0..h).flat_map(|r| (0..w).map(move |c| single_value(f, r, c))));
        buf.extend(build_record(spec, &image, f as u32, 0));
    }
    buf
}

/// Top and bottom segment files of a dual-sensor recording.
///
/// Frames follow [`merged_value`]; the top half is stored upside down.
/// `records` records of `pre_buffer` frames each are written, starting at
/// merged frame `first_frame`.
pub fn build_split_files(
    width: u32,
    half_height: u32,
    pre_buffer: usize,
    records: usize,
    first_frame: usize,
    declared_frames: i32,
) -> (Vec<u8>, Vec<u8>) {
    let spec = split_spec(width, half_height, pre_buffer, declared_frames);
    let (half, w) = (half_height as usize, width as usize);
    let mut top = build_seq_header(&spec);
    let mut bottom = build_seq_header(&spec);
    for r in 0..records {
        let mut top_image = Vec::with_capacity(spec.image_bytes());
        let mut bottom_image = Vec::with_capacity(spec.image_bytes());
        for slot in 0..pre_buffer {
            let f = first_frame + r * pre_buffer + slot;
            top_image.extend(u16_bytes(
                (0..half).flat_map(|sr| (0..w).map(move |c| merged_value(f, half - 1 - sr, c))),
            ));
            bottom_image.extend(u16_bytes(
                (0..half).flat_map(|sr| (0..w).map(move |c| merged_value(f, half + sr, c))),
            ));
        }
        top.extend(build_record(&spec, &top_image, r as u32, 1));
        bottom.extend(build_record(&spec, &bottom_image, r as u32, 2));
    }
    (top, bottom)
}

/// Header of one segment file: `pre_buffer` frames of `half_height` rows per record.
pub fn split_spec(width: u32, half_height: u32, pre_buffer: usize, declared_frames: i32) -> HeaderSpec {
    let mut spec = HeaderSpec::twelve_bit(width, half_height * pre_buffer as u32, declared_frames, 64);
    spec.fps = 300.0;
    spec
}

pub fn sidecar_xml(width: u32, height: u32, frame_rate: u32, pre_buffer: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Config>
  <Camera>
    <Model>Celeritas</Model>
    <ImageSizeX>{width}</ImageSizeX>
    <ImageSizeY>{height}</ImageSizeY>
    <FrameRate>{frame_rate}</FrameRate>
  </Camera>
  <References>
    <DarkRef>Yes</DarkRef>
    <GainRef>No</GainRef>
  </References>
  <SegmentPreBuffer>{pre_buffer}</SegmentPreBuffer>
</Config>
"#
    )
}

/// Correction image with `value(row, col)` samples.
pub fn build_reference(width: usize, height: usize, value: impl Fn(usize, usize) -> f32) -> Vec<u8> {
    let mut buf = vec![0u8; REFERENCE_HEADER_SIZE];
    buf[0..4].copy_from_slice(&(width as i32).to_le_bytes());
    buf[4..8].copy_from_slice(&(height as i32).to_le_bytes());
    for r in 0..height {
        for c in 0..width {
            buf.extend_from_slice(&value(r, c).to_le_bytes());
        }
    }
    buf
}

/// Binary metadata block with the given pixel size.
pub fn build_binary_metadata(pixel_size: f64) -> Vec<u8> {
    let mut buf = vec![0u8; 512];
    buf[0..4].copy_from_slice(&3u32.to_le_bytes());
    buf[4..8].copy_from_slice(&1024u32.to_le_bytes());
    buf[320..328].copy_from_slice(&1.5f64.to_le_bytes());
    buf[328..336].copy_from_slice(&50_000f64.to_le_bytes());
    buf[336..344].copy_from_slice(&pixel_size.to_le_bytes());
    buf[344..352].copy_from_slice(&0.25f64.to_le_bytes());
    buf
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("write test file");
    path
}
