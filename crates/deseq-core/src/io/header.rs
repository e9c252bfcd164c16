use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::consts::{
    OFFSET_BIT_DEPTH, OFFSET_BIT_DEPTH_REAL, OFFSET_FPS, OFFSET_IMAGE_HEIGHT, OFFSET_IMAGE_WIDTH,
    OFFSET_NUM_FRAMES, OFFSET_TRUE_IMAGE_SIZE, SEQ_HEADER_SIZE, TIMESTAMP_SIZE,
};
use crate::error::{Result, SeqError};
use crate::frame::SampleType;

/// Sequence file header, decoded from the fixed 8192-byte prefix.
///
/// `declared_frame_count` and `declared_fps` are what the recorder wrote.
/// For the dual-sensor camera both are known to be wrong and are kept
/// only for inspection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub width: u32,
    pub height: u32,
    /// Storage word size in bits (8, 16 or 32).
    pub bit_depth: u32,
    pub sample_type: SampleType,
    /// Significant bits per sample, e.g. 12 for 12-bit data in 16-bit words.
    pub real_bit_depth: u32,
    pub declared_frame_count: i32,
    /// Full record size in bytes: image, timestamp and padding.
    pub record_size: usize,
    pub declared_fps: f64,
}

impl FileHeader {
    /// Read and validate the header of a sequence file. Only the header block is read.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| SeqError::io(path, e))?;
        let mut buf = Vec::with_capacity(SEQ_HEADER_SIZE);
        file.take(SEQ_HEADER_SIZE as u64)
            .read_to_end(&mut buf)
            .map_err(|e| SeqError::io(path, e))?;
        Self::from_bytes(&buf, path)
    }

    /// Decode a header block. `path` is only used for error reporting.
    pub fn from_bytes(buf: &[u8], path: &Path) -> Result<Self> {
        if buf.len() < SEQ_HEADER_SIZE {
            return Err(SeqError::malformed_header(
                path,
                format!(
                    "file too small for header: {} bytes, need {}",
                    buf.len(),
                    SEQ_HEADER_SIZE
                ),
            ));
        }

        let mut cursor = Cursor::new(&buf[..SEQ_HEADER_SIZE]);
        let width = read_u32_at(&mut cursor, OFFSET_IMAGE_WIDTH, path)?;
        let height = read_u32_at(&mut cursor, OFFSET_IMAGE_HEIGHT, path)?;
        let bit_depth = read_u32_at(&mut cursor, OFFSET_BIT_DEPTH, path)?;
        let real_bit_depth = read_u32_at(&mut cursor, OFFSET_BIT_DEPTH_REAL, path)?;

        cursor
            .seek(SeekFrom::Start(OFFSET_NUM_FRAMES))
            .map_err(|e| SeqError::io(path, e))?;
        let declared_frame_count = cursor
            .read_i32::<LittleEndian>()
            .map_err(|e| SeqError::io(path, e))?;

        cursor
            .seek(SeekFrom::Start(OFFSET_TRUE_IMAGE_SIZE))
            .map_err(|e| SeqError::io(path, e))?;
        let record_size = cursor
            .read_i32::<LittleEndian>()
            .map_err(|e| SeqError::io(path, e))?;

        cursor
            .seek(SeekFrom::Start(OFFSET_FPS))
            .map_err(|e| SeqError::io(path, e))?;
        let declared_fps = cursor
            .read_f64::<LittleEndian>()
            .map_err(|e| SeqError::io(path, e))?;

        if width == 0 || height == 0 {
            return Err(SeqError::malformed_header(
                path,
                format!("invalid image dimensions {width}x{height}"),
            ));
        }
        if declared_frame_count < 0 {
            return Err(SeqError::malformed_header(
                path,
                format!("negative frame count {declared_frame_count}"),
            ));
        }
        if record_size <= 0 {
            return Err(SeqError::malformed_header(
                path,
                format!("invalid record size {record_size}"),
            ));
        }

        let sample_type = SampleType::from_bit_depth(bit_depth)?;
        let real_bit_depth = if real_bit_depth == 0 {
            bit_depth
        } else {
            real_bit_depth
        };
        if real_bit_depth > bit_depth {
            return Err(SeqError::malformed_header(
                path,
                format!("real bit depth {real_bit_depth} exceeds storage depth {bit_depth}"),
            ));
        }

        let header = Self {
            width,
            height,
            bit_depth,
            sample_type,
            real_bit_depth,
            declared_frame_count,
            record_size: record_size as usize,
            declared_fps,
        };

        let image_bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(sample_type.bytes()))
            .ok_or_else(|| SeqError::malformed_header(path, "image size overflows"))?;
        if header.record_size < image_bytes + TIMESTAMP_SIZE {
            return Err(SeqError::malformed_header(
                path,
                format!(
                    "record size {} cannot hold a {}x{} {}-bit image plus timestamp ({} bytes)",
                    header.record_size,
                    width,
                    height,
                    bit_depth,
                    image_bytes + TIMESTAMP_SIZE
                ),
            ));
        }

        Ok(header)
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.sample_type.bytes()
    }

    /// Bytes of image data at the start of each record.
    pub fn image_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_sample()
    }

    /// Byte offset of record `index` from the start of the file.
    pub fn record_offset(&self, index: usize) -> usize {
        SEQ_HEADER_SIZE + index * self.record_size
    }

    /// Number of complete records a file of `file_len` bytes holds.
    /// The final record may omit its trailing padding.
    pub fn records_on_disk(&self, file_len: u64) -> usize {
        let Some(payload) = (file_len as usize).checked_sub(SEQ_HEADER_SIZE) else {
            return 0;
        };
        let full = payload / self.record_size;
        let tail = payload % self.record_size;
        if tail >= self.image_bytes() + TIMESTAMP_SIZE {
            full + 1
        } else {
            full
        }
    }
}

fn read_u32_at(cursor: &mut Cursor<&[u8]>, offset: u64, path: &Path) -> Result<u32> {
    cursor
        .seek(SeekFrom::Start(offset))
        .map_err(|e| SeqError::io(path, e))?;
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| SeqError::io(path, e))
}
