use std::marker::PhantomData;
use std::ops::Range;
use std::path::{Path, PathBuf};

use ndarray::Array3;
use tracing::debug;

use crate::consts::TIMESTAMP_SIZE;
use crate::decode::decode_frame_into;
use crate::error::{Result, SeqError};
use crate::frame::{Sample, Timestamp};
use crate::io::header::FileHeader;
use crate::io::{decode_frames, ensure_len, map_file};
use crate::stack::{check_range, FrameSource};

/// Frames of a single-sensor sequence file, one frame per record.
///
/// Holds only the validated header and path; every read maps the file anew.
pub struct SeqFrames<T: Sample> {
    path: PathBuf,
    header: FileHeader,
    frame_count: usize,
    _sample: PhantomData<fn() -> T>,
}

impl<T: Sample> SeqFrames<T> {
    /// Bind a validated header to its file. Checks that the file is long
    /// enough for the declared frame count without touching frame bytes.
    pub fn new(path: &Path, header: FileHeader) -> Result<Self> {
        if header.sample_type != T::SAMPLE_TYPE {
            return Err(SeqError::UnsupportedBitDepth(header.bit_depth));
        }
        let file_len = std::fs::metadata(path)
            .map_err(|e| SeqError::io(path, e))?
            .len();
        let frame_count = header.declared_frame_count as usize;
        let available = header.records_on_disk(file_len);
        if available < frame_count {
            return Err(SeqError::malformed_header(
                path,
                format!("header declares {frame_count} frames, file holds {available}"),
            ));
        }
        debug!(
            path = %path.display(),
            width = header.width,
            height = header.height,
            frames = frame_count,
            "Sequence file opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            header,
            frame_count,
            _sample: PhantomData,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Sample> FrameSource<T> for SeqFrames<T> {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn frame_dims(&self) -> (usize, usize) {
        (self.header.height as usize, self.header.width as usize)
    }

    fn read_frames(&self, range: Range<usize>) -> Result<Array3<T>> {
        check_range(range.clone(), self.frame_count)?;
        let (h, w) = self.frame_dims();
        let mut out = Array3::<T>::zeros((range.len(), h, w));
        if range.is_empty() {
            return Ok(out);
        }

        let mmap = map_file(&self.path)?;
        let image_bytes = self.header.image_bytes();
        ensure_len(
            &mmap,
            self.header.record_offset(range.end - 1) + image_bytes,
            &self.path,
        )?;

        let start = range.start;
        decode_frames(out.view_mut(), |i, frame| {
            let offset = self.header.record_offset(start + i);
            decode_frame_into(&mmap[offset..offset + image_bytes], frame, false);
        });
        Ok(out)
    }
}

/// Read the timestamp trailing each of the first `records` records.
pub fn read_timestamps(path: &Path, header: &FileHeader, records: usize) -> Result<Vec<Timestamp>> {
    if records == 0 {
        return Ok(Vec::new());
    }
    let mmap = map_file(path)?;
    let image_bytes = header.image_bytes();
    ensure_len(
        &mmap,
        header.record_offset(records - 1) + image_bytes + TIMESTAMP_SIZE,
        path,
    )?;
    Ok((0..records)
        .map(|r| {
            let offset = header.record_offset(r) + image_bytes;
            Timestamp::from_le_bytes(&mmap[offset..offset + TIMESTAMP_SIZE])
        })
        .collect())
}
