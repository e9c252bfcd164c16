pub mod header;
pub mod metadata;
pub mod reference;
pub mod segment;
pub mod seq;
pub mod sidecar;

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use ndarray::{ArrayViewMut2, ArrayViewMut3, Axis};
use rayon::prelude::*;

use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{Result, SeqError};
use crate::frame::Sample;

/// Map a file read-only. Every call gets its own handle and mapping, so
/// concurrent chunk reads never share a cursor.
pub(crate) fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(|e| SeqError::io(path, e))?;
    // The mapping is read-only and dropped before this read returns.
    unsafe { Mmap::map(&file) }.map_err(|e| SeqError::io(path, e))
}

/// Fail with `UnexpectedEof` when the mapped file is shorter than `needed`.
pub(crate) fn ensure_len(mmap: &Mmap, needed: usize, path: &Path) -> Result<()> {
    if mmap.len() < needed {
        return Err(SeqError::io(
            path,
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("need {} bytes, file has {}", needed, mmap.len()),
            ),
        ));
    }
    Ok(())
}

/// Run `decode` for every frame slot of `out`, in parallel for larger batches.
pub(crate) fn decode_frames<T, F>(mut out: ArrayViewMut3<T>, decode: F)
where
    T: Sample,
    F: Fn(usize, ArrayViewMut2<T>) + Send + Sync,
{
    let count = out.len_of(Axis(0));
    if count >= PARALLEL_FRAME_THRESHOLD {
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, frame)| decode(i, frame));
    } else {
        out.axis_iter_mut(Axis(0))
            .enumerate()
            .for_each(|(i, frame)| decode(i, frame));
    }
}
