use std::io::Cursor;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use ndarray::Array2;
use tracing::{debug, warn};

use crate::consts::REFERENCE_HEADER_SIZE;
use crate::error::{ReferenceKind, Result, SeqError};

/// Dark and gain correction images. Either may be absent.
#[derive(Clone, Debug, Default)]
pub struct ReferencePair {
    pub dark: Option<Array2<f32>>,
    pub gain: Option<Array2<f32>>,
}

/// Which references the caller insists on.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceRequirement {
    pub dark: bool,
    pub gain: bool,
}

/// Read a correction image: `i32` nx, `i32` ny, then `f32` samples at offset 1024.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn read_reference(path: &Path) -> Result<Option<Array2<f32>>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SeqError::io(path, e)),
    };

    let malformed = |reason: String| SeqError::MalformedReference {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < REFERENCE_HEADER_SIZE {
        return Err(malformed(format!(
            "file too small for header: {} bytes",
            bytes.len()
        )));
    }

    let mut cursor = Cursor::new(&bytes[..8]);
    let nx = cursor
        .read_i32::<LittleEndian>()
        .map_err(|e| SeqError::io(path, e))?;
    let ny = cursor
        .read_i32::<LittleEndian>()
        .map_err(|e| SeqError::io(path, e))?;
    if nx <= 0 || ny <= 0 {
        return Err(malformed(format!("invalid dimensions {nx}x{ny}")));
    }
    let (width, height) = (nx as usize, ny as usize);

    let needed = REFERENCE_HEADER_SIZE + width * height * 4;
    if bytes.len() < needed {
        return Err(malformed(format!(
            "{}x{} image needs {} bytes, file has {}",
            height,
            width,
            needed,
            bytes.len()
        )));
    }

    let mut samples = vec![0f32; width * height];
    LittleEndian::read_f32_into(&bytes[REFERENCE_HEADER_SIZE..needed], &mut samples);
    let image = Array2::from_shape_vec((height, width), samples)
        .map_err(|e| malformed(e.to_string()))?;
    debug!(path = %path.display(), height, width, "Reference image read");
    Ok(Some(image))
}

/// Load the dark and gain references and check them against the frame
/// geometry `(height, width)`.
pub fn load_references(
    dark: Option<&Path>,
    gain: Option<&Path>,
    frame_dims: (usize, usize),
    required: ReferenceRequirement,
) -> Result<ReferencePair> {
    Ok(ReferencePair {
        dark: load_one(ReferenceKind::Dark, dark, frame_dims, required.dark)?,
        gain: load_one(ReferenceKind::Gain, gain, frame_dims, required.gain)?,
    })
}

fn load_one(
    kind: ReferenceKind,
    path: Option<&Path>,
    (height, width): (usize, usize),
    required: bool,
) -> Result<Option<Array2<f32>>> {
    let Some(path) = path else {
        if required {
            return Err(SeqError::Config(format!("{kind} reference required but no path given")));
        }
        return Ok(None);
    };

    let Some(image) = read_reference(path)? else {
        if required {
            return Err(SeqError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "reference image not found"),
            ));
        }
        warn!(path = %path.display(), "No {kind} reference found, continuing without it");
        return Ok(None);
    };

    let (found_height, found_width) = image.dim();
    if (found_height, found_width) != (height, width) {
        return Err(SeqError::ReferenceDimensionMismatch {
            kind,
            expected_height: height,
            expected_width: width,
            found_height,
            found_width,
        });
    }
    Ok(Some(image))
}
