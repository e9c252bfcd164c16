use ndarray::{Array2, ArrayViewMut2};

use crate::frame::Sample;

/// Decode one frame of little-endian words into `out` (shape = (height, width)).
///
/// With `flip_rows` the first stored row lands in the last output row. The
/// top half of the split sensor is stored upside down relative to the bottom.
/// Values are copied verbatim, so 12-bit data in 16-bit words keeps every bit.
pub fn decode_frame_into<T: Sample>(raw: &[u8], mut out: ArrayViewMut2<T>, flip_rows: bool) {
    let (height, width) = out.dim();
    let word = T::SAMPLE_TYPE.bytes();
    let row_bytes = width * word;
    debug_assert_eq!(raw.len(), height * row_bytes);

    for (row, mut dst) in out.rows_mut().into_iter().enumerate() {
        let src_row = if flip_rows { height - 1 - row } else { row };
        let src = &raw[src_row * row_bytes..(src_row + 1) * row_bytes];
        for (value, bytes) in dst.iter_mut().zip(src.chunks_exact(word)) {
            *value = T::from_le_slice(bytes);
        }
    }
}

/// Decode one frame into a freshly allocated array.
pub fn decode_frame<T: Sample>(raw: &[u8], height: usize, width: usize) -> Array2<T> {
    let mut data = Array2::<T>::zeros((height, width));
    decode_frame_into(raw, data.view_mut(), false);
    data
}
