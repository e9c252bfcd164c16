//! Merging of the split top/bottom segment files of the dual-sensor camera.
//!
//! Every record of a segment file holds `pre_buffer` consecutive frames of
//! one sensor half, each `header.height / pre_buffer` rows tall. The top half
//! is stored upside down; the merged frame is the flipped top slot stacked
//! above the bottom slot.

use std::marker::PhantomData;
use std::ops::Range;
use std::path::{Path, PathBuf};

use ndarray::{s, Array3, Axis};
use tracing::{debug, info, warn};

use crate::consts::{BOTTOM_MARKER, TOP_MARKER};
use crate::decode::decode_frame_into;
use crate::error::{Result, SeqError};
use crate::frame::{Sample, Timestamp};
use crate::io::header::FileHeader;
use crate::io::seq::read_timestamps;
use crate::io::sidecar::SidecarMetadata;
use crate::io::{decode_frames, ensure_len, map_file};
use crate::stack::{check_range, FrameSource};

/// One physical recording segment: the two halves of the sensor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentPair {
    pub top: PathBuf,
    pub bottom: PathBuf,
}

/// Ordered segment pairs of one recording.
#[derive(Clone, Debug)]
pub struct SegmentSet {
    pub pairs: Vec<SegmentPair>,
}

impl SegmentSet {
    /// Pair top and bottom files in the given order.
    pub fn new(tops: Vec<PathBuf>, bottoms: Vec<PathBuf>) -> Result<Self> {
        if tops.is_empty() || bottoms.is_empty() {
            return Err(SeqError::SegmentDiscovery(
                "need at least one top and one bottom file".into(),
            ));
        }
        if tops.len() != bottoms.len() {
            return Err(SeqError::SegmentDiscovery(format!(
                "{} top files but {} bottom files",
                tops.len(),
                bottoms.len()
            )));
        }
        let pairs = tops
            .into_iter()
            .zip(bottoms)
            .map(|(top, bottom)| SegmentPair { top, bottom })
            .collect();
        Ok(Self { pairs })
    }

    /// Pair `path` (either half) with the other half of the same recording.
    ///
    /// Other recordings may share the stem, e.g. `test_Top_14-04-59.355.seq`
    /// and `test_Top_15-20-01.100.seq`. The partner is the file with the same
    /// suffix when one exists; otherwise the file at the same position when
    /// both halves are sorted by name. Multi-segment recordings are built
    /// with [`SegmentSet::new`].
    pub fn discover(path: &Path) -> Result<Self> {
        let requested = SegmentName::parse(path).ok_or_else(|| {
            SeqError::SegmentDiscovery(format!(
                "{} has neither {TOP_MARKER} nor {BOTTOM_MARKER} in its name",
                path.display()
            ))
        })?;

        let mut tops = Vec::new();
        let mut bottoms = Vec::new();
        let entries =
            std::fs::read_dir(&requested.dir).map_err(|e| SeqError::io(&requested.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| SeqError::io(&requested.dir, e))?;
            let candidate = entry.path();
            if candidate.extension().and_then(|e| e.to_str()) != Some("seq") {
                continue;
            }
            let Some(name) = SegmentName::parse(&candidate) else {
                continue;
            };
            if name.stem != requested.stem {
                continue;
            }
            match name.half {
                Half::Top => tops.push((name.suffix, candidate)),
                Half::Bottom => bottoms.push((name.suffix, candidate)),
            }
        }
        tops.sort();
        bottoms.sort();

        let (own, others) = match requested.half {
            Half::Top => (&tops, &bottoms),
            Half::Bottom => (&bottoms, &tops),
        };
        let partner = others
            .iter()
            .find(|(suffix, _)| *suffix == requested.suffix)
            .or_else(|| {
                let rank = own.iter().position(|(suffix, _)| *suffix == requested.suffix)?;
                (own.len() == others.len()).then(|| &others[rank])
            })
            .map(|(_, p)| p.clone())
            .ok_or_else(|| {
                SeqError::SegmentDiscovery(format!(
                    "cannot tell which of {} {} files belongs to {}",
                    others.len(),
                    requested.half.other().marker(),
                    path.display()
                ))
            })?;
        debug!(
            stem = %requested.stem,
            candidates = others.len(),
            partner = %partner.display(),
            "Segment partner found"
        );

        let requested_path = path.to_path_buf();
        match requested.half {
            Half::Top => Self::new(vec![requested_path], vec![partner]),
            Half::Bottom => Self::new(vec![partner], vec![requested_path]),
        }
    }

    /// `<dir>/<stem>.seq`, the base name companion files hang off.
    pub fn base_path(&self) -> Option<PathBuf> {
        let (dir, stem) = split_segment_name(&self.pairs.first()?.top)?;
        Some(dir.join(format!("{stem}.seq")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Half {
    Top,
    Bottom,
}

impl Half {
    fn marker(self) -> &'static str {
        match self {
            Self::Top => TOP_MARKER,
            Self::Bottom => BOTTOM_MARKER,
        }
    }

    fn other(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }
}

/// `<dir>/<stem><marker><suffix>` split into its parts.
#[derive(Debug)]
struct SegmentName {
    dir: PathBuf,
    stem: String,
    half: Half,
    /// Everything after the marker, e.g. `_14-04-59.355.seq`.
    suffix: String,
}

impl SegmentName {
    fn parse(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (cut, half) = find_marker(name, Half::Top)
            .map(|i| (i, Half::Top))
            .or_else(|| find_marker(name, Half::Bottom).map(|i| (i, Half::Bottom)))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Some(Self {
            dir,
            stem: name[..cut].to_string(),
            half,
            suffix: name[cut + half.marker().len()..].to_string(),
        })
    }
}

/// Last position of the half's marker that ends a name component: it must be
/// followed by `_`, `.` or the end of the name. `scan_Topography.seq` has none.
fn find_marker(name: &str, half: Half) -> Option<usize> {
    let marker = half.marker();
    name.rmatch_indices(marker).map(|(i, _)| i).find(|&i| {
        matches!(
            name[i + marker.len()..].chars().next(),
            None | Some('_') | Some('.')
        )
    })
}

/// Split `<dir>/<stem>_Top...` or `<dir>/<stem>_Bottom...` into (dir, stem).
pub fn split_segment_name(path: &Path) -> Option<(PathBuf, String)> {
    SegmentName::parse(path).map(|name| (name.dir, name.stem))
}

/// True when the file name marks one half of a split recording.
pub fn is_segment_file(path: &Path) -> bool {
    SegmentName::parse(path).is_some()
}

/// A validated segment: both halves and the records they hold.
#[derive(Clone, Debug)]
struct SegmentFiles {
    top: PathBuf,
    bottom: PathBuf,
    records: usize,
}

/// Validated geometry of a split recording. No frame bytes are held.
#[derive(Clone, Debug)]
pub struct MergedSegments {
    segments: Vec<SegmentFiles>,
    header: FileHeader,
    pre_buffer: usize,
    half_height: usize,
    frame_count: usize,
}

impl MergedSegments {
    /// Header shared by every segment file.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn pre_buffer(&self) -> usize {
        self.pre_buffer
    }

    /// Merged frames across all segments.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// (height, width) of one merged frame.
    pub fn frame_dims(&self) -> (usize, usize) {
        (2 * self.half_height, self.header.width as usize)
    }

    /// Timestamps of every record, taken from the bottom files.
    pub fn timestamps(&self) -> Result<Vec<Timestamp>> {
        let mut all = Vec::new();
        for seg in &self.segments {
            all.extend(read_timestamps(&seg.bottom, &self.header, seg.records)?);
        }
        Ok(all)
    }
}

/// Validate every segment pair against each other and against the sidecar,
/// and compute the merged geometry. No frame bytes are read.
pub fn merge_segments(set: &SegmentSet, sidecar: &SidecarMetadata) -> Result<MergedSegments> {
    let mut segments = Vec::with_capacity(set.pairs.len());
    let mut shared: Option<FileHeader> = None;

    for (index, pair) in set.pairs.iter().enumerate() {
        let top = FileHeader::read(&pair.top)?;
        let bottom = FileHeader::read(&pair.bottom)?;
        check_geometry(index, &top, &bottom)?;
        if top.declared_frame_count != bottom.declared_frame_count {
            return Err(SeqError::SegmentCountMismatch {
                segment: index,
                top: top.declared_frame_count as usize,
                bottom: bottom.declared_frame_count as usize,
            });
        }

        let top_records = top.records_on_disk(file_len(&pair.top)?);
        let bottom_records = bottom.records_on_disk(file_len(&pair.bottom)?);
        if top_records != bottom_records {
            return Err(SeqError::SegmentCountMismatch {
                segment: index,
                top: top_records,
                bottom: bottom_records,
            });
        }
        if top_records != top.declared_frame_count as usize {
            debug!(
                segment = index,
                declared = top.declared_frame_count,
                on_disk = top_records,
                "Header frame count disagrees with file size, using file size"
            );
        }

        match &shared {
            Some(first) => check_geometry(index, first, &top)?,
            None => shared = Some(top.clone()),
        }
        segments.push(SegmentFiles {
            top: pair.top.clone(),
            bottom: pair.bottom.clone(),
            records: top_records,
        });
    }

    let header = shared.ok_or_else(|| SeqError::SegmentDiscovery("no segments".into()))?;
    let pre_buffer = sidecar.segment_pre_buffer as usize;
    if header.height as usize % pre_buffer != 0 {
        return Err(SeqError::SegmentGeometryMismatch {
            segment: 0,
            reason: format!(
                "record height {} is not a multiple of the pre-buffer {}",
                header.height, pre_buffer
            ),
        });
    }
    let half_height = header.height as usize / pre_buffer;
    if sidecar.image_width != header.width || sidecar.image_height as usize != 2 * half_height {
        return Err(SeqError::SegmentGeometryMismatch {
            segment: 0,
            reason: format!(
                "sidecar image {}x{} does not match merged segments {}x{}",
                sidecar.image_height,
                sidecar.image_width,
                2 * half_height,
                header.width
            ),
        });
    }
    let records: usize = segments.iter().map(|s| s.records).sum();
    let frame_count = records * pre_buffer;
    if frame_count == 0 {
        warn!("Segment files hold no complete records");
    }
    info!(
        segments = segments.len(),
        records,
        frames = frame_count,
        height = 2 * half_height,
        width = header.width,
        "Segments merged"
    );

    Ok(MergedSegments {
        segments,
        header,
        pre_buffer,
        half_height,
        frame_count,
    })
}

fn check_geometry(segment: usize, a: &FileHeader, b: &FileHeader) -> Result<()> {
    let mismatch = |what: &str, x: String, y: String| SeqError::SegmentGeometryMismatch {
        segment,
        reason: format!("{what} differs: {x} vs {y}"),
    };
    if (a.width, a.height) != (b.width, b.height) {
        return Err(mismatch(
            "frame size",
            format!("{}x{}", a.height, a.width),
            format!("{}x{}", b.height, b.width),
        ));
    }
    if a.bit_depth != b.bit_depth {
        return Err(mismatch(
            "bit depth",
            a.bit_depth.to_string(),
            b.bit_depth.to_string(),
        ));
    }
    if a.record_size != b.record_size {
        return Err(mismatch(
            "record size",
            a.record_size.to_string(),
            b.record_size.to_string(),
        ));
    }
    Ok(())
}

fn file_len(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path)
        .map_err(|e| SeqError::io(path, e))?
        .len())
}

/// Merged frames of a split recording, decoded on demand.
pub struct SplitFrames<T: Sample> {
    merged: MergedSegments,
    _sample: PhantomData<fn() -> T>,
}

impl<T: Sample> SplitFrames<T> {
    pub fn new(merged: MergedSegments) -> Result<Self> {
        if merged.header.sample_type != T::SAMPLE_TYPE {
            return Err(SeqError::UnsupportedBitDepth(merged.header.bit_depth));
        }
        Ok(Self {
            merged,
            _sample: PhantomData,
        })
    }

    pub fn merged(&self) -> &MergedSegments {
        &self.merged
    }
}

impl<T: Sample> FrameSource<T> for SplitFrames<T> {
    fn frame_count(&self) -> usize {
        self.merged.frame_count
    }

    fn frame_dims(&self) -> (usize, usize) {
        self.merged.frame_dims()
    }

    fn read_frames(&self, range: Range<usize>) -> Result<Array3<T>> {
        check_range(range.clone(), self.merged.frame_count)?;
        let (h, w) = self.frame_dims();
        let mut out = Array3::<T>::zeros((range.len(), h, w));

        let header = &self.merged.header;
        let pb = self.merged.pre_buffer;
        let half = self.merged.half_height;
        let slot_bytes = half * w * header.bytes_per_sample();

        let mut seg_start = 0;
        for seg in &self.merged.segments {
            let seg_end = seg_start + seg.records * pb;
            let lo = range.start.max(seg_start);
            let hi = range.end.min(seg_end);
            if lo < hi {
                let top = map_file(&seg.top)?;
                let bottom = map_file(&seg.bottom)?;
                let last = hi - 1 - seg_start;
                let needed = header.record_offset(last / pb) + (last % pb + 1) * slot_bytes;
                ensure_len(&top, needed, &seg.top)?;
                ensure_len(&bottom, needed, &seg.bottom)?;

                let first = lo - seg_start;
                let part = out.slice_mut(s![lo - range.start..hi - range.start, .., ..]);
                decode_frames(part, |i, frame| {
                    let local = first + i;
                    let offset = header.record_offset(local / pb) + (local % pb) * slot_bytes;
                    let bytes = offset..offset + slot_bytes;
                    let (top_half, bottom_half) = frame.split_at(Axis(0), half);
                    decode_frame_into(&top[bytes.clone()], top_half, true);
                    decode_frame_into(&bottom[bytes], bottom_half, false);
                });
            }
            seg_start = seg_end;
            if seg_start >= range.end {
                break;
            }
        }
        Ok(out)
    }
}
