use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{CameraVariant, ReadOptions};
use crate::consts::{DARK_SUFFIX, GAIN_SUFFIX, METADATA_SUFFIX, MIN_PIXEL_SIZE, XML_SUFFIX};
use crate::error::{Result, SeqError};
use crate::frame::{AxisInfo, Sample, SampleType, Timestamp};
use crate::io::header::FileHeader;
use crate::io::metadata::{read_metadata, MetadataMap};
use crate::io::reference::{load_references, ReferencePair, ReferenceRequirement};
use crate::io::segment::{
    is_segment_file, merge_segments, MergedSegments, SegmentPair, SegmentSet, SplitFrames,
};
use crate::io::seq::{read_timestamps, SeqFrames};
use crate::io::sidecar::{read_xml_fields, SidecarMetadata, XmlFields};
use crate::stack::{FrameSource, FrameStack, NavigationShape};

/// A single-sensor recording and its optional companions.
#[derive(Clone, Debug)]
pub struct SingleSensorSource {
    pub file: PathBuf,
    pub dark: Option<PathBuf>,
    pub gain: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub xml: Option<PathBuf>,
}

impl SingleSensorSource {
    /// Companions follow the `<file>.dark.mrc` style naming.
    pub fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            dark: Some(with_suffix(file, DARK_SUFFIX)),
            gain: Some(with_suffix(file, GAIN_SUFFIX)),
            metadata: Some(with_suffix(file, METADATA_SUFFIX)),
            xml: Some(with_suffix(file, XML_SUFFIX)),
        }
    }
}

/// A split top/bottom recording. The XML sidecar is mandatory.
#[derive(Clone, Debug)]
pub struct DualSensorSource {
    pub segments: SegmentSet,
    pub xml: PathBuf,
    pub dark: Option<PathBuf>,
    pub gain: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
}

impl DualSensorSource {
    /// Companions hang off `<stem>.seq`; the metadata file off the first bottom file.
    pub fn new(segments: SegmentSet) -> Result<Self> {
        let base = segments.base_path().ok_or_else(|| {
            SeqError::SegmentDiscovery("segment names carry no _Top/_Bottom marker".into())
        })?;
        let metadata = segments
            .pairs
            .first()
            .map(|pair| with_suffix(&pair.bottom, METADATA_SUFFIX));
        Ok(Self {
            xml: with_suffix(&base, XML_SUFFIX),
            dark: Some(with_suffix(&base, DARK_SUFFIX)),
            gain: Some(with_suffix(&base, GAIN_SUFFIX)),
            metadata,
            segments,
        })
    }

    /// Find the recording that `path` (either half) belongs to.
    pub fn discover(path: &Path) -> Result<Self> {
        Self::new(SegmentSet::discover(path)?)
    }
}

/// The two pipelines the reader can run.
#[derive(Clone, Debug)]
pub enum SequenceSource {
    Single(SingleSensorSource),
    Dual(DualSensorSource),
}

impl SequenceSource {
    /// Resolve `path` and its conventional companions for `variant`.
    pub fn from_path(path: &Path, variant: CameraVariant) -> Result<Self> {
        let dual = match variant {
            CameraVariant::Auto => is_segment_file(path),
            CameraVariant::SingleSensor => false,
            CameraVariant::Celeritas => true,
        };
        if dual {
            Ok(Self::Dual(DualSensorSource::discover(path)?))
        } else {
            Ok(Self::Single(SingleSensorSource::new(path)))
        }
    }
}

/// Decoded frames, typed by the on-disk sample word.
#[derive(Clone, Debug)]
pub enum SequenceData {
    U8(FrameStack<u8>),
    U16(FrameStack<u16>),
    U32(FrameStack<u32>),
}

impl SequenceData {
    pub fn sample_type(&self) -> SampleType {
        match self {
            Self::U8(_) => SampleType::U8,
            Self::U16(_) => SampleType::U16,
            Self::U32(_) => SampleType::U32,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Self::U8(s) => s.shape(),
            Self::U16(s) => s.shape(),
            Self::U32(s) => s.shape(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        match self {
            Self::U8(s) => s.is_lazy(),
            Self::U16(s) => s.is_lazy(),
            Self::U32(s) => s.is_lazy(),
        }
    }

    pub fn frame_count(&self) -> usize {
        match self {
            Self::U8(s) => s.frame_count(),
            Self::U16(s) => s.frame_count(),
            Self::U32(s) => s.frame_count(),
        }
    }

    pub fn as_u16(&self) -> Option<&FrameStack<u16>> {
        match self {
            Self::U16(s) => Some(s),
            _ => None,
        }
    }
}

/// Paths that took part in a read.
#[derive(Clone, Debug)]
pub struct InputFiles {
    pub file: PathBuf,
    pub segments: Vec<SegmentPair>,
    pub dark: Option<PathBuf>,
    pub gain: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub xml: Option<PathBuf>,
}

/// Everything known about the recording besides the frames.
///
/// Header and sidecar are kept side by side; `frame_rate` and `frame_count`
/// are the values the reader considers authoritative.
#[derive(Clone, Debug)]
pub struct SequenceMetadata {
    pub files: InputFiles,
    pub header: FileHeader,
    /// Dual-sensor only.
    pub sidecar: Option<SidecarMetadata>,
    /// Raw XML fields of a single-sensor recording, when an XML file exists.
    pub xml_fields: Option<XmlFields>,
    pub references: ReferencePair,
    pub acquisition: Option<MetadataMap>,
    /// One per record. Only filled by eager reads.
    pub timestamps: Option<Vec<Timestamp>>,
    pub frame_rate: f64,
    pub frame_count: usize,
}

impl SequenceMetadata {
    /// Calibrated pixel size from the acquisition metadata, if any.
    pub fn pixel_size(&self) -> Option<f64> {
        self.acquisition
            .as_ref()?
            .get("PixelSize")?
            .as_f64()
            .filter(|&size| size > MIN_PIXEL_SIZE)
    }
}

/// Result of a read.
#[derive(Clone, Debug)]
pub struct SequenceRead {
    pub data: SequenceData,
    pub metadata: SequenceMetadata,
    pub axes: Vec<AxisInfo>,
}

/// Resolve `path` per `options.variant` and read it.
pub fn read_path(path: &Path, options: &ReadOptions) -> Result<SequenceRead> {
    let source = SequenceSource::from_path(path, options.variant)?;
    read(&source, options)
}

pub fn read(source: &SequenceSource, options: &ReadOptions) -> Result<SequenceRead> {
    match source {
        SequenceSource::Single(single) => read_single(single, options),
        SequenceSource::Dual(dual) => read_dual(dual, options),
    }
}

fn read_single(source: &SingleSensorSource, options: &ReadOptions) -> Result<SequenceRead> {
    info!(path = %source.file.display(), lazy = options.lazy, "Reading single-sensor sequence");
    let header = FileHeader::read(&source.file)?;
    let frame_dims = (header.height as usize, header.width as usize);

    let references = load_references(
        source.dark.as_deref(),
        source.gain.as_deref(),
        frame_dims,
        requirement(options),
    )?;
    let xml_fields = match source.xml.as_deref() {
        Some(path) if path.exists() => Some(read_xml_fields(path)?),
        _ => None,
    };
    let acquisition = read_optional_metadata(source.metadata.as_deref())?;

    let data = match header.sample_type {
        SampleType::U8 => SequenceData::U8(single_stack(source, &header, options)?),
        SampleType::U16 => SequenceData::U16(single_stack(source, &header, options)?),
        SampleType::U32 => SequenceData::U32(single_stack(source, &header, options)?),
    };
    let frame_count = data.frame_count();
    let timestamps = if options.lazy {
        None
    } else {
        Some(read_timestamps(&source.file, &header, frame_count)?)
    };

    let metadata = SequenceMetadata {
        files: InputFiles {
            file: source.file.clone(),
            segments: Vec::new(),
            dark: source.dark.clone(),
            gain: source.gain.clone(),
            metadata: source.metadata.clone(),
            xml: source.xml.clone(),
        },
        frame_rate: header.declared_fps,
        frame_count,
        header,
        sidecar: None,
        xml_fields,
        references,
        acquisition,
        timestamps,
    };
    Ok(finish(data, metadata, &options.navigation_shape))
}

fn single_stack<T: Sample>(
    source: &SingleSensorSource,
    header: &FileHeader,
    options: &ReadOptions,
) -> Result<FrameStack<T>> {
    let frames: Arc<dyn FrameSource<T>> =
        Arc::new(SeqFrames::<T>::new(&source.file, header.clone())?);
    FrameStack::assemble(frames, &options.navigation_shape, options.lazy)
}

fn read_dual(source: &DualSensorSource, options: &ReadOptions) -> Result<SequenceRead> {
    info!(
        segments = source.segments.pairs.len(),
        lazy = options.lazy,
        "Reading dual-sensor sequence"
    );
    let sidecar = SidecarMetadata::read(&source.xml)?;
    let merged = merge_segments(&source.segments, &sidecar)?;
    let header = merged.header().clone();
    if header.declared_fps != sidecar.frame_rate {
        warn!(
            header_fps = header.declared_fps,
            sidecar_fps = sidecar.frame_rate,
            "Header frame rate is unreliable for this camera, using the sidecar value"
        );
    }

    let references = load_references(
        source.dark.as_deref(),
        source.gain.as_deref(),
        merged.frame_dims(),
        requirement(options),
    )?;
    if sidecar.dark_reference && references.dark.is_none() {
        warn!("Sidecar lists a dark reference but none was loaded");
    }
    if sidecar.gain_reference && references.gain.is_none() {
        warn!("Sidecar lists a gain reference but none was loaded");
    }
    let acquisition = read_optional_metadata(source.metadata.as_deref())?;

    let frame_count = merged.frame_count();
    let data = match header.sample_type {
        SampleType::U8 => SequenceData::U8(split_stack(merged.clone(), options)?),
        SampleType::U16 => SequenceData::U16(split_stack(merged.clone(), options)?),
        SampleType::U32 => SequenceData::U32(split_stack(merged.clone(), options)?),
    };
    // Only after the navigation shape has been accepted.
    let timestamps = if options.lazy {
        None
    } else {
        Some(merged.timestamps()?)
    };

    let first = source.segments.pairs.first();
    let metadata = SequenceMetadata {
        files: InputFiles {
            file: first.map(|p| p.top.clone()).unwrap_or_default(),
            segments: source.segments.pairs.clone(),
            dark: source.dark.clone(),
            gain: source.gain.clone(),
            metadata: source.metadata.clone(),
            xml: Some(source.xml.clone()),
        },
        frame_rate: sidecar.frame_rate,
        frame_count,
        header,
        sidecar: Some(sidecar),
        xml_fields: None,
        references,
        acquisition,
        timestamps,
    };
    Ok(finish(data, metadata, &options.navigation_shape))
}

fn split_stack<T: Sample>(
    merged: MergedSegments,
    options: &ReadOptions,
) -> Result<FrameStack<T>> {
    let frames: Arc<dyn FrameSource<T>> = Arc::new(SplitFrames::<T>::new(merged)?);
    FrameStack::assemble(frames, &options.navigation_shape, options.lazy)
}

fn requirement(options: &ReadOptions) -> ReferenceRequirement {
    ReferenceRequirement {
        dark: options.require_dark,
        gain: options.require_gain,
    }
}

fn read_optional_metadata(path: Option<&Path>) -> Result<Option<MetadataMap>> {
    match path {
        Some(path) => read_metadata(path),
        None => Ok(None),
    }
}

fn finish(
    data: SequenceData,
    metadata: SequenceMetadata,
    navigation: &NavigationShape,
) -> SequenceRead {
    let axes = build_axes(&data, &metadata, navigation);
    info!(
        shape = ?data.shape(),
        dtype = %data.sample_type(),
        lazy = data.is_lazy(),
        "Sequence read"
    );
    SequenceRead {
        data,
        metadata,
        axes,
    }
}

/// One axis per output dimension: a time axis (or the requested navigation
/// axes), then y and x scaled by the pixel size when it is calibrated.
pub fn build_axes(
    data: &SequenceData,
    metadata: &SequenceMetadata,
    navigation: &NavigationShape,
) -> Vec<AxisInfo> {
    let shape = data.shape();
    let (nav, signal) = shape.split_at(shape.len() - 2);
    let mut axes: Vec<AxisInfo> = if navigation.is_empty() {
        vec![AxisInfo::time(nav[0], metadata.frame_rate)]
    } else {
        nav.iter().map(|&size| AxisInfo::navigation(size)).collect()
    };
    let scale = metadata.pixel_size().unwrap_or(1.0);
    axes.push(AxisInfo::signal("y", signal[0], scale));
    axes.push(AxisInfo::signal("x", signal[1], scale));
    axes
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
