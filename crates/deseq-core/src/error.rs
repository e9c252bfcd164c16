use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeqError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed sequence header in {}: {reason}", path.display())]
    MalformedHeader { path: PathBuf, reason: String },

    #[error("Malformed reference image {}: {reason}", path.display())]
    MalformedReference { path: PathBuf, reason: String },

    #[error("Malformed metadata file {}: {reason}", path.display())]
    MalformedMetadata { path: PathBuf, reason: String },

    #[error(
        "{kind} reference is {found_height}x{found_width}, expected {expected_height}x{expected_width}"
    )]
    ReferenceDimensionMismatch {
        kind: ReferenceKind,
        expected_height: usize,
        expected_width: usize,
        found_height: usize,
        found_width: usize,
    },

    #[error("Sidecar {} is missing field `{field}`", path.display())]
    MissingSidecarField { path: PathBuf, field: &'static str },

    #[error("Invalid sidecar XML {}: {reason}", path.display())]
    InvalidSidecar { path: PathBuf, reason: String },

    #[error("Segment {segment}: top has {top} frames, bottom has {bottom}")]
    SegmentCountMismatch {
        segment: usize,
        top: usize,
        bottom: usize,
    },

    #[error("Segment {segment}: {reason}")]
    SegmentGeometryMismatch { segment: usize, reason: String },

    #[error("Cannot locate segment files: {0}")]
    SegmentDiscovery(String),

    #[error("Navigation shape {requested:?} covers {product} frames, stack has {total}")]
    ShapeMismatch {
        requested: Vec<usize>,
        product: usize,
        total: usize,
    },

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u32),

    #[error("Navigation index has {found} dimensions, stack has {expected}")]
    IndexRank { expected: usize, found: usize },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Invalid read options: {0}")]
    Config(String),
}

impl SeqError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn malformed_header(path: &Path, reason: impl Into<String>) -> Self {
        Self::MalformedHeader {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Which correction image a reference error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    Dark,
    Gain,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dark => write!(f, "Dark"),
            Self::Gain => write!(f, "Gain"),
        }
    }
}

pub type Result<T> = std::result::Result<T, SeqError>;
