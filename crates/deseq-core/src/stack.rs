use std::ops::Range;
use std::sync::Arc;

use ndarray::{s, Array2, Array3, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SeqError};
use crate::frame::Sample;

/// Anything that can hand out decoded frames by index.
///
/// The shape assembler only talks to this trait, so eager and lazy stacks
/// share one reshape path.
pub trait FrameSource<T: Sample>: Send + Sync {
    fn frame_count(&self) -> usize;

    /// (height, width) of one frame.
    fn frame_dims(&self) -> (usize, usize);

    /// Decode frames `range`, shape = (range.len(), height, width).
    fn read_frames(&self, range: Range<usize>) -> Result<Array3<T>>;

    fn read_frame(&self, index: usize) -> Result<Array2<T>> {
        let total = self.frame_count();
        let end = index
            .checked_add(1)
            .ok_or(SeqError::FrameIndexOutOfRange { index, total })?;
        check_range(index..end, total)?;
        let frames = self.read_frames(index..end)?;
        Ok(frames.index_axis_move(Axis(0), 0))
    }
}

/// Reject ranges that run past `total`.
pub fn check_range(range: Range<usize>, total: usize) -> Result<()> {
    if range.start > range.end || range.end > total {
        return Err(SeqError::FrameIndexOutOfRange {
            index: range.end.saturating_sub(1).max(range.start),
            total,
        });
    }
    Ok(())
}

/// Fully decoded frames held in memory.
pub struct InMemoryFrames<T: Sample> {
    data: Array3<T>,
}

impl<T: Sample> InMemoryFrames<T> {
    pub fn new(data: Array3<T>) -> Self {
        Self { data }
    }

    /// Decode every frame of `source` up front.
    pub fn load(source: &dyn FrameSource<T>) -> Result<Self> {
        let data = source.read_frames(0..source.frame_count())?;
        Ok(Self { data })
    }
}

impl<T: Sample> FrameSource<T> for InMemoryFrames<T> {
    fn frame_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    fn frame_dims(&self) -> (usize, usize) {
        let (_, h, w) = self.data.dim();
        (h, w)
    }

    fn read_frames(&self, range: Range<usize>) -> Result<Array3<T>> {
        check_range(range.clone(), self.frame_count())?;
        Ok(self.data.slice(s![range, .., ..]).to_owned())
    }
}

/// Caller-requested folding of the frame axis. Empty means "one frame axis".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigationShape(pub Vec<usize>);

impl NavigationShape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Leading dimensions for a stack of `total` frames.
    pub fn resolve(&self, total: usize) -> Result<Vec<usize>> {
        if self.0.is_empty() {
            return Ok(vec![total]);
        }
        let product = self
            .0
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .unwrap_or(usize::MAX);
        if product != total {
            return Err(SeqError::ShapeMismatch {
                requested: self.0.clone(),
                product,
                total,
            });
        }
        Ok(self.0.clone())
    }
}

impl From<Vec<usize>> for NavigationShape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl From<&[usize]> for NavigationShape {
    fn from(dims: &[usize]) -> Self {
        Self(dims.to_vec())
    }
}

/// A frame stack with navigation dimensions in front of (height, width).
///
/// Eager stacks are backed by [`InMemoryFrames`]; lazy stacks keep the file
/// source and decode a chunk only when it is asked for.
#[derive(Clone)]
pub struct FrameStack<T: Sample> {
    source: Arc<dyn FrameSource<T>>,
    navigation: Vec<usize>,
    lazy: bool,
}

impl<T: Sample> FrameStack<T> {
    /// Validate `navigation` against the source and materialize per `lazy`.
    /// The shape check happens before any frame bytes are read.
    pub fn assemble(
        source: Arc<dyn FrameSource<T>>,
        navigation: &NavigationShape,
        lazy: bool,
    ) -> Result<Self> {
        let navigation = navigation.resolve(source.frame_count())?;
        let source: Arc<dyn FrameSource<T>> = if lazy {
            source
        } else {
            Arc::new(InMemoryFrames::load(source.as_ref())?)
        };
        debug!(navigation = ?navigation, lazy, "Frame stack assembled");
        Ok(Self {
            source,
            navigation,
            lazy,
        })
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn frame_count(&self) -> usize {
        self.source.frame_count()
    }

    pub fn frame_dims(&self) -> (usize, usize) {
        self.source.frame_dims()
    }

    pub fn navigation_shape(&self) -> &[usize] {
        &self.navigation
    }

    /// Full shape: navigation dimensions followed by (height, width).
    pub fn shape(&self) -> Vec<usize> {
        let (h, w) = self.frame_dims();
        let mut shape = self.navigation.clone();
        shape.extend([h, w]);
        shape
    }

    /// Row-major position of `index` along the flattened frame axis.
    pub fn flat_index(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.navigation.len() {
            return Err(SeqError::IndexRank {
                expected: self.navigation.len(),
                found: index.len(),
            });
        }
        let mut flat = 0usize;
        for (&i, &dim) in index.iter().zip(&self.navigation) {
            if i >= dim {
                return Err(SeqError::FrameIndexOutOfRange {
                    index: i,
                    total: dim,
                });
            }
            flat = flat * dim + i;
        }
        Ok(flat)
    }

    /// Decode the frame at a navigation index.
    pub fn chunk(&self, index: &[usize]) -> Result<Array2<T>> {
        let flat = self.flat_index(index)?;
        self.source.read_frame(flat)
    }

    /// Decode a run of frames along the flattened frame axis.
    pub fn frames(&self, range: Range<usize>) -> Result<Array3<T>> {
        check_range(range.clone(), self.frame_count())?;
        self.source.read_frames(range)
    }

    /// Materialize the whole stack in its navigation shape.
    pub fn to_array(&self) -> Result<ArrayD<T>> {
        let frames = self.source.read_frames(0..self.frame_count())?;
        frames
            .into_shape_with_order(IxDyn(&self.shape()))
            .map_err(|_| SeqError::ShapeMismatch {
                requested: self.navigation.clone(),
                product: self.navigation.iter().product(),
                total: self.frame_count(),
            })
    }
}

impl<T: Sample> std::fmt::Debug for FrameStack<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStack")
            .field("shape", &self.shape())
            .field("sample_type", &T::SAMPLE_TYPE)
            .field("lazy", &self.lazy)
            .finish()
    }
}
