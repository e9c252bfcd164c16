/// Size of the sequence header block. Frame records start right after it.
pub const SEQ_HEADER_SIZE: usize = 8192;

/// Byte offset of `ImageWidth` (u32).
pub const OFFSET_IMAGE_WIDTH: u64 = 548;

/// Byte offset of `ImageHeight` (u32).
pub const OFFSET_IMAGE_HEIGHT: u64 = 552;

/// Byte offset of `ImageBitDepth` (u32), the on-disk word size in bits.
pub const OFFSET_BIT_DEPTH: u64 = 556;

/// Byte offset of `ImageBitDepthReal` (u32), the significant bits per sample.
pub const OFFSET_BIT_DEPTH_REAL: u64 = 560;

/// Byte offset of `NumFrames` (i32).
pub const OFFSET_NUM_FRAMES: u64 = 572;

/// Byte offset of `TrueImageSize` (i32), the full record size in bytes.
pub const OFFSET_TRUE_IMAGE_SIZE: u64 = 580;

/// Byte offset of `FPS` (f64).
pub const OFFSET_FPS: u64 = 584;

/// Per-record timestamp: u32 seconds, u16 milliseconds, u16 microseconds.
pub const TIMESTAMP_SIZE: usize = 8;

/// Reference images store their samples after a fixed 1024-byte header.
pub const REFERENCE_HEADER_SIZE: usize = 1024;

/// Minimum pixel size (from the metadata file) treated as a real calibration.
pub const MIN_PIXEL_SIZE: f64 = 1e-30;

/// Minimum frame count to use frame-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Conventional companion file suffixes, appended to the `.seq` path.
pub const DARK_SUFFIX: &str = ".dark.mrc";
pub const GAIN_SUFFIX: &str = ".gain.mrc";
pub const METADATA_SUFFIX: &str = ".metadata";
pub const XML_SUFFIX: &str = ".Config.Metadata.xml";

/// File name markers of the two Celeritas sensor halves.
pub const TOP_MARKER: &str = "_Top";
pub const BOTTOM_MARKER: &str = "_Bottom";
