use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use num_traits::{PrimInt, Unsigned};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SeqError};

/// On-disk sample word, chosen from the header's storage bit depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleType {
    U8,
    U16,
    U32,
}

impl SampleType {
    /// Map a storage bit depth to a sample word. Sub-word real depths
    /// (e.g. 12-bit data) are stored in the next supported word size.
    pub fn from_bit_depth(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(Self::U8),
            16 => Ok(Self::U16),
            32 => Ok(Self::U32),
            other => Err(SeqError::UnsupportedBitDepth(other)),
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "uint8"),
            Self::U16 => write!(f, "uint16"),
            Self::U32 => write!(f, "uint32"),
        }
    }
}

/// Integral sample type a frame can be decoded into.
pub trait Sample: PrimInt + Unsigned + Default + Send + Sync + fmt::Debug + 'static {
    const SAMPLE_TYPE: SampleType;

    /// Decode one little-endian word. `bytes` is exactly `SAMPLE_TYPE.bytes()` long.
    fn from_le_slice(bytes: &[u8]) -> Self;
}

impl Sample for u8 {
    const SAMPLE_TYPE: SampleType = SampleType::U8;

    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl Sample for u16 {
    const SAMPLE_TYPE: SampleType = SampleType::U16;

    fn from_le_slice(bytes: &[u8]) -> Self {
        LittleEndian::read_u16(bytes)
    }
}

impl Sample for u32 {
    const SAMPLE_TYPE: SampleType = SampleType::U32;

    fn from_le_slice(bytes: &[u8]) -> Self {
        LittleEndian::read_u32(bytes)
    }
}

/// Acquisition time stamped after each record's image bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: u32,
    pub milliseconds: u16,
    pub microseconds: u16,
}

impl Timestamp {
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        Self {
            seconds: LittleEndian::read_u32(&bytes[0..4]),
            milliseconds: LittleEndian::read_u16(&bytes[4..6]),
            microseconds: LittleEndian::read_u16(&bytes[6..8]),
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.milliseconds as f64 * 1e-3 + self.microseconds as f64 * 1e-6
    }
}

/// Description of one output dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisInfo {
    pub name: Option<String>,
    pub size: usize,
    pub offset: f64,
    pub scale: f64,
    pub unit: Option<String>,
    /// True for navigation (leading) axes, false for the frame's y/x axes.
    pub navigate: bool,
}

impl AxisInfo {
    pub fn navigation(size: usize) -> Self {
        Self {
            name: None,
            size,
            offset: 0.0,
            scale: 1.0,
            unit: None,
            navigate: true,
        }
    }

    pub fn time(size: usize, frame_rate: f64) -> Self {
        let scale = if frame_rate > 0.0 { 1.0 / frame_rate } else { 1.0 };
        Self {
            name: Some("time".into()),
            size,
            offset: 0.0,
            scale,
            unit: Some("s".into()),
            navigate: true,
        }
    }

    pub fn signal(name: &str, size: usize, scale: f64) -> Self {
        Self {
            name: Some(name.into()),
            size,
            offset: 0.0,
            scale,
            unit: None,
            navigate: false,
        }
    }
}
