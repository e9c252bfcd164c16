use std::collections::BTreeMap;
use std::io::{Cursor, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SeqError};

/// One value of the acquisition metadata file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(u64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Opaque key/value metadata. The reader only looks at `PixelSize`.
pub type MetadataMap = BTreeMap<String, MetadataValue>;

/// Fixed fields of the binary metadata layout: (name, offset).
const BINARY_U32_FIELDS: [(&str, u64); 6] = [
    ("Version", 0),
    ("HeaderSizeAlways", 4),
    ("IndexCountNumber", 8),
    ("MetadataSize", 12),
    ("MetadataInfoSize", 16),
    ("MetadataLeadSize", 20),
];

const BINARY_F64_FIELDS: [(&str, u64); 5] = [
    ("SensorGain", 320),
    ("Magnification", 328),
    ("PixelSize", 336),
    ("CameraLength", 344),
    ("DiffPixelSize", 352),
];

const BINARY_MIN_SIZE: usize = 360;

/// Read the acquisition metadata file. Missing files yield `Ok(None)`.
///
/// Text files are parsed as `key = value` or `key: value` lines; anything
/// else is decoded with the camera's fixed binary layout.
pub fn read_metadata(path: &Path) -> Result<Option<MetadataMap>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "No metadata file found");
            return Ok(None);
        }
        Err(e) => return Err(SeqError::io(path, e)),
    };

    let map = match std::str::from_utf8(&bytes) {
        Ok(text) if !text.contains('\0') => parse_text_metadata(text),
        _ => parse_binary_metadata(&bytes, path)?,
    };
    debug!(path = %path.display(), entries = map.len(), "Metadata read");
    Ok(Some(map))
}

/// Parse free-text `key = value` / `key: value` lines.
pub fn parse_text_metadata(text: &str) -> MetadataMap {
    let mut map = MetadataMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(split) = line.find(['=', ':']) else {
            continue;
        };
        let key = line[..split].trim();
        if key.is_empty() {
            continue;
        }
        map.insert(key.to_string(), parse_value(line[split + 1..].trim()));
    }
    map
}

fn parse_value(raw: &str) -> MetadataValue {
    if let Ok(v) = raw.parse::<u64>() {
        MetadataValue::Integer(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        MetadataValue::Float(v)
    } else {
        MetadataValue::Text(raw.to_string())
    }
}

/// Decode the fixed binary metadata layout.
pub fn parse_binary_metadata(bytes: &[u8], path: &Path) -> Result<MetadataMap> {
    if bytes.len() < BINARY_MIN_SIZE {
        return Err(SeqError::MalformedMetadata {
            path: path.to_path_buf(),
            reason: format!(
                "binary metadata needs {} bytes, file has {}",
                BINARY_MIN_SIZE,
                bytes.len()
            ),
        });
    }

    let mut map = MetadataMap::new();
    let mut cursor = Cursor::new(bytes);
    for (name, offset) in BINARY_U32_FIELDS {
        cursor
            .seek(SeekFrom::Start(offset))
            .map_err(|e| SeqError::io(path, e))?;
        let value = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| SeqError::io(path, e))?;
        map.insert(name.to_string(), MetadataValue::Integer(value as u64));
    }
    for (name, offset) in BINARY_F64_FIELDS {
        cursor
            .seek(SeekFrom::Start(offset))
            .map_err(|e| SeqError::io(path, e))?;
        let value = cursor
            .read_f64::<LittleEndian>()
            .map_err(|e| SeqError::io(path, e))?;
        map.insert(name.to_string(), MetadataValue::Float(value));
    }
    Ok(map)
}
