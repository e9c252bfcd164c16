//! XML sidecar written by the acquisition software of the dual-sensor camera.
//!
//! The sidecar is the authoritative source for the frame rate and for the
//! segment pre-buffer geometry. Only leaf elements are read:
//!
//! ```xml
//! <Metadata>
//!   <ImageSizeX>256</ImageSizeX>
//!   <ImageSizeY>128</ImageSizeY>
//!   <FrameRate>40000</FrameRate>
//!   <DarkRef>Yes</DarkRef>
//!   <GainRef>Yes</GainRef>
//!   <SegmentPreBuffer>128</SegmentPreBuffer>
//! </Metadata>
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SeqError};

/// Leaf element name -> trimmed text, first occurrence wins.
pub type XmlFields = BTreeMap<String, String>;

/// The fixed key set extracted from the sidecar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SidecarMetadata {
    /// Width of one merged sensor image (`ImageSizeX`).
    pub image_width: u32,
    /// Height of one merged sensor image (`ImageSizeY`).
    pub image_height: u32,
    /// True acquisition frame rate in Hz (`FrameRate`).
    pub frame_rate: f64,
    pub dark_reference: bool,
    pub gain_reference: bool,
    /// Frames per record in each segment file (`SegmentPreBuffer`).
    pub segment_pre_buffer: u32,
    /// Every leaf element, including the ones above.
    pub fields: XmlFields,
}

impl SidecarMetadata {
    pub fn read(path: &Path) -> Result<Self> {
        let fields = read_xml_fields(path)?;
        Self::from_fields(fields, path)
    }

    /// Extract the fixed key set. Extra fields are kept but otherwise ignored.
    pub fn from_fields(fields: XmlFields, path: &Path) -> Result<Self> {
        let image_width = required(&fields, "ImageSizeX", path)?;
        let image_height = required(&fields, "ImageSizeY", path)?;
        let frame_rate = required(&fields, "FrameRate", path)?;
        let dark_reference = required_flag(&fields, "DarkRef", path)?;
        let gain_reference = required_flag(&fields, "GainRef", path)?;
        let segment_pre_buffer: u32 = required(&fields, "SegmentPreBuffer", path)?;
        if segment_pre_buffer == 0 {
            return Err(invalid(path, "SegmentPreBuffer must be positive".into()));
        }

        debug!(
            path = %path.display(),
            image_width,
            image_height,
            frame_rate,
            segment_pre_buffer,
            "Sidecar read"
        );
        Ok(Self {
            image_width,
            image_height,
            frame_rate,
            dark_reference,
            gain_reference,
            segment_pre_buffer,
            fields,
        })
    }
}

/// Read and flatten an XML file.
pub fn read_xml_fields(path: &Path) -> Result<XmlFields> {
    let xml = std::fs::read_to_string(path).map_err(|e| SeqError::io(path, e))?;
    parse_xml_fields(&xml, path)
}

/// Flatten every leaf element of `xml` into a map.
///
/// A leaf's value is its text, or its `Value` attribute when it has no text
/// (`<FrameRate Value="40000"/>`). The first occurrence of a name wins.
pub fn parse_xml_fields(xml: &str, path: &Path) -> Result<XmlFields> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut fields = XmlFields::new();
    // Open elements with their `Value` attribute.
    let mut open: Vec<(String, Option<String>)> = Vec::new();
    let mut text: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let value = value_attribute(&e, path)?;
                open.push((element_name(&e), value));
                text = None;
            }
            Ok(Event::Empty(e)) => {
                if let Some(value) = value_attribute(&e, path)? {
                    fields.entry(element_name(&e)).or_insert(value);
                }
                text = None;
            }
            Ok(Event::Text(t)) => {
                let value = t.unescape().map_err(|e| invalid(path, e.to_string()))?;
                text = Some(value.trim().to_string());
            }
            Ok(Event::CData(c)) => {
                text = Some(String::from_utf8_lossy(&c.into_inner()).trim().to_string());
            }
            Ok(Event::End(_)) => {
                if let Some((name, attribute)) = open.pop() {
                    if let Some(value) = text.take().or(attribute) {
                        fields.entry(name).or_insert(value);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(invalid(path, e.to_string())),
        }
    }

    if !open.is_empty() {
        let names: Vec<&str> = open.iter().map(|(name, _)| name.as_str()).collect();
        return Err(invalid(path, format!("unclosed element <{}>", names.join("/"))));
    }
    Ok(fields)
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn value_attribute(e: &BytesStart<'_>, path: &Path) -> Result<Option<String>> {
    let Some(attr) = e
        .try_get_attribute("Value")
        .map_err(|err| invalid(path, err.to_string()))?
    else {
        return Ok(None);
    };
    let value = attr
        .unescape_value()
        .map_err(|err| invalid(path, err.to_string()))?;
    Ok(Some(value.trim().to_string()))
}

fn required<T: FromStr>(fields: &XmlFields, field: &'static str, path: &Path) -> Result<T> {
    let raw = fields
        .get(field)
        .ok_or_else(|| SeqError::MissingSidecarField {
            path: path.to_path_buf(),
            field,
        })?;
    raw.parse()
        .map_err(|_| invalid(path, format!("{field} has unparsable value `{raw}`")))
}

fn required_flag(fields: &XmlFields, field: &'static str, path: &Path) -> Result<bool> {
    let raw = fields
        .get(field)
        .ok_or_else(|| SeqError::MissingSidecarField {
            path: path.to_path_buf(),
            field,
        })?;
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(invalid(path, format!("{field} has unparsable flag `{raw}`"))),
    }
}

fn invalid(path: &Path, reason: String) -> SeqError {
    SeqError::InvalidSidecar {
        path: PathBuf::from(path),
        reason,
    }
}
