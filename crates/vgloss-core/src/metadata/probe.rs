//! Built-in image header probe.
//!
//! Reads just enough of a JPEG, PNG or GIF to report dimensions and sample
//! layout, using the same tag names exiftool would.

use super::value::{MetadataDocument, MetadataValue};
use super::MetadataExtractor;
use crate::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const PROBE_LENGTH: u64 = 1024 * 1024; // 1MB, room for large APP segments

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderProbe;

impl MetadataExtractor for HeaderProbe {
    fn extract(&self, path: &Path, mime_type: &str) -> Result<MetadataDocument, Error> {
        let mut header = Vec::new();
        File::open(path)
            .and_then(|f| f.take(PROBE_LENGTH).read_to_end(&mut header))
            .map_err(|e| Error::io(path, e))?;

        let probed = match mime_type {
            "image/jpeg" => probe_jpeg(&header),
            "image/png" => probe_png(&header),
            "image/gif" => probe_gif(&header),
            _ => return Ok(MetadataDocument::new()),
        };
        probed.ok_or_else(|| Error::extraction(path, format!("malformed {mime_type} header")))
    }
}

fn be16(bytes: &[u8]) -> i64 {
    i64::from(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn dimensions(width: i64, height: i64) -> MetadataDocument {
    let mut doc = MetadataDocument::new();
    doc.insert("ImageWidth".into(), MetadataValue::Integer(width));
    doc.insert("ImageHeight".into(), MetadataValue::Integer(height));
    doc
}

fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

/// Walk the marker segments up to the first start-of-frame.
pub(crate) fn probe_jpeg(data: &[u8]) -> Option<MetadataDocument> {
    if data.get(..2)? != [0xFF, 0xD8] {
        return None;
    }

    let mut i = 2;
    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        match marker {
            0xFF => {
                i += 1;
                continue;
            }
            0x01 | 0xD0..=0xD8 => {
                i += 2;
                continue;
            }
            // Scan data or end of image before any frame header.
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let length = be16(&data[i + 2..i + 4]) as usize;
        if length < 2 {
            return None;
        }
        if is_start_of_frame(marker) {
            let segment = data.get(i + 4..i + 2 + length)?;
            if segment.len() < 6 {
                return None;
            }
            let mut doc = dimensions(be16(&segment[3..5]), be16(&segment[1..3]));
            doc.insert("BitsPerSample".into(), MetadataValue::Integer(segment[0].into()));
            doc.insert("ColorComponents".into(), MetadataValue::Integer(segment[5].into()));
            return Some(doc);
        }
        i += 2 + length;
    }
    None
}

pub(crate) fn probe_png(data: &[u8]) -> Option<MetadataDocument> {
    if data.get(..8)? != PNG_SIGNATURE || data.get(12..16)? != b"IHDR" {
        return None;
    }
    let ihdr = data.get(16..26)?;
    let width = u32::from_be_bytes([ihdr[0], ihdr[1], ihdr[2], ihdr[3]]);
    let height = u32::from_be_bytes([ihdr[4], ihdr[5], ihdr[6], ihdr[7]]);
    let bit_depth = ihdr[8];
    let color_type = ihdr[9];
    let components = match color_type {
        0 | 3 => 1,
        4 => 2,
        2 => 3,
        6 => 4,
        _ => return None,
    };

    let mut doc = dimensions(width.into(), height.into());
    doc.insert("BitsPerSample".into(), MetadataValue::Integer(bit_depth.into()));
    doc.insert("ColorComponents".into(), MetadataValue::Integer(components));
    doc.insert("ColorType".into(), MetadataValue::Integer(color_type.into()));
    Some(doc)
}

pub(crate) fn probe_gif(data: &[u8]) -> Option<MetadataDocument> {
    let signature = data.get(..6)?;
    if signature != b"GIF87a" && signature != b"GIF89a" {
        return None;
    }
    let screen = data.get(6..11)?;
    let width = i64::from(u16::from_le_bytes([screen[0], screen[1]]));
    let height = i64::from(u16::from_le_bytes([screen[2], screen[3]]));
    let packed = screen[4];

    let mut doc = dimensions(width, height);
    doc.insert(
        "ColorResolutionDepth".into(),
        MetadataValue::Integer(i64::from((packed >> 4) & 0x07) + 1),
    );
    doc.insert(
        "BitsPerPixel".into(),
        MetadataValue::Integer(i64::from(packed & 0x07) + 1),
    );
    Some(doc)
}

/// Smallest byte sequence `probe_jpeg` (and `infer`) accept as a JPEG.
/// Used by tests across the crate to build fixture images.
#[cfg(test)]
pub(crate) fn tiny_jpeg(width: u16, height: u16, components: u8) -> Vec<u8> {
    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    jpeg.extend_from_slice(b"JFIF\0");
    jpeg.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
    let sof_len = 8 + 3 * u16::from(components);
    jpeg.extend_from_slice(&[0xFF, 0xC0]);
    jpeg.extend_from_slice(&sof_len.to_be_bytes());
    jpeg.push(8);
    jpeg.extend_from_slice(&height.to_be_bytes());
    jpeg.extend_from_slice(&width.to_be_bytes());
    jpeg.push(components);
    for id in 1..=components {
        jpeg.extend_from_slice(&[id, 0x11, 0x00]);
    }
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}
