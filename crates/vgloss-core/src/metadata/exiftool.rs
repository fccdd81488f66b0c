//! External extraction through `exiftool -json -n`.

use super::value::{MetadataDocument, MetadataValue};
use super::MetadataExtractor;
use crate::error::Error;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::trace;

/// Tags describing the file on disk rather than the image. They are already
/// tracked per path and would make identical content differ.
const FILESYSTEM_TAGS: &[&str] = &[
    "SourceFile",
    "ExifToolVersion",
    "FileName",
    "Directory",
    "FileSize",
    "FileModifyDate",
    "FileAccessDate",
    "FileInodeChangeDate",
    "FileCreateDate",
    "FilePermissions",
    "FileType",
    "FileTypeExtension",
    "MIMEType",
];

#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

impl MetadataExtractor for ExifTool {
    fn extract(&self, path: &Path, _mime_type: &str) -> Result<MetadataDocument, Error> {
        trace!("Running {} on {}", self.program.display(), path.display());
        let output = Command::new(&self.program)
            .arg("-json")
            .arg("-n")
            .arg(path)
            .output()
            .map_err(|e| {
                Error::extraction(path, format!("failed to run {}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::extraction(
                path,
                format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        parse_exiftool_json(&output.stdout).map_err(|e| Error::extraction(path, e.to_string()))
    }
}

/// Parse `exiftool -json` output (an array with one object per file) into a
/// flat document, dropping binary and file-system tags.
pub fn parse_exiftool_json(raw: &[u8]) -> serde_json::Result<MetadataDocument> {
    let entries: Vec<Map<String, Value>> = serde_json::from_slice(raw)?;
    Ok(entries
        .into_iter()
        .next()
        .map(sanitize_tags)
        .unwrap_or_default())
}

fn sanitize_tags(tags: Map<String, Value>) -> MetadataDocument {
    tags.into_iter()
        .filter(|(name, _)| !FILESYSTEM_TAGS.contains(&name.as_str()))
        .filter_map(|(name, value)| to_leaf(value).map(|leaf| (name, leaf)))
        .collect()
}

fn is_binary_placeholder(s: &str) -> bool {
    s.starts_with("(Binary data") || s.starts_with("base64:")
}

fn to_leaf(value: Value) -> Option<MetadataValue> {
    match value {
        Value::Null | Value::Object(_) => None,
        Value::Bool(b) => Some(MetadataValue::Bool(b)),
        Value::Number(n) => n
            .as_i64()
            .map(MetadataValue::Integer)
            .or_else(|| n.as_f64().map(MetadataValue::Float)),
        Value::String(s) if is_binary_placeholder(&s) => None,
        Value::String(s) => Some(MetadataValue::Text(s)),
        // List-valued tags (keywords, subjects) flatten to one string.
        Value::Array(items) => {
            let parts: Vec<String> = items
                .into_iter()
                .filter_map(to_leaf)
                .map(|leaf| leaf.to_string())
                .collect();
            (!parts.is_empty()).then(|| MetadataValue::Text(parts.join(", ")))
        }
    }
}
