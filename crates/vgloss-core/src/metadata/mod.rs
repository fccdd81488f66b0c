//! Per-content metadata extraction, gated by [`ScanVersion`].

pub mod exiftool;
pub mod mime;
pub mod probe;
pub mod value;

pub use exiftool::ExifTool;
pub use probe::HeaderProbe;
pub use value::{MetadataDocument, MetadataValue};

use crate::config::{ExtractorKind, MetadataSettings};
use crate::error::Error;
use crate::storage::models::ContentRecord;
use crate::version::ScanVersion;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// Tags tried, in order, for the capture time of an image.
const CAPTURE_TIME_TAGS: &[&str] = &["DateTimeOriginal", "CreateDate", "ModifyDate"];

/// Source of image metadata. Implementations return a flat document; they
/// are only called for `image/*` content.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path, mime_type: &str) -> Result<MetadataDocument, Error>;
}

pub fn extractor_from_settings(settings: &MetadataSettings) -> Box<dyn MetadataExtractor> {
    match settings.extractor {
        ExtractorKind::Probe => Box::new(HeaderProbe),
        ExtractorKind::Exiftool => Box::new(ExifTool::new(&settings.exiftool_path)),
    }
}

/// Fields a successful scan writes back to a content record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub mime_type: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: MetadataDocument,
}

pub struct MetadataScanner {
    version: ScanVersion,
    extractor: Box<dyn MetadataExtractor>,
}

impl MetadataScanner {
    pub fn new(version: ScanVersion, extractor: Box<dyn MetadataExtractor>) -> Self {
        Self { version, extractor }
    }

    pub fn with_version(mut self, version: ScanVersion) -> Self {
        self.version = version;
        self
    }

    /// The version a successful scan stamps on the record.
    pub fn version(&self) -> ScanVersion {
        self.version
    }

    /// Scan `record` through one of its files. Returns `Ok(None)` when no
    /// file backs the record; the record then stays stale.
    pub fn scan(
        &self,
        record: &ContentRecord,
        path: Option<&Path>,
    ) -> Result<Option<ScanOutcome>, Error> {
        let Some(path) = path else {
            debug!("No path references {}, skipping scan", record.fingerprint);
            return Ok(None);
        };

        let mime_type = mime::detect_mime_type(path).map_err(|e| Error::io(path, e))?;
        trace!("{} detected as {}", path.display(), mime_type);

        let metadata = if mime_type.starts_with("image/") {
            self.extractor.extract(path, &mime_type)?
        } else {
            MetadataDocument::new()
        };

        let timestamp = capture_time(&metadata).or_else(|| modified_time(path));

        Ok(Some(ScanOutcome {
            mime_type,
            timestamp,
            metadata,
        }))
    }
}

fn capture_time(metadata: &MetadataDocument) -> Option<DateTime<Utc>> {
    CAPTURE_TIME_TAGS
        .iter()
        .filter_map(|tag| metadata.get(*tag)?.as_str())
        .find_map(parse_exif_datetime)
}

/// `YYYY:MM:DD HH:MM:SS`, ignoring any sub-second or zone suffix.
fn parse_exif_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let head = raw.get(..19)?;
    NaiveDateTime::parse_from_str(head, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
