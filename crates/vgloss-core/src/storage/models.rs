use crate::hasher::Fingerprint;
use crate::metadata::MetadataDocument;
use crate::version::ScanVersion;
use chrono::{DateTime, Utc};

/// One distinct byte sequence, shared by every path holding those bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub fingerprint: Fingerprint,
    /// Filename of the first path seen with this content.
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub scan_version: Option<ScanVersion>,
    pub thumbnail_version: Option<ScanVersion>,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: MetadataDocument,
}

impl ContentRecord {
    /// A record that has never been scanned.
    pub fn bare(fingerprint: Fingerprint, display_name: Option<String>) -> Self {
        Self {
            fingerprint,
            display_name,
            mime_type: None,
            scan_version: None,
            thumbnail_version: None,
            timestamp: None,
            metadata: MetadataDocument::new(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with("image/"))
    }

    pub fn is_current(&self, version: ScanVersion) -> bool {
        version.is_current(self.scan_version)
    }
}

/// One filesystem location under the gallery root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRecord {
    pub path: String,
    pub folder: String,
    pub filename: String,
    pub content_ref: Fingerprint,
    pub mod_time_ns: i64,
}

impl PathRecord {
    /// `path` is root-relative and `/`-separated; folder and filename are
    /// derived from it. Files directly under the root have folder `""`.
    pub fn new(path: impl Into<String>, content_ref: Fingerprint, mod_time_ns: i64) -> Self {
        let path = path.into();
        let (folder, filename) = match path.rsplit_once('/') {
            Some((folder, filename)) => (folder.to_string(), filename.to_string()),
            None => (String::new(), path.clone()),
        };
        Self {
            path,
            folder,
            filename,
            content_ref,
            mod_time_ns,
        }
    }
}

/// Normalise a folder argument: leading and trailing slashes are ignored,
/// so `"/dir1/"`, `"dir1/"`, `"dir1"` and `"/dir1"` are the same folder.
pub fn normalize_folder(folder: &str) -> &str {
    folder.trim_matches('/')
}
