//! Version gates for derived data.
//!
//! Bumping [`SCAN_VERSION`] makes every content record stale on the next
//! pass, which is the only migration path for metadata extraction changes.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScanVersion(pub u32);

/// Current behaviour of the metadata scanner.
pub const SCAN_VERSION: ScanVersion = ScanVersion(1);

/// Current behaviour of the thumbnail pipeline. Owned by that collaborator;
/// the reconciler only stores the marker.
pub const THUMBNAIL_VERSION: ScanVersion = ScanVersion(0);

impl ScanVersion {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Only an exact match counts as processed. A newer stored value is not
    /// something this build can vouch for.
    pub fn is_current(self, stored: Option<ScanVersion>) -> bool {
        stored == Some(self)
    }
}

impl fmt::Display for ScanVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl ToSql for ScanVersion {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.0)))
    }
}

impl FromSql for ScanVersion {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        u32::column_result(value).map(ScanVersion)
    }
}
