use super::models::*;
use super::sqlite::Database;
use crate::hasher::Fingerprint;
use crate::metadata::value::decode_document;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Result, Row};
use std::collections::BTreeSet;

pub(crate) const CONTENT_COLUMNS: &str = "fingerprint, display_name, mime_type, scan_version, \
     thumbnail_version, timestamp, metadata";

pub(crate) const PATH_COLUMNS: &str = "path, folder, filename, content_ref, mod_time_ns";

/// Map a row selected with [`CONTENT_COLUMNS`] (starting at column 0).
pub(crate) fn content_from_row(row: &Row<'_>) -> Result<ContentRecord> {
    let timestamp: Option<String> = row.get(5)?;
    let timestamp = timestamp
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))
        })
        .transpose()?;

    let metadata: Option<String> = row.get(6)?;
    let metadata = decode_document(metadata.as_deref())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(ContentRecord {
        fingerprint: row.get(0)?,
        display_name: row.get(1)?,
        mime_type: row.get(2)?,
        scan_version: row.get(3)?,
        thumbnail_version: row.get(4)?,
        timestamp,
        metadata,
    })
}

/// Map a row selected with [`PATH_COLUMNS`] (starting at column 0).
pub(crate) fn path_from_row(row: &Row<'_>) -> Result<PathRecord> {
    Ok(PathRecord {
        path: row.get(0)?,
        folder: row.get(1)?,
        filename: row.get(2)?,
        content_ref: row.get(3)?,
        mod_time_ns: row.get(4)?,
    })
}

impl Database {
    // ── Content Records ──────────────────────────────────────────

    pub fn get_content(&self, fingerprint: &Fingerprint) -> Result<Option<ContentRecord>> {
        self.connection()
            .query_row(
                &format!("SELECT {CONTENT_COLUMNS} FROM content_record WHERE fingerprint = ?1"),
                params![fingerprint],
                content_from_row,
            )
            .optional()
    }

    pub fn list_contents(&self) -> Result<Vec<ContentRecord>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_record ORDER BY fingerprint"
        ))?;
        let contents = stmt
            .query_map([], content_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(contents)
    }

    pub fn count_contents(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM content_record", [], |row| row.get(0))
    }

    // ── Path Records ─────────────────────────────────────────────

    pub fn get_path(&self, path: &str) -> Result<Option<PathRecord>> {
        self.connection()
            .query_row(
                &format!("SELECT {PATH_COLUMNS} FROM path_record WHERE path = ?1"),
                params![path],
                path_from_row,
            )
            .optional()
    }

    pub fn paths_for_content(&self, fingerprint: &Fingerprint) -> Result<Vec<PathRecord>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {PATH_COLUMNS} FROM path_record WHERE content_ref = ?1 ORDER BY path"
        ))?;
        let paths = stmt
            .query_map(params![fingerprint], path_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(paths)
    }

    /// Paths directly inside `folder`. The root folder is `""`.
    pub fn paths_in_folder(&self, folder: &str) -> Result<Vec<PathRecord>> {
        let folder = normalize_folder(folder);
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {PATH_COLUMNS} FROM path_record WHERE folder = ?1 ORDER BY path"
        ))?;
        let paths = stmt
            .query_map(params![folder], path_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(paths)
    }

    /// Paths inside `folder` or any folder below it.
    pub fn paths_under_folder(&self, folder: &str) -> Result<Vec<PathRecord>> {
        let folder = normalize_folder(folder);
        if folder.is_empty() {
            let mut stmt = self.connection().prepare(&format!(
                "SELECT {PATH_COLUMNS} FROM path_record ORDER BY path"
            ))?;
            let paths = stmt
                .query_map([], path_from_row)?
                .collect::<Result<Vec<_>>>()?;
            return Ok(paths);
        }

        // substr comparison keeps `_` and `%` in folder names literal.
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {PATH_COLUMNS} FROM path_record \
             WHERE folder = ?1 OR substr(folder, 1, length(?1) + 1) = ?1 || '/' \
             ORDER BY path"
        ))?;
        let paths = stmt
            .query_map(params![folder], path_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(paths)
    }

    /// Every non-root folder holding files, including their ancestors, sorted.
    pub fn list_folders(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT DISTINCT folder FROM path_record WHERE folder <> ''")?;
        let stored = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>>>()?;

        let mut folders = BTreeSet::new();
        for folder in stored {
            let mut end = folder.len();
            loop {
                folders.insert(folder[..end].to_string());
                match folder[..end].rfind('/') {
                    Some(idx) => end = idx,
                    None => break,
                }
            }
        }
        Ok(folders.into_iter().collect())
    }

    pub fn count_paths(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM path_record", [], |row| row.get(0))
    }
}
