use super::models::{ContentRecord, PathRecord};
use super::queries::{content_from_row, path_from_row, CONTENT_COLUMNS, PATH_COLUMNS};
use crate::hasher::Fingerprint;
use crate::metadata::value::encode_document;
use crate::metadata::ScanOutcome;
use crate::version::ScanVersion;
use rusqlite::{params, Result, Transaction};
use std::collections::BTreeMap;
use tracing::debug;

/// A content record that needs scanning, with one path that still holds its
/// bytes (if any does).
#[derive(Debug, Clone)]
pub struct StaleContent {
    pub record: ContentRecord,
    pub sample_path: Option<String>,
}

/// All writes of one reconciliation pass. Nothing is visible to other
/// connections until [`IndexTransaction::commit`]; dropping rolls back.
pub struct IndexTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> IndexTransaction<'conn> {
    pub(crate) fn new(tx: Transaction<'conn>) -> Self {
        Self { tx }
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()
    }

    // ── Snapshot ─────────────────────────────────────────────────

    pub fn load_path_records(&self) -> Result<Vec<PathRecord>> {
        let mut stmt = self
            .tx
            .prepare(&format!("SELECT {PATH_COLUMNS} FROM path_record"))?;
        let records = stmt
            .query_map([], path_from_row)?
            .collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} path records", records.len());
        Ok(records)
    }

    // ── Content Records ──────────────────────────────────────────

    /// Create a bare record for every referenced fingerprint that has none.
    /// Existing records are left untouched. Returns how many were created.
    pub fn ensure_contents(&self, referenced: &BTreeMap<Fingerprint, String>) -> Result<usize> {
        let mut created = 0;
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO content_record (fingerprint, display_name) VALUES (?1, ?2) \
             ON CONFLICT(fingerprint) DO NOTHING",
        )?;
        for (fingerprint, display_name) in referenced {
            created += stmt.execute(params![fingerprint, display_name])?;
        }
        debug!(
            "Ensured {} referenced contents ({} new)",
            referenced.len(),
            created
        );
        Ok(created)
    }

    /// Delete every content record no path references.
    pub fn purge_orphan_contents(&self) -> Result<usize> {
        let purged = self.tx.execute(
            "DELETE FROM content_record \
             WHERE fingerprint NOT IN (SELECT content_ref FROM path_record)",
            [],
        )?;
        debug!("Purged {} orphaned contents", purged);
        Ok(purged)
    }

    /// Content records whose scan version is anything other than `version`.
    pub fn stale_contents(&self, version: ScanVersion) -> Result<Vec<StaleContent>> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {CONTENT_COLUMNS}, \
                    (SELECT p.path FROM path_record p \
                     WHERE p.content_ref = content_record.fingerprint \
                     ORDER BY p.path LIMIT 1) \
             FROM content_record \
             WHERE scan_version IS NULL OR scan_version <> ?1 \
             ORDER BY fingerprint"
        ))?;
        let stale = stmt
            .query_map(params![version], |row| {
                Ok(StaleContent {
                    record: content_from_row(row)?,
                    sample_path: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(stale)
    }

    /// Persist scan results and mark each record current at `version`.
    pub fn record_scans(
        &self,
        scans: &[(Fingerprint, ScanOutcome)],
        version: ScanVersion,
    ) -> Result<usize> {
        let mut count = 0;
        let mut stmt = self.tx.prepare_cached(
            "UPDATE content_record SET mime_type = ?1, timestamp = ?2, metadata = ?3, \
             scan_version = ?4 WHERE fingerprint = ?5",
        )?;
        for (fingerprint, outcome) in scans {
            let metadata = encode_document(&outcome.metadata)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            let timestamp = outcome.timestamp.map(|t| t.to_rfc3339());
            count += stmt.execute(params![
                outcome.mime_type,
                timestamp,
                metadata,
                version,
                fingerprint,
            ])?;
        }
        debug!("Recorded {} scans at {}", count, version);
        Ok(count)
    }

    // ── Path Records ─────────────────────────────────────────────

    pub fn insert_paths(&self, records: &[PathRecord]) -> Result<usize> {
        let mut count = 0;
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO path_record (path, folder, filename, content_ref, mod_time_ns) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for record in records {
            count += stmt.execute(params![
                record.path,
                record.folder,
                record.filename,
                record.content_ref,
                record.mod_time_ns,
            ])?;
        }
        debug!("Inserted {} path records", count);
        Ok(count)
    }

    /// Only `content_ref` and `mod_time_ns` change for an existing path.
    pub fn update_paths(&self, records: &[PathRecord]) -> Result<usize> {
        let mut count = 0;
        let mut stmt = self.tx.prepare_cached(
            "UPDATE path_record SET content_ref = ?1, mod_time_ns = ?2 WHERE path = ?3",
        )?;
        for record in records {
            count += stmt.execute(params![record.content_ref, record.mod_time_ns, record.path])?;
        }
        debug!("Updated {} path records", count);
        Ok(count)
    }

    pub fn delete_paths(&self, paths: &[String]) -> Result<usize> {
        let mut count = 0;
        let mut stmt = self
            .tx
            .prepare_cached("DELETE FROM path_record WHERE path = ?1")?;
        for path in paths {
            count += stmt.execute(params![path])?;
        }
        debug!("Deleted {} path records", count);
        Ok(count)
    }
}
