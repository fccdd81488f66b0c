use crate::config::AppConfig;
use crate::error::Error;
use crate::metadata::{extractor_from_settings, MetadataExtractor, MetadataScanner};
use crate::progress::ProgressReporter;
use crate::reconcile::{PathIndex, Reconciler};
use crate::scanner::PathWalker;
use crate::storage::{Database, IndexTransaction};
use crate::version::{ScanVersion, SCAN_VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct ReconcileEngine {
    config: AppConfig,
    db_path: PathBuf,
    scanner: MetadataScanner,
}

/// What one pass changed. A pass over an unchanged tree has zero
/// [`mutations`](ReconcileReport::mutations).
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub paths_created: usize,
    pub paths_updated: usize,
    pub paths_deleted: usize,
    pub paths_unchanged: usize,
    pub contents_created: usize,
    pub contents_purged: usize,
    pub contents_scanned: usize,
    pub scan_failures: usize,
    pub walk_duration: Duration,
    pub apply_duration: Duration,
    pub metadata_duration: Duration,
}

impl ReconcileReport {
    pub fn mutations(&self) -> usize {
        self.paths_created
            + self.paths_updated
            + self.paths_deleted
            + self.contents_created
            + self.contents_purged
            + self.contents_scanned
    }
}

impl ReconcileEngine {
    pub fn new(config: AppConfig) -> Self {
        let db_path = config.database_path();
        let scanner = MetadataScanner::new(SCAN_VERSION, extractor_from_settings(&config.metadata));
        Self {
            config,
            db_path,
            scanner,
        }
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Override the version gate. Records scanned at any other version are
    /// rescanned on the next pass.
    pub fn with_scan_version(mut self, version: ScanVersion) -> Self {
        self.scanner = self.scanner.with_version(version);
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn MetadataExtractor>) -> Self {
        self.scanner = MetadataScanner::new(self.scanner.version(), extractor);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run one reconciliation pass:
    /// 1. Snapshot the path index and diff it against a walk of the root
    /// 2. Ensure content records, apply path creates/updates/deletes, purge orphans
    /// 3. Rescan every content record below the version gate
    ///
    /// Everything happens in one transaction; any fatal error rolls it all back.
    pub fn reconcile(&self, reporter: &dyn ProgressReporter) -> Result<ReconcileReport, Error> {
        let root = &self.config.root;
        if !root.is_dir() {
            return Err(Error::RootNotFound { root: root.clone() });
        }
        info!("Reconciling {}", root.display());

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let db = Database::open(&self.db_path)?;
        db.set_busy_timeout(self.config.busy_timeout())?;
        let tx = db.begin_pass()?;
        let mut report = ReconcileReport::default();

        // Phase 1: Diff
        reporter.on_walk_start();
        let walk_start = Instant::now();
        let index = PathIndex::new(tx.load_path_records()?);
        debug!("Path index holds {} records", index.len());
        let walker = PathWalker::new(root).exclude(self.config.data_path());
        let changes = Reconciler::new(index).diff(&walker, reporter)?;
        report.walk_duration = walk_start.elapsed();
        report.paths_unchanged = changes.unchanged;
        if changes.is_empty() {
            debug!("No filesystem changes under {}", root.display());
        }
        let changed = changes.created.len() + changes.updated.len() + changes.deleted.len();
        reporter.on_walk_complete(
            changes.unchanged + changes.created.len() + changes.updated.len(),
            changed,
            report.walk_duration.as_secs_f64(),
        );

        // Phase 2: Apply. Content must exist before paths reference it, and
        // orphans are only purged once every path mutation is in.
        reporter.on_apply_start();
        let apply_start = Instant::now();
        report.contents_created = tx.ensure_contents(&changes.referenced_contents())?;
        report.paths_created = tx.insert_paths(&changes.created)?;
        report.paths_updated = tx.update_paths(&changes.updated)?;
        report.paths_deleted = tx.delete_paths(&changes.deleted)?;
        report.contents_purged = tx.purge_orphan_contents()?;
        report.apply_duration = apply_start.elapsed();
        reporter.on_apply_complete(
            report.contents_created
                + report.paths_created
                + report.paths_updated
                + report.paths_deleted
                + report.contents_purged,
            report.apply_duration.as_secs_f64(),
        );
        debug!(
            "Applied: {} paths created, {} updated, {} deleted; {} contents created, {} purged",
            report.paths_created,
            report.paths_updated,
            report.paths_deleted,
            report.contents_created,
            report.contents_purged,
        );

        // Phase 3: Metadata
        let metadata_start = Instant::now();
        let (scanned, failures) = self.scan_stale(&tx, reporter)?;
        report.contents_scanned = scanned;
        report.scan_failures = failures;
        report.metadata_duration = metadata_start.elapsed();
        reporter.on_metadata_complete(scanned, failures, report.metadata_duration.as_secs_f64());

        tx.commit()?;
        info!(
            "Reconciled {}: {} created, {} updated, {} deleted, {} scanned",
            root.display(),
            report.paths_created,
            report.paths_updated,
            report.paths_deleted,
            report.contents_scanned,
        );
        Ok(report)
    }

    /// Scan every stale record, then persist the successes in one bulk
    /// update. A record whose scan fails keeps its old scan version and is
    /// retried on the next pass; it does not hold back the others.
    fn scan_stale(
        &self,
        tx: &IndexTransaction<'_>,
        reporter: &dyn ProgressReporter,
    ) -> Result<(usize, usize), Error> {
        let version = self.scanner.version();
        let stale = tx.stale_contents(version)?;
        let total = stale.len();
        if total > 0 {
            info!("Scanning metadata for {} contents below {}", total, version);
        }
        reporter.on_metadata_start(total);

        let mut outcomes = Vec::with_capacity(total);
        let mut failures = 0;
        for (done, item) in stale.into_iter().enumerate() {
            let path = item
                .sample_path
                .as_deref()
                .map(|rel| self.config.root.join(rel));
            match self.scanner.scan(&item.record, path.as_deref()) {
                Ok(Some(outcome)) => outcomes.push((item.record.fingerprint, outcome)),
                Ok(None) => {}
                Err(e) => {
                    warn!("Metadata scan failed for {}: {}", item.record.fingerprint, e);
                    failures += 1;
                }
            }
            reporter.on_metadata_progress(done + 1, total);
        }

        let scanned = tx.record_scans(&outcomes, version)?;
        Ok((scanned, failures))
    }
}

/// Create the gallery's data directory.
pub fn init_gallery(config: &AppConfig) -> Result<(), Error> {
    let data_path = config.data_path();
    fs::create_dir_all(&data_path).map_err(|e| Error::io(&data_path, e))?;
    info!("Initialized gallery data directory {}", data_path.display());
    Ok(())
}

/// Fail unless `config.root` has been initialised as a gallery.
pub fn ensure_initialized(config: &AppConfig) -> Result<(), Error> {
    if config.data_path().is_dir() {
        Ok(())
    } else {
        Err(Error::NotInitialized {
            root: config.root.clone(),
        })
    }
}
