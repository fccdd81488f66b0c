use super::path_index::PathIndex;
use crate::error::Error;
use crate::hasher::{hash_file, Fingerprint};
use crate::progress::ProgressReporter;
use crate::scanner::{PathWalker, WalkedPath};
use crate::storage::models::PathRecord;
use std::collections::BTreeMap;
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, trace};

/// Mutations computed by one pass, applied later as bulk operations.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub created: Vec<PathRecord>,
    /// Existing paths with a new `content_ref`/`mod_time_ns`.
    pub updated: Vec<PathRecord>,
    pub deleted: Vec<String>,
    pub unchanged: usize,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Fingerprints referenced by created or updated paths, each with the
    /// filename of the first path that referenced it.
    pub fn referenced_contents(&self) -> BTreeMap<Fingerprint, String> {
        let mut referenced = BTreeMap::new();
        for record in self.created.iter().chain(&self.updated) {
            referenced
                .entry(record.content_ref.clone())
                .or_insert_with(|| record.filename.clone());
        }
        referenced
    }
}

/// Diffs the live tree against the path index.
///
/// Modification time is the only change signal: a file rewritten in place
/// with its mtime preserved keeps its old fingerprint until the mtime moves.
pub struct Reconciler {
    index: PathIndex,
}

impl Reconciler {
    pub fn new(index: PathIndex) -> Self {
        Self { index }
    }

    pub fn diff(
        mut self,
        walker: &PathWalker,
        reporter: &dyn ProgressReporter,
    ) -> Result<ChangeSet, Error> {
        let mut changes = ChangeSet::default();
        let mut seen = 0usize;

        for walked in walker.walk() {
            let walked = walked?;
            seen += 1;
            reporter.on_walk_progress(seen, &walked.relative);
            self.observe(&walked, &mut changes)?;
        }

        changes.deleted = self.index.into_unobserved();
        debug!(
            "Diff complete: {} created, {} updated, {} deleted, {} unchanged",
            changes.created.len(),
            changes.updated.len(),
            changes.deleted.len(),
            changes.unchanged
        );
        Ok(changes)
    }

    /// Classify one walked file. A file that vanishes before it is fully
    /// observed is treated as never seen: it stays in the index, so a
    /// previously known path ends up deleted.
    fn observe(&mut self, walked: &WalkedPath, changes: &mut ChangeSet) -> Result<(), Error> {
        let Some(mod_time_ns) = vanished_as_none(stat_mod_time(&walked.absolute), walked)? else {
            return Ok(());
        };

        let known_mod_time = self.index.get(&walked.relative).map(|r| r.mod_time_ns);
        match known_mod_time {
            Some(known) if mod_time_ns <= known => {
                self.index.take(&walked.relative);
                changes.unchanged += 1;
            }
            Some(_) => {
                let Some(fingerprint) = vanished_as_none(hash_file(&walked.absolute), walked)?
                else {
                    return Ok(());
                };
                if let Some(mut record) = self.index.take(&walked.relative) {
                    trace!("updated: {}", walked.relative);
                    record.content_ref = fingerprint;
                    record.mod_time_ns = mod_time_ns;
                    changes.updated.push(record);
                }
            }
            None => {
                let Some(fingerprint) = vanished_as_none(hash_file(&walked.absolute), walked)?
                else {
                    return Ok(());
                };
                trace!("created: {}", walked.relative);
                changes
                    .created
                    .push(PathRecord::new(walked.relative.clone(), fingerprint, mod_time_ns));
            }
        }
        Ok(())
    }
}

/// `NotFound` means a concurrent delete; anything else fails the pass.
fn vanished_as_none<T>(result: io::Result<T>, walked: &WalkedPath) -> Result<Option<T>, Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} vanished during pass, skipping", walked.relative);
            Ok(None)
        }
        Err(e) => Err(Error::io(&walked.absolute, e)),
    }
}

fn stat_mod_time(path: &Path) -> io::Result<i64> {
    fs::metadata(path).and_then(|m| mod_time_nanos(&m))
}

/// Modification time as signed nanoseconds since the Unix epoch.
pub fn mod_time_nanos(metadata: &Metadata) -> io::Result<i64> {
    let modified = metadata.modified()?;
    let nanos = match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_nanos()).unwrap_or(i64::MAX),
    };
    Ok(nanos)
}
